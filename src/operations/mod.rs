pub mod capture;
pub mod info;
pub mod interactive;
pub mod modes;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Result};

use slap_capture::config::Config;
use slap_capture::device::runtime::SdkRuntime;
use slap_capture::device::simulated::{parse_script, SimConfig, SimulatedDevice};
use slap_capture::platform::{self, PlatformIdentity};
use slap_capture::session::SessionController;

use crate::cli::SimArgs;
use crate::output::*;

/// Everything a command needs to bring up a session.
pub struct Context {
    pub config: Config,
    pub sim: SimArgs,
}

impl Context {
    fn sim_config(&self) -> Result<SimConfig> {
        let events =
            parse_script(&self.sim.sim_events).map_err(|e| anyhow!("--sim-events: {}", e))?;
        Ok(SimConfig {
            device_count: self.sim.sim_devices,
            open_error: self.sim.sim_open_fail.clone(),
            events,
            event_delay: Duration::from_millis(self.sim.sim_delay_ms),
            ..SimConfig::default()
        })
    }

    /// Detect the platform, bring up the device layer and wrap it in a
    /// controller. The controller releases the layer when dropped.
    pub fn start_session(&self) -> Result<(SessionController, PlatformIdentity)> {
        let identity = PlatformIdentity::detect();
        let emulator = platform::running_on_emulator(&identity);
        let layer = Arc::new(SimulatedDevice::new(self.sim_config()?));
        let runtime = SdkRuntime::start(layer, emulator);
        let mut controller = SessionController::new(runtime, self.config.session_settings());
        if controller.state().can_select_mode() {
            controller.select_mode(self.config.default_mode)?;
        }
        Ok((controller, identity))
    }
}

/// Drive the controller until idle, echoing every status change.
pub fn wait_with_status(controller: &mut SessionController) {
    while controller.state().is_busy() {
        if controller.wait_for(Duration::from_millis(250)) {
            print_status(controller.state().status());
        }
    }
}
