use std::sync::Arc;

use tracing::{info, warn};

use super::DeviceLayer;

/// RAII guard around an initialised SDK instance. Releases the device layer
/// on drop, so the library is torn down exactly once per process scope.
pub struct SdkGuard {
    layer: Arc<dyn DeviceLayer>,
}

impl SdkGuard {
    pub fn layer(&self) -> &Arc<dyn DeviceLayer> {
        &self.layer
    }
}

impl Drop for SdkGuard {
    fn drop(&mut self) {
        self.layer.release();
        info!("device layer released");
    }
}

/// Outcome of bringing up the device layer at startup.
pub enum SdkRuntime {
    Ready(SdkGuard),
    /// Non-physical environment; the SDK was never touched.
    Emulator,
    /// Initialisation failed; capture stays disabled for the session.
    Failed(String),
}

impl SdkRuntime {
    pub fn start(layer: Arc<dyn DeviceLayer>, on_emulator: bool) -> Self {
        if on_emulator {
            warn!("emulator detected, device layer not initialised");
            return SdkRuntime::Emulator;
        }
        match layer.initialize() {
            Ok(()) => {
                info!(
                    sdk = %layer.sdk_version(),
                    algorithm = %layer.algorithm_version(),
                    "device layer initialised"
                );
                SdkRuntime::Ready(SdkGuard { layer })
            }
            Err(e) => {
                warn!(error = %e, "device layer initialisation failed");
                SdkRuntime::Failed(e.message)
            }
        }
    }

    pub fn guard(&self) -> Option<&SdkGuard> {
        match self {
            SdkRuntime::Ready(guard) => Some(guard),
            _ => None,
        }
    }

    pub fn is_emulator(&self) -> bool {
        matches!(self, SdkRuntime::Emulator)
    }
}
