use anyhow::Result;

use crate::output::*;

use super::Context;

pub fn run_info(ctx: &Context) -> Result<()> {
    print_header("SDK Info");

    let (controller, identity) = ctx.start_session()?;
    let state = controller.state();

    let platform = [identity.manufacturer.as_str(), identity.model.as_str()]
        .iter()
        .filter(|s| !s.is_empty())
        .copied()
        .collect::<Vec<_>>()
        .join(" ");
    print_info(
        "Platform",
        if platform.is_empty() { "(unknown)" } else { &platform },
    );

    if state.capture_enabled() {
        print_pass("Physical platform, capture available");
    } else {
        print_fail("Capture disabled for this session");
    }

    match controller.sdk_info() {
        Some(info) => {
            print_info("Version", &info.sdk_version);
            print_info("Algorithm", &info.algorithm_version);
            print_info("Devices Connected", &state.device_count().to_string());
        }
        None => {
            print_info("Version", "N/A");
            print_info("Algorithm", "N/A");
            print_step("The capture SDK needs a physical host with USB access");
        }
    }

    print_status(state.status());
    Ok(())
}
