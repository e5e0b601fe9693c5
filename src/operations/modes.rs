use anyhow::Result;

use slap_capture::CaptureMode;

use crate::output::*;

pub fn run_modes(default_mode: CaptureMode) -> Result<()> {
    print_header("Capture Modes");

    for mode in CaptureMode::ALL {
        let marker = if mode == default_mode { " (default)" } else { "" };
        println!();
        print_info(&format!("  {}", mode.cli_name()), &format!("{}{}", mode.label(), marker));
        print_info("    Input image type", &mode.input_image_type().to_string());
        print_info("    Expected fingers", &mode.expected_fingers().to_string());
        let positions: Vec<&str> = mode.finger_positions().iter().map(|p| p.label()).collect();
        print_info("    Positions", &positions.join(", "));
    }

    Ok(())
}
