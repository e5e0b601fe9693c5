use std::io::{self, BufRead, Write};

use anyhow::Result;

use slap_capture::session::SessionController;
use slap_capture::CaptureMode;

use crate::output::*;

use super::{wait_with_status, Context};

const HELP: &str = concat!(
    "open | mode <both-thumbs|four-left|four-right|single> | capture | close | ",
    "status | modes | quit"
);

pub fn run_interactive(ctx: &Context) -> Result<()> {
    print_header("Interactive Capture Session");

    let (mut controller, _) = ctx.start_session()?;
    print_status(controller.state().status());
    if !controller.state().capture_enabled() {
        print_warn("Capture controls are disabled for this session");
    }
    print_step(HELP);

    let stdin = io::stdin();
    loop {
        print!("{} > ", controller.state().selected_mode().cli_name());
        io::stdout().flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }
        let mut words = line.split_whitespace();
        let Some(cmd) = words.next() else {
            continue;
        };

        match cmd {
            "quit" | "exit" => break,
            "help" => print_step(HELP),
            "status" => show_status(&controller),
            "modes" => super::modes::run_modes(controller.state().selected_mode())?,
            "mode" => match words.next().and_then(CaptureMode::from_cli_name) {
                Some(mode) => match controller.select_mode(mode) {
                    Ok(()) => print_info("Mode", mode.label()),
                    Err(e) => print_fail(&format!("Cannot change mode: {}", e)),
                },
                None => print_fail("Unknown mode"),
            },
            "open" => {
                if let Err(e) = controller.open_device() {
                    print_fail(&format!("Cannot open: {}", e));
                    continue;
                }
                print_status(controller.state().status());
                wait_with_status(&mut controller);
            }
            "capture" => {
                let mode = controller.state().selected_mode();
                if let Err(e) = controller.capture(mode) {
                    print_fail(&format!("Cannot capture: {}", e));
                    continue;
                }
                print_status(controller.state().status());
                wait_with_status(&mut controller);
                for (i, result) in controller.state().results().iter().enumerate() {
                    print_result(i, result);
                }
            }
            "close" => match controller.close_device() {
                Ok(()) => print_status(controller.state().status()),
                Err(e) => print_fail(&format!("Cannot close: {}", e)),
            },
            other => print_fail(&format!("Unknown command '{}'. {}", other, HELP)),
        }
    }

    controller.teardown();
    print_step("Session ended");
    Ok(())
}

fn show_status(controller: &SessionController) {
    let state = controller.state();
    print_status(state.status());
    print_info("Devices Connected", &state.device_count().to_string());
    match state.device() {
        Some(info) => print_info(
            "Device",
            &format!("{}x{} @ {}dpi", info.width, info.height, info.resolution),
        ),
        None => print_info("Device", "closed"),
    }
    print_info("Mode", state.selected_mode().label());
    print_info("Results", &state.results().len().to_string());
    let enabled = |b: bool| if b { "enabled" } else { "disabled" };
    print_info("Open", enabled(state.can_open()));
    print_info("Capture", enabled(state.can_capture()));
    print_info("Close", enabled(state.can_close()));
}
