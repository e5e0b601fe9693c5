mod cli;
mod operations;
mod output;

use anyhow::Result;
use clap::Parser;

use slap_capture::{config, logging};

use cli::{Cli, Command};
use operations::capture::CaptureOptions;
use operations::Context;

fn main() -> Result<()> {
    let cli = Cli::parse();

    let path = cli.config.clone().unwrap_or_else(config::config_path);
    let mut config = config::load_from(&path)?;
    logging::init(cli.log_level.as_deref().unwrap_or(&config.log_level));
    tracing::debug!(config = %path.display(), "configuration loaded");

    match cli.command {
        Command::Info => {
            let ctx = Context { config, sim: cli.sim };
            operations::info::run_info(&ctx)?;
        }
        Command::Modes => {
            operations::modes::run_modes(config.default_mode)?;
        }
        Command::Capture {
            mode,
            timeout_ms,
            retries,
            save_dir,
            json,
        } => {
            if let Some(ms) = timeout_ms {
                config.capture_timeout_ms = ms;
            }
            if let Some(n) = retries {
                config.capture_retries = n;
            }
            let ctx = Context { config, sim: cli.sim };
            operations::capture::run_capture(
                &ctx,
                CaptureOptions {
                    mode,
                    save_dir,
                    json,
                },
            )?;
        }
        Command::Interactive => {
            let ctx = Context { config, sim: cli.sim };
            operations::interactive::run_interactive(&ctx)?;
        }
    }

    Ok(())
}
