use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use slap_capture::CaptureMode;

#[derive(Parser)]
#[command(
    name = "slap-capture",
    about = "Multi-finger fingerprint capture tool",
    long_about = "Opens a slap fingerprint scanner, captures one or more fingers\n\
                  per the selected mode and reports quality and template size.\n\
                  Set SLAP_CAPTURE_FORCE_EMULATOR=0 to bypass virtual machine detection."
)]
pub struct Cli {
    /// Config file (default: $XDG_CONFIG_HOME/slap-capture/config.json)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Log filter, e.g. "debug" (RUST_LOG takes precedence)
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    #[command(flatten)]
    pub sim: SimArgs,

    #[command(subcommand)]
    pub command: Command,
}

/// Behaviour of the simulated scanner.
#[derive(Args, Debug, Clone)]
pub struct SimArgs {
    /// Scripted capture events, e.g. "progress,success" or "timeout"
    #[arg(long, global = true, default_value = "progress,success")]
    pub sim_events: String,

    /// Make device open fail with this message
    #[arg(long, global = true)]
    pub sim_open_fail: Option<String>,

    /// Number of attached devices reported
    #[arg(long, global = true, default_value_t = 1)]
    pub sim_devices: usize,

    /// Delay before each simulated callback
    #[arg(long, global = true, default_value_t = 300)]
    pub sim_delay_ms: u64,
}

#[derive(Subcommand)]
pub enum Command {
    /// Show SDK versions, connected devices and platform status
    Info,

    /// List the available capture modes
    Modes,

    /// Open the device, capture once and close it again
    Capture {
        /// Capture mode (defaults to the configured mode)
        #[arg(long, value_enum)]
        mode: Option<CaptureMode>,

        /// Vendor capture timeout in milliseconds
        #[arg(long)]
        timeout_ms: Option<u64>,

        /// Vendor retry count
        #[arg(long)]
        retries: Option<u32>,

        /// Write each captured image as PNG into this directory
        #[arg(long)]
        save_dir: Option<PathBuf>,

        /// Print a JSON summary instead of the report
        #[arg(long)]
        json: bool,
    },

    /// Line-driven session: open, mode <name>, capture, close, status, quit
    Interactive,
}
