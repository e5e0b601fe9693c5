use std::env;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::mode::CaptureMode;
use crate::session::SessionSettings;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Read { path: PathBuf, source: io::Error },

    #[error("Invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
}

fn default_timeout_ms() -> u64 {
    20_000
}

fn default_retries() -> u32 {
    2
}

fn default_open_timeout_ms() -> u64 {
    10_000
}

fn default_grace_ms() -> u64 {
    5_000
}

fn default_log_level() -> String {
    "info".to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub device_index: usize,
    #[serde(default = "default_timeout_ms")]
    pub capture_timeout_ms: u64,
    #[serde(default = "default_retries")]
    pub capture_retries: u32,
    #[serde(default = "default_open_timeout_ms")]
    pub open_timeout_ms: u64,
    /// Added to the vendor timeout before the local watchdog gives up.
    #[serde(default = "default_grace_ms")]
    pub watchdog_grace_ms: u64,
    #[serde(default)]
    pub default_mode: CaptureMode,
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            device_index: 0,
            capture_timeout_ms: default_timeout_ms(),
            capture_retries: default_retries(),
            open_timeout_ms: default_open_timeout_ms(),
            watchdog_grace_ms: default_grace_ms(),
            default_mode: CaptureMode::default(),
            log_level: default_log_level(),
        }
    }
}

impl Config {
    pub fn session_settings(&self) -> SessionSettings {
        SessionSettings {
            device_index: self.device_index,
            capture_timeout: Duration::from_millis(self.capture_timeout_ms),
            capture_retries: self.capture_retries,
            open_timeout: Duration::from_millis(self.open_timeout_ms),
            watchdog_grace: Duration::from_millis(self.watchdog_grace_ms),
        }
    }
}

pub fn config_path() -> PathBuf {
    if let Ok(xdg) = env::var("XDG_CONFIG_HOME") {
        if !xdg.is_empty() {
            return Path::new(&xdg).join("slap-capture").join("config.json");
        }
    }
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("slap-capture")
        .join("config.json")
}

/// Load `path`. A missing file yields defaults; a malformed one is an error.
pub fn load_from(path: &Path) -> Result<Config, ConfigError> {
    let data = match fs::read_to_string(path) {
        Ok(d) => d,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Config::default()),
        Err(source) => {
            return Err(ConfigError::Read {
                path: path.to_path_buf(),
                source,
            })
        }
    };
    serde_json::from_str(&data).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}
