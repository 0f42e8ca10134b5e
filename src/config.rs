//! Configuration management.

use crate::error::Result;
use config::Config;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Application settings, loaded from a TOML file with per-key overrides from
/// `LASER_CTL_*` environment variables.
#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    /// Serial port device path (e.g. `/dev/ttyUSB0`, `COM3`).
    pub port: String,
    /// Serial baud rate.
    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,
    /// Reply timeout in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// Calibration file to install on startup.
    pub calibration_file: Option<PathBuf>,
    /// Tracing filter directive (e.g. `info`, `laser_ctl=debug`).
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_baud_rate() -> u32 {
    57_600
}

fn default_timeout_ms() -> u64 {
    2_000
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Settings {
    /// Load settings from `path` (extension optional, any format the
    /// `config` crate understands), then apply environment overrides.
    pub fn load(path: &str) -> Result<Self> {
        let s = Config::builder()
            .add_source(config::File::with_name(path))
            .add_source(config::Environment::with_prefix("LASER_CTL"))
            .build()?;
        Ok(s.try_deserialize()?)
    }

    /// Reply timeout as a [`Duration`].
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}
