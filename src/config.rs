//! Configuration loading: a JSON file with environment variable overrides.
//!
//! Every field except the device list has a default. Environment
//! variables take precedence over file values.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::datalog::TIME_FIELD;
use crate::device::AlarmKind;
use crate::protocol::Port;
use crate::transport::serial::DEFAULT_BAUD_RATE;

/// Top-level configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Config {
    /// Serial port path.
    pub port: String,
    /// Serial baud rate.
    pub baud_rate: u32,
    /// Seconds between poll cycles.
    pub poll_period: u64,
    /// Seconds between log snapshots.
    pub log_period: u64,
    /// Milliseconds to wait for each controller response.
    pub response_timeout_ms: u64,
    /// Path of the device log.
    pub log_path: PathBuf,
    /// Tracing filter directive (`RUST_LOG` syntax).
    pub log_filter: Option<String>,
    /// Devices in registration order.
    pub devices: Vec<DeviceConfig>,
}

/// One device entry.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum DeviceConfig {
    /// Digital output.
    #[serde(alias = "dout")]
    Output {
        /// Display name, also used in commands and the log.
        name: String,
        /// Controller port.
        port: Port,
    },
    /// Temperature sensor.
    #[serde(alias = "ds18b20")]
    Sensor {
        /// Display name, also used in the log.
        name: String,
        /// Controller port.
        port: Port,
        /// Offset added to every raw reading.
        #[serde(default, alias = "adjust")]
        adjustment: f64,
        /// Alarms evaluated on every reading.
        #[serde(default)]
        alarms: Vec<AlarmConfig>,
    },
}

impl DeviceConfig {
    /// Device name.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Output { name, .. } | Self::Sensor { name, .. } => name,
        }
    }
}

/// Alarm thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct AlarmConfig {
    /// Trigger threshold.
    pub on: f64,
    /// Release threshold.
    pub off: f64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: "/dev/ttyUSB0".to_string(),
            baud_rate: DEFAULT_BAUD_RATE,
            poll_period: 5,
            log_period: 60,
            response_timeout_ms: 1000,
            log_path: PathBuf::from("devices.log"),
            log_filter: None,
            devices: Vec::new(),
        }
    }
}

impl Config {
    /// Load configuration from `path` then apply environment overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the file is missing, malformed or invalid.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::from_file(path)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    /// Parses configuration from JSON text without validating it.
    pub fn from_json(content: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(content)?)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("TELEGINO_PORT") {
            self.port = val;
        }
        if let Ok(val) = std::env::var("TELEGINO_LOG") {
            self.log_filter = Some(val);
        }
    }

    /// Checks semantic constraints serde cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.poll_period == 0 {
            return Err(ConfigError::Validation(
                "pollPeriod must be positive".to_string(),
            ));
        }
        if self.log_period == 0 {
            return Err(ConfigError::Validation(
                "logPeriod must be positive".to_string(),
            ));
        }

        let mut names = HashSet::new();
        for device in &self.devices {
            let name = device.name();
            if name.trim().is_empty() {
                return Err(ConfigError::Validation(
                    "device name must not be empty".to_string(),
                ));
            }
            if name == TIME_FIELD {
                return Err(ConfigError::Validation(format!(
                    "device name {name:?} is reserved"
                )));
            }
            if !names.insert(name) {
                return Err(ConfigError::Validation(format!(
                    "duplicate device name {name:?}"
                )));
            }
            if let DeviceConfig::Sensor { alarms, .. } = device {
                if let Some(alarm) = alarms
                    .iter()
                    .find(|a| AlarmKind::of(a.on, a.off) == AlarmKind::Inert)
                {
                    return Err(ConfigError::Validation(format!(
                        "alarm on {name:?} has equal thresholds ({}), it could never raise",
                        alarm.on
                    )));
                }
            }
        }
        Ok(())
    }

    /// Poll period.
    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_period)
    }

    /// Log period.
    #[must_use]
    pub const fn log_interval(&self) -> Duration {
        Duration::from_secs(self.log_period)
    }

    /// Per-response timeout.
    #[must_use]
    pub const fn response_timeout(&self) -> Duration {
        Duration::from_millis(self.response_timeout_ms)
    }

    /// Tracing filter, falling back to `default`.
    #[must_use]
    pub fn log_filter_or<'a>(&'a self, default: &'a str) -> &'a str {
        self.log_filter.as_deref().unwrap_or(default)
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// JSON parse failure.
    #[error("failed to parse config file: {0}")]
    Parse(#[from] serde_json::Error),
    /// File I/O failure.
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    /// Semantic validation failure.
    #[error("invalid configuration: {0}")]
    Validation(String),
}
