//! Configuration module for Flowgate
//!
//! JSON configuration for the control plane: logging, stats API,
//! proxy mode and telemetry tuning.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::control::Mode;
use crate::error::{Error, Result};
use crate::telemetry::MonitorConfig;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Log configuration
    #[serde(default)]
    pub log: LogConfig,

    /// Stats API configuration
    #[serde(default)]
    pub api: Option<ApiConfig>,

    /// Initial proxy mode
    #[serde(default)]
    pub mode: Mode,

    /// Telemetry tuning
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

/// Log configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// Log level: debug, info, warn, error
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

/// Stats API configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Listen address for the stats API (e.g., "127.0.0.1:9090")
    pub listen: String,
}

/// Telemetry tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryConfig {
    /// Sampling tick period in milliseconds
    #[serde(default = "default_sample_interval_ms")]
    pub sample_interval_ms: u64,

    /// History window capacity in samples
    #[serde(default = "default_history_capacity")]
    pub history_capacity: usize,

    /// Samples used to compute instantaneous speed
    #[serde(default = "default_speed_lookback")]
    pub speed_lookback: usize,
}

fn default_sample_interval_ms() -> u64 {
    1000
}

fn default_history_capacity() -> usize {
    3600
}

fn default_speed_lookback() -> usize {
    5
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            sample_interval_ms: default_sample_interval_ms(),
            history_capacity: default_history_capacity(),
            speed_lookback: default_speed_lookback(),
        }
    }
}

impl TelemetryConfig {
    /// Translate into the monitor's own config
    pub fn monitor_config(&self) -> MonitorConfig {
        MonitorConfig {
            sample_interval: Duration::from_millis(self.sample_interval_ms),
            history_capacity: self.history_capacity,
            speed_lookback: self.speed_lookback,
        }
    }
}

impl Config {
    /// Load configuration from a JSON file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Failed to read config file: {}", e)))?;
        Self::from_json(&content)
    }

    /// Parse configuration from JSON string
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Config = serde_json::from_str(json)
            .map_err(|e| Error::Config(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Check constraints that serde cannot express
    pub fn validate(&self) -> Result<()> {
        if self.telemetry.sample_interval_ms == 0 {
            return Err(Error::Config("telemetry.sample_interval_ms must be positive".into()));
        }
        if self.telemetry.history_capacity == 0 {
            return Err(Error::Config("telemetry.history_capacity must be positive".into()));
        }
        if self.telemetry.speed_lookback < 2 {
            return Err(Error::Config("telemetry.speed_lookback must be at least 2".into()));
        }
        if let Some(api) = &self.api {
            api.listen
                .parse::<std::net::SocketAddr>()
                .map_err(|_| Error::Config(format!("Invalid API listen address: {}", api.listen)))?;
        }
        Ok(())
    }

    /// Create a default local configuration with the stats API enabled
    pub fn default_local() -> Self {
        Config {
            log: LogConfig::default(),
            api: Some(ApiConfig {
                listen: "127.0.0.1:9090".to_string(),
            }),
            mode: Mode::Rule,
            telemetry: TelemetryConfig::default(),
        }
    }
}
