use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::error::ConfigError;
use crate::logging::LogConfig;
use crate::workload::WorkloadConfig;

/// Environment variable consulted when no config path is given.
pub const CONFIG_ENV: &str = "INFLUX_REPORTER_CONFIG";

/// Everything needed to start a reporter, usually read from a JSON file.
#[derive(Debug, Clone, Deserialize)]
pub struct ReporterConfig {
    /// InfluxDB base url, e.g. `http://localhost:8086`
    pub url: String,

    /// Target database for every batch
    pub database: String,

    #[serde(default)]
    pub username: Option<String>,

    #[serde(default)]
    pub password: Option<String>,

    /// Prepended to every measurement name (`_` appended if missing)
    #[serde(default)]
    pub prefix: String,

    /// Applied to every measurement of every flush
    #[serde(default)]
    pub tags: BTreeMap<String, String>,

    /// Seconds between flushes
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,

    #[serde(default)]
    pub log: LogConfig,

    #[serde(default)]
    pub workload: WorkloadConfig,
}

fn default_interval_secs() -> u64 {
    10
}

impl ReporterConfig {
    /// Read, parse and validate a JSON config file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&raw)
    }

    pub fn from_json(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.url.trim().is_empty() {
            return Err(ConfigError::Invalid("url must not be empty".into()));
        }
        if self.database.trim().is_empty() {
            return Err(ConfigError::Invalid("database must not be empty".into()));
        }
        if self.interval_secs == 0 {
            return Err(ConfigError::Invalid("interval_secs must be at least 1".into()));
        }
        self.workload.validate()
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}
