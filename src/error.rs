use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

// ─── Configuration ───────────────────────────────────────────────

/// Failure while loading or validating a [`crate::config::ReporterConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot parse config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

// ─── Startup ─────────────────────────────────────────────────────

/// Errors surfaced once, before the reporter loop starts.
#[derive(Debug, Error)]
pub enum SetupError {
    #[error("invalid InfluxDB url {url:?}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("unsupported url scheme {0:?}, expected http or https")]
    UnsupportedScheme(String),

    #[error("flush interval must be greater than zero")]
    ZeroInterval,

    #[error("cannot open InfluxDB connection: {0}")]
    Connect(#[from] TransportError),
}

// ─── Transport ───────────────────────────────────────────────────

/// Errors talking to the time-series store. Never fatal once the loop runs.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("http client: {0}")]
    Http(#[from] reqwest::Error),

    #[error("server answered {status}: {body}")]
    Status { status: u16, body: String },

    #[error("no answer within {0:?}")]
    Timeout(Duration),
}

// ─── Registry ────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("metric {0:?} is already registered")]
    Duplicate(String),

    #[error("metric {name:?} is a {existing}, not a {requested}")]
    KindMismatch {
        name: String,
        existing: &'static str,
        requested: &'static str,
    },
}

// ─── Workload ────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum WorkloadError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Registry(#[from] RegistryError),
}
