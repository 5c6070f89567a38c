use serde::Deserialize;
use tracing_subscriber::util::TryInitError;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Debug, Clone, Deserialize)]
pub struct LogConfig {
    /// Filter directive (trace, debug, info, warn, error). `RUST_LOG` wins.
    #[serde(default = "default_level")]
    pub level: String,

    /// Emit one JSON object per event instead of human-readable lines.
    #[serde(default)]
    pub json_format: bool,
}

fn default_level() -> String {
    "info".into()
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            json_format: false,
        }
    }
}

/// Install the global subscriber. Call once at startup.
pub fn init_logging(config: &LogConfig) -> Result<(), TryInitError> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));
    let registry = tracing_subscriber::registry().with(env_filter);

    if config.json_format {
        registry.with(fmt::layer().json()).try_init()
    } else {
        registry.with(fmt::layer()).try_init()
    }
}
