use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;

use influx_reporter::config::{ReporterConfig, CONFIG_ENV};
use influx_reporter::{logging, workload, Registry, Reporter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ── 1. Load config ───────────────────────────────────────────
    let path: PathBuf = std::env::args_os()
        .nth(1)
        .map(PathBuf::from)
        .or_else(|| std::env::var_os(CONFIG_ENV).map(PathBuf::from))
        .with_context(|| format!("usage: influx-reporter <config.json> (or set {CONFIG_ENV})"))?;

    let config = ReporterConfig::load(&path)
        .with_context(|| format!("loading {}", path.display()))?;

    // ── 2. Logging ───────────────────────────────────────────────
    logging::init_logging(&config.log).context("installing log subscriber")?;

    // ── 3. Registry (+ optional synthetic traffic) ───────────────
    let registry = Arc::new(Registry::new());
    if config.workload.enabled {
        workload::spawn(&registry, &config.workload).context("starting synthetic workload")?;
    }

    // ── 4. Reporter ──────────────────────────────────────────────
    let reporter = Reporter::from_config(registry, &config)
        .with_context(|| format!("connecting to {}", config.url))?;

    tokio::select! {
        _ = reporter.run() => {}
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("interrupted, exiting");
        }
    }

    Ok(())
}
