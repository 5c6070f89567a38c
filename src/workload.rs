//! Synthetic traffic for smoke-testing a deployment end to end.

use std::sync::Arc;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Deserialize;
use tokio::task::JoinHandle;

use crate::error::{ConfigError, RegistryError, WorkloadError};
use crate::metrics::{Counter, Gauge, Meter, Registry, Timer};

// ─── Configuration ───────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
pub struct WorkloadConfig {
    #[serde(default)]
    pub enabled: bool,

    /// Number of concurrent Tokio tasks generating traffic
    #[serde(default = "default_concurrency")]
    pub concurrency: u32,

    /// Simulated endpoints; each gets its own set of instruments
    #[serde(default = "default_endpoints")]
    pub endpoints: Vec<String>,

    /// Percentage of simulated requests that fail (0–100)
    #[serde(default = "default_error_pct")]
    pub error_pct: u8,
}

fn default_concurrency() -> u32 {
    4
}
fn default_endpoints() -> Vec<String> {
    vec!["api_users.get".into(), "api_products.get".into()]
}
fn default_error_pct() -> u8 {
    2
}

impl Default for WorkloadConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            concurrency: default_concurrency(),
            endpoints: default_endpoints(),
            error_pct: default_error_pct(),
        }
    }
}

impl WorkloadConfig {
    /// Checked at load time only when the workload is enabled.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.enabled {
            return Ok(());
        }
        self.check()
    }

    fn check(&self) -> Result<(), ConfigError> {
        if self.concurrency == 0 || self.concurrency > 500 {
            return Err(ConfigError::Invalid(
                "workload.concurrency must be between 1 and 500".into(),
            ));
        }
        if self.endpoints.is_empty() {
            return Err(ConfigError::Invalid("workload.endpoints must not be empty".into()));
        }
        if self.error_pct > 100 {
            return Err(ConfigError::Invalid(
                "workload.error_pct must be between 0 and 100".into(),
            ));
        }
        Ok(())
    }
}

// ─── Instruments ─────────────────────────────────────────────────

/// Instruments recorded for one simulated endpoint `<name>`:
/// `<name>.reqs` meter, `<name>.latency` timer,
/// `<name>.errors` counter and `<name>.inflight` gauge, all folded into one
/// measurement per flush.
#[derive(Clone)]
struct Endpoint {
    reqs: Arc<Meter>,
    latency: Arc<Timer>,
    errors: Arc<Counter>,
    inflight: Arc<Gauge>,
}

impl Endpoint {
    fn register(registry: &Registry, name: &str) -> Result<Self, RegistryError> {
        Ok(Self {
            reqs: registry.get_or_register_meter(&format!("{name}.reqs"))?,
            latency: registry.get_or_register_timer(&format!("{name}.latency"))?,
            errors: registry.get_or_register_counter(&format!("{name}.errors"))?,
            inflight: registry.get_or_register_gauge(&format!("{name}.inflight"))?,
        })
    }
}

// ─── Public entry point ──────────────────────────────────────────

/// Registers the instruments and spawns `concurrency` workers that record
/// into them until aborted. The config is checked even when `enabled` is unset.
pub fn spawn(
    registry: &Registry,
    config: &WorkloadConfig,
) -> Result<Vec<JoinHandle<()>>, WorkloadError> {
    config.check()?;

    let endpoints = config
        .endpoints
        .iter()
        .map(|name| Endpoint::register(registry, name))
        .collect::<Result<Vec<_>, _>>()?;

    registry
        .get_or_register_gauge("workload.workers")?
        .update(i64::from(config.concurrency));

    tracing::info!(
        workers = config.concurrency,
        endpoints = ?config.endpoints,
        "synthetic workload started"
    );

    let handles = (0..config.concurrency)
        .map(|worker_id| {
            let endpoints = endpoints.clone();
            let error_pct = config.error_pct;
            tokio::spawn(worker(worker_id, endpoints, error_pct))
        })
        .collect();

    Ok(handles)
}

// ─── Worker loop ─────────────────────────────────────────────────

async fn worker(id: u32, endpoints: Vec<Endpoint>, error_pct: u8) {
    // Each worker gets its own deterministic RNG seeded uniquely.
    let mut rng = StdRng::seed_from_u64(1000 + u64::from(id));

    loop {
        let endpoint = &endpoints[rng.gen_range(0..endpoints.len())];
        let latency = Duration::from_micros(rng.gen_range(200..5_000));
        let failed = rng.gen_range(0u8..100) < error_pct;

        endpoint.inflight.add(1);
        tokio::time::sleep(latency).await;
        endpoint.inflight.add(-1);

        endpoint.reqs.mark(1);
        endpoint.latency.update(latency);
        if failed {
            endpoint.errors.inc(1);
        }
    }
}
