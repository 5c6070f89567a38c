use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::RwLock;

use super::{Counter, Gauge, GaugeFloat, Histogram, Meter, Metric, Timer};
use crate::error::RegistryError;

/// Thread-safe name → instrument table.
///
/// Constructed explicitly and shared via `Arc`; there is no process-wide
/// default instance.
#[derive(Default)]
pub struct Registry {
    metrics: RwLock<BTreeMap<String, Metric>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `metric` under `name`. Fails if the name is taken.
    pub fn register(&self, name: impl Into<String>, metric: Metric) -> Result<(), RegistryError> {
        let name = name.into();
        let mut metrics = self.metrics.write();
        if metrics.contains_key(&name) {
            return Err(RegistryError::Duplicate(name));
        }
        metrics.insert(name, metric);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<Metric> {
        self.metrics.read().get(name).cloned()
    }

    pub fn unregister(&self, name: &str) -> Option<Metric> {
        self.metrics.write().remove(name)
    }

    pub fn len(&self) -> usize {
        self.metrics.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.metrics.read().is_empty()
    }

    /// Visit every registered metric.
    ///
    /// Iterates a copy of the table taken under the read lock, so `f` may
    /// touch the registry without deadlocking.
    pub fn each(&self, mut f: impl FnMut(&str, &Metric)) {
        let entries: Vec<(String, Metric)> = self
            .metrics
            .read()
            .iter()
            .map(|(name, metric)| (name.clone(), metric.clone()))
            .collect();

        for (name, metric) in &entries {
            f(name, metric);
        }
    }

    pub fn get_or_register_counter(&self, name: &str) -> Result<Arc<Counter>, RegistryError> {
        self.get_or_register(
            name,
            "counter",
            || Metric::Counter(Arc::new(Counter::new())),
            |m| match m {
                Metric::Counter(c) => Some(c.clone()),
                _ => None,
            },
        )
    }

    pub fn get_or_register_gauge(&self, name: &str) -> Result<Arc<Gauge>, RegistryError> {
        self.get_or_register(
            name,
            "gauge",
            || Metric::Gauge(Arc::new(Gauge::new())),
            |m| match m {
                Metric::Gauge(g) => Some(g.clone()),
                _ => None,
            },
        )
    }

    pub fn get_or_register_gauge_float(
        &self,
        name: &str,
    ) -> Result<Arc<GaugeFloat>, RegistryError> {
        self.get_or_register(
            name,
            "gauge_float",
            || Metric::GaugeFloat(Arc::new(GaugeFloat::new())),
            |m| match m {
                Metric::GaugeFloat(g) => Some(g.clone()),
                _ => None,
            },
        )
    }

    pub fn get_or_register_histogram(&self, name: &str) -> Result<Arc<Histogram>, RegistryError> {
        self.get_or_register(
            name,
            "histogram",
            || Metric::Histogram(Arc::new(Histogram::new())),
            |m| match m {
                Metric::Histogram(h) => Some(h.clone()),
                _ => None,
            },
        )
    }

    pub fn get_or_register_meter(&self, name: &str) -> Result<Arc<Meter>, RegistryError> {
        self.get_or_register(
            name,
            "meter",
            || Metric::Meter(Arc::new(Meter::new())),
            |m| match m {
                Metric::Meter(meter) => Some(meter.clone()),
                _ => None,
            },
        )
    }

    pub fn get_or_register_timer(&self, name: &str) -> Result<Arc<Timer>, RegistryError> {
        self.get_or_register(
            name,
            "timer",
            || Metric::Timer(Arc::new(Timer::new())),
            |m| match m {
                Metric::Timer(t) => Some(t.clone()),
                _ => None,
            },
        )
    }

    fn get_or_register<T>(
        &self,
        name: &str,
        requested: &'static str,
        make: impl FnOnce() -> Metric,
        pick: impl Fn(&Metric) -> Option<Arc<T>>,
    ) -> Result<Arc<T>, RegistryError> {
        if let Some(existing) = self.metrics.read().get(name) {
            return pick(existing).ok_or_else(|| RegistryError::KindMismatch {
                name: name.to_string(),
                existing: existing.kind(),
                requested,
            });
        }

        let mut metrics = self.metrics.write();
        let metric = metrics.entry(name.to_string()).or_insert_with(make);
        pick(metric).ok_or_else(|| RegistryError::KindMismatch {
            name: name.to_string(),
            existing: metric.kind(),
            requested,
        })
    }
}
