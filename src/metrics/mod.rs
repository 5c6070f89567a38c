//! In-memory metrics registry.
//!
//! Instruments are updated from anywhere in the process; the reporter reads
//! immutable [`MetricSample`]s out of the [`Registry`] once per flush.

pub mod histogram;
pub mod meter;
pub mod percentiles;
pub mod registry;
pub mod scalar;
pub mod timer;

use std::any::Any;
use std::fmt;
use std::sync::Arc;

pub use histogram::{Histogram, HistogramSnapshot};
pub use meter::{Meter, MeterSnapshot};
pub use percentiles::Percentiles;
pub use registry::Registry;
pub use scalar::{Counter, Gauge, GaugeFloat};
pub use timer::{Timer, TimerSnapshot};

/// A live instrument held by the registry.
#[derive(Clone)]
pub enum Metric {
    Counter(Arc<Counter>),
    Gauge(Arc<Gauge>),
    GaugeFloat(Arc<GaugeFloat>),
    Histogram(Arc<Histogram>),
    Meter(Arc<Meter>),
    Timer(Arc<Timer>),
    /// Anything else an application chose to register. Never reported.
    Other(Arc<dyn Any + Send + Sync>),
}

/// Read-only snapshot of one metric, taken at flush time.
#[derive(Debug, Clone, PartialEq)]
pub enum MetricSample {
    Counter { count: i64 },
    Gauge { value: i64 },
    GaugeFloat { value: f64 },
    Histogram(HistogramSnapshot),
    Meter(MeterSnapshot),
    Timer(TimerSnapshot),
    Unsupported { kind: &'static str },
}

impl Metric {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Counter(_) => "counter",
            Self::Gauge(_) => "gauge",
            Self::GaugeFloat(_) => "gauge_float",
            Self::Histogram(_) => "histogram",
            Self::Meter(_) => "meter",
            Self::Timer(_) => "timer",
            Self::Other(_) => "other",
        }
    }

    pub fn snapshot(&self) -> MetricSample {
        match self {
            Self::Counter(c) => MetricSample::Counter { count: c.count() },
            Self::Gauge(g) => MetricSample::Gauge { value: g.value() },
            Self::GaugeFloat(g) => MetricSample::GaugeFloat { value: g.value() },
            Self::Histogram(h) => MetricSample::Histogram(h.snapshot()),
            Self::Meter(m) => MetricSample::Meter(m.snapshot()),
            Self::Timer(t) => MetricSample::Timer(t.snapshot()),
            Self::Other(_) => MetricSample::Unsupported { kind: self.kind() },
        }
    }
}

impl fmt::Debug for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Metric").field(&self.kind()).finish()
    }
}

impl MetricSample {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Counter { .. } => "counter",
            Self::Gauge { .. } => "gauge",
            Self::GaugeFloat { .. } => "gauge_float",
            Self::Histogram(_) => "histogram",
            Self::Meter(_) => "meter",
            Self::Timer(_) => "timer",
            Self::Unsupported { kind } => *kind,
        }
    }
}
