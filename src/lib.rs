//! Periodically drains an in-memory metrics registry into InfluxDB.
//!
//! ```text
//! Registry ──each──▶ naming::split ──▶ fields::encode ──▶ PointAggregator ──▶ Batch
//!                                                                              │
//!                         Reporter (flush tick / ping tick, one at a time) ◀───┘
//!                                              │
//!                                              ▼
//!                                  Connection::write / ping
//! ```

pub mod config;
pub mod error;
pub mod influx;
pub mod logging;
pub mod metrics;
pub mod reporter;
pub mod workload;

pub use config::ReporterConfig;
pub use error::{ConfigError, RegistryError, SetupError, TransportError, WorkloadError};
pub use metrics::Registry;
pub use reporter::{Health, Reporter};
