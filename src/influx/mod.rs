//! Translation of registry samples into InfluxDB measurements, and the
//! connection used to ship them.

pub mod aggregator;
pub mod client;
pub mod fields;
pub mod naming;
pub mod point;

pub use aggregator::PointAggregator;
pub use client::{Connection, Connector, HttpConnection, HttpConnector, PingInfo};
pub use point::{Batch, FieldValue, Measurement, Tags};
