//! Folds every registered metric into one measurement per final name.

use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};

use super::fields;
use super::naming::{normalize_prefix, split};
use super::point::{Batch, Measurement, Tags};
use crate::metrics::{MetricSample, Registry};

/// Folds a registry drain into one measurement per final measurement name.
#[derive(Debug, Clone)]
pub struct PointAggregator {
    database: String,
    prefix: String,
    tags: Arc<Tags>,
}

impl PointAggregator {
    /// `prefix` gets a trailing `_` if it is non-empty and lacks one.
    pub fn new(database: impl Into<String>, prefix: &str, tags: Tags) -> Self {
        Self {
            database: database.into(),
            prefix: normalize_prefix(prefix),
            tags: Arc::new(tags),
        }
    }

    pub fn database(&self) -> &str {
        &self.database
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Same database and prefix, different tag set.
    pub fn with_tags(self, tags: Tags) -> Self {
        Self {
            tags: Arc::new(tags),
            ..self
        }
    }

    /// Drain `registry` into a batch stamped with `timestamp`.
    pub fn aggregate(&self, registry: &Registry, timestamp: DateTime<Utc>) -> Batch {
        let mut buckets: BTreeMap<String, Measurement> = BTreeMap::new();
        registry.each(|name, metric| {
            self.add(&mut buckets, name, &metric.snapshot(), timestamp);
        });

        Batch {
            database: self.database.clone(),
            measurements: buckets.into_values().collect(),
        }
    }

    fn add(
        &self,
        buckets: &mut BTreeMap<String, Measurement>,
        name: &str,
        sample: &MetricSample,
        timestamp: DateTime<Utc>,
    ) {
        let (measurement, field_prefix) = split(name);
        let encoded = fields::encode(&field_prefix, sample);
        if encoded.is_empty() {
            tracing::warn!(metric = name, kind = sample.kind(), "metric kind not reported, skipping");
            return;
        }

        let measurement = format!("{}{}", self.prefix, measurement);
        let point = buckets
            .entry(measurement)
            .or_insert_with_key(|key| Measurement::new(key.clone(), self.tags.clone(), timestamp));

        for (field, value) in encoded {
            match point.fields.entry(field) {
                Entry::Vacant(slot) => {
                    slot.insert(value);
                }
                Entry::Occupied(mut slot) => {
                    tracing::warn!(
                        metric = name,
                        measurement = %point.name,
                        field = %slot.key(),
                        "field written by more than one metric, keeping the last value"
                    );
                    slot.insert(value);
                }
            }
        }
    }
}
