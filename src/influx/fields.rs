//! Per-kind derivation of measurement fields from a metric sample.

use super::naming::field_name;
use super::point::FieldValue;
use crate::metrics::{HistogramSnapshot, MeterSnapshot, MetricSample};

/// Encoded `(field name, value)` pairs for one sample.
pub type Fields = Vec<(String, FieldValue)>;

/// Derive the fields a sample contributes, named under `prefix`.
///
/// | kind        | sub-prefix  | fields                                          |
/// |-------------|-------------|-------------------------------------------------|
/// | counter     |             | count                                           |
/// | gauge(s)    |             | gauge                                           |
/// | histogram   | `histogram` | count max mean min stddev variance p50..p9999   |
/// | meter       | `meter`     | count m1 m5 m15 mean                            |
/// | timer       | `timer`     | histogram fields + m1 m5 m15 meanrate           |
///
/// Unsupported samples yield nothing.
pub fn encode(prefix: &str, sample: &MetricSample) -> Fields {
    let mut fields = Fields::new();
    match sample {
        MetricSample::Counter { count } => {
            push(&mut fields, prefix, "count", FieldValue::Integer(*count));
        }
        MetricSample::Gauge { value } => {
            push(&mut fields, prefix, "gauge", FieldValue::Integer(*value));
        }
        MetricSample::GaugeFloat { value } => {
            push(&mut fields, prefix, "gauge", FieldValue::Float(*value));
        }
        MetricSample::Histogram(h) => {
            let prefix = field_name(prefix, "histogram");
            distribution(&mut fields, &prefix, h);
        }
        MetricSample::Meter(m) => {
            let prefix = field_name(prefix, "meter");
            push(&mut fields, &prefix, "count", FieldValue::Integer(m.count));
            rates(&mut fields, &prefix, m);
            push(&mut fields, &prefix, "mean", FieldValue::Float(m.mean));
        }
        MetricSample::Timer(t) => {
            let prefix = field_name(prefix, "timer");
            distribution(&mut fields, &prefix, &t.histogram);
            rates(&mut fields, &prefix, &t.meter);
            push(&mut fields, &prefix, "meanrate", FieldValue::Float(t.meter.mean));
        }
        MetricSample::Unsupported { .. } => {}
    }
    fields
}

fn push(fields: &mut Fields, prefix: &str, suffix: &str, value: FieldValue) {
    fields.push((field_name(prefix, suffix), value));
}

fn distribution(fields: &mut Fields, prefix: &str, h: &HistogramSnapshot) {
    push(fields, prefix, "count", FieldValue::from_u64(h.count));
    push(fields, prefix, "max", FieldValue::from_u64(h.max));
    push(fields, prefix, "mean", FieldValue::Float(h.mean));
    push(fields, prefix, "min", FieldValue::from_u64(h.min));
    push(fields, prefix, "stddev", FieldValue::Float(h.stddev));
    push(fields, prefix, "variance", FieldValue::Float(h.variance));
    for (suffix, value) in h.percentiles.labelled() {
        push(fields, prefix, suffix, FieldValue::Float(value));
    }
}

fn rates(fields: &mut Fields, prefix: &str, m: &MeterSnapshot) {
    push(fields, prefix, "m1", FieldValue::Float(m.m1));
    push(fields, prefix, "m5", FieldValue::Float(m.m5));
    push(fields, prefix, "m15", FieldValue::Float(m.m15));
}
