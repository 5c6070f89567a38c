//! Measurements, batches and their InfluxDB line protocol encoding.
//!
//! ```text
//! measurement,tag1=val1,tag2=val2 field1=1i,field2=0.5 timestamp_ns
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};

/// Tag set shared by every measurement of a flush.
pub type Tags = BTreeMap<String, String>;

/// A numeric field value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FieldValue {
    Integer(i64),
    Float(f64),
}

impl FieldValue {
    /// Clamp an unsigned count into the signed integer field type.
    pub fn from_u64(v: u64) -> Self {
        Self::Integer(i64::try_from(v).unwrap_or(i64::MAX))
    }

    /// NaN and infinities cannot be written as line protocol.
    pub fn is_encodable(&self) -> bool {
        match self {
            Self::Integer(_) => true,
            Self::Float(v) => v.is_finite(),
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Integer(v) => write!(f, "{v}i"),
            Self::Float(v) => write!(f, "{v}"),
        }
    }
}

/// One named, tagged, timestamped bucket of fields.
#[derive(Debug, Clone, PartialEq)]
pub struct Measurement {
    pub name: String,
    pub tags: Arc<Tags>,
    pub timestamp: DateTime<Utc>,
    pub fields: BTreeMap<String, FieldValue>,
}

/// Everything produced by one flush, bound for one database.
#[derive(Debug, Clone, PartialEq)]
pub struct Batch {
    pub database: String,
    pub measurements: Vec<Measurement>,
}

impl Measurement {
    pub fn new(name: impl Into<String>, tags: Arc<Tags>, timestamp: DateTime<Utc>) -> Self {
        Self {
            name: name.into(),
            tags,
            timestamp,
            fields: BTreeMap::new(),
        }
    }

    /// Encode as a single line, or `None` if no field is encodable.
    pub fn to_line_protocol(&self) -> Option<String> {
        let mut fields = self.fields.iter().filter(|(_, v)| v.is_encodable()).peekable();
        fields.peek()?;

        let mut line = escape_measurement(&self.name);

        // BTreeMap keeps tags sorted by key; InfluxDB rejects empty tag values
        for (key, value) in self.tags.iter().filter(|(k, v)| !k.is_empty() && !v.is_empty()) {
            line.push(',');
            line.push_str(&escape_key(key));
            line.push('=');
            line.push_str(&escape_key(value));
        }

        line.push(' ');
        for (i, (key, value)) in fields.enumerate() {
            if i > 0 {
                line.push(',');
            }
            line.push_str(&escape_key(key));
            line.push('=');
            line.push_str(&value.to_string());
        }

        line.push(' ');
        line.push_str(&timestamp_nanos(&self.timestamp).to_string());
        Some(line)
    }
}

impl Batch {
    pub fn new(database: impl Into<String>) -> Self {
        Self {
            database: database.into(),
            measurements: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.measurements.is_empty()
    }

    pub fn len(&self) -> usize {
        self.measurements.len()
    }

    pub fn get(&self, name: &str) -> Option<&Measurement> {
        self.measurements.iter().find(|m| m.name == name)
    }

    /// Newline-separated line protocol for the whole batch.
    pub fn to_line_protocol(&self) -> String {
        self.measurements
            .iter()
            .filter_map(Measurement::to_line_protocol)
            .collect::<Vec<_>>()
            .join("\n")
    }
}

fn timestamp_nanos(ts: &DateTime<Utc>) -> i64 {
    ts.timestamp_nanos_opt().unwrap_or(i64::MAX)
}

/// Measurement names escape commas and spaces. A raw newline would end the
/// line, so it is written as `\n`.
fn escape_measurement(s: &str) -> String {
    s.replace(',', "\\,")
        .replace(' ', "\\ ")
        .replace('\n', "\\n")
}

/// Tag keys, tag values and field keys also escape `=`.
fn escape_key(s: &str) -> String {
    s.replace(',', "\\,")
        .replace('=', "\\=")
        .replace(' ', "\\ ")
        .replace('\n', "\\n")
}
