//! Decoded wellness records as handed over by the archive decoder, and the
//! wide staging rows produced from them.

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

/// Seconds between the UNIX epoch and the device epoch (1989-12-31T00:00:00Z).
pub const FIT_EPOCH_OFFSET: i64 = 631_065_600;

/// Field carrying the most recent full reference timestamp.
pub const TIMESTAMP_FIELD: &str = "timestamp";
/// Field carrying the truncated 16-bit rolling counter.
pub const TIMESTAMP_16_FIELD: &str = "timestamp_16";

/// A decoded, human-readable field value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    Int(i64),
    Float(f64),
    Text(String),
    Timestamp(DateTime<Utc>),
    List(Vec<FieldValue>),
    Null,
}

impl FieldValue {
    pub fn as_timestamp(&self) -> Option<DateTime<Utc>> {
        match self {
            FieldValue::Timestamp(ts) => Some(*ts),
            _ => None,
        }
    }

    /// Representation stored in SQLite text columns; matches what `datetime()`
    /// and `strftime()` accept.
    pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
        ts.format("%Y-%m-%d %H:%M:%S").to_string()
    }
}

/// One named field of a record.
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub name: String,
    pub units: Option<String>,
    pub value: FieldValue,
    /// Device-native integer encoding, when the field has one.
    pub raw_value: Option<i64>,
}

impl Field {
    /// Staging column key: `name`, or `name (units)` when a unit is present.
    pub fn key(&self) -> String {
        match self.units.as_deref() {
            Some(units) if !units.is_empty() => format!("{} ({})", self.name, units),
            _ => self.name.clone(),
        }
    }
}

/// One decoded unit of telemetry, fields in wire order.
pub type Record = Vec<Field>;

/// All records of one binary stream inside a day archive.
pub type RecordStream = Vec<Record>;

/// Wide staging row, one per decoded record.
#[derive(Debug, Clone, PartialEq)]
pub struct RawRow {
    pub date: NaiveDate,
    pub last_timestamp: Option<DateTime<Utc>>,
    /// Reconciled UNIX timestamp, present when the record carried a counter
    /// and a reference had been seen earlier in the stream.
    pub actual_timestamp: Option<i64>,
    pub fields: BTreeMap<String, FieldValue>,
}

impl RawRow {
    pub fn date_key(&self) -> String {
        self.date.format("%Y-%m-%d").to_string()
    }
}
