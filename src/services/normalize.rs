//! Flatten decoded record streams into wide staging rows.

use crate::models::wellness::{Field, RawRow, TIMESTAMP_16_FIELD, TIMESTAMP_FIELD, FIT_EPOCH_OFFSET};
use crate::services::timestamp::reconcile;
use chrono::{DateTime, NaiveDate, Utc};
use log::debug;
use std::collections::BTreeMap;

/// Staging columns that are always present and never taken from a record.
pub const RESERVED_COLUMNS: [&str; 4] = ["id", "date", "last_timestamp", "actual_timestamp"];

/// Lazy adapter yielding one [`RawRow`] per record of a single stream.
///
/// The most recent full reference timestamp is carried across records; it is
/// never reset until the stream ends.
pub struct Normalizer<I> {
    day: NaiveDate,
    records: I,
    last_timestamp: Option<DateTime<Utc>>,
    last_timestamp_raw: Option<i64>,
}

/// Normalize one record stream captured on `day`.
pub fn normalize<I, R>(day: NaiveDate, records: I) -> Normalizer<I::IntoIter>
where
    I: IntoIterator<Item = R>,
    R: IntoIterator<Item = Field>,
{
    Normalizer {
        day,
        records: records.into_iter(),
        last_timestamp: None,
        last_timestamp_raw: None,
    }
}

impl<I, R> Iterator for Normalizer<I>
where
    I: Iterator<Item = R>,
    R: IntoIterator<Item = Field>,
{
    type Item = RawRow;

    fn next(&mut self) -> Option<RawRow> {
        let record = self.records.next()?;
        let mut counter_raw: Option<i64> = None;
        let mut fields = BTreeMap::new();

        for field in record {
            match field.name.as_str() {
                TIMESTAMP_FIELD => {
                    self.last_timestamp = field.value.as_timestamp();
                    self.last_timestamp_raw = field.raw_value;
                }
                TIMESTAMP_16_FIELD => counter_raw = field.raw_value,
                _ => {}
            }
            let key = field.key();
            if RESERVED_COLUMNS.contains(&key.as_str()) {
                debug!("Normalize: dropping field '{}' shadowed by a staging column", key);
                continue;
            }
            fields.insert(key, field.value);
        }

        // Reconcile against the device-native encodings, not the decoded values.
        let actual_timestamp = match (self.last_timestamp_raw, counter_raw) {
            (Some(reference), Some(counter)) => Some(reconcile(reference + FIT_EPOCH_OFFSET, counter, false)),
            _ => None,
        };

        Some(RawRow {
            date: self.day,
            last_timestamp: self.last_timestamp,
            actual_timestamp,
            fields,
        })
    }
}
