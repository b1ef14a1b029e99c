//! Day archives: a zip container holding one FIT stream per entry.
//!
//! Each stream is decoded with `fitparser` and adapted into the crate's
//! [`Field`] model, keeping both the decoded value and the device-native
//! integer encoding.

use crate::models::wellness::{Field, FieldValue, Record, RecordStream, FIT_EPOCH_OFFSET};
use chrono::Utc;
use fitparser::{FitDataField, Value};
use std::fmt::{Display, Formatter};
use std::fs::File;
use std::io::Read;
use std::path::Path;

#[derive(Debug)]
pub enum ArchiveError {
    Io(std::io::Error),
    Zip(zip::result::ZipError),
    /// A stream inside the archive is not decodable FIT data.
    Fit { entry: String, message: String },
}

impl Display for ArchiveError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ArchiveError::Io(e) => write!(f, "io error: {}", e),
            ArchiveError::Zip(e) => write!(f, "zip error: {}", e),
            ArchiveError::Fit { entry, message } => write!(f, "fit decode error in {}: {}", entry, message),
        }
    }
}

impl std::error::Error for ArchiveError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ArchiveError::Io(e) => Some(e),
            ArchiveError::Zip(e) => Some(e),
            ArchiveError::Fit { .. } => None,
        }
    }
}

impl From<std::io::Error> for ArchiveError {
    fn from(value: std::io::Error) -> Self {
        ArchiveError::Io(value)
    }
}

impl From<zip::result::ZipError> for ArchiveError {
    fn from(value: zip::result::ZipError) -> Self {
        ArchiveError::Zip(value)
    }
}

/// Decode every stream of the archive at `path`, in entry order.
pub fn read_archive(path: &Path) -> Result<Vec<RecordStream>, ArchiveError> {
    let mut archive = zip::ZipArchive::new(File::open(path)?)?;
    let mut streams = Vec::with_capacity(archive.len());

    for index in 0..archive.len() {
        let mut entry = archive.by_index(index)?;
        if entry.is_dir() {
            continue;
        }
        let name = entry.name().to_string();
        let mut bytes = Vec::new();
        entry.read_to_end(&mut bytes)?;
        streams.push(decode_stream(&name, &bytes)?);
    }

    Ok(streams)
}

pub fn decode_stream(entry: &str, bytes: &[u8]) -> Result<RecordStream, ArchiveError> {
    let records = fitparser::from_bytes(bytes).map_err(|e| ArchiveError::Fit {
        entry: entry.to_string(),
        message: e.to_string(),
    })?;

    Ok(records
        .iter()
        .map(|record| record.fields().iter().map(adapt_field).collect::<Record>())
        .collect())
}

fn adapt_field(field: &FitDataField) -> Field {
    field_from_parts(field.name(), field.units(), field.value())
}

fn field_from_parts(name: &str, units: &str, value: &Value) -> Field {
    let (value, raw_value) = adapt_value(value);
    // date-time fields keep their bare name as the staging key
    let units = match value {
        FieldValue::Timestamp(_) => None,
        _ if units.is_empty() => None,
        _ => Some(units.to_string()),
    };
    Field {
        name: name.to_string(),
        units,
        value,
        raw_value,
    }
}

/// Decoded value plus the native integer encoding where one exists.
fn adapt_value(value: &Value) -> (FieldValue, Option<i64>) {
    match value {
        Value::Timestamp(ts) => {
            let utc = ts.with_timezone(&Utc);
            (FieldValue::Timestamp(utc), Some(utc.timestamp() - FIT_EPOCH_OFFSET))
        }
        Value::Byte(v) | Value::Enum(v) | Value::UInt8(v) | Value::UInt8z(v) => int(*v as i64),
        Value::SInt8(v) => int(*v as i64),
        Value::SInt16(v) => int(*v as i64),
        Value::UInt16(v) | Value::UInt16z(v) => int(*v as i64),
        Value::SInt32(v) => int(*v as i64),
        Value::UInt32(v) | Value::UInt32z(v) => int(*v as i64),
        Value::SInt64(v) => int(*v),
        Value::UInt64(v) | Value::UInt64z(v) => match i64::try_from(*v) {
            Ok(v) => int(v),
            Err(_) => (FieldValue::Float(*v as f64), None),
        },
        Value::Float32(v) => (FieldValue::Float(*v as f64), None),
        Value::Float64(v) => (FieldValue::Float(*v), None),
        Value::String(s) => (FieldValue::Text(s.clone()), None),
        Value::Array(items) => (
            FieldValue::List(items.iter().map(|item| adapt_value(item).0).collect()),
            None,
        ),
        #[allow(unreachable_patterns)]
        _ => (FieldValue::Null, None),
    }
}

fn int(v: i64) -> (FieldValue, Option<i64>) {
    (FieldValue::Int(v), Some(v))
}
