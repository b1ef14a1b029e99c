//! Fixtures shared by the unit tests.

use crate::archive::ArchiveError;
use crate::client::{ArchiveSource, GarminClientError};
use crate::db::connection::{apply_migrations, connect};
use crate::models::wellness::{Field, FieldValue, RecordStream, FIT_EPOCH_OFFSET};
use chrono::{NaiveDate, TimeZone, Utc};
use diesel::dsl::sql;
use diesel::prelude::*;
use diesel::sql_types::BigInt;
use diesel::SqliteConnection;
use std::cell::RefCell;
use std::collections::BTreeMap;

/// Fresh in-memory store with the fixed tables migrated.
pub fn memory_db() -> SqliteConnection {
    let mut conn = connect(":memory:").expect("open in-memory sqlite");
    apply_migrations(&mut conn).expect("apply migrations");
    conn
}

pub enum Canned {
    Streams(Vec<RecordStream>),
    Absent,
    Transport,
    Auth,
    /// Archive downloaded but not decodable.
    Corrupt,
    ServerError,
}

/// In-memory source that records which days were requested.
pub struct FakeSource {
    pub days: BTreeMap<NaiveDate, Canned>,
    pub requested: RefCell<Vec<NaiveDate>>,
}

impl FakeSource {
    pub fn new() -> Self {
        FakeSource {
            days: BTreeMap::new(),
            requested: RefCell::new(Vec::new()),
        }
    }

    pub fn with(mut self, day: NaiveDate, canned: Canned) -> Self {
        self.days.insert(day, canned);
        self
    }
}

impl ArchiveSource for FakeSource {
    fn fetch_day(&self, day: NaiveDate) -> Result<Option<Vec<RecordStream>>, GarminClientError> {
        self.requested.borrow_mut().push(day);
        match self.days.get(&day) {
            Some(Canned::Streams(streams)) => Ok(Some(streams.clone())),
            Some(Canned::Transport) => Err(GarminClientError::Transport("connection refused".into())),
            Some(Canned::Auth) => Err(GarminClientError::Auth("http 401".into())),
            Some(Canned::Corrupt) => Err(GarminClientError::Archive(ArchiveError::Fit {
                entry: "wellness.fit".into(),
                message: "crc mismatch".into(),
            })),
            Some(Canned::ServerError) => Err(GarminClientError::Http {
                status: 500,
                message: "internal error".into(),
            }),
            Some(Canned::Absent) | None => Ok(None),
        }
    }
}

/// One stream: a reference record followed by heart-rate samples one minute apart.
pub fn heart_rate_stream(day: NaiveDate, bpms: &[i64]) -> RecordStream {
    let reference = Utc.from_utc_datetime(&day.and_hms_opt(0, 0, 0).unwrap());
    let raw = reference.timestamp() - FIT_EPOCH_OFFSET;
    let mut records = vec![vec![Field {
        name: "timestamp".into(),
        units: None,
        value: FieldValue::Timestamp(reference),
        raw_value: Some(raw),
    }]];
    for (i, bpm) in bpms.iter().enumerate() {
        let counter = (raw + 60 * (i as i64 + 1)) & 0xFFFF;
        records.push(vec![
            Field {
                name: "timestamp_16".into(),
                units: Some("s".into()),
                value: FieldValue::Int(counter),
                raw_value: Some(counter),
            },
            Field {
                name: "heart_rate".into(),
                units: Some("bpm".into()),
                value: FieldValue::Int(*bpm),
                raw_value: Some(*bpm),
            },
        ]);
    }
    records
}

pub fn count(conn: &mut SqliteConnection, table: &str) -> i64 {
    diesel::select(sql::<BigInt>(&format!("(SELECT COUNT(*) FROM {})", table)))
        .get_result(conn)
        .unwrap()
}

