//! Diesel model structs for the fixed-schema output tables.
//!
//! The typed tables carry uniqueness indexes on their natural keys, so every
//! writer inserts with conflict-ignore semantics.

use diesel::prelude::*;
use serde::{Deserialize, Serialize};

use crate::schema;

/// A day whose archive could not be obtained. Acts as a negative cache entry.
#[derive(Debug, Clone, PartialEq, Eq, Queryable, Selectable, Insertable, Serialize, Deserialize)]
#[diesel(table_name = schema::missing)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct MissingDay {
    /// `YYYY-MM-DD`
    pub date: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Queryable, Selectable, Insertable, Serialize, Deserialize)]
#[diesel(table_name = schema::heart_rate)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct HeartRateSample {
    pub unix_timestamp: i64,
    #[diesel(column_name = bpm)]
    pub heart_rate: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Queryable, Selectable, Insertable, Serialize, Deserialize)]
#[diesel(table_name = schema::stress_level)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct StressSample {
    pub unix_timestamp: i64,
    #[diesel(column_name = level)]
    pub stress_level: i64,
}

#[derive(Debug, Clone, PartialEq, Queryable, Selectable, Insertable, Serialize, Deserialize)]
#[diesel(table_name = schema::activity)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct ActivitySample {
    pub unix_timestamp: i64,
    pub steps: Option<i64>,
    /// Metres.
    pub distance: Option<f64>,
    pub activity_type: String,
}
