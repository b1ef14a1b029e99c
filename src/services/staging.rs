//! The wide, schema-flexible `wellness` staging table.
//!
//! Columns are added on demand as new field keys show up; rows are upserted
//! under a content hash so staging the same archive twice is a no-op.

use crate::models::wellness::{FieldValue, RawRow};
use crate::utils::{quote_ident, table_columns};
use diesel::connection::SimpleConnection;
use diesel::prelude::*;
use diesel::sql_types::{BigInt, Double, Nullable, Text};
use diesel::sqlite::Sqlite;
use diesel::{sql_query, SqliteConnection};
use log::debug;
use sha1::{Digest, Sha1};
use std::collections::{BTreeMap, HashSet};

pub const STAGING_TABLE: &str = "wellness";

/// Per-run handle on the staging table. Caches the known column set so the
/// schema is only inspected once.
#[derive(Debug, Default)]
pub struct StagingTable {
    columns: Option<HashSet<String>>,
}

impl StagingTable {
    pub fn new() -> Self {
        Self::default()
    }

    fn ensure_columns<'a>(
        &mut self,
        conn: &mut SqliteConnection,
        keys: impl Iterator<Item = &'a String>,
    ) -> Result<(), String> {
        if self.columns.is_none() {
            conn.batch_execute(&format!(
                "CREATE TABLE IF NOT EXISTS {} (id TEXT PRIMARY KEY, date TEXT, last_timestamp TEXT, actual_timestamp INTEGER);",
                STAGING_TABLE
            ))
            .map_err(|e| format!("create staging table failed: {}", e))?;
            self.columns = Some(table_columns(conn, STAGING_TABLE)?);
        }
        let Some(columns) = self.columns.as_mut() else {
            return Ok(());
        };

        for key in keys {
            if columns.contains(key) {
                continue;
            }
            debug!("Staging: adding column {}", key);
            conn.batch_execute(&format!(
                "ALTER TABLE {} ADD COLUMN {};",
                STAGING_TABLE,
                quote_ident(key)
            ))
            .map_err(|e| format!("adding staging column {} failed: {}", key, e))?;
            columns.insert(key.clone());
        }
        Ok(())
    }

    /// Insert or replace one row, keyed by [`row_hash`].
    pub fn upsert(&mut self, conn: &mut SqliteConnection, row: &RawRow) -> Result<(), String> {
        self.ensure_columns(conn, row.fields.keys())?;

        let mut names = vec!["id", "date", "last_timestamp", "actual_timestamp"]
            .into_iter()
            .map(quote_ident)
            .collect::<Vec<_>>();
        names.extend(row.fields.keys().map(|k| quote_ident(k)));
        let placeholders = vec!["?"; names.len()].join(", ");
        let sql = format!(
            "INSERT OR REPLACE INTO {} ({}) VALUES ({})",
            STAGING_TABLE,
            names.join(", "),
            placeholders
        );

        let mut query = sql_query(sql)
            .into_boxed::<Sqlite>()
            .bind::<Text, _>(row_hash(row))
            .bind::<Text, _>(row.date_key())
            .bind::<Nullable<Text>, _>(row.last_timestamp.as_ref().map(FieldValue::format_timestamp))
            .bind::<Nullable<BigInt>, _>(row.actual_timestamp);
        for value in row.fields.values() {
            query = match value {
                FieldValue::Int(v) => query.bind::<BigInt, _>(*v),
                FieldValue::Float(v) if v.is_finite() => query.bind::<Double, _>(*v),
                FieldValue::Float(_) | FieldValue::Null => query.bind::<Nullable<Text>, _>(None::<String>),
                FieldValue::Text(s) => query.bind::<Text, _>(s.clone()),
                FieldValue::Timestamp(ts) => query.bind::<Text, _>(FieldValue::format_timestamp(ts)),
                FieldValue::List(_) => query.bind::<Text, _>(list_text(value)),
            };
        }

        query
            .execute(conn)
            .map(|_| ())
            .map_err(|e| format!("upsert into staging failed: {}", e))
    }

    /// Refresh planner statistics after a batch of upserts.
    pub fn analyze(&self, conn: &mut SqliteConnection) -> Result<(), String> {
        if self.columns.is_none() {
            return Ok(());
        }
        conn.batch_execute(&format!("ANALYZE {};", STAGING_TABLE))
            .map_err(|e| format!("analyze staging failed: {}", e))
    }
}

fn list_text(value: &FieldValue) -> String {
    serde_json::to_string(value).unwrap_or_default()
}

/// Deterministic content hash of a row: SHA-1 over its canonical JSON form
/// (keys sorted, reserved columns included).
pub fn row_hash(row: &RawRow) -> String {
    let mut canonical: BTreeMap<&str, serde_json::Value> = BTreeMap::new();
    canonical.insert("date", serde_json::Value::String(row.date_key()));
    canonical.insert(
        "last_timestamp",
        row.last_timestamp
            .as_ref()
            .map(|ts| serde_json::Value::String(FieldValue::format_timestamp(ts)))
            .unwrap_or(serde_json::Value::Null),
    );
    canonical.insert(
        "actual_timestamp",
        row.actual_timestamp
            .map(serde_json::Value::from)
            .unwrap_or(serde_json::Value::Null),
    );
    for (key, value) in &row.fields {
        canonical.insert(key.as_str(), serde_json::to_value(value).unwrap_or(serde_json::Value::Null));
    }

    let bytes = serde_json::to_vec(&canonical).unwrap_or_default();
    let mut hasher = Sha1::new();
    hasher.update(&bytes);
    format!("{:x}", hasher.finalize())
}
