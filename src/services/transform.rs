//! Split the wide staging table into the typed heart-rate, stress and
//! activity tables, then drop it.
//!
//! Safe to repeat: without a staging table this is a no-op, and typed inserts
//! ignore rows already present from an earlier (possibly interrupted) run.

use crate::services::staging::STAGING_TABLE;
use crate::utils::{has_table, quote_ident, table_columns, vacuum};
use diesel::connection::SimpleConnection;
use diesel::prelude::*;
use diesel::{sql_query, SqliteConnection};
use log::{debug, info};
use std::collections::HashSet;

const HEART_RATE_COLUMN: &str = "heart_rate (bpm)";
const STRESS_VALUE_COLUMN: &str = "stress_level_value";
const STRESS_TIME_COLUMN: &str = "stress_level_time";
const ACTIVITY_TYPE_COLUMN: &str = "activity_type";
const STEPS_COLUMN: &str = "steps (steps)";
const DISTANCE_COLUMN: &str = "distance (m)";
const RECORD_TIMESTAMP_COLUMN: &str = "timestamp";
const ACTUAL_TIMESTAMP_COLUMN: &str = "actual_timestamp";

/// Rows newly inserted per typed table by one [`migrate`] call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransformReport {
    pub heart_rate: usize,
    pub stress_level: usize,
    pub activity: usize,
}

/// Returns `None` when there was no staging table to migrate.
pub fn migrate(conn: &mut SqliteConnection) -> Result<Option<TransformReport>, String> {
    if !has_table(conn, STAGING_TABLE)? {
        debug!("Transform: no staging table; nothing to migrate");
        return Ok(None);
    }

    let columns = table_columns(conn, STAGING_TABLE)?;
    let statements = [
        ("heart_rate", heart_rate_sql(&columns)),
        ("stress_level", stress_level_sql(&columns)),
        ("activity", activity_sql(&columns)),
    ];

    let report = conn
        .transaction::<TransformReport, diesel::result::Error, _>(|conn| {
            let mut report = TransformReport::default();
            for (table, sql) in &statements {
                let Some(sql) = sql else {
                    debug!("Transform: staging has no source columns for {}; skipping", table);
                    continue;
                };
                let inserted = sql_query(sql.as_str()).execute(conn)?;
                match *table {
                    "heart_rate" => report.heart_rate = inserted,
                    "stress_level" => report.stress_level = inserted,
                    _ => report.activity = inserted,
                }
            }
            conn.batch_execute(&format!("DROP TABLE {};", quote_ident(STAGING_TABLE)))?;
            Ok(report)
        })
        .map_err(|e| format!("transform of staging table failed: {}", e))?;

    vacuum(conn)?;
    info!(
        "Transform: migrated staging table (heart_rate +{}, stress_level +{}, activity +{})",
        report.heart_rate, report.stress_level, report.activity
    );
    Ok(Some(report))
}

fn has_all(columns: &HashSet<String>, required: &[&str]) -> bool {
    required.iter().all(|c| columns.contains(*c))
}

fn column_or_null(columns: &HashSet<String>, column: &str) -> String {
    if columns.contains(column) {
        quote_ident(column)
    } else {
        "NULL".to_string()
    }
}

// `WHERE` is mandatory before `ON CONFLICT` in INSERT … SELECT, or SQLite
// parses the upsert clause as a join constraint.

fn heart_rate_sql(columns: &HashSet<String>) -> Option<String> {
    if !has_all(columns, &[HEART_RATE_COLUMN, ACTUAL_TIMESTAMP_COLUMN]) {
        return None;
    }
    let bpm = quote_ident(HEART_RATE_COLUMN);
    Some(format!(
        "INSERT INTO heart_rate (unix_timestamp, heart_rate) \
         SELECT CAST(actual_timestamp AS INTEGER), CAST({bpm} AS INTEGER) FROM {staging} \
         WHERE {bpm} IS NOT NULL AND {bpm} <> 0 AND actual_timestamp IS NOT NULL \
         ORDER BY 1 DESC \
         ON CONFLICT DO NOTHING",
        bpm = bpm,
        staging = quote_ident(STAGING_TABLE),
    ))
}

fn stress_level_sql(columns: &HashSet<String>) -> Option<String> {
    if !has_all(columns, &[STRESS_VALUE_COLUMN, STRESS_TIME_COLUMN]) {
        return None;
    }
    let value = quote_ident(STRESS_VALUE_COLUMN);
    let time = quote_ident(STRESS_TIME_COLUMN);
    Some(format!(
        "INSERT INTO stress_level (unix_timestamp, stress_level) \
         SELECT CAST(strftime('%s', {time}) AS INTEGER), CAST({value} AS INTEGER) FROM {staging} \
         WHERE {value} IS NOT NULL AND {time} IS NOT NULL AND strftime('%s', {time}) IS NOT NULL \
         ORDER BY 1 DESC \
         ON CONFLICT DO NOTHING",
        value = value,
        time = time,
        staging = quote_ident(STAGING_TABLE),
    ))
}

fn activity_sql(columns: &HashSet<String>) -> Option<String> {
    if !columns.contains(ACTIVITY_TYPE_COLUMN) {
        return None;
    }
    let record_ts = columns
        .contains(RECORD_TIMESTAMP_COLUMN)
        .then(|| format!("CAST(strftime('%s', {}) AS INTEGER)", quote_ident(RECORD_TIMESTAMP_COLUMN)));
    let actual_ts = columns
        .contains(ACTUAL_TIMESTAMP_COLUMN)
        .then(|| "CAST(actual_timestamp AS INTEGER)".to_string());
    let ts = match (actual_ts, record_ts) {
        (Some(a), Some(r)) => format!("COALESCE({}, {})", a, r),
        (Some(t), None) | (None, Some(t)) => t,
        (None, None) => return None,
    };

    Some(format!(
        "INSERT INTO activity (unix_timestamp, steps, distance, activity_type) \
         SELECT {ts}, {steps}, {distance}, {kind} FROM {staging} \
         WHERE {kind} IS NOT NULL AND {ts} IS NOT NULL \
         ORDER BY 1 DESC \
         ON CONFLICT DO NOTHING",
        ts = ts,
        steps = column_or_null(columns, STEPS_COLUMN),
        distance = column_or_null(columns, DISTANCE_COLUMN),
        kind = quote_ident(ACTIVITY_TYPE_COLUMN),
        staging = quote_ident(STAGING_TABLE),
    ))
}
