//! Drop the trailing window of recent days so they are fetched again.
//!
//! Recent days may still be incomplete server-side; deleting them forces the
//! next sync to treat them as uncovered.

use crate::schema;
use crate::services::staging::STAGING_TABLE;
use crate::utils::{has_table, quote_ident};
use chrono::{Days, NaiveDate, NaiveTime};
use diesel::prelude::*;
use diesel::sql_types::Text;
use diesel::{sql_query, SqliteConnection};
use log::info;

/// Rows deleted per table by one [`prune`] call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PruneReport {
    pub missing: usize,
    pub staging: usize,
    pub heart_rate: usize,
    pub stress_level: usize,
    pub activity: usize,
}

impl PruneReport {
    pub fn total(&self) -> usize {
        self.missing + self.staging + self.heart_rate + self.stress_level + self.activity
    }
}

/// `today - retention_days`
pub fn boundary(today: NaiveDate, retention_days: u32) -> NaiveDate {
    today
        .checked_sub_days(Days::new(retention_days as u64))
        .unwrap_or(NaiveDate::MIN)
}

/// Delete every row whose UTC date is strictly after `boundary`.
pub fn prune(conn: &mut SqliteConnection, boundary: NaiveDate) -> Result<PruneReport, String> {
    use schema::activity::dsl as A;
    use schema::heart_rate::dsl as H;
    use schema::missing::dsl as M;
    use schema::stress_level::dsl as S;

    let boundary_key = boundary.format("%Y-%m-%d").to_string();
    // first second of the day after the boundary
    let cutoff = boundary
        .succ_opt()
        .map(|d| d.and_time(NaiveTime::MIN).and_utc().timestamp())
        .unwrap_or(i64::MAX);

    let mut report = PruneReport::default();

    report.missing = diesel::delete(M::missing.filter(M::date.gt(&boundary_key)))
        .execute(conn)
        .map_err(|e| format!("prune missing failed: {}", e))?;
    report.heart_rate = diesel::delete(H::heart_rate.filter(H::unix_timestamp.ge(cutoff)))
        .execute(conn)
        .map_err(|e| format!("prune heart_rate failed: {}", e))?;
    report.stress_level = diesel::delete(S::stress_level.filter(S::unix_timestamp.ge(cutoff)))
        .execute(conn)
        .map_err(|e| format!("prune stress_level failed: {}", e))?;
    report.activity = diesel::delete(A::activity.filter(A::unix_timestamp.ge(cutoff)))
        .execute(conn)
        .map_err(|e| format!("prune activity failed: {}", e))?;

    if has_table(conn, STAGING_TABLE)? {
        report.staging = sql_query(format!("DELETE FROM {} WHERE date > ?", quote_ident(STAGING_TABLE)))
            .bind::<Text, _>(&boundary_key)
            .execute(conn)
            .map_err(|e| format!("prune staging failed: {}", e))?;
    }

    info!(
        "Retention: removed {} row(s) dated after {} (missing={}, staging={}, heart_rate={}, stress_level={}, activity={})",
        report.total(),
        boundary_key,
        report.missing,
        report.staging,
        report.heart_rate,
        report.stress_level,
        report.activity
    );
    Ok(report)
}
