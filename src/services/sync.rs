use crate::client::ArchiveSource;
use crate::services::coverage::CoverageIndex;
use crate::services::ingest::{ingest_day, Outcome};
use crate::services::staging::StagingTable;
use chrono::NaiveDate;
use diesel::SqliteConnection;
use log::{debug, info};

/// Per-run tally of what happened to each day in range.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub considered: usize,
    /// Already covered; never attempted.
    pub skipped: usize,
    pub ingested: usize,
    pub missing: usize,
    pub rows: usize,
}

/// Walk `start..=end` in order, fetching every day not yet covered.
///
/// The coverage cache and staging handle live for this call only.
pub fn run<S: ArchiveSource + ?Sized>(
    conn: &mut SqliteConnection,
    source: &S,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<SyncReport, String> {
    let mut report = SyncReport::default();
    if start > end {
        info!("Sync: start {} is after end {}; nothing to do", start, end);
        return Ok(report);
    }

    let mut coverage = CoverageIndex::new();
    let mut staging = StagingTable::new();
    info!(
        "Sync: {} day(s) from {} to {}",
        end.signed_duration_since(start).num_days() + 1,
        start,
        end
    );

    for day in start.iter_days().take_while(|d| *d <= end) {
        report.considered += 1;
        if coverage.covered(conn, day)? {
            debug!("Sync: {} already covered; skipping", day);
            report.skipped += 1;
            continue;
        }

        info!("Sync: fetching {}", day);
        match ingest_day(conn, source, &mut staging, day)? {
            Outcome::Ingested { rows } => {
                report.ingested += 1;
                report.rows += rows;
            }
            Outcome::Missing(_) => report.missing += 1,
        }
    }

    info!(
        "Sync complete ({} day(s) considered, {} skipped, {} ingested, {} missing, {} row(s) staged)",
        report.considered, report.skipped, report.ingested, report.missing, report.rows
    );
    Ok(report)
}
