use crate::client::{ArchiveSource, GarminClientError};
use crate::db::models::MissingDay;
use crate::schema;
use crate::services::normalize::normalize;
use crate::services::staging::StagingTable;
use chrono::NaiveDate;
use diesel::prelude::*;
use diesel::SqliteConnection;
use log::{debug, info, warn};

/// Why a day ended up recorded as missing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MissingReason {
    /// The remote source could not be reached; not retried within the run.
    TransportFailure(String),
    /// The provider completed without producing an archive.
    ArchiveAbsent,
    /// The provider answered with an error status, or the archive it sent
    /// could not be decoded.
    Unusable(String),
}

/// Result of ingesting a single day.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Ingested { rows: usize },
    Missing(MissingReason),
}

/// Fetch one day and stage its records, or record the day as missing.
pub fn ingest_day<S: ArchiveSource + ?Sized>(
    conn: &mut SqliteConnection,
    source: &S,
    staging: &mut StagingTable,
    day: NaiveDate,
) -> Result<Outcome, String> {
    let streams = match source.fetch_day(day) {
        Ok(Some(streams)) => streams,
        Ok(None) => {
            info!("Ingest: no archive for {}; recording as missing", day);
            insert_missing_day(conn, day)?;
            return Ok(Outcome::Missing(MissingReason::ArchiveAbsent));
        }
        Err(GarminClientError::Transport(msg)) => {
            warn!("Ingest: download of {} failed: {}; recording as missing", day, msg);
            insert_missing_day(conn, day)?;
            return Ok(Outcome::Missing(MissingReason::TransportFailure(msg)));
        }
        Err(e @ (GarminClientError::Archive(_) | GarminClientError::Http { .. })) => {
            warn!("Ingest: archive for {} unusable: {}; recording as missing", day, e);
            insert_missing_day(conn, day)?;
            return Ok(Outcome::Missing(MissingReason::Unusable(e.to_string())));
        }
        Err(e) => return Err(format!("fetching archive for {} failed: {}", day, e)),
    };
    if streams.iter().all(|s| s.is_empty()) {
        // nothing is written, so the day stays uncovered and is fetched again next run
        debug!("Ingest: archive for {} holds no records", day);
    }

    let rows = conn
        .transaction::<usize, diesel::result::Error, _>(|conn| {
            let mut staged = 0usize;
            for stream in streams {
                for row in normalize(day, stream) {
                    staging
                        .upsert(conn, &row)
                        .map_err(|e| diesel::result::Error::QueryBuilderError(e.into()))?;
                    staged += 1;
                }
            }
            Ok(staged)
        })
        .map_err(|e| format!("staging records for {} failed: {}", day, e))?;
    staging.analyze(conn)?;

    info!("Ingest: downloaded {} ({} row(s) staged)", day, rows);
    Ok(Outcome::Ingested { rows })
}

/// Negative cache entry; re-recording an already missing day is a no-op.
pub fn insert_missing_day(conn: &mut SqliteConnection, day: NaiveDate) -> Result<usize, String> {
    use schema::missing::dsl as M;

    diesel::insert_into(M::missing)
        .values(&MissingDay {
            date: day.format("%Y-%m-%d").to_string(),
        })
        .on_conflict(M::date)
        .do_nothing()
        .execute(conn)
        .map_err(|e| format!("insert missing day {} failed: {}", day, e))
}
