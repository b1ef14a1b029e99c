//! Opening the SQLite store and bringing its fixed tables up to date.

use diesel::connection::SimpleConnection;
use diesel::prelude::*;
use diesel::SqliteConnection;
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};
use log::info;

pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

/// Open the store and apply connection-wide PRAGMAs.
pub fn connect(database_path: &str) -> Result<SqliteConnection, String> {
    let mut conn = SqliteConnection::establish(database_path)
        .map_err(|e| format!("opening database {} failed: {}", database_path, e))?;
    // single writer; busy_timeout only guards against an external reader holding a lock
    conn.batch_execute("PRAGMA busy_timeout = 5000;")
        .map_err(|e| format!("configuring database failed: {}", e))?;
    Ok(conn)
}

pub fn apply_migrations(conn: &mut SqliteConnection) -> Result<(), String> {
    match conn.run_pending_migrations(MIGRATIONS) {
        Ok(applied) => {
            if applied.is_empty() {
                info!("Database schema is up to date; no migrations were applied");
            } else {
                let names = applied.iter().map(|v| v.to_string()).collect::<Vec<_>>().join(", ");
                info!("Applied {} database migration(s): {}", applied.len(), names);
            }
            Ok(())
        }
        Err(e) => Err(format!("Applying database migrations failed: {}", e)),
    }
}
