//! Small SQLite helpers shared by the pipeline stages.

use diesel::connection::SimpleConnection;
use diesel::prelude::*;
use diesel::sql_types::Text;
use diesel::{sql_query, SqliteConnection};
use std::collections::HashSet;

#[derive(QueryableByName)]
struct TableName {
    #[diesel(sql_type = Text)]
    #[allow(dead_code)]
    name: String,
}

#[derive(QueryableByName)]
struct ColumnInfo {
    #[diesel(sql_type = Text)]
    name: String,
}

/// Whether a table exists. Lookups against a missing table are answered from
/// here instead of by swallowing query errors, so real failures still surface.
pub fn has_table(conn: &mut SqliteConnection, table: &str) -> Result<bool, String> {
    sql_query("SELECT name FROM sqlite_master WHERE type = 'table' AND name = ?")
        .bind::<Text, _>(table)
        .load::<TableName>(conn)
        .map(|rows| !rows.is_empty())
        .map_err(|e| format!("lookup of table {} failed: {}", table, e))
}

/// Column names of `table`; empty when the table does not exist.
pub fn table_columns(conn: &mut SqliteConnection, table: &str) -> Result<HashSet<String>, String> {
    sql_query(format!("PRAGMA table_info({})", quote_ident(table)))
        .load::<ColumnInfo>(conn)
        .map(|rows| rows.into_iter().map(|c| c.name).collect())
        .map_err(|e| format!("reading columns of {} failed: {}", table, e))
}

/// Quote an identifier for interpolation into SQL text.
pub fn quote_ident(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

/// Reclaim free pages. Must run outside a transaction.
pub fn vacuum(conn: &mut SqliteConnection) -> Result<(), String> {
    conn.batch_execute("VACUUM main;")
        .map_err(|e| format!("vacuum failed: {}", e))
}
