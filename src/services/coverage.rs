//! Which calendar days already have persisted data (or a recorded miss).

use crate::schema;
use crate::services::staging::STAGING_TABLE;
use crate::utils::{has_table, quote_ident};
use chrono::NaiveDate;
use diesel::dsl::sql;
use diesel::prelude::*;
use diesel::sql_types::Text;
use diesel::{sql_query, SqliteConnection};
use log::debug;
use std::collections::{HashMap, HashSet};

const UNIX_DAY_EXPR: &str = "date(unix_timestamp, 'unixepoch')";

/// Tables whose rows mark a day as covered, in lookup order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CoverageTable {
    Activity,
    HeartRate,
    Staging,
    StressLevel,
    Missing,
}

impl CoverageTable {
    pub const ALL: [CoverageTable; 5] = [
        CoverageTable::Activity,
        CoverageTable::HeartRate,
        CoverageTable::Staging,
        CoverageTable::StressLevel,
        CoverageTable::Missing,
    ];

    pub fn table_name(self) -> &'static str {
        match self {
            CoverageTable::Activity => "activity",
            CoverageTable::HeartRate => "heart_rate",
            CoverageTable::Staging => STAGING_TABLE,
            CoverageTable::StressLevel => "stress_level",
            CoverageTable::Missing => "missing",
        }
    }
}

#[derive(QueryableByName)]
struct DayKey {
    #[diesel(sql_type = Text)]
    day: String,
}

/// Per-run cache of covered days.
///
/// Each table's day set is loaded on first use and then kept for the rest of
/// the run; days staged or marked missing during the run are not reflected.
#[derive(Debug, Default)]
pub struct CoverageIndex {
    loaded: HashMap<CoverageTable, HashSet<String>>,
}

impl CoverageIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn covered(&mut self, conn: &mut SqliteConnection, day: NaiveDate) -> Result<bool, String> {
        let key = day.format("%Y-%m-%d").to_string();
        for table in CoverageTable::ALL {
            if self.days(conn, table)?.contains(&key) {
                debug!("Coverage: {} present in {}", key, table.table_name());
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn days(&mut self, conn: &mut SqliteConnection, table: CoverageTable) -> Result<&HashSet<String>, String> {
        if !self.loaded.contains_key(&table) {
            let days = load_days(conn, table)?;
            debug!("Coverage: loaded {} day(s) from {}", days.len(), table.table_name());
            self.loaded.insert(table, days);
        }
        self.loaded
            .get(&table)
            .ok_or_else(|| format!("coverage cache for {} unavailable", table.table_name()))
    }
}

fn load_days(conn: &mut SqliteConnection, table: CoverageTable) -> Result<HashSet<String>, String> {
    let name = table.table_name();
    if !has_table(conn, name)? {
        return Ok(HashSet::new());
    }

    let days: Vec<String> = match table {
        CoverageTable::Activity => schema::activity::table
            .select(sql::<Text>(UNIX_DAY_EXPR))
            .distinct()
            .load::<String>(conn),
        CoverageTable::HeartRate => schema::heart_rate::table
            .select(sql::<Text>(UNIX_DAY_EXPR))
            .distinct()
            .load::<String>(conn),
        CoverageTable::StressLevel => schema::stress_level::table
            .select(sql::<Text>(UNIX_DAY_EXPR))
            .distinct()
            .load::<String>(conn),
        CoverageTable::Missing => schema::missing::table
            .select(schema::missing::date)
            .distinct()
            .load::<String>(conn),
        CoverageTable::Staging => sql_query(format!(
            "SELECT DISTINCT date AS day FROM {} WHERE date IS NOT NULL",
            quote_ident(name)
        ))
        .load::<DayKey>(conn)
        .map(|rows| rows.into_iter().map(|r| r.day).collect()),
    }
    .map_err(|e| format!("loading covered days from {} failed: {}", name, e))?;

    Ok(days.into_iter().collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::{HeartRateSample, MissingDay};
    use crate::models::wellness::{FieldValue, RawRow};
    use crate::services::staging::StagingTable;
    use crate::testing::memory_db;
    use std::collections::BTreeMap;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2021, 5, d).unwrap()
    }

    #[test]
    fn empty_store_covers_nothing() {
        let mut conn = memory_db();
        let mut index = CoverageIndex::new();
        assert!(!index.covered(&mut conn, day(1)).unwrap());
    }

    #[test]
    fn missing_and_typed_rows_cover_their_days() {
        let mut conn = memory_db();
        diesel::insert_into(schema::missing::table)
            .values(&MissingDay {
                date: "2021-05-02".into(),
            })
            .execute(&mut conn)
            .unwrap();
        // 2021-05-03T23:59:59Z
        diesel::insert_into(schema::heart_rate::table)
            .values(&HeartRateSample {
                unix_timestamp: 1_620_086_399,
                heart_rate: 58,
            })
            .execute(&mut conn)
            .unwrap();

        let mut index = CoverageIndex::new();
        assert!(!index.covered(&mut conn, day(1)).unwrap());
        assert!(index.covered(&mut conn, day(2)).unwrap());
        assert!(index.covered(&mut conn, day(3)).unwrap());
        assert!(!index.covered(&mut conn, day(4)).unwrap());
    }

    #[test]
    fn staging_rows_cover_their_day() {
        let mut conn = memory_db();
        let mut fields = BTreeMap::new();
        fields.insert("steps (steps)".to_string(), FieldValue::Int(10));
        StagingTable::new()
            .upsert(
                &mut conn,
                &RawRow {
                    date: day(5),
                    last_timestamp: None,
                    actual_timestamp: None,
                    fields,
                },
            )
            .unwrap();

        let mut index = CoverageIndex::new();
        assert!(index.covered(&mut conn, day(5)).unwrap());
    }

    #[test]
    fn cache_is_not_refreshed_within_a_run() {
        let mut conn = memory_db();
        let mut index = CoverageIndex::new();
        assert!(!index.covered(&mut conn, day(6)).unwrap());

        diesel::insert_into(schema::missing::table)
            .values(&MissingDay {
                date: "2021-05-06".into(),
            })
            .execute(&mut conn)
            .unwrap();
        assert!(!index.covered(&mut conn, day(6)).unwrap());

        let mut next_run = CoverageIndex::new();
        assert!(next_run.covered(&mut conn, day(6)).unwrap());
    }

    #[test]
    fn dropped_typed_table_counts_as_empty() {
        let mut conn = memory_db();
        diesel::sql_query("DROP TABLE activity").execute(&mut conn).unwrap();
        let mut index = CoverageIndex::new();
        assert!(!index.covered(&mut conn, day(1)).unwrap());
    }
}
