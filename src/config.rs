//! Minimal runtime configuration helpers.
//! Everything comes from the process environment (optionally seeded by a .env file).

use chrono::NaiveDate;
use std::num::NonZeroU32;
use std::path::PathBuf;
use std::{fs, path::Path};

pub const DEFAULT_DATABASE_PATH: &str = "wellness.db";
pub const DEFAULT_API_BASE: &str = "https://connectapi.garmin.com";
pub const DEFAULT_RETENTION_DAYS: u32 = 7;
pub const DEFAULT_MAX_REQUEST_RETRIES: u32 = 3;

#[derive(Debug, Clone)]
pub struct Config {
    /// First day to sync (inclusive).
    pub start_date: NaiveDate,
    pub database_path: String,
    /// Pre-issued bearer token for the download service.
    pub access_token: String,
    pub api_base: String,
    /// Where day archives are written before decoding.
    pub download_dir: PathBuf,
    /// Trailing days deleted on startup so they are fetched again.
    pub retention_days: u32,
    pub max_request_retries: NonZeroU32,
    pub transform_enabled: bool,
}

impl Config {
    pub fn from_env() -> Result<Self, String> {
        let start_date = match std::env::var("WELLNESS_START_DATE") {
            Ok(s) if !s.trim().is_empty() => NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
                .map_err(|_| "WELLNESS_START_DATE must be in YYYY-MM-DD format".to_string())?,
            _ => return Err("Missing WELLNESS_START_DATE (first day to sync, YYYY-MM-DD)".to_string()),
        };

        let database_path = non_empty_var("DATABASE_PATH").unwrap_or_else(|| DEFAULT_DATABASE_PATH.to_string());

        // Prefer env var; fallback to token.txt in working directory
        let access_token = match non_empty_var("GARMIN_ACCESS_TOKEN") {
            Some(v) => v,
            None => match fs::read_to_string(Path::new("token.txt")) {
                Ok(s) if !s.trim().is_empty() => s.trim().to_string(),
                _ => {
                    return Err(
                        "Missing access token: set GARMIN_ACCESS_TOKEN or provide token.txt in working directory"
                            .to_string(),
                    );
                }
            },
        };

        let api_base = non_empty_var("GARMIN_API_BASE").unwrap_or_else(|| DEFAULT_API_BASE.to_string());

        let download_dir = non_empty_var("DOWNLOAD_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| std::env::temp_dir().join("wellness"));

        let retention_days = match non_empty_var("RETENTION_DAYS") {
            Some(s) => s
                .parse::<u32>()
                .map_err(|_| "RETENTION_DAYS must be a non-negative integer".to_string())?,
            None => DEFAULT_RETENTION_DAYS,
        };

        let max_request_retries = match non_empty_var("MAX_REQUEST_RETRIES") {
            Some(s) => s
                .parse::<NonZeroU32>()
                .map_err(|_| "MAX_REQUEST_RETRIES must be a positive integer".to_string())?,
            None => NonZeroU32::new(DEFAULT_MAX_REQUEST_RETRIES).unwrap_or(NonZeroU32::MIN),
        };

        let transform_enabled = std::env::var("TRANSFORM_ENABLED")
            .ok()
            .map(|s| matches!(s.as_str(), "1" | "true" | "TRUE"))
            .unwrap_or(true);

        Ok(Config {
            start_date,
            database_path,
            access_token,
            api_base,
            download_dir,
            retention_days,
            max_request_retries,
            transform_enabled,
        })
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}
