use chrono::Utc;
use log::{error, info};
use std::path::PathBuf;
use wellness_sync::client::GarminClient;
use wellness_sync::config::Config;
use wellness_sync::db::connection::{apply_migrations, connect};
use wellness_sync::services::{retention, sync, transform};
use wellness_sync::utils::vacuum;

#[derive(Debug)]
struct LoadedEnvFile {
    path: PathBuf,
    explicit: bool,
}

pub fn run() -> Result<(), String> {
    // 1) Load config
    let cfg = Config::from_env()?;
    info!(
        "Config loaded (start_date={}, database={}, api_base={}, download_dir={}, retention_days={}, max_request_retries={}, transform_enabled={})",
        cfg.start_date,
        cfg.database_path,
        cfg.api_base,
        cfg.download_dir.display(),
        cfg.retention_days,
        cfg.max_request_retries.get(),
        cfg.transform_enabled
    );

    // 2) Open the store and apply pending migrations
    let mut conn = connect(&cfg.database_path)?;
    info!("Opened database {}", cfg.database_path);
    apply_migrations(&mut conn)?;

    // 3) Forget the trailing window so recent days are fetched again
    let today = Utc::now().date_naive();
    let boundary = retention::boundary(today, cfg.retention_days);
    retention::prune(&mut conn, boundary)?;

    // 4) Init download client
    let client = GarminClient::new(
        cfg.api_base.as_str(),
        cfg.access_token.as_str(),
        cfg.download_dir.clone(),
        cfg.max_request_retries,
    )
    .map_err(|e| format!("initialising download client failed: {}", e))?;

    // 5) Fetch and stage every uncovered day
    sync::run(&mut conn, &client, cfg.start_date, today)?;

    // 6) Split staging into the typed tables
    if cfg.transform_enabled {
        transform::migrate(&mut conn)?;
    } else {
        info!("Transform disabled via TRANSFORM_ENABLED={}", cfg.transform_enabled);
    }

    vacuum(&mut conn)?;
    info!("Run complete");
    Ok(())
}

fn configure_env_from_cli() -> Result<Option<LoadedEnvFile>, String> {
    let mut args = std::env::args_os();
    args.next(); // skip program name

    let mut env_file: Option<PathBuf> = None;

    while let Some(arg) = args.next() {
        match arg.to_str() {
            Some("--env-file") => {
                if env_file.is_some() {
                    return Err("`--env-file` provided more than once".to_string());
                }
                let value = args
                    .next()
                    .ok_or_else(|| "`--env-file` requires a path argument".to_string())?;
                env_file = Some(PathBuf::from(value));
            }
            Some(s) if s.starts_with("--env-file=") => {
                if env_file.is_some() {
                    return Err("`--env-file` provided more than once".to_string());
                }
                let path_str = &s["--env-file=".len()..];
                if path_str.is_empty() {
                    return Err("`--env-file` requires a path argument".to_string());
                }
                env_file = Some(PathBuf::from(path_str));
            }
            Some("--") => break,
            Some(other) => return Err(format!("unrecognised argument: {}", other)),
            None => return Err("argument contains invalid UTF-8".to_string()),
        }
    }

    match env_file {
        Some(path) => {
            if !path.is_file() {
                return Err(format!("env file not found: {}", path.display()));
            }
            // dotenvy never overrides variables already present in the process environment
            dotenvy::from_path(&path).map_err(|e| format!("failed to load {}: {}", path.display(), e))?;
            Ok(Some(LoadedEnvFile { path, explicit: true }))
        }
        None => {
            let cwd = std::env::current_dir().map_err(|e| format!("unable to read current directory: {}", e))?;
            let default_path = cwd.join(".env");
            if !default_path.is_file() {
                return Ok(None);
            }
            dotenvy::from_path(&default_path)
                .map_err(|e| format!("failed to load {}: {}", default_path.display(), e))?;
            Ok(Some(LoadedEnvFile {
                path: default_path,
                explicit: false,
            }))
        }
    }
}

fn main() {
    let loaded_env = match configure_env_from_cli() {
        Ok(info) => info,
        Err(err) => {
            eprintln!("fatal: {}", err);
            std::process::exit(1);
        }
    };

    // Init logging after environment so RUST_LOG from .env is respected.
    let default_filter = env_logger::Env::default().default_filter_or("info");
    env_logger::Builder::from_env(default_filter)
        .format_timestamp_secs()
        .init();

    if let Some(info) = loaded_env.as_ref() {
        let origin = if info.explicit { "CLI-specified" } else { "default" };
        info!("Environment loaded from {} .env file: {}", origin, info.path.display());
    }

    info!(
        "garmin-wellness-sqlite {} (git {}) starting",
        env!("CARGO_PKG_VERSION"),
        env!("BUILD_TIME_GIT_HASH")
    );
    if let Err(e) = run() {
        error!("fatal: {}", e);
        std::process::exit(1);
    }
}
