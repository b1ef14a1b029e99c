//! Blocking download client for per-day wellness archives.
//!
//! - Uses a `ureq` agent (no async); one request per day.
//! - Session establishment is not handled here: the caller supplies an
//!   already-issued bearer token.
//! - Transport failures are retried with jittered exponential backoff; HTTP
//!   responses are never retried.

use crate::archive::{read_archive, ArchiveError};
use crate::models::wellness::RecordStream;
use chrono::NaiveDate;
use http::StatusCode;
use log::{debug, warn};
use rand::Rng;
use std::fs;
use std::io::ErrorKind;
use std::num::NonZeroU32;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

const USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/90.0.4430.93 Safari/537.36";
const WELLNESS_PATH: &str = "/download-service/files/wellness";
const REQUEST_TIMEOUT_SECS: u64 = 120;
const MAX_ARCHIVE_BYTES: u64 = 256 * 1024 * 1024;
const RETRY_BASE_MILLIS: u64 = 500;
const RETRY_JITTER_MILLIS: u64 = 250;

#[derive(Debug)]
pub enum GarminClientError {
    /// The remote source could not be reached (connect, DNS, timeout, reset).
    Transport(String),
    Http { status: u16, message: String },
    Auth(String),
    Archive(ArchiveError),
    Io(std::io::Error),
}

impl core::fmt::Display for GarminClientError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            GarminClientError::Transport(s) => write!(f, "transport error: {}", s),
            GarminClientError::Http { status, message } => write!(f, "http {}: {}", status, message),
            GarminClientError::Auth(e) => write!(f, "auth error: {}", e),
            GarminClientError::Archive(e) => write!(f, "archive error: {}", e),
            GarminClientError::Io(e) => write!(f, "io error: {}", e),
        }
    }
}

impl std::error::Error for GarminClientError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            GarminClientError::Archive(e) => Some(e),
            GarminClientError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ArchiveError> for GarminClientError {
    fn from(value: ArchiveError) -> Self {
        GarminClientError::Archive(value)
    }
}

impl From<std::io::Error> for GarminClientError {
    fn from(value: std::io::Error) -> Self {
        GarminClientError::Io(value)
    }
}

/// Where a day's decoded record streams come from.
///
/// `Ok(None)` means the provider produced no archive for the day.
/// `Err(GarminClientError::Transport(_))` is a transient failure. `Http` and
/// `Archive` errors spoil only that day; `Auth` and `Io` are fatal to the run.
pub trait ArchiveSource {
    fn fetch_day(&self, day: NaiveDate) -> Result<Option<Vec<RecordStream>>, GarminClientError>;
}

pub struct GarminClient {
    agent: ureq::Agent,
    base_url: String,
    access_token: String,
    download_dir: PathBuf,
    max_request_retries: NonZeroU32,
}

impl GarminClient {
    pub fn new(
        base_url: impl Into<String>,
        access_token: impl Into<String>,
        download_dir: impl Into<PathBuf>,
        max_request_retries: NonZeroU32,
    ) -> Result<Self, GarminClientError> {
        let download_dir = download_dir.into();
        fs::create_dir_all(&download_dir)?;

        let agent: ureq::Agent = ureq::Agent::config_builder()
            .timeout_global(Some(Duration::from_secs(REQUEST_TIMEOUT_SECS)))
            .http_status_as_error(false)
            .build()
            .into();

        Ok(GarminClient {
            agent,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            access_token: access_token.into(),
            download_dir,
            max_request_retries,
        })
    }

    fn wellness_url(&self, day: NaiveDate) -> String {
        format!("{}{}/{}", self.base_url, WELLNESS_PATH, day.format("%Y-%m-%d"))
    }

    pub fn archive_path(&self, day: NaiveDate) -> PathBuf {
        self.download_dir.join(format!("{}.zip", day.format("%Y-%m-%d")))
    }

    /// Download the day's archive to [`Self::archive_path`]. Any archive left
    /// over from an earlier run is removed first, so a failed download never
    /// resurfaces stale data.
    pub fn download(&self, day: NaiveDate) -> Result<Option<PathBuf>, GarminClientError> {
        let path = self.archive_path(day);
        match fs::remove_file(&path) {
            Err(e) if e.kind() != ErrorKind::NotFound => return Err(e.into()),
            _ => {}
        }

        let url = self.wellness_url(day);
        let attempts = self.max_request_retries.get();
        let mut attempt = 1;
        loop {
            match self.download_once(&url, &path) {
                Err(GarminClientError::Transport(msg)) if attempt < attempts => {
                    let delay = retry_delay(attempt);
                    warn!(
                        "Download {} failed (attempt {}/{}): {}; retrying in {}ms",
                        day,
                        attempt,
                        attempts,
                        msg,
                        delay.as_millis()
                    );
                    thread::sleep(delay);
                    attempt += 1;
                }
                other => return other,
            }
        }
    }

    fn download_once(&self, url: &str, path: &Path) -> Result<Option<PathBuf>, GarminClientError> {
        debug!("GET {}", url);
        let mut resp = self
            .agent
            .get(url)
            .header("Authorization", &format!("Bearer {}", self.access_token))
            .header("User-Agent", USER_AGENT)
            .header("Accept", "application/zip, application/octet-stream, */*")
            .call()
            .map_err(|e| GarminClientError::Transport(e.to_string()))?;

        let status = resp.status();
        if status == StatusCode::NOT_FOUND || status == StatusCode::NO_CONTENT {
            return Ok(None);
        }
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(GarminClientError::Auth(format!(
                "http {} (access token invalid or expired?)",
                status.as_u16()
            )));
        }
        if !status.is_success() {
            let message = resp
                .body_mut()
                .read_to_string()
                .unwrap_or_else(|_| String::from("<no body>"));
            return Err(GarminClientError::Http {
                status: status.as_u16(),
                message,
            });
        }

        let bytes = resp
            .body_mut()
            .with_config()
            .limit(MAX_ARCHIVE_BYTES)
            .read_to_vec()
            .map_err(|e| GarminClientError::Transport(e.to_string()))?;
        if bytes.is_empty() {
            return Ok(None);
        }
        fs::write(path, &bytes)?;
        Ok(Some(path.to_path_buf()))
    }
}

impl ArchiveSource for GarminClient {
    fn fetch_day(&self, day: NaiveDate) -> Result<Option<Vec<RecordStream>>, GarminClientError> {
        match self.download(day)? {
            Some(path) => Ok(Some(read_archive(&path)?)),
            None => Ok(None),
        }
    }
}

fn retry_delay(attempt: u32) -> Duration {
    let exp = RETRY_BASE_MILLIS.saturating_mul(1u64 << attempt.saturating_sub(1).min(6));
    let jitter = rand::rng().random_range(0..=RETRY_JITTER_MILLIS);
    Duration::from_millis(exp + jitter)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{BufRead, BufReader, Write};
    use std::net::TcpListener;

    /// Serve exactly one canned HTTP response on a loopback port.
    fn serve_once(status_line: &'static str, body: &'static [u8]) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            let mut reader = BufReader::new(stream.try_clone().unwrap());
            let mut line = String::new();
            while reader.read_line(&mut line).unwrap() > 0 {
                if line == "\r\n" {
                    break;
                }
                line.clear();
            }
            let mut stream = stream;
            write!(
                stream,
                "{}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                status_line,
                body.len()
            )
            .unwrap();
            stream.write_all(body).unwrap();
        });
        format!("http://{}", addr)
    }

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2021, 5, 1).unwrap()
    }

    fn client(base: &str, dir: &Path) -> GarminClient {
        GarminClient::new(base, "token", dir, NonZeroU32::new(1).unwrap()).unwrap()
    }

    #[test]
    fn builds_wellness_url_and_archive_path() {
        let dir = tempfile::tempdir().unwrap();
        let c = client("https://connectapi.garmin.com/", dir.path());
        assert_eq!(
            c.wellness_url(day()),
            "https://connectapi.garmin.com/download-service/files/wellness/2021-05-01"
        );
        assert_eq!(c.archive_path(day()), dir.path().join("2021-05-01.zip"));
    }

    #[test]
    fn not_found_means_no_archive() {
        let dir = tempfile::tempdir().unwrap();
        let base = serve_once("HTTP/1.1 404 Not Found", b"");
        let c = client(&base, dir.path());
        assert!(c.fetch_day(day()).unwrap().is_none());
        assert!(!c.archive_path(day()).exists());
    }

    #[test]
    fn unauthorized_is_an_auth_error() {
        let dir = tempfile::tempdir().unwrap();
        let base = serve_once("HTTP/1.1 401 Unauthorized", b"");
        let c = client(&base, dir.path());
        assert!(matches!(c.fetch_day(day()), Err(GarminClientError::Auth(_))));
    }

    #[test]
    fn server_error_keeps_status_and_body() {
        let dir = tempfile::tempdir().unwrap();
        let base = serve_once("HTTP/1.1 500 Internal Server Error", b"boom");
        let c = client(&base, dir.path());
        match c.fetch_day(day()) {
            Err(GarminClientError::Http { status, message }) => {
                assert_eq!(status, 500);
                assert_eq!(message, "boom");
            }
            other => panic!("expected http error, got {:?}", other.map(|o| o.is_some())),
        }
    }

    #[test]
    fn refused_connection_is_transport_and_clears_stale_archive() {
        let dir = tempfile::tempdir().unwrap();
        let port = {
            let listener = TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let c = client(&format!("http://127.0.0.1:{}", port), dir.path());
        fs::write(c.archive_path(day()), b"stale").unwrap();

        assert!(matches!(c.fetch_day(day()), Err(GarminClientError::Transport(_))));
        assert!(!c.archive_path(day()).exists());
    }

    #[test]
    fn retry_delay_grows_and_stays_bounded() {
        for attempt in 1..=3 {
            let d = retry_delay(attempt).as_millis() as u64;
            let base = RETRY_BASE_MILLIS << (attempt - 1);
            assert!(d >= base && d <= base + RETRY_JITTER_MILLIS);
        }
        assert!(retry_delay(40).as_millis() as u64 <= (RETRY_BASE_MILLIS << 6) + RETRY_JITTER_MILLIS);
    }
}
