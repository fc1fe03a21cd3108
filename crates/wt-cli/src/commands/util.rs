//! Shared utilities for CLI commands.

use std::fs::{self, File};
use std::path::Path;

use anyhow::{Context, Result};
use chrono::Local;
use fs2::FileExt;
use url::{Position, Url};
use wt_core::DayKey;

/// Today's day key in the local time zone.
pub fn today() -> DayKey {
    DayKey::from_date(Local::now().date_naive())
}

/// IANA name of the local time zone, or `UTC` if it cannot be determined.
pub fn local_timezone_name() -> String {
    iana_time_zone::get_timezone().unwrap_or_else(|_| "UTC".to_string())
}

/// Creates the lock file's directory if needed and locks it exclusively.
///
/// The lock is released when the returned file is dropped.
pub fn acquire_lock(path: &Path) -> Result<File> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).context("failed to create data directory")?;
    }
    let file = File::create(path).context("failed to create lock file")?;
    file.lock_exclusive().context("failed to acquire lock")?;
    Ok(file)
}

/// Splits a URL into its host (with port) and its path plus query.
///
/// Unparseable input comes back whole as the host with an empty path.
pub fn split_url(raw: &str) -> (String, String) {
    match Url::parse(raw) {
        Ok(url) => {
            let host = &url[Position::BeforeHost..Position::AfterPort];
            let path = &url[Position::BeforePath..Position::AfterQuery];
            let path = if path.is_empty() { "/" } else { path };
            (host.to_string(), path.to_string())
        }
        Err(_) => (raw.to_string(), String::new()),
    }
}
