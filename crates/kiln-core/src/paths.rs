//! Filesystem locations used by the harness.

use dirs::home_dir;
use std::path::PathBuf;

/// Returns the kiln home directory, or None if the user's home cannot be resolved.
pub fn try_kiln_home() -> Option<PathBuf> {
    if let Ok(val) = std::env::var("KILN_HOME") {
        return Some(PathBuf::from(val));
    }
    home_dir().map(|h| h.join(".kiln"))
}

/// Returns the canonical kiln home directory (`~/.kiln`).
///
/// Falls back to `<tmp>/kiln` when neither `KILN_HOME` nor a home directory
/// is available (e.g. stripped-down CI containers).
pub fn kiln_home() -> PathBuf {
    try_kiln_home().unwrap_or_else(|| std::env::temp_dir().join("kiln"))
}

/// Staging area for source downloads: ~/.kiln/work
pub fn work_dir() -> PathBuf {
    kiln_home().join("work")
}

/// Logs directory: ~/.kiln/logs
pub fn log_dir() -> PathBuf {
    kiln_home().join("logs")
}

/// Timestamped log file name for one step of a package run.
pub fn log_file_name(package: &str, step: &str) -> String {
    let timestamp = chrono::Utc::now().format("%Y%m%d-%H%M%S%.3f");
    format!("{package}-{step}-{timestamp}.log")
}

/// Extract the filename from a URL.
pub fn filename_from_url(url: &str) -> &str {
    let url = url.split(['?', '#']).next().unwrap_or(url);
    url.split('/').next_back().unwrap_or("")
}
