//! File logging for vmsg using the tracing crate.
//!
//! Writes to daily-rotated files under the XDG state directory and never to
//! the terminal, which belongs to the TUI. Only the 7 most recent log files
//! are kept.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use anyhow::anyhow;
use tracing_appender::rolling;
use tracing_subscriber::prelude::*;

/// Base name of the log files; rotation appends `.YYYY-MM-DD`.
pub const LOG_FILE_NAME: &str = "vmsg.log";

const MAX_LOG_FILES: usize = 7;

/// Keeps the non-blocking writer alive for the program lifetime.
static APPENDER_GUARD: OnceLock<tracing_appender::non_blocking::WorkerGuard> = OnceLock::new();

/// Initializes the file logger.
///
/// The level comes from `RUST_LOG`, defaulting to "info".
///
/// # Errors
/// - If the log directory cannot be determined or created
/// - If logging was already initialized
pub fn init_logging() -> anyhow::Result<()> {
    let log_dir = get_log_dir()?;

    if let Err(e) = cleanup_old_logs(&log_dir) {
        eprintln!("Warning: Failed to cleanup old logs: {e}");
    }

    let file_appender = rolling::daily(&log_dir, LOG_FILE_NAME);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    APPENDER_GUARD
        .set(guard)
        .map_err(|_| anyhow!("Logging already initialized"))?;

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(non_blocking)
                .with_target(true)
                .with_level(true)
                .with_thread_ids(true)
                .with_ansi(false),
        )
        .init();

    tracing::debug!("Logging initialized. Log directory: {}", log_dir.display());
    Ok(())
}

/// Log directory: `$XDG_STATE_HOME/vmsg`, else `~/.local/state/vmsg`.
///
/// # Errors
/// - If the home directory cannot be determined
/// - If the directory cannot be created
pub fn get_log_dir() -> anyhow::Result<PathBuf> {
    let log_dir = match std::env::var("XDG_STATE_HOME") {
        Ok(state) if !state.is_empty() => PathBuf::from(state).join("vmsg"),
        _ => dirs::home_dir()
            .ok_or_else(|| anyhow!("Could not determine home directory"))?
            .join(".local/state/vmsg"),
    };

    fs::create_dir_all(&log_dir)?;
    Ok(log_dir)
}

/// Rotated log files in `log_dir`, newest first.
pub fn rotated_log_files(log_dir: &Path) -> anyhow::Result<Vec<PathBuf>> {
    let prefix = format!("{LOG_FILE_NAME}.");
    let mut files: Vec<_> = fs::read_dir(log_dir)?
        .filter_map(|entry| {
            let path = entry.ok()?.path();
            let name = path.file_name()?.to_string_lossy().to_string();
            if name.starts_with(&prefix) && name.matches('-').count() == 2 {
                let modified = fs::metadata(&path).ok()?.modified().ok()?;
                Some((path, modified))
            } else {
                None
            }
        })
        .collect();

    files.sort_by(|a, b| b.1.cmp(&a.1));
    Ok(files.into_iter().map(|(path, _)| path).collect())
}

fn cleanup_old_logs(log_dir: &Path) -> anyhow::Result<()> {
    for path in rotated_log_files(log_dir)?.iter().skip(MAX_LOG_FILES) {
        if let Err(e) = fs::remove_file(path) {
            eprintln!("Warning: Failed to delete old log file {}: {e}", path.display());
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cleanup_keeps_newest_files() {
        let dir = tempfile::tempdir().unwrap();
        for day in 1..=9 {
            let path = dir.path().join(format!("vmsg.log.2026-01-{day:02}"));
            fs::write(&path, "x").unwrap();
            let mtime = std::time::SystemTime::UNIX_EPOCH
                + std::time::Duration::from_secs(1_700_000_000 + day * 86_400);
            fs::File::options()
                .write(true)
                .open(&path)
                .unwrap()
                .set_modified(mtime)
                .unwrap();
        }
        fs::write(dir.path().join("other.txt"), "keep").unwrap();

        cleanup_old_logs(dir.path()).unwrap();

        let remaining = rotated_log_files(dir.path()).unwrap();
        assert_eq!(remaining.len(), MAX_LOG_FILES);
        assert!(remaining[0].ends_with("vmsg.log.2026-01-09"));
        assert!(!dir.path().join("vmsg.log.2026-01-01").exists());
        assert!(dir.path().join("other.txt").exists());
    }
}
