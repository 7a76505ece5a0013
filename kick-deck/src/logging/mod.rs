//! Logging setup with a reloadable filter.
//!
//! - Runtime filter changes via `tracing_subscriber::reload`
//! - Console output on stderr (stdout carries the host protocol)
//! - Optional daily-rolling log file with 7-day retention
//! - Local timezone timestamps

use chrono::{Local, NaiveDate};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    EnvFilter,
    fmt::{self, format::Writer, time::FormatTime},
    layer::SubscriberExt,
    reload::{self, Handle},
    util::SubscriberInitExt,
};

/// Default log filter directive.
pub const DEFAULT_LOG_FILTER: &str = "kick_deck=info,kick_api=info";

/// Rolling log file name prefix.
pub const LOG_FILE_PREFIX: &str = "kick-deck.log";

const LOG_RETENTION_DAYS: u64 = 7;
const RETENTION_SWEEP: Duration = Duration::from_secs(24 * 60 * 60);

/// Timestamps in the local timezone.
#[derive(Debug, Clone, Copy)]
struct LocalTimer;

impl FormatTime for LocalTimer {
    fn format_time(&self, w: &mut Writer<'_>) -> std::fmt::Result {
        let now = Local::now();
        write!(w, "{}", now.format("%Y-%m-%dT%H:%M:%S%.3f%:z"))
    }
}

/// Type alias for the reload handle.
pub type FilterHandle = Handle<EnvFilter, tracing_subscriber::Registry>;

pub struct LoggingConfig {
    handle: FilterHandle,
    log_dir: Option<PathBuf>,
}

impl LoggingConfig {
    /// Get the current filter directive string.
    pub fn get_filter(&self) -> String {
        self.handle
            .with_current(|filter| filter.to_string())
            .unwrap_or_default()
    }

    /// Replace the filter directive, e.g. `kick_deck=debug`.
    pub fn set_filter(&self, directive: &str) -> crate::Result<()> {
        let new_filter = EnvFilter::try_new(directive)
            .map_err(|e| crate::Error::Other(format!("Invalid filter directive: {}", e)))?;

        self.handle
            .reload(new_filter)
            .map_err(|e| crate::Error::Other(format!("Failed to reload filter: {}", e)))?;

        info!(directive = %directive, "Log filter updated");
        Ok(())
    }

    pub fn log_dir(&self) -> Option<&Path> {
        self.log_dir.as_deref()
    }

    /// Delete log files older than 7 days, once a day, until cancelled.
    ///
    /// Does nothing when file logging is off.
    pub fn start_retention_cleanup(self: &Arc<Self>, cancel_token: CancellationToken) {
        let Some(log_dir) = self.log_dir.clone() else {
            return;
        };

        tokio::spawn(async move {
            let mut daily = tokio::time::interval(RETENTION_SWEEP);
            loop {
                tokio::select! {
                    _ = cancel_token.cancelled() => break,
                    _ = daily.tick() => {
                        let cutoff = Local::now().date_naive() - chrono::Days::new(LOG_RETENTION_DAYS);
                        match cleanup_old_logs(&log_dir, cutoff).await {
                            Ok(0) => {}
                            Ok(count) => info!(count, "Removed expired log files"),
                            Err(e) => warn!(dir = %log_dir.display(), error = %e, "Log retention sweep failed"),
                        }
                    }
                }
            }
            debug!("Log retention task stopped");
        });
    }
}

/// Date suffix of a rolled log file (`kick-deck.log.YYYY-MM-DD`).
fn rolled_log_date(path: &Path) -> Option<NaiveDate> {
    let name = path.file_name()?.to_str()?;
    let date = name.strip_prefix(LOG_FILE_PREFIX)?.strip_prefix('.')?;
    NaiveDate::parse_from_str(date, "%Y-%m-%d").ok()
}

/// Remove rolled log files dated before `cutoff`. Returns how many went.
async fn cleanup_old_logs(log_dir: &Path, cutoff: NaiveDate) -> std::io::Result<usize> {
    let mut entries = tokio::fs::read_dir(log_dir).await?;
    let mut removed = 0;

    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        let expired = rolled_log_date(&path).is_some_and(|date| date < cutoff);
        if !expired || !entry.file_type().await?.is_file() {
            continue;
        }
        match tokio::fs::remove_file(&path).await {
            Ok(()) => removed += 1,
            Err(e) => warn!(path = %path.display(), error = %e, "Could not remove log file"),
        }
    }

    Ok(removed)
}

/// Pick the initial filter: explicit directive, then `RUST_LOG`, then the default.
fn initial_filter(directive: Option<&str>) -> EnvFilter {
    directive
        .and_then(|d| EnvFilter::try_new(d).ok())
        .or_else(|| EnvFilter::try_from_default_env().ok())
        .unwrap_or_else(|| EnvFilter::new(DEFAULT_LOG_FILTER))
}

/// Install the global subscriber.
///
/// Keep the returned guard alive for the lifetime of the process, or buffered
/// file output is lost.
pub fn init_logging(
    log_dir: Option<&Path>,
    directive: Option<&str>,
) -> crate::Result<(Arc<LoggingConfig>, Option<WorkerGuard>)> {
    let (filter_layer, filter_handle) = reload::Layer::new(initial_filter(directive));

    let (file_layer, guard) = match log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)?;
            let file_appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
            let layer = fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false)
                .with_timer(LocalTimer);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter_layer)
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(false)
                .with_timer(LocalTimer),
        )
        .with(file_layer)
        .try_init()
        .map_err(|e| {
            crate::Error::Other(format!("Failed to set global default subscriber: {}", e))
        })?;

    let config = Arc::new(LoggingConfig {
        handle: filter_handle,
        log_dir: log_dir.map(Path::to_path_buf),
    });

    Ok((config, guard))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_filter() {
        assert!(DEFAULT_LOG_FILTER.contains("kick_deck=info"));
        assert!(DEFAULT_LOG_FILTER.contains("kick_api=info"));
    }

    #[test]
    fn test_explicit_directive_wins() {
        let filter = initial_filter(Some("kick_deck=trace"));
        assert!(filter.to_string().contains("kick_deck=trace"));
    }

    #[test]
    fn test_invalid_directive_falls_back() {
        let filter = initial_filter(Some("kick_deck=notalevel"));
        assert!(!filter.to_string().contains("notalevel"));
    }

    #[test]
    fn test_rolled_log_date() {
        assert_eq!(
            rolled_log_date(Path::new("/logs/kick-deck.log.2024-03-09")),
            NaiveDate::from_ymd_opt(2024, 3, 9)
        );
        assert_eq!(rolled_log_date(Path::new("/logs/kick-deck.log")), None);
        assert_eq!(rolled_log_date(Path::new("/logs/other.log.2024-03-09")), None);
    }

    #[tokio::test]
    async fn test_cleanup_removes_only_expired_logs() {
        let dir = tempfile::tempdir().unwrap();
        let old = dir.path().join(format!("{LOG_FILE_PREFIX}.2000-01-01"));
        let today = dir
            .path()
            .join(format!("{LOG_FILE_PREFIX}.{}", Local::now().format("%Y-%m-%d")));
        let unrelated = dir.path().join("notes.txt");
        for path in [&old, &today, &unrelated] {
            tokio::fs::write(path, b"x").await.unwrap();
        }

        let cutoff = Local::now().date_naive() - chrono::Days::new(LOG_RETENTION_DAYS);
        let deleted = cleanup_old_logs(dir.path(), cutoff).await.unwrap();

        assert_eq!(deleted, 1);
        assert!(!old.exists());
        assert!(today.exists());
        assert!(unrelated.exists());
    }
}
