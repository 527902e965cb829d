//! Periodic cleanup of the storage area.
//!
//! A sweep deletes every regular file whose modification time is older than
//! the retention threshold. The background loop sweeps, sleeps for the
//! interval and repeats until its [`CleanupHandle`] is stopped; a sweep that
//! is already running always finishes.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::error::AppResult;
use crate::models::{bytes_to_mb, StorageStats};

/// Wait after a failed sweep before trying again. See [`retry_backoff`].
pub const SWEEP_RETRY_BACKOFF: Duration = Duration::from_secs(60);

/// Delay before retrying a failed sweep: [`SWEEP_RETRY_BACKOFF`], but always
/// shorter than the regular interval.
pub fn retry_backoff(interval: Duration) -> Duration {
    SWEEP_RETRY_BACKOFF.min(interval / 2)
}

#[derive(Debug, Clone)]
pub struct CleanupService {
    folder: PathBuf,
    max_age: Duration,
}

impl CleanupService {
    pub fn new(folder: impl Into<PathBuf>, max_age: Duration) -> Self {
        Self {
            folder: folder.into(),
            max_age,
        }
    }

    pub fn folder(&self) -> &Path {
        &self.folder
    }

    pub fn max_age(&self) -> Duration {
        self.max_age
    }

    /// One sweep pass. Returns how many files were deleted.
    pub fn cleanup_old_files(&self) -> AppResult<usize> {
        let entries = match fs::read_dir(&self.folder) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e.into()),
        };

        let now = SystemTime::now();
        let mut deleted = 0;

        for entry in entries {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!(error = %e, "Failed to read storage entry, skipping");
                    continue;
                }
            };
            let path = entry.path();

            let modified = match entry.metadata() {
                Ok(meta) if meta.is_file() => match meta.modified() {
                    Ok(modified) => modified,
                    Err(e) => {
                        warn!(path = %path.display(), error = %e, "No modification time, skipping");
                        continue;
                    }
                },
                Ok(_) => continue,
                // Already gone, e.g. removed by its own request handler.
                Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Failed to stat file, skipping");
                    continue;
                }
            };

            // Modification times in the future count as age zero.
            let age = now.duration_since(modified).unwrap_or_default();
            if age <= self.max_age {
                continue;
            }

            match fs::remove_file(&path) {
                Ok(()) => {
                    deleted += 1;
                    info!(
                        file = %entry.file_name().to_string_lossy(),
                        age_minutes = age.as_secs() / 60,
                        "Deleted expired file"
                    );
                }
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => {
                    error!(
                        file = %entry.file_name().to_string_lossy(),
                        error = %e,
                        "Failed to delete expired file"
                    );
                }
            }
        }

        if deleted > 0 {
            info!(deleted, "Cleanup completed");
        }
        Ok(deleted)
    }

    pub fn folder_stats(&self) -> StorageStats {
        let folder_path = self.folder.display().to_string();
        let entries = match fs::read_dir(&self.folder) {
            Ok(entries) => entries,
            Err(_) => return StorageStats::missing(folder_path),
        };

        let mut file_count = 0;
        let mut total_size = 0u64;
        for meta in entries.flatten().filter_map(|entry| entry.metadata().ok()) {
            if meta.is_file() {
                file_count += 1;
                total_size += meta.len();
            }
        }

        StorageStats {
            exists: true,
            file_count,
            total_size_mb: bytes_to_mb(total_size),
            folder_path,
        }
    }

    /// Spawn the sweep loop on the current runtime.
    pub fn start(self: Arc<Self>, interval: Duration) -> CleanupHandle {
        let shutdown = CancellationToken::new();
        let task = tokio::spawn(run_cleanup_loop(self, interval, shutdown.clone()));
        CleanupHandle { shutdown, task }
    }
}

/// Owner's handle on a running sweep loop.
#[derive(Debug)]
pub struct CleanupHandle {
    shutdown: CancellationToken,
    task: JoinHandle<()>,
}

impl CleanupHandle {
    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }

    /// Ask the loop to stop before its next sweep.
    pub fn stop(&self) {
        if self.shutdown.is_cancelled() {
            debug!("Cleanup service already stopping");
            return;
        }
        self.shutdown.cancel();
        info!("Cleanup service stop requested");
    }

    /// Stop and wait for the loop, including any in-flight sweep, to finish.
    pub async fn shutdown(self) {
        self.stop();
        if let Err(e) = self.task.await {
            error!(error = %e, "Cleanup task ended abnormally");
        }
    }
}

async fn run_cleanup_loop(service: Arc<CleanupService>, interval: Duration, shutdown: CancellationToken) {
    let backoff = retry_backoff(interval);
    info!(
        folder = %service.folder.display(),
        max_age_minutes = service.max_age.as_secs() / 60,
        interval = ?interval,
        "Cleanup service started"
    );

    loop {
        if shutdown.is_cancelled() {
            break;
        }

        let sweeper = Arc::clone(&service);
        let delay = match tokio::task::spawn_blocking(move || sweeper.cleanup_old_files()).await {
            Ok(Ok(deleted)) => {
                debug!(deleted, "Sweep finished");
                interval
            }
            Ok(Err(e)) => {
                error!(error = %e, retry_in = ?backoff, "Sweep failed");
                backoff
            }
            Err(e) => {
                error!(error = %e, retry_in = ?backoff, "Sweep task panicked");
                backoff
            }
        };

        tokio::select! {
            _ = tokio::time::sleep(delay) => {}
            _ = shutdown.cancelled() => break,
        }
    }

    info!("Cleanup service stopped");
}
