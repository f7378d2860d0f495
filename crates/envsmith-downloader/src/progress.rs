//! Per-download progress tracking with callback fan-out.
//!
//! Progress entries live in a map guarded by one mutex held briefly.
//! Callbacks are invoked with a snapshot after the lock is released, so a
//! slow callback never blocks other downloads.

use ahash::AHashMap;
use parking_lot::Mutex;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use crate::types::DownloadStatus;

/// Progress snapshot for one download.
#[derive(Debug, Clone, Serialize)]
pub struct DownloadProgress {
    /// Download URL.
    pub url: String,
    /// Destination path.
    pub path: PathBuf,
    /// Total size in bytes (0 when unknown).
    pub total_size: u64,
    /// Bytes downloaded so far.
    pub downloaded_size: u64,
    /// Completion percentage (0-100; 0 when the total is unknown).
    pub percent: f64,
    /// Observed speed in MiB/s.
    pub speed_mbps: f64,
    /// Estimated seconds remaining (0 when unknown).
    pub eta_seconds: f64,
    /// Current status.
    pub status: DownloadStatus,
    /// Failure description on terminal failure.
    pub error: Option<String>,
}

/// Callback invoked with progress snapshots.
pub type ProgressCallback = Arc<dyn Fn(&DownloadProgress) + Send + Sync>;

/// Tracker over all active downloads.
#[derive(Default)]
pub struct ProgressTracker {
    active: Mutex<AHashMap<String, DownloadProgress>>,
    callbacks: Mutex<Vec<ProgressCallback>>,
    cancelled: AtomicBool,
}

impl std::fmt::Debug for ProgressTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgressTracker")
            .field("active", &self.active.lock().len())
            .field("callbacks", &self.callbacks.lock().len())
            .field("cancelled", &self.cancelled.load(Ordering::Relaxed))
            .finish()
    }
}

impl ProgressTracker {
    /// Create an empty tracker.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a progress callback.
    pub fn add_callback(&self, callback: ProgressCallback) {
        self.callbacks.lock().push(callback);
    }

    /// Request cooperative cancellation of all downloads. In-flight
    /// transfers finish their current chunk and fail.
    pub fn cancel_all(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// Whether cancellation has been requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Reset the cancellation flag (between batches).
    pub fn reset_cancel(&self) {
        self.cancelled.store(false, Ordering::SeqCst);
    }

    /// Start tracking a download in the pending state.
    pub fn begin(&self, url: &str, path: &Path) {
        let progress = DownloadProgress {
            url: url.to_string(),
            path: path.to_path_buf(),
            total_size: 0,
            downloaded_size: 0,
            percent: 0.0,
            speed_mbps: 0.0,
            eta_seconds: 0.0,
            status: DownloadStatus::Pending,
            error: None,
        };
        let snapshot = {
            let mut active = self.active.lock();
            active.insert(url.to_string(), progress.clone());
            progress
        };
        self.notify(&snapshot);
    }

    /// Transition a download to a new status. Terminal states are
    /// absorbing; later transitions are ignored.
    pub fn set_status(&self, url: &str, status: DownloadStatus) {
        let snapshot = {
            let mut active = self.active.lock();
            let Some(progress) = active.get_mut(url) else {
                return;
            };
            if progress.status.is_terminal() {
                return;
            }
            progress.status = status;
            progress.clone()
        };
        self.notify(&snapshot);
    }

    /// Update byte counters; fires the callback on every chunk boundary.
    pub fn update_bytes(&self, url: &str, downloaded: u64, total: u64, started: Instant) {
        let snapshot = {
            let mut active = self.active.lock();
            let Some(progress) = active.get_mut(url) else {
                return;
            };
            progress.downloaded_size = downloaded;
            progress.total_size = total;
            progress.percent = if total > 0 {
                downloaded as f64 / total as f64 * 100.0
            } else {
                0.0
            };

            let elapsed = started.elapsed().as_secs_f64();
            if elapsed > 0.0 {
                progress.speed_mbps = downloaded as f64 / elapsed / (1024.0 * 1024.0);
                if total > downloaded && progress.speed_mbps > 0.0 {
                    let remaining_mib = (total - downloaded) as f64 / (1024.0 * 1024.0);
                    progress.eta_seconds = remaining_mib / progress.speed_mbps;
                }
            }
            progress.clone()
        };
        self.notify(&snapshot);
    }

    /// Mark a download completed.
    pub fn complete(&self, url: &str, size: u64) {
        let snapshot = {
            let mut active = self.active.lock();
            let Some(progress) = active.get_mut(url) else {
                return;
            };
            progress.status = DownloadStatus::Completed;
            progress.downloaded_size = size;
            if progress.total_size == 0 {
                progress.total_size = size;
            }
            progress.percent = 100.0;
            progress.eta_seconds = 0.0;
            progress.clone()
        };
        self.notify(&snapshot);
    }

    /// Mark a download failed, with a terminal progress event carrying
    /// the error.
    pub fn fail(&self, url: &str, status: DownloadStatus, error: &str) {
        let snapshot = {
            let mut active = self.active.lock();
            let Some(progress) = active.get_mut(url) else {
                return;
            };
            progress.status = status;
            progress.error = Some(error.to_string());
            progress.clone()
        };
        self.notify(&snapshot);
    }

    /// Snapshot of every tracked download.
    #[must_use]
    pub fn snapshot(&self) -> Vec<DownloadProgress> {
        self.active.lock().values().cloned().collect()
    }

    /// Forget all tracked downloads (end of batch).
    pub fn clear(&self) {
        self.active.lock().clear();
    }

    fn notify(&self, progress: &DownloadProgress) {
        // Copy the callback list out so no lock is held during invocation.
        let callbacks: Vec<ProgressCallback> = self.callbacks.lock().clone();
        for callback in callbacks {
            callback(progress);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn callbacks_fire_on_updates() {
        let tracker = ProgressTracker::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&calls);
        tracker.add_callback(Arc::new(move |_| {
            seen.fetch_add(1, Ordering::SeqCst);
        }));

        tracker.begin("https://x/f", Path::new("/tmp/f"));
        tracker.set_status("https://x/f", DownloadStatus::InProgress);
        tracker.update_bytes("https://x/f", 50, 100, Instant::now());
        tracker.complete("https://x/f", 100);

        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[test]
    fn percent_tracks_bytes() {
        let tracker = ProgressTracker::new();
        tracker.begin("https://x/f", Path::new("/tmp/f"));
        tracker.update_bytes("https://x/f", 25, 100, Instant::now());

        let snapshot = tracker.snapshot();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].percent, 25.0);
        assert_eq!(snapshot[0].total_size, 100);
    }

    #[test]
    fn terminal_states_are_absorbing() {
        let tracker = ProgressTracker::new();
        tracker.begin("https://x/f", Path::new("/tmp/f"));
        tracker.fail("https://x/f", DownloadStatus::Failed, "boom");
        tracker.set_status("https://x/f", DownloadStatus::InProgress);

        assert_eq!(tracker.snapshot()[0].status, DownloadStatus::Failed);
        assert_eq!(tracker.snapshot()[0].error.as_deref(), Some("boom"));
    }

    #[test]
    fn cancel_flag_round_trip() {
        let tracker = ProgressTracker::new();
        assert!(!tracker.is_cancelled());
        tracker.cancel_all();
        assert!(tracker.is_cancelled());
        tracker.reset_cancel();
        assert!(!tracker.is_cancelled());
    }
}
