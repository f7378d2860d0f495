//! Request and result types for download operations.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// Download state machine.
///
/// `pending → in_progress → {completed | hash_failed | failed}`, with
/// transient `retrying` and `mirror_fallback` between attempts.
/// Terminal states are absorbing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DownloadStatus {
    /// Queued, not started.
    Pending,
    /// Transfer running.
    InProgress,
    /// Verified and renamed into place.
    Completed,
    /// Failed for a non-hash reason.
    Failed,
    /// Bytes arrived but the SHA-256 did not match.
    HashFailed,
    /// Waiting out a backoff delay before the next attempt.
    Retrying,
    /// Switched to a mirror after the previous URL was exhausted.
    MirrorFallback,
}

impl DownloadStatus {
    /// Whether this status is absorbing.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::HashFailed)
    }
}

impl fmt::Display for DownloadStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::HashFailed => "hash_failed",
            Self::Retrying => "retrying",
            Self::MirrorFallback => "mirror_fallback",
        };
        write!(f, "{s}")
    }
}

/// Request for downloading one file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadRequest {
    /// HTTPS URL to download from.
    pub url: String,
    /// Where to put the verified file; derived from the URL when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination: Option<PathBuf>,
    /// Expected SHA-256 of the content (64 hex chars, any case).
    pub expected_sha256: String,
    /// Human-readable description for progress display.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Alternative URLs serving the same bytes.
    #[serde(default)]
    pub mirrors: Vec<String>,
}

impl DownloadRequest {
    /// Request with no explicit destination and no mirrors.
    #[must_use]
    pub fn new(url: impl Into<String>, expected_sha256: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            destination: None,
            expected_sha256: expected_sha256.into(),
            description: None,
            mirrors: Vec::new(),
        }
    }
}

/// Result of one download operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadResult {
    /// Requested URL.
    pub url: String,
    /// Final destination path.
    pub path: PathBuf,
    /// Terminal status.
    pub status: DownloadStatus,
    /// Bytes received.
    pub file_size: u64,
    /// Wall-clock transfer time.
    pub download_time: Duration,
    /// Computed SHA-256 (lowercase; empty when nothing was hashed).
    pub sha256: String,
    /// Expected SHA-256 as supplied.
    pub expected_sha256: String,
    /// Failure description, when not completed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Pre-install digest of a batch's outcomes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntegritySummary {
    /// Number of downloads in the batch.
    pub total_downloads: usize,
    /// Completed and verified.
    pub successful: usize,
    /// Failed for non-hash reasons.
    pub failed: usize,
    /// Failed hash verification.
    pub hash_failed: usize,
    /// Success percentage (0-100).
    pub success_rate: f64,
    /// Total bytes of completed downloads.
    pub total_size_bytes: u64,
    /// Sum of per-download transfer times.
    pub total_download_time: Duration,
    /// Average speed over completed bytes, in MiB/s.
    pub average_speed_mbps: f64,
    /// Every non-completed result.
    pub failed_items: Vec<DownloadResult>,
}

impl IntegritySummary {
    /// Aggregate a batch of results.
    #[must_use]
    pub fn from_results(results: &[DownloadResult]) -> Self {
        let total_downloads = results.len();
        let successful = results
            .iter()
            .filter(|r| r.status == DownloadStatus::Completed)
            .count();
        let hash_failed = results
            .iter()
            .filter(|r| r.status == DownloadStatus::HashFailed)
            .count();
        let failed = results
            .iter()
            .filter(|r| r.status == DownloadStatus::Failed)
            .count();

        let total_size_bytes: u64 = results
            .iter()
            .filter(|r| r.status == DownloadStatus::Completed)
            .map(|r| r.file_size)
            .sum();
        let total_download_time: Duration = results.iter().map(|r| r.download_time).sum();

        let secs = total_download_time.as_secs_f64();
        let average_speed_mbps = if secs > 0.0 {
            total_size_bytes as f64 / (1024.0 * 1024.0) / secs
        } else {
            0.0
        };

        Self {
            total_downloads,
            successful,
            failed,
            hash_failed,
            success_rate: if total_downloads > 0 {
                successful as f64 / total_downloads as f64 * 100.0
            } else {
                0.0
            },
            total_size_bytes,
            total_download_time,
            average_speed_mbps,
            failed_items: results
                .iter()
                .filter(|r| r.status != DownloadStatus::Completed)
                .cloned()
                .collect(),
        }
    }
}

/// Aggregated result of a parallel batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParallelDownloadResult {
    /// Number of requests in the batch.
    pub total_downloads: usize,
    /// Completed downloads.
    pub successful: usize,
    /// Non-completed downloads.
    pub failed: usize,
    /// Total bytes of completed downloads.
    pub total_size_bytes: u64,
    /// Wall-clock batch time.
    pub total_download_time: Duration,
    /// Average batch speed in MiB/s.
    pub average_speed_mbps: f64,
    /// Bandwidth utilisation against the configured baseline (0-100).
    pub bandwidth_utilization: f64,
    /// Per-request results.
    pub results: Vec<DownloadResult>,
    /// Pre-install integrity digest.
    pub integrity_summary: IntegritySummary,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(url: &str, status: DownloadStatus, size: u64, secs: f64) -> DownloadResult {
        DownloadResult {
            url: url.to_string(),
            path: PathBuf::from("/tmp/x"),
            status,
            file_size: size,
            download_time: Duration::from_secs_f64(secs),
            sha256: String::new(),
            expected_sha256: String::new(),
            error: None,
        }
    }

    #[test]
    fn terminal_states() {
        assert!(DownloadStatus::Completed.is_terminal());
        assert!(DownloadStatus::Failed.is_terminal());
        assert!(DownloadStatus::HashFailed.is_terminal());
        assert!(!DownloadStatus::Retrying.is_terminal());
        assert!(!DownloadStatus::MirrorFallback.is_terminal());
    }

    #[test]
    fn integrity_summary_counts() {
        let results = vec![
            result("https://ex/a", DownloadStatus::Completed, 100, 1.0),
            result("https://ex/file2", DownloadStatus::Failed, 0, 0.5),
            result("https://ex/c", DownloadStatus::Completed, 200, 1.0),
        ];
        let summary = IntegritySummary::from_results(&results);

        assert_eq!(summary.total_downloads, 3);
        assert_eq!(summary.successful, 2);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.hash_failed, 0);
        assert!((summary.success_rate - 66.666).abs() < 0.01);
        assert_eq!(summary.total_size_bytes, 300);
        assert_eq!(summary.failed_items.len(), 1);
        assert!(summary.failed_items[0].url.contains("file2"));
    }

    #[test]
    fn empty_batch_summary() {
        let summary = IntegritySummary::from_results(&[]);
        assert_eq!(summary.total_downloads, 0);
        assert_eq!(summary.success_rate, 0.0);
        assert_eq!(summary.average_speed_mbps, 0.0);
    }
}
