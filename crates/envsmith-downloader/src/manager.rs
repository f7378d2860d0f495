//! Robust download manager.
//!
//! Orchestrates verified single downloads, retry with exponential
//! backoff, mirror failover and parallel batches. Every download streams
//! into `<destination>.tmp`, is hashed incrementally, and is renamed into
//! place only after the SHA-256 matches; every failure path unlinks the
//! temporary file.

use futures_util::StreamExt;
use parking_lot::Mutex;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tokio::io::AsyncWriteExt;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};
use url::Url;

use crate::bandwidth::{BandwidthMonitor, BandwidthStats};
use crate::checksum::{self, StreamingSha256};
use crate::client::HttpClient;
use crate::config::DownloadConfig;
use crate::error::{DownloadError, Result};
use crate::mirror::{MirrorInfo, MirrorRegistry};
use crate::progress::{DownloadProgress, ProgressCallback, ProgressTracker};
use crate::types::{
    DownloadRequest, DownloadResult, DownloadStatus, IntegritySummary, ParallelDownloadResult,
};

/// Outcome of probing and selecting among a mirror set.
#[derive(Debug)]
pub struct MirrorSelection {
    /// Best mirror, when one was selectable.
    pub selected: Option<String>,
    /// Health snapshot of every tracked mirror.
    pub health: Vec<MirrorInfo>,
}

/// Integrity-verified, HTTPS-only download engine.
pub struct DownloadManager {
    client: HttpClient,
    config: Arc<DownloadConfig>,
    mirrors: MirrorRegistry,
    progress: ProgressTracker,
    bandwidth: BandwidthMonitor,
    history: Mutex<Vec<DownloadResult>>,
    semaphore: Arc<Semaphore>,
}

impl std::fmt::Debug for DownloadManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DownloadManager")
            .field("max_concurrent", &self.config.max_concurrent)
            .field("max_retries", &self.config.max_retries)
            .finish_non_exhaustive()
    }
}

impl DownloadManager {
    /// Create a manager with the given configuration.
    ///
    /// # Errors
    /// Returns a config error when the HTTP client cannot be built or the
    /// staging directory cannot be created.
    pub fn new(config: DownloadConfig) -> Result<Self> {
        let client = HttpClient::new(config.clone())?;
        Self::with_client(client, config)
    }

    /// Create a manager with default configuration.
    ///
    /// # Errors
    /// Returns a config error when the manager cannot be created.
    pub fn with_defaults() -> Result<Self> {
        Self::new(DownloadConfig::default())
    }

    #[cfg(test)]
    pub(crate) fn insecure_for_tests(config: DownloadConfig) -> Result<Self> {
        let client = HttpClient::insecure_for_tests(config.clone())?;
        Self::with_client(client, config)
    }

    fn with_client(client: HttpClient, config: DownloadConfig) -> Result<Self> {
        std::fs::create_dir_all(&config.staging_dir)
            .map_err(|e| DownloadError::io(&config.staging_dir, &e))?;

        let max_concurrent = config.max_concurrent.max(1);
        Ok(Self {
            client,
            mirrors: MirrorRegistry::new(config.health_check_interval),
            progress: ProgressTracker::new(),
            bandwidth: BandwidthMonitor::new(config.bandwidth_baseline_mbps),
            history: Mutex::new(Vec::new()),
            semaphore: Arc::new(Semaphore::new(max_concurrent)),
            config: Arc::new(config),
        })
    }

    /// The engine's configuration.
    #[must_use]
    pub const fn config(&self) -> &Arc<DownloadConfig> {
        &self.config
    }

    /// Register a progress callback for all subsequent downloads.
    pub fn add_progress_callback(&self, callback: ProgressCallback) {
        self.progress.add_callback(callback);
    }

    /// Request cooperative cancellation: in-flight downloads finish their
    /// current chunk and fail with a cancellation error.
    pub fn cancel_all(&self) {
        self.progress.cancel_all();
    }

    /// Snapshot of currently tracked download progress.
    #[must_use]
    pub fn active_downloads(&self) -> Vec<DownloadProgress> {
        self.progress.snapshot()
    }

    /// All recorded download results, oldest first.
    #[must_use]
    pub fn history(&self) -> Vec<DownloadResult> {
        self.history.lock().clone()
    }

    /// Forget recorded download results.
    pub fn clear_history(&self) {
        self.history.lock().clear();
    }

    /// Bandwidth statistics for the current/last batch.
    #[must_use]
    pub fn bandwidth_stats(&self) -> BandwidthStats {
        self.bandwidth.stats()
    }

    /// Health snapshot of every tracked mirror.
    #[must_use]
    pub fn mirror_report(&self) -> Vec<MirrorInfo> {
        self.mirrors.report()
    }

    /// Probe a mirror set and select the best one.
    pub async fn check_mirrors(&self, mirrors: &[String]) -> MirrorSelection {
        self.mirrors.ensure_known(mirrors.iter().map(String::as_str));
        for url in mirrors {
            self.mirrors.check_health(&self.client, url).await;
        }
        MirrorSelection {
            selected: self.mirrors.select_best(mirrors),
            health: self.mirrors.report(),
        }
    }

    /// Verify a previously downloaded file against an expected hash.
    /// Unreadable files count as unverified.
    #[must_use]
    pub fn verify_existing_file(&self, path: &Path, expected_sha256: &str) -> bool {
        checksum::verify_file(path, expected_sha256).unwrap_or(false)
    }

    /// Download a single URL with mandatory SHA-256 verification.
    ///
    /// A missing destination is derived from the URL path, defaulting to
    /// `download_<urlhash>.bin` in the staging directory.
    ///
    /// # Errors
    /// `InsecureScheme` for non-HTTPS URLs, `HashMismatch` when the
    /// content does not match (the file is already deleted), and network
    /// or I/O errors otherwise.
    pub async fn download_verified(
        &self,
        url: &str,
        expected_sha256: &str,
        destination: Option<&Path>,
    ) -> Result<DownloadResult> {
        let dest = self.resolve_destination(url, destination);
        self.progress.begin(url, &dest);

        match self.attempt_download(url, url, &dest, expected_sha256).await {
            Ok(result) => {
                self.progress.complete(url, result.file_size);
                Ok(result)
            }
            Err(e) => {
                self.progress.fail(url, status_for_error(&e), &e.to_string());
                Err(e)
            }
        }
    }

    /// Blocking variant of [`Self::download_verified`] for synchronous
    /// callers. Must not be invoked from within an async runtime.
    ///
    /// # Errors
    /// Same as the async variant, plus a config error when a runtime
    /// cannot be created.
    pub fn download_verified_blocking(
        &self,
        url: &str,
        expected_sha256: &str,
        destination: Option<&Path>,
    ) -> Result<DownloadResult> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| DownloadError::Config(e.to_string()))?;
        runtime.block_on(self.download_verified(url, expected_sha256, destination))
    }

    /// Download with retry and exponential backoff on one URL.
    ///
    /// Attempts run strictly in order; the delay before attempt `k` is
    /// `2^(k−1) + jitter(0.1..0.5)` seconds. Retry triggers on network
    /// errors, non-200 responses and hash failures.
    ///
    /// # Errors
    /// The last attempt's error once the budget is exhausted, or the
    /// first non-retryable error.
    pub async fn download_with_retry(
        &self,
        url: &str,
        expected_sha256: &str,
        destination: Option<&Path>,
        max_retries: Option<u32>,
    ) -> Result<DownloadResult> {
        let max_retries = max_retries.unwrap_or(self.config.max_retries);
        let dest = self.resolve_destination(url, destination);
        self.progress.begin(url, &dest);

        for attempt in 0..=max_retries {
            if attempt > 0 {
                self.progress.set_status(url, DownloadStatus::Retrying);
                crate::retry::sleep_backoff(attempt).await;
            }

            match self.attempt_download(url, url, &dest, expected_sha256).await {
                Ok(result) => {
                    self.progress.complete(url, result.file_size);
                    return Ok(result);
                }
                Err(e) => {
                    let exhausted = attempt == max_retries;
                    if exhausted || !e.is_retryable() {
                        self.progress.fail(url, status_for_error(&e), &e.to_string());
                        return Err(e);
                    }
                    warn!(url, attempt, error = %e, "attempt failed, will retry");
                }
            }
        }
        unreachable!("retry loop always returns")
    }

    /// Download with mirror failover: the full retry sequence runs on the
    /// primary first, then on each mirror in registry-preferred order.
    ///
    /// # Errors
    /// `RetryExhausted` when every URL fails, carrying per-attempt errors.
    pub async fn download_with_mirror_fallback(
        &self,
        request: &DownloadRequest,
    ) -> Result<DownloadResult> {
        let dest = self.resolve_destination(&request.url, request.destination.as_deref());
        self.progress.begin(&request.url, &dest);

        self.mirrors.ensure_known(
            std::iter::once(request.url.as_str())
                .chain(request.mirrors.iter().map(String::as_str)),
        );

        let mut urls = vec![request.url.clone()];
        urls.extend(self.mirrors.preferred_order(&request.mirrors));

        let mut attempts_total = 0u32;
        let mut errors = Vec::new();

        for (url_index, current) in urls.iter().enumerate() {
            if url_index > 0 {
                info!(primary = %request.url, mirror = %current, "falling back to mirror");
                self.progress
                    .set_status(&request.url, DownloadStatus::MirrorFallback);
            }

            for attempt in 0..=self.config.max_retries {
                attempts_total += 1;
                if attempt > 0 {
                    self.progress.set_status(&request.url, DownloadStatus::Retrying);
                    crate::retry::sleep_backoff(attempt).await;
                }

                match self
                    .attempt_download(current, &request.url, &dest, &request.expected_sha256)
                    .await
                {
                    Ok(mut result) => {
                        self.mirrors.record_success(current);
                        self.progress.complete(&request.url, result.file_size);
                        // The result reports the URL that actually served it.
                        result.url = current.clone();
                        return Ok(result);
                    }
                    Err(e) => {
                        self.mirrors.record_failure(current);
                        errors.push(format!("{current}: {e}"));
                        if !e.is_retryable() {
                            break;
                        }
                    }
                }
            }
        }

        let message = format!(
            "all mirrors and retries exhausted after {attempts_total} attempts"
        );
        self.progress
            .fail(&request.url, DownloadStatus::Failed, &message);
        Err(DownloadError::RetryExhausted {
            url: request.url.clone(),
            attempts: attempts_total,
            errors,
        })
    }

    /// Run a batch of downloads with up to `max_concurrent` in flight.
    ///
    /// Per-request failures are captured in the results; this call itself
    /// never fails. Progress callbacks fire on chunk boundaries; the
    /// aggregate includes a pre-install integrity summary.
    pub async fn download_parallel(
        &self,
        requests: Vec<DownloadRequest>,
        progress_callback: Option<ProgressCallback>,
    ) -> ParallelDownloadResult {
        if let Some(callback) = progress_callback {
            self.progress.add_callback(callback);
        }
        self.progress.reset_cancel();
        self.bandwidth.start();
        let batch_start = Instant::now();

        info!(count = requests.len(), "starting parallel downloads");

        let results: Vec<DownloadResult> = futures_util::stream::iter(requests)
            .map(|request| self.run_request(request))
            .buffer_unordered(self.config.max_concurrent.max(1))
            .collect()
            .await;

        self.bandwidth.stop();

        let total_download_time = batch_start.elapsed();
        let successful = results
            .iter()
            .filter(|r| r.status == DownloadStatus::Completed)
            .count();
        let total_size_bytes: u64 = results
            .iter()
            .filter(|r| r.status == DownloadStatus::Completed)
            .map(|r| r.file_size)
            .sum();
        let secs = total_download_time.as_secs_f64();

        let summary = ParallelDownloadResult {
            total_downloads: results.len(),
            successful,
            failed: results.len() - successful,
            total_size_bytes,
            total_download_time,
            average_speed_mbps: if secs > 0.0 {
                total_size_bytes as f64 / (1024.0 * 1024.0) / secs
            } else {
                0.0
            },
            bandwidth_utilization: self.bandwidth.utilization_percent(),
            integrity_summary: IntegritySummary::from_results(&results),
            results,
        };

        info!(
            successful = summary.successful,
            failed = summary.failed,
            bytes = summary.total_size_bytes,
            "parallel downloads complete"
        );

        self.progress.clear();
        summary
    }

    async fn run_request(&self, request: DownloadRequest) -> DownloadResult {
        let Ok(_permit) = self.semaphore.acquire().await else {
            return failed_result(&request, &self.config.staging_dir, "engine shut down");
        };

        let outcome = if request.mirrors.is_empty() {
            self.download_with_retry(
                &request.url,
                &request.expected_sha256,
                request.destination.as_deref(),
                None,
            )
            .await
        } else {
            self.download_with_mirror_fallback(&request).await
        };

        match outcome {
            Ok(result) => result,
            Err(e) => {
                let mut result = failed_result(&request, &self.config.staging_dir, &e.to_string());
                result.status = status_for_error(&e);
                result
            }
        }
    }

    /// One transfer attempt: stream to a temp file, verify, rename.
    /// Appends a history record for every outcome.
    async fn attempt_download(
        &self,
        url: &str,
        progress_key: &str,
        dest: &Path,
        expected_sha256: &str,
    ) -> Result<DownloadResult> {
        let start = Instant::now();

        let outcome = self
            .transfer(url, progress_key, dest, expected_sha256, start)
            .await;

        let result = match &outcome {
            Ok(result) => result.clone(),
            Err(e) => DownloadResult {
                url: url.to_string(),
                path: dest.to_path_buf(),
                status: status_for_error(e),
                file_size: 0,
                download_time: start.elapsed(),
                sha256: match e {
                    DownloadError::HashMismatch { actual, .. } => actual.clone(),
                    _ => String::new(),
                },
                expected_sha256: expected_sha256.to_string(),
                error: Some(e.to_string()),
            },
        };
        self.history.lock().push(result.clone());

        outcome.map(|_| result)
    }

    async fn transfer(
        &self,
        url: &str,
        progress_key: &str,
        dest: &Path,
        expected_sha256: &str,
        start: Instant,
    ) -> Result<DownloadResult> {
        if !checksum::is_valid_sha256_hex(expected_sha256) {
            return Err(DownloadError::Config(format!(
                "expected SHA-256 must be 64 hex characters, got '{expected_sha256}'"
            )));
        }
        if self.progress.is_cancelled() {
            return Err(DownloadError::Cancelled);
        }

        let parsed = self.client.ensure_secure_url(url)?;

        if let Some(parent) = dest.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| DownloadError::io(parent, &e))?;
        }

        let tmp = temp_path(dest);
        self.progress.set_status(progress_key, DownloadStatus::InProgress);

        let streamed = self.stream_to_file(progress_key, &parsed, &tmp, start).await;
        let (file_size, computed) = match streamed {
            Ok(streamed) => streamed,
            Err(e) => {
                let _ = tokio::fs::remove_file(&tmp).await;
                return Err(e);
            }
        };

        if !checksum::hashes_match(&computed, expected_sha256) {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(DownloadError::HashMismatch {
                url: url.to_string(),
                expected: expected_sha256.to_string(),
                actual: computed,
            });
        }

        if let Err(e) = tokio::fs::rename(&tmp, dest).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(DownloadError::io(dest, &e));
        }

        debug!(url, size = file_size, "download verified");
        Ok(DownloadResult {
            url: url.to_string(),
            path: dest.to_path_buf(),
            status: DownloadStatus::Completed,
            file_size,
            download_time: start.elapsed(),
            sha256: computed,
            expected_sha256: expected_sha256.to_string(),
            error: None,
        })
    }

    /// Stream the response body into `tmp` in configured chunks, hashing
    /// incrementally and reporting progress at chunk boundaries.
    async fn stream_to_file(
        &self,
        progress_key: &str,
        parsed: &Url,
        tmp: &Path,
        start: Instant,
    ) -> Result<(u64, String)> {
        let response = self.client.get(parsed).await?;
        let total_size = response.content_length().unwrap_or(0);

        let file = tokio::fs::File::create(tmp)
            .await
            .map_err(|e| DownloadError::io(tmp, &e))?;
        let mut writer =
            tokio::io::BufWriter::with_capacity(self.config.chunk_size, file);

        let mut hasher = StreamingSha256::new();
        let mut downloaded = 0u64;
        let mut stream = response.bytes_stream();

        while let Some(chunk) = stream.next().await {
            if self.progress.is_cancelled() {
                return Err(DownloadError::Cancelled);
            }
            let chunk = chunk.map_err(|e| DownloadError::from_reqwest(&e))?;

            writer
                .write_all(&chunk)
                .await
                .map_err(|e| DownloadError::io(tmp, &e))?;
            hasher.update(&chunk);
            downloaded += chunk.len() as u64;

            self.bandwidth.record(chunk.len() as u64);
            self.progress
                .update_bytes(progress_key, downloaded, total_size, start);
        }

        writer.flush().await.map_err(|e| DownloadError::io(tmp, &e))?;
        writer
            .into_inner()
            .sync_all()
            .await
            .map_err(|e| DownloadError::io(tmp, &e))?;

        Ok((downloaded, hasher.finalize_hex()))
    }

    /// Derive the destination for a URL when the caller supplied none:
    /// the URL path's file name, or `download_<urlhash>.bin` when the
    /// path has no usable name.
    fn resolve_destination(&self, url: &str, destination: Option<&Path>) -> PathBuf {
        if let Some(dest) = destination {
            return dest.to_path_buf();
        }

        let filename = Url::parse(url)
            .ok()
            .and_then(|u| {
                u.path_segments()
                    .and_then(|mut segments| segments.next_back().map(str::to_string))
            })
            .filter(|name| !name.is_empty() && name.contains('.'))
            .unwrap_or_else(|| {
                let digest = hex::encode(Sha256::digest(url.as_bytes()));
                format!("download_{}.bin", &digest[..8])
            });

        self.config.staging_dir.join(filename)
    }
}

/// Temporary staging path: `<dest>.tmp` alongside the destination.
fn temp_path(dest: &Path) -> PathBuf {
    let mut name = dest
        .file_name()
        .map_or_else(|| "download".to_string(), |n| n.to_string_lossy().into_owned());
    name.push_str(".tmp");
    dest.with_file_name(name)
}

const fn status_for_error(error: &DownloadError) -> DownloadStatus {
    match error {
        DownloadError::HashMismatch { .. } => DownloadStatus::HashFailed,
        _ => DownloadStatus::Failed,
    }
}

fn failed_result(request: &DownloadRequest, staging: &Path, error: &str) -> DownloadResult {
    DownloadResult {
        url: request.url.clone(),
        path: request
            .destination
            .clone()
            .unwrap_or_else(|| staging.join("unresolved")),
        status: DownloadStatus::Failed,
        file_size: 0,
        download_time: std::time::Duration::ZERO,
        sha256: String::new(),
        expected_sha256: request.expected_sha256.clone(),
        error: Some(error.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    /// SHA-256 of "Test file content".
    const CONTENT_SHA: &str = "6c76f7bd4b84eb68c26d2e8f48ea76f90b9bdf8836e27235a0ca4325f8fe4ce5";
    const WRONG_SHA: &str = "0000000000000000000000000000000000000000000000000000000000000000";

    fn test_manager(staging: &Path, max_retries: u32) -> DownloadManager {
        let config = DownloadConfig::builder()
            .max_retries(max_retries)
            .staging_dir(staging)
            .build();
        DownloadManager::insecure_for_tests(config).unwrap()
    }

    async fn serve_file(server: &MockServer, route: &str) {
        Mock::given(method("GET"))
            .and(path(route))
            .respond_with(ResponseTemplate::new(200).set_body_string("Test file content"))
            .mount(server)
            .await;
    }

    #[test]
    fn https_is_mandatory_for_real_managers() {
        let dir = tempfile::tempdir().unwrap();
        let manager = DownloadManager::new(
            DownloadConfig::builder().staging_dir(dir.path()).build(),
        )
        .unwrap();

        let err = manager
            .download_verified_blocking("http://example.com/f.zip", CONTENT_SHA, None)
            .unwrap_err();
        assert!(matches!(err, DownloadError::InsecureScheme { .. }));

        // The failure is recorded in history.
        let history = manager.history();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].status, DownloadStatus::Failed);
    }

    #[tokio::test]
    async fn verified_download_happy_path() {
        let server = MockServer::start().await;
        serve_file(&server, "/file.zip").await;

        let dir = tempfile::tempdir().unwrap();
        let manager = test_manager(dir.path(), 0);
        let dest = dir.path().join("file.zip");

        let result = manager
            .download_verified(&format!("{}/file.zip", server.uri()), CONTENT_SHA, Some(&dest))
            .await
            .unwrap();

        assert_eq!(result.status, DownloadStatus::Completed);
        assert_eq!(result.file_size, 17);
        assert_eq!(result.sha256, CONTENT_SHA);
        assert_eq!(std::fs::read(&dest).unwrap(), b"Test file content");

        // No temporary file is left behind.
        assert!(!temp_path(&dest).exists());
    }

    #[tokio::test]
    async fn hash_mismatch_deletes_file_and_records_history() {
        let server = MockServer::start().await;
        serve_file(&server, "/file.zip").await;

        let dir = tempfile::tempdir().unwrap();
        let manager = test_manager(dir.path(), 0);
        let dest = dir.path().join("file.zip");

        let err = manager
            .download_verified(&format!("{}/file.zip", server.uri()), WRONG_SHA, Some(&dest))
            .await
            .unwrap_err();

        assert!(matches!(err, DownloadError::HashMismatch { .. }));
        assert!(!dest.exists());
        assert!(!temp_path(&dest).exists());

        let history = manager.history();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].status, DownloadStatus::HashFailed);
        assert_eq!(history[0].sha256, CONTENT_SHA);
    }

    #[tokio::test]
    async fn retry_attempts_are_bounded() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/flaky"))
            .respond_with(ResponseTemplate::new(503))
            .expect(2)
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let manager = test_manager(dir.path(), 1);

        let err = manager
            .download_with_retry(
                &format!("{}/flaky", server.uri()),
                CONTENT_SHA,
                Some(&dir.path().join("flaky.bin")),
                None,
            )
            .await
            .unwrap_err();

        assert!(matches!(err, DownloadError::Network { .. }));
        // max_retries + 1 attempts recorded.
        assert_eq!(manager.history().len(), 2);
    }

    #[tokio::test]
    async fn mirror_fallback_succeeds_on_healthy_mirror() {
        let primary = MockServer::start().await;
        let mirror_bad = MockServer::start().await;
        let mirror_good = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/pkg.bin"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&primary)
            .await;
        Mock::given(method("GET"))
            .and(path("/pkg.bin"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&mirror_bad)
            .await;
        serve_file(&mirror_good, "/pkg.bin").await;

        let dir = tempfile::tempdir().unwrap();
        let manager = test_manager(dir.path(), 1);
        let dest = dir.path().join("pkg.bin");

        let primary_url = format!("{}/pkg.bin", primary.uri());
        let request = DownloadRequest {
            url: primary_url.clone(),
            destination: Some(dest.clone()),
            expected_sha256: CONTENT_SHA.to_string(),
            description: None,
            mirrors: vec![
                format!("{}/pkg.bin", mirror_bad.uri()),
                format!("{}/pkg.bin", mirror_good.uri()),
            ],
        };

        let result = manager.download_with_mirror_fallback(&request).await.unwrap();
        assert_eq!(result.status, DownloadStatus::Completed);
        assert_eq!(std::fs::read(&dest).unwrap(), b"Test file content");

        // Primary accumulated failures for both attempts; the serving
        // mirror recorded a success.
        let primary_info = manager
            .mirror_report()
            .into_iter()
            .find(|m| m.url == primary_url)
            .unwrap();
        assert!(primary_info.failure_count >= 2);

        let good_info = manager
            .mirror_report()
            .into_iter()
            .find(|m| m.url.starts_with(&mirror_good.uri()))
            .unwrap();
        assert!(good_info.success_count >= 1);

        // Total attempts bounded by (1 + max_retries) x URL count.
        assert!(manager.history().len() as u32 <= (1 + 1) * 3);
    }

    #[tokio::test]
    async fn parallel_batch_aggregates_mixed_outcomes() {
        let server = MockServer::start().await;
        serve_file(&server, "/file1").await;
        Mock::given(method("GET"))
            .and(path("/file2"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        serve_file(&server, "/file3").await;

        let dir = tempfile::tempdir().unwrap();
        let manager = test_manager(dir.path(), 0);

        let requests = ["file1", "file2", "file3"]
            .iter()
            .map(|name| DownloadRequest {
                url: format!("{}/{name}", server.uri()),
                destination: Some(dir.path().join(name)),
                expected_sha256: CONTENT_SHA.to_string(),
                description: None,
                mirrors: Vec::new(),
            })
            .collect();

        let batch = manager.download_parallel(requests, None).await;

        assert_eq!(batch.total_downloads, 3);
        assert_eq!(batch.successful, 2);
        assert_eq!(batch.failed, 1);
        assert_eq!(batch.successful + batch.failed, batch.total_downloads);
        assert_eq!(batch.total_size_bytes, 34);

        let summary = &batch.integrity_summary;
        assert!((summary.success_rate - 66.666).abs() < 0.1);
        assert_eq!(summary.failed_items.len(), 1);
        assert!(summary.failed_items[0].url.contains("file2"));

        // Sum of completed sizes equals the aggregate (invariant 6).
        let sum: u64 = batch
            .results
            .iter()
            .filter(|r| r.status == DownloadStatus::Completed)
            .map(|r| r.file_size)
            .sum();
        assert_eq!(sum, batch.total_size_bytes);
    }

    #[tokio::test]
    async fn progress_callbacks_reach_terminal_states() {
        let server = MockServer::start().await;
        serve_file(&server, "/file1").await;

        let dir = tempfile::tempdir().unwrap();
        let manager = test_manager(dir.path(), 0);

        let statuses: Arc<Mutex<Vec<DownloadStatus>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&statuses);

        let requests = vec![DownloadRequest {
            url: format!("{}/file1", server.uri()),
            destination: Some(dir.path().join("file1")),
            expected_sha256: CONTENT_SHA.to_string(),
            description: None,
            mirrors: Vec::new(),
        }];

        let batch = manager
            .download_parallel(
                requests,
                Some(Arc::new(move |p: &DownloadProgress| {
                    sink.lock().push(p.status);
                })),
            )
            .await;

        assert_eq!(batch.successful, 1);
        let seen = statuses.lock();
        assert!(seen.contains(&DownloadStatus::Pending));
        assert!(seen.contains(&DownloadStatus::InProgress));
        assert_eq!(*seen.last().unwrap(), DownloadStatus::Completed);
    }

    #[tokio::test]
    async fn cancellation_fails_pending_downloads() {
        let dir = tempfile::tempdir().unwrap();
        let manager = test_manager(dir.path(), 0);
        manager.cancel_all();

        // reset_cancel runs at batch start, so cancel must happen during
        // the batch; emulate by invoking the attempt path directly.
        manager.progress.cancel_all();
        let err = manager
            .attempt_download(
                "https://example.invalid/f.bin",
                "https://example.invalid/f.bin",
                &dir.path().join("f.bin"),
                CONTENT_SHA,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, DownloadError::Cancelled));
    }

    #[test]
    fn destination_derived_from_url_path() {
        let dir = tempfile::tempdir().unwrap();
        let manager = test_manager(dir.path(), 0);

        let derived = manager.resolve_destination("https://ex.com/a/b/tool.zip", None);
        assert_eq!(derived, dir.path().join("tool.zip"));

        // No usable filename: fall back to a URL-hash name.
        let fallback = manager.resolve_destination("https://ex.com/", None);
        let name = fallback.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("download_"));
        assert!(name.ends_with(".bin"));
        assert_eq!(name.len(), "download_".len() + 8 + ".bin".len());
    }

    #[test]
    fn temp_path_appends_suffix() {
        assert_eq!(
            temp_path(Path::new("/x/file.zip")),
            Path::new("/x/file.zip.tmp")
        );
    }
}
