//! Integrity-verified download engine for Envsmith.
//!
//! This crate provides HTTPS-only downloading with:
//!
//! - **Mandatory SHA-256 verification** for every download
//! - **Atomic staging**: bytes stream into `<dest>.tmp` and are renamed
//!   into place only after verification
//! - **Retry with exponential backoff** (`2^(k−1) + jitter` seconds)
//! - **Mirror failover** with a per-mirror health registry
//! - **Parallel batches** with bounded concurrency and progress callbacks
//! - **Bandwidth accounting** against a configured baseline (advisory)
//!
//! # Example
//!
//! ```no_run
//! use envsmith_downloader::{DownloadManager, DownloadRequest};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let manager = DownloadManager::with_defaults()?;
//!
//! let requests = vec![DownloadRequest::new(
//!     "https://example.com/toolchain.tar.zst",
//!     "6c76f7bd4b84eb68c26d2e8f48ea76f90b9bdf8836e27235a0ca4325f8fe4ce5",
//! )];
//!
//! let batch = manager.download_parallel(requests, None).await;
//! println!(
//!     "ok: {}, failed: {}, success rate {:.1}%",
//!     batch.successful, batch.failed, batch.integrity_summary.success_rate
//! );
//! # Ok(())
//! # }
//! ```

#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

pub mod checksum;
mod bandwidth;
mod client;
mod config;
mod error;
mod manager;
mod mirror;
mod progress;
mod retry;
mod types;

pub use bandwidth::{BandwidthMonitor, BandwidthStats};
pub use client::HttpClient;
pub use config::{DownloadConfig, DownloadConfigBuilder};
pub use error::{DownloadError, Result};
pub use manager::{DownloadManager, MirrorSelection};
pub use mirror::{MirrorInfo, MirrorRegistry, MirrorStatus};
pub use progress::{DownloadProgress, ProgressCallback, ProgressTracker};
pub use retry::{backoff_delay, sleep_backoff};
pub use types::{
    DownloadRequest, DownloadResult, DownloadStatus, IntegritySummary, ParallelDownloadResult,
};
