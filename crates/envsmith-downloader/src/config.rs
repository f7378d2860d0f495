//! Configuration types for the download engine.

use std::path::PathBuf;
use std::time::Duration;

/// Download configuration with all options.
#[derive(Debug, Clone)]
pub struct DownloadConfig {
    /// Connection timeout for the initial TCP/TLS handshake.
    pub connect_timeout: Duration,
    /// Total per-attempt request timeout.
    pub request_timeout: Duration,
    /// Timeout for mirror health probes.
    pub probe_timeout: Duration,
    /// Number of retry attempts per URL (on top of the initial attempt).
    pub max_retries: u32,
    /// Maximum concurrent downloads in a parallel batch.
    pub max_concurrent: usize,
    /// Chunk size for streaming to disk.
    pub chunk_size: usize,
    /// User agent identifying the tool.
    pub user_agent: String,
    /// Directory for derived destinations and temporary files.
    pub staging_dir: PathBuf,
    /// Baseline bandwidth in Mbps for utilisation accounting.
    pub bandwidth_baseline_mbps: f64,
    /// Minimum spacing between health probes of the same mirror.
    pub health_check_interval: Duration,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(300),
            probe_timeout: Duration::from_secs(10),
            max_retries: 3,
            max_concurrent: 4,
            chunk_size: 8 * 1024,
            user_agent: "Envsmith-RobustDownloadManager/1.0".to_string(),
            staging_dir: std::env::temp_dir().join("envsmith-downloads"),
            bandwidth_baseline_mbps: 10.0,
            health_check_interval: Duration::from_secs(300),
        }
    }
}

impl DownloadConfig {
    /// Create a new config builder.
    #[must_use]
    pub fn builder() -> DownloadConfigBuilder {
        DownloadConfigBuilder::default()
    }
}

/// Builder for [`DownloadConfig`].
#[derive(Debug, Default)]
pub struct DownloadConfigBuilder {
    config: DownloadConfig,
}

impl DownloadConfigBuilder {
    /// Set connection timeout.
    #[must_use]
    pub const fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.connect_timeout = timeout;
        self
    }

    /// Set per-attempt request timeout.
    #[must_use]
    pub const fn request_timeout(mut self, timeout: Duration) -> Self {
        self.config.request_timeout = timeout;
        self
    }

    /// Set maximum retries per URL.
    #[must_use]
    pub const fn max_retries(mut self, retries: u32) -> Self {
        self.config.max_retries = retries;
        self
    }

    /// Set maximum concurrent downloads.
    #[must_use]
    pub const fn max_concurrent(mut self, concurrent: usize) -> Self {
        self.config.max_concurrent = concurrent;
        self
    }

    /// Set streaming chunk size.
    #[must_use]
    pub const fn chunk_size(mut self, bytes: usize) -> Self {
        self.config.chunk_size = bytes;
        self
    }

    /// Set the staging directory.
    #[must_use]
    pub fn staging_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.staging_dir = dir.into();
        self
    }

    /// Set the bandwidth baseline for utilisation accounting.
    #[must_use]
    pub const fn bandwidth_baseline_mbps(mut self, mbps: f64) -> Self {
        self.config.bandwidth_baseline_mbps = mbps;
        self
    }

    /// Set the user agent.
    #[must_use]
    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.config.user_agent = agent.into();
        self
    }

    /// Build the configuration.
    #[must_use]
    pub fn build(self) -> DownloadConfig {
        self.config
    }
}
