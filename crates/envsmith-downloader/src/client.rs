//! HTTP client wrapper enforcing the security contract.
//!
//! Every URL must be HTTPS; TLS verification is mandatory with hostname
//! checking and the default trust store (rustls). The scheme gate runs
//! before the client ever touches a URL, and the client itself is built
//! with `https_only` so redirects cannot downgrade.

use reqwest::{Client, Response, StatusCode, header};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, trace};
use url::Url;

use crate::config::DownloadConfig;
use crate::error::{DownloadError, Result};

/// HTTPS-only HTTP client.
#[derive(Clone)]
pub struct HttpClient {
    client: Client,
    config: Arc<DownloadConfig>,
    enforce_https: bool,
}

impl std::fmt::Debug for HttpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpClient")
            .field("user_agent", &self.config.user_agent)
            .field("enforce_https", &self.enforce_https)
            .finish()
    }
}

impl HttpClient {
    /// Create a new client with the given configuration.
    ///
    /// # Errors
    /// Returns a config error when the client cannot be built.
    pub fn new(config: DownloadConfig) -> Result<Self> {
        Self::build(config, true)
    }

    /// Test-only constructor that permits plain HTTP, so the engine can be
    /// exercised against a local mock server. Never available to callers.
    #[cfg(test)]
    pub(crate) fn insecure_for_tests(config: DownloadConfig) -> Result<Self> {
        Self::build(config, false)
    }

    fn build(config: DownloadConfig, enforce_https: bool) -> Result<Self> {
        let mut headers = header::HeaderMap::new();
        if let Ok(ua) = header::HeaderValue::from_str(&config.user_agent) {
            headers.insert(header::USER_AGENT, ua);
        }

        let mut builder = Client::builder()
            .connect_timeout(config.connect_timeout)
            .timeout(config.request_timeout)
            .default_headers(headers)
            .redirect(reqwest::redirect::Policy::limited(10))
            .use_rustls_tls();

        if enforce_https {
            builder = builder.https_only(true);
        }

        let client = builder
            .build()
            .map_err(|e| DownloadError::Config(e.to_string()))?;

        Ok(Self {
            client,
            config: Arc::new(config),
            enforce_https,
        })
    }

    /// Get the configuration.
    #[must_use]
    pub const fn config(&self) -> &Arc<DownloadConfig> {
        &self.config
    }

    /// Validate and parse a URL, rejecting non-HTTPS schemes.
    ///
    /// # Errors
    /// Returns `InsecureScheme` for any scheme other than `https`.
    pub fn ensure_secure_url(&self, url: &str) -> Result<Url> {
        let parsed = Url::parse(url)?;
        if self.enforce_https && parsed.scheme() != "https" {
            return Err(DownloadError::InsecureScheme {
                url: url.to_string(),
            });
        }
        Ok(parsed)
    }

    /// Send a GET request and verify the response is HTTP 200.
    ///
    /// # Errors
    /// Returns a network error for any non-200 status.
    pub async fn get(&self, url: &Url) -> Result<Response> {
        debug!(url = %url, "GET request");
        let response = self.client.get(url.as_str()).send().await?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(DownloadError::network_with_status(
                format!("HTTP {status}"),
                status.as_u16(),
            ));
        }
        Ok(response)
    }

    /// Send a HEAD request with the probe timeout, returning the status
    /// and the measured response time.
    ///
    /// # Errors
    /// Returns a network error when the request fails or times out.
    pub async fn probe(&self, url: &Url) -> Result<(StatusCode, Duration)> {
        trace!(url = %url, "HEAD probe");
        let start = Instant::now();

        let response = tokio::time::timeout(
            self.config.probe_timeout,
            self.client.head(url.as_str()).send(),
        )
        .await
        .map_err(|_| DownloadError::Timeout(format!("probe of {url} timed out")))??;

        Ok((response.status(), start.elapsed()))
    }
}
