//! Error types for the download engine.

use std::path::PathBuf;
use thiserror::Error;

/// Download-specific error types.
#[derive(Error, Debug)]
pub enum DownloadError {
    /// URL does not use the HTTPS scheme. Fatal for the request.
    #[error("only HTTPS URLs are allowed, got: {url}")]
    InsecureScheme {
        /// The rejected URL.
        url: String,
    },

    /// TLS or hostname verification failed. Another mirror may work.
    #[error("secure connection failed: {0}")]
    SecureConnection(String),

    /// Network/HTTP error.
    #[error("network error: {message}")]
    Network {
        /// Error message.
        message: String,
        /// HTTP status code if available.
        status_code: Option<u16>,
        /// Whether the error is retryable.
        retryable: bool,
    },

    /// Connection error.
    #[error("connection failed: {0}")]
    Connection(String),

    /// Timeout error.
    #[error("timeout: {0}")]
    Timeout(String),

    /// I/O error with path context.
    #[error("I/O error at {path}: {message}")]
    Io {
        /// File path.
        path: PathBuf,
        /// Error message.
        message: String,
    },

    /// Computed SHA-256 did not match the expected value. The temporary
    /// file has already been removed when this is raised.
    #[error("hash verification failed for {url}: expected {expected}, got {actual}")]
    HashMismatch {
        /// Downloaded URL.
        url: String,
        /// Expected SHA-256 (as supplied).
        expected: String,
        /// Computed SHA-256 (lowercase).
        actual: String,
    },

    /// Every mirror and every retry attempt failed.
    #[error("all mirrors and retries exhausted for {url} after {attempts} attempts")]
    RetryExhausted {
        /// Primary URL.
        url: String,
        /// Total attempts made across all URLs.
        attempts: u32,
        /// Error description per failed attempt.
        errors: Vec<String>,
    },

    /// Invalid URL.
    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// Download was cancelled by the caller.
    #[error("download cancelled")]
    Cancelled,
}

impl DownloadError {
    /// Create a network error.
    #[must_use]
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
            status_code: None,
            retryable: true,
        }
    }

    /// Create a network error with a status code.
    ///
    /// Any non-2xx status is retryable: the retry budget decides when to
    /// stop, and mirrors may serve what the primary cannot.
    #[must_use]
    pub fn network_with_status(message: impl Into<String>, status: u16) -> Self {
        Self::Network {
            message: message.into(),
            status_code: Some(status),
            retryable: true,
        }
    }

    /// Create an I/O error with path context.
    #[must_use]
    pub fn io(path: impl Into<PathBuf>, err: &std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            message: err.to_string(),
        }
    }

    /// Whether another attempt (same URL or another mirror) may succeed.
    ///
    /// Hash mismatches are retryable: a truncated or corrupted transfer
    /// can deliver different bytes next time, and mirrors may be intact.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::Network { retryable, .. } => *retryable,
            Self::Connection(_)
            | Self::Timeout(_)
            | Self::SecureConnection(_)
            | Self::HashMismatch { .. } => true,
            Self::InsecureScheme { .. }
            | Self::Io { .. }
            | Self::RetryExhausted { .. }
            | Self::InvalidUrl(_)
            | Self::Config(_)
            | Self::Cancelled => false,
        }
    }

    /// Convert from a reqwest error.
    #[must_use]
    pub fn from_reqwest(err: &reqwest::Error) -> Self {
        if err.is_timeout() {
            return Self::Timeout(err.to_string());
        }
        if err.is_connect() {
            // Certificate problems surface as connect errors in reqwest;
            // the message keeps the distinction visible.
            let message = err.to_string();
            if message.contains("certificate") || message.contains("tls") {
                return Self::SecureConnection(message);
            }
            return Self::Connection(message);
        }
        if let Some(status) = err.status() {
            return Self::network_with_status(err.to_string(), status.as_u16());
        }
        Self::network(err.to_string())
    }
}

/// Result type for download operations.
pub type Result<T> = std::result::Result<T, DownloadError>;

impl From<reqwest::Error> for DownloadError {
    fn from(err: reqwest::Error) -> Self {
        Self::from_reqwest(&err)
    }
}

impl From<url::ParseError> for DownloadError {
    fn from(err: url::ParseError) -> Self {
        Self::InvalidUrl(err.to_string())
    }
}

impl From<DownloadError> for envsmith_core::Error {
    fn from(err: DownloadError) -> Self {
        let url = match &err {
            DownloadError::InsecureScheme { url }
            | DownloadError::HashMismatch { url, .. }
            | DownloadError::RetryExhausted { url, .. } => Some(url.clone()),
            _ => None,
        };
        envsmith_core::Error::Network {
            message: err.to_string(),
            url,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_classification() {
        assert!(DownloadError::Connection("refused".into()).is_retryable());
        assert!(DownloadError::Timeout("slow".into()).is_retryable());
        assert!(DownloadError::SecureConnection("bad cert".into()).is_retryable());
        assert!(DownloadError::network_with_status("HTTP 503", 503).is_retryable());
        assert!(
            DownloadError::HashMismatch {
                url: "https://x".into(),
                expected: "aa".into(),
                actual: "bb".into(),
            }
            .is_retryable()
        );

        assert!(
            !DownloadError::InsecureScheme {
                url: "http://x".into()
            }
            .is_retryable()
        );
        assert!(!DownloadError::Cancelled.is_retryable());
        assert!(
            !DownloadError::RetryExhausted {
                url: "https://x".into(),
                attempts: 4,
                errors: vec![],
            }
            .is_retryable()
        );
    }

    #[test]
    fn converts_to_core_error_with_url() {
        let err = DownloadError::InsecureScheme {
            url: "http://example.com".into(),
        };
        let core: envsmith_core::Error = err.into();
        match core {
            envsmith_core::Error::Network { url, .. } => {
                assert_eq!(url.as_deref(), Some("http://example.com"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
