//! Error types shared across the Envsmith workspace.
//!
//! Each error carries:
//! - A stable error code (e.g. E0101) for easy reference and searching
//! - A clear message explaining what went wrong
//! - Suggestions for how to fix the issue
//!
//! Recoverable analysis conditions (version conflicts, infeasible storage
//! plans) are modelled as result values by the owning crates, not as
//! errors; this type covers the genuinely failing paths.

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Stable error codes.
///
/// Grouped by subsystem: E01xx version/parse, E02xx resolution,
/// E03xx network, E04xx storage, E05xx io, E06xx ledger, E07xx config.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    /// Invalid version string.
    E0101,
    /// Invalid version constraint.
    E0102,
    /// Component not found in the catalogue.
    E0201,
    /// Dependency resolution failed.
    E0202,
    /// Circular dependency detected.
    E0203,
    /// Network request failed.
    E0301,
    /// Non-HTTPS URL rejected.
    E0302,
    /// TLS/secure-connection failure.
    E0303,
    /// Content hash mismatch.
    E0304,
    /// All retries and mirrors exhausted.
    E0305,
    /// Insufficient storage across all drives.
    E0401,
    /// Drive enumeration failed.
    E0402,
    /// Compression failed.
    E0403,
    /// I/O failure.
    E0501,
    /// Durable ledger store failure.
    E0601,
    /// Invalid configuration.
    E0701,
}

impl ErrorCode {
    /// The code as a short string.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::E0101 => "E0101",
            Self::E0102 => "E0102",
            Self::E0201 => "E0201",
            Self::E0202 => "E0202",
            Self::E0203 => "E0203",
            Self::E0301 => "E0301",
            Self::E0302 => "E0302",
            Self::E0303 => "E0303",
            Self::E0304 => "E0304",
            Self::E0305 => "E0305",
            Self::E0401 => "E0401",
            Self::E0402 => "E0402",
            Self::E0403 => "E0403",
            Self::E0501 => "E0501",
            Self::E0601 => "E0601",
            Self::E0701 => "E0701",
        }
    }

    /// Short human-readable description.
    #[must_use]
    pub const fn description(&self) -> &'static str {
        match self {
            Self::E0101 => "Invalid version",
            Self::E0102 => "Invalid constraint",
            Self::E0201 => "Component not found",
            Self::E0202 => "Resolution failed",
            Self::E0203 => "Circular dependency",
            Self::E0301 => "Network error",
            Self::E0302 => "Insecure URL",
            Self::E0303 => "TLS error",
            Self::E0304 => "Hash mismatch",
            Self::E0305 => "Retries exhausted",
            Self::E0401 => "Storage shortfall",
            Self::E0402 => "Drive enumeration failed",
            Self::E0403 => "Compression failed",
            Self::E0501 => "I/O error",
            Self::E0601 => "Ledger store error",
            Self::E0701 => "Invalid configuration",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Main error type for Envsmith.
#[derive(Error, Debug)]
pub enum Error {
    /// Version string could not be parsed.
    #[error("[E0101] invalid version: '{input}'")]
    VersionParse {
        /// Offending input.
        input: String,
    },

    /// Constraint string could not be parsed.
    #[error("[E0102] invalid version constraint: '{input}'")]
    ConstraintParse {
        /// Offending input.
        input: String,
    },

    /// Component is not present in the catalogue.
    #[error("[E0201] component '{name}' not found")]
    ComponentNotFound {
        /// Component name.
        name: String,
    },

    /// Dependency resolution failed outright.
    #[error("[E0202] resolution failed: {message}")]
    Resolution {
        /// What went wrong.
        message: String,
        /// Components involved in the failure.
        components: Vec<String>,
    },

    /// Network-level failure.
    #[error("[E0301] network error: {message}")]
    Network {
        /// What went wrong.
        message: String,
        /// Failing URL, if known.
        url: Option<String>,
    },

    /// Insufficient storage across every candidate drive.
    #[error("[E0401] storage shortfall: need {required_bytes} bytes, {available_bytes} available")]
    StorageShortfall {
        /// Bytes required.
        required_bytes: u64,
        /// Bytes available across all candidate drives.
        available_bytes: u64,
    },

    /// Filesystem failure with path context.
    #[error("[E0501] io error at {path}: {message}")]
    Io {
        /// File path.
        path: PathBuf,
        /// Error message.
        message: String,
    },

    /// Durable ledger store failure.
    #[error("[E0601] ledger store error: {0}")]
    Ledger(String),

    /// Configuration problem.
    #[error("[E0701] config error: {message}")]
    Config {
        /// What went wrong.
        message: String,
        /// Offending key, if applicable.
        key: Option<String>,
    },

    /// JSON encoding/decoding failure.
    #[error("[E0701] json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Get the error code for this error.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::VersionParse { .. } => ErrorCode::E0101,
            Self::ConstraintParse { .. } => ErrorCode::E0102,
            Self::ComponentNotFound { .. } => ErrorCode::E0201,
            Self::Resolution { .. } => ErrorCode::E0202,
            Self::Network { .. } => ErrorCode::E0301,
            Self::StorageShortfall { .. } => ErrorCode::E0401,
            Self::Io { .. } => ErrorCode::E0501,
            Self::Ledger(_) => ErrorCode::E0601,
            Self::Config { .. } | Self::Json(_) => ErrorCode::E0701,
        }
    }

    /// Actionable suggestions for resolving the error.
    #[must_use]
    pub fn suggestions(&self) -> Vec<String> {
        match self {
            Self::VersionParse { .. } | Self::ConstraintParse { .. } => vec![
                "expected formats: 1.2.3, v1.2.3, ^1.2.3, ~1.2, >=1.0 or 1.0.0 - 2.0.0".to_string(),
            ],
            Self::ComponentNotFound { name } => vec![
                format!("check the spelling of '{name}'"),
                "run 'envsmith list' to see known components".to_string(),
            ],
            Self::Resolution { .. } => vec![
                "inspect the analysis result for conflicts and cycles".to_string(),
                "relax version constraints on the conflicting components".to_string(),
            ],
            Self::Network { .. } => vec![
                "check your internet connection".to_string(),
                "configure a mirror with --mirror".to_string(),
            ],
            Self::StorageShortfall { .. } => vec![
                "free disk space or add a drive".to_string(),
                "review the removal suggestions in the plan".to_string(),
            ],
            Self::Io { .. } => vec!["check permissions and free space".to_string()],
            Self::Ledger(_) => vec![
                "check that the history database file is writable".to_string(),
            ],
            Self::Config { .. } | Self::Json(_) => {
                vec!["validate the configuration file syntax".to_string()]
            }
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
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Self::Io {
            path: PathBuf::new(),
            message: err.to_string(),
        }
    }
}

/// Result type for Envsmith operations.
pub type Result<T> = std::result::Result<T, Error>;
