//! Exit-code plumbing.
//!
//! Codes: 0 success, 1 general failure, 2 bad input, 3 all retries
//! exhausted.

use std::fmt;

/// General failure.
pub const EXIT_FAILURE: u8 = 1;
/// Invalid input (unknown component, malformed catalogue).
pub const EXIT_BAD_INPUT: u8 = 2;
/// Every retry on every mirror failed.
pub const EXIT_RETRIES_EXHAUSTED: u8 = 3;

/// Error carrying the process exit code.
#[derive(Debug)]
pub struct CliError {
    /// Exit code to use.
    pub code: u8,
    message: String,
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

impl CliError {
    /// Wrap an error with an exit code.
    #[must_use]
    pub fn exit(code: u8, err: anyhow::Error) -> anyhow::Error {
        anyhow::Error::new(Self {
            code,
            message: err.to_string(),
        })
    }
}

/// Exit code for an error chain; defaults to general failure.
#[must_use]
pub fn exit_code_for(err: &anyhow::Error) -> u8 {
    err.downcast_ref::<CliError>().map_or(EXIT_FAILURE, |e| e.code)
}
