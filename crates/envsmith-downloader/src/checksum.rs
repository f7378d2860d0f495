//! SHA-256 hashing and verification.
//!
//! Expected hashes are 64 hex characters, compared case-insensitively.

use sha2::{Digest, Sha256};
use std::io::Read;
use std::path::Path;

use crate::error::{DownloadError, Result};

/// Incremental SHA-256 hasher for streamed downloads.
#[derive(Debug, Default)]
pub struct StreamingSha256 {
    inner: Sha256,
}

impl StreamingSha256 {
    /// Create a fresh hasher.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk of data.
    pub fn update(&mut self, data: &[u8]) {
        self.inner.update(data);
    }

    /// Finalize and return the lowercase hex digest.
    #[must_use]
    pub fn finalize_hex(self) -> String {
        hex::encode(self.inner.finalize())
    }
}

/// Whether a string is a plausible SHA-256 hex digest.
#[must_use]
pub fn is_valid_sha256_hex(value: &str) -> bool {
    value.len() == 64 && value.bytes().all(|b| b.is_ascii_hexdigit())
}

/// Case-insensitive, constant-time hash comparison.
#[must_use]
pub fn hashes_match(computed: &str, expected: &str) -> bool {
    let a = computed.to_ascii_lowercase();
    let b = expected.to_ascii_lowercase();
    if a.len() != b.len() {
        return false;
    }
    let mut diff = 0u8;
    for (x, y) in a.bytes().zip(b.bytes()) {
        diff |= x ^ y;
    }
    diff == 0
}

/// Compute the SHA-256 of a file, streaming in 128 KiB blocks.
///
/// # Errors
/// Returns an I/O error when the file cannot be read.
pub fn sha256_file(path: &Path) -> Result<String> {
    let file = std::fs::File::open(path).map_err(|e| DownloadError::io(path, &e))?;
    let mut reader = std::io::BufReader::with_capacity(128 * 1024, file);
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; 128 * 1024];

    loop {
        let n = reader
            .read(&mut buf)
            .map_err(|e| DownloadError::io(path, &e))?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }

    Ok(hex::encode(hasher.finalize()))
}

/// Verify a file on disk against an expected hash.
///
/// # Errors
/// Returns an I/O error when the file cannot be read; a mismatch returns
/// `Ok(false)`, not an error.
pub fn verify_file(path: &Path, expected: &str) -> Result<bool> {
    let computed = sha256_file(path)?;
    Ok(hashes_match(&computed, expected))
}
