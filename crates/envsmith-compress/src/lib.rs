//! Cold-data compression for Envsmith.
//!
//! Identifies files worth compressing (large, cold, not already
//! compressed, expected to shrink meaningfully), compresses them in a
//! bounded worker pool with gzip, LZMA or Zstandard, and keeps sidecar
//! metadata so any file can be transparently restored.

#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

mod candidates;
mod engine;

pub use candidates::{
    CompressionAlgorithm, CompressionCandidate, CompressionCriteria, SIDECAR_EXT,
    choose_algorithm, estimate_ratio, is_already_compressed, scan_candidates, sidecar_path,
    table_ratio,
};
pub use engine::{CompressedFile, CompressionEngine, CompressionMetadata, CompressionResult};
