//! Streaming compression with transparent restore.
//!
//! Each candidate is compressed into a temporary next to the original,
//! verified against the ratio threshold, and atomically swapped in. A
//! sidecar metadata file records the algorithm, original size and
//! original hash, so the file can be restored on demand.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::VecDeque;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::candidates::{
    CompressionAlgorithm, CompressionCandidate, CompressionCriteria, scan_candidates, sidecar_path,
};

/// Maximum compression workers.
const MAX_WORKERS: usize = 4;

/// Sidecar metadata enabling transparent restore.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompressionMetadata {
    /// Algorithm used.
    pub algorithm: CompressionAlgorithm,
    /// Size before compression.
    pub original_size: u64,
    /// SHA-256 of the original content.
    pub original_sha256: String,
    /// When the file was compressed.
    pub compressed_at: DateTime<Utc>,
}

/// One successfully compressed file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompressedFile {
    /// File path (now holding compressed bytes).
    pub path: PathBuf,
    /// Size before compression.
    pub original_size: u64,
    /// Size after compression.
    pub compressed_size: u64,
    /// Achieved ratio.
    pub ratio: f64,
    /// Algorithm used.
    pub algorithm: CompressionAlgorithm,
}

/// Aggregate result of a compression run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompressionResult {
    /// Files compressed in this run.
    pub compressed_files: Vec<CompressedFile>,
    /// Total bytes before compression.
    pub original_total_size: u64,
    /// Total bytes after compression.
    pub compressed_total_size: u64,
    /// Bytes reclaimed.
    pub space_saved: u64,
    /// Overall compressed/original ratio (1.0 when nothing compressed).
    pub compression_ratio: f64,
    /// Wall-clock run time.
    pub duration: Duration,
    /// Per-file failures.
    pub errors: Vec<String>,
    /// Whether the run compressed at least one file without errors.
    pub success: bool,
}

/// Compresses cold files in place, with sidecar metadata for restore.
#[derive(Debug, Clone)]
pub struct CompressionEngine {
    criteria: CompressionCriteria,
    workers: usize,
}

impl Default for CompressionEngine {
    fn default() -> Self {
        Self::new(CompressionCriteria::default())
    }
}

impl CompressionEngine {
    /// Create an engine with the given default criteria.
    #[must_use]
    pub fn new(criteria: CompressionCriteria) -> Self {
        Self {
            criteria,
            workers: MAX_WORKERS,
        }
    }

    /// Identify candidates under `paths`, using the per-call criteria
    /// when supplied.
    #[must_use]
    pub fn identify_candidates(
        &self,
        paths: &[PathBuf],
        criteria: Option<&CompressionCriteria>,
    ) -> Vec<CompressionCandidate> {
        scan_candidates(paths, criteria.unwrap_or(&self.criteria))
    }

    /// Compress every candidate under `paths` using a bounded worker
    /// pool. Per-file failures are collected, never raised.
    #[must_use]
    pub fn compress_paths(
        &self,
        paths: &[PathBuf],
        criteria: Option<&CompressionCriteria>,
    ) -> CompressionResult {
        let start = Instant::now();
        let criteria = criteria.unwrap_or(&self.criteria);
        let candidates = scan_candidates(paths, criteria);

        info!(candidates = candidates.len(), "compression run starting");

        let queue: Mutex<VecDeque<CompressionCandidate>> =
            Mutex::new(candidates.into_iter().collect());
        let compressed: Mutex<Vec<CompressedFile>> = Mutex::new(Vec::new());
        let errors: Mutex<Vec<String>> = Mutex::new(Vec::new());

        let worker_count = self.workers.clamp(1, MAX_WORKERS);
        std::thread::scope(|scope| {
            for _ in 0..worker_count {
                scope.spawn(|| {
                    loop {
                        let Some(candidate) = queue.lock().pop_front() else {
                            break;
                        };
                        match compress_file(&candidate, criteria.ratio_threshold) {
                            Ok(file) => compressed.lock().push(file),
                            Err(e) => errors
                                .lock()
                                .push(format!("{}: {e}", candidate.path.display())),
                        }
                    }
                });
            }
        });

        let compressed_files = compressed.into_inner();
        let errors = errors.into_inner();

        let original_total_size: u64 = compressed_files.iter().map(|f| f.original_size).sum();
        let compressed_total_size: u64 = compressed_files.iter().map(|f| f.compressed_size).sum();

        let result = CompressionResult {
            success: !compressed_files.is_empty() && errors.is_empty(),
            space_saved: original_total_size.saturating_sub(compressed_total_size),
            compression_ratio: if original_total_size > 0 {
                compressed_total_size as f64 / original_total_size as f64
            } else {
                1.0
            },
            duration: start.elapsed(),
            compressed_files,
            original_total_size,
            compressed_total_size,
            errors,
        };

        info!(
            compressed = result.compressed_files.len(),
            saved = result.space_saved,
            errors = result.errors.len(),
            "compression run finished"
        );
        result
    }

    /// Restore a compressed file to its original content, verifying size
    /// and hash against the sidecar metadata.
    ///
    /// # Errors
    /// Returns a description when the sidecar is missing, decompression
    /// fails, or verification does not match.
    pub fn decompress_file(&self, path: &Path) -> Result<u64, String> {
        let sidecar = sidecar_path(path);
        let raw = std::fs::read_to_string(&sidecar)
            .map_err(|e| format!("no compression metadata: {e}"))?;
        let metadata: CompressionMetadata =
            serde_json::from_str(&raw).map_err(|e| format!("corrupt metadata: {e}"))?;

        let temp = suffixed(path, "decompressed");
        let restore = || -> Result<(), String> {
            let input =
                std::fs::File::open(path).map_err(|e| format!("cannot open {e}"))?;
            let output =
                std::fs::File::create(&temp).map_err(|e| format!("cannot create temp: {e}"))?;
            decompress_stream(metadata.algorithm, input, output)
        };

        if let Err(e) = restore() {
            let _ = std::fs::remove_file(&temp);
            return Err(e);
        }

        let restored_size = std::fs::metadata(&temp).map(|m| m.len()).unwrap_or(0);
        if restored_size != metadata.original_size {
            let _ = std::fs::remove_file(&temp);
            return Err(format!(
                "restored size {restored_size} does not match recorded {}",
                metadata.original_size
            ));
        }
        let restored_hash = file_sha256(&temp).unwrap_or_default();
        if !restored_hash.eq_ignore_ascii_case(&metadata.original_sha256) {
            let _ = std::fs::remove_file(&temp);
            return Err("restored content hash does not match recorded hash".to_string());
        }

        std::fs::remove_file(path).map_err(|e| format!("cannot remove compressed file: {e}"))?;
        std::fs::rename(&temp, path).map_err(|e| format!("cannot move restored file: {e}"))?;
        let _ = std::fs::remove_file(&sidecar);

        debug!(path = %path.display(), size = restored_size, "file restored");
        Ok(restored_size)
    }

    /// Whether `path` currently holds compressed content.
    #[must_use]
    pub fn is_compressed(&self, path: &Path) -> bool {
        sidecar_path(path).exists()
    }
}

/// Compress one candidate in place.
fn compress_file(
    candidate: &CompressionCandidate,
    ratio_threshold: f64,
) -> Result<CompressedFile, String> {
    let path = &candidate.path;
    let temp = suffixed(path, "compressed");

    let original_sha256 =
        file_sha256(path).map_err(|e| format!("cannot hash original: {e}"))?;

    let compress = || -> Result<(), String> {
        let input = std::fs::File::open(path).map_err(|e| format!("cannot open: {e}"))?;
        let output =
            std::fs::File::create(&temp).map_err(|e| format!("cannot create temp: {e}"))?;
        compress_stream(candidate.algorithm, input, output)
    };
    if let Err(e) = compress() {
        let _ = std::fs::remove_file(&temp);
        return Err(e);
    }

    let compressed_size = std::fs::metadata(&temp).map(|m| m.len()).unwrap_or(u64::MAX);
    let ratio = compressed_size as f64 / candidate.original_size.max(1) as f64;
    if ratio >= ratio_threshold {
        let _ = std::fs::remove_file(&temp);
        warn!(path = %path.display(), ratio, "compression not effective, keeping original");
        return Err(format!("compression not effective (ratio {ratio:.2})"));
    }

    let metadata = CompressionMetadata {
        algorithm: candidate.algorithm,
        original_size: candidate.original_size,
        original_sha256,
        compressed_at: Utc::now(),
    };
    let sidecar = sidecar_path(path);
    std::fs::write(
        &sidecar,
        serde_json::to_vec_pretty(&metadata).map_err(|e| e.to_string())?,
    )
    .map_err(|e| format!("cannot write metadata: {e}"))?;

    // Swap the compressed bytes in behind a backup so a crash between
    // renames cannot lose the original.
    let backup = suffixed(path, "backup");
    if let Err(e) = std::fs::rename(path, &backup) {
        let _ = std::fs::remove_file(&temp);
        let _ = std::fs::remove_file(&sidecar);
        return Err(format!("cannot stage original: {e}"));
    }
    if let Err(e) = std::fs::rename(&temp, path) {
        let _ = std::fs::rename(&backup, path);
        let _ = std::fs::remove_file(&temp);
        let _ = std::fs::remove_file(&sidecar);
        return Err(format!("cannot activate compressed file: {e}"));
    }
    let _ = std::fs::remove_file(&backup);

    debug!(path = %path.display(), ratio, "file compressed");
    Ok(CompressedFile {
        path: path.clone(),
        original_size: candidate.original_size,
        compressed_size,
        ratio,
        algorithm: candidate.algorithm,
    })
}

fn compress_stream(
    algorithm: CompressionAlgorithm,
    mut input: std::fs::File,
    output: std::fs::File,
) -> Result<(), String> {
    match algorithm {
        CompressionAlgorithm::Gzip => {
            let mut encoder =
                flate2::write::GzEncoder::new(output, flate2::Compression::default());
            std::io::copy(&mut input, &mut encoder).map_err(|e| e.to_string())?;
            encoder.finish().map_err(|e| e.to_string())?;
        }
        CompressionAlgorithm::Lzma => {
            let mut encoder = xz2::write::XzEncoder::new(output, 6);
            std::io::copy(&mut input, &mut encoder).map_err(|e| e.to_string())?;
            encoder.finish().map_err(|e| e.to_string())?;
        }
        CompressionAlgorithm::Zstd => {
            zstd::stream::copy_encode(&mut input, output, 3).map_err(|e| e.to_string())?;
        }
    }
    Ok(())
}

fn decompress_stream(
    algorithm: CompressionAlgorithm,
    input: std::fs::File,
    mut output: std::fs::File,
) -> Result<(), String> {
    match algorithm {
        CompressionAlgorithm::Gzip => {
            let mut decoder = flate2::read::GzDecoder::new(input);
            std::io::copy(&mut decoder, &mut output).map_err(|e| e.to_string())?;
        }
        CompressionAlgorithm::Lzma => {
            let mut decoder = xz2::read::XzDecoder::new(input);
            std::io::copy(&mut decoder, &mut output).map_err(|e| e.to_string())?;
        }
        CompressionAlgorithm::Zstd => {
            zstd::stream::copy_decode(input, &mut output).map_err(|e| e.to_string())?;
        }
    }
    output.flush().map_err(|e| e.to_string())
}

/// `<name>.<suffix>` next to the original, keeping the full file name so
/// `a.log` and `a.json` never collide on staging paths.
fn suffixed(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path
        .file_name()
        .map_or_else(String::new, |n| n.to_string_lossy().into_owned());
    name.push('.');
    name.push_str(suffix);
    path.with_file_name(name)
}

fn file_sha256(path: &Path) -> Result<String, std::io::Error> {
    let mut file = std::fs::File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; 128 * 1024];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn relaxed_engine() -> CompressionEngine {
        CompressionEngine::new(CompressionCriteria {
            min_file_size: 16,
            min_age: Duration::ZERO,
            ratio_threshold: 0.8,
        })
    }

    fn write_compressible(dir: &Path, name: &str) -> (PathBuf, Vec<u8>) {
        let content = "a log line that repeats to make the file compressible\n"
            .repeat(200)
            .into_bytes();
        let path = dir.join(name);
        std::fs::write(&path, &content).unwrap();
        (path, content)
    }

    #[test]
    fn compress_then_restore_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let (path, original) = write_compressible(dir.path(), "service.log");

        let engine = relaxed_engine();
        let result = engine.compress_paths(&[dir.path().to_path_buf()], None);

        assert!(result.success, "errors: {:?}", result.errors);
        assert_eq!(result.compressed_files.len(), 1);
        assert!(result.compression_ratio < 0.8);
        assert!(result.space_saved > 0);
        assert!(engine.is_compressed(&path));

        // The file on disk is now smaller than the original.
        let on_disk = std::fs::metadata(&path).unwrap().len();
        assert!(on_disk < original.len() as u64);

        let restored = engine.decompress_file(&path).unwrap();
        assert_eq!(restored, original.len() as u64);
        assert_eq!(std::fs::read(&path).unwrap(), original);
        assert!(!engine.is_compressed(&path));
    }

    #[test]
    fn incompressible_data_is_left_alone() {
        let dir = tempfile::tempdir().unwrap();
        // Pseudo-random bytes do not compress below the threshold.
        let mut state = 0x1234_5678_u64;
        let noise: Vec<u8> = (0..64 * 1024)
            .map(|_| {
                state = state.wrapping_mul(6_364_136_223_846_793_005).wrapping_add(1);
                (state >> 33) as u8
            })
            .collect();
        let path = dir.path().join("noise.dat");
        std::fs::write(&path, &noise).unwrap();

        let engine = relaxed_engine();
        let result = engine.compress_paths(&[dir.path().to_path_buf()], None);

        // Either the estimator or the real-ratio check rejects it.
        assert!(result.compressed_files.is_empty());
        assert_eq!(std::fs::read(&path).unwrap(), noise);
        assert!(!engine.is_compressed(&path));
    }

    #[test]
    fn decompress_without_metadata_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("plain.txt");
        std::fs::write(&path, "not compressed").unwrap();

        let err = relaxed_engine().decompress_file(&path).unwrap_err();
        assert!(err.contains("metadata"));
        assert_eq!(std::fs::read(&path).unwrap(), b"not compressed");
    }

    #[test]
    fn per_call_criteria_override_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let (path, _) = write_compressible(dir.path(), "big.log");

        // Default-criteria engine would skip this small file entirely.
        let engine = CompressionEngine::default();
        assert!(
            engine
                .identify_candidates(&[dir.path().to_path_buf()], None)
                .is_empty()
        );

        let relaxed = CompressionCriteria {
            min_file_size: 16,
            min_age: Duration::ZERO,
            ratio_threshold: 0.8,
        };
        let found = engine.identify_candidates(&[dir.path().to_path_buf()], Some(&relaxed));
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].path, path);
    }
}
