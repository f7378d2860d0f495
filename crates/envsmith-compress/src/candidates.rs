//! Candidate identification and ratio estimation.
//!
//! A file is a compression candidate iff it is not already compressed,
//! is large enough, has not been accessed recently, and is expected to
//! shrink below the ratio threshold.

use serde::{Deserialize, Serialize};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tracing::trace;
use walkdir::WalkDir;

/// Sidecar metadata extension marking an already-compressed file.
pub const SIDECAR_EXT: &str = "csmeta";

/// Extensions of formats that are already compressed.
const DENY_EXTENSIONS: &[&str] = &[
    "zip", "gz", "xz", "lzma", "bz2", "7z", "rar", "zst", "jpg", "jpeg", "png", "gif", "webm",
    "mp3", "mp4", "avi", "exe", "dll", "so", "dylib",
];

/// Directories never scanned.
const SKIP_DIRS: &[&str] = &["__pycache__", "node_modules", "target"];

/// Compression algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompressionAlgorithm {
    /// gzip (logs, CSV, plain text).
    Gzip,
    /// LZMA/xz (XML, JSON, config files).
    Lzma,
    /// Zstandard (source code).
    Zstd,
}

/// Candidate-selection thresholds; per-call overrides are explicit.
#[derive(Debug, Clone)]
pub struct CompressionCriteria {
    /// Minimum file size to consider.
    pub min_file_size: u64,
    /// Minimum time since last access.
    pub min_age: Duration,
    /// Compress only when the (estimated and real) ratio is below this.
    pub ratio_threshold: f64,
}

impl Default for CompressionCriteria {
    fn default() -> Self {
        Self {
            min_file_size: 1024 * 1024,
            min_age: Duration::from_secs(30 * 24 * 60 * 60),
            ratio_threshold: 0.8,
        }
    }
}

/// A file selected for compression.
#[derive(Debug, Clone)]
pub struct CompressionCandidate {
    /// File path.
    pub path: PathBuf,
    /// Size before compression.
    pub original_size: u64,
    /// Estimated size after compression.
    pub estimated_compressed_size: u64,
    /// Estimated compressed/original ratio.
    pub estimated_ratio: f64,
    /// Algorithm chosen for this file.
    pub algorithm: CompressionAlgorithm,
}

/// Path of the sidecar metadata file for `path`.
#[must_use]
pub fn sidecar_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map_or_else(String::new, |n| n.to_string_lossy().into_owned());
    name.push('.');
    name.push_str(SIDECAR_EXT);
    path.with_file_name(name)
}

/// Whether the file is already compressed (sidecar marker or extension).
#[must_use]
pub fn is_already_compressed(path: &Path) -> bool {
    if sidecar_path(path).exists() {
        return true;
    }
    extension(path)
        .map(|ext| DENY_EXTENSIONS.contains(&ext.as_str()))
        .unwrap_or(false)
}

/// Pick the algorithm for an extension.
#[must_use]
pub fn choose_algorithm(ext: &str) -> CompressionAlgorithm {
    match ext {
        "log" | "txt" | "csv" => CompressionAlgorithm::Gzip,
        "xml" | "json" | "config" | "conf" | "ini" | "yaml" | "yml" => CompressionAlgorithm::Lzma,
        "js" | "py" | "java" | "rs" | "c" | "cpp" | "h" | "cs" => CompressionAlgorithm::Zstd,
        _ => CompressionAlgorithm::Gzip,
    }
}

/// Table-based ratio estimate for an extension.
#[must_use]
pub fn table_ratio(ext: &str) -> f64 {
    match ext {
        "log" | "xml" => 0.2,
        "txt" | "json" | "sql" | "config" | "conf" | "yaml" | "yml" | "html" => 0.3,
        "csv" | "md" | "css" | "ini" => 0.4,
        "js" | "py" | "java" | "rs" | "c" | "cpp" | "h" | "cs" => 0.5,
        _ => 0.7,
    }
}

/// Estimate the compression ratio for a file, refining the table value
/// by actually compressing a 1 MiB prefix for files under 10 MiB.
#[must_use]
pub fn estimate_ratio(path: &Path, size: u64) -> (CompressionAlgorithm, f64) {
    let ext = extension(path).unwrap_or_default();
    let algorithm = choose_algorithm(&ext);
    let mut ratio = table_ratio(&ext);

    if size < 10 * 1024 * 1024
        && let Some(sampled) = sample_ratio(path, algorithm)
    {
        ratio = sampled;
    }

    (algorithm, ratio)
}

/// Compress up to 1 MiB of the file in memory and return the observed
/// ratio. `None` when sampling fails; callers fall back to the table.
fn sample_ratio(path: &Path, algorithm: CompressionAlgorithm) -> Option<f64> {
    let mut file = std::fs::File::open(path).ok()?;
    let mut sample = Vec::with_capacity(1024 * 1024);
    file.by_ref()
        .take(1024 * 1024)
        .read_to_end(&mut sample)
        .ok()?;
    if sample.is_empty() {
        return None;
    }

    let compressed_len = match algorithm {
        CompressionAlgorithm::Gzip => {
            let mut encoder = flate2::write::GzEncoder::new(
                Vec::new(),
                flate2::Compression::default(),
            );
            std::io::Write::write_all(&mut encoder, &sample).ok()?;
            encoder.finish().ok()?.len()
        }
        CompressionAlgorithm::Lzma => {
            let mut encoder = xz2::write::XzEncoder::new(Vec::new(), 6);
            std::io::Write::write_all(&mut encoder, &sample).ok()?;
            encoder.finish().ok()?.len()
        }
        CompressionAlgorithm::Zstd => zstd::stream::encode_all(&sample[..], 3).ok()?.len(),
    };

    Some(compressed_len as f64 / sample.len() as f64)
}

/// Scan paths for compression candidates.
#[must_use]
pub fn scan_candidates(
    paths: &[PathBuf],
    criteria: &CompressionCriteria,
) -> Vec<CompressionCandidate> {
    let mut candidates = Vec::new();

    for root in paths {
        for entry in WalkDir::new(root)
            .into_iter()
            .filter_entry(|e| {
                // The scan root is always entered, whatever its name.
                if e.depth() == 0 {
                    return true;
                }
                let name = e.file_name().to_string_lossy();
                !(e.file_type().is_dir()
                    && (name.starts_with('.') || SKIP_DIRS.contains(&name.as_ref())))
            })
            .filter_map(std::result::Result::ok)
        {
            if !entry.file_type().is_file() {
                continue;
            }
            let path = entry.path();

            if extension(path).as_deref() == Some(SIDECAR_EXT) || is_already_compressed(path) {
                continue;
            }

            let Ok(metadata) = entry.metadata() else {
                continue;
            };
            let size = metadata.len();
            if size < criteria.min_file_size {
                continue;
            }

            if !old_enough(&metadata, criteria.min_age) {
                continue;
            }

            let (algorithm, ratio) = estimate_ratio(path, size);
            if ratio >= criteria.ratio_threshold {
                trace!(path = %path.display(), ratio, "skipping: poor estimated ratio");
                continue;
            }

            candidates.push(CompressionCandidate {
                path: path.to_path_buf(),
                original_size: size,
                estimated_compressed_size: (size as f64 * ratio) as u64,
                estimated_ratio: ratio,
                algorithm,
            });
        }
    }

    candidates
}

fn old_enough(metadata: &std::fs::Metadata, min_age: Duration) -> bool {
    // Access time where the filesystem tracks it, modification time
    // otherwise (relatime mounts often freeze atime).
    let stamp = metadata.accessed().or_else(|_| metadata.modified());
    match stamp {
        Ok(stamp) => SystemTime::now()
            .duration_since(stamp)
            .map_or(false, |age| age >= min_age),
        Err(_) => false,
    }
}

fn extension(path: &Path) -> Option<String> {
    path.extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn relaxed() -> CompressionCriteria {
        CompressionCriteria {
            min_file_size: 16,
            min_age: Duration::ZERO,
            ratio_threshold: 0.8,
        }
    }

    #[test]
    fn algorithm_selection_by_extension() {
        assert_eq!(choose_algorithm("log"), CompressionAlgorithm::Gzip);
        assert_eq!(choose_algorithm("csv"), CompressionAlgorithm::Gzip);
        assert_eq!(choose_algorithm("json"), CompressionAlgorithm::Lzma);
        assert_eq!(choose_algorithm("xml"), CompressionAlgorithm::Lzma);
        assert_eq!(choose_algorithm("py"), CompressionAlgorithm::Zstd);
        assert_eq!(choose_algorithm("weird"), CompressionAlgorithm::Gzip);
    }

    #[test]
    fn deny_listed_extensions_are_never_candidates() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["a.zip", "b.gz", "c.jpg", "d.exe"] {
            std::fs::write(dir.path().join(name), vec![0u8; 64]).unwrap();
        }

        let found = scan_candidates(&[dir.path().to_path_buf()], &relaxed());
        assert!(found.is_empty());
    }

    #[test]
    fn sidecar_marks_file_as_compressed() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("data.log");
        std::fs::write(&file, "x".repeat(64)).unwrap();
        assert!(!is_already_compressed(&file));

        std::fs::write(sidecar_path(&file), "{}").unwrap();
        assert!(is_already_compressed(&file));

        let found = scan_candidates(&[dir.path().to_path_buf()], &relaxed());
        assert!(found.is_empty());
    }

    #[test]
    fn small_files_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("tiny.log"), "abc").unwrap();

        let found = scan_candidates(&[dir.path().to_path_buf()], &relaxed());
        assert!(found.is_empty());
    }

    #[test]
    fn repetitive_text_is_a_candidate() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("build.log");
        std::fs::write(&file, "the same line again and again\n".repeat(100)).unwrap();

        let found = scan_candidates(&[dir.path().to_path_buf()], &relaxed());
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].algorithm, CompressionAlgorithm::Gzip);
        assert!(found[0].estimated_ratio < 0.8);
    }

    #[test]
    fn recent_files_respect_age_threshold() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("fresh.log"),
            "the same line again and again\n".repeat(100),
        )
        .unwrap();

        let mut criteria = relaxed();
        criteria.min_age = Duration::from_secs(3600);
        let found = scan_candidates(&[dir.path().to_path_buf()], &criteria);
        assert!(found.is_empty());
    }
}
