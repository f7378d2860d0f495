//! Storage planning data model.

use chrono::{DateTime, Utc};
use envsmith_core::component::InstallPriority;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Kind of drive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DriveType {
    /// Internal fixed disk.
    Fixed,
    /// Removable media (USB stick, SD card).
    Removable,
    /// Network-mounted filesystem.
    Network,
}

/// A candidate installation target.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriveInfo {
    /// Mount point (or drive letter on Windows).
    pub mount: String,
    /// Total capacity in bytes.
    pub total_bytes: u64,
    /// Free bytes.
    pub available_bytes: u64,
    /// Used bytes.
    pub used_bytes: u64,
    /// Filesystem name (ext4, ntfs, ...).
    pub filesystem: String,
    /// Kind of drive.
    pub drive_type: DriveType,
    /// Whether the OS lives here.
    pub is_system_drive: bool,
    /// Whether the mount is read-only.
    #[serde(default)]
    pub is_read_only: bool,
    /// Device path hint, used for SSD/NVMe detection when available.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device: Option<String>,
    /// Composite performance score in `[0, 1]`.
    pub performance_score: f64,
}

impl DriveInfo {
    /// Fraction of the drive that is free.
    #[must_use]
    pub fn free_fraction(&self) -> f64 {
        if self.total_bytes == 0 {
            return 0.0;
        }
        self.available_bytes as f64 / self.total_bytes as f64
    }
}

/// Space requirement for one component.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentSpaceRequirement {
    /// Component name.
    pub name: String,
    /// Artifact download size.
    pub download_size: u64,
    /// Size on disk after installation.
    pub installation_size: u64,
    /// Scratch space needed during installation.
    pub temporary_space: u64,
    /// Sum of the above.
    pub total_required: u64,
    /// Installation priority.
    pub priority: InstallPriority,
}

/// Aggregate space requirement for a request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpaceRequirement {
    /// Per-component breakdown.
    pub components: Vec<ComponentSpaceRequirement>,
    /// Sum of download sizes.
    pub total_download_size: u64,
    /// Sum of installation sizes.
    pub total_installation_size: u64,
    /// Sum of temporary space.
    pub total_temporary_space: u64,
    /// Total bytes required.
    pub total_required_space: u64,
    /// Required plus a 20% safety buffer.
    pub recommended_free_space: u64,
    /// When the analysis ran.
    pub analysed_at: DateTime<Utc>,
}

/// Result of a selective-installation analysis.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectiveInstallResult {
    /// Components that fit the budget, in install order.
    pub installable: Vec<String>,
    /// Components that do not fit.
    pub skipped: Vec<String>,
    /// Bytes not spent because of skipping.
    pub space_saved: u64,
    /// Bytes the installable set will consume.
    pub total_space_required: u64,
    /// Whether at least one component fits.
    pub installation_feasible: bool,
    /// Human-readable advice.
    pub recommendations: Vec<String>,
}

/// Placement of one component on one drive.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlacementPlan {
    /// Component name.
    pub component: String,
    /// Target drive mount.
    pub drive: String,
    /// Full installation path.
    pub install_path: PathBuf,
    /// Bytes the placement consumes.
    pub space_required: u64,
    /// Why this drive was chosen.
    pub reason: String,
}

/// Result of multi-drive distribution planning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DistributionResult {
    /// Per-component placements.
    pub plans: Vec<PlacementPlan>,
    /// Number of components requested.
    pub total_components: usize,
    /// Mounts that received at least one component.
    pub drives_used: Vec<String>,
    /// Whether every requested component was placed.
    pub distribution_feasible: bool,
    /// Problems encountered while planning.
    pub warnings: Vec<String>,
}

/// How disruptive removing a component would be.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImpactLevel {
    /// Barely noticeable.
    Low,
    /// Noticeable but recoverable.
    Medium,
    /// Breaks workflows.
    High,
}

/// How safe removing a component is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RemovalSafety {
    /// Nothing depends on it.
    Safe,
    /// Other components may be affected.
    Caution,
    /// Likely to destabilise the environment.
    Risky,
}

/// One removal suggestion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemovalSuggestion {
    /// Component to remove.
    pub component: String,
    /// Bytes freed by removal.
    pub space_freed: u64,
    /// Disruption estimate.
    pub impact: ImpactLevel,
    /// Safety estimate.
    pub safety: RemovalSafety,
    /// Human-readable description.
    pub description: String,
}

/// Full removal analysis.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemovalSuggestions {
    /// All suggestions considered, most removable first.
    pub suggestions: Vec<RemovalSuggestion>,
    /// Bytes freed if every suggestion were taken.
    pub total_potential_space: u64,
    /// Safe suggestions covering the deficit.
    pub recommended: Vec<String>,
    /// When the analysis ran.
    pub analysed_at: DateTime<Utc>,
}

/// Result of a temporary-file cleanup pass.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CleanupResult {
    /// Files removed.
    pub removed_files: Vec<PathBuf>,
    /// Bytes reclaimed.
    pub space_freed: u64,
    /// Paths that could not be removed, with reasons.
    pub errors: Vec<String>,
}

/// Format a byte count for humans.
#[must_use]
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    let mut size = bytes as f64;
    let mut unit = 0;
    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{size:.0} {}", UNITS[unit])
    } else {
        format!("{size:.1} {}", UNITS[unit])
    }
}

impl fmt::Display for ImpactLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        };
        write!(f, "{s}")
    }
}

impl fmt::Display for RemovalSafety {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Safe => "safe",
            Self::Caution => "caution",
            Self::Risky => "risky",
        };
        write!(f, "{s}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn free_fraction_handles_empty_drive() {
        let drive = DriveInfo {
            mount: "/".into(),
            total_bytes: 0,
            available_bytes: 0,
            used_bytes: 0,
            filesystem: "ext4".into(),
            drive_type: DriveType::Fixed,
            is_system_drive: true,
            is_read_only: false,
            device: None,
            performance_score: 0.5,
        };
        assert_eq!(drive.free_fraction(), 0.0);
    }

    #[test]
    fn format_bytes_scales_units() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(1536), "1.5 KB");
        assert_eq!(format_bytes(5 * 1024 * 1024), "5.0 MB");
        assert_eq!(format_bytes(3 * 1024 * 1024 * 1024), "3.0 GB");
    }
}
