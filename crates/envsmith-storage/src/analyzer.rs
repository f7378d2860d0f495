//! Storage analysis: drive ranking, space math, selective installation.

use chrono::Utc;
use envsmith_core::component::{ComponentSpec, InstallPriority};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::enumerate::DriveEnumerator;
use crate::models::{
    ComponentSpaceRequirement, DriveInfo, DriveType, SelectiveInstallResult, SpaceRequirement,
    format_bytes,
};

/// Minimum free space for a removable drive to be considered at all.
const REMOVABLE_MIN_FREE: u64 = 1024 * 1024 * 1024;

/// Analyses available storage against component requirements.
pub struct StorageAnalyzer {
    enumerator: Arc<dyn DriveEnumerator>,
}

impl std::fmt::Debug for StorageAnalyzer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageAnalyzer").finish_non_exhaustive()
    }
}

impl StorageAnalyzer {
    /// Create an analyzer over the given enumerator port.
    #[must_use]
    pub fn new(enumerator: Arc<dyn DriveEnumerator>) -> Self {
        Self { enumerator }
    }

    /// Enumerate, filter and rank candidate drives.
    ///
    /// Read-only drives, network drives and removable drives with less
    /// than 1 GiB free are dropped. The rest are scored and sorted by
    /// (system drive, performance, free space), best first.
    #[must_use]
    pub fn analyze_system_storage(&self) -> Vec<DriveInfo> {
        let mut drives: Vec<DriveInfo> = self
            .enumerator
            .list()
            .into_iter()
            .filter(|drive| {
                if drive.is_read_only {
                    debug!(mount = %drive.mount, "skipping read-only drive");
                    return false;
                }
                if drive.drive_type == DriveType::Network {
                    debug!(mount = %drive.mount, "skipping network drive");
                    return false;
                }
                if drive.drive_type == DriveType::Removable
                    && drive.available_bytes < REMOVABLE_MIN_FREE
                {
                    debug!(mount = %drive.mount, "skipping small removable drive");
                    return false;
                }
                true
            })
            .map(|mut drive| {
                drive.performance_score = performance_score(&drive);
                drive
            })
            .collect();

        drives.sort_by(|a, b| {
            b.is_system_drive
                .cmp(&a.is_system_drive)
                .then_with(|| {
                    b.performance_score
                        .partial_cmp(&a.performance_score)
                        .unwrap_or(std::cmp::Ordering::Equal)
                })
                .then_with(|| b.available_bytes.cmp(&a.available_bytes))
        });
        drives
    }

    /// Compute per-component and aggregate space requirements.
    ///
    /// Installation size defaults to twice the download size; temporary
    /// space is the larger of the download and half the installation.
    /// The recommendation adds a 20% safety buffer.
    #[must_use]
    pub fn calculate_space_requirements(&self, components: &[ComponentSpec]) -> SpaceRequirement {
        let mut requirements = Vec::with_capacity(components.len());
        let mut total_download = 0u64;
        let mut total_installation = 0u64;
        let mut total_temporary = 0u64;

        for component in components {
            let download_size = component
                .artifact
                .as_ref()
                .and_then(|a| a.download_size)
                .unwrap_or(0);
            let installation_size = component.install_size.unwrap_or(download_size * 2);
            let temporary_space = download_size.max(installation_size / 2);
            let total_required = download_size + installation_size + temporary_space;

            requirements.push(ComponentSpaceRequirement {
                name: component.name.clone(),
                download_size,
                installation_size,
                temporary_space,
                total_required,
                priority: component.priority,
            });

            total_download += download_size;
            total_installation += installation_size;
            total_temporary += temporary_space;
        }

        let total_required_space = total_download + total_installation + total_temporary;
        SpaceRequirement {
            components: requirements,
            total_download_size: total_download,
            total_installation_size: total_installation,
            total_temporary_space: total_temporary,
            total_required_space,
            recommended_free_space: (total_required_space as f64 * 1.2) as u64,
            analysed_at: Utc::now(),
        }
    }

    /// Decide which components fit into `available_space`.
    ///
    /// Components are taken greedily in (priority, size ascending) order
    /// until the budget runs out; skipping critical or high-priority
    /// components produces a warning recommendation.
    #[must_use]
    pub fn selective_installation(
        &self,
        requirements: &SpaceRequirement,
        available_space: u64,
    ) -> SelectiveInstallResult {
        let mut sorted: Vec<&ComponentSpaceRequirement> = requirements.components.iter().collect();
        sorted.sort_by(|a, b| {
            a.priority
                .cmp(&b.priority)
                .then_with(|| a.total_required.cmp(&b.total_required))
        });

        let mut installable = Vec::new();
        let mut skipped = Vec::new();
        let mut used = 0u64;
        let mut recommendations = Vec::new();

        for component in sorted {
            if used + component.total_required <= available_space {
                used += component.total_required;
                installable.push(component.name.clone());
            } else {
                skipped.push(component.name.clone());
                if matches!(
                    component.priority,
                    InstallPriority::Critical | InstallPriority::High
                ) {
                    warn!(component = %component.name, "important component does not fit");
                    recommendations.push(format!(
                        "consider freeing space for important component: {}",
                        component.name
                    ));
                }
            }
        }

        if !skipped.is_empty() {
            recommendations.push(format!(
                "consider installing {} skipped components later",
                skipped.len()
            ));
        }
        let space_saved = requirements.total_required_space.saturating_sub(used);
        if space_saved > 0 && !skipped.is_empty() {
            recommendations.push(format!(
                "space saved by selective installation: {}",
                format_bytes(space_saved)
            ));
        }

        SelectiveInstallResult {
            installation_feasible: !installable.is_empty(),
            installable,
            skipped,
            space_saved,
            total_space_required: used,
            recommendations,
        }
    }

    /// Best single drive with at least `required_space` free, if any.
    #[must_use]
    pub fn best_drive_for(&self, required_space: u64) -> Option<DriveInfo> {
        self.analyze_system_storage()
            .into_iter()
            .find(|drive| drive.available_bytes >= required_space)
    }
}

/// Composite drive performance score, clamped to `[0, 1]`:
/// +0.3 system drive, up to +0.4 proportional to free fraction,
/// +0.2 SSD/NVMe, −0.1 removable/USB, +0.1 modern filesystem.
#[must_use]
pub fn performance_score(drive: &DriveInfo) -> f64 {
    let mut score = 0.0;

    if drive.is_system_drive {
        score += 0.3;
    }

    score += (drive.free_fraction() * 0.4).min(0.4);

    let device = drive.device.as_deref().unwrap_or("").to_ascii_lowercase();
    if device.contains("nvme") || device.contains("ssd") {
        score += 0.2;
    } else if device.contains("usb") || drive.drive_type == DriveType::Removable {
        score -= 0.1;
    }

    if matches!(
        drive.filesystem.to_ascii_lowercase().as_str(),
        "ntfs" | "ext4" | "apfs" | "btrfs" | "xfs" | "zfs"
    ) {
        score += 0.1;
    }

    score.clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enumerate::StaticDrives;
    use envsmith_core::component::ArtifactSpec;
    use pretty_assertions::assert_eq;

    fn drive(
        mount: &str,
        total_gib: u64,
        free_gib: u64,
        system: bool,
        drive_type: DriveType,
    ) -> DriveInfo {
        const GIB: u64 = 1024 * 1024 * 1024;
        DriveInfo {
            mount: mount.to_string(),
            total_bytes: total_gib * GIB,
            available_bytes: free_gib * GIB,
            used_bytes: (total_gib - free_gib) * GIB,
            filesystem: "ext4".to_string(),
            drive_type,
            is_system_drive: system,
            is_read_only: false,
            device: None,
            performance_score: 0.0,
        }
    }

    fn component(name: &str, download_mib: u64, priority: InstallPriority) -> ComponentSpec {
        let mut spec = ComponentSpec::named(name);
        spec.priority = priority;
        spec.artifact = Some(ArtifactSpec {
            url: "https://example.com/a.tar.zst".parse().unwrap(),
            sha256: "0".repeat(64),
            mirrors: Vec::new(),
            download_size: Some(download_mib * 1024 * 1024),
        });
        spec
    }

    fn analyzer(drives: Vec<DriveInfo>) -> StorageAnalyzer {
        StorageAnalyzer::new(Arc::new(StaticDrives::new(drives)))
    }

    #[test]
    fn unsuitable_drives_are_filtered() {
        let mut read_only = drive("/ro", 100, 50, false, DriveType::Fixed);
        read_only.is_read_only = true;

        let drives = vec![
            drive("/", 200, 100, true, DriveType::Fixed),
            read_only,
            drive("/net", 500, 400, false, DriveType::Network),
            drive("/usb", 8, 0, false, DriveType::Removable),
        ];

        let ranked = analyzer(drives).analyze_system_storage();
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].mount, "/");
    }

    #[test]
    fn system_drive_ranks_first() {
        let drives = vec![
            drive("/data", 2000, 1800, false, DriveType::Fixed),
            drive("/", 500, 250, true, DriveType::Fixed),
        ];
        let ranked = analyzer(drives).analyze_system_storage();
        assert_eq!(ranked[0].mount, "/");
        assert_eq!(ranked[1].mount, "/data");
    }

    #[test]
    fn performance_score_components() {
        let mut d = drive("/", 100, 100, true, DriveType::Fixed);
        d.device = Some("/dev/nvme0n1p2".to_string());
        // 0.3 system + 0.4 free + 0.2 nvme + 0.1 ext4, clamped.
        assert_eq!(performance_score(&d), 1.0);

        let mut usb = drive("/usb", 100, 50, false, DriveType::Removable);
        usb.filesystem = "vfat".to_string();
        // 0.2 free - 0.1 removable.
        assert!((performance_score(&usb) - 0.1).abs() < 1e-9);
    }

    #[test]
    fn space_requirements_apply_defaults() {
        let specs = vec![component("git", 100, InstallPriority::Critical)];
        let req = analyzer(vec![]).calculate_space_requirements(&specs);

        let git = &req.components[0];
        assert_eq!(git.download_size, 100 * 1024 * 1024);
        // Default installation size: twice the download.
        assert_eq!(git.installation_size, 200 * 1024 * 1024);
        // Temporary: max(download, installation / 2).
        assert_eq!(git.temporary_space, 100 * 1024 * 1024);
        assert_eq!(git.total_required, 400 * 1024 * 1024);

        assert_eq!(req.total_required_space, 400 * 1024 * 1024);
        assert_eq!(
            req.recommended_free_space,
            (400.0 * 1024.0 * 1024.0 * 1.2) as u64
        );
    }

    #[test]
    fn explicit_install_size_wins() {
        let mut spec = component("node", 100, InstallPriority::High);
        spec.install_size = Some(50 * 1024 * 1024);
        let req = analyzer(vec![]).calculate_space_requirements(&[spec]);
        assert_eq!(req.components[0].installation_size, 50 * 1024 * 1024);
        // Temporary: download dominates half the installation.
        assert_eq!(req.components[0].temporary_space, 100 * 1024 * 1024);
    }

    #[test]
    fn selective_install_prefers_priority_then_size() {
        let specs = vec![
            component("opt-big", 500, InstallPriority::Optional),
            component("git", 50, InstallPriority::Critical),
            component("node", 100, InstallPriority::High),
        ];
        let a = analyzer(vec![]);
        let req = a.calculate_space_requirements(&specs);

        // Budget covers git (200 MiB total) and node (400 MiB) but not
        // opt-big (2000 MiB).
        let budget = 700 * 1024 * 1024;
        let result = a.selective_installation(&req, budget);

        assert_eq!(result.installable, vec!["git", "node"]);
        assert_eq!(result.skipped, vec!["opt-big"]);
        assert!(result.installation_feasible);
        assert!(result.space_saved > 0);
    }

    #[test]
    fn skipping_critical_component_warns() {
        let specs = vec![component("git", 1000, InstallPriority::Critical)];
        let a = analyzer(vec![]);
        let req = a.calculate_space_requirements(&specs);
        let result = a.selective_installation(&req, 1024);

        assert!(!result.installation_feasible);
        assert!(
            result
                .recommendations
                .iter()
                .any(|r| r.contains("important component"))
        );
    }

    #[test]
    fn best_drive_respects_required_space() {
        const GIB: u64 = 1024 * 1024 * 1024;
        let a = analyzer(vec![
            drive("/", 100, 10, true, DriveType::Fixed),
            drive("/data", 1000, 800, false, DriveType::Fixed),
        ]);
        let best = a.best_drive_for(100 * GIB).unwrap();
        assert_eq!(best.mount, "/data");
        assert!(a.best_drive_for(10_000 * GIB).is_none());
    }
}
