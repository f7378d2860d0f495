//! Multi-drive distribution planning, removal suggestions, temp cleanup.

use chrono::Utc;
use envsmith_core::component::{ComponentSpec, ComponentType, InstallPriority};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::models::{
    CleanupResult, DistributionResult, DriveInfo, DriveType, ImpactLevel, PlacementPlan,
    RemovalSafety, RemovalSuggestion, RemovalSuggestions, format_bytes,
};

/// File patterns eligible for temporary cleanup.
const CLEANUP_SUFFIXES: &[&str] = &[".tmp", ".temp", ".log", "~", ".bak", ".old"];

/// Default age threshold for temp-file cleanup.
pub const CLEANUP_MIN_AGE: Duration = Duration::from_secs(60 * 60);

/// Plans component placement across drives.
#[derive(Debug, Default)]
pub struct DistributionPlanner;

impl DistributionPlanner {
    /// Create a planner.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Assign each component to the best drive that can hold it.
    ///
    /// Components are placed in (priority, size descending) order; each
    /// drive's capacity is debited as placements accumulate, so the plan
    /// never oversubscribes a drive. Components that fit nowhere produce
    /// warnings; the plan is still returned.
    #[must_use]
    pub fn distribute(
        &self,
        components: &[ComponentSpec],
        drives: &[DriveInfo],
    ) -> DistributionResult {
        let suitable = suitable_drives(drives);
        if suitable.is_empty() {
            return DistributionResult {
                plans: Vec::new(),
                total_components: components.len(),
                drives_used: Vec::new(),
                distribution_feasible: false,
                warnings: vec!["no suitable drives available".to_string()],
            };
        }

        let mut ordered: Vec<&ComponentSpec> = components.iter().collect();
        ordered.sort_by(|a, b| {
            a.priority
                .cmp(&b.priority)
                .then_with(|| installed_size(b).cmp(&installed_size(a)))
        });

        let mut plans: Vec<PlacementPlan> = Vec::new();
        let mut warnings = Vec::new();
        let mut usage: envsmith_core::AHashMap<String, u64> = envsmith_core::AHashMap::new();

        for component in ordered {
            let size = installed_size(component);
            let placed = suitable
                .iter()
                .filter_map(|drive| {
                    let used = usage.get(&drive.mount).copied().unwrap_or(0);
                    let available_after = drive.available_bytes.saturating_sub(used);
                    if available_after < size {
                        return None;
                    }
                    let score = placement_score(drive, component, used, available_after);
                    Some((drive, score))
                })
                .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));

            match placed {
                Some((drive, _)) => {
                    *usage.entry(drive.mount.clone()).or_insert(0) += size;
                    debug!(component = %component.name, drive = %drive.mount, "placed component");
                    plans.push(PlacementPlan {
                        component: component.name.clone(),
                        drive: drive.mount.clone(),
                        install_path: Path::new(&drive.mount)
                            .join("envsmith")
                            .join(&component.name),
                        space_required: size,
                        reason: placement_reason(drive, component.priority),
                    });
                }
                None => {
                    warn!(component = %component.name, size, "no drive can hold component");
                    warnings.push(format!(
                        "no drive has {} free for '{}'",
                        format_bytes(size),
                        component.name
                    ));
                }
            }
        }

        let mut drives_used: Vec<String> = plans.iter().map(|p| p.drive.clone()).collect();
        drives_used.sort();
        drives_used.dedup();

        let distribution_feasible = plans.len() == components.len();
        info!(
            placed = plans.len(),
            requested = components.len(),
            feasible = distribution_feasible,
            "distribution planned"
        );

        DistributionResult {
            plans,
            total_components: components.len(),
            drives_used,
            distribution_feasible,
            warnings,
        }
    }

    /// Suggest installed components to remove to free `required_space`.
    ///
    /// Suggestions stop accumulating once 150% of the deficit is covered.
    /// The recommended subset contains only safe, low/optional-priority
    /// components whose size is at least 10% of the deficit.
    #[must_use]
    pub fn suggest_removals(
        &self,
        installed: &[ComponentSpec],
        required_space: u64,
    ) -> RemovalSuggestions {
        let mut ordered: Vec<&ComponentSpec> = installed.iter().collect();
        // Most removable first: optional before critical, larger first,
        // longest-unused first.
        ordered.sort_by(|a, b| {
            b.priority
                .cmp(&a.priority)
                .then_with(|| installed_size(b).cmp(&installed_size(a)))
                .then_with(|| a.last_used.cmp(&b.last_used))
        });

        let mut suggestions = Vec::new();
        let mut recommended = Vec::new();
        let mut total_potential = 0u64;

        for component in ordered {
            let size = installed_size(component);
            let safety = removal_safety(component);
            let impact = removal_impact(component);

            suggestions.push(RemovalSuggestion {
                component: component.name.clone(),
                space_freed: size,
                impact,
                safety,
                description: format!(
                    "{} ({}) - priority {}, {} to remove, {} impact",
                    component.name,
                    format_bytes(size),
                    component.priority,
                    safety,
                    impact
                ),
            });
            total_potential += size;

            if safety == RemovalSafety::Safe
                && matches!(
                    component.priority,
                    InstallPriority::Low | InstallPriority::Optional
                )
                && size >= required_space / 10
            {
                recommended.push(component.name.clone());
            }

            if total_potential >= required_space + required_space / 2 {
                break;
            }
        }

        RemovalSuggestions {
            suggestions,
            total_potential_space: total_potential,
            recommended,
            analysed_at: Utc::now(),
        }
    }

    /// Delete stale temporary files under the given installation paths,
    /// optionally including the OS temp directory.
    ///
    /// Matches `*.tmp`, `*.temp`, `*.log`, `*~`, `*.bak`, `*.old` older
    /// than `min_age`. Errors are collected, never raised.
    #[must_use]
    pub fn cleanup_temp_files(
        &self,
        install_paths: &[PathBuf],
        min_age: Duration,
        include_os_temp: bool,
    ) -> CleanupResult {
        let mut result = CleanupResult::default();

        let mut roots: Vec<PathBuf> = install_paths.to_vec();
        if include_os_temp {
            roots.push(std::env::temp_dir());
        }

        for root in roots {
            if !root.exists() {
                continue;
            }
            for entry in WalkDir::new(&root).into_iter().filter_map(std::result::Result::ok) {
                if !entry.file_type().is_file() {
                    continue;
                }
                let name = entry.file_name().to_string_lossy();
                if !CLEANUP_SUFFIXES.iter().any(|suffix| name.ends_with(suffix)) {
                    continue;
                }

                let Ok(metadata) = entry.metadata() else {
                    continue;
                };
                let old_enough = metadata
                    .modified()
                    .ok()
                    .and_then(|modified| modified.elapsed().ok())
                    .is_some_and(|age| age >= min_age);
                if !old_enough {
                    continue;
                }

                match std::fs::remove_file(entry.path()) {
                    Ok(()) => {
                        result.space_freed += metadata.len();
                        result.removed_files.push(entry.path().to_path_buf());
                    }
                    Err(e) => {
                        result
                            .errors
                            .push(format!("{}: {e}", entry.path().display()));
                    }
                }
            }
        }

        info!(
            removed = result.removed_files.len(),
            freed = result.space_freed,
            errors = result.errors.len(),
            "temporary cleanup finished"
        );
        result
    }
}

/// Drives eligible for placement: writable, local, and either fixed or
/// the only option.
fn suitable_drives(drives: &[DriveInfo]) -> Vec<&DriveInfo> {
    let mut suitable: Vec<&DriveInfo> = drives
        .iter()
        .filter(|drive| {
            !drive.is_read_only
                && drive.drive_type != DriveType::Network
                && drive.available_bytes >= 1024 * 1024 * 1024
        })
        .filter(|drive| drive.drive_type != DriveType::Removable || drives.len() == 1)
        .collect();

    suitable.sort_by(|a, b| {
        b.performance_score
            .partial_cmp(&a.performance_score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| b.available_bytes.cmp(&a.available_bytes))
    });
    suitable
}

/// Bytes the component will occupy once installed.
fn installed_size(component: &ComponentSpec) -> u64 {
    component.install_size.unwrap_or_else(|| {
        component
            .artifact
            .as_ref()
            .and_then(|a| a.download_size)
            .map_or(0, |download| download * 2)
    })
}

/// Placement score: `0.4·performance + 0.3·free-after + 0.2·(1−usage)`
/// plus a small bias pairing critical components with the system drive
/// and everything else with non-system drives.
fn placement_score(
    drive: &DriveInfo,
    component: &ComponentSpec,
    current_usage: u64,
    available_after: u64,
) -> f64 {
    let mut score = drive.performance_score * 0.4;

    if drive.total_bytes > 0 {
        score += available_after as f64 / drive.total_bytes as f64 * 0.3;
        score += (1.0 - current_usage as f64 / drive.total_bytes as f64) * 0.2;
    }

    if component.priority == InstallPriority::Critical && drive.is_system_drive {
        score += 0.1;
    } else if !drive.is_system_drive {
        score += 0.05;
    }

    score
}

fn placement_reason(drive: &DriveInfo, priority: InstallPriority) -> String {
    let mut reasons = Vec::new();
    if drive.is_system_drive && priority == InstallPriority::Critical {
        reasons.push("system drive for critical component");
    } else if !drive.is_system_drive {
        reasons.push("non-system drive preserves system space");
    }
    if drive.performance_score > 0.8 {
        reasons.push("high performance drive");
    }
    if drive.available_bytes > 100 * 1024 * 1024 * 1024 {
        reasons.push("ample free space");
    }
    if reasons.is_empty() {
        "best available option".to_string()
    } else {
        reasons.join("; ")
    }
}

fn removal_safety(component: &ComponentSpec) -> RemovalSafety {
    if component.priority == InstallPriority::Critical
        || component.component_type == ComponentType::Runtime
    {
        RemovalSafety::Risky
    } else if component.priority == InstallPriority::High || !component.dependencies.is_empty() {
        RemovalSafety::Caution
    } else {
        RemovalSafety::Safe
    }
}

fn removal_impact(component: &ComponentSpec) -> ImpactLevel {
    if matches!(
        component.priority,
        InstallPriority::Critical | InstallPriority::High
    ) || !component.dependencies.is_empty()
    {
        ImpactLevel::High
    } else if component.priority == InstallPriority::Medium {
        ImpactLevel::Medium
    } else {
        ImpactLevel::Low
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use envsmith_core::component::ArtifactSpec;
    use pretty_assertions::assert_eq;

    const GIB: u64 = 1024 * 1024 * 1024;
    const MIB: u64 = 1024 * 1024;

    fn drive(mount: &str, free_gib: u64, score: f64, system: bool) -> DriveInfo {
        DriveInfo {
            mount: mount.to_string(),
            total_bytes: free_gib * GIB * 2,
            available_bytes: free_gib * GIB,
            used_bytes: free_gib * GIB,
            filesystem: "ext4".to_string(),
            drive_type: DriveType::Fixed,
            is_system_drive: system,
            is_read_only: false,
            device: None,
            performance_score: score,
        }
    }

    fn component(name: &str, size_mib: u64, priority: InstallPriority) -> ComponentSpec {
        let mut spec = ComponentSpec::named(name);
        spec.priority = priority;
        spec.install_size = Some(size_mib * MIB);
        spec.artifact = Some(ArtifactSpec {
            url: "https://example.com/a".parse().unwrap(),
            sha256: "0".repeat(64),
            mirrors: Vec::new(),
            download_size: Some(size_mib * MIB / 2),
        });
        spec
    }

    #[test]
    fn distributes_all_components_across_drives() {
        // S8: system drive C and a roomier, faster data drive D.
        let drives = vec![
            drive("C:", 500, 0.8, true),
            drive("D:", 1843, 0.9, false),
        ];
        let components = vec![
            component("git", 100, InstallPriority::Critical),
            component("nodejs", 200, InstallPriority::High),
            component("optional-tool", 500, InstallPriority::Optional),
            component("big-component", 1024, InstallPriority::Medium),
        ];

        let result = DistributionPlanner::new().distribute(&components, &drives);

        assert!(result.distribution_feasible);
        assert_eq!(result.plans.len(), 4);
        assert!(result.drives_used.contains(&"D:".to_string()));
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn placements_never_oversubscribe_a_drive() {
        let drives = vec![drive("/only", 2, 0.9, false)];
        let components = vec![
            component("a", 1024, InstallPriority::High),
            component("b", 1024, InstallPriority::High),
            component("c", 1024, InstallPriority::High),
        ];

        let result = DistributionPlanner::new().distribute(&components, &drives);

        let total_placed: u64 = result.plans.iter().map(|p| p.space_required).sum();
        assert!(total_placed <= 2 * GIB);
        assert_eq!(result.plans.len(), 2);
        assert!(!result.distribution_feasible);
        assert_eq!(result.warnings.len(), 1);
    }

    #[test]
    fn no_suitable_drives_is_reported() {
        let mut network = drive("/net", 100, 0.9, false);
        network.drive_type = DriveType::Network;

        let result =
            DistributionPlanner::new().distribute(&[component("x", 1, InstallPriority::Low)], &[network]);
        assert!(!result.distribution_feasible);
        assert_eq!(result.warnings, vec!["no suitable drives available"]);
    }

    #[test]
    fn critical_components_bias_to_system_drive() {
        // Equal drives except the system flag; the bias must tip placement.
        let drives = vec![drive("/sys", 100, 0.5, true), drive("/data", 100, 0.5, false)];
        let components = vec![component("kernel-tool", 100, InstallPriority::Critical)];

        let result = DistributionPlanner::new().distribute(&components, &drives);
        assert_eq!(result.plans[0].drive, "/sys");
    }

    #[test]
    fn removal_suggestions_order_and_recommendation() {
        let mut old_optional = component("old-game-sdk", 2048, InstallPriority::Optional);
        old_optional.last_used = Some(chrono::Utc::now() - chrono::Duration::days(400));

        let mut runtime = component("python", 1024, InstallPriority::Critical);
        runtime.component_type = ComponentType::Runtime;

        let installed = vec![runtime, old_optional.clone(), component("linter", 64, InstallPriority::Low)];

        let needed = GIB;
        let result = DistributionPlanner::new().suggest_removals(&installed, needed);

        // Optional, large and long unused comes first.
        assert_eq!(result.suggestions[0].component, "old-game-sdk");
        assert_eq!(result.suggestions[0].safety, RemovalSafety::Safe);
        assert_eq!(result.suggestions[0].impact, ImpactLevel::Low);

        // Safe + optional + >=10% of deficit makes the recommended list.
        assert!(result.recommended.contains(&"old-game-sdk".to_string()));
        // The critical runtime is never recommended.
        assert!(!result.recommended.contains(&"python".to_string()));
        // Accumulation stops once 150% of the deficit is covered.
        assert!(result.total_potential_space >= needed + needed / 2);
        assert_eq!(result.suggestions.len(), 1);
    }

    #[test]
    fn cleanup_removes_matching_stale_files() {
        let dir = tempfile::tempdir().unwrap();
        let stale = dir.path().join("build.tmp");
        let fresh_keep = dir.path().join("data.json");
        std::fs::write(&stale, b"x".repeat(100)).unwrap();
        std::fs::write(&fresh_keep, b"keep").unwrap();

        let result = DistributionPlanner::new().cleanup_temp_files(
            &[dir.path().to_path_buf()],
            Duration::ZERO,
            false,
        );

        assert!(result.removed_files.contains(&stale));
        assert!(!stale.exists());
        assert!(fresh_keep.exists());
        assert!(result.space_freed >= 100);
        assert!(result.errors.is_empty());
    }

    #[test]
    fn cleanup_age_threshold_protects_recent_files() {
        let dir = tempfile::tempdir().unwrap();
        let recent = dir.path().join("active.log");
        std::fs::write(&recent, b"still in use").unwrap();

        let result = DistributionPlanner::new().cleanup_temp_files(
            &[dir.path().to_path_buf()],
            CLEANUP_MIN_AGE,
            false,
        );

        assert!(recent.exists());
        assert!(!result.removed_files.contains(&recent));
    }
}
