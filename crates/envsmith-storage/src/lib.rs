//! Storage planning for Envsmith.
//!
//! Enumerates drives through an abstract port, computes per-component
//! space requirements, runs selective-installation analysis, plans
//! multi-drive distribution, suggests removals when space is short and
//! cleans up stale temporary files.

#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

mod analyzer;
mod distribution;
mod enumerate;
mod models;

pub use analyzer::{StorageAnalyzer, performance_score};
pub use distribution::{CLEANUP_MIN_AGE, DistributionPlanner};
pub use enumerate::{DriveEnumerator, StaticDrives};
#[cfg(unix)]
pub use enumerate::{MountSpec, StatvfsDrives};
pub use models::{
    CleanupResult, ComponentSpaceRequirement, DistributionResult, DriveInfo, DriveType,
    ImpactLevel, PlacementPlan, RemovalSafety, RemovalSuggestion, RemovalSuggestions,
    SelectiveInstallResult, SpaceRequirement, format_bytes,
};
