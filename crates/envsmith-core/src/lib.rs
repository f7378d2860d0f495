//! Core types for the Envsmith provisioning core.
//!
//! This crate provides the foundations shared by every engine:
//! - Semantic version algebra and compatibility scoring
//! - The component / provisioning-request model
//! - Error types with stable codes

#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

pub mod component;
pub mod error;
pub mod version;

pub use component::{
    ArtifactSpec, ComponentSpec, ComponentType, DependencyDecl, DependencyKind, InstallPriority,
    MetadataValue, ProvisionOptions, ProvisionRequest,
};
pub use error::{Error, ErrorCode, Result};
pub use version::{
    CompatibilityLevel, CompatibilityScore, Constraint, Feasibility, ResolutionKind,
    ResolutionSuggestion, Version, VersionScorer,
};

// Re-export commonly used types
pub use ahash::{AHashMap, AHashSet};
pub use parking_lot::{Mutex, RwLock};
