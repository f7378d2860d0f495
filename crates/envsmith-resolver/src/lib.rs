//! Dependency resolution for Envsmith.
//!
//! Builds a dependency graph from registered component metadata, detects
//! circular dependencies and version conflicts, and produces resolution
//! plans with time estimates and success probabilities.
//!
//! # Example
//!
//! ```rust
//! use envsmith_resolver::GraphAnalyzer;
//! use envsmith_core::ComponentSpec;
//!
//! let analyzer = GraphAnalyzer::new();
//! analyzer.register_component(ComponentSpec::named("git"));
//!
//! let result = analyzer.analyze_components(&["git".to_string()]);
//! assert!(!result.has_critical_issues());
//! ```

#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

mod analyzer;
mod graph;
mod types;

pub use analyzer::GraphAnalyzer;
pub use graph::{
    CircularDependency, DependencyEdge, DependencyGraph, DependencyNode, Severity, VersionConflict,
};
pub use types::{Complexity, DependencyAnalysisResult, ResolutionPath};
