//! Package-manager metadata types.

use envsmith_core::version::ResolutionSuggestion;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// External package managers the port can back onto.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Manager {
    /// Node package manager.
    Npm,
    /// Python pip.
    Pip,
    /// Conda.
    Conda,
    /// Yarn.
    Yarn,
    /// Pipenv.
    Pipenv,
}

impl Manager {
    /// Executable name to invoke.
    #[must_use]
    pub const fn command(&self) -> &'static str {
        match self {
            Self::Npm => "npm",
            Self::Pip => "pip",
            Self::Conda => "conda",
            Self::Yarn => "yarn",
            Self::Pipenv => "pipenv",
        }
    }
}

impl fmt::Display for Manager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.command())
    }
}

/// Package metadata as reported by a package manager.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PackageInfo {
    /// Package name.
    pub name: String,
    /// Current/latest installed version string.
    pub version: String,
    /// Short description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Direct dependencies (name → declared constraint string).
    #[serde(default)]
    pub dependencies: BTreeMap<String, String>,
    /// Development-only dependencies.
    #[serde(default)]
    pub dev_dependencies: BTreeMap<String, String>,
    /// All published versions, oldest first when the manager reports order.
    #[serde(default)]
    pub available_versions: Vec<String>,
    /// Latest published version, when distinguished from `version`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latest_version: Option<String>,
    /// Project homepage.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub homepage: Option<String>,
    /// License identifier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub license: Option<String>,
}

/// One node of a resolved dependency tree, flattened.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolvedDependency {
    /// Dependency name.
    pub name: String,
    /// Declared constraint, as reported by the manager.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub constraint: Option<String>,
    /// Version the constraint resolves to, when one was found.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pinned: Option<String>,
    /// Distance from the root (direct dependencies are depth 1).
    pub depth: usize,
}

/// Result of resolving a package's dependency tree.
#[derive(Debug, Clone)]
pub struct ResolvedTree {
    /// Root package name.
    pub root: String,
    /// Whether resolution produced usable data.
    pub success: bool,
    /// Failure description, when unsuccessful.
    pub error: Option<String>,
    /// Metadata of the root package.
    pub package: Option<Arc<PackageInfo>>,
    /// Flattened dependencies, parents before children.
    pub dependencies: Vec<ResolvedDependency>,
}

impl ResolvedTree {
    /// A failed resolution with an explanation.
    #[must_use]
    pub fn failed(root: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            success: false,
            error: Some(error.into()),
            package: None,
            dependencies: Vec::new(),
        }
    }
}

/// A conflict among constraints targeting one package.
#[derive(Debug, Clone)]
pub struct ConflictReport {
    /// Conflicted package.
    pub package: String,
    /// The constraints that cannot be satisfied together.
    pub constraints: Vec<String>,
    /// A sample of available versions (at most ten).
    pub available_versions: Vec<String>,
    /// Suggested way out.
    pub suggestion: ResolutionSuggestion,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manager_command_names() {
        assert_eq!(Manager::Npm.command(), "npm");
        assert_eq!(Manager::Pip.to_string(), "pip");
    }

    #[test]
    fn package_info_deserializes_with_defaults() {
        let info: PackageInfo =
            serde_json::from_str(r#"{"name": "left-pad", "version": "1.3.0"}"#).unwrap();
        assert_eq!(info.name, "left-pad");
        assert!(info.dependencies.is_empty());
        assert!(info.latest_version.is_none());
    }
}
