//! Component and provisioning-request model.
//!
//! A component is a named installable unit: a runtime, SDK, tool or
//! library, with a version, declared dependencies and (optionally) a
//! downloadable artifact. Catalogue files deserialize directly into
//! [`ComponentSpec`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use url::Url;

use crate::version::{Constraint, Version};

/// Kind of installable unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComponentType {
    /// Language runtime (python, node, ...).
    Runtime,
    /// Shared library.
    Library,
    /// Standalone tool.
    Tool,
    /// SDK bundle.
    Sdk,
    /// Emulator image.
    Emulator,
    /// Not registered in the catalogue.
    #[default]
    Unknown,
}

impl fmt::Display for ComponentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Runtime => "runtime",
            Self::Library => "library",
            Self::Tool => "tool",
            Self::Sdk => "sdk",
            Self::Emulator => "emulator",
            Self::Unknown => "unknown",
        };
        write!(f, "{s}")
    }
}

/// Relationship between a dependent and its dependency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DependencyKind {
    /// Must be present for installation.
    Required,
    /// Enhances the component when present.
    Optional,
    /// Needed only while developing against the component.
    Development,
    /// Needed while the component runs.
    Runtime,
    /// Needed only to build the component.
    Build,
}

impl fmt::Display for DependencyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Required => "required",
            Self::Optional => "optional",
            Self::Development => "development",
            Self::Runtime => "runtime",
            Self::Build => "build",
        };
        write!(f, "{s}")
    }
}

/// Installation priority; ordered from most to least important.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum InstallPriority {
    /// The environment is unusable without it.
    Critical,
    /// Strongly expected.
    High,
    /// Ordinary.
    #[default]
    Medium,
    /// Nice to have.
    Low,
    /// Installed only when space is plentiful.
    Optional,
}

impl fmt::Display for InstallPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Critical => "critical",
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
            Self::Optional => "optional",
        };
        write!(f, "{s}")
    }
}

/// Loosely-typed metadata value.
///
/// Catalogue metadata bags stay as string-keyed maps of scalar values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetadataValue {
    /// String value.
    Str(String),
    /// Numeric value.
    Num(f64),
    /// Boolean value.
    Bool(bool),
}

impl From<&str> for MetadataValue {
    fn from(s: &str) -> Self {
        Self::Str(s.to_string())
    }
}

impl From<f64> for MetadataValue {
    fn from(n: f64) -> Self {
        Self::Num(n)
    }
}

impl From<bool> for MetadataValue {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

/// A declared dependency of a component.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DependencyDecl {
    /// Dependency component name.
    pub name: String,
    /// Version constraint, when one is declared.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub constraint: Option<Constraint>,
    /// Relationship kind.
    #[serde(default = "default_dependency_kind")]
    pub kind: DependencyKind,
}

const fn default_dependency_kind() -> DependencyKind {
    DependencyKind::Required
}

impl DependencyDecl {
    /// A required dependency on `name` with an optional constraint.
    #[must_use]
    pub fn required(name: impl Into<String>, constraint: Option<Constraint>) -> Self {
        Self {
            name: name.into(),
            constraint,
            kind: DependencyKind::Required,
        }
    }
}

/// Downloadable artifact backing a component.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactSpec {
    /// Primary download URL (must be HTTPS; enforced by the download engine).
    pub url: Url,
    /// Expected SHA-256 of the artifact, lowercase or uppercase hex.
    pub sha256: String,
    /// Alternative URLs serving the same bytes.
    #[serde(default)]
    pub mirrors: Vec<Url>,
    /// Artifact size in bytes, when published.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub download_size: Option<u64>,
}

/// A named installable unit with its catalogue metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentSpec {
    /// Component name; the identity key together with `version`.
    pub name: String,
    /// Declared (target) version.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<Version>,
    /// Version currently installed, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub installed_version: Option<Version>,
    /// Kind of component.
    #[serde(default)]
    pub component_type: ComponentType,
    /// Installation priority for storage planning.
    #[serde(default)]
    pub priority: InstallPriority,
    /// Whether the component is already installed.
    #[serde(default)]
    pub is_installed: bool,
    /// Where the component is installed, if it is.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub install_path: Option<PathBuf>,
    /// Downloadable artifact, when the component is fetched over the network.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artifact: Option<ArtifactSpec>,
    /// On-disk size after installation, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub install_size: Option<u64>,
    /// Last time the installed component was used.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_used: Option<DateTime<Utc>>,
    /// Declared dependencies.
    #[serde(default)]
    pub dependencies: Vec<DependencyDecl>,
    /// Free-form metadata.
    #[serde(default)]
    pub metadata: std::collections::BTreeMap<String, MetadataValue>,
}

impl ComponentSpec {
    /// Minimal spec with just a name.
    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: None,
            installed_version: None,
            component_type: ComponentType::Unknown,
            priority: InstallPriority::Medium,
            is_installed: false,
            install_path: None,
            artifact: None,
            install_size: None,
            last_used: None,
            dependencies: Vec::new(),
            metadata: std::collections::BTreeMap::new(),
        }
    }

    /// The version a dependency edge should be checked against:
    /// the installed version when present, else the declared one.
    #[must_use]
    pub const fn effective_version(&self) -> Option<&Version> {
        match self.installed_version {
            Some(ref v) => Some(v),
            None => self.version.as_ref(),
        }
    }
}

/// Options controlling a provisioning run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProvisionOptions {
    /// Skip components that do not fit the space budget instead of failing.
    #[serde(default)]
    pub allow_partial: bool,
}

/// A caller's request: which components to provision.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProvisionRequest {
    /// Requested component names, in the caller's preferred order.
    pub components: Vec<String>,
    /// Run options.
    #[serde(default)]
    pub options: ProvisionOptions,
}

impl ProvisionRequest {
    /// Request the given components with default options.
    #[must_use]
    pub fn new(components: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            components: components.into_iter().map(Into::into).collect(),
            options: ProvisionOptions::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn priority_ordering_most_important_first() {
        assert!(InstallPriority::Critical < InstallPriority::High);
        assert!(InstallPriority::High < InstallPriority::Medium);
        assert!(InstallPriority::Low < InstallPriority::Optional);
    }

    #[test]
    fn effective_version_prefers_installed() {
        let mut spec = ComponentSpec::named("git");
        spec.version = Some(Version::new(2, 40, 0));
        assert_eq!(spec.effective_version(), Some(&Version::new(2, 40, 0)));

        spec.installed_version = Some(Version::new(2, 39, 1));
        assert_eq!(spec.effective_version(), Some(&Version::new(2, 39, 1)));
    }

    #[test]
    fn component_spec_round_trips_through_json() {
        let mut spec = ComponentSpec::named("nodejs");
        spec.version = Some(Version::new(20, 10, 0));
        spec.component_type = ComponentType::Runtime;
        spec.priority = InstallPriority::High;
        spec.dependencies.push(DependencyDecl::required(
            "libuv",
            Some(Constraint::parse("^1.44.0").unwrap()),
        ));
        spec.metadata
            .insert("channel".to_string(), MetadataValue::from("lts"));

        let json = serde_json::to_string(&spec).unwrap();
        let back: ComponentSpec = serde_json::from_str(&json).unwrap();
        assert_eq!(back.name, "nodejs");
        assert_eq!(back.version, Some(Version::new(20, 10, 0)));
        assert_eq!(back.dependencies.len(), 1);
        assert_eq!(back.dependencies[0].kind, DependencyKind::Required);
    }

    #[test]
    fn metadata_values_deserialize_untagged() {
        let json = r#"{"a": "text", "b": 2.5, "c": true}"#;
        let map: std::collections::BTreeMap<String, MetadataValue> =
            serde_json::from_str(json).unwrap();
        assert_eq!(map["a"], MetadataValue::Str("text".into()));
        assert_eq!(map["b"], MetadataValue::Num(2.5));
        assert_eq!(map["c"], MetadataValue::Bool(true));
    }
}
