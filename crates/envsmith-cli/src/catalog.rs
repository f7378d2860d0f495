//! Component catalogue loading.
//!
//! The catalogue is a JSON file declaring the components the tool can
//! provision, deserializing straight into [`ComponentSpec`] records.

use anyhow::Context;
use envsmith_core::component::ComponentSpec;
use serde::Deserialize;
use std::path::Path;

/// Declared drives, for deployments that configure storage explicitly.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CatalogDrives {
    /// Candidate drives.
    #[serde(default)]
    pub drives: Vec<envsmith_storage::DriveInfo>,
}

/// A loaded component catalogue.
#[derive(Debug, Clone, Deserialize)]
pub struct Catalog {
    /// All known components.
    pub components: Vec<ComponentSpec>,
    /// Optional drive declarations.
    #[serde(default)]
    pub storage: CatalogDrives,
}

impl Catalog {
    /// Load a catalogue from a JSON file.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("cannot read catalogue {}", path.display()))?;
        let catalog: Self = serde_json::from_str(&raw)
            .with_context(|| format!("invalid catalogue {}", path.display()))?;
        Ok(catalog)
    }

    /// Look up a component by name.
    #[must_use]
    pub fn find(&self, name: &str) -> Option<&ComponentSpec> {
        self.components.iter().find(|c| c.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loads_minimal_catalogue() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("catalog.json");
        std::fs::write(
            &path,
            r#"{
                "components": [
                    {"name": "git", "version": "2.44.0", "component_type": "tool", "priority": "critical"},
                    {"name": "nodejs", "version": "20.10.0", "component_type": "runtime"}
                ]
            }"#,
        )
        .unwrap();

        let catalog = Catalog::load(&path).unwrap();
        assert_eq!(catalog.components.len(), 2);
        assert!(catalog.find("git").is_some());
        assert!(catalog.find("ghost").is_none());
    }

    #[test]
    fn rejects_malformed_catalogue() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.json");
        std::fs::write(&path, "{not json").unwrap();
        assert!(Catalog::load(&path).is_err());
    }
}
