//! npm-backed package-manager port.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::Duration;

use super::{probe_command, run_command};
use crate::port::PackageManagerPort;
use crate::types::{Manager, PackageInfo};

const COMMAND_TIMEOUT: Duration = Duration::from_secs(30);

/// Port backed by the `npm` CLI.
#[derive(Debug, Default)]
pub struct NpmBackend;

impl NpmBackend {
    /// Create the backend.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl PackageManagerPort for NpmBackend {
    fn manager(&self) -> Manager {
        Manager::Npm
    }

    async fn probe(&self) -> bool {
        probe_command("npm").await
    }

    async fn fetch_info(&self, name: &str) -> Option<PackageInfo> {
        let stdout = run_command("npm", &["view", name, "--json"], COMMAND_TIMEOUT).await?;
        let data: Value = serde_json::from_str(&stdout).ok()?;
        Some(parse_npm_view(name, &data))
    }

    async fn fetch_versions(&self, name: &str) -> Vec<String> {
        let Some(stdout) =
            run_command("npm", &["view", name, "versions", "--json"], COMMAND_TIMEOUT).await
        else {
            return Vec::new();
        };

        match serde_json::from_str::<Value>(&stdout) {
            // npm prints a bare string when only one version exists.
            Ok(Value::String(single)) => vec![single],
            Ok(Value::Array(values)) => values
                .into_iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect(),
            _ => Vec::new(),
        }
    }
}

fn parse_npm_view(name: &str, data: &Value) -> PackageInfo {
    let string_map = |key: &str| -> BTreeMap<String, String> {
        data.get(key)
            .and_then(Value::as_object)
            .map(|m| {
                m.iter()
                    .filter_map(|(k, v)| v.as_str().map(|s| (k.clone(), s.to_string())))
                    .collect()
            })
            .unwrap_or_default()
    };

    PackageInfo {
        name: data
            .get("name")
            .and_then(Value::as_str)
            .unwrap_or(name)
            .to_string(),
        version: data
            .get("version")
            .and_then(Value::as_str)
            .unwrap_or("unknown")
            .to_string(),
        description: data
            .get("description")
            .and_then(Value::as_str)
            .map(str::to_string),
        dependencies: string_map("dependencies"),
        dev_dependencies: string_map("devDependencies"),
        available_versions: data
            .get("versions")
            .and_then(Value::as_array)
            .map(|versions| {
                versions
                    .iter()
                    .filter_map(|v| v.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default(),
        latest_version: data
            .get("dist-tags")
            .and_then(|t| t.get("latest"))
            .and_then(Value::as_str)
            .map(str::to_string),
        homepage: data
            .get("homepage")
            .and_then(Value::as_str)
            .map(str::to_string),
        // `repository` may be an object or a bare string; only license is kept.
        license: data
            .get("license")
            .and_then(Value::as_str)
            .map(str::to_string),
    }
}
