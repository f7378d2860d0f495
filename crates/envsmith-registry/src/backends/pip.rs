//! pip-backed package-manager port.
//!
//! Version enumeration relies on `pip index versions`, which is not
//! universally supported; any unparseable or failing output degrades to
//! an empty list, with `pip show` as a single-version fallback.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::time::Duration;

use super::{probe_command, run_command};
use crate::port::PackageManagerPort;
use crate::types::{Manager, PackageInfo};

const COMMAND_TIMEOUT: Duration = Duration::from_secs(30);

/// Port backed by the `pip` CLI.
#[derive(Debug, Default)]
pub struct PipBackend;

impl PipBackend {
    /// Create the backend.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl PackageManagerPort for PipBackend {
    fn manager(&self) -> Manager {
        Manager::Pip
    }

    async fn probe(&self) -> bool {
        probe_command("pip").await
    }

    async fn fetch_info(&self, name: &str) -> Option<PackageInfo> {
        let stdout = run_command("pip", &["show", name], COMMAND_TIMEOUT).await?;
        let fields = parse_show_output(&stdout);
        if fields.is_empty() {
            return None;
        }

        let available_versions = self.fetch_versions(name).await;

        Some(PackageInfo {
            name: fields.get("name").cloned().unwrap_or_else(|| name.to_string()),
            version: fields
                .get("version")
                .cloned()
                .unwrap_or_else(|| "unknown".to_string()),
            description: fields.get("summary").cloned(),
            dependencies: fields
                .get("requires")
                .map(|requires| {
                    requires
                        .split(',')
                        .map(str::trim)
                        .filter(|s| !s.is_empty())
                        .map(|dep| (dep.to_string(), ">=0.0.0".to_string()))
                        .collect()
                })
                .unwrap_or_default(),
            dev_dependencies: BTreeMap::new(),
            available_versions,
            latest_version: None,
            homepage: fields.get("home-page").cloned(),
            license: fields.get("license").cloned(),
        })
    }

    async fn fetch_versions(&self, name: &str) -> Vec<String> {
        if let Some(stdout) =
            run_command("pip", &["index", "versions", name], COMMAND_TIMEOUT).await
            && let Some(versions) = parse_index_versions(&stdout)
        {
            return versions;
        }

        // Fallback: report the installed version alone.
        if let Some(stdout) = run_command("pip", &["show", name], COMMAND_TIMEOUT).await
            && let Some(version) = parse_show_output(&stdout).get("version")
        {
            return vec![version.clone()];
        }

        Vec::new()
    }
}

/// Parse `pip show` `Key: value` lines into a lowercase-keyed map.
fn parse_show_output(stdout: &str) -> BTreeMap<String, String> {
    stdout
        .lines()
        .filter_map(|line| {
            let (key, value) = line.split_once(':')?;
            let value = value.trim();
            (!value.is_empty()).then(|| (key.trim().to_ascii_lowercase(), value.to_string()))
        })
        .collect()
}

/// Parse `pip index versions` output, tolerating both known formats:
///
/// ```text
/// package (1.2.0)
/// Available versions: 1.2.0, 1.1.0, 1.0.0
/// ```
///
/// and the older layout that lists `LATEST:` / `INSTALLED:` lines.
fn parse_index_versions(stdout: &str) -> Option<Vec<String>> {
    for line in stdout.lines() {
        if let Some(rest) = line.trim().strip_prefix("Available versions:") {
            let versions: Vec<String> = rest
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect();
            return (!versions.is_empty()).then_some(versions);
        }
    }

    // Older pip prints only LATEST; a single version is better than none.
    for line in stdout.lines() {
        if let Some(rest) = line.trim().strip_prefix("LATEST:") {
            let version = rest.trim();
            if !version.is_empty() {
                return Some(vec![version.to_string()]);
            }
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_show_output() {
        let out = "Name: requests\nVersion: 2.31.0\nSummary: HTTP for Humans\nRequires: idna, urllib3\n";
        let fields = parse_show_output(out);
        assert_eq!(fields["name"], "requests");
        assert_eq!(fields["version"], "2.31.0");
        assert_eq!(fields["requires"], "idna, urllib3");
    }

    #[test]
    fn parses_modern_index_versions() {
        let out = "requests (2.31.0)\nAvailable versions: 2.31.0, 2.30.0, 2.29.0\n";
        assert_eq!(
            parse_index_versions(out).unwrap(),
            vec!["2.31.0", "2.30.0", "2.29.0"]
        );
    }

    #[test]
    fn parses_legacy_latest_line() {
        let out = "requests (2.31.0)\n  INSTALLED: 2.30.0\n  LATEST: 2.31.0\n";
        assert_eq!(parse_index_versions(out).unwrap(), vec!["2.31.0"]);
    }

    #[test]
    fn unparseable_output_yields_none() {
        assert!(parse_index_versions("ERROR: unknown command").is_none());
        assert!(parse_index_versions("").is_none());
    }
}
