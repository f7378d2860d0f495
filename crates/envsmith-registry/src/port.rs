//! The package-manager port and its façade.
//!
//! Backends implement the raw [`PackageManagerPort`] operations; the
//! [`Registry`] façade adds deadlines, metadata caching and the
//! constraint-aware operations the resolver consumes. Every façade call
//! degrades to `None`/empty on timeout rather than erroring: the
//! dependency resolver tolerates missing metadata.

use ahash::AHashMap;
use async_trait::async_trait;
use envsmith_core::version::VersionScorer;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::cache::PackageCache;
use crate::types::{ConflictReport, Manager, PackageInfo, ResolvedDependency, ResolvedTree};

/// Default deadline for a single port operation.
pub const DEFAULT_DEADLINE: Duration = Duration::from_secs(30);

/// Maximum depth for recursive dependency resolution.
const MAX_RESOLVE_DEPTH: usize = 16;

/// Abstract capability over an external package manager.
#[async_trait]
pub trait PackageManagerPort: Send + Sync {
    /// Which manager this port talks to.
    fn manager(&self) -> Manager;

    /// Whether the manager is usable on this system.
    async fn probe(&self) -> bool;

    /// Fetch package metadata. `None` when the package is unknown or the
    /// manager fails.
    async fn fetch_info(&self, name: &str) -> Option<PackageInfo>;

    /// List published versions. Empty when enumeration is unsupported.
    async fn fetch_versions(&self, name: &str) -> Vec<String>;
}

/// Façade over a [`PackageManagerPort`] with deadlines and caching.
pub struct Registry {
    port: Arc<dyn PackageManagerPort>,
    cache: PackageCache,
    scorer: VersionScorer,
    deadline: Duration,
    availability: Mutex<Option<bool>>,
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("manager", &self.port.manager())
            .field("deadline", &self.deadline)
            .finish_non_exhaustive()
    }
}

impl Registry {
    /// Wrap a port with the default 30-second deadline.
    #[must_use]
    pub fn new(port: Arc<dyn PackageManagerPort>) -> Self {
        Self::with_deadline(port, DEFAULT_DEADLINE)
    }

    /// Wrap a port with a custom per-operation deadline.
    #[must_use]
    pub fn with_deadline(port: Arc<dyn PackageManagerPort>, deadline: Duration) -> Self {
        Self {
            port,
            cache: PackageCache::with_defaults(),
            scorer: VersionScorer::new(),
            deadline,
            availability: Mutex::new(None),
        }
    }

    /// Which manager this registry queries.
    #[must_use]
    pub fn manager(&self) -> Manager {
        self.port.manager()
    }

    /// Whether the backing manager is available. Memoised after the first
    /// probe; a timed-out probe counts as unavailable.
    pub async fn is_available(&self) -> bool {
        if let Some(known) = *self.availability.lock() {
            return known;
        }
        let available = tokio::time::timeout(self.deadline, self.port.probe())
            .await
            .unwrap_or(false);
        *self.availability.lock() = Some(available);
        available
    }

    /// Package metadata, from cache when fresh.
    pub async fn package_info(&self, name: &str) -> Option<Arc<PackageInfo>> {
        if let Some(hit) = self.cache.get(self.manager(), name) {
            return Some(hit);
        }

        let fetched = tokio::time::timeout(self.deadline, self.port.fetch_info(name))
            .await
            .ok()
            .flatten()?;
        Some(self.cache.put(self.manager(), fetched))
    }

    /// Published versions of a package. Prefers the cached metadata's
    /// version list; falls back to a dedicated enumeration call.
    pub async fn available_versions(&self, name: &str) -> Vec<String> {
        if let Some(info) = self.cache.get(self.manager(), name)
            && !info.available_versions.is_empty()
        {
            return info.available_versions.clone();
        }

        tokio::time::timeout(self.deadline, self.port.fetch_versions(name))
            .await
            .unwrap_or_default()
    }

    /// Best published version satisfying all constraints, if any.
    pub async fn find_compatible_version(
        &self,
        name: &str,
        constraints: &[String],
    ) -> Option<String> {
        let versions = self.available_versions(name).await;
        if versions.is_empty() {
            return None;
        }
        self.scorer
            .find_compatible(&versions, constraints)
            .first()
            .map(|(version, _)| version.clone())
    }

    /// Resolve a package's dependency tree breadth-first.
    ///
    /// Already-visited packages are skipped, so cyclic metadata cannot
    /// loop; depth is bounded defensively as well.
    pub async fn resolve_dependencies(
        &self,
        name: &str,
        constraints: Option<&[String]>,
    ) -> ResolvedTree {
        if !self.is_available().await {
            return ResolvedTree::failed(
                name,
                format!("{} is not available", self.manager()),
            );
        }

        let Some(root) = self.package_info(name).await else {
            return ResolvedTree::failed(name, format!("package {name} not found"));
        };

        let pinned_root = match constraints {
            Some(constraints) if !constraints.is_empty() => {
                self.find_compatible_version(name, constraints).await
            }
            _ => None,
        };

        let mut visited: ahash::AHashSet<String> = ahash::AHashSet::new();
        visited.insert(name.to_string());

        let mut resolved = Vec::new();
        let mut frontier: Vec<(String, Option<String>, usize)> = root
            .dependencies
            .iter()
            .map(|(dep, constraint)| (dep.clone(), Some(constraint.clone()), 1))
            .collect();

        while let Some((dep_name, constraint, depth)) = frontier.pop() {
            if depth > MAX_RESOLVE_DEPTH || !visited.insert(dep_name.clone()) {
                continue;
            }

            let pinned = match constraint {
                Some(ref c) => {
                    self.find_compatible_version(&dep_name, std::slice::from_ref(c))
                        .await
                }
                None => None,
            };

            if let Some(info) = self.package_info(&dep_name).await {
                for (child, child_constraint) in &info.dependencies {
                    frontier.push((child.clone(), Some(child_constraint.clone()), depth + 1));
                }
            } else {
                debug!(package = %dep_name, "no metadata; leaving subtree unresolved");
            }

            resolved.push(ResolvedDependency {
                name: dep_name,
                constraint,
                pinned,
                depth,
            });
        }

        let mut tree = ResolvedTree {
            root: name.to_string(),
            success: true,
            error: None,
            package: Some(root),
            dependencies: resolved,
        };
        if let Some(pinned) = pinned_root {
            tree.dependencies.insert(
                0,
                ResolvedDependency {
                    name: name.to_string(),
                    constraint: constraints.map(|c| c.join(", ")),
                    pinned: Some(pinned),
                    depth: 0,
                },
            );
        }
        tree
    }

    /// Check a dependency list for per-package constraint conflicts.
    ///
    /// Each entry is a dependency string (`name>=1.0.0`); constraints are
    /// grouped by package and packages with multiple mutually-unsatisfiable
    /// constraints are reported.
    pub async fn check_conflicts(&self, dependencies: &[String]) -> Vec<ConflictReport> {
        let mut grouped: AHashMap<String, Vec<String>> = AHashMap::new();
        for dep in dependencies {
            let (name, constraint) = split_dependency(dep);
            grouped.entry(name).or_default().push(constraint);
        }

        let mut conflicts = Vec::new();
        for (package, constraints) in grouped {
            if constraints.len() < 2 {
                continue;
            }

            let available = self.available_versions(&package).await;
            let compatible = self.scorer.find_compatible(&available, &constraints);
            if !compatible.is_empty() {
                continue;
            }

            warn!(package = %package, "conflicting constraints");
            let suggestion = self
                .scorer
                .suggest_resolution(&constraints, Some(&available));
            conflicts.push(ConflictReport {
                package,
                constraints,
                available_versions: available.into_iter().take(10).collect(),
                suggestion,
            });
        }

        conflicts.sort_by(|a, b| a.package.cmp(&b.package));
        conflicts
    }

    /// Cache statistics as `(hits, misses)`.
    #[must_use]
    pub fn cache_stats(&self) -> (u64, u64) {
        self.cache.stats()
    }
}

/// Split a dependency string into `(name, constraint)`.
///
/// `"pkg>=1.0.0"` → `("pkg", ">=1.0.0")`; a bare name gets a wildcard-ish
/// empty constraint that matches anything during scoring.
fn split_dependency(dep: &str) -> (String, String) {
    let dep = dep.trim();
    let split_at = dep
        .find(|c| matches!(c, '>' | '<' | '=' | '^' | '~' | ' '))
        .unwrap_or(dep.len());
    let (name, constraint) = dep.split_at(split_at);
    let constraint = constraint.trim();
    (
        name.trim().to_string(),
        if constraint.is_empty() {
            ">=0.0.0".to_string()
        } else {
            constraint.to_string()
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::BTreeMap;

    /// In-memory port for tests.
    struct StaticPort {
        packages: AHashMap<String, PackageInfo>,
        delay: Option<Duration>,
    }

    impl StaticPort {
        fn new(packages: Vec<PackageInfo>) -> Self {
            Self {
                packages: packages
                    .into_iter()
                    .map(|p| (p.name.clone(), p))
                    .collect(),
                delay: None,
            }
        }
    }

    #[async_trait]
    impl PackageManagerPort for StaticPort {
        fn manager(&self) -> Manager {
            Manager::Npm
        }

        async fn probe(&self) -> bool {
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            true
        }

        async fn fetch_info(&self, name: &str) -> Option<PackageInfo> {
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            self.packages.get(name).cloned()
        }

        async fn fetch_versions(&self, name: &str) -> Vec<String> {
            self.packages
                .get(name)
                .map(|p| p.available_versions.clone())
                .unwrap_or_default()
        }
    }

    fn pkg(name: &str, version: &str, deps: &[(&str, &str)], versions: &[&str]) -> PackageInfo {
        PackageInfo {
            name: name.into(),
            version: version.into(),
            dependencies: deps
                .iter()
                .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
                .collect::<BTreeMap<_, _>>(),
            available_versions: versions.iter().map(|s| (*s).to_string()).collect(),
            ..PackageInfo::default()
        }
    }

    #[tokio::test]
    async fn metadata_is_cached() {
        let port = Arc::new(StaticPort::new(vec![pkg("react", "18.2.0", &[], &[])]));
        let registry = Registry::new(port);

        assert!(registry.package_info("react").await.is_some());
        assert!(registry.package_info("react").await.is_some());

        let (hits, _) = registry.cache_stats();
        assert_eq!(hits, 1);
    }

    #[tokio::test]
    async fn timeout_degrades_to_none() {
        let mut port = StaticPort::new(vec![pkg("slow", "1.0.0", &[], &[])]);
        port.delay = Some(Duration::from_millis(200));
        let registry = Registry::with_deadline(Arc::new(port), Duration::from_millis(20));

        assert!(!registry.is_available().await);
        assert!(registry.package_info("slow").await.is_none());
    }

    #[tokio::test]
    async fn find_compatible_picks_best_version() {
        let port = Arc::new(StaticPort::new(vec![pkg(
            "lib",
            "2.0.0",
            &[],
            &["0.9.0", "1.2.3", "1.9.0", "2.0.0"],
        )]));
        let registry = Registry::new(port);

        let best = registry
            .find_compatible_version("lib", &["^1.2.0".to_string()])
            .await;
        assert_eq!(best.as_deref(), Some("1.2.3"));
    }

    #[tokio::test]
    async fn resolve_walks_dependencies_without_looping() {
        let port = Arc::new(StaticPort::new(vec![
            pkg("a", "1.0.0", &[("b", "^1.0.0")], &["1.0.0"]),
            pkg("b", "1.1.0", &[("a", "^1.0.0")], &["1.0.0", "1.1.0"]),
        ]));
        let registry = Registry::new(port);

        let tree = registry.resolve_dependencies("a", None).await;
        assert!(tree.success);
        assert_eq!(tree.dependencies.len(), 1);
        assert_eq!(tree.dependencies[0].name, "b");
        // Scoring prefers the version closest to the constraint's reference.
        assert_eq!(tree.dependencies[0].pinned.as_deref(), Some("1.0.0"));
    }

    #[tokio::test]
    async fn resolve_unknown_package_fails_cleanly() {
        let registry = Registry::new(Arc::new(StaticPort::new(vec![])));
        let tree = registry.resolve_dependencies("ghost", None).await;
        assert!(!tree.success);
        assert!(tree.error.unwrap().contains("not found"));
    }

    #[tokio::test]
    async fn conflicts_reported_per_package() {
        let port = Arc::new(StaticPort::new(vec![pkg(
            "shared",
            "1.5.0",
            &[],
            &["1.0.0", "1.5.0", "2.0.0"],
        )]));
        let registry = Registry::new(port);

        let conflicts = registry
            .check_conflicts(&["shared==1.0.0".to_string(), "shared==2.0.0".to_string()])
            .await;
        assert_eq!(conflicts.len(), 1);
        assert_eq!(conflicts[0].package, "shared");
        assert_eq!(conflicts[0].constraints.len(), 2);

        // Satisfiable constraints stay quiet.
        let none = registry
            .check_conflicts(&["shared>=1.0.0".to_string(), "shared<=2.0.0".to_string()])
            .await;
        assert!(none.is_empty());
    }

    #[test]
    fn dependency_strings_split_cleanly() {
        assert_eq!(
            split_dependency("pkg>=1.0.0"),
            ("pkg".to_string(), ">=1.0.0".to_string())
        );
        assert_eq!(
            split_dependency("pkg ^2.0"),
            ("pkg".to_string(), "^2.0".to_string())
        );
        assert_eq!(
            split_dependency("bare"),
            ("bare".to_string(), ">=0.0.0".to_string())
        );
    }
}
