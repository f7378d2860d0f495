//! Short-lived package-metadata cache.
//!
//! External package managers are slow to query; metadata is cached for an
//! hour, keyed by `(manager, package name)`, to bound external traffic.

use moka::sync::Cache;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use crate::types::{Manager, PackageInfo};

/// Default time-to-live for cached metadata.
pub const DEFAULT_TTL: Duration = Duration::from_secs(60 * 60);

/// Default maximum number of cached packages.
pub const DEFAULT_CAPACITY: u64 = 10_000;

/// TTL cache over package metadata.
pub struct PackageCache {
    inner: Cache<(Manager, String), Arc<PackageInfo>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl std::fmt::Debug for PackageCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PackageCache")
            .field("hits", &self.hits.load(Ordering::Relaxed))
            .field("misses", &self.misses.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

impl PackageCache {
    /// Create a cache with the given TTL and capacity.
    #[must_use]
    pub fn new(ttl: Duration, capacity: u64) -> Self {
        Self {
            inner: Cache::builder()
                .time_to_live(ttl)
                .max_capacity(capacity)
                .build(),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Cache with the default one-hour TTL.
    #[must_use]
    pub fn with_defaults() -> Self {
        Self::new(DEFAULT_TTL, DEFAULT_CAPACITY)
    }

    /// Look up cached metadata.
    #[must_use]
    pub fn get(&self, manager: Manager, name: &str) -> Option<Arc<PackageInfo>> {
        let hit = self.inner.get(&(manager, name.to_string()));
        if hit.is_some() {
            self.hits.fetch_add(1, Ordering::Relaxed);
        } else {
            self.misses.fetch_add(1, Ordering::Relaxed);
        }
        hit
    }

    /// Store metadata.
    pub fn put(&self, manager: Manager, info: PackageInfo) -> Arc<PackageInfo> {
        let shared = Arc::new(info);
        self.inner
            .insert((manager, shared.name.clone()), Arc::clone(&shared));
        shared
    }

    /// Drop every entry.
    pub fn clear(&self) {
        self.inner.invalidate_all();
    }

    /// Hit/miss counters, for diagnostics.
    #[must_use]
    pub fn stats(&self) -> (u64, u64) {
        (
            self.hits.load(Ordering::Relaxed),
            self.misses.load(Ordering::Relaxed),
        )
    }
}

impl Default for PackageCache {
    fn default() -> Self {
        Self::with_defaults()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_and_stats() {
        let cache = PackageCache::with_defaults();
        assert!(cache.get(Manager::Npm, "react").is_none());

        cache.put(
            Manager::Npm,
            PackageInfo {
                name: "react".into(),
                version: "18.2.0".into(),
                ..PackageInfo::default()
            },
        );

        let hit = cache.get(Manager::Npm, "react").unwrap();
        assert_eq!(hit.version, "18.2.0");

        // Keys are scoped by manager.
        assert!(cache.get(Manager::Pip, "react").is_none());

        let (hits, misses) = cache.stats();
        assert_eq!(hits, 1);
        assert_eq!(misses, 2);
    }

    #[test]
    fn entries_expire_after_ttl() {
        let cache = PackageCache::new(Duration::from_millis(10), 16);
        cache.put(
            Manager::Pip,
            PackageInfo {
                name: "requests".into(),
                version: "2.31.0".into(),
                ..PackageInfo::default()
            },
        );
        std::thread::sleep(Duration::from_millis(30));
        assert!(cache.get(Manager::Pip, "requests").is_none());
    }
}
