//! Mirror health registry.
//!
//! Tracks per-mirror latency and success/failure counts under a single
//! mutex held briefly; the probe itself runs with no lock held. Probes
//! are rate-limited to one per mirror per five-minute window.

use ahash::AHashMap;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use crate::client::HttpClient;

/// Health state of a mirror.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MirrorStatus {
    /// Responded in under two seconds.
    Healthy,
    /// Responded in under five seconds.
    Slow,
    /// Probe failed or took five seconds or more.
    Unreachable,
    /// More recorded failures than successes.
    Failed,
}

/// Tracked state for one mirror.
#[derive(Debug, Clone, Serialize)]
pub struct MirrorInfo {
    /// Mirror URL.
    pub url: String,
    /// Current status.
    pub status: MirrorStatus,
    /// Last probed response time in seconds.
    pub response_time_secs: f64,
    /// Successful downloads served.
    pub success_count: u64,
    /// Failed downloads.
    pub failure_count: u64,
    /// When the mirror last served a successful download.
    pub last_used: Option<DateTime<Utc>>,
    /// When the mirror was last probed (monotonic; not serialized).
    #[serde(skip)]
    pub last_health_check: Option<Instant>,
}

impl MirrorInfo {
    fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            status: MirrorStatus::Healthy,
            response_time_secs: 0.0,
            success_count: 0,
            failure_count: 0,
            last_used: None,
            last_health_check: None,
        }
    }

    /// Fraction of recorded attempts that succeeded.
    #[must_use]
    pub fn success_rate(&self) -> f64 {
        let total = self.success_count + self.failure_count;
        if total == 0 {
            // No data yet; treat as fully trustworthy so new mirrors get tried.
            return 1.0;
        }
        self.success_count as f64 / total as f64
    }

    /// Selection score: success rate with a small latency penalty.
    #[must_use]
    pub fn score(&self) -> f64 {
        self.success_rate() - 0.1 * self.response_time_secs
    }
}

/// Registry of mirror health, safe to share across download tasks.
#[derive(Debug, Default)]
pub struct MirrorRegistry {
    health: Mutex<AHashMap<String, MirrorInfo>>,
    check_interval: Duration,
}

impl MirrorRegistry {
    /// Create a registry with the given probe rate limit.
    #[must_use]
    pub fn new(check_interval: Duration) -> Self {
        Self {
            health: Mutex::new(AHashMap::new()),
            check_interval,
        }
    }

    /// Make sure every URL has a tracked entry.
    pub fn ensure_known<'a>(&self, urls: impl IntoIterator<Item = &'a str>) {
        let mut health = self.health.lock();
        for url in urls {
            health
                .entry(url.to_string())
                .or_insert_with(|| MirrorInfo::new(url));
        }
    }

    /// Record a successful download from `url`.
    pub fn record_success(&self, url: &str) {
        let mut health = self.health.lock();
        let info = health
            .entry(url.to_string())
            .or_insert_with(|| MirrorInfo::new(url));
        info.success_count += 1;
        info.last_used = Some(Utc::now());
        info.status = MirrorStatus::Healthy;
    }

    /// Record a failed download from `url`. A mirror that has failed more
    /// often than it has succeeded is marked failed.
    pub fn record_failure(&self, url: &str) {
        let mut health = self.health.lock();
        let info = health
            .entry(url.to_string())
            .or_insert_with(|| MirrorInfo::new(url));
        info.failure_count += 1;
        if info.failure_count > info.success_count {
            info.status = MirrorStatus::Failed;
        }
    }

    /// Probe a mirror's health unless it was probed within the rate-limit
    /// window. The HEAD request runs without holding the registry lock.
    pub async fn check_health(&self, client: &HttpClient, url: &str) {
        {
            let mut health = self.health.lock();
            let info = health
                .entry(url.to_string())
                .or_insert_with(|| MirrorInfo::new(url));
            if let Some(last) = info.last_health_check
                && last.elapsed() < self.check_interval
            {
                return;
            }
            // Claim the probe window before releasing the lock so
            // concurrent callers do not double-probe.
            info.last_health_check = Some(Instant::now());
        }

        let probe_result = match client.ensure_secure_url(url) {
            Ok(parsed) => client.probe(&parsed).await.map(|(_, elapsed)| elapsed),
            Err(e) => Err(e),
        };

        let mut health = self.health.lock();
        let Some(info) = health.get_mut(url) else {
            return;
        };
        match probe_result {
            Ok(elapsed) => {
                info.response_time_secs = elapsed.as_secs_f64();
                info.status = if elapsed < Duration::from_secs(2) {
                    MirrorStatus::Healthy
                } else if elapsed < Duration::from_secs(5) {
                    MirrorStatus::Slow
                } else {
                    MirrorStatus::Unreachable
                };
                debug!(url, elapsed_secs = info.response_time_secs, status = ?info.status, "mirror probed");
            }
            Err(e) => {
                info.status = MirrorStatus::Unreachable;
                warn!(url, error = %e, "mirror unreachable");
            }
        }
    }

    /// Select the best mirror among `candidates`.
    ///
    /// Only healthy or slow mirrors are eligible, ranked by
    /// `success_rate − 0.1 × response_time`; ties break on URL so the
    /// choice is deterministic. Falls back to the first candidate when
    /// nothing is eligible.
    #[must_use]
    pub fn select_best(&self, candidates: &[String]) -> Option<String> {
        let health = self.health.lock();

        let mut eligible: Vec<&MirrorInfo> = candidates
            .iter()
            .filter_map(|url| health.get(url))
            .filter(|info| matches!(info.status, MirrorStatus::Healthy | MirrorStatus::Slow))
            .collect();

        if eligible.is_empty() {
            return candidates.first().cloned();
        }

        eligible.sort_by(|a, b| {
            b.score()
                .partial_cmp(&a.score())
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.url.cmp(&b.url))
        });
        Some(eligible[0].url.clone())
    }

    /// Order `candidates` from most to least preferred.
    #[must_use]
    pub fn preferred_order(&self, candidates: &[String]) -> Vec<String> {
        let health = self.health.lock();
        let mut ordered: Vec<String> = candidates.to_vec();
        ordered.sort_by(|a, b| {
            let score = |url: &String| health.get(url).map_or(1.0, MirrorInfo::score);
            score(b)
                .partial_cmp(&score(a))
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.cmp(b))
        });
        ordered
    }

    /// Snapshot of every tracked mirror.
    #[must_use]
    pub fn report(&self) -> Vec<MirrorInfo> {
        let mut mirrors: Vec<MirrorInfo> = self.health.lock().values().cloned().collect();
        mirrors.sort_by(|a, b| a.url.cmp(&b.url));
        mirrors
    }

    /// Look up one mirror's state.
    #[must_use]
    pub fn get(&self, url: &str) -> Option<MirrorInfo> {
        self.health.lock().get(url).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn registry() -> MirrorRegistry {
        MirrorRegistry::new(Duration::from_secs(300))
    }

    #[test]
    fn success_rate_defaults_to_trusting() {
        let info = MirrorInfo::new("https://m1");
        assert_eq!(info.success_rate(), 1.0);
    }

    #[test]
    fn failures_exceeding_successes_mark_failed() {
        let reg = registry();
        reg.record_success("https://m1");
        reg.record_failure("https://m1");
        assert_eq!(reg.get("https://m1").unwrap().status, MirrorStatus::Healthy);

        reg.record_failure("https://m1");
        assert_eq!(reg.get("https://m1").unwrap().status, MirrorStatus::Failed);
    }

    #[test]
    fn selection_prefers_higher_score() {
        let reg = registry();
        let urls = vec!["https://m1".to_string(), "https://m2".to_string()];
        reg.ensure_known(urls.iter().map(String::as_str));

        for _ in 0..4 {
            reg.record_success("https://m2");
        }
        reg.record_failure("https://m1");
        reg.record_success("https://m1");
        // m1 is back to healthy after its success but has a worse rate.

        assert_eq!(reg.select_best(&urls).as_deref(), Some("https://m2"));
    }

    #[test]
    fn selection_never_returns_failed_mirrors_when_alternatives_exist() {
        let reg = registry();
        let urls = vec!["https://bad".to_string(), "https://good".to_string()];
        reg.ensure_known(urls.iter().map(String::as_str));

        reg.record_failure("https://bad");
        reg.record_success("https://good");

        assert_eq!(reg.select_best(&urls).as_deref(), Some("https://good"));
    }

    #[test]
    fn selection_falls_back_to_first_when_none_eligible() {
        let reg = registry();
        let urls = vec!["https://a".to_string(), "https://b".to_string()];
        reg.ensure_known(urls.iter().map(String::as_str));
        reg.record_failure("https://a");
        reg.record_failure("https://b");

        assert_eq!(reg.select_best(&urls).as_deref(), Some("https://a"));
        assert_eq!(reg.select_best(&[]), None);
    }

    #[test]
    fn equal_scores_break_ties_by_url() {
        let reg = registry();
        let urls = vec!["https://zeta".to_string(), "https://alpha".to_string()];
        reg.ensure_known(urls.iter().map(String::as_str));

        assert_eq!(reg.select_best(&urls).as_deref(), Some("https://alpha"));
    }

    #[test]
    fn preferred_order_is_stable() {
        let reg = registry();
        let urls = vec!["https://b".to_string(), "https://a".to_string()];
        reg.ensure_known(urls.iter().map(String::as_str));
        let ordered = reg.preferred_order(&urls);
        assert_eq!(ordered, vec!["https://a".to_string(), "https://b".to_string()]);
    }
}
