//! Bandwidth accounting for parallel batches.
//!
//! Purely advisory: utilisation is reported against a configured
//! baseline and never gates correctness. Updates are infallible; a
//! failed update is silently skipped.

use parking_lot::Mutex;
use serde::Serialize;
use std::time::Instant;

#[derive(Debug, Default)]
struct MonitorState {
    monitoring: bool,
    started: Option<Instant>,
    total_bytes: u64,
    current_mbps: f64,
    peak_mbps: f64,
}

/// Bandwidth statistics snapshot.
#[derive(Debug, Clone, Serialize)]
pub struct BandwidthStats {
    /// Total bytes recorded since monitoring started.
    pub total_bytes: u64,
    /// Seconds elapsed since monitoring started.
    pub elapsed_seconds: f64,
    /// Average throughput in MiB/s.
    pub average_mbps: f64,
    /// Highest observed throughput in MiB/s.
    pub peak_mbps: f64,
    /// Utilisation against the baseline (0-100).
    pub utilization_percent: f64,
}

/// Thread-safe bandwidth accumulator.
#[derive(Debug)]
pub struct BandwidthMonitor {
    state: Mutex<MonitorState>,
    baseline_mbps: f64,
}

impl BandwidthMonitor {
    /// Create a monitor with the given utilisation baseline in Mbps.
    #[must_use]
    pub fn new(baseline_mbps: f64) -> Self {
        Self {
            state: Mutex::new(MonitorState::default()),
            baseline_mbps: baseline_mbps.max(f64::EPSILON),
        }
    }

    /// Start (or restart) monitoring, resetting counters.
    pub fn start(&self) {
        let mut state = self.state.lock();
        *state = MonitorState {
            monitoring: true,
            started: Some(Instant::now()),
            ..MonitorState::default()
        };
    }

    /// Stop monitoring; counters stay readable.
    pub fn stop(&self) {
        self.state.lock().monitoring = false;
    }

    /// Record downloaded bytes. No-op when monitoring is stopped.
    pub fn record(&self, bytes: u64) {
        let mut state = self.state.lock();
        if !state.monitoring {
            return;
        }
        state.total_bytes += bytes;
        if let Some(started) = state.started {
            let elapsed = started.elapsed().as_secs_f64();
            if elapsed > 0.0 {
                state.current_mbps = state.total_bytes as f64 / elapsed / (1024.0 * 1024.0);
                state.peak_mbps = state.peak_mbps.max(state.current_mbps);
            }
        }
    }

    /// Current utilisation against the baseline, as a percentage.
    #[must_use]
    pub fn utilization_percent(&self) -> f64 {
        let state = self.state.lock();
        (state.current_mbps / self.baseline_mbps * 100.0).min(100.0)
    }

    /// Full statistics snapshot.
    #[must_use]
    pub fn stats(&self) -> BandwidthStats {
        let state = self.state.lock();
        let elapsed_seconds = state
            .started
            .map_or(0.0, |started| started.elapsed().as_secs_f64());
        BandwidthStats {
            total_bytes: state.total_bytes,
            elapsed_seconds,
            average_mbps: state.current_mbps,
            peak_mbps: state.peak_mbps,
            utilization_percent: (state.current_mbps / self.baseline_mbps * 100.0).min(100.0),
        }
    }
}

impl Default for BandwidthMonitor {
    fn default() -> Self {
        Self::new(10.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_only_while_monitoring() {
        let monitor = BandwidthMonitor::default();
        monitor.record(1024);
        assert_eq!(monitor.stats().total_bytes, 0);

        monitor.start();
        monitor.record(1024);
        monitor.record(2048);
        assert_eq!(monitor.stats().total_bytes, 3072);

        monitor.stop();
        monitor.record(4096);
        assert_eq!(monitor.stats().total_bytes, 3072);
    }

    #[test]
    fn utilization_is_capped_at_hundred() {
        let monitor = BandwidthMonitor::new(0.000001);
        monitor.start();
        monitor.record(100 * 1024 * 1024);
        assert!(monitor.utilization_percent() <= 100.0);
    }

    #[test]
    fn restart_resets_counters() {
        let monitor = BandwidthMonitor::default();
        monitor.start();
        monitor.record(1024);
        monitor.start();
        assert_eq!(monitor.stats().total_bytes, 0);
    }
}
