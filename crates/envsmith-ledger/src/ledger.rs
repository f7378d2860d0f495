//! The operation ledger: bounded in-memory view over the durable store.
//!
//! `track` is the single write path. Records are keyed by operation id;
//! terminal records leave the active index; durable-store write failures
//! are logged and retried on the next track call, never surfaced to the
//! operation being tracked.

use ahash::AHashMap;
use chrono::{DateTime, Utc};
use moka::sync::Cache;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::record::{
    OperationProgress, OperationRecord, OperationStatus, OperationSummary, SummaryPeriod,
    TimelineEvent,
};
use crate::store::SqliteStore;
use crate::timeline::{TimelineBucket, TimelineGranularity, build_buckets};

/// Default bound on in-memory records.
pub const DEFAULT_MAX_RECORDS: usize = 10_000;

/// Default retention for `cleanup_old_records`.
pub const DEFAULT_RETENTION_DAYS: i64 = 90;

const SUMMARY_CACHE_TTL: Duration = Duration::from_secs(5 * 60);

/// Filters for history queries.
#[derive(Debug, Clone, Default)]
pub struct HistoryFilters {
    /// Only records with this status.
    pub status: Option<OperationStatus>,
    /// Only records for this component.
    pub component: Option<String>,
    /// Only records starting at or after this time.
    pub since: Option<DateTime<Utc>>,
    /// Only records starting at or before this time.
    pub until: Option<DateTime<Utc>>,
}

/// Aggregate report over the ledger's state.
#[derive(Debug, Clone, serde::Serialize)]
pub struct SystemReport {
    /// Records held in memory.
    pub memory_records: usize,
    /// Records in the durable store.
    pub durable_records: usize,
    /// Operations currently active.
    pub active_operations: usize,
    /// Durable store size in bytes.
    pub database_size_bytes: u64,
    /// Completed share of in-memory records (0-100).
    pub success_rate: f64,
    /// When the report was generated.
    pub generated_at: DateTime<Utc>,
}

#[derive(Default)]
struct LedgerState {
    records: AHashMap<String, OperationRecord>,
    active: AHashMap<String, ()>,
    timeline: Vec<TimelineEvent>,
}

/// Durable, queryable record of every operation.
pub struct OperationLedger {
    state: Mutex<LedgerState>,
    store: Arc<SqliteStore>,
    pending_writes: Mutex<Vec<OperationRecord>>,
    summary_cache: Cache<(String, String), Arc<OperationSummary>>,
    max_records: usize,
}

impl std::fmt::Debug for OperationLedger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("OperationLedger")
            .field("records", &state.records.len())
            .field("active", &state.active.len())
            .field("max_records", &self.max_records)
            .finish_non_exhaustive()
    }
}

impl OperationLedger {
    /// Create a ledger over the given store, warming the in-memory view
    /// with the newest durable records.
    #[must_use]
    pub fn new(store: SqliteStore, max_records: usize) -> Self {
        let store = Arc::new(store);
        let mut state = LedgerState::default();

        match store.load_recent(max_records) {
            Ok(records) => {
                info!(count = records.len(), "warmed ledger from durable store");
                for record in records {
                    if !record.status.is_terminal() {
                        state.active.insert(record.id.clone(), ());
                    }
                    state.records.insert(record.id.clone(), record);
                }
            }
            Err(e) => warn!(error = %e, "could not warm ledger from durable store"),
        }

        Self {
            state: Mutex::new(state),
            store,
            pending_writes: Mutex::new(Vec::new()),
            summary_cache: Cache::builder()
                .time_to_live(SUMMARY_CACHE_TTL)
                .max_capacity(64)
                .build(),
            max_records,
        }
    }

    /// Ledger with the default 10,000-record bound.
    #[must_use]
    pub fn with_defaults(store: SqliteStore) -> Self {
        Self::new(store, DEFAULT_MAX_RECORDS)
    }

    /// Record a progress snapshot.
    ///
    /// Derives status from the snapshot, updates the in-memory record and
    /// active index, emits a timeline event and persists the record.
    /// Durable-store failures never fail the call.
    pub fn track(&self, progress: &OperationProgress) -> bool {
        let record = OperationRecord::from_progress(progress);

        {
            let mut state = self.state.lock();

            if record.status.is_terminal() {
                state.active.remove(&record.id);
            } else {
                state.active.insert(record.id.clone(), ());
            }

            state.timeline.push(TimelineEvent::from_record(&record));
            state.records.insert(record.id.clone(), record.clone());

            if state.records.len() > self.max_records {
                evict_oldest(&mut state, self.max_records);
            }
        }

        self.persist(record);
        true
    }

    fn persist(&self, record: OperationRecord) {
        // Retry anything that failed earlier first, so ordering per id is
        // preserved (earlier failed writes land before this one).
        let mut retry = std::mem::take(&mut *self.pending_writes.lock());
        retry.push(record);

        let mut still_failing = Vec::new();
        for record in retry {
            if let Err(e) = self.store.upsert(&record) {
                warn!(id = %record.id, error = %e, "durable write failed; will retry");
                still_failing.push(record);
            }
        }
        if !still_failing.is_empty() {
            self.pending_writes.lock().extend(still_failing);
        }
    }

    /// Look up one record by id.
    #[must_use]
    pub fn record(&self, id: &str) -> Option<OperationRecord> {
        self.state.lock().records.get(id).cloned()
    }

    /// Currently active (non-terminal) operations.
    #[must_use]
    pub fn active_operations(&self) -> Vec<OperationRecord> {
        let state = self.state.lock();
        state
            .active
            .keys()
            .filter_map(|id| state.records.get(id).cloned())
            .collect()
    }

    /// Paginated, filtered history, newest first.
    #[must_use]
    pub fn get_history(
        &self,
        limit: usize,
        offset: usize,
        filters: Option<&HistoryFilters>,
    ) -> Vec<OperationRecord> {
        let state = self.state.lock();
        let mut records: Vec<OperationRecord> = state
            .records
            .values()
            .filter(|record| matches_filters(record, filters))
            .cloned()
            .collect();
        drop(state);

        records.sort_by(|a, b| b.start_time.cmp(&a.start_time));
        records.into_iter().skip(offset).take(limit).collect()
    }

    /// Case-insensitive substring search across text fields.
    ///
    /// Default fields: title, description, component name and current
    /// step; details, warnings and errors are always searched.
    #[must_use]
    pub fn search_operations(&self, query: &str, fields: Option<&[&str]>) -> Vec<OperationRecord> {
        let query = query.trim().to_lowercase();
        if query.is_empty() {
            return Vec::new();
        }
        let fields = fields.unwrap_or(&["title", "description", "component_name", "current_step"]);

        let state = self.state.lock();
        let mut matches: Vec<OperationRecord> = state
            .records
            .values()
            .filter(|record| {
                let field_hit = fields.iter().any(|field| {
                    let value = match *field {
                        "title" => Some(record.title.as_str()),
                        "description" => Some(record.description.as_str()),
                        "component_name" => record.component_name.as_deref(),
                        "current_step" => Some(record.current_step.as_str()),
                        _ => None,
                    };
                    value.is_some_and(|v| v.to_lowercase().contains(&query))
                });
                field_hit
                    || record
                        .details
                        .iter()
                        .chain(&record.warnings)
                        .chain(&record.errors)
                        .any(|msg| msg.to_lowercase().contains(&query))
            })
            .cloned()
            .collect();
        drop(state);

        matches.sort_by(|a, b| b.start_time.cmp(&a.start_time));
        matches
    }

    /// Aggregate statistics over a period, cached for five minutes per
    /// `(period, component)` pair.
    #[must_use]
    pub fn get_operation_summary(
        &self,
        period: SummaryPeriod,
        component: Option<&str>,
    ) -> Arc<OperationSummary> {
        let cache_key = (
            period.label().to_string(),
            component.unwrap_or("all").to_string(),
        );
        if let Some(hit) = self.summary_cache.get(&cache_key) {
            return hit;
        }

        let since = Utc::now() - period.duration();
        let state = self.state.lock();
        let selected: Vec<&OperationRecord> = state
            .records
            .values()
            .filter(|record| record.start_time >= since)
            .filter(|record| {
                component.is_none_or(|c| record.component_name.as_deref() == Some(c))
            })
            .collect();
        let summary = Arc::new(OperationSummary::from_records(&selected, period.label()));
        drop(state);

        self.summary_cache.insert(cache_key, Arc::clone(&summary));
        summary
    }

    /// Timeline buckets over the given range (default: last 7 days).
    #[must_use]
    pub fn timeline(
        &self,
        range: Option<(DateTime<Utc>, DateTime<Utc>)>,
        granularity: TimelineGranularity,
        component: Option<&str>,
    ) -> Vec<TimelineBucket> {
        let (start, end) = range.unwrap_or_else(|| {
            let end = Utc::now();
            (end - chrono::Duration::days(7), end)
        });

        let state = self.state.lock();
        let records: Vec<OperationRecord> = state
            .records
            .values()
            .filter(|record| {
                component.is_none_or(|c| record.component_name.as_deref() == Some(c))
            })
            .cloned()
            .collect();
        drop(state);

        build_buckets(&records, (start, end), granularity)
    }

    /// Delete records older than `days_to_keep` days from memory and the
    /// durable store, prune the timeline and invalidate caches.
    pub fn cleanup_old_records(&self, days_to_keep: i64) -> usize {
        let cutoff = Utc::now() - chrono::Duration::days(days_to_keep);

        let removed_memory = {
            let mut state = self.state.lock();
            let LedgerState {
                records,
                active,
                timeline,
            } = &mut *state;

            let before = records.len();
            records.retain(|_, record| record.start_time >= cutoff);
            let removed = before - records.len();
            active.retain(|id, _| records.contains_key(id));
            timeline.retain(|event| event.timestamp >= cutoff);
            removed
        };

        let removed_durable = match self.store.delete_before(cutoff) {
            Ok(n) => n,
            Err(e) => {
                warn!(error = %e, "durable cleanup failed");
                0
            }
        };

        self.summary_cache.invalidate_all();
        info!(
            removed_memory,
            removed_durable,
            days_to_keep,
            "old records cleaned up"
        );
        removed_memory.max(removed_durable)
    }

    /// Aggregate report over the ledger and its store.
    #[must_use]
    pub fn system_report(&self) -> SystemReport {
        let state = self.state.lock();
        let total = state.records.len();
        let completed = state
            .records
            .values()
            .filter(|r| r.status == OperationStatus::Completed)
            .count();
        let active = state.active.len();
        drop(state);

        SystemReport {
            memory_records: total,
            durable_records: self.store.count().unwrap_or(0),
            active_operations: active,
            database_size_bytes: self.store.size_bytes(),
            success_rate: if total > 0 {
                completed as f64 / total as f64 * 100.0
            } else {
                0.0
            },
            generated_at: Utc::now(),
        }
    }

    /// Number of durable-store writes waiting for retry.
    #[must_use]
    pub fn pending_write_count(&self) -> usize {
        self.pending_writes.lock().len()
    }
}

fn matches_filters(record: &OperationRecord, filters: Option<&HistoryFilters>) -> bool {
    let Some(filters) = filters else {
        return true;
    };
    if let Some(status) = filters.status
        && record.status != status
    {
        return false;
    }
    if let Some(ref component) = filters.component
        && record.component_name.as_deref() != Some(component.as_str())
    {
        return false;
    }
    if let Some(since) = filters.since
        && record.start_time < since
    {
        return false;
    }
    if let Some(until) = filters.until
        && record.start_time > until
    {
        return false;
    }
    true
}

/// Drop the oldest records (by start time) until `keep` remain.
fn evict_oldest(state: &mut LedgerState, keep: usize) {
    let excess = state.records.len().saturating_sub(keep);
    if excess == 0 {
        return;
    }

    let mut by_age: Vec<(String, DateTime<Utc>)> = state
        .records
        .iter()
        .map(|(id, record)| (id.clone(), record.start_time))
        .collect();
    by_age.sort_by_key(|(_, start)| *start);

    for (id, _) in by_age.into_iter().take(excess) {
        debug!(id = %id, "evicting old record from memory");
        state.records.remove(&id);
        state.active.remove(&id);
    }
}
