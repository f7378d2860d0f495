//! Timeline bucketing for visualisation.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::record::{OperationRecord, OperationStatus, TimelineEvent, TimelineEventKind};

/// Representative events kept per bucket.
const EVENTS_PER_BUCKET: usize = 5;

/// Bucket width for timeline aggregation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimelineGranularity {
    /// One-minute buckets.
    Minute,
    /// One-hour buckets.
    Hour,
    /// One-day buckets.
    Day,
    /// One-week buckets.
    Week,
    /// Thirty-day buckets.
    Month,
}

impl TimelineGranularity {
    /// Width of one bucket.
    #[must_use]
    pub fn width(&self) -> Duration {
        match self {
            Self::Minute => Duration::minutes(1),
            Self::Hour => Duration::hours(1),
            Self::Day => Duration::days(1),
            Self::Week => Duration::weeks(1),
            Self::Month => Duration::days(30),
        }
    }
}

/// One aggregation window of the timeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimelineBucket {
    /// Inclusive bucket start.
    pub start_time: DateTime<Utc>,
    /// Exclusive bucket end.
    pub end_time: DateTime<Utc>,
    /// Number of events in the window.
    pub total_events: usize,
    /// Counts per event type.
    pub event_counts: BTreeMap<String, usize>,
    /// Up to five representative events.
    pub events: Vec<TimelineEvent>,
}

/// Expand records into start/finish events inside `range`, sorted by
/// timestamp, and fold them into buckets of the chosen granularity.
#[must_use]
pub fn build_buckets(
    records: &[OperationRecord],
    range: (DateTime<Utc>, DateTime<Utc>),
    granularity: TimelineGranularity,
) -> Vec<TimelineBucket> {
    let (start, end) = range;
    if start >= end {
        return Vec::new();
    }

    let mut events = expand_events(records);
    events.retain(|event| event.timestamp >= start && event.timestamp < end);
    events.sort_by_key(|event| event.timestamp);

    let width = granularity.width();
    let mut buckets = Vec::new();
    let mut cursor = start;
    let mut event_index = 0usize;

    while cursor < end {
        let bucket_end = (cursor + width).min(end);

        let from = event_index;
        while event_index < events.len() && events[event_index].timestamp < bucket_end {
            event_index += 1;
        }
        let bucket_events = &events[from..event_index];

        let mut event_counts: BTreeMap<String, usize> = BTreeMap::new();
        for event in bucket_events {
            *event_counts.entry(event.event_type.to_string()).or_insert(0) += 1;
        }

        buckets.push(TimelineBucket {
            start_time: cursor,
            end_time: bucket_end,
            total_events: bucket_events.len(),
            event_counts,
            events: bucket_events
                .iter()
                .take(EVENTS_PER_BUCKET)
                .cloned()
                .collect(),
        });

        cursor = bucket_end;
    }

    buckets
}

/// A start event per record plus a finish event once it ended.
fn expand_events(records: &[OperationRecord]) -> Vec<TimelineEvent> {
    let mut events = Vec::with_capacity(records.len() * 2);

    for record in records {
        events.push(TimelineEvent {
            timestamp: record.start_time,
            operation_id: record.id.clone(),
            event_type: TimelineEventKind::Start,
            title: format!("started: {}", record.title),
            description: record.description.clone(),
            component: record.component_name.clone(),
            progress: Some(0.0),
        });

        if let Some(end_time) = record.end_time {
            events.push(TimelineEvent {
                timestamp: end_time,
                operation_id: record.id.clone(),
                event_type: if record.status == OperationStatus::Completed {
                    TimelineEventKind::Complete
                } else {
                    TimelineEventKind::Error
                },
                title: format!("finished: {}", record.title),
                description: format!("status: {}", record.status),
                component: record.component_name.clone(),
                progress: Some(record.progress_percent),
            });
        }
    }

    events
}
