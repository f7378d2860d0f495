//! Operation records, progress inputs and summaries.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

/// Kind of operation being tracked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    /// Artifact download.
    Download,
    /// Component installation.
    Install,
    /// Component removal.
    Uninstall,
    /// Component update.
    Update,
    /// Environment or artifact verification.
    Verification,
    /// Configuration change.
    Configuration,
    /// Cleanup run.
    Cleanup,
    /// Dependency or storage analysis.
    Analysis,
    /// Anything else.
    Other,
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Download => "download",
            Self::Install => "install",
            Self::Uninstall => "uninstall",
            Self::Update => "update",
            Self::Verification => "verification",
            Self::Configuration => "configuration",
            Self::Cleanup => "cleanup",
            Self::Analysis => "analysis",
            Self::Other => "other",
        };
        write!(f, "{s}")
    }
}

impl OperationKind {
    /// Parse the snake_case form emitted by [`fmt::Display`].
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s {
            "download" => Self::Download,
            "install" => Self::Install,
            "uninstall" => Self::Uninstall,
            "update" => Self::Update,
            "verification" => Self::Verification,
            "configuration" => Self::Configuration,
            "cleanup" => Self::Cleanup,
            "analysis" => Self::Analysis,
            _ => Self::Other,
        }
    }
}

/// Lifecycle status of an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationStatus {
    /// Created, not progressing yet.
    Pending,
    /// Actively progressing.
    Running,
    /// Finished successfully.
    Completed,
    /// Finished with errors.
    Failed,
    /// Cancelled by the caller.
    Cancelled,
    /// Timed out.
    Timeout,
}

impl OperationStatus {
    /// Whether this status ends the operation's lifecycle.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Completed | Self::Failed | Self::Cancelled | Self::Timeout
        )
    }
}

impl fmt::Display for OperationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
            Self::Timeout => "timeout",
        };
        write!(f, "{s}")
    }
}

impl OperationStatus {
    /// Parse the snake_case form emitted by [`fmt::Display`].
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s {
            "running" => Self::Running,
            "completed" => Self::Completed,
            "failed" => Self::Failed,
            "cancelled" => Self::Cancelled,
            "timeout" => Self::Timeout,
            _ => Self::Pending,
        }
    }
}

/// Progress snapshot submitted to the ledger by an operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationProgress {
    /// Caller-supplied operation id.
    pub id: String,
    /// Kind of operation.
    pub kind: OperationKind,
    /// Component the operation concerns, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub component_name: Option<String>,
    /// Short human-readable title.
    pub title: String,
    /// Longer description.
    #[serde(default)]
    pub description: String,
    /// When the operation started.
    pub start_time: DateTime<Utc>,
    /// Completion percentage (0-100).
    #[serde(default)]
    pub progress_percent: f64,
    /// Name of the current step.
    #[serde(default)]
    pub current_step: String,
    /// Total number of steps.
    #[serde(default = "default_total_steps")]
    pub total_steps: u32,
    /// Current step number (1-based).
    #[serde(default)]
    pub step_number: u32,
    /// Informational messages.
    #[serde(default)]
    pub details: Vec<String>,
    /// Warning messages.
    #[serde(default)]
    pub warnings: Vec<String>,
    /// Error messages. Non-empty errors imply a failed status.
    #[serde(default)]
    pub errors: Vec<String>,
    /// Structured result once finished.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    /// Free-form metadata.
    #[serde(default)]
    pub metadata: BTreeMap<String, serde_json::Value>,
    /// Acting user, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    /// Session the operation belongs to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    /// Host/system facts captured at start.
    #[serde(default)]
    pub system_info: BTreeMap<String, serde_json::Value>,
    /// Set when the operation finished successfully.
    #[serde(default)]
    pub is_completed: bool,
    /// Set when the operation was cancelled.
    #[serde(default)]
    pub is_cancelled: bool,
}

const fn default_total_steps() -> u32 {
    1
}

impl OperationProgress {
    /// Fresh pending progress for a new operation.
    #[must_use]
    pub fn begin(id: impl Into<String>, kind: OperationKind, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind,
            component_name: None,
            title: title.into(),
            description: String::new(),
            start_time: Utc::now(),
            progress_percent: 0.0,
            current_step: String::new(),
            total_steps: 1,
            step_number: 0,
            details: Vec::new(),
            warnings: Vec::new(),
            errors: Vec::new(),
            result: None,
            metadata: BTreeMap::new(),
            user_id: None,
            session_id: None,
            system_info: BTreeMap::new(),
            is_completed: false,
            is_cancelled: false,
        }
    }

    /// Status this progress snapshot implies.
    #[must_use]
    pub fn derived_status(&self) -> OperationStatus {
        if self.is_cancelled {
            OperationStatus::Cancelled
        } else if self.is_completed || self.progress_percent >= 100.0 {
            OperationStatus::Completed
        } else if !self.errors.is_empty() {
            OperationStatus::Failed
        } else if self.progress_percent > 0.0 {
            OperationStatus::Running
        } else {
            OperationStatus::Pending
        }
    }
}

/// Durable record of one operation's lifecycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationRecord {
    /// Operation id.
    pub id: String,
    /// Kind of operation.
    pub kind: OperationKind,
    /// Current lifecycle status.
    pub status: OperationStatus,
    /// Component concerned.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub component_name: Option<String>,
    /// Short title.
    pub title: String,
    /// Longer description.
    #[serde(default)]
    pub description: String,
    /// Start timestamp.
    pub start_time: DateTime<Utc>,
    /// End timestamp, once terminal.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,
    /// Duration in seconds, once terminal.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_seconds: Option<f64>,
    /// Completion percentage.
    #[serde(default)]
    pub progress_percent: f64,
    /// Name of the current step.
    #[serde(default)]
    pub current_step: String,
    /// Total number of steps.
    #[serde(default = "default_total_steps")]
    pub total_steps: u32,
    /// Current step number.
    #[serde(default)]
    pub step_number: u32,
    /// Informational messages.
    #[serde(default)]
    pub details: Vec<String>,
    /// Warning messages.
    #[serde(default)]
    pub warnings: Vec<String>,
    /// Error messages.
    #[serde(default)]
    pub errors: Vec<String>,
    /// Structured result.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    /// Free-form metadata.
    #[serde(default)]
    pub metadata: BTreeMap<String, serde_json::Value>,
    /// Acting user.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    /// Session id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    /// Host/system facts.
    #[serde(default)]
    pub system_info: BTreeMap<String, serde_json::Value>,
    /// When the record row was first created.
    pub created_at: DateTime<Utc>,
}

impl OperationRecord {
    /// Build a record from a progress snapshot, deriving status and,
    /// for terminal statuses, end time and duration.
    #[must_use]
    pub fn from_progress(progress: &OperationProgress) -> Self {
        let status = progress.derived_status();
        let (end_time, duration_seconds) = if status.is_terminal() {
            let end = Utc::now();
            let duration = (end - progress.start_time)
                .to_std()
                .unwrap_or(Duration::ZERO)
                .as_secs_f64();
            (Some(end), Some(duration))
        } else {
            (None, None)
        };

        Self {
            id: progress.id.clone(),
            kind: progress.kind,
            status,
            component_name: progress.component_name.clone(),
            title: progress.title.clone(),
            description: progress.description.clone(),
            start_time: progress.start_time,
            end_time,
            duration_seconds,
            progress_percent: progress.progress_percent,
            current_step: progress.current_step.clone(),
            total_steps: progress.total_steps,
            step_number: progress.step_number,
            details: progress.details.clone(),
            warnings: progress.warnings.clone(),
            errors: progress.errors.clone(),
            result: progress.result.clone(),
            metadata: progress.metadata.clone(),
            user_id: progress.user_id.clone(),
            session_id: progress.session_id.clone(),
            system_info: progress.system_info.clone(),
            created_at: Utc::now(),
        }
    }
}

/// Kind of timeline event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimelineEventKind {
    /// Operation started.
    Start,
    /// Operation reported progress.
    Progress,
    /// Operation completed.
    Complete,
    /// Operation failed.
    Error,
}

impl fmt::Display for TimelineEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Start => "start",
            Self::Progress => "progress",
            Self::Complete => "complete",
            Self::Error => "error",
        };
        write!(f, "{s}")
    }
}

/// One point on the operation timeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimelineEvent {
    /// Event timestamp.
    pub timestamp: DateTime<Utc>,
    /// Operation the event belongs to.
    pub operation_id: String,
    /// Kind of event.
    pub event_type: TimelineEventKind,
    /// Event title.
    pub title: String,
    /// Event description.
    #[serde(default)]
    pub description: String,
    /// Component concerned.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub component: Option<String>,
    /// Progress at the event, when meaningful.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress: Option<f64>,
}

impl TimelineEvent {
    /// Event describing a record's latest state transition.
    #[must_use]
    pub fn from_record(record: &OperationRecord) -> Self {
        let event_type = match record.status {
            OperationStatus::Completed => TimelineEventKind::Complete,
            OperationStatus::Failed | OperationStatus::Timeout => TimelineEventKind::Error,
            OperationStatus::Running => TimelineEventKind::Progress,
            OperationStatus::Pending | OperationStatus::Cancelled => TimelineEventKind::Start,
        };
        Self {
            timestamp: record.end_time.unwrap_or(record.start_time),
            operation_id: record.id.clone(),
            event_type,
            title: record.title.clone(),
            description: record.description.clone(),
            component: record.component_name.clone(),
            progress: Some(record.progress_percent),
        }
    }
}

/// Aggregate statistics over a period.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OperationSummary {
    /// Number of operations in the period.
    pub total_operations: usize,
    /// Completed operations.
    pub completed_operations: usize,
    /// Failed operations.
    pub failed_operations: usize,
    /// Cancelled operations.
    pub cancelled_operations: usize,
    /// Mean duration over operations with a recorded duration, seconds.
    pub average_duration: f64,
    /// Completed percentage of the total.
    pub success_rate: f64,
    /// Counts grouped by kind.
    pub operations_by_kind: BTreeMap<String, usize>,
    /// Counts grouped by component.
    pub operations_by_component: BTreeMap<String, usize>,
    /// Counts grouped by status.
    pub operations_by_status: BTreeMap<String, usize>,
    /// Period label (1h, 24h, 7d, 30d).
    pub time_period: String,
    /// When the summary was computed.
    pub generated_at: DateTime<Utc>,
}

impl OperationSummary {
    /// Compute a summary over records.
    #[must_use]
    pub fn from_records(records: &[&OperationRecord], period: &str) -> Self {
        let total = records.len();
        let completed = records
            .iter()
            .filter(|r| r.status == OperationStatus::Completed)
            .count();
        let failed = records
            .iter()
            .filter(|r| r.status == OperationStatus::Failed)
            .count();
        let cancelled = records
            .iter()
            .filter(|r| r.status == OperationStatus::Cancelled)
            .count();

        let durations: Vec<f64> = records.iter().filter_map(|r| r.duration_seconds).collect();
        let average_duration = if durations.is_empty() {
            0.0
        } else {
            durations.iter().sum::<f64>() / durations.len() as f64
        };

        let mut by_kind = BTreeMap::new();
        let mut by_component = BTreeMap::new();
        let mut by_status = BTreeMap::new();
        for record in records {
            *by_kind.entry(record.kind.to_string()).or_insert(0) += 1;
            if let Some(ref component) = record.component_name {
                *by_component.entry(component.clone()).or_insert(0) += 1;
            }
            *by_status.entry(record.status.to_string()).or_insert(0) += 1;
        }

        Self {
            total_operations: total,
            completed_operations: completed,
            failed_operations: failed,
            cancelled_operations: cancelled,
            average_duration,
            success_rate: if total > 0 {
                completed as f64 / total as f64 * 100.0
            } else {
                0.0
            },
            operations_by_kind: by_kind,
            operations_by_component: by_component,
            operations_by_status: by_status,
            time_period: period.to_string(),
            generated_at: Utc::now(),
        }
    }
}

/// Summary period.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SummaryPeriod {
    /// Last hour.
    OneHour,
    /// Last 24 hours.
    Day,
    /// Last 7 days.
    Week,
    /// Last 30 days.
    Month,
}

impl SummaryPeriod {
    /// Parse a period label; unknown labels default to 24 hours.
    #[must_use]
    pub fn parse(label: &str) -> Self {
        match label {
            "1h" => Self::OneHour,
            "7d" => Self::Week,
            "30d" => Self::Month,
            _ => Self::Day,
        }
    }

    /// Canonical label.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::OneHour => "1h",
            Self::Day => "24h",
            Self::Week => "7d",
            Self::Month => "30d",
        }
    }

    /// The period as a chrono duration.
    #[must_use]
    pub fn duration(&self) -> chrono::Duration {
        match self {
            Self::OneHour => chrono::Duration::hours(1),
            Self::Day => chrono::Duration::days(1),
            Self::Week => chrono::Duration::days(7),
            Self::Month => chrono::Duration::days(30),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn status_derivation_precedence() {
        let mut progress = OperationProgress::begin("op-1", OperationKind::Install, "install git");
        assert_eq!(progress.derived_status(), OperationStatus::Pending);

        progress.progress_percent = 40.0;
        assert_eq!(progress.derived_status(), OperationStatus::Running);

        progress.errors.push("disk full".into());
        assert_eq!(progress.derived_status(), OperationStatus::Failed);

        // Completion outranks errors; cancellation outranks everything.
        progress.is_completed = true;
        assert_eq!(progress.derived_status(), OperationStatus::Completed);
        progress.is_cancelled = true;
        assert_eq!(progress.derived_status(), OperationStatus::Cancelled);
    }

    #[test]
    fn hundred_percent_means_completed() {
        let mut progress = OperationProgress::begin("op-1", OperationKind::Download, "fetch");
        progress.progress_percent = 100.0;
        assert_eq!(progress.derived_status(), OperationStatus::Completed);
    }

    #[test]
    fn terminal_records_carry_duration() {
        let mut progress = OperationProgress::begin("op-1", OperationKind::Install, "install");
        progress.start_time = Utc::now() - chrono::Duration::seconds(5);
        progress.is_completed = true;

        let record = OperationRecord::from_progress(&progress);
        assert_eq!(record.status, OperationStatus::Completed);
        assert!(record.end_time.is_some());
        assert!(record.duration_seconds.unwrap() >= 5.0);
    }

    #[test]
    fn non_terminal_records_have_no_duration() {
        let mut progress = OperationProgress::begin("op-1", OperationKind::Install, "install");
        progress.progress_percent = 50.0;

        let record = OperationRecord::from_progress(&progress);
        assert_eq!(record.status, OperationStatus::Running);
        assert!(record.end_time.is_none());
        assert!(record.duration_seconds.is_none());
    }

    #[test]
    fn summary_counts_and_rate() {
        let make = |id: &str, status: OperationStatus| {
            let mut progress = OperationProgress::begin(id, OperationKind::Install, id);
            match status {
                OperationStatus::Completed => progress.is_completed = true,
                OperationStatus::Failed => progress.errors.push("x".into()),
                OperationStatus::Cancelled => progress.is_cancelled = true,
                _ => {}
            }
            progress.component_name = Some("git".into());
            OperationRecord::from_progress(&progress)
        };

        let records = vec![
            make("a", OperationStatus::Completed),
            make("b", OperationStatus::Completed),
            make("c", OperationStatus::Failed),
            make("d", OperationStatus::Cancelled),
        ];
        let refs: Vec<&OperationRecord> = records.iter().collect();
        let summary = OperationSummary::from_records(&refs, "24h");

        assert_eq!(summary.total_operations, 4);
        assert_eq!(summary.completed_operations, 2);
        assert_eq!(summary.failed_operations, 1);
        assert_eq!(summary.cancelled_operations, 1);
        assert_eq!(summary.success_rate, 50.0);
        assert_eq!(summary.operations_by_component["git"], 4);
        assert_eq!(summary.operations_by_status["completed"], 2);
    }

    #[test]
    fn period_labels_round_trip() {
        for period in [
            SummaryPeriod::OneHour,
            SummaryPeriod::Day,
            SummaryPeriod::Week,
            SummaryPeriod::Month,
        ] {
            assert_eq!(SummaryPeriod::parse(period.label()), period);
        }
        assert_eq!(SummaryPeriod::parse("garbage"), SummaryPeriod::Day);
    }
}
