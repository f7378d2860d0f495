//! Operation history ledger for Envsmith.
//!
//! Records every operation's lifecycle in a bounded in-memory map backed
//! by a durable SQLite store, answers history and search queries,
//! computes cached summaries, renders timelines and exports history in
//! JSON, CSV, HTML, XML and ZIP formats.

#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

mod export;
mod ledger;
mod record;
mod store;
mod timeline;

pub use export::{ExportResult, ReportFormat, export_records, import_json};
pub use ledger::{
    DEFAULT_MAX_RECORDS, DEFAULT_RETENTION_DAYS, HistoryFilters, OperationLedger, SystemReport,
};
pub use record::{
    OperationKind, OperationProgress, OperationRecord, OperationStatus, OperationSummary,
    SummaryPeriod, TimelineEvent, TimelineEventKind,
};
pub use store::SqliteStore;
pub use timeline::{TimelineBucket, TimelineGranularity};
