//! Durable SQLite store for operation records.
//!
//! One row per record with JSON-encoded list/map fields. Write-ahead
//! logging and foreign-key enforcement are enabled on open; WAL gives
//! concurrent readers snapshot isolation.

use chrono::{DateTime, Utc};
use envsmith_core::error::{Error, Result};
use parking_lot::Mutex;
use rusqlite::{Connection, params};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::record::{OperationKind, OperationRecord, OperationStatus};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS operation_records (
    operation_id TEXT PRIMARY KEY,
    operation_type TEXT NOT NULL,
    status TEXT NOT NULL,
    component_name TEXT,
    title TEXT,
    description TEXT,
    start_time TEXT NOT NULL,
    end_time TEXT,
    duration_seconds REAL,
    progress_percentage REAL,
    current_step TEXT,
    total_steps INTEGER,
    current_step_number INTEGER,
    details TEXT,
    warnings TEXT,
    errors TEXT,
    result TEXT,
    metadata TEXT,
    user_id TEXT,
    session_id TEXT,
    system_info TEXT,
    created_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_operation_start_time ON operation_records(start_time);
CREATE INDEX IF NOT EXISTS idx_operation_status ON operation_records(status);
CREATE INDEX IF NOT EXISTS idx_operation_component ON operation_records(component_name);
";

/// SQLite-backed durable store.
///
/// The connection sits behind a single mutex held briefly per call; WAL
/// mode keeps concurrent readers consistent.
pub struct SqliteStore {
    conn: Mutex<Connection>,
    path: Option<PathBuf>,
}

impl std::fmt::Debug for SqliteStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteStore")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

impl SqliteStore {
    /// Open (creating if needed) the store at `path`.
    ///
    /// # Errors
    /// Returns a ledger error when the database cannot be opened or the
    /// schema cannot be created.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|e| Error::io(parent, &e))?;
        }
        let conn = Connection::open(path).map_err(ledger_err)?;
        Self::init(conn, Some(path.to_path_buf()))
    }

    /// In-memory store for tests.
    ///
    /// # Errors
    /// Returns a ledger error when the database cannot be created.
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(ledger_err)?;
        Self::init(conn, None)
    }

    fn init(conn: Connection, path: Option<PathBuf>) -> Result<Self> {
        conn.pragma_update(None, "journal_mode", "WAL").ok();
        conn.pragma_update(None, "foreign_keys", "ON")
            .map_err(ledger_err)?;
        conn.execute_batch(SCHEMA).map_err(ledger_err)?;
        debug!(?path, "ledger store opened");
        Ok(Self {
            conn: Mutex::new(conn),
            path,
        })
    }

    /// Insert or replace a record by id.
    ///
    /// # Errors
    /// Returns a ledger error on write failure.
    pub fn upsert(&self, record: &OperationRecord) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT OR REPLACE INTO operation_records (
                operation_id, operation_type, status, component_name, title, description,
                start_time, end_time, duration_seconds, progress_percentage, current_step,
                total_steps, current_step_number, details, warnings, errors, result,
                metadata, user_id, session_id, system_info, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15,
                      ?16, ?17, ?18, ?19, ?20, ?21, ?22)",
            params![
                record.id,
                record.kind.to_string(),
                record.status.to_string(),
                record.component_name,
                record.title,
                record.description,
                record.start_time.to_rfc3339(),
                record.end_time.map(|t| t.to_rfc3339()),
                record.duration_seconds,
                record.progress_percent,
                record.current_step,
                record.total_steps,
                record.step_number,
                serde_json::to_string(&record.details)?,
                serde_json::to_string(&record.warnings)?,
                serde_json::to_string(&record.errors)?,
                record
                    .result
                    .as_ref()
                    .map(serde_json::to_string)
                    .transpose()?,
                serde_json::to_string(&record.metadata)?,
                record.user_id,
                record.session_id,
                serde_json::to_string(&record.system_info)?,
                record.created_at.to_rfc3339(),
            ],
        )
        .map_err(ledger_err)?;
        Ok(())
    }

    /// Load the newest `limit` records, newest first.
    ///
    /// # Errors
    /// Returns a ledger error on read failure.
    pub fn load_recent(&self, limit: usize) -> Result<Vec<OperationRecord>> {
        self.query(
            "SELECT * FROM operation_records ORDER BY start_time DESC LIMIT ?1",
            params![limit as i64],
        )
    }

    /// Records whose start time falls in `[start, end]`.
    ///
    /// # Errors
    /// Returns a ledger error on read failure.
    pub fn query_range(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<OperationRecord>> {
        self.query(
            "SELECT * FROM operation_records
             WHERE start_time >= ?1 AND start_time <= ?2
             ORDER BY start_time DESC",
            params![start.to_rfc3339(), end.to_rfc3339()],
        )
    }

    /// Records with the given status.
    ///
    /// # Errors
    /// Returns a ledger error on read failure.
    pub fn by_status(&self, status: OperationStatus) -> Result<Vec<OperationRecord>> {
        self.query(
            "SELECT * FROM operation_records WHERE status = ?1 ORDER BY start_time DESC",
            params![status.to_string()],
        )
    }

    /// Records for the given component.
    ///
    /// # Errors
    /// Returns a ledger error on read failure.
    pub fn by_component(&self, component: &str) -> Result<Vec<OperationRecord>> {
        self.query(
            "SELECT * FROM operation_records WHERE component_name = ?1 ORDER BY start_time DESC",
            params![component],
        )
    }

    /// Delete records that started before `cutoff`; returns the count.
    ///
    /// # Errors
    /// Returns a ledger error on write failure.
    pub fn delete_before(&self, cutoff: DateTime<Utc>) -> Result<usize> {
        let conn = self.conn.lock();
        conn.execute(
            "DELETE FROM operation_records WHERE start_time < ?1",
            params![cutoff.to_rfc3339()],
        )
        .map_err(ledger_err)
    }

    /// Number of stored records.
    ///
    /// # Errors
    /// Returns a ledger error on read failure.
    pub fn count(&self) -> Result<usize> {
        let conn = self.conn.lock();
        conn.query_row("SELECT COUNT(*) FROM operation_records", [], |row| {
            row.get::<_, i64>(0)
        })
        .map(|n| n as usize)
        .map_err(ledger_err)
    }

    /// Database file size in bytes (0 for in-memory stores).
    #[must_use]
    pub fn size_bytes(&self) -> u64 {
        self.path
            .as_deref()
            .and_then(|p| std::fs::metadata(p).ok())
            .map_or(0, |m| m.len())
    }

    fn query(
        &self,
        sql: &str,
        params: impl rusqlite::Params,
    ) -> Result<Vec<OperationRecord>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(sql).map_err(ledger_err)?;
        let rows = stmt
            .query_map(params, row_to_record)
            .map_err(ledger_err)?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(ledger_err)?;
        Ok(rows)
    }
}

fn row_to_record(row: &rusqlite::Row<'_>) -> rusqlite::Result<OperationRecord> {
    let parse_time = |value: String| {
        DateTime::parse_from_rfc3339(&value)
            .map(|t| t.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now())
    };
    let parse_list = |value: Option<String>| -> Vec<String> {
        value
            .and_then(|v| serde_json::from_str(&v).ok())
            .unwrap_or_default()
    };
    let parse_map = |value: Option<String>| {
        value
            .and_then(|v| serde_json::from_str(&v).ok())
            .unwrap_or_default()
    };

    Ok(OperationRecord {
        id: row.get("operation_id")?,
        kind: OperationKind::parse(&row.get::<_, String>("operation_type")?),
        status: OperationStatus::parse(&row.get::<_, String>("status")?),
        component_name: row.get("component_name")?,
        title: row.get::<_, Option<String>>("title")?.unwrap_or_default(),
        description: row
            .get::<_, Option<String>>("description")?
            .unwrap_or_default(),
        start_time: parse_time(row.get("start_time")?),
        end_time: row
            .get::<_, Option<String>>("end_time")?
            .map(parse_time),
        duration_seconds: row.get("duration_seconds")?,
        progress_percent: row
            .get::<_, Option<f64>>("progress_percentage")?
            .unwrap_or(0.0),
        current_step: row
            .get::<_, Option<String>>("current_step")?
            .unwrap_or_default(),
        total_steps: row.get::<_, Option<u32>>("total_steps")?.unwrap_or(1),
        step_number: row
            .get::<_, Option<u32>>("current_step_number")?
            .unwrap_or(0),
        details: parse_list(row.get("details")?),
        warnings: parse_list(row.get("warnings")?),
        errors: parse_list(row.get("errors")?),
        result: row
            .get::<_, Option<String>>("result")?
            .and_then(|v| serde_json::from_str(&v).ok()),
        metadata: parse_map(row.get("metadata")?),
        user_id: row.get("user_id")?,
        session_id: row.get("session_id")?,
        system_info: parse_map(row.get("system_info")?),
        created_at: parse_time(row.get("created_at")?),
    })
}

fn ledger_err(err: rusqlite::Error) -> Error {
    Error::Ledger(err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{OperationKind, OperationProgress};
    use pretty_assertions::assert_eq;

    fn record(id: &str, component: &str, completed: bool) -> OperationRecord {
        let mut progress = OperationProgress::begin(id, OperationKind::Install, format!("install {component}"));
        progress.component_name = Some(component.to_string());
        progress.details.push("step one done".to_string());
        progress.is_completed = completed;
        OperationRecord::from_progress(&progress)
    }

    #[test]
    fn upsert_and_reload_round_trip() {
        let store = SqliteStore::in_memory().unwrap();
        let original = record("op-1", "git", true);
        store.upsert(&original).unwrap();

        let loaded = store.load_recent(10).unwrap();
        assert_eq!(loaded.len(), 1);
        let back = &loaded[0];
        assert_eq!(back.id, "op-1");
        assert_eq!(back.kind, OperationKind::Install);
        assert_eq!(back.status, OperationStatus::Completed);
        assert_eq!(back.component_name.as_deref(), Some("git"));
        assert_eq!(back.details, vec!["step one done".to_string()]);
        assert!(back.duration_seconds.is_some());
    }

    #[test]
    fn upsert_replaces_by_id() {
        let store = SqliteStore::in_memory().unwrap();
        store.upsert(&record("op-1", "git", false)).unwrap();
        store.upsert(&record("op-1", "git", true)).unwrap();

        assert_eq!(store.count().unwrap(), 1);
        let loaded = store.load_recent(10).unwrap();
        assert_eq!(loaded[0].status, OperationStatus::Completed);
    }

    #[test]
    fn status_and_component_indexes() {
        let store = SqliteStore::in_memory().unwrap();
        store.upsert(&record("a", "git", true)).unwrap();
        store.upsert(&record("b", "node", false)).unwrap();

        let completed = store.by_status(OperationStatus::Completed).unwrap();
        assert_eq!(completed.len(), 1);
        assert_eq!(completed[0].id, "a");

        let node_records = store.by_component("node").unwrap();
        assert_eq!(node_records.len(), 1);
        assert_eq!(node_records[0].id, "b");
    }

    #[test]
    fn delete_before_cutoff() {
        let store = SqliteStore::in_memory().unwrap();
        let mut old = record("old", "git", true);
        old.start_time = Utc::now() - chrono::Duration::days(120);
        store.upsert(&old).unwrap();
        store.upsert(&record("new", "git", true)).unwrap();

        let removed = store
            .delete_before(Utc::now() - chrono::Duration::days(90))
            .unwrap();
        assert_eq!(removed, 1);
        assert_eq!(store.count().unwrap(), 1);
        assert_eq!(store.load_recent(10).unwrap()[0].id, "new");
    }

    #[test]
    fn opens_on_disk_and_reports_size() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history").join("ops.db");
        let store = SqliteStore::open(&path).unwrap();
        store.upsert(&record("a", "git", true)).unwrap();
        assert!(path.exists());
        assert!(store.size_bytes() > 0);
    }
}
