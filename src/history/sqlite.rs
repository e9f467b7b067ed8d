use super::HistoryStore;
use crate::error::Result;
use crate::record::SessionRecord;
use rusqlite::{params, Connection};
use std::path::Path;
use tracing::{debug, warn};

const SCHEMA: &str = r#"
    CREATE TABLE IF NOT EXISTS sessions (
        seq INTEGER PRIMARY KEY AUTOINCREMENT,
        id INTEGER NOT NULL,
        completed_at TEXT NOT NULL,
        payload TEXT NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_sessions_completed_at ON sessions(completed_at);
"#;

/// Session history persisted in a SQLite database. Each row keeps the record
/// as JSON so the serialized shape is the same one `export_all` produces.
#[derive(Debug)]
pub struct SqliteHistory {
    conn: Connection,
    max_records: Option<usize>,
}

impl SqliteHistory {
    /// Open (or create) the database at `path`
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        debug!(path = %path.display(), "opening history database");
        Self::from_connection(Connection::open(path)?)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn,
            max_records: None,
        })
    }

    pub fn with_max_records(mut self, max_records: usize) -> Self {
        self.max_records = Some(max_records);
        self
    }

    pub fn count(&self) -> usize {
        self.conn
            .query_row("SELECT COUNT(*) FROM sessions", [], |row| row.get::<_, i64>(0))
            .map(|n| n as usize)
            .unwrap_or_else(|e| {
                warn!("failed to count sessions: {e}");
                0
            })
    }

    fn try_append(&mut self, record: &SessionRecord) -> Result<()> {
        let payload = serde_json::to_string(record)?;
        let tx = self.conn.transaction()?;
        tx.execute(
            "INSERT INTO sessions (id, completed_at, payload) VALUES (?1, ?2, ?3)",
            params![record.id(), record.completed_at_iso(), payload],
        )?;
        if let Some(max) = self.max_records {
            tx.execute(
                r#"
                DELETE FROM sessions WHERE seq NOT IN (
                    SELECT seq FROM sessions ORDER BY seq DESC LIMIT ?1
                )
                "#,
                params![max as i64],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    fn try_list(&self, limit: usize) -> Result<Vec<SessionRecord>> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let mut stmt = self
            .conn
            .prepare("SELECT seq, payload FROM sessions ORDER BY seq DESC LIMIT ?1")?;

        let rows = stmt.query_map([limit], |row| {
            Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?))
        })?;

        let mut records = Vec::new();
        for row in rows {
            let (seq, payload) = row?;
            match serde_json::from_str::<SessionRecord>(&payload) {
                Ok(record) => records.push(record),
                Err(e) => warn!(seq, "skipping unreadable session row: {e}"),
            }
        }
        Ok(records)
    }
}

impl HistoryStore for SqliteHistory {
    fn append(&mut self, record: SessionRecord) {
        if let Err(e) = self.try_append(&record) {
            warn!(id = record.id(), "failed to save session: {e}");
        }
    }

    fn list(&self, limit: usize) -> Vec<SessionRecord> {
        self.try_list(limit).unwrap_or_else(|e| {
            warn!("failed to read history: {e}");
            Vec::new()
        })
    }

    fn clear(&mut self) {
        if let Err(e) = self.conn.execute("DELETE FROM sessions", []) {
            warn!("failed to clear history: {e}");
        }
    }
}
