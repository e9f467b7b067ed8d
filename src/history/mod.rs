mod memory;
mod sqlite;

pub use memory::MemoryHistory;
pub use sqlite::SqliteHistory;

use crate::error::Result;
use crate::record::SessionRecord;
use serde::Serialize;
use std::io::Write;
use tracing::warn;

/// Ordered list of finished sessions, newest first.
///
/// Implementations swallow storage failures: a broken backing store reads as
/// an empty history and failed writes are logged, never surfaced to the
/// practice flow.
pub trait HistoryStore {
    /// Put a finished session at the front of the list
    fn append(&mut self, record: SessionRecord);

    /// Up to `limit` most recent sessions, newest first
    fn list(&self, limit: usize) -> Vec<SessionRecord>;

    fn clear(&mut self);

    /// Whole history as a JSON array, newest first
    fn export_all(&self) -> String {
        encode_records(&self.list(usize::MAX))
    }

    /// Load an `export_all` payload on top of the current history, keeping
    /// its order. Returns the number of records imported.
    fn import_all(&mut self, data: &str) -> Result<usize> {
        let records = decode_records(data)?;
        let count = records.len();
        for record in records.into_iter().rev() {
            self.append(record);
        }
        Ok(count)
    }
}

impl<H: HistoryStore + ?Sized> HistoryStore for &mut H {
    fn append(&mut self, record: SessionRecord) {
        (**self).append(record)
    }

    fn list(&self, limit: usize) -> Vec<SessionRecord> {
        (**self).list(limit)
    }

    fn clear(&mut self) {
        (**self).clear()
    }

    fn export_all(&self) -> String {
        (**self).export_all()
    }
}

impl<H: HistoryStore + ?Sized> HistoryStore for Box<H> {
    fn append(&mut self, record: SessionRecord) {
        (**self).append(record)
    }

    fn list(&self, limit: usize) -> Vec<SessionRecord> {
        (**self).list(limit)
    }

    fn clear(&mut self) {
        (**self).clear()
    }

    fn export_all(&self) -> String {
        (**self).export_all()
    }
}

pub fn encode_records(records: &[SessionRecord]) -> String {
    serde_json::to_string_pretty(records).unwrap_or_else(|e| {
        warn!("failed to encode history: {e}");
        "[]".to_string()
    })
}

pub fn decode_records(data: &str) -> Result<Vec<SessionRecord>> {
    Ok(serde_json::from_str(data)?)
}

#[derive(Serialize)]
struct CsvRow<'a> {
    id: i64,
    completed_at: &'a str,
    length: usize,
    errors: u32,
    accuracy: f64,
    wpm: u32,
    latency_avg: Option<f64>,
    latency_p50: Option<f64>,
    latency_p90: Option<f64>,
    latency_p99: Option<f64>,
}

/// One summary line per session, for spreadsheets
pub fn export_csv<W: Write>(records: &[SessionRecord], writer: W) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(writer);
    for record in records {
        let completed_at = record.completed_at_iso();
        wtr.serialize(CsvRow {
            id: record.id(),
            completed_at: &completed_at,
            length: record.length(),
            errors: record.errors(),
            accuracy: record.accuracy(),
            wpm: record.wpm(),
            latency_avg: record.latency().map(|l| l.avg),
            latency_p50: record.latency().map(|l| l.p50),
            latency_p90: record.latency().map(|l| l.p90),
            latency_p99: record.latency().map(|l| l.p99),
        })?;
    }
    wtr.flush()?;
    Ok(())
}
