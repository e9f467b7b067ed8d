use super::HistoryStore;
use crate::record::SessionRecord;
use std::collections::VecDeque;

/// History kept in process memory, optionally capped
#[derive(Debug, Clone, Default)]
pub struct MemoryHistory {
    records: VecDeque<SessionRecord>,
    max_records: Option<usize>,
}

impl MemoryHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop the oldest records once more than `max_records` are stored
    pub fn with_max_records(max_records: usize) -> Self {
        Self {
            records: VecDeque::new(),
            max_records: Some(max_records),
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl HistoryStore for MemoryHistory {
    fn append(&mut self, record: SessionRecord) {
        self.records.push_front(record);
        if let Some(max) = self.max_records {
            self.records.truncate(max);
        }
    }

    fn list(&self, limit: usize) -> Vec<SessionRecord> {
        self.records.iter().take(limit).cloned().collect()
    }

    fn clear(&mut self) {
        self.records.clear();
    }
}
