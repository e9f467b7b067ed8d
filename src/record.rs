use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Expected character -> number of misses
pub type ErrorMap = BTreeMap<char, u32>;

/// `"{expected}→{typed}"` -> number of substitutions
pub type ConfusionMap = BTreeMap<String, u32>;

/// Separator between expected and typed characters in a confusion key
pub const CONFUSION_SEPARATOR: char = '→';

pub fn confusion_key(expected: char, typed: char) -> String {
    format!("{expected}{CONFUSION_SEPARATOR}{typed}")
}

/// Percentile summary of inter-keystroke latency, all values in milliseconds
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatencySummary {
    pub count: usize,
    pub avg: f64,
    pub p50: f64,
    pub p90: f64,
    pub p99: f64,
}

/// Snapshot of a finished session. Fields are only readable: once built, a
/// record stays as it is, and stores and observers get clones or shared
/// references.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    id: i64,
    completed_at: DateTime<Utc>,
    length: usize,
    errors: u32,
    accuracy: f64,
    wpm: u32,
    #[serde(default)]
    error_map: ErrorMap,
    latency: Option<LatencySummary>,
    #[serde(default)]
    confusion_map: ConfusionMap,
}

impl SessionRecord {
    pub fn builder(id: i64, completed_at: DateTime<Utc>) -> SessionRecordBuilder {
        SessionRecordBuilder {
            record: SessionRecord {
                id,
                completed_at,
                length: 0,
                errors: 0,
                accuracy: 100.0,
                wpm: 0,
                error_map: ErrorMap::new(),
                latency: None,
                confusion_map: ConfusionMap::new(),
            },
        }
    }

    /// Minimal record carrying only an error map, for seeding history
    pub fn with_error_map(id: i64, error_map: ErrorMap) -> Self {
        let errors = error_map.values().sum();
        Self::builder(id, DateTime::from_timestamp_millis(id).unwrap_or_default())
            .errors(errors)
            .error_map(error_map)
            .build()
    }

    /// Unique, increasing within one engine; starts from epoch milliseconds
    pub fn id(&self) -> i64 {
        self.id
    }

    pub fn completed_at(&self) -> DateTime<Utc> {
        self.completed_at
    }

    /// RFC 3339 completion time with millisecond precision
    pub fn completed_at_iso(&self) -> String {
        self.completed_at
            .to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
    }

    pub fn length(&self) -> usize {
        self.length
    }

    pub fn errors(&self) -> u32 {
        self.errors
    }

    /// 0..=100, one decimal
    pub fn accuracy(&self) -> f64 {
        self.accuracy
    }

    pub fn wpm(&self) -> u32 {
        self.wpm
    }

    pub fn error_map(&self) -> &ErrorMap {
        &self.error_map
    }

    pub fn latency(&self) -> Option<LatencySummary> {
        self.latency
    }

    pub fn confusion_map(&self) -> &ConfusionMap {
        &self.confusion_map
    }
}

/// Assembles a [`SessionRecord`]; the record itself has no setters
#[derive(Debug, Clone)]
pub struct SessionRecordBuilder {
    record: SessionRecord,
}

impl SessionRecordBuilder {
    pub fn length(mut self, length: usize) -> Self {
        self.record.length = length;
        self
    }

    pub fn errors(mut self, errors: u32) -> Self {
        self.record.errors = errors;
        self
    }

    pub fn accuracy(mut self, accuracy: f64) -> Self {
        self.record.accuracy = accuracy;
        self
    }

    pub fn wpm(mut self, wpm: u32) -> Self {
        self.record.wpm = wpm;
        self
    }

    pub fn error_map(mut self, error_map: ErrorMap) -> Self {
        self.record.error_map = error_map;
        self
    }

    pub fn latency(mut self, latency: Option<LatencySummary>) -> Self {
        self.record.latency = latency;
        self
    }

    pub fn confusion_map(mut self, confusion_map: ConfusionMap) -> Self {
        self.record.confusion_map = confusion_map;
        self
    }

    pub fn build(self) -> SessionRecord {
        self.record
    }
}
