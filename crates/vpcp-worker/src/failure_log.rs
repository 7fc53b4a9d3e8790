//! A bounded in-memory log of `TerminalFailureRecord`s (spec.md §7), kept
//! so `vpcp status` has something to surface without the Worker growing a
//! durable store of its own. Resets across a restart, same as the
//! in-memory `WorkerStats` counters in `state.rs`.

use parking_lot::Mutex;
use std::collections::VecDeque;
use time::OffsetDateTime;
use vpcp_types::TerminalFailureRecord;

const DEFAULT_CAPACITY: usize = 200;

#[derive(Debug, Clone, serde::Serialize)]
pub struct FailureRecord {
    #[serde(flatten)]
    pub record: TerminalFailureRecord,
    #[serde(with = "time::serde::rfc3339")]
    pub failed_at: OffsetDateTime,
}

pub struct FailureLog {
    capacity: usize,
    records: Mutex<VecDeque<FailureRecord>>,
}

impl FailureLog {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity,
            records: Mutex::new(VecDeque::with_capacity(capacity)),
        }
    }

    pub fn record(&self, record: TerminalFailureRecord) {
        let mut records = self.records.lock();
        if records.len() == self.capacity {
            records.pop_front();
        }
        records.push_back(FailureRecord {
            record,
            failed_at: OffsetDateTime::now_utc(),
        });
    }

    /// The most recent `limit` records, newest first.
    pub fn recent(&self, limit: usize) -> Vec<FailureRecord> {
        self.records.lock().iter().rev().take(limit).cloned().collect()
    }
}

impl Default for FailureLog {
    fn default() -> Self {
        Self::new()
    }
}
