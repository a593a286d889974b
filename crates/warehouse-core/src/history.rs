//! History chain traversal.
//!
//! Each (name, env) pair owns a backward-linked list of immutable
//! [`HistoryRecord`]s. The object record's `head_timestamp` points at the
//! newest one; every record points at its predecessor through
//! `prev_timestamp`. Walks follow those links one point read at a time and
//! never scan the whole chain.

use tracing::warn;
use warehouse_state::{HistoryRecord, Timestamp};

use crate::domain::error::Result;
use crate::ledger::Ledger;

/// The history chain of one object in one environment.
pub struct HistoryChain<'a> {
    ledger: &'a Ledger,
    name: &'a str,
    env: &'a str,
}

impl<'a> HistoryChain<'a> {
    pub fn new(ledger: &'a Ledger, name: &'a str, env: &'a str) -> Self {
        Self { ledger, name, env }
    }

    pub async fn record(&self, timestamp: Timestamp) -> Result<Option<HistoryRecord>> {
        self.ledger
            .history_record(self.name, self.env, timestamp)
            .await
    }

    /// Follow the chain backward from `from`, returning at most `limit`
    /// records, newest first.
    ///
    /// The walk stops early at the chain origin, at a dangling link, or at a
    /// link that does not move strictly back in time.
    pub async fn walk(&self, from: Option<Timestamp>, limit: usize) -> Result<Vec<HistoryRecord>> {
        let mut records = Vec::new();
        let mut cursor = from;

        while let Some(timestamp) = cursor {
            if records.len() >= limit {
                break;
            }
            let Some(record) = self.record(timestamp).await? else {
                warn!(
                    name = %self.name,
                    env = %self.env,
                    timestamp,
                    "history chain link points at a missing record"
                );
                break;
            };
            cursor = self.next_link(&record);
            records.push(record);
        }

        Ok(records)
    }

    /// Walk backward from `from` and return the first record accepted by
    /// `predicate`.
    pub async fn find_back<F>(
        &self,
        from: Option<Timestamp>,
        predicate: F,
    ) -> Result<Option<HistoryRecord>>
    where
        F: Fn(&HistoryRecord) -> bool,
    {
        let mut cursor = from;
        while let Some(timestamp) = cursor {
            let Some(record) = self.record(timestamp).await? else {
                warn!(
                    name = %self.name,
                    env = %self.env,
                    timestamp,
                    "history chain link points at a missing record"
                );
                return Ok(None);
            };
            if predicate(&record) {
                return Ok(Some(record));
            }
            cursor = self.next_link(&record);
        }
        Ok(None)
    }

    fn next_link(&self, record: &HistoryRecord) -> Option<Timestamp> {
        match record.prev_timestamp {
            Some(prev) if prev >= record.timestamp => {
                warn!(
                    name = %self.name,
                    env = %self.env,
                    timestamp = record.timestamp,
                    prev,
                    "history chain link does not move back in time; stopping walk"
                );
                None
            }
            prev => prev,
        }
    }
}

/// Timestamp for a record that follows `prev`: the wall clock in
/// milliseconds, bumped past `prev` so the chain stays strictly increasing.
pub fn next_timestamp(prev: Option<Timestamp>) -> Timestamp {
    let now = chrono::Utc::now().timestamp_millis();
    match prev {
        Some(prev) if prev >= now => prev + 1,
        _ => now,
    }
}
