//! In-memory fakes for storage traits (testing only)
//!
//! Provides `MemoryLedgerStore`, which satisfies the `LedgerStore` contract
//! without any external dependencies.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::storage_traits::*;

// ---------------------------------------------------------------------------
// MemoryLedgerStore
// ---------------------------------------------------------------------------

/// In-memory ledger backed by a `BTreeMap<key, entry>`.
///
/// The map is ordered, so prefix listings come back sorted by key exactly
/// like the SurrealDB backend's `ORDER BY key`.
#[derive(Debug, Default)]
pub struct MemoryLedgerStore {
    entries: Mutex<BTreeMap<LedgerKey, LedgerEntry>>,
    writes: AtomicU64,
}

impl MemoryLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of successful writes (put, conditional put, delete).
    pub fn write_count(&self) -> u64 {
        self.writes.load(Ordering::SeqCst)
    }

    /// Number of entries currently stored.
    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl LedgerStore for MemoryLedgerStore {
    async fn get(&self, key: &LedgerKey) -> StorageResult<Option<LedgerEntry>> {
        let entries = self.entries.lock().unwrap();
        Ok(entries.get(key).cloned())
    }

    async fn put(&self, entry: LedgerEntry) -> StorageResult<()> {
        let mut entries = self.entries.lock().unwrap();
        entries.insert(entry.key.clone(), entry);
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn conditional_put(
        &self,
        entry: LedgerEntry,
        expected: Option<i64>,
    ) -> StorageResult<WriteOutcome> {
        let mut entries = self.entries.lock().unwrap();
        let current = entries.get(&entry.key).and_then(|e| e.token);
        if current != expected {
            return Ok(WriteOutcome::Conflict { current });
        }
        entries.insert(entry.key.clone(), entry);
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(WriteOutcome::Written)
    }

    async fn delete(&self, key: &LedgerKey) -> StorageResult<bool> {
        let mut entries = self.entries.lock().unwrap();
        let existed = entries.remove(key).is_some();
        if existed {
            self.writes.fetch_add(1, Ordering::SeqCst);
        }
        Ok(existed)
    }

    async fn list(&self, prefix: &LedgerKey) -> StorageResult<Vec<LedgerEntry>> {
        let entries = self.entries.lock().unwrap();
        Ok(entries
            .range(prefix.clone()..)
            .take_while(|(key, _)| key.starts_with(prefix))
            .map(|(_, entry)| entry.clone())
            .collect())
    }
}
