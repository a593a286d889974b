//! SurrealDB-backed LedgerStore implementation
//!
//! Entries live in the `ledger` table with the ledger key as record id.
//! The compare-and-swap of `conditional_put` runs as a single `IF` statement,
//! so the token check and the write share one transaction.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use surrealdb::sql::Datetime as SurrealDatetime;
use tracing::{debug, instrument};

use crate::error::StorageError;
use crate::storage_traits::{LedgerEntry, LedgerKey, LedgerStore, StorageResult, WriteOutcome};
use crate::SurrealHandle;

const TABLE: &str = "ledger";

/// Stand-in for "no token" inside queries. Tokens are millisecond
/// timestamps and therefore never negative.
const NO_TOKEN: i64 = -1;

const CONDITIONAL_PUT: &str = r#"
    IF ((SELECT VALUE token FROM ONLY type::thing('ledger', $id)) ?? -1) = $expected {
        UPSERT type::thing('ledger', $id) CONTENT $row RETURN AFTER
    } ELSE {
        []
    }
"#;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct DbLedgerEntry {
    key: String,
    token: Option<i64>,
    /// JSON text of the entry value
    value: String,
    updated_at: SurrealDatetime,
}

impl DbLedgerEntry {
    fn from_entry(entry: &LedgerEntry) -> StorageResult<Self> {
        let value = serde_json::to_string(&entry.value).map_err(|e| StorageError::Serialization {
            key: entry.key.to_string(),
            reason: e.to_string(),
        })?;
        Ok(Self {
            key: entry.key.to_string(),
            token: entry.token,
            value,
            updated_at: SurrealDatetime::from(chrono::Utc::now()),
        })
    }

    fn into_entry(self) -> StorageResult<LedgerEntry> {
        let value = serde_json::from_str(&self.value).map_err(|e| StorageError::Serialization {
            key: self.key.clone(),
            reason: e.to_string(),
        })?;
        Ok(LedgerEntry {
            key: LedgerKey::from(self.key),
            token: self.token,
            value,
        })
    }
}

fn backend(err: surrealdb::Error) -> StorageError {
    StorageError::Backend(err.to_string())
}

/// Optimistic transactions in the embedded engines abort one of two
/// concurrent writers; that loser lost a compare-and-swap race.
fn is_transaction_conflict(err: &surrealdb::Error) -> bool {
    let message = err.to_string().to_lowercase();
    message.contains("transaction conflict") || message.contains("write conflict")
}

/// SurrealDB-backed implementation of [`LedgerStore`].
#[derive(Clone)]
pub struct SurrealLedgerStore {
    handle: Arc<SurrealHandle>,
}

impl SurrealLedgerStore {
    pub fn new(handle: Arc<SurrealHandle>) -> Self {
        Self { handle }
    }

    /// Create an in-memory instance for testing.
    pub async fn in_memory() -> crate::Result<Self> {
        let handle = SurrealHandle::setup_db().await?;
        Ok(Self::new(Arc::new(handle)))
    }
}

#[async_trait]
impl LedgerStore for SurrealLedgerStore {
    #[instrument(skip(self), fields(key = %key))]
    async fn get(&self, key: &LedgerKey) -> StorageResult<Option<LedgerEntry>> {
        let row: Option<DbLedgerEntry> = self
            .handle
            .db()
            .select((TABLE, key.as_str()))
            .await
            .map_err(backend)?;

        row.map(DbLedgerEntry::into_entry).transpose()
    }

    #[instrument(skip(self, entry), fields(key = %entry.key))]
    async fn put(&self, entry: LedgerEntry) -> StorageResult<()> {
        let row = DbLedgerEntry::from_entry(&entry)?;

        let _written: Option<DbLedgerEntry> = self
            .handle
            .db()
            .upsert((TABLE, entry.key.as_str()))
            .content(row)
            .await
            .map_err(backend)?;

        Ok(())
    }

    #[instrument(skip(self, entry), fields(key = %entry.key, expected = ?expected))]
    async fn conditional_put(
        &self,
        entry: LedgerEntry,
        expected: Option<i64>,
    ) -> StorageResult<WriteOutcome> {
        let row = DbLedgerEntry::from_entry(&entry)?;

        let response = self
            .handle
            .db()
            .query(CONDITIONAL_PUT)
            .bind(("id", entry.key.to_string()))
            .bind(("expected", expected.unwrap_or(NO_TOKEN)))
            .bind(("row", row))
            .await;

        let mut response = match response {
            Ok(response) => response,
            Err(e) if is_transaction_conflict(&e) => {
                debug!("conditional put lost a transaction race");
                return Ok(WriteOutcome::Conflict { current: None });
            }
            Err(e) => return Err(backend(e)),
        };

        let written: Vec<DbLedgerEntry> = match response.take(0) {
            Ok(rows) => rows,
            Err(e) if is_transaction_conflict(&e) => {
                debug!("conditional put lost a transaction race");
                return Ok(WriteOutcome::Conflict { current: None });
            }
            Err(e) => return Err(backend(e)),
        };

        if !written.is_empty() {
            return Ok(WriteOutcome::Written);
        }

        let current = self.get(&entry.key).await?.and_then(|e| e.token);
        debug!(current = ?current, "conditional put rejected");
        Ok(WriteOutcome::Conflict { current })
    }

    #[instrument(skip(self), fields(key = %key))]
    async fn delete(&self, key: &LedgerKey) -> StorageResult<bool> {
        let deleted: Option<DbLedgerEntry> = self
            .handle
            .db()
            .delete((TABLE, key.as_str()))
            .await
            .map_err(backend)?;

        Ok(deleted.is_some())
    }

    #[instrument(skip(self), fields(prefix = %prefix))]
    async fn list(&self, prefix: &LedgerKey) -> StorageResult<Vec<LedgerEntry>> {
        let mut response = self
            .handle
            .db()
            .query("SELECT * FROM ledger WHERE string::starts_with(key, $prefix) ORDER BY key ASC")
            .bind(("prefix", prefix.to_string()))
            .await
            .map_err(backend)?;

        let rows: Vec<DbLedgerEntry> = response.take(0).map_err(backend)?;
        rows.into_iter().map(DbLedgerEntry::into_entry).collect()
    }
}
