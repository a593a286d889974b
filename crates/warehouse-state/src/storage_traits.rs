//! Storage trait definitions for Warehouse
//!
//! The release registry persists everything through a single key/value
//! abstraction, [`LedgerStore`], which offers:
//! - point reads (`get`)
//! - unconditional writes (`put`) and deletes (`delete`)
//! - compare-and-swap writes guarded by a token (`conditional_put`)
//! - ordered prefix listing (`list`)
//!
//! The trait is async and backend-agnostic. An in-memory fake lives in the
//! `fakes` module and a SurrealDB implementation in `surreal_ledger`.

use std::fmt;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::StorageError;

/// Result type for storage operations
pub type StorageResult<T> = std::result::Result<T, StorageError>;

/// Separator between key segments. Segments may never contain it.
pub const KEY_SEPARATOR: char = '/';

// ---------------------------------------------------------------------------
// LedgerKey
// ---------------------------------------------------------------------------

/// Hierarchical key into the ledger.
///
/// Layout:
/// - `object/{name}/{env}`
/// - `latest/{name}/{env}`
/// - `env/{name}/{env}`
/// - `variant/{name}/{env}/{version}/{variant}`
/// - `history/{name}/{env}/{timestamp:020}`
/// - `alias/{name}/{alias}`
/// - `hook/{name}/{hook_id}`
///
/// Prefix keys (the `*_of` constructors) end with the separator so that a
/// listing of version `1.0` never picks up version `1.0.1`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct LedgerKey(String);

impl LedgerKey {
    fn join(parts: &[&str]) -> Self {
        LedgerKey(parts.join("/"))
    }

    fn prefix(parts: &[&str]) -> Self {
        let mut key = parts.join("/");
        key.push(KEY_SEPARATOR);
        LedgerKey(key)
    }

    pub fn object(name: &str, env: &str) -> Self {
        Self::join(&["object", name, env])
    }

    pub fn objects_of(name: &str) -> Self {
        Self::prefix(&["object", name])
    }

    pub fn latest(name: &str, env: &str) -> Self {
        Self::join(&["latest", name, env])
    }

    pub fn env(name: &str, env: &str) -> Self {
        Self::join(&["env", name, env])
    }

    pub fn envs_of(name: &str) -> Self {
        Self::prefix(&["env", name])
    }

    pub fn variant(name: &str, env: &str, version: &str, variant: &str) -> Self {
        Self::join(&["variant", name, env, version, variant])
    }

    /// Prefix covering every variant of one version.
    pub fn variants_of_version(name: &str, env: &str, version: &str) -> Self {
        Self::prefix(&["variant", name, env, version])
    }

    /// Prefix covering every variant of every version in an environment.
    pub fn variants_of_env(name: &str, env: &str) -> Self {
        Self::prefix(&["variant", name, env])
    }

    /// History keys zero-pad the timestamp so lexical order is chronological.
    pub fn history(name: &str, env: &str, timestamp: i64) -> Self {
        LedgerKey(format!("history/{}/{}/{:020}", name, env, timestamp))
    }

    pub fn history_of(name: &str, env: &str) -> Self {
        Self::prefix(&["history", name, env])
    }

    pub fn alias(name: &str, alias: &str) -> Self {
        Self::join(&["alias", name, alias])
    }

    pub fn hook(name: &str, hook_id: &str) -> Self {
        Self::join(&["hook", name, hook_id])
    }

    pub fn hooks_of(name: &str) -> Self {
        Self::prefix(&["hook", name])
    }

    /// Return the full key string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether this key lies under `prefix`.
    pub fn starts_with(&self, prefix: &LedgerKey) -> bool {
        self.0.starts_with(prefix.as_str())
    }
}

impl fmt::Display for LedgerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for LedgerKey {
    fn from(key: String) -> Self {
        LedgerKey(key)
    }
}

/// Check that an identifier can be used as a single key segment.
pub fn validate_segment(segment: &str) -> StorageResult<&str> {
    if segment.is_empty() || segment.contains(KEY_SEPARATOR) {
        return Err(StorageError::InvalidKeySegment {
            segment: segment.to_string(),
        });
    }
    Ok(segment)
}

// ---------------------------------------------------------------------------
// LedgerEntry
// ---------------------------------------------------------------------------

/// A stored value together with its concurrency token.
///
/// The token is opaque to the store: it is only compared by
/// [`LedgerStore::conditional_put`]. Records that never take part in a
/// compare-and-swap leave it as `None`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub key: LedgerKey,
    pub token: Option<i64>,
    pub value: serde_json::Value,
}

impl LedgerEntry {
    /// Serialize a typed record into an entry.
    pub fn encode<T: Serialize>(key: LedgerKey, token: Option<i64>, record: &T) -> StorageResult<Self> {
        let value = serde_json::to_value(record).map_err(|e| StorageError::Serialization {
            key: key.to_string(),
            reason: e.to_string(),
        })?;
        Ok(Self { key, token, value })
    }

    /// Deserialize the stored value into a typed record.
    pub fn decode<T: DeserializeOwned>(&self) -> StorageResult<T> {
        serde_json::from_value(self.value.clone()).map_err(|e| StorageError::Serialization {
            key: self.key.to_string(),
            reason: e.to_string(),
        })
    }
}

/// Result of a conditional write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    /// The precondition held and the entry was written.
    Written,
    /// The stored token did not match; nothing was written.
    Conflict { current: Option<i64> },
}

impl WriteOutcome {
    pub fn is_written(&self) -> bool {
        matches!(self, WriteOutcome::Written)
    }
}

// ---------------------------------------------------------------------------
// LedgerStore
// ---------------------------------------------------------------------------

/// Key/value ledger with compare-and-swap.
///
/// Guarantees:
/// - `get` returns `Ok(None)` for absent keys, never an error.
/// - `conditional_put(entry, expected)` writes iff the currently stored
///   token equals `expected`, an absent key counting as token `None`.
///   The check and the write are atomic with respect to other writers.
/// - `list(prefix)` returns every entry whose key starts with `prefix`,
///   ordered by key.
/// - `delete` reports whether the key existed.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Read a single entry.
    async fn get(&self, key: &LedgerKey) -> StorageResult<Option<LedgerEntry>>;

    /// Write an entry unconditionally.
    async fn put(&self, entry: LedgerEntry) -> StorageResult<()>;

    /// Write an entry only if the stored token equals `expected`.
    async fn conditional_put(
        &self,
        entry: LedgerEntry,
        expected: Option<i64>,
    ) -> StorageResult<WriteOutcome>;

    /// Remove an entry. Returns `true` if it existed.
    async fn delete(&self, key: &LedgerKey) -> StorageResult<bool>;

    /// List entries under a prefix, ordered by key.
    async fn list(&self, prefix: &LedgerKey) -> StorageResult<Vec<LedgerEntry>>;
}
