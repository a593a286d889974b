//! Record schema for the Warehouse ledger
//!
//! Records:
//! - objects: head pointer per (name, env)
//! - latest: most recently written version per (name, env)
//! - envs: environments known for an object
//! - variants: payloads per (name, env, version, variant)
//! - history: immutable head-change chain per (name, env)
//! - aliases: logical environment names
//! - hooks: release subscribers per object

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::storage_traits::{LedgerEntry, LedgerKey, StorageResult};

/// Milliseconds since the Unix epoch. Used both as a clock and as the
/// optimistic-concurrency token of an object's head.
pub type Timestamp = i64;

/// Variant key used when a write does not name one.
pub const DEFAULT_VARIANT: &str = "_default";

/// A typed record that knows where it lives in the ledger.
pub trait LedgerRecord: Serialize + serde::de::DeserializeOwned {
    /// Key this record is stored under.
    fn key(&self) -> LedgerKey;

    /// Concurrency token stored alongside the record.
    fn token(&self) -> Option<i64> {
        None
    }

    fn to_entry(&self) -> StorageResult<LedgerEntry> {
        LedgerEntry::encode(self.key(), self.token(), self)
    }

    fn from_entry(entry: &LedgerEntry) -> StorageResult<Self> {
        entry.decode()
    }
}

/// Head pointer for an object in one environment.
///
/// Only head changes write this record, always conditioned on
/// `head_timestamp`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectRecord {
    pub name: String,
    pub env: String,
    pub head_version: Option<String>,
    pub head_timestamp: Option<Timestamp>,
}

impl ObjectRecord {
    /// A fresh object with no head, created by its first variant write.
    pub fn new(name: impl Into<String>, env: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            env: env.into(),
            head_version: None,
            head_timestamp: None,
        }
    }
}

impl LedgerRecord for ObjectRecord {
    fn key(&self) -> LedgerKey {
        LedgerKey::object(&self.name, &self.env)
    }

    fn token(&self) -> Option<i64> {
        self.head_timestamp
    }
}

/// Most recently written version of an object in one environment.
///
/// Kept apart from [`ObjectRecord`] so variant writes never touch the
/// head pointer. Last writer wins.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LatestRecord {
    pub name: String,
    pub env: String,
    pub version: String,
    pub updated_at: DateTime<Utc>,
}

impl LatestRecord {
    pub fn new(name: impl Into<String>, env: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            env: env.into(),
            version: version.into(),
            updated_at: Utc::now(),
        }
    }
}

impl LedgerRecord for LatestRecord {
    fn key(&self) -> LedgerKey {
        LedgerKey::latest(&self.name, &self.env)
    }
}

/// Marker that an object has an environment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvRecord {
    pub name: String,
    pub env: String,
    pub created_at: DateTime<Utc>,
}

impl EnvRecord {
    pub fn new(name: impl Into<String>, env: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            env: env.into(),
            created_at: Utc::now(),
        }
    }
}

impl LedgerRecord for EnvRecord {
    fn key(&self) -> LedgerKey {
        LedgerKey::env(&self.name, &self.env)
    }
}

/// One payload of a version.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariantRecord {
    pub name: String,
    pub env: String,
    pub version: String,
    pub variant: String,
    /// Opaque payload: a string or a structured JSON document
    pub data: serde_json::Value,
    pub expiration: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl LedgerRecord for VariantRecord {
    fn key(&self) -> LedgerKey {
        LedgerKey::variant(&self.name, &self.env, &self.version, &self.variant)
    }
}

/// An immutable head-change record.
///
/// `prev_timestamp` links to the previous record of the same
/// (name, env) chain, or is `None` at the chain origin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryRecord {
    pub name: String,
    pub env: String,
    pub timestamp: Timestamp,
    pub head_version: String,
    pub prev_timestamp: Option<Timestamp>,
}

impl HistoryRecord {
    /// When this record made its version live.
    pub fn release_date(&self) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(self.timestamp).unwrap_or_default()
    }
}

impl LedgerRecord for HistoryRecord {
    fn key(&self) -> LedgerKey {
        LedgerKey::history(&self.name, &self.env, self.timestamp)
    }

    // History records carry their own timestamp as token so that a
    // create-if-absent write (`expected = None`) can never overwrite one.
    fn token(&self) -> Option<i64> {
        Some(self.timestamp)
    }
}

/// Logical environment name mapped to a concrete one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvAliasRecord {
    pub name: String,
    pub alias: String,
    pub env: String,
}

impl LedgerRecord for EnvAliasRecord {
    fn key(&self) -> LedgerKey {
        LedgerKey::alias(&self.name, &self.alias)
    }
}

/// A release subscriber.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HookRecord {
    pub id: String,
    pub name: String,
    pub url: String,
    pub created_at: DateTime<Utc>,
}

impl HookRecord {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.into(),
            url: url.into(),
            created_at: Utc::now(),
        }
    }
}

impl LedgerRecord for HookRecord {
    fn key(&self) -> LedgerKey {
        LedgerKey::hook(&self.name, &self.id)
    }
}
