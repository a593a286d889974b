//! Warehouse-State: Ledger Store for the Warehouse release registry
//!
//! This crate provides the persistence layer of the registry. Everything the
//! release state machine reads or writes goes through one key/value contract,
//! [`LedgerStore`], whose compare-and-swap write is the only coordination
//! primitive between concurrent registry instances.
//!
//! ## Layer 0 - Data/Persistence
//!
//! Focus: key layout, typed records, conditional writes.
//!
//! ## Key Components
//!
//! - `LedgerStore`: get / put / conditional_put / delete / list(prefix)
//! - `schema`: typed records (objects, variants, history, aliases, hooks)
//! - `MemoryLedgerStore`: in-memory fake for tests
//! - `SurrealLedgerStore` + `SurrealHandle`: SurrealDB backend

mod error;
pub mod fakes;
mod handle;
pub mod schema;
pub mod storage_traits;
pub mod surreal_ledger;

pub use error::{StateError, StorageError};
pub use handle::{CloudConfig, DbTarget, SurrealHandle};
pub use schema::{
    EnvAliasRecord, EnvRecord, HistoryRecord, HookRecord, LatestRecord, LedgerRecord, ObjectRecord,
    Timestamp, VariantRecord, DEFAULT_VARIANT,
};
pub use storage_traits::{
    validate_segment, LedgerEntry, LedgerKey, LedgerStore, StorageResult, WriteOutcome,
};
pub use surreal_ledger::SurrealLedgerStore;

/// Result type for connection and schema operations
pub type Result<T> = std::result::Result<T, StateError>;
