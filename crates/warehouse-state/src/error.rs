//! Error types for warehouse-state

use thiserror::Error;

/// Errors raised while connecting to or preparing the backing database
#[derive(Error, Debug)]
pub enum StateError {
    /// Database connection error
    #[error("Database connection failed: {0}")]
    Connection(String),

    /// Schema setup error
    #[error("Schema setup failed: {0}")]
    SchemaSetup(String),
}

/// Errors surfaced through the [`LedgerStore`](crate::LedgerStore) contract.
///
/// A conditional-write mismatch is *not* an error: it is reported as
/// [`WriteOutcome::Conflict`](crate::WriteOutcome::Conflict).
#[derive(Error, Debug)]
pub enum StorageError {
    /// The store could not be reached or rejected the operation
    #[error("ledger backend error: {0}")]
    Backend(String),

    /// A stored value could not be encoded or decoded
    #[error("ledger serialization error for {key}: {reason}")]
    Serialization { key: String, reason: String },

    /// A key segment was empty or contained the key separator
    #[error("invalid ledger key segment {segment:?}")]
    InvalidKeySegment { segment: String },
}
