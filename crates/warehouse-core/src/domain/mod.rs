//! Domain models for Warehouse.
//!
//! Canonical definitions for the entities the registry hands to callers:
//! - `HeadChange` / `HeadRepair`: outcomes of head mutations
//! - `ReleaseEvent`: hook notification payload
//! - `VariantWrite` / `ObjectQuery`: write and read requests
//! - `WarehouseError`: the error taxonomy

pub mod error;
pub mod release;

pub use error::{ErrorKind, Result, WarehouseError};
pub use release::{
    CacheHint, FetchedObject, HeadChange, HeadRepair, HeadSummary, ObjectQuery, PutOutcome,
    ReleaseEvent, ReleaseEventData, ReleaseEventKind, ReleaseLogEntry, VariantWrite,
    VersionEnvironments,
};
