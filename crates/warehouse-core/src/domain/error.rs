//! Domain-level error taxonomy for Warehouse.

use warehouse_state::{StorageError, Timestamp};

/// Coarse classification a transport layer maps onto status codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    Conflict,
    Gone,
    BadRequest,
    Internal,
}

/// Warehouse domain errors.
#[derive(Debug, thiserror::Error)]
pub enum WarehouseError {
    #[error("Object '{name}' not found in '{env}'")]
    ObjectNotFound { name: String, env: String },

    #[error("Version {version} of '{name}' not found in '{env}'")]
    VersionNotFound {
        name: String,
        env: String,
        version: String,
    },

    #[error("Variant '{variant}' of '{name}@{version}' not found in '{env}'")]
    VariantNotFound {
        name: String,
        env: String,
        version: String,
        variant: String,
    },

    #[error("Object '{name}' has no version to serve in '{env}'")]
    NoVersion { name: String, env: String },

    #[error("Environment '{env}' not found for object '{name}'")]
    EnvNotFound { name: String, env: String },

    #[error("Object '{name}' in '{env}' does not have a previous version to rollback to")]
    NoPreviousVersion { name: String, env: String },

    #[error("Invalid fromEnv parameter value: '{name}' has no head in '{from_env}'")]
    InvalidFromEnv { name: String, from_env: String },

    #[error("Hook '{id}' not found for object '{name}'")]
    HookNotFound { name: String, id: String },

    #[error("Version {version} is already set for object '{name}' in '{env}'")]
    HeadAlreadySet {
        name: String,
        env: String,
        version: String,
    },

    #[error("Object '{name}' in '{env}' is already rolled back to version '{version}'")]
    AlreadyRolledBack {
        name: String,
        env: String,
        version: String,
    },

    #[error(
        "head of '{name}' in '{env}' changed concurrently (expected token {expected:?}, found {actual:?})"
    )]
    StaleHead {
        name: String,
        env: String,
        expected: Option<Timestamp>,
        actual: Option<Timestamp>,
    },


    #[error("Version {version} of '{name}' in '{env}' has been deleted")]
    VersionGone {
        name: String,
        env: String,
        version: String,
    },

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("asset pipeline error: {0}")]
    Asset(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl WarehouseError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            WarehouseError::ObjectNotFound { .. }
            | WarehouseError::VersionNotFound { .. }
            | WarehouseError::VariantNotFound { .. }
            | WarehouseError::EnvNotFound { .. }
            | WarehouseError::NoVersion { .. }
            | WarehouseError::NoPreviousVersion { .. }
            | WarehouseError::InvalidFromEnv { .. }
            | WarehouseError::HookNotFound { .. } => ErrorKind::NotFound,
            WarehouseError::HeadAlreadySet { .. }
            | WarehouseError::AlreadyRolledBack { .. }
            | WarehouseError::StaleHead { .. } => ErrorKind::Conflict,
            WarehouseError::VersionGone { .. } => ErrorKind::Gone,
            WarehouseError::BadRequest(_) => ErrorKind::BadRequest,
            WarehouseError::Storage(StorageError::InvalidKeySegment { .. }) => {
                ErrorKind::BadRequest
            }
            WarehouseError::Asset(_)
            | WarehouseError::Config(_)
            | WarehouseError::Storage(_)
            | WarehouseError::Serialization(_) => ErrorKind::Internal,
        }
    }

    /// Whether the failure is an optimistic-concurrency loss the caller may retry.
    pub fn is_conflict(&self) -> bool {
        self.kind() == ErrorKind::Conflict
    }
}

/// Result type for Warehouse domain operations.
pub type Result<T> = std::result::Result<T, WarehouseError>;
