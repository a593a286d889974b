//! Release and head-change tracking.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use warehouse_state::{Timestamp, VariantRecord};

/// A committed change of an object's head in one environment.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HeadChange {
    pub name: String,
    pub env: String,

    /// Version that is now live.
    pub version: String,

    /// Version that was live before the change, if any.
    pub previous_version: Option<String>,

    /// Timestamp of the history record written for this change. Also the
    /// new concurrency token of the object.
    pub timestamp: Timestamp,

    /// Token the change was conditioned on.
    pub prev_timestamp: Option<Timestamp>,
}

/// What a head consistency check did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeadRepair {
    /// No object record exists for the environment.
    NoObject,
    /// The head is unset or points at an existing version.
    Consistent,
    /// The head pointed at a deleted version and was moved back along the
    /// history chain.
    Repaired {
        from: String,
        to: String,
        timestamp: Timestamp,
    },
    /// No record in the chain references an existing version; the head was
    /// cleared.
    Cleared { from: String },
    /// A concurrent writer changed the head while the repair was in flight.
    Superseded,
}

impl HeadRepair {
    pub fn changed_head(&self) -> bool {
        matches!(self, HeadRepair::Repaired { .. } | HeadRepair::Cleared { .. })
    }
}

/// Kind of release notification sent to hook subscribers.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReleaseEventKind {
    NewRelease,
    Rollback,
}

/// Payload of a release notification.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ReleaseEventData {
    pub object: String,
    pub environment: String,
    pub version: String,
    pub previous_version: Option<String>,
}

/// JSON body posted to every hook of an object after a head change.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReleaseEvent {
    pub event: ReleaseEventKind,
    pub data: ReleaseEventData,
}

impl ReleaseEvent {
    pub fn from_change(event: ReleaseEventKind, change: &HeadChange) -> Self {
        Self {
            event,
            data: ReleaseEventData {
                object: change.name.clone(),
                environment: change.env.clone(),
                version: change.version.clone(),
                previous_version: change.previous_version.clone(),
            },
        }
    }
}

/// Input of a variant write.
///
/// Without an environment the variant is written to every environment the
/// object already has.
#[derive(Debug, Clone, PartialEq)]
pub struct VariantWrite {
    pub name: String,
    pub version: String,
    /// Concrete environment or alias
    pub env: Option<String>,
    pub variant: String,
    pub data: serde_json::Value,
    pub expiration: Option<DateTime<Utc>>,
}

impl VariantWrite {
    pub fn new(
        name: impl Into<String>,
        version: impl Into<String>,
        data: serde_json::Value,
    ) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            env: None,
            variant: warehouse_state::DEFAULT_VARIANT.to_string(),
            data,
            expiration: None,
        }
    }

    pub fn in_env(mut self, env: impl Into<String>) -> Self {
        self.env = Some(env.into());
        self
    }

    pub fn with_variant(mut self, variant: impl Into<String>) -> Self {
        self.variant = variant.into();
        self
    }

    pub fn expires_at(mut self, expiration: DateTime<Utc>) -> Self {
        self.expiration = Some(expiration);
        self
    }
}

/// Result of a variant write.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PutOutcome {
    pub created: bool,
    /// Concrete environments the variant was written to.
    pub environments: Vec<String>,
}

/// Head and latest version of an object in one environment.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct HeadSummary {
    pub environment: String,
    pub head_version: Option<String>,
    /// Absent once every version has been deleted.
    pub latest_version: Option<String>,
}

/// A version and the environments it exists in.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct VersionEnvironments {
    pub version: String,
    pub environments: Vec<String>,
}

/// One line of an object's release log.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ReleaseLogEntry {
    pub version: String,
    pub release_date: DateTime<Utc>,
}

/// Read request for an object's variants.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ObjectQuery {
    pub name: String,
    /// Defaults to the configured default environment.
    pub env: Option<String>,
    /// Defaults to the head version, or the latest version without a head.
    pub version: Option<String>,
    /// Comma-separated preference list of variant keys.
    pub accepted_variants: Option<String>,
}

impl ObjectQuery {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn in_env(mut self, env: impl Into<String>) -> Self {
        self.env = Some(env.into());
        self
    }

    pub fn at_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    pub fn accepting(mut self, accepted_variants: impl Into<String>) -> Self {
        self.accepted_variants = Some(accepted_variants.into());
        self
    }
}

/// How long a client may cache a fetch result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheHint {
    pub max_age_secs: u32,
}

impl CacheHint {
    /// Result resolved through the head; it changes with every release.
    pub const HEAD: CacheHint = CacheHint { max_age_secs: 60 };
    /// Result for a pinned version.
    pub const PINNED: CacheHint = CacheHint {
        max_age_secs: 86_400,
    };

    pub fn cache_control(&self) -> String {
        format!("public, max-age={}", self.max_age_secs)
    }
}

/// Variants returned by a fetch, with the version they were read from.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchedObject {
    pub version: String,
    pub variants: Vec<VariantRecord>,
    pub cache: CacheHint,
}
