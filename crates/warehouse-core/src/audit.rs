//! Security audit events.
//!
//! Successful mutations are reported to an injected [`AuditSink`]. Running
//! without one is a valid configuration: the default is [`NoopAuditSink`].

use serde::{Deserialize, Serialize};
use tracing::info;

/// What kind of resource an audited action touched.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AuditCategory {
    Database,
    File,
}

/// What an audited action did to its resource.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AuditKind {
    Creation,
    Change,
    Deletion,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AuditEvent {
    pub category: AuditCategory,
    pub kind: AuditKind,
    pub message: String,
    pub success: bool,
}

impl AuditEvent {
    pub fn allowed(category: AuditCategory, kind: AuditKind, message: impl Into<String>) -> Self {
        Self {
            category,
            kind,
            message: message.into(),
            success: true,
        }
    }
}

/// Receiver of security audit events.
pub trait AuditSink: Send + Sync {
    fn record(&self, event: AuditEvent);
}

/// Drops every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopAuditSink;

impl AuditSink for NoopAuditSink {
    fn record(&self, _event: AuditEvent) {}
}

/// Writes events to the `warehouse::security` tracing target.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn record(&self, event: AuditEvent) {
        info!(
            target: "warehouse::security",
            category = ?event.category,
            kind = ?event.kind,
            success = event.success,
            "{}",
            event.message
        );
    }
}
