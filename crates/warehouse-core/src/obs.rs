//! Structured observability hooks for release lifecycle events.
//!
//! This module provides:
//! - Object-scoped tracing spans via `ObjectSpan` RAII guard
//! - Emission functions for head changes, variant writes, deletions and hook deliveries
//!
//! Every event carries a stable `event` field. Events are emitted at `info!`
//! level, failures at `warn!` (filter via `RUST_LOG`).

use tracing::{info, warn};

/// RAII guard that enters a span tagged with an object and environment.
///
/// # Example
///
/// ```ignore
/// let _span = ObjectSpan::enter("checkout-ui", "production");
/// // Now all tracing calls are associated with object/env
/// ```
pub struct ObjectSpan {
    _span: tracing::span::EnteredSpan,
}

impl ObjectSpan {
    pub fn enter(name: &str, env: &str) -> Self {
        let span = tracing::info_span!("warehouse.object", object = %name, env = %env);
        Self {
            _span: span.entered(),
        }
    }
}

/// Emit event: head moved to a new version.
///
/// # Example
///
/// ```ignore
/// emit_head_set("app", "prod", "2.0.0", 1700000000000);
/// // logs: event=head.set object=app env=prod version=2.0.0 timestamp=1700000000000
/// ```
pub fn emit_head_set(name: &str, env: &str, version: &str, timestamp: i64) {
    info!(event = "head.set", object = %name, env = %env, version = %version, timestamp = timestamp);
}

/// Emit event: head rolled back `hops` records.
pub fn emit_head_rollback(name: &str, env: &str, version: &str, hops: u32) {
    info!(event = "head.rollback", object = %name, env = %env, version = %version, hops = hops);
}

/// Emit event: a dangling head was moved back to an existing version.
pub fn emit_head_repaired(name: &str, env: &str, from: &str, to: &str) {
    warn!(event = "head.repaired", object = %name, env = %env, from = %from, to = %to);
}

/// Emit event: a dangling head had no valid predecessor and was cleared.
pub fn emit_head_cleared(name: &str, env: &str, from: &str) {
    warn!(event = "head.cleared", object = %name, env = %env, from = %from);
}

pub fn emit_variant_put(name: &str, env: &str, version: &str, variant: &str) {
    info!(event = "variant.put", object = %name, env = %env, version = %version, variant = %variant);
}

/// Emit event: a version, or a single variant of it, was deleted.
pub fn emit_version_deleted(name: &str, env: &str, version: &str, variant: Option<&str>) {
    info!(
        event = "version.deleted",
        object = %name,
        env = %env,
        version = %version,
        variant = variant.unwrap_or("*"),
    );
}

pub fn emit_hook_delivered(name: &str, url: &str) {
    info!(event = "hook.delivered", object = %name, url = %url);
}

/// Emit event: hook delivery failed (warning level).
pub fn emit_hook_failed(name: &str, url: &str, error: &dyn std::fmt::Display) {
    warn!(event = "hook.failed", object = %name, url = %url, error = %error);
}
