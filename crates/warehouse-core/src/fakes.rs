//! In-memory fakes for testing the registry without external services.
//!
//! - `RecordingNotifier`: captures release events instead of dispatching
//! - `RecordingAuditSink`: captures audit events
//! - `RecordingTransport`: hook transport that records posts and fails on demand
//! - `StaticIngestor`: asset pipeline returning a fixed ingest result

use std::collections::HashSet;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::audit::{AuditEvent, AuditSink};
use crate::cdn::{AssetFile, AssetIngestor, IngestedAssets};
use crate::domain::error::Result;
use crate::domain::release::ReleaseEvent;
use crate::hooks::{HookError, HookTransport, ReleaseNotifier};

// ---------------------------------------------------------------------------
// RecordingNotifier
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct RecordingNotifier {
    events: Mutex<Vec<(String, ReleaseEvent)>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<(String, ReleaseEvent)> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }
}

impl ReleaseNotifier for RecordingNotifier {
    fn notify(&self, name: &str, event: ReleaseEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push((name.to_string(), event));
        }
    }
}

// ---------------------------------------------------------------------------
// RecordingAuditSink
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct RecordingAuditSink {
    events: Mutex<Vec<AuditEvent>>,
}

impl RecordingAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<AuditEvent> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }
}

impl AuditSink for RecordingAuditSink {
    fn record(&self, event: AuditEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}

// ---------------------------------------------------------------------------
// RecordingTransport
// ---------------------------------------------------------------------------

/// Hook transport that records every post. Posts to URLs registered with
/// [`fail_on`](Self::fail_on) fail with a 500 status.
#[derive(Debug, Default)]
pub struct RecordingTransport {
    posts: Mutex<Vec<(String, ReleaseEvent)>>,
    failing: Mutex<HashSet<String>>,
    latency: Option<Duration>,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Each post completes, and is recorded, only after `latency`.
    pub fn with_latency(latency: Duration) -> Self {
        Self {
            latency: Some(latency),
            ..Self::default()
        }
    }

    pub fn fail_on(&self, url: &str) {
        if let Ok(mut failing) = self.failing.lock() {
            failing.insert(url.to_string());
        }
    }

    pub fn posts(&self) -> Vec<(String, ReleaseEvent)> {
        self.posts.lock().map(|p| p.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl HookTransport for RecordingTransport {
    async fn post(&self, url: &str, event: &ReleaseEvent) -> std::result::Result<(), HookError> {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        if let Ok(mut posts) = self.posts.lock() {
            posts.push((url.to_string(), event.clone()));
        }
        let fails = self
            .failing
            .lock()
            .map(|failing| failing.contains(url))
            .unwrap_or(false);
        if fails {
            return Err(HookError::Status { status: 500 });
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// StaticIngestor
// ---------------------------------------------------------------------------

/// Asset pipeline that returns a fixed ingest result and records uploads.
#[derive(Debug, Default)]
pub struct StaticIngestor {
    assets: IngestedAssets,
    uploads: Mutex<Vec<(Vec<AssetFile>, Option<DateTime<Utc>>)>>,
}

impl StaticIngestor {
    pub fn new(assets: IngestedAssets) -> Self {
        Self {
            assets,
            uploads: Mutex::new(Vec::new()),
        }
    }

    pub fn uploads(&self) -> Vec<(Vec<AssetFile>, Option<DateTime<Utc>>)> {
        self.uploads.lock().map(|u| u.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl AssetIngestor for StaticIngestor {
    async fn ingest(&self, _archive: Vec<u8>, _single_fingerprint: bool) -> Result<IngestedAssets> {
        Ok(self.assets.clone())
    }

    async fn upload(&self, files: &[AssetFile], expiration: Option<DateTime<Utc>>) -> Result<()> {
        if let Ok(mut uploads) = self.uploads.lock() {
            uploads.push((files.to_vec(), expiration));
        }
        Ok(())
    }
}
