//! CDN publish facade.
//!
//! Archive ingestion and blob upload belong to an external asset pipeline
//! reached through [`AssetIngestor`]. This module validates the requested
//! expiration, drives ingest then upload, and shapes the published file
//! list.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use crate::audit::{AuditCategory, AuditEvent, AuditKind, AuditSink, NoopAuditSink};
use crate::domain::error::{Result, WarehouseError};

/// Expirations closer than this are rejected.
pub const MIN_EXPIRATION: Duration = Duration::from_secs(5 * 60);

/// Requested expiration: a duration such as `"7d"`, or an absolute time in
/// epoch milliseconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ExpirationParam {
    Duration(String),
    EpochMillis(i64),
}

/// Parse a human duration: a number followed by an optional unit.
///
/// Units: `ms`, `s`, `m`, `h`, `d`, `w`, `y` and their long forms
/// (`minutes`, `hrs`, ...). A bare number is milliseconds.
pub fn parse_duration(raw: &str) -> Option<Duration> {
    let raw = raw.trim();
    let split = raw
        .find(|c: char| !(c.is_ascii_digit() || c == '.' || c == '-'))
        .unwrap_or(raw.len());
    let (number, unit) = raw.split_at(split);
    let value: f64 = number.parse().ok()?;

    let unit_ms: f64 = match unit.trim().to_ascii_lowercase().as_str() {
        "" | "ms" | "msec" | "msecs" | "millisecond" | "milliseconds" => 1.0,
        "s" | "sec" | "secs" | "second" | "seconds" => 1_000.0,
        "m" | "min" | "mins" | "minute" | "minutes" => 60_000.0,
        "h" | "hr" | "hrs" | "hour" | "hours" => 3_600_000.0,
        "d" | "day" | "days" => 86_400_000.0,
        "w" | "week" | "weeks" => 604_800_000.0,
        "y" | "yr" | "yrs" | "year" | "years" => 31_557_600_000.0,
        _ => return None,
    };

    let millis = value * unit_ms;
    if !millis.is_finite() || millis <= 0.0 {
        return None;
    }
    Some(Duration::from_millis(millis.round() as u64))
}

/// Resolve a requested expiration against `now`.
pub fn parse_expiration(
    param: Option<&ExpirationParam>,
    now: DateTime<Utc>,
) -> Result<Option<DateTime<Utc>>> {
    let expires_at = match param {
        None => return Ok(None),
        Some(ExpirationParam::Duration(raw)) => {
            let invalid =
                || WarehouseError::BadRequest(format!("'{}' is not a valid expiration value", raw));
            let duration = parse_duration(raw).ok_or_else(invalid)?;
            let duration = chrono::Duration::from_std(duration).map_err(|_| invalid())?;
            // Out-of-range instants are rejected rather than saturated.
            now.checked_add_signed(duration).ok_or_else(invalid)?
        }
        Some(ExpirationParam::EpochMillis(ms)) => DateTime::from_timestamp_millis(*ms)
            .ok_or_else(|| {
                WarehouseError::BadRequest(format!("'{}' is not a valid expiration value", ms))
            })?,
    };

    let min = chrono::Duration::from_std(MIN_EXPIRATION)
        .map_err(|e| WarehouseError::Config(e.to_string()))?;
    if expires_at - now < min {
        return Err(WarehouseError::BadRequest(format!(
            "Expiration '{}' is less than {}m",
            expires_at.to_rfc3339(),
            MIN_EXPIRATION.as_secs() / 60
        )));
    }
    Ok(Some(expires_at))
}

/// A content-addressed file produced by ingestion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetFile {
    /// Content fingerprint
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IngestedAssets {
    pub files: Vec<AssetFile>,
    /// Per-file metadata keyed by file name
    pub metadata: HashMap<String, serde_json::Value>,
}

/// External asset pipeline.
#[async_trait]
pub trait AssetIngestor: Send + Sync {
    /// Turn an uploaded archive into content-addressed files.
    async fn ingest(&self, archive: Vec<u8>, single_fingerprint: bool) -> Result<IngestedAssets>;

    /// Store ingested files, optionally expiring at `expiration`.
    async fn upload(&self, files: &[AssetFile], expiration: Option<DateTime<Utc>>) -> Result<()>;
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PublishOptions {
    pub expiration: Option<ExpirationParam>,
    /// Overrides the configured base URL
    pub cdn_base_url: Option<String>,
    pub single_fingerprint: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublishedFile {
    pub url: String,
    pub metadata: Option<serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CdnUploadResult {
    pub fingerprints: Vec<String>,
    pub recommended: Vec<String>,
    pub files: Vec<PublishedFile>,
}

/// Publishes archives through an [`AssetIngestor`].
pub struct CdnPublisher {
    ingestor: Arc<dyn AssetIngestor>,
    audit: Arc<dyn AuditSink>,
    base_url: Option<String>,
}

impl CdnPublisher {
    pub fn new(ingestor: Arc<dyn AssetIngestor>, base_url: Option<String>) -> Self {
        Self {
            ingestor,
            audit: Arc::new(NoopAuditSink),
            base_url,
        }
    }

    pub fn with_audit_sink(mut self, audit: Arc<dyn AuditSink>) -> Self {
        self.audit = audit;
        self
    }

    #[instrument(skip(self, archive), fields(bytes = archive.len()))]
    pub async fn publish(&self, archive: Vec<u8>, options: PublishOptions) -> Result<CdnUploadResult> {
        let expiration = parse_expiration(options.expiration.as_ref(), Utc::now())?;
        let base_url = options
            .cdn_base_url
            .or_else(|| self.base_url.clone())
            .map(|url| url.trim_end_matches('/').to_string())
            .ok_or_else(|| WarehouseError::BadRequest("no CDN base URL configured".to_string()))?;

        let IngestedAssets { files, metadata } = self
            .ingestor
            .ingest(archive, options.single_fingerprint)
            .await?;
        self.ingestor.upload(&files, expiration).await?;

        info!(files = files.len(), "assets uploaded");
        self.audit.record(AuditEvent::allowed(
            AuditCategory::File,
            AuditKind::Creation,
            "Files successfully uploaded",
        ));

        Ok(CdnUploadResult {
            fingerprints: files.iter().map(|file| format!("{}.gz", file.id)).collect(),
            recommended: files
                .iter()
                .map(|file| format!("{}/{}", file.id, file.name))
                .collect(),
            files: files
                .iter()
                .map(|file| PublishedFile {
                    url: format!("{}/{}/{}", base_url, file.id, file.name),
                    metadata: metadata.get(&file.name).cloned(),
                })
                .collect(),
        })
    }
}
