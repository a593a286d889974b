//! CDN publish facade over a fixed asset pipeline.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::json;
use warehouse_core::audit::{AuditCategory, AuditKind};
use warehouse_core::fakes::{RecordingAuditSink, StaticIngestor};
use warehouse_core::{
    AssetFile, CdnPublisher, ExpirationParam, IngestedAssets, PublishOptions, WarehouseError,
};

fn assets() -> IngestedAssets {
    let mut metadata = HashMap::new();
    metadata.insert("main.js".to_string(), json!({ "size": 1024 }));
    IngestedAssets {
        files: vec![
            AssetFile {
                id: "3f2a9c".to_string(),
                name: "main.js".to_string(),
            },
            AssetFile {
                id: "77be01".to_string(),
                name: "main.css".to_string(),
            },
        ],
        metadata,
    }
}

#[tokio::test]
async fn publish_shapes_fingerprints_and_urls() {
    let ingestor = Arc::new(StaticIngestor::new(assets()));
    let audit = Arc::new(RecordingAuditSink::new());
    let publisher = CdnPublisher::new(ingestor.clone(), Some("https://cdn.example.com/".to_string()))
        .with_audit_sink(audit.clone());

    let result = publisher
        .publish(b"archive".to_vec(), PublishOptions::default())
        .await
        .unwrap();

    assert_eq!(result.fingerprints, vec!["3f2a9c.gz", "77be01.gz"]);
    assert_eq!(result.recommended, vec!["3f2a9c/main.js", "77be01/main.css"]);
    assert_eq!(result.files[0].url, "https://cdn.example.com/3f2a9c/main.js");
    assert_eq!(result.files[0].metadata, Some(json!({ "size": 1024 })));
    assert_eq!(result.files[1].url, "https://cdn.example.com/77be01/main.css");
    assert_eq!(result.files[1].metadata, None);

    let uploads = ingestor.uploads();
    assert_eq!(uploads.len(), 1);
    assert_eq!(uploads[0].0.len(), 2);
    assert_eq!(uploads[0].1, None);

    let events = audit.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].category, AuditCategory::File);
    assert_eq!(events[0].kind, AuditKind::Creation);
}

#[tokio::test]
async fn request_base_url_overrides_configured_one() {
    let publisher = CdnPublisher::new(
        Arc::new(StaticIngestor::new(assets())),
        Some("https://cdn.example.com".to_string()),
    );
    let result = publisher
        .publish(
            Vec::new(),
            PublishOptions {
                cdn_base_url: Some("https://edge.example.org".to_string()),
                ..PublishOptions::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(result.files[1].url, "https://edge.example.org/77be01/main.css");
}

#[tokio::test]
async fn publish_without_base_url_is_bad_request() {
    let ingestor = Arc::new(StaticIngestor::new(assets()));
    let publisher = CdnPublisher::new(ingestor.clone(), None);

    let err = publisher
        .publish(Vec::new(), PublishOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, WarehouseError::BadRequest(_)));
    assert!(ingestor.uploads().is_empty());
}

#[tokio::test]
async fn expiration_is_validated_before_upload() {
    let ingestor = Arc::new(StaticIngestor::new(assets()));
    let publisher = CdnPublisher::new(ingestor.clone(), Some("https://cdn.example.com".to_string()));

    let err = publisher
        .publish(
            Vec::new(),
            PublishOptions {
                expiration: Some(ExpirationParam::Duration("2m".to_string())),
                ..PublishOptions::default()
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, WarehouseError::BadRequest(_)));
    assert!(ingestor.uploads().is_empty());

    publisher
        .publish(
            Vec::new(),
            PublishOptions {
                expiration: Some(ExpirationParam::Duration("7d".to_string())),
                ..PublishOptions::default()
            },
        )
        .await
        .unwrap();
    let uploads = ingestor.uploads();
    assert_eq!(uploads.len(), 1);
    assert!(uploads[0].1.is_some());
}
