//! Variant writes through aliases and environment fan-out, and the read
//! paths clients use.

use std::sync::Arc;

use serde_json::json;
use warehouse_core::{
    CacheHint, ErrorKind, ObjectQuery, ReleaseRegistry, SurrealLedgerStore, VariantWrite,
    WarehouseConfig, WarehouseError,
};
use warehouse_state::fakes::MemoryLedgerStore;

const NAME: &str = "checkout-ui";

fn registry() -> ReleaseRegistry {
    ReleaseRegistry::new(Arc::new(MemoryLedgerStore::new()))
}

#[tokio::test]
async fn write_through_alias_lands_in_target_env() {
    let registry = registry();
    registry.create_env(NAME, "production").await.unwrap();
    registry
        .set_env_alias(NAME, "live", "production")
        .await
        .unwrap();

    let outcome = registry
        .put_object_variant(VariantWrite::new(NAME, "1", json!("bundle")).in_env("live"))
        .await
        .unwrap();
    assert_eq!(outcome.environments, vec!["production"]);

    assert!(registry
        .has_object_version(NAME, "production", "1")
        .await
        .unwrap());
    assert!(registry.get_object(NAME, "live").await.unwrap().is_none());
    let envs: Vec<String> = registry
        .get_envs(NAME)
        .await
        .unwrap()
        .into_iter()
        .map(|record| record.env)
        .collect();
    assert_eq!(envs, vec!["production"]);
}

#[tokio::test]
async fn alias_to_removed_env_is_env_not_found() {
    let registry = registry();
    registry
        .put_object_variant(VariantWrite::new(NAME, "1", json!("b")).in_env("production"))
        .await
        .unwrap();
    registry
        .set_env_alias(NAME, "live", "production")
        .await
        .unwrap();
    registry.delete_object(NAME, "production").await.unwrap();

    let err = registry
        .put_object_variant(VariantWrite::new(NAME, "2", json!("b")).in_env("live"))
        .await
        .unwrap_err();
    assert!(matches!(err, WarehouseError::EnvNotFound { ref env, .. } if env == "production"));
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn write_without_env_fans_out_to_every_env() {
    let registry = registry();
    let err = registry
        .put_object_variant(VariantWrite::new(NAME, "1", json!("b")))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::BadRequest);

    registry.create_env(NAME, "production").await.unwrap();
    registry.create_env(NAME, "staging").await.unwrap();

    let outcome = registry
        .put_object_variant(VariantWrite::new(NAME, "1", json!("b")))
        .await
        .unwrap();
    assert!(outcome.created);
    assert_eq!(outcome.environments, vec!["production", "staging"]);

    let versions = registry.list_versions(NAME).await.unwrap();
    assert_eq!(versions.len(), 1);
    assert_eq!(versions[0].version, "1");
    assert_eq!(versions[0].environments, vec!["production", "staging"]);
}

#[tokio::test]
async fn identifiers_with_separators_are_rejected() {
    let registry = registry();
    let err = registry
        .put_object_variant(VariantWrite::new("a/b", "1", json!("b")).in_env("prod"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::BadRequest);

    let err = registry.set_head(NAME, "prod", "", None).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::BadRequest);
}

#[tokio::test]
async fn fetch_resolves_head_and_variant_preferences() {
    let registry = registry().with_config(WarehouseConfig::default().with_default_env("prod"));
    for (version, variant) in [("1", "en"), ("1", "de"), ("2", "en")] {
        registry
            .put_object_variant(
                VariantWrite::new(NAME, version, json!({ "v": version, "lang": variant }))
                    .in_env("prod")
                    .with_variant(variant),
            )
            .await
            .unwrap();
    }
    registry.set_head(NAME, "prod", "1", None).await.unwrap();

    // default env, head version
    let fetched = registry.fetch_object(ObjectQuery::new(NAME)).await.unwrap();
    assert_eq!(fetched.version, "1");
    assert_eq!(fetched.cache, CacheHint::HEAD);
    assert_eq!(fetched.cache.cache_control(), "public, max-age=60");
    assert_eq!(fetched.variants.len(), 2);

    let fetched = registry
        .fetch_object(ObjectQuery::new(NAME).accepting("fr, de"))
        .await
        .unwrap();
    assert_eq!(fetched.variants.len(), 1);
    assert_eq!(fetched.variants[0].variant, "de");

    // a pinned version is cached longer
    let fetched = registry
        .fetch_object(ObjectQuery::new(NAME).at_version("2"))
        .await
        .unwrap();
    assert_eq!(fetched.version, "2");
    assert_eq!(fetched.cache, CacheHint::PINNED);

    let err = registry
        .fetch_object(ObjectQuery::new(NAME).at_version("3"))
        .await
        .unwrap_err();
    assert!(matches!(err, WarehouseError::VersionNotFound { .. }));
    let err = registry
        .fetch_object(ObjectQuery::new(NAME).in_env("qa"))
        .await
        .unwrap_err();
    assert!(matches!(err, WarehouseError::ObjectNotFound { .. }));
}

#[tokio::test]
async fn release_log_lists_head_changes_newest_first() {
    let registry = registry();
    for version in ["1", "2"] {
        registry
            .put_object_variant(VariantWrite::new(NAME, version, json!("b")).in_env("prod"))
            .await
            .unwrap();
    }
    assert!(registry.release_log(NAME, "prod").await.unwrap().is_empty());

    let first = registry.set_head(NAME, "prod", "1", None).await.unwrap();
    registry
        .set_head(NAME, "prod", "2", Some(first.timestamp))
        .await
        .unwrap();

    let log: Vec<String> = registry
        .release_log(NAME, "prod")
        .await
        .unwrap()
        .into_iter()
        .map(|entry| entry.version)
        .collect();
    assert_eq!(log, vec!["2", "1"]);

    let heads = registry.get_heads(NAME).await.unwrap();
    assert_eq!(heads.len(), 1);
    assert_eq!(heads[0].head_version.as_deref(), Some("2"));
    assert_eq!(heads[0].latest_version.as_deref(), Some("2"));

    let err = registry.release_log(NAME, "qa").await.unwrap_err();
    assert!(matches!(err, WarehouseError::ObjectNotFound { .. }));
}

#[tokio::test]
async fn release_cycle_on_embedded_surrealdb() {
    let store = SurrealLedgerStore::in_memory().await.unwrap();
    let registry = ReleaseRegistry::new(Arc::new(store));

    for version in ["1", "2"] {
        registry
            .put_object_variant(VariantWrite::new(NAME, version, json!({ "v": version })).in_env("prod"))
            .await
            .unwrap();
    }
    let first = registry.set_head(NAME, "prod", "1", None).await.unwrap();
    let err = registry
        .set_head(NAME, "prod", "2", None)
        .await
        .unwrap_err();
    assert!(err.is_conflict());

    registry
        .set_head(NAME, "prod", "2", Some(first.timestamp))
        .await
        .unwrap();
    let rolled = registry.rollback(NAME, "prod", 1).await.unwrap();
    assert_eq!(rolled.version, "1");

    let head = registry.get_head(NAME, "prod").await.unwrap();
    assert_eq!(head.head_version.as_deref(), Some("1"));
    assert_eq!(registry.get_history_records(NAME, "prod").await.unwrap().len(), 3);
}
