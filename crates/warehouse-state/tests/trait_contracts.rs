//! Trait contract tests for LedgerStore.
//!
//! Every behavioral guarantee documented on `LedgerStore` is checked against
//! both the in-memory fake and the SurrealDB backend (in-memory engine).
//! Any conforming implementation must pass these.

use serde_json::json;
use warehouse_state::fakes::MemoryLedgerStore;
use warehouse_state::{
    HistoryRecord, LedgerEntry, LedgerKey, LedgerRecord, LedgerStore, ObjectRecord,
    SurrealLedgerStore, WriteOutcome,
};

fn entry(key: LedgerKey, token: Option<i64>, value: serde_json::Value) -> LedgerEntry {
    LedgerEntry { key, token, value }
}

async fn surreal() -> SurrealLedgerStore {
    SurrealLedgerStore::in_memory().await.expect("surreal in-memory")
}

// ===========================================================================
// Contract bodies
// ===========================================================================

async fn get_absent_is_none(store: &dyn LedgerStore) {
    let got = store.get(&LedgerKey::object("ghost", "prod")).await.unwrap();
    assert!(got.is_none());
}

async fn put_then_get_round_trip(store: &dyn LedgerStore) {
    let key = LedgerKey::variant("app", "prod", "1.0.0", "_default");
    let value = json!({"nested": {"list": [1, 2, 3]}, "text": "hello"});
    store.put(entry(key.clone(), None, value.clone())).await.unwrap();

    let got = store.get(&key).await.unwrap().expect("entry present");
    assert_eq!(got.key, key);
    assert_eq!(got.value, value);
    assert_eq!(got.token, None);
}

async fn put_overwrites(store: &dyn LedgerStore) {
    let key = LedgerKey::env("app", "prod");
    store.put(entry(key.clone(), None, json!("first"))).await.unwrap();
    store.put(entry(key.clone(), Some(3), json!("second"))).await.unwrap();

    let got = store.get(&key).await.unwrap().unwrap();
    assert_eq!(got.value, json!("second"));
    assert_eq!(got.token, Some(3));
}

async fn conditional_put_creates_when_absent(store: &dyn LedgerStore) {
    let key = LedgerKey::object("app", "prod");
    let outcome = store
        .conditional_put(entry(key.clone(), None, json!({"v": 1})), None)
        .await
        .unwrap();
    assert_eq!(outcome, WriteOutcome::Written);
    assert!(store.get(&key).await.unwrap().is_some());
}

async fn conditional_put_rejects_stale_token(store: &dyn LedgerStore) {
    let key = LedgerKey::object("app", "prod");
    store.put(entry(key.clone(), Some(10), json!({"v": 1}))).await.unwrap();

    let outcome = store
        .conditional_put(entry(key.clone(), Some(20), json!({"v": 2})), Some(9))
        .await
        .unwrap();
    assert_eq!(outcome, WriteOutcome::Conflict { current: Some(10) });

    let got = store.get(&key).await.unwrap().unwrap();
    assert_eq!(got.value, json!({"v": 1}));
    assert_eq!(got.token, Some(10));
}

async fn conditional_put_accepts_matching_token(store: &dyn LedgerStore) {
    let key = LedgerKey::object("app", "prod");
    store.put(entry(key.clone(), Some(10), json!({"v": 1}))).await.unwrap();

    let outcome = store
        .conditional_put(entry(key.clone(), Some(20), json!({"v": 2})), Some(10))
        .await
        .unwrap();
    assert!(outcome.is_written());

    let got = store.get(&key).await.unwrap().unwrap();
    assert_eq!(got.token, Some(20));
    assert_eq!(got.value, json!({"v": 2}));
}

async fn create_if_absent_never_overwrites_history(store: &dyn LedgerStore) {
    let record = HistoryRecord {
        name: "app".to_string(),
        env: "prod".to_string(),
        timestamp: 1_000,
        head_version: "1.0.0".to_string(),
        prev_timestamp: None,
    };
    let first = store.conditional_put(record.to_entry().unwrap(), None).await.unwrap();
    assert!(first.is_written());

    let clobber = HistoryRecord {
        head_version: "2.0.0".to_string(),
        ..record.clone()
    };
    let second = store.conditional_put(clobber.to_entry().unwrap(), None).await.unwrap();
    assert_eq!(second, WriteOutcome::Conflict { current: Some(1_000) });

    let stored = store.get(&record.key()).await.unwrap().unwrap();
    assert_eq!(HistoryRecord::from_entry(&stored).unwrap(), record);
}

async fn delete_reports_existence(store: &dyn LedgerStore) {
    let key = LedgerKey::alias("app", "live");
    store.put(entry(key.clone(), None, json!("prod"))).await.unwrap();

    assert!(store.delete(&key).await.unwrap());
    assert!(!store.delete(&key).await.unwrap());
    assert!(store.get(&key).await.unwrap().is_none());
}

async fn list_is_prefix_scoped_and_ordered(store: &dyn LedgerStore) {
    for (version, variant) in [("1.0", "fr"), ("1.0", "en"), ("1.0.1", "en"), ("2.0", "en")] {
        let key = LedgerKey::variant("app", "prod", version, variant);
        store.put(entry(key, None, json!(variant))).await.unwrap();
    }
    store
        .put(entry(LedgerKey::variant("other", "prod", "1.0", "en"), None, json!("x")))
        .await
        .unwrap();

    let listed = store
        .list(&LedgerKey::variants_of_version("app", "prod", "1.0"))
        .await
        .unwrap();
    let keys: Vec<&str> = listed.iter().map(|e| e.key.as_str()).collect();
    assert_eq!(keys, vec!["variant/app/prod/1.0/en", "variant/app/prod/1.0/fr"]);

    let all = store
        .list(&LedgerKey::variants_of_env("app", "prod"))
        .await
        .unwrap();
    assert_eq!(all.len(), 4);
}

async fn typed_object_round_trip(store: &dyn LedgerStore) {
    let mut object = ObjectRecord::new("app", "prod");
    object.head_version = Some("1.0.0".to_string());
    object.head_timestamp = Some(1_234);

    store.put(object.to_entry().unwrap()).await.unwrap();
    let stored = store.get(&object.key()).await.unwrap().unwrap();
    assert_eq!(stored.token, Some(1_234));
    assert_eq!(ObjectRecord::from_entry(&stored).unwrap(), object);
}

// ===========================================================================
// MemoryLedgerStore
// ===========================================================================

#[tokio::test]
async fn memory_get_absent_is_none() {
    get_absent_is_none(&MemoryLedgerStore::new()).await;
}

#[tokio::test]
async fn memory_put_then_get_round_trip() {
    put_then_get_round_trip(&MemoryLedgerStore::new()).await;
}

#[tokio::test]
async fn memory_put_overwrites() {
    put_overwrites(&MemoryLedgerStore::new()).await;
}

#[tokio::test]
async fn memory_conditional_put_creates_when_absent() {
    conditional_put_creates_when_absent(&MemoryLedgerStore::new()).await;
}

#[tokio::test]
async fn memory_conditional_put_rejects_stale_token() {
    conditional_put_rejects_stale_token(&MemoryLedgerStore::new()).await;
}

#[tokio::test]
async fn memory_conditional_put_accepts_matching_token() {
    conditional_put_accepts_matching_token(&MemoryLedgerStore::new()).await;
}

#[tokio::test]
async fn memory_create_if_absent_never_overwrites_history() {
    create_if_absent_never_overwrites_history(&MemoryLedgerStore::new()).await;
}

#[tokio::test]
async fn memory_delete_reports_existence() {
    delete_reports_existence(&MemoryLedgerStore::new()).await;
}

#[tokio::test]
async fn memory_list_is_prefix_scoped_and_ordered() {
    list_is_prefix_scoped_and_ordered(&MemoryLedgerStore::new()).await;
}

#[tokio::test]
async fn memory_typed_object_round_trip() {
    typed_object_round_trip(&MemoryLedgerStore::new()).await;
}

#[tokio::test]
async fn memory_counts_only_successful_writes() {
    let store = MemoryLedgerStore::new();
    let key = LedgerKey::object("app", "prod");
    store.put(entry(key.clone(), Some(1), json!({}))).await.unwrap();
    store
        .conditional_put(entry(key.clone(), Some(2), json!({})), Some(99))
        .await
        .unwrap();
    store.delete(&LedgerKey::env("app", "missing")).await.unwrap();

    assert_eq!(store.write_count(), 1);
    assert_eq!(store.len(), 1);
}

// ===========================================================================
// SurrealLedgerStore
// ===========================================================================

#[tokio::test]
async fn surreal_get_absent_is_none() {
    get_absent_is_none(&surreal().await).await;
}

#[tokio::test]
async fn surreal_put_then_get_round_trip() {
    put_then_get_round_trip(&surreal().await).await;
}

#[tokio::test]
async fn surreal_put_overwrites() {
    put_overwrites(&surreal().await).await;
}

#[tokio::test]
async fn surreal_conditional_put_creates_when_absent() {
    conditional_put_creates_when_absent(&surreal().await).await;
}

#[tokio::test]
async fn surreal_conditional_put_rejects_stale_token() {
    conditional_put_rejects_stale_token(&surreal().await).await;
}

#[tokio::test]
async fn surreal_conditional_put_accepts_matching_token() {
    conditional_put_accepts_matching_token(&surreal().await).await;
}

#[tokio::test]
async fn surreal_create_if_absent_never_overwrites_history() {
    create_if_absent_never_overwrites_history(&surreal().await).await;
}

#[tokio::test]
async fn surreal_delete_reports_existence() {
    delete_reports_existence(&surreal().await).await;
}

#[tokio::test]
async fn surreal_list_is_prefix_scoped_and_ordered() {
    list_is_prefix_scoped_and_ordered(&surreal().await).await;
}

#[tokio::test]
async fn surreal_typed_object_round_trip() {
    typed_object_round_trip(&surreal().await).await;
}
