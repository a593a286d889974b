//! Typed access to the ledger store.
//!
//! Wraps a shared [`LedgerStore`] and speaks in schema records instead of
//! raw entries. Every higher layer of the registry goes through here.

use std::collections::HashSet;
use std::sync::Arc;

use warehouse_state::{
    validate_segment, EnvAliasRecord, EnvRecord, HistoryRecord, HookRecord, LatestRecord,
    LedgerKey, LedgerRecord, LedgerStore, ObjectRecord, Timestamp, VariantRecord, WriteOutcome,
};

use crate::domain::error::{Result, WarehouseError};

/// Shared, typed handle over a ledger store.
#[derive(Clone)]
pub struct Ledger {
    store: Arc<dyn LedgerStore>,
}

impl Ledger {
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn LedgerStore> {
        &self.store
    }

    pub async fn get<T: LedgerRecord>(&self, key: &LedgerKey) -> Result<Option<T>> {
        match self.store.get(key).await? {
            Some(entry) => Ok(Some(T::from_entry(&entry)?)),
            None => Ok(None),
        }
    }

    pub async fn list<T: LedgerRecord>(&self, prefix: &LedgerKey) -> Result<Vec<T>> {
        self.store
            .list(prefix)
            .await?
            .iter()
            .map(|entry| T::from_entry(entry).map_err(WarehouseError::from))
            .collect()
    }

    pub async fn put<T: LedgerRecord>(&self, record: &T) -> Result<()> {
        self.store.put(record.to_entry()?).await?;
        Ok(())
    }

    /// Write `record` iff the stored token equals `expected`.
    pub async fn put_if<T: LedgerRecord>(
        &self,
        record: &T,
        expected: Option<i64>,
    ) -> Result<WriteOutcome> {
        Ok(self.store.conditional_put(record.to_entry()?, expected).await?)
    }

    pub async fn delete(&self, key: &LedgerKey) -> Result<bool> {
        Ok(self.store.delete(key).await?)
    }

    // -----------------------------------------------------------------------
    // Record accessors
    // -----------------------------------------------------------------------

    pub async fn object(&self, name: &str, env: &str) -> Result<Option<ObjectRecord>> {
        self.get(&LedgerKey::object(name, env)).await
    }

    /// Object record, or `ObjectNotFound`.
    pub async fn require_object(&self, name: &str, env: &str) -> Result<ObjectRecord> {
        self.object(name, env)
            .await?
            .ok_or_else(|| WarehouseError::ObjectNotFound {
                name: name.to_string(),
                env: env.to_string(),
            })
    }

    pub async fn latest(&self, name: &str, env: &str) -> Result<Option<LatestRecord>> {
        self.get(&LedgerKey::latest(name, env)).await
    }

    pub async fn env(&self, name: &str, env: &str) -> Result<Option<EnvRecord>> {
        self.get(&LedgerKey::env(name, env)).await
    }

    pub async fn envs(&self, name: &str) -> Result<Vec<EnvRecord>> {
        self.list(&LedgerKey::envs_of(name)).await
    }

    pub async fn alias(&self, name: &str, alias: &str) -> Result<Option<EnvAliasRecord>> {
        self.get(&LedgerKey::alias(name, alias)).await
    }

    pub async fn variant(
        &self,
        name: &str,
        env: &str,
        version: &str,
        variant: &str,
    ) -> Result<Option<VariantRecord>> {
        self.get(&LedgerKey::variant(name, env, version, variant))
            .await
    }

    pub async fn variants_of_version(
        &self,
        name: &str,
        env: &str,
        version: &str,
    ) -> Result<Vec<VariantRecord>> {
        self.list(&LedgerKey::variants_of_version(name, env, version))
            .await
    }

    /// Distinct versions with at least one variant, in key order.
    pub async fn versions(&self, name: &str, env: &str) -> Result<Vec<String>> {
        let variants: Vec<VariantRecord> = self.list(&LedgerKey::variants_of_env(name, env)).await?;
        let mut versions: Vec<String> = Vec::new();
        for variant in variants {
            if versions.last() != Some(&variant.version) {
                versions.push(variant.version);
            }
        }
        Ok(versions)
    }

    pub async fn version_set(&self, name: &str, env: &str) -> Result<HashSet<String>> {
        Ok(self.versions(name, env).await?.into_iter().collect())
    }

    pub async fn has_version(&self, name: &str, env: &str, version: &str) -> Result<bool> {
        Ok(!self
            .store
            .list(&LedgerKey::variants_of_version(name, env, version))
            .await?
            .is_empty())
    }

    pub async fn history_record(
        &self,
        name: &str,
        env: &str,
        timestamp: Timestamp,
    ) -> Result<Option<HistoryRecord>> {
        self.get(&LedgerKey::history(name, env, timestamp)).await
    }

    /// Every history record of (name, env), oldest first.
    pub async fn history_records(&self, name: &str, env: &str) -> Result<Vec<HistoryRecord>> {
        self.list(&LedgerKey::history_of(name, env)).await
    }

    pub async fn hooks(&self, name: &str) -> Result<Vec<HookRecord>> {
        self.list(&LedgerKey::hooks_of(name)).await
    }
}

/// Reject identifiers that cannot be used as a ledger key segment.
pub fn validate_names(segments: &[&str]) -> Result<()> {
    for segment in segments {
        validate_segment(segment).map_err(|_| {
            WarehouseError::BadRequest(format!(
                "'{}' is not a valid identifier: it must be non-empty and must not contain '/'",
                segment
            ))
        })?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::json;
    use warehouse_state::fakes::MemoryLedgerStore;

    fn variant(version: &str, key: &str) -> VariantRecord {
        VariantRecord {
            name: "app".to_string(),
            env: "prod".to_string(),
            version: version.to_string(),
            variant: key.to_string(),
            data: json!(key),
            expiration: None,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_versions_are_distinct_and_ordered() {
        let ledger = Ledger::new(Arc::new(MemoryLedgerStore::new()));
        for record in [
            variant("2.0.0", "en"),
            variant("1.0.0", "fr"),
            variant("1.0.0", "en"),
        ] {
            ledger.put(&record).await.unwrap();
        }

        let versions = ledger.versions("app", "prod").await.unwrap();
        assert_eq!(versions, vec!["1.0.0", "2.0.0"]);
        assert!(ledger.has_version("app", "prod", "1.0.0").await.unwrap());
        assert!(!ledger.has_version("app", "prod", "1.0").await.unwrap());
    }

    #[tokio::test]
    async fn test_require_object_not_found() {
        let ledger = Ledger::new(Arc::new(MemoryLedgerStore::new()));
        let err = ledger.require_object("app", "prod").await.unwrap_err();
        assert!(matches!(err, WarehouseError::ObjectNotFound { .. }));
    }

    #[test]
    fn test_validate_names() {
        assert!(validate_names(&["app", "prod", "1.0.0"]).is_ok());
        let err = validate_names(&["app", "a/b"]).unwrap_err();
        assert!(matches!(err, WarehouseError::BadRequest(_)));
        assert!(validate_names(&[""]).is_err());
    }
}
