//! Release state machine.
//!
//! [`ReleaseRegistry`] is the only writer of an object's head pointer. Every
//! head change appends an immutable history record first and then flips the
//! object record with a compare-and-swap on the previously observed
//! `head_timestamp`, so a crash between the two writes leaves the pointer
//! behind the chain, never ahead of it. A lost compare-and-swap removes the
//! history record it wrote and surfaces as [`WarehouseError::StaleHead`];
//! nothing is retried internally.
//!
//! Variant writes never touch the object record once it exists. The most
//! recently written version lives in its own [`LatestRecord`].

use std::sync::Arc;

use chrono::Utc;
use futures::future::join_all;
use tracing::{debug, instrument};
use warehouse_state::{
    EnvRecord, HistoryRecord, LatestRecord, LedgerKey, LedgerRecord, LedgerStore, ObjectRecord,
    Timestamp, VariantRecord, WriteOutcome,
};

use crate::alias::resolve_env;
use crate::audit::{AuditCategory, AuditEvent, AuditKind, AuditSink, NoopAuditSink};
use crate::config::WarehouseConfig;
use crate::domain::error::{Result, WarehouseError};
use crate::domain::release::{
    HeadChange, HeadRepair, PutOutcome, ReleaseEvent, ReleaseEventKind, VariantWrite,
};
use crate::history::{next_timestamp, HistoryChain};
use crate::hooks::{NoopNotifier, ReleaseNotifier};
use crate::ledger::{validate_names, Ledger};
use crate::obs;

/// Release registry over a shared ledger store.
pub struct ReleaseRegistry {
    pub(crate) ledger: Ledger,
    notifier: Arc<dyn ReleaseNotifier>,
    audit: Arc<dyn AuditSink>,
    pub(crate) config: WarehouseConfig,
}

impl ReleaseRegistry {
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        Self {
            ledger: Ledger::new(store),
            notifier: Arc::new(NoopNotifier),
            audit: Arc::new(NoopAuditSink),
            config: WarehouseConfig::default(),
        }
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn ReleaseNotifier>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn with_audit_sink(mut self, audit: Arc<dyn AuditSink>) -> Self {
        self.audit = audit;
        self
    }

    pub fn with_config(mut self, config: WarehouseConfig) -> Self {
        self.config = config;
        self
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    pub fn config(&self) -> &WarehouseConfig {
        &self.config
    }

    pub(crate) fn audit(&self, kind: AuditKind, message: String) {
        self.audit
            .record(AuditEvent::allowed(AuditCategory::Database, kind, message));
    }

    // -----------------------------------------------------------------------
    // Variant writes
    // -----------------------------------------------------------------------

    /// Write a variant of a version.
    ///
    /// With an environment, an alias is resolved first; an alias must point
    /// at an existing environment while a literal name creates it on demand.
    /// Without one, the variant is written to every environment the object
    /// already has.
    #[instrument(skip(self, write), fields(name = %write.name, version = %write.version, variant = %write.variant))]
    pub async fn put_object_variant(&self, write: VariantWrite) -> Result<PutOutcome> {
        validate_names(&[write.name.as_str(), write.version.as_str(), write.variant.as_str()])?;

        let environments = match write.env.as_deref() {
            Some(env_or_alias) => {
                validate_names(&[env_or_alias])?;
                let resolved = resolve_env(&self.ledger, &write.name, env_or_alias).await?;
                if !resolved.force_create
                    && self.ledger.env(&write.name, &resolved.env).await?.is_none()
                {
                    return Err(WarehouseError::EnvNotFound {
                        name: write.name.clone(),
                        env: resolved.env,
                    });
                }
                vec![resolved.env]
            }
            None => {
                let envs = self.ledger.envs(&write.name).await?;
                if envs.is_empty() {
                    return Err(WarehouseError::BadRequest(
                        "You must define at least one environment or specify one with this request to create one"
                            .to_string(),
                    ));
                }
                envs.into_iter().map(|record| record.env).collect()
            }
        };

        let writes = environments.iter().map(|env| self.write_variant(&write, env));
        for written in join_all(writes).await {
            written?;
        }

        self.audit(
            AuditKind::Creation,
            format!(
                "Object \"{}\" variant \"{}\" successfully created in \"{}\"",
                write.name,
                write.variant,
                environments.join(", ")
            ),
        );

        Ok(PutOutcome {
            created: true,
            environments,
        })
    }

    async fn write_variant(&self, write: &VariantWrite, env: &str) -> Result<()> {
        let record = VariantRecord {
            name: write.name.clone(),
            env: env.to_string(),
            version: write.version.clone(),
            variant: write.variant.clone(),
            data: write.data.clone(),
            expiration: write.expiration,
            created_at: Utc::now(),
        };
        self.ledger.put(&record).await?;

        if self.ledger.env(&write.name, env).await?.is_none() {
            self.ledger.put(&EnvRecord::new(&write.name, env)).await?;
        }

        self.ledger
            .put(&LatestRecord::new(&write.name, env, &write.version))
            .await?;

        if self.ledger.object(&write.name, env).await?.is_none() {
            // Create-only. Losing means another first write created it.
            let fresh = ObjectRecord::new(&write.name, env);
            if let WriteOutcome::Conflict { .. } = self.ledger.put_if(&fresh, None).await? {
                debug!(env = %env, "object created concurrently");
            }
        }

        obs::emit_variant_put(&write.name, env, &write.version, &write.variant);
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Head changes
    // -----------------------------------------------------------------------

    /// Make `version` the head of `name` in `env`.
    ///
    /// `expected_prev` must equal the object's current `head_timestamp`.
    #[instrument(skip(self), fields(name = %name, env = %env, version = %version))]
    pub async fn set_head(
        &self,
        name: &str,
        env: &str,
        version: &str,
        expected_prev: Option<Timestamp>,
    ) -> Result<HeadChange> {
        validate_names(&[name, env, version])?;

        let object = self.ledger.require_object(name, env).await?;

        if !self.ledger.has_version(name, env, version).await? {
            return Err(WarehouseError::VersionNotFound {
                name: name.to_string(),
                env: env.to_string(),
                version: version.to_string(),
            });
        }

        if object.head_version.as_deref() == Some(version) {
            return Err(WarehouseError::HeadAlreadySet {
                name: name.to_string(),
                env: env.to_string(),
                version: version.to_string(),
            });
        }

        if object.head_timestamp != expected_prev {
            return Err(WarehouseError::StaleHead {
                name: name.to_string(),
                env: env.to_string(),
                expected: expected_prev,
                actual: object.head_timestamp,
            });
        }

        let change = self.commit_head(object, version).await?;
        obs::emit_head_set(name, env, version, change.timestamp);
        self.announce(ReleaseEventKind::NewRelease, &change);
        Ok(change)
    }

    /// Set the head from an explicit version or from another environment's
    /// head, conditioned on the current token.
    ///
    /// `from_env` takes precedence over `head` when both are given.
    #[instrument(skip(self), fields(name = %name, env = %env))]
    pub async fn promote(
        &self,
        name: &str,
        env: &str,
        head: Option<&str>,
        from_env: Option<&str>,
    ) -> Result<HeadChange> {
        validate_names(&[name, env])?;

        let version = match (head, from_env) {
            (_, Some(from_env)) => {
                validate_names(&[from_env])?;
                self.ledger
                    .object(name, from_env)
                    .await?
                    .and_then(|source| source.head_version)
                    .ok_or_else(|| WarehouseError::InvalidFromEnv {
                        name: name.to_string(),
                        from_env: from_env.to_string(),
                    })?
            }
            (Some(head), None) => head.to_string(),
            (None, None) => {
                return Err(WarehouseError::BadRequest(
                    "Missing parameter: head or fromEnv must be specified".to_string(),
                ))
            }
        };

        let object = self.ledger.require_object(name, env).await?;
        self.set_head(name, env, &version, object.head_timestamp)
            .await
    }

    /// Move the head `hops` records back along the history chain.
    ///
    /// The current head is record 0, so `hops + 1` records must be reachable.
    #[instrument(skip(self), fields(name = %name, env = %env, hops = hops))]
    pub async fn rollback(&self, name: &str, env: &str, hops: u32) -> Result<HeadChange> {
        validate_names(&[name, env])?;

        let max_hops = self.config.max_rollback_hops;
        if !(1..=max_hops).contains(&hops) {
            return Err(WarehouseError::BadRequest(format!(
                "hops must be between 1 and {}, got {}",
                max_hops, hops
            )));
        }

        let object = self.ledger.require_object(name, env).await?;

        let depth = hops as usize + 1;
        let chain = HistoryChain::new(&self.ledger, name, env);
        let target = chain
            .walk(object.head_timestamp, depth)
            .await?
            .into_iter()
            .nth(hops as usize)
            .ok_or_else(|| WarehouseError::NoPreviousVersion {
                name: name.to_string(),
                env: env.to_string(),
            })?;

        if !self
            .ledger
            .has_version(name, env, &target.head_version)
            .await?
        {
            return Err(WarehouseError::VersionGone {
                name: name.to_string(),
                env: env.to_string(),
                version: target.head_version,
            });
        }

        if object.head_version.as_deref() == Some(target.head_version.as_str()) {
            return Err(WarehouseError::AlreadyRolledBack {
                name: name.to_string(),
                env: env.to_string(),
                version: target.head_version,
            });
        }

        let change = self.commit_head(object, &target.head_version).await?;
        obs::emit_head_rollback(name, env, &change.version, hops);
        self.announce(ReleaseEventKind::Rollback, &change);
        Ok(change)
    }

    /// Restore the head invariant after deletions.
    ///
    /// A head pointing at a deleted version is moved to the newest record of
    /// its chain whose version still exists, or cleared when there is none.
    /// Consistent objects are left untouched.
    #[instrument(skip(self), fields(name = %name, env = %env))]
    pub async fn check_and_fix_corrupted_head(&self, name: &str, env: &str) -> Result<HeadRepair> {
        let Some(object) = self.ledger.object(name, env).await? else {
            return Ok(HeadRepair::NoObject);
        };
        let Some(head) = object.head_version.clone() else {
            return Ok(HeadRepair::Consistent);
        };

        let versions = self.ledger.version_set(name, env).await?;
        if versions.contains(&head) {
            return Ok(HeadRepair::Consistent);
        }

        let chain = HistoryChain::new(&self.ledger, name, env);
        let candidate = chain
            .find_back(object.head_timestamp, |record| {
                versions.contains(&record.head_version)
            })
            .await?;

        match candidate {
            Some(record) => match self.commit_head(object, &record.head_version).await {
                Ok(change) => {
                    obs::emit_head_repaired(name, env, &head, &change.version);
                    self.audit(
                        AuditKind::Change,
                        format!(
                            "Object \"{}\" head repaired from \"{}\" to \"{}\" in \"{}\"",
                            name, head, change.version, env
                        ),
                    );
                    Ok(HeadRepair::Repaired {
                        from: head,
                        to: change.version,
                        timestamp: change.timestamp,
                    })
                }
                Err(e) if e.is_conflict() => {
                    debug!(error = %e, "head changed during repair");
                    Ok(HeadRepair::Superseded)
                }
                Err(e) => Err(e),
            },
            None => {
                let expected = object.head_timestamp;
                let cleared = ObjectRecord {
                    head_version: None,
                    ..object
                };
                match self.ledger.put_if(&cleared, expected).await? {
                    WriteOutcome::Written => {
                        obs::emit_head_cleared(name, env, &head);
                        self.audit(
                            AuditKind::Change,
                            format!("Object \"{}\" head \"{}\" cleared in \"{}\"", name, head, env),
                        );
                        Ok(HeadRepair::Cleared { from: head })
                    }
                    WriteOutcome::Conflict { .. } => Ok(HeadRepair::Superseded),
                }
            }
        }
    }

    /// Append a history record for `version` and flip the object to it,
    /// conditioned on the object's observed token.
    async fn commit_head(&self, object: ObjectRecord, version: &str) -> Result<HeadChange> {
        let expected = object.head_timestamp;
        let timestamp = next_timestamp(expected);

        let record = HistoryRecord {
            name: object.name.clone(),
            env: object.env.clone(),
            timestamp,
            head_version: version.to_string(),
            prev_timestamp: expected,
        };
        if let WriteOutcome::Conflict { .. } = self.ledger.put_if(&record, None).await? {
            // Another writer claimed the same timestamp for this chain.
            let actual = self
                .ledger
                .object(&object.name, &object.env)
                .await?
                .and_then(|current| current.head_timestamp);
            return Err(WarehouseError::StaleHead {
                name: object.name,
                env: object.env,
                expected,
                actual,
            });
        }

        let updated = ObjectRecord {
            head_version: Some(version.to_string()),
            head_timestamp: Some(timestamp),
            ..object.clone()
        };
        match self.ledger.put_if(&updated, expected).await? {
            WriteOutcome::Written => Ok(HeadChange {
                name: object.name,
                env: object.env,
                version: version.to_string(),
                previous_version: object.head_version,
                timestamp,
                prev_timestamp: expected,
            }),
            WriteOutcome::Conflict { current } => {
                // The record is ours and now unreachable from any head.
                self.ledger.delete(&record.key()).await?;
                Err(WarehouseError::StaleHead {
                    name: object.name,
                    env: object.env,
                    expected,
                    actual: current,
                })
            }
        }
    }

    /// Point the latest record at the newest remaining version when the one
    /// it names was deleted. Drop it when no version remains.
    async fn refresh_latest(&self, name: &str, env: &str) -> Result<()> {
        let Some(latest) = self.ledger.latest(name, env).await? else {
            return Ok(());
        };
        if self.ledger.has_version(name, env, &latest.version).await? {
            return Ok(());
        }

        let variants: Vec<VariantRecord> = self
            .ledger
            .list(&LedgerKey::variants_of_env(name, env))
            .await?;
        match variants.into_iter().max_by_key(|variant| variant.created_at) {
            Some(newest) => {
                debug!(from = %latest.version, to = %newest.version, "latest version moved back");
                self.ledger
                    .put(&LatestRecord::new(name, env, newest.version))
                    .await
            }
            None => {
                self.ledger.delete(&latest.key()).await?;
                Ok(())
            }
        }
    }

    fn announce(&self, kind: ReleaseEventKind, change: &HeadChange) {
        self.notifier
            .notify(&change.name, ReleaseEvent::from_change(kind, change));
        self.audit(
            AuditKind::Change,
            format!(
                "Object \"{}\" head successfully set to \"{}\" in \"{}\"",
                change.name, change.version, change.env
            ),
        );
    }

    // -----------------------------------------------------------------------
    // Deletions
    // -----------------------------------------------------------------------

    /// Delete every variant of a version, then repair the head.
    #[instrument(skip(self), fields(name = %name, env = %env, version = %version))]
    pub async fn delete_object_version(
        &self,
        name: &str,
        env: &str,
        version: &str,
    ) -> Result<HeadRepair> {
        validate_names(&[name, env, version])?;
        self.ledger.require_object(name, env).await?;

        let variants = self.ledger.variants_of_version(name, env, version).await?;
        if variants.is_empty() {
            return Err(WarehouseError::VersionNotFound {
                name: name.to_string(),
                env: env.to_string(),
                version: version.to_string(),
            });
        }

        for variant in &variants {
            self.ledger.delete(&variant.key()).await?;
        }

        obs::emit_version_deleted(name, env, version, None);
        self.audit(
            AuditKind::Deletion,
            format!(
                "Object \"{}@{}\" successfully deleted in \"{}\"",
                name, version, env
            ),
        );

        self.refresh_latest(name, env).await?;
        self.check_and_fix_corrupted_head(name, env).await
    }

    /// Delete one variant, then repair the head. Removing the last variant
    /// removes the version.
    #[instrument(skip(self), fields(name = %name, env = %env, version = %version, variant = %variant))]
    pub async fn delete_object_variant(
        &self,
        name: &str,
        env: &str,
        version: &str,
        variant: &str,
    ) -> Result<HeadRepair> {
        validate_names(&[name, env, version, variant])?;
        self.ledger.require_object(name, env).await?;

        if !self.ledger.has_version(name, env, version).await? {
            return Err(WarehouseError::VersionNotFound {
                name: name.to_string(),
                env: env.to_string(),
                version: version.to_string(),
            });
        }

        if !self
            .ledger
            .delete(&LedgerKey::variant(name, env, version, variant))
            .await?
        {
            return Err(WarehouseError::VariantNotFound {
                name: name.to_string(),
                env: env.to_string(),
                version: version.to_string(),
                variant: variant.to_string(),
            });
        }

        obs::emit_version_deleted(name, env, version, Some(variant));
        self.audit(
            AuditKind::Deletion,
            format!(
                "Object \"{}@{}\" variant \"{}\" successfully deleted in \"{}\"",
                name, version, variant, env
            ),
        );

        self.refresh_latest(name, env).await?;
        self.check_and_fix_corrupted_head(name, env).await
    }

    /// Remove an object from an environment along with its variants and
    /// pointers. History records are kept.
    #[instrument(skip(self), fields(name = %name, env = %env))]
    pub async fn delete_object(&self, name: &str, env: &str) -> Result<()> {
        validate_names(&[name, env])?;
        let object = self.ledger.require_object(name, env).await?;

        let variants: Vec<VariantRecord> = self
            .ledger
            .list(&LedgerKey::variants_of_env(name, env))
            .await?;
        for variant in &variants {
            self.ledger.delete(&variant.key()).await?;
        }
        self.ledger.delete(&object.key()).await?;
        self.ledger.delete(&LedgerKey::latest(name, env)).await?;
        self.ledger.delete(&LedgerKey::env(name, env)).await?;

        debug!(variants = variants.len(), "object removed from environment");
        self.audit(
            AuditKind::Deletion,
            format!("Object \"{}\" successfully deleted in \"{}\"", name, env),
        );
        Ok(())
    }
}
