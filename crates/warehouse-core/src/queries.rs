//! Read accessors of the registry.
//!
//! Plain accessors are read-throughs over the ledger and report missing
//! records as absence. The composite reads (`fetch_object`, `get_head`,
//! `release_log`) fail with `ObjectNotFound` when the object is unknown.

use futures::future::join_all;
use warehouse_state::{EnvRecord, HistoryRecord, ObjectRecord, Timestamp, VariantRecord};

use crate::domain::error::{Result, WarehouseError};
use crate::domain::release::{
    CacheHint, FetchedObject, HeadSummary, ObjectQuery, ReleaseLogEntry, VersionEnvironments,
};
use crate::ledger::validate_names;
use crate::release_registry::ReleaseRegistry;
use crate::variants::{parse_accepted_variants, select_variants};

impl ReleaseRegistry {
    pub async fn get_object(&self, name: &str, env: &str) -> Result<Option<ObjectRecord>> {
        validate_names(&[name, env])?;
        self.ledger.object(name, env).await
    }

    /// Versions of `name` in `env` that have at least one variant.
    pub async fn get_all_object_versions(&self, name: &str, env: &str) -> Result<Vec<String>> {
        validate_names(&[name, env])?;
        self.ledger.versions(name, env).await
    }

    pub async fn get_all_object_variants(
        &self,
        name: &str,
        env: &str,
        version: &str,
    ) -> Result<Vec<VariantRecord>> {
        validate_names(&[name, env, version])?;
        self.ledger.variants_of_version(name, env, version).await
    }

    /// The variants among `variants` that exist for the version.
    pub async fn get_object_variants(
        &self,
        name: &str,
        env: &str,
        version: &str,
        variants: &[String],
    ) -> Result<Vec<VariantRecord>> {
        let all = self.get_all_object_variants(name, env, version).await?;
        Ok(all
            .into_iter()
            .filter(|record| variants.contains(&record.variant))
            .collect())
    }

    pub async fn get_object_variant(
        &self,
        name: &str,
        env: &str,
        version: &str,
        variant: &str,
    ) -> Result<Option<VariantRecord>> {
        validate_names(&[name, env, version, variant])?;
        self.ledger.variant(name, env, version, variant).await
    }

    pub async fn has_object_version(&self, name: &str, env: &str, version: &str) -> Result<bool> {
        validate_names(&[name, env, version])?;
        self.ledger.has_version(name, env, version).await
    }

    pub async fn get_envs(&self, name: &str) -> Result<Vec<EnvRecord>> {
        validate_names(&[name])?;
        self.ledger.envs(name).await
    }

    /// All history records of (name, env), oldest first, including records
    /// no longer reachable from the head.
    pub async fn get_history_records(&self, name: &str, env: &str) -> Result<Vec<HistoryRecord>> {
        validate_names(&[name, env])?;
        self.ledger.history_records(name, env).await
    }

    pub async fn get_history_record(
        &self,
        name: &str,
        env: &str,
        timestamp: Timestamp,
    ) -> Result<Option<HistoryRecord>> {
        validate_names(&[name, env])?;
        self.ledger.history_record(name, env, timestamp).await
    }

    /// Read the variants a client should receive.
    ///
    /// Without a version the head is used, or the latest version when no
    /// head is set. The resolved version must still have variants. The
    /// optional preference list narrows the result to its best match.
    pub async fn fetch_object(&self, query: ObjectQuery) -> Result<FetchedObject> {
        let env = query
            .env
            .clone()
            .unwrap_or_else(|| self.config.default_env.clone());
        validate_names(&[query.name.as_str(), env.as_str()])?;

        let (version, cache) = match query.version {
            None => {
                let object = self.ledger.require_object(&query.name, &env).await?;
                let version = match object.head_version {
                    Some(head) => head,
                    None => self
                        .ledger
                        .latest(&query.name, &env)
                        .await?
                        .map(|latest| latest.version)
                        .ok_or_else(|| WarehouseError::NoVersion {
                            name: query.name.clone(),
                            env: env.clone(),
                        })?,
                };
                (version, CacheHint::HEAD)
            }
            Some(version) => {
                validate_names(&[version.as_str()])?;
                (version, CacheHint::PINNED)
            }
        };

        let available = self
            .ledger
            .variants_of_version(&query.name, &env, &version)
            .await?;
        if available.is_empty() {
            return Err(WarehouseError::VersionNotFound {
                name: query.name,
                env,
                version,
            });
        }

        let preferences = parse_accepted_variants(query.accepted_variants.as_deref());
        Ok(FetchedObject {
            version,
            variants: select_variants(preferences.as_deref(), available),
            cache,
        })
    }

    pub async fn get_head(&self, name: &str, env: &str) -> Result<HeadSummary> {
        validate_names(&[name, env])?;
        self.head_summary(name, env)
            .await?
            .ok_or_else(|| WarehouseError::ObjectNotFound {
                name: name.to_string(),
                env: env.to_string(),
            })
    }

    /// Head summaries for every environment of `name`.
    pub async fn get_heads(&self, name: &str) -> Result<Vec<HeadSummary>> {
        let envs = self.get_envs(name).await?;
        let summaries = join_all(envs.iter().map(|env| self.head_summary(name, &env.env))).await;

        let mut heads = Vec::with_capacity(summaries.len());
        for summary in summaries {
            if let Some(summary) = summary? {
                heads.push(summary);
            }
        }
        Ok(heads)
    }

    async fn head_summary(&self, name: &str, env: &str) -> Result<Option<HeadSummary>> {
        let (object, latest) =
            futures::try_join!(self.ledger.object(name, env), self.ledger.latest(name, env))?;
        Ok(object.map(|object| HeadSummary {
            environment: object.env,
            head_version: object.head_version,
            latest_version: latest.map(|latest| latest.version),
        }))
    }

    /// Every version of `name` with the environments it exists in.
    pub async fn list_versions(&self, name: &str) -> Result<Vec<VersionEnvironments>> {
        let envs = self.get_envs(name).await?;
        let per_env = join_all(envs.iter().map(|env| async move {
            self.ledger
                .versions(name, &env.env)
                .await
                .map(|versions| (env.env.clone(), versions))
        }))
        .await;

        let mut index: Vec<VersionEnvironments> = Vec::new();
        for result in per_env {
            let (env, versions) = result?;
            for version in versions {
                match index.iter_mut().find(|entry| entry.version == version) {
                    Some(entry) => entry.environments.push(env.clone()),
                    None => index.push(VersionEnvironments {
                        version,
                        environments: vec![env.clone()],
                    }),
                }
            }
        }
        Ok(index)
    }

    /// Release log of (name, env), newest first.
    pub async fn release_log(&self, name: &str, env: &str) -> Result<Vec<ReleaseLogEntry>> {
        validate_names(&[name, env])?;
        let (object, mut records) = futures::try_join!(
            self.ledger.object(name, env),
            self.ledger.history_records(name, env)
        )?;
        if object.is_none() {
            return Err(WarehouseError::ObjectNotFound {
                name: name.to_string(),
                env: env.to_string(),
            });
        }

        records.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        Ok(records
            .iter()
            .map(|record| ReleaseLogEntry {
                version: record.head_version.clone(),
                release_date: record.release_date(),
            })
            .collect())
    }
}
