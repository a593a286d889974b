//! Environment, alias and hook administration.

use tracing::instrument;
use warehouse_state::{EnvAliasRecord, EnvRecord, HookRecord, LedgerKey};

use crate::audit::AuditKind;
use crate::domain::error::{Result, WarehouseError};
use crate::ledger::validate_names;
use crate::release_registry::ReleaseRegistry;

impl ReleaseRegistry {
    /// Register an environment for an object. Returns `false` if it was
    /// already known.
    #[instrument(skip(self))]
    pub async fn create_env(&self, name: &str, env: &str) -> Result<bool> {
        validate_names(&[name, env])?;
        if self.ledger.env(name, env).await?.is_some() {
            return Ok(false);
        }
        self.ledger.put(&EnvRecord::new(name, env)).await?;
        self.audit(
            AuditKind::Creation,
            format!("Environment \"{}\" successfully created for \"{}\"", env, name),
        );
        Ok(true)
    }

    /// Point `alias` at an existing environment of `name`.
    #[instrument(skip(self))]
    pub async fn set_env_alias(&self, name: &str, alias: &str, env: &str) -> Result<EnvAliasRecord> {
        validate_names(&[name, alias, env])?;
        if alias == env {
            return Err(WarehouseError::BadRequest(format!(
                "Alias '{}' cannot point at itself",
                alias
            )));
        }
        if self.ledger.env(name, env).await?.is_none() {
            return Err(WarehouseError::EnvNotFound {
                name: name.to_string(),
                env: env.to_string(),
            });
        }

        let record = EnvAliasRecord {
            name: name.to_string(),
            alias: alias.to_string(),
            env: env.to_string(),
        };
        self.ledger.put(&record).await?;
        self.audit(
            AuditKind::Change,
            format!("Alias \"{}\" of \"{}\" now points at \"{}\"", alias, name, env),
        );
        Ok(record)
    }

    pub async fn get_env_alias(&self, name: &str, alias: &str) -> Result<Option<EnvAliasRecord>> {
        validate_names(&[name, alias])?;
        self.ledger.alias(name, alias).await
    }

    /// Remove an alias. Returns whether it existed.
    #[instrument(skip(self))]
    pub async fn remove_env_alias(&self, name: &str, alias: &str) -> Result<bool> {
        validate_names(&[name, alias])?;
        let removed = self.ledger.delete(&LedgerKey::alias(name, alias)).await?;
        if removed {
            self.audit(
                AuditKind::Deletion,
                format!("Alias \"{}\" of \"{}\" successfully deleted", alias, name),
            );
        }
        Ok(removed)
    }

    /// Subscribe `url` to release events of `name`.
    #[instrument(skip(self))]
    pub async fn add_hook(&self, name: &str, url: &str) -> Result<HookRecord> {
        validate_names(&[name])?;
        let parsed = reqwest::Url::parse(url)
            .map_err(|e| WarehouseError::BadRequest(format!("invalid hook url '{}': {}", url, e)))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(WarehouseError::BadRequest(format!(
                "hook url '{}' must use http or https",
                url
            )));
        }

        let hook = HookRecord::new(name, parsed.as_str());
        self.ledger.put(&hook).await?;
        self.audit(
            AuditKind::Creation,
            format!("Hook \"{}\" successfully created for \"{}\"", hook.id, name),
        );
        Ok(hook)
    }

    pub async fn get_hooks(&self, name: &str) -> Result<Vec<HookRecord>> {
        validate_names(&[name])?;
        self.ledger.hooks(name).await
    }

    #[instrument(skip(self))]
    pub async fn delete_hook(&self, name: &str, id: &str) -> Result<()> {
        validate_names(&[name, id])?;
        if !self.ledger.delete(&LedgerKey::hook(name, id)).await? {
            return Err(WarehouseError::HookNotFound {
                name: name.to_string(),
                id: id.to_string(),
            });
        }
        self.audit(
            AuditKind::Deletion,
            format!("Hook \"{}\" successfully deleted for \"{}\"", id, name),
        );
        Ok(())
    }
}
