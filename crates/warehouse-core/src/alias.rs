//! Environment alias resolution.
//!
//! Aliases map a logical environment name (for example `live`) onto a
//! concrete one. They only apply on the write path; reads use literal
//! environment names.

use tracing::debug;

use crate::domain::error::Result;
use crate::ledger::Ledger;

/// Concrete environment a write should target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedEnv {
    pub env: String,
    /// Whether the environment may be created implicitly by the write.
    /// False when the name was an alias: its target must already exist.
    pub force_create: bool,
}

/// Resolve `env` for object `name`.
pub async fn resolve_env(ledger: &Ledger, name: &str, env: &str) -> Result<ResolvedEnv> {
    match ledger.alias(name, env).await? {
        Some(alias) => {
            debug!(name = %name, alias = %env, env = %alias.env, "resolved environment alias");
            Ok(ResolvedEnv {
                env: alias.env,
                force_create: false,
            })
        }
        None => Ok(ResolvedEnv {
            env: env.to_string(),
            force_create: true,
        }),
    }
}
