//! Runtime configuration for the registry.

use std::time::Duration;

use crate::domain::error::{Result, WarehouseError};

const DEFAULT_ENV: &str = "production";
const DEFAULT_HOOK_TIMEOUT_MS: u64 = 5_000;
const DEFAULT_MAX_ROLLBACK_HOPS: u32 = 20;

/// Registry configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WarehouseConfig {
    /// Base URL published CDN files are served from
    pub cdn_base_url: Option<String>,
    /// Environment read when a fetch does not name one
    pub default_env: String,
    /// Per-request timeout of hook deliveries
    pub hook_timeout: Duration,
    /// Upper bound of `hops` accepted by rollback
    pub max_rollback_hops: u32,
}

impl Default for WarehouseConfig {
    fn default() -> Self {
        Self {
            cdn_base_url: None,
            default_env: DEFAULT_ENV.to_string(),
            hook_timeout: Duration::from_millis(DEFAULT_HOOK_TIMEOUT_MS),
            max_rollback_hops: DEFAULT_MAX_ROLLBACK_HOPS,
        }
    }
}

impl WarehouseConfig {
    /// Create from environment variables
    ///
    /// Reads:
    /// - WAREHOUSE_CDN_BASE_URL (optional)
    /// - WAREHOUSE_DEFAULT_ENV (optional, default: "production")
    /// - WAREHOUSE_HOOK_TIMEOUT_MS (optional, default: 5000)
    /// - WAREHOUSE_MAX_ROLLBACK_HOPS (optional, default: 20)
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let hook_timeout = match lookup("WAREHOUSE_HOOK_TIMEOUT_MS") {
            Some(raw) => Duration::from_millis(parse_number(&raw, "WAREHOUSE_HOOK_TIMEOUT_MS")?),
            None => defaults.hook_timeout,
        };

        let max_rollback_hops = match lookup("WAREHOUSE_MAX_ROLLBACK_HOPS") {
            Some(raw) => {
                let hops = parse_number(&raw, "WAREHOUSE_MAX_ROLLBACK_HOPS")?;
                u32::try_from(hops)
                    .ok()
                    .filter(|hops| *hops >= 1)
                    .ok_or_else(|| {
                        WarehouseError::Config(
                            "WAREHOUSE_MAX_ROLLBACK_HOPS must be a positive 32-bit number"
                                .to_string(),
                        )
                    })?
            }
            None => defaults.max_rollback_hops,
        };

        Ok(Self {
            cdn_base_url: lookup("WAREHOUSE_CDN_BASE_URL")
                .map(|url| url.trim_end_matches('/').to_string())
                .filter(|url| !url.is_empty()),
            default_env: lookup("WAREHOUSE_DEFAULT_ENV")
                .filter(|env| !env.is_empty())
                .unwrap_or(defaults.default_env),
            hook_timeout,
            max_rollback_hops,
        })
    }

    pub fn with_cdn_base_url(mut self, url: impl Into<String>) -> Self {
        self.cdn_base_url = Some(url.into());
        self
    }

    pub fn with_default_env(mut self, env: impl Into<String>) -> Self {
        self.default_env = env.into();
        self
    }

    pub fn with_max_rollback_hops(mut self, hops: u32) -> Self {
        self.max_rollback_hops = hops;
        self
    }
}

fn parse_number(raw: &str, key: &str) -> Result<u64> {
    raw.trim()
        .parse::<u64>()
        .map_err(|e| WarehouseError::Config(format!("{} is not a valid number: {}", key, e)))
}
