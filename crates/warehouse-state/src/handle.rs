//! SurrealDB Handle - Connection and Schema
//!
//! Manages the connection used by [`SurrealLedgerStore`](crate::SurrealLedgerStore).
//! Where it connects is decided by [`DbTarget`]:
//! - SurrealDB Cloud (WebSocket) with root or database users
//! - any URL given through `SURREALDB_URL`
//! - an in-memory database otherwise

use crate::error::StateError;
use crate::Result;
use surrealdb::engine::any::Any;
use surrealdb::opt::auth::{Database, Root};
use surrealdb::Surreal;
use tracing::{debug, info, instrument};

const DEFAULT_NAMESPACE: &str = "warehouse";
const DEFAULT_DATABASE: &str = "main";
const MEMORY_URL: &str = "mem://";

const LEDGER_SCHEMA: &str = r#"
    DEFINE TABLE IF NOT EXISTS ledger SCHEMALESS;
    DEFINE INDEX IF NOT EXISTS idx_ledger_key ON ledger FIELDS key UNIQUE;
"#;

/// Credentials and location of a SurrealDB Cloud database.
#[derive(Debug, Clone)]
pub struct CloudConfig {
    /// WebSocket endpoint, e.g. `wss://xxx.aws-use1.surrealdb.cloud`
    pub endpoint: String,
    pub username: String,
    pub password: String,
    pub namespace: String,
    pub database: String,
    /// Sign in as a root user instead of a database user
    pub is_root: bool,
}

impl CloudConfig {
    /// Database-user config in the default namespace and database.
    pub fn new(
        endpoint: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            endpoint: endpoint.into(),
            username: username.into(),
            password: password.into(),
            namespace: DEFAULT_NAMESPACE.to_string(),
            database: DEFAULT_DATABASE.to_string(),
            is_root: false,
        }
    }

    pub fn with_namespace(mut self, ns: impl Into<String>) -> Self {
        self.namespace = ns.into();
        self
    }

    pub fn with_database(mut self, db: impl Into<String>) -> Self {
        self.database = db.into();
        self
    }

    pub fn with_root(mut self, is_root: bool) -> Self {
        self.is_root = is_root;
        self
    }

    /// Create from environment variables
    ///
    /// Reads:
    /// - SURREALDB_ENDPOINT (required)
    /// - SURREALDB_USERNAME (required)
    /// - SURREALDB_PASSWORD (required)
    /// - SURREALDB_NAMESPACE (optional, default: "warehouse")
    /// - SURREALDB_DATABASE (optional, default: "main")
    /// - SURREALDB_ROOT (optional, default: "false")
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) with an explicit variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| {
            lookup(key).ok_or_else(|| StateError::Connection(format!("{} not set", key)))
        };

        Ok(Self {
            endpoint: required("SURREALDB_ENDPOINT")?,
            username: required("SURREALDB_USERNAME")?,
            password: required("SURREALDB_PASSWORD")?,
            namespace: lookup("SURREALDB_NAMESPACE")
                .unwrap_or_else(|| DEFAULT_NAMESPACE.to_string()),
            database: lookup("SURREALDB_DATABASE").unwrap_or_else(|| DEFAULT_DATABASE.to_string()),
            is_root: lookup("SURREALDB_ROOT")
                .map(|v| v.eq_ignore_ascii_case("true"))
                .unwrap_or(false),
        })
    }

    async fn sign_in(&self, db: &Surreal<Any>) -> Result<()> {
        let outcome = if self.is_root {
            db.signin(Root {
                username: &self.username,
                password: &self.password,
            })
            .await
        } else {
            // Database users are scoped to a namespace and database
            db.signin(Database {
                namespace: &self.namespace,
                database: &self.database,
                username: &self.username,
                password: &self.password,
            })
            .await
        };

        outcome.map(|_| ()).map_err(|e| {
            StateError::Connection(format!(
                "{} authentication failed: {}",
                if self.is_root { "Root" } else { "Database" },
                e
            ))
        })
    }
}

/// Where the ledger database lives.
#[derive(Debug, Clone)]
pub enum DbTarget {
    Cloud(CloudConfig),
    Url(String),
    Memory,
}

impl DbTarget {
    /// Cloud credentials win over `SURREALDB_URL`; with neither the ledger
    /// is kept in memory.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Ok(config) = CloudConfig::from_lookup(&lookup) {
            return DbTarget::Cloud(config);
        }
        match lookup("SURREALDB_URL") {
            Some(url) => DbTarget::Url(url),
            None => DbTarget::Memory,
        }
    }
}

/// SurrealDB connection handle for Warehouse
#[derive(Clone)]
pub struct SurrealHandle {
    db: Surreal<Any>,
}

impl SurrealHandle {
    /// Connect to an in-memory database and set up the schema
    #[instrument(skip_all)]
    pub async fn setup_db() -> Result<Self> {
        info!("Connecting to SurrealDB (in-memory)");
        Self::connect_url(MEMORY_URL).await
    }

    /// Connect to SurrealDB Cloud
    ///
    /// # Example
    /// ```ignore
    /// let config = CloudConfig::new(
    ///     "wss://xxx.aws-use1.surrealdb.cloud",
    ///     "your_username",
    ///     "your_password",
    /// );
    /// let handle = SurrealHandle::setup_cloud(config).await?;
    /// ```
    #[instrument(skip(config), fields(endpoint = %config.endpoint, namespace = %config.namespace, database = %config.database))]
    pub async fn setup_cloud(config: CloudConfig) -> Result<Self> {
        info!(root = config.is_root, "Connecting to SurrealDB Cloud");

        let db = surrealdb::engine::any::connect(&config.endpoint)
            .await
            .map_err(|e| {
                StateError::Connection(format!("Failed to connect to {}: {}", config.endpoint, e))
            })?;
        config.sign_in(&db).await?;

        let handle = Self::select(db, &config.namespace, &config.database).await?;
        info!("SurrealDB Cloud connected and ledger schema ready");
        Ok(handle)
    }

    /// Connect to `target`.
    pub async fn connect(target: DbTarget) -> Result<Self> {
        match target {
            DbTarget::Cloud(config) => Self::setup_cloud(config).await,
            DbTarget::Url(url) => {
                info!(url = %url, "Connecting to SurrealDB");
                Self::connect_url(&url).await
            }
            DbTarget::Memory => Self::setup_db().await,
        }
    }

    /// Connect to the database described by the environment
    /// (see [`DbTarget::from_lookup`]).
    #[instrument(skip_all)]
    pub async fn setup_from_env() -> Result<Self> {
        Self::connect(DbTarget::from_lookup(|key| std::env::var(key).ok())).await
    }

    async fn connect_url(url: &str) -> Result<Self> {
        let db = surrealdb::engine::any::connect(url)
            .await
            .map_err(|e| StateError::Connection(e.to_string()))?;
        let handle = Self::select(db, DEFAULT_NAMESPACE, DEFAULT_DATABASE).await?;
        debug!(url = %url, "SurrealDB connected");
        Ok(handle)
    }

    async fn select(db: Surreal<Any>, namespace: &str, database: &str) -> Result<Self> {
        db.use_ns(namespace).use_db(database).await.map_err(|e| {
            StateError::Connection(format!(
                "Failed to select {}/{}: {}",
                namespace, database, e
            ))
        })?;

        let handle = SurrealHandle { db };
        handle.init_schema().await?;
        Ok(handle)
    }

    /// Every ledger entry lives in one table, addressed by its key as record
    /// id. Values are stored as JSON text so arbitrary payloads round-trip
    /// untouched.
    async fn init_schema(&self) -> Result<()> {
        self.db
            .query(LEDGER_SCHEMA)
            .await
            .map_err(|e| StateError::SchemaSetup(e.to_string()))?
            .check()
            .map_err(|e| StateError::SchemaSetup(e.to_string()))?;
        debug!("ledger schema ready");
        Ok(())
    }

    pub(crate) fn db(&self) -> &Surreal<Any> {
        &self.db
    }
}
