//! Warehouse - versioned artifact release registry CLI
//!
//! The `warehouse` command drives the release registry directly against the
//! configured SurrealDB instance.
//!
//! ## Commands
//!
//! - `put`: Write a variant of a version
//! - `head`: Set, promote or show the live version of an environment
//! - `rollback`: Move the head back along the release history
//! - `delete`: Remove a version, a variant or a whole object
//! - `get` / `versions` / `logs`: Read paths
//! - `env`, `alias`, `hook`: Administration

use anyhow::{bail, Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use serde::Serialize;
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn, Level};

use warehouse_core::{
    parse_expiration, ExpirationParam, HeadRepair, HookDispatcher, ObjectQuery, ReleaseRegistry,
    ReqwestHookTransport, TracingAuditSink, VariantWrite, WarehouseConfig,
};
use warehouse_state::{SurrealHandle, SurrealLedgerStore};

#[derive(Parser)]
#[command(name = "warehouse")]
#[command(author = "Stevedores Org")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Warehouse versioned artifact release registry", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a variant of an object version
    Put {
        /// Object name
        name: String,
        /// Version identifier
        version: String,

        /// Environment or alias (default: every environment of the object)
        #[arg(short, long)]
        env: Option<String>,

        /// Variant key
        #[arg(long, default_value = "_default")]
        variant: String,

        /// Variant payload as inline JSON
        #[arg(long, conflicts_with = "file")]
        data: Option<String>,

        /// Path to a JSON file holding the variant payload
        #[arg(long)]
        file: Option<PathBuf>,

        /// Expire the variant after this duration (e.g. 7d, 12h; at least 5m)
        #[arg(long)]
        expires_in: Option<String>,
    },

    /// Manage the head (live version) of an environment
    Head {
        #[command(subcommand)]
        action: HeadAction,
    },

    /// Show the head of every environment of an object
    Heads {
        /// Object name
        name: String,
    },

    /// Roll the head back along the release history
    Rollback {
        /// Object name
        name: String,
        /// Environment
        env: String,

        /// Number of history steps to go back
        #[arg(long, default_value = "1")]
        hops: u32,
    },

    /// Delete versions, variants or objects
    Delete {
        #[command(subcommand)]
        action: DeleteAction,
    },

    /// Fetch the variants a client would receive
    Get {
        /// Object name
        name: String,

        /// Environment (default: WAREHOUSE_DEFAULT_ENV or production)
        #[arg(short, long)]
        env: Option<String>,

        /// Pin a version instead of following the head
        #[arg(long)]
        version: Option<String>,

        /// Comma-separated variant preferences, best first
        #[arg(long)]
        accepted_variants: Option<String>,
    },

    /// List every version of an object with its environments
    Versions {
        /// Object name
        name: String,
    },

    /// Show the release log of an environment (newest first)
    Logs {
        /// Object name
        name: String,
        /// Environment
        env: String,
    },

    /// Environment management
    Env {
        #[command(subcommand)]
        action: EnvAction,
    },

    /// Environment alias management
    Alias {
        #[command(subcommand)]
        action: AliasAction,
    },

    /// Release hook management
    Hook {
        #[command(subcommand)]
        action: HookAction,
    },
}

#[derive(Subcommand)]
enum HeadAction {
    /// Show the head and latest version of an environment
    Show { name: String, env: String },

    /// Make a version the head, conditioned on the current head timestamp
    Set {
        name: String,
        env: String,
        version: String,

        /// head_timestamp observed before this change (omit when no head was ever set)
        #[arg(long)]
        expected: Option<i64>,
    },

    /// Promote a version, or the head of another environment
    Promote {
        name: String,
        env: String,

        /// Version to promote
        #[arg(long)]
        head: Option<String>,

        /// Take the version from this environment's head (wins over --head)
        #[arg(long)]
        from_env: Option<String>,
    },

    /// Repair a head that references a deleted version
    Repair { name: String, env: String },
}

#[derive(Subcommand)]
enum DeleteAction {
    /// Delete every variant of a version
    Version {
        name: String,
        env: String,
        version: String,
    },
    /// Delete one variant of a version
    Variant {
        name: String,
        env: String,
        version: String,
        variant: String,
    },
    /// Delete an object from an environment (history is kept)
    Object { name: String, env: String },
}

#[derive(Subcommand)]
enum EnvAction {
    /// Register an environment for an object
    Create { name: String, env: String },
    /// List environments of an object
    List { name: String },
}

#[derive(Subcommand)]
enum AliasAction {
    /// Point an alias at an existing environment
    Set {
        name: String,
        alias: String,
        env: String,
    },
    /// Show where an alias points
    Get { name: String, alias: String },
    /// Remove an alias
    Rm { name: String, alias: String },
}

#[derive(Subcommand)]
enum HookAction {
    /// Subscribe a URL to release events
    Add { name: String, url: String },
    /// List hooks of an object
    List { name: String },
    /// Remove a hook by id
    Rm { name: String, id: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    warehouse_core::init_tracing(cli.json, level);

    let config = WarehouseConfig::from_env().context("Invalid warehouse configuration")?;

    // Initialize database connection
    let handle = SurrealHandle::setup_from_env()
        .await
        .context("Failed to connect to Warehouse database")?;
    let (registry, dispatcher) = build_registry(handle, config)?;
    let hook_timeout = registry.config().hook_timeout;

    let outcome = run(&registry, cli.command).await;
    flush_hooks(&dispatcher, hook_timeout).await;
    outcome
}

async fn run(registry: &ReleaseRegistry, command: Commands) -> Result<()> {
    match command {
        Commands::Put {
            name,
            version,
            env,
            variant,
            data,
            file,
            expires_in,
        } => {
            let data = read_payload(data.as_deref(), file.as_deref())?;
            cmd_put(
                registry,
                &name,
                &version,
                env.as_deref(),
                &variant,
                data,
                expires_in.as_deref(),
            )
            .await
        }
        Commands::Head { action } => match action {
            HeadAction::Show { name, env } => cmd_head_show(registry, &name, &env).await,
            HeadAction::Set {
                name,
                env,
                version,
                expected,
            } => cmd_head_set(registry, &name, &env, &version, expected).await,
            HeadAction::Promote {
                name,
                env,
                head,
                from_env,
            } => {
                cmd_head_promote(registry, &name, &env, head.as_deref(), from_env.as_deref())
                    .await
            }
            HeadAction::Repair { name, env } => cmd_head_repair(registry, &name, &env).await,
        },
        Commands::Heads { name } => print_json(&registry.get_heads(&name).await?),
        Commands::Rollback { name, env, hops } => {
            cmd_rollback(registry, &name, &env, hops).await
        }
        Commands::Delete { action } => cmd_delete(registry, action).await,
        Commands::Get {
            name,
            env,
            version,
            accepted_variants,
        } => cmd_get(registry, &name, env, version, accepted_variants).await,
        Commands::Versions { name } => print_json(&registry.list_versions(&name).await?),
        Commands::Logs { name, env } => print_json(&registry.release_log(&name, &env).await?),
        Commands::Env { action } => match action {
            EnvAction::Create { name, env } => {
                let created = registry.create_env(&name, &env).await?;
                print_json(&json!({ "environment": env, "created": created }))
            }
            EnvAction::List { name } => print_json(&registry.get_envs(&name).await?),
        },
        Commands::Alias { action } => match action {
            AliasAction::Set { name, alias, env } => {
                print_json(&registry.set_env_alias(&name, &alias, &env).await?)
            }
            AliasAction::Get { name, alias } => {
                match registry.get_env_alias(&name, &alias).await? {
                    Some(record) => print_json(&record),
                    None => bail!("No alias '{}' for {}", alias, name),
                }
            }
            AliasAction::Rm { name, alias } => {
                let removed = registry.remove_env_alias(&name, &alias).await?;
                print_json(&json!({ "alias": alias, "removed": removed }))
            }
        },
        Commands::Hook { action } => match action {
            HookAction::Add { name, url } => print_json(&registry.add_hook(&name, &url).await?),
            HookAction::List { name } => print_json(&registry.get_hooks(&name).await?),
            HookAction::Rm { name, id } => {
                registry.delete_hook(&name, &id).await?;
                print_json(&json!({ "id": id, "deleted": true }))
            }
        },
    }
}

/// Give detached hook deliveries up to `limit` to finish before the
/// runtime shuts down.
async fn flush_hooks(dispatcher: &HookDispatcher, limit: Duration) {
    if tokio::time::timeout(limit, dispatcher.drain()).await.is_err() {
        warn!(
            pending = dispatcher.pending(),
            "hook deliveries still running at exit"
        );
    }
}

/// Wire a registry over SurrealDB with HTTP hook delivery and audit logging.
///
/// The dispatcher is returned so the caller can drain it before exiting.
fn build_registry(
    handle: SurrealHandle,
    config: WarehouseConfig,
) -> Result<(ReleaseRegistry, HookDispatcher)> {
    let store = Arc::new(SurrealLedgerStore::new(Arc::new(handle)));
    let transport =
        ReqwestHookTransport::new(config.hook_timeout).context("Failed to build hook client")?;

    let registry = ReleaseRegistry::new(store).with_config(config);
    let dispatcher = HookDispatcher::new(registry.ledger().clone(), Arc::new(transport));
    let registry = registry
        .with_notifier(Arc::new(dispatcher.clone()))
        .with_audit_sink(Arc::new(TracingAuditSink));
    Ok((registry, dispatcher))
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn read_payload(data: Option<&str>, file: Option<&Path>) -> Result<Value> {
    match (data, file) {
        (Some(text), _) => serde_json::from_str(text).context("--data is not valid JSON"),
        (None, Some(path)) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            serde_json::from_str(&text)
                .with_context(|| format!("{} is not valid JSON", path.display()))
        }
        (None, None) => bail!("a payload is required: pass --data or --file"),
    }
}

// ========== Write Commands ==========

async fn cmd_put(
    registry: &ReleaseRegistry,
    name: &str,
    version: &str,
    env: Option<&str>,
    variant: &str,
    data: Value,
    expires_in: Option<&str>,
) -> Result<()> {
    let mut write = VariantWrite::new(name, version, data).with_variant(variant);
    if let Some(env) = env {
        write = write.in_env(env);
    }
    if let Some(raw) = expires_in {
        let param = ExpirationParam::Duration(raw.to_string());
        if let Some(at) = parse_expiration(Some(&param), Utc::now())? {
            write = write.expires_at(at);
        }
    }

    let outcome = registry.put_object_variant(write).await?;
    info!(
        name = %name,
        version = %version,
        environments = outcome.environments.len(),
        "variant written"
    );
    print_json(&outcome)
}

async fn cmd_head_show(registry: &ReleaseRegistry, name: &str, env: &str) -> Result<()> {
    let summary = registry.get_head(name, env).await?;
    let token = registry
        .get_object(name, env)
        .await?
        .and_then(|object| object.head_timestamp);
    print_json(&json!({
        "environment": summary.environment,
        "headVersion": summary.head_version,
        "latestVersion": summary.latest_version,
        "headTimestamp": token,
    }))
}

async fn cmd_head_set(
    registry: &ReleaseRegistry,
    name: &str,
    env: &str,
    version: &str,
    expected: Option<i64>,
) -> Result<()> {
    let change = registry.set_head(name, env, version, expected).await?;
    print_json(&change)
}

async fn cmd_head_promote(
    registry: &ReleaseRegistry,
    name: &str,
    env: &str,
    head: Option<&str>,
    from_env: Option<&str>,
) -> Result<()> {
    let change = registry.promote(name, env, head, from_env).await?;
    print_json(&change)
}

async fn cmd_rollback(registry: &ReleaseRegistry, name: &str, env: &str, hops: u32) -> Result<()> {
    let change = registry.rollback(name, env, hops).await?;
    print_json(&change)
}

async fn cmd_head_repair(registry: &ReleaseRegistry, name: &str, env: &str) -> Result<()> {
    let repair = registry.check_and_fix_corrupted_head(name, env).await?;
    print_json(&repair_summary(&repair))
}

async fn cmd_delete(registry: &ReleaseRegistry, action: DeleteAction) -> Result<()> {
    match action {
        DeleteAction::Version { name, env, version } => {
            let repair = registry.delete_object_version(&name, &env, &version).await?;
            print_json(&repair_summary(&repair))
        }
        DeleteAction::Variant {
            name,
            env,
            version,
            variant,
        } => {
            let repair = registry
                .delete_object_variant(&name, &env, &version, &variant)
                .await?;
            print_json(&repair_summary(&repair))
        }
        DeleteAction::Object { name, env } => {
            registry.delete_object(&name, &env).await?;
            print_json(&json!({ "name": name, "environment": env, "deleted": true }))
        }
    }
}

fn repair_summary(repair: &HeadRepair) -> Value {
    match repair {
        HeadRepair::NoObject => json!({ "repair": "no-object" }),
        HeadRepair::Consistent => json!({ "repair": "consistent" }),
        HeadRepair::Repaired {
            from,
            to,
            timestamp,
        } => json!({ "repair": "repaired", "from": from, "to": to, "headTimestamp": timestamp }),
        HeadRepair::Cleared { from } => json!({ "repair": "cleared", "from": from }),
        HeadRepair::Superseded => json!({ "repair": "superseded" }),
    }
}

// ========== Read Commands ==========

async fn cmd_get(
    registry: &ReleaseRegistry,
    name: &str,
    env: Option<String>,
    version: Option<String>,
    accepted_variants: Option<String>,
) -> Result<()> {
    let mut query = ObjectQuery::new(name);
    if let Some(env) = env {
        query = query.in_env(env);
    }
    if let Some(version) = version {
        query = query.at_version(version);
    }
    if let Some(accepted) = accepted_variants {
        query = query.accepting(accepted);
    }

    let fetched = registry.fetch_object(query).await?;
    print_json(&json!({
        "version": fetched.version,
        "cacheControl": fetched.cache.cache_control(),
        "variants": fetched.variants,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use warehouse_state::fakes::MemoryLedgerStore;

    fn registry() -> ReleaseRegistry {
        ReleaseRegistry::new(Arc::new(MemoryLedgerStore::new()))
    }

    #[test]
    fn test_cli_parses_nested_commands() {
        let cli = Cli::try_parse_from([
            "warehouse",
            "head",
            "promote",
            "app",
            "prod",
            "--from-env",
            "staging",
        ])
        .unwrap();
        match cli.command {
            Commands::Head {
                action: HeadAction::Promote { from_env, head, .. },
            } => {
                assert_eq!(from_env.as_deref(), Some("staging"));
                assert_eq!(head, None);
            }
            _ => panic!("expected head promote"),
        }

        let cli = Cli::try_parse_from(["warehouse", "rollback", "app", "prod", "--hops", "3"])
            .unwrap();
        assert!(matches!(cli.command, Commands::Rollback { hops: 3, .. }));
    }

    #[test]
    fn test_put_rejects_both_payload_sources() {
        let parsed = Cli::try_parse_from([
            "warehouse", "put", "app", "1", "--data", "{}", "--file", "x.json",
        ]);
        assert!(parsed.is_err());
    }

    #[test]
    fn test_read_payload_sources() {
        assert_eq!(
            read_payload(Some(r#"{"a":1}"#), None).unwrap(),
            json!({ "a": 1 })
        );
        assert!(read_payload(Some("not json"), None).is_err());
        assert!(read_payload(None, None).is_err());

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("variant.json");
        std::fs::write(&path, r#"["main.js"]"#).unwrap();
        assert_eq!(
            read_payload(None, Some(path.as_path())).unwrap(),
            json!(["main.js"])
        );
    }

    #[test]
    fn test_repair_summary_shapes() {
        assert_eq!(
            repair_summary(&HeadRepair::Cleared {
                from: "2".to_string()
            }),
            json!({ "repair": "cleared", "from": "2" })
        );
        assert_eq!(
            repair_summary(&HeadRepair::Consistent)["repair"],
            "consistent"
        );
    }

    #[tokio::test]
    async fn test_put_then_promote_and_rollback() {
        let registry = registry();
        for version in ["1", "2"] {
            cmd_put(
                &registry,
                "app",
                version,
                Some("prod"),
                "_default",
                json!({ "v": version }),
                Some("7d"),
            )
            .await
            .unwrap();
        }
        cmd_head_promote(&registry, "app", "prod", Some("1"), None)
            .await
            .unwrap();
        let token = registry
            .get_object("app", "prod")
            .await
            .unwrap()
            .unwrap()
            .head_timestamp;
        cmd_head_set(&registry, "app", "prod", "2", token)
            .await
            .unwrap();
        cmd_rollback(&registry, "app", "prod", 1).await.unwrap();

        let head = registry.get_head("app", "prod").await.unwrap();
        assert_eq!(head.head_version.as_deref(), Some("1"));

        let variant = registry
            .get_object_variant("app", "prod", "2", "_default")
            .await
            .unwrap()
            .unwrap();
        assert!(variant.expiration.is_some());
    }

    #[tokio::test]
    async fn test_put_rejects_bad_duration() {
        let registry = registry();
        let result = cmd_put(
            &registry,
            "app",
            "1",
            Some("prod"),
            "_default",
            json!(null),
            Some("soon"),
        )
        .await;
        assert!(result.is_err());
        assert!(registry.get_object("app", "prod").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_put_rejects_expiration_below_minimum() {
        let registry = registry();
        for raw in ["1m", "100000000y"] {
            let result = cmd_put(
                &registry,
                "app",
                "1",
                Some("prod"),
                "_default",
                json!(null),
                Some(raw),
            )
            .await;
            assert!(result.is_err(), "{raw} accepted");
        }
        assert!(registry.get_object("app", "prod").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_build_registry_on_embedded_db() {
        let handle = SurrealHandle::setup_db().await.unwrap();
        let (registry, dispatcher) = build_registry(handle, WarehouseConfig::default()).unwrap();
        assert!(registry.create_env("app", "prod").await.unwrap());
        cmd_head_repair(&registry, "app", "prod").await.unwrap();

        run(
            &registry,
            Commands::Put {
                name: "app".to_string(),
                version: "1".to_string(),
                env: Some("prod".to_string()),
                variant: "_default".to_string(),
                data: Some("{}".to_string()),
                file: None,
                expires_in: None,
            },
        )
        .await
        .unwrap();
        cmd_head_set(&registry, "app", "prod", "1", None).await.unwrap();
        flush_hooks(&dispatcher, Duration::from_secs(1)).await;
        assert_eq!(dispatcher.pending(), 0);
    }
}
