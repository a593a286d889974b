//! Warehouse Core Library
//!
//! The release state machine of the Warehouse registry and the pieces around
//! it: environment aliases, variant selection, history traversal, hook
//! dispatch, audit events and the CDN publish facade.
//!
//! ## Layer 1 - Domain
//!
//! Every head mutation goes through [`ReleaseRegistry`], which coordinates
//! concurrent writers solely through the compare-and-swap of the underlying
//! [`warehouse_state::LedgerStore`].

pub mod admin;
pub mod alias;
pub mod audit;
pub mod cdn;
pub mod config;
pub mod domain;
pub mod fakes;
pub mod history;
pub mod hooks;
pub mod ledger;
pub mod obs;
pub mod queries;
pub mod release_registry;
pub mod telemetry;
pub mod variants;

pub use alias::{resolve_env, ResolvedEnv};
pub use audit::{AuditCategory, AuditEvent, AuditKind, AuditSink, NoopAuditSink, TracingAuditSink};
pub use cdn::{
    parse_duration, parse_expiration, AssetFile, AssetIngestor, CdnPublisher, CdnUploadResult,
    ExpirationParam, IngestedAssets, PublishOptions, PublishedFile, MIN_EXPIRATION,
};
pub use config::WarehouseConfig;
pub use domain::{
    CacheHint, ErrorKind, FetchedObject, HeadChange, HeadRepair, HeadSummary, ObjectQuery,
    PutOutcome, ReleaseEvent, ReleaseEventData, ReleaseEventKind, ReleaseLogEntry, Result,
    VariantWrite, VersionEnvironments, WarehouseError,
};
pub use history::{next_timestamp, HistoryChain};
pub use hooks::{
    DispatchReport, HookDispatcher, HookError, HookTransport, NoopNotifier, ReleaseNotifier,
    ReqwestHookTransport,
};
pub use ledger::Ledger;
pub use release_registry::ReleaseRegistry;
pub use telemetry::init_tracing;
pub use variants::{parse_accepted_variants, resolve_variant, select_variants};

pub use warehouse_state::{SurrealHandle, SurrealLedgerStore};
