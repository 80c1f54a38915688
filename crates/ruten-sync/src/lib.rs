//! # ruten-sync: Remote Client and Sync Engine
//!
//! Everything that talks to the Ruten partner API, and the engine that keeps
//! the local store and the marketplace in step.
//!
//! ## Architecture Overview
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Ruten Sync Architecture                          │
//! │                                                                         │
//! │   PULL (remote → local)                 PUSH (local → remote)           │
//! │                                                                         │
//! │  ┌────────────────┐                    ┌────────────────────────┐       │
//! │  │  reconciler    │                    │  propagate             │       │
//! │  │                │                    │                        │       │
//! │  │ page → upsert  │                    │ CatalogService         │       │
//! │  │ by external id │                    │ commit, then notify    │       │
//! │  └───────┬────────┘                    └───────────┬────────────┘       │
//! │          │ list_*                                   │ OutwardIntent      │
//! │          ▼                                          ▼                    │
//! │  ┌──────────────────────────────────────────────────────────────────┐   │
//! │  │                 RutenClient (client.rs)                          │   │
//! │  │        one method per partner operation                          │   │
//! │  └─────────────────────────────┬────────────────────────────────────┘   │
//! │                                ▼                                        │
//! │  ┌──────────────────────────────────────────────────────────────────┐   │
//! │  │                 Transport (transport.rs)                         │   │
//! │  │   sign (ruten-core) · send (reqwest) · classify · CallRecord     │   │
//! │  └─────────────────────────────┬────────────────────────────────────┘   │
//! │                                ▼                                        │
//! │                   ObservabilitySink (sink.rs)                          │
//! │                   TracingSink · ApiLogSink                             │
//! │                                                                         │
//! │  verifier: one read-only call with a dedicated client                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//! - [`config`] - Remote, sync and database settings (TOML + environment)
//! - [`error`] - `ClientError`, `SyncError`, `ServiceError`
//! - [`sink`] - Call records and observability sinks
//! - [`transport`] - Signed HTTP execution and response classification
//! - [`client`] - The partner API facade
//! - [`reconciler`] - Page upserts into the local store
//! - [`propagate`] - Local mutations mirrored outward
//! - [`verifier`] - Credential checks
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use ruten_core::Credential;
//! use ruten_db::{Database, DbConfig};
//! use ruten_sync::{reconciler, RutenClient, SyncConfig, TracingSink};
//!
//! let config = SyncConfig::load_or_default(None);
//! let db = Database::new(DbConfig::new(&config.database.path)).await?;
//! let client = RutenClient::new(Credential::from_env()?, &config.remote, Arc::new(TracingSink))?;
//!
//! let outcome = reconciler::pull_products(&client, &db.entity_store(), 1, 30).await?;
//! println!("{} inserted, {} updated", outcome.inserted, outcome.updated);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod client;
pub mod config;
pub mod error;
pub mod propagate;
pub mod reconciler;
pub mod sink;
pub mod transport;
pub mod verifier;

// =============================================================================
// Re-exports
// =============================================================================

pub use client::{NewListing, OrderListQuery, Refund, RutenClient, Shipment};
pub use config::{DatabaseSettings, RemoteSettings, SyncConfig, SyncSettings};
pub use error::{ClientError, ClientResult, ServiceError, ServiceResult, SyncError, SyncResult};
pub use propagate::{
    CatalogService, CategoryChanges, MirrorStatus, NewProduct, Notifier, OutwardIntent,
    Propagated, ProductChanges, PropagationWarning, RefundRequest,
};
pub use reconciler::{RecordFailure, SyncOutcome};
pub use sink::{ApiLogSink, CallOutcome, CallRecord, FanoutSink, ObservabilitySink, TracingSink};
pub use transport::Transport;
pub use verifier::{CredentialStatus, Verification};
