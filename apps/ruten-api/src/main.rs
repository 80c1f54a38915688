//! # Ruten API
//!
//! HTTP dispatcher for the Ruten bridge, plus one-off sync commands.
//!
//! ## Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Ruten API Server                                 │
//! │                                                                         │
//! │  Operator ───► HTTP (8000) ───► Handlers ───► SQLite                    │
//! │                                     │                                   │
//! │                                     ▼                                   │
//! │                              Ruten partner API                          │
//! │                                                                         │
//! │  ruten-api sync products|orders|categories   (one page, then exit)      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;

use anyhow::Context;
use chrono::Utc;
use clap::{Parser, Subcommand, ValueEnum};
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use ruten_api::{router, ApiConfig, AppState};
use ruten_core::Credential;
use ruten_db::{Database, DbConfig};
use ruten_sync::{reconciler, OrderListQuery, SyncConfig, SyncOutcome};

#[derive(Debug, Parser)]
#[command(name = "ruten-api", version, about = "Ruten marketplace bridge")]
struct Cli {
    /// Sync configuration TOML (overrides RUTEN_CONFIG)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the HTTP server (the default)
    Serve {
        /// Listen address (overrides RUTEN_API_BIND)
        #[arg(long)]
        bind: Option<String>,

        /// Listen port (overrides RUTEN_API_PORT)
        #[arg(long)]
        port: Option<u16>,
    },

    /// Pull one page from the marketplace into the local store
    Sync {
        kind: SyncKind,

        #[arg(long, default_value_t = 1)]
        page: u32,

        /// Defaults to the configured page size
        #[arg(long)]
        page_size: Option<u32>,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum SyncKind {
    Products,
    Orders,
    Categories,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();

    let cli = Cli::parse();

    // Load configuration
    let mut api_config = ApiConfig::load()?;
    if cli.config.is_some() {
        api_config.config_path = cli.config;
    }
    let sync_config = SyncConfig::load(api_config.config_path.clone())
        .context("loading sync configuration")?;
    info!(
        base_url = %sync_config.remote.base_url,
        database = %sync_config.database.path.display(),
        "Configuration loaded"
    );

    // Connect to database
    let db = Database::new(DbConfig::new(&sync_config.database.path))
        .await
        .context("opening database")?;
    prune_call_log(&db, sync_config.sync.log_retention_days).await;

    let state = AppState::new(sync_config, db.clone(), Credential::from_env());

    let result = match cli.command.unwrap_or(Command::Serve {
        bind: None,
        port: None,
    }) {
        Command::Serve { bind, port } => {
            if let Some(bind) = bind {
                api_config.bind = bind;
            }
            if let Some(port) = port {
                api_config.port = port;
            }
            serve(state, &api_config).await
        }
        Command::Sync {
            kind,
            page,
            page_size,
        } => sync_once(&state, kind, page, page_size).await,
    };

    db.close().await;
    result
}

async fn serve(state: AppState, api_config: &ApiConfig) -> anyhow::Result<()> {
    let addr = api_config.bind_address();
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding {}", addr))?;
    info!(%addr, "Starting HTTP server");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutdown complete");
    Ok(())
}

async fn sync_once(
    state: &AppState,
    kind: SyncKind,
    page: u32,
    page_size: Option<u32>,
) -> anyhow::Result<()> {
    let client = state.client()?;
    let store = state.db.entity_store();
    let page_size = page_size.unwrap_or_else(|| state.default_page_size());

    let outcome: SyncOutcome = match kind {
        SyncKind::Products => reconciler::pull_products(client, &store, page, page_size).await?,
        SyncKind::Orders => {
            let query = OrderListQuery {
                page,
                page_size,
                ..Default::default()
            };
            reconciler::pull_orders(client, &store, &query).await?
        }
        SyncKind::Categories => reconciler::pull_categories(client, &store).await?,
    };

    info!(
        kind = %outcome.kind.as_str(),
        processed = outcome.processed_count,
        inserted = outcome.inserted,
        updated = outcome.updated,
        failed = outcome.per_record_errors.len(),
        "Sync complete"
    );
    for failure in &outcome.per_record_errors {
        warn!(
            index = failure.index,
            external_id = ?failure.external_id,
            reason = %failure.reason,
            "Record skipped"
        );
    }
    Ok(())
}

/// Drops call log rows older than `retention_days`. Failure is only logged.
async fn prune_call_log(db: &Database, retention_days: u32) {
    if retention_days == 0 {
        return;
    }
    let cutoff = Utc::now() - chrono::Duration::days(i64::from(retention_days));
    match db.api_logs().prune_before(cutoff).await {
        Ok(0) => {}
        Ok(removed) => info!(removed, retention_days, "Pruned API call log"),
        Err(e) => warn!(error = %e, "Failed to prune API call log"),
    }
}

/// Graceful shutdown signal handler.
///
/// A handler that cannot be installed is logged and never fires; the other
/// one still can.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received, starting graceful shutdown...");
}
