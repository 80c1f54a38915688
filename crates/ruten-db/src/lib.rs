//! # ruten-db: Local Entity Store for the Ruten Bridge
//!
//! SQLite persistence for products, orders, categories and remote call logs,
//! plus the page-transactional store the reconciler writes through.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Ruten Bridge Data Flow                           │
//! │                                                                         │
//! │  HTTP handler                         Reconciler (ruten-sync)           │
//! │       │                                    │                            │
//! │       ▼                                    ▼                            │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     ruten-db (THIS CRATE)                       │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌───────────────┐    ┌──────────────┐  │   │
//! │  │   │   Database    │    │  Repositories │    │ EntityStore  │  │   │
//! │  │   │   (pool.rs)   │    │               │    │  (store.rs)  │  │   │
//! │  │   │               │    │ ProductRepo   │    │              │  │   │
//! │  │   │ SqlitePool    │◄───│ OrderRepo     │    │ page tx over │  │   │
//! │  │   │ Migrations    │    │ CategoryRepo  │    │ the same SQL │  │   │
//! │  │   │               │    │ ApiLogRepo    │    │              │  │   │
//! │  │   └───────────────┘    └───────────────┘    └──────────────┘  │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     SQLite Database (ruten.db)                  │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use ruten_db::{Database, DbConfig};
//!
//! let db = Database::new(DbConfig::new("ruten.db")).await?;
//! let (products, total) = db.products().list(None, 1, 30).await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;
pub mod store;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};
pub use store::SqliteEntityStore;

pub use repository::api_log::{ApiLogEntry, ApiLogRepository, NewApiLog};
pub use repository::category::CategoryRepository;
pub use repository::order::{OrderFilter, OrderRepository};
pub use repository::product::ProductRepository;
