//! # ruten-core: Pure Logic for the Ruten Bridge
//!
//! Domain types, signing and merge rules shared by every other crate.
//! Nothing in here touches the network or the database.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Ruten Bridge Architecture                        │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                 apps/ruten-api (Request Dispatcher)             │   │
//! │  │    /api/products ──► /api/orders ──► /api/categories ──► auth   │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │        ruten-sync (client, reconciler, propagation)             │   │
//! │  └───────────────┬─────────────────────────────┬───────────────────┘   │
//! │                  │                             │                        │
//! │  ┌───────────────▼─────────────────────────────▼───────────────────┐   │
//! │  │               ★ ruten-core (THIS CRATE) ★                       │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌───────────┐  │   │
//! │  │   │credential │  │  signer   │  │  remote   │  │   store   │  │   │
//! │  │   │ key triple│  │ HMAC-SHA  │  │ decode +  │  │  traits   │  │   │
//! │  │   │           │  │ canonical │  │  merge    │  │           │  │   │
//! │  │   └───────────┘  └───────────┘  └───────────┘  └───────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO NETWORK • NO DATABASE • DETERMINISTIC GIVEN A TIMESTAMP    │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                ▲                                        │
//! │  ┌─────────────────────────────┴───────────────────────────────────┐   │
//! │  │             ruten-db (SQLite, implements store traits)          │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Product, Order, Category and their statuses
//! - [`money`] - Integer-cent money parsed from decimal text
//! - [`credential`] - The identity key / signing key / salt triple
//! - [`signer`] - Canonical query encoding and request signatures
//! - [`remote`] - Marketplace JSON decoding and field-level merge
//! - [`store`] - Page-transaction traits implemented by ruten-db
//! - [`validation`] - Field rules for local mutations
//! - [`error`] - Domain error types
//!
//! ## Example Usage
//!
//! ```rust
//! use ruten_core::signer::{sign, QueryParams};
//! use ruten_core::Credential;
//!
//! let cred = Credential::new("key", "secret", "salt").unwrap();
//! let query = QueryParams::new().push("page", 1).push("page_size", 30);
//! let sig = sign("/api/v1/product/list", &query, "", &cred, Some(1_700_000_000));
//! assert_eq!(sig.timestamp, 1_700_000_000);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod credential;
pub mod error;
pub mod money;
pub mod remote;
pub mod signer;
pub mod store;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use credential::Credential;
pub use error::{ConfigurationError, CoreError, CoreResult, DecodeError, ValidationError};
pub use money::Money;
pub use remote::RemoteRecord;
pub use store::{LocalEntityStore, PageTransaction, StoreError, StoreResult};
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Production address of the partner API.
pub const DEFAULT_BASE_URL: &str = "https://partner.ruten.com.tw";

/// Request timeout applied when a client is built, in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Page size used by list operations when the caller gives none.
pub const DEFAULT_PAGE_SIZE: u32 = 30;
