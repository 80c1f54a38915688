//! # Ruten API
//!
//! HTTP dispatcher for the Ruten bridge: local catalog edits, marketplace
//! pulls and credential checks.
//!
//! ## Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Ruten API Routes                                │
//! │                                                                         │
//! │  ┌────────────────┐  ┌────────────────┐  ┌────────────────────────────┐│
//! │  │  /api/products │  │  /api/orders   │  │  /api/categories           ││
//! │  │                │  │                │  │                            ││
//! │  │ • list / get   │  │ • list / get   │  │ • list / get               ││
//! │  │ • create / edit│  │ • ship         │  │ • create / edit            ││
//! │  │ • stock, price │  │ • cancel       │  │ • delete (no children)     ││
//! │  │ • status       │  │ • refund       │  │ • sync                     ││
//! │  │ • images       │  │ • detail       │  │                            ││
//! │  │ • delete, sync │  │ • sync         │  │                            ││
//! │  └────────────────┘  └────────────────┘  └────────────────────────────┘│
//! │                                                                         │
//! │  ┌────────────────┐  ┌────────────────┐                                │
//! │  │  /api/auth     │  │  /health       │                                │
//! │  │ • verify       │  │                │                                │
//! │  │ • status       │  │                │                                │
//! │  └────────────────┘  └────────────────┘                                │
//! │                                                                         │
//! │  ┌──────────────────────────────────────────────────────────────────┐  │
//! │  │                      Infrastructure                               │  │
//! │  │                                                                   │  │
//! │  │  ┌──────────────┐  ┌──────────────┐  ┌──────────────────────────┐│  │
//! │  │  │  SQLite      │  │ RutenClient  │  │  Call log                ││  │
//! │  │  │  (ruten-db)  │  │ (ruten-sync) │  │  tracing + api_logs      ││  │
//! │  │  └──────────────┘  └──────────────┘  └──────────────────────────┘│  │
//! │  └──────────────────────────────────────────────────────────────────┘  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration
//! Environment variables:
//! - `RUTEN_API_BIND` - Listen address (default: 0.0.0.0)
//! - `RUTEN_API_PORT` - Listen port (default: 8000)
//! - `RUTEN_CONFIG` - Sync configuration TOML
//! - `RUTEN_API_KEY`, `RUTEN_SECRET_KEY`, `RUTEN_SALT_KEY` - Default credential

pub mod config;
pub mod error;
pub mod handlers;
pub mod state;

use axum::routing::{get, post, put};
use axum::Router;

use crate::handlers::{auth, categories, health, orders, products};

pub use config::ApiConfig;
pub use error::{ApiError, ApiResult, ErrorCode};
pub use state::AppState;

/// Builds the full route table.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health))
        // Products
        .route(
            "/api/products",
            get(products::list_products).post(products::create_product),
        )
        .route("/api/products/sync", post(products::sync_products))
        .route(
            "/api/products/{id}",
            get(products::get_product)
                .put(products::update_product)
                .delete(products::delete_product),
        )
        .route("/api/products/{id}/stock", put(products::update_stock))
        .route("/api/products/{id}/price", put(products::update_price))
        .route("/api/products/{id}/status", put(products::update_status))
        .route("/api/products/{id}/images", post(products::upload_images))
        // Orders
        .route("/api/orders", get(orders::list_orders))
        .route("/api/orders/sync", post(orders::sync_orders))
        .route("/api/orders/detail", post(orders::order_detail))
        .route("/api/orders/{id}", get(orders::get_order))
        .route("/api/orders/{id}/ship", post(orders::ship_order))
        .route("/api/orders/{id}/cancel", post(orders::cancel_order))
        .route("/api/orders/{id}/refund", post(orders::refund_order))
        // Categories
        .route(
            "/api/categories",
            get(categories::list_categories).post(categories::create_category),
        )
        .route("/api/categories/sync", post(categories::sync_categories))
        .route(
            "/api/categories/{id}",
            get(categories::get_category)
                .put(categories::update_category)
                .delete(categories::delete_category),
        )
        // Credentials
        .route("/api/auth/verify", post(auth::verify))
        .route("/api/auth/status", get(auth::status))
        .with_state(state)
}

// =============================================================================
// Route Tests
// =============================================================================
