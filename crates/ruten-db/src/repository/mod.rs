//! # Repository Module
//!
//! Database repository implementations for the Ruten bridge.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Two Ways Into the Same SQL                           │
//! │                                                                         │
//! │  HTTP handler / propagation          Reconciler                        │
//! │       │                                   │                             │
//! │       │  db.products().update(&p)         │  tx.update(&record)         │
//! │       ▼                                   ▼                             │
//! │  ProductRepository (pool)          SqlitePageTransaction (tx)          │
//! │       │                                   │                             │
//! │       └──────────────┬────────────────────┘                             │
//! │                      ▼                                                  │
//! │        product::update_row(executor, &p)                               │
//! │        generic over sqlx::Executor                                     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`ProductRepository`](product::ProductRepository) - Product CRUD and listing
//! - [`OrderRepository`](order::OrderRepository) - Orders with status/date filters
//! - [`CategoryRepository`](category::CategoryRepository) - Category tree
//! - [`ApiLogRepository`](api_log::ApiLogRepository) - Remote call diagnostics

pub mod api_log;
pub mod category;
pub mod order;
pub mod product;
