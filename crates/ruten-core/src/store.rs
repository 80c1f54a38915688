//! # Local Entity Store
//!
//! The persistence seam the reconciler is written against.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  LocalEntityStore::begin_page()                                         │
//! │        │                                                                │
//! │        ▼                                                                │
//! │  PageTransaction ── find_by_external_id ── insert ── update ──┐         │
//! │        │                                                      │         │
//! │        ├── commit()    all successful records visible at once │         │
//! │        └── rollback()  nothing from the page is visible ◄─────┘         │
//! │                        (on StoreError::Fatal)                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! `ruten-db` provides the SQLite implementation. Tests in `ruten-sync`
//! use an in-memory fake to inject fatal failures.

use async_trait::async_trait;
use thiserror::Error;

use crate::types::{EntityKind, LocalRecord};

/// Failure reported by a store operation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// Only the current record is affected (constraint violation, bad row).
    ///
    /// The reconciler records it against the record and moves on.
    #[error("record rejected: {0}")]
    Record(String),

    /// The page can no longer be written (connection lost, transaction broken).
    ///
    /// The reconciler rolls back the page.
    #[error("store failure: {0}")]
    Fatal(String),
}

impl StoreError {
    pub fn is_fatal(&self) -> bool {
        matches!(self, StoreError::Fatal(_))
    }
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Opens page-scoped transactions.
#[async_trait]
pub trait LocalEntityStore: Send + Sync {
    /// Starts a transaction covering one reconciliation page.
    async fn begin_page(&self) -> StoreResult<Box<dyn PageTransaction>>;

    /// Reads one record by local id outside any page.
    async fn get(&self, kind: EntityKind, id: &str) -> StoreResult<Option<LocalRecord>>;
}

/// Reads and writes inside one page transaction.
///
/// A record-level failure must leave the transaction usable for the next
/// record.
#[async_trait]
pub trait PageTransaction: Send {
    async fn find_by_external_id(
        &mut self,
        kind: EntityKind,
        external_id: &str,
    ) -> StoreResult<Option<LocalRecord>>;

    async fn insert(&mut self, record: &LocalRecord) -> StoreResult<()>;

    async fn update(&mut self, record: &LocalRecord) -> StoreResult<()>;

    async fn commit(self: Box<Self>) -> StoreResult<()>;

    async fn rollback(self: Box<Self>) -> StoreResult<()>;
}
