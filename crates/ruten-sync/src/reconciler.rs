//! # Reconciler
//!
//! Pulls one page of marketplace records into the local store.
//!
//! ## Page Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     reconcile(kind, page, store)                        │
//! │                                                                         │
//! │  store.begin_page() ──► tx                                             │
//! │                                                                         │
//! │  for (index, element) in page:                                         │
//! │     decode ──✗──► per-record error, continue                           │
//! │       │                                                                 │
//! │     tx.find_by_external_id                                             │
//! │       ├─ found ──► overwrite supplied fields ──► tx.update             │
//! │       └─ absent ─► new record, defaults       ──► tx.insert            │
//! │                                                                         │
//! │     StoreError::Record ──► per-record error, continue                  │
//! │     StoreError::Fatal  ──► tx.rollback() ──► PageRolledBack            │
//! │                                                                         │
//! │  tx.commit() ──✗──► PageRolledBack                                     │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SyncOutcome { processed_count, inserted, updated, per_record_errors } │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Reconciling the same page twice leaves the same set of local records:
//! the second run only updates. Absence from a page never deletes anything.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use tracing::{info, warn};

use crate::client::{OrderListQuery, RutenClient};
use crate::error::{SyncError, SyncResult};
use ruten_core::remote::{self, ParentRef, ParentUpdate};
use ruten_core::{
    EntityKind, LocalEntityStore, LocalRecord, PageTransaction, RemoteRecord, StoreError,
    StoreResult,
};

// =============================================================================
// Outcome Types
// =============================================================================

/// A record that could not be applied. The rest of the page was unaffected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecordFailure {
    /// Position in the page.
    pub index: usize,
    /// Marketplace id, when it could be read.
    pub external_id: Option<String>,
    pub reason: String,
}

/// Result of reconciling one page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncOutcome {
    pub kind: EntityKind,
    /// Records inserted or updated.
    pub processed_count: usize,
    pub inserted: usize,
    pub updated: usize,
    pub per_record_errors: Vec<RecordFailure>,
}

impl SyncOutcome {
    fn empty(kind: EntityKind) -> Self {
        SyncOutcome {
            kind,
            processed_count: 0,
            inserted: 0,
            updated: 0,
            per_record_errors: Vec::new(),
        }
    }

    pub fn is_clean(&self) -> bool {
        self.per_record_errors.is_empty()
    }
}

enum Applied {
    Inserted,
    Updated,
}

// =============================================================================
// Reconciliation
// =============================================================================

/// Upserts one page of raw marketplace records of `kind`.
///
/// Per-record problems are collected in the outcome. A fatal store failure
/// rolls back the whole page and is returned as [`SyncError::PageRolledBack`].
pub async fn reconcile(
    kind: EntityKind,
    page: &[Value],
    store: &dyn LocalEntityStore,
) -> SyncResult<SyncOutcome> {
    let mut tx = store.begin_page().await?;
    let now = Utc::now();
    let mut outcome = SyncOutcome::empty(kind);

    for (index, element) in page.iter().enumerate() {
        let record = match RemoteRecord::decode(kind, element) {
            Ok(record) => record,
            Err(e) => {
                let external_id = remote::peek_external_id(kind, element);
                warn!(%kind, index, ?external_id, error = %e, "Skipping undecodable record");
                outcome.per_record_errors.push(RecordFailure {
                    index,
                    external_id,
                    reason: e.to_string(),
                });
                continue;
            }
        };

        let external_id = record.external_id().to_string();
        match apply(tx.as_mut(), record, now).await {
            Ok(Applied::Inserted) => outcome.inserted += 1,
            Ok(Applied::Updated) => outcome.updated += 1,
            Err(StoreError::Record(reason)) => {
                warn!(%kind, index, external_id = %external_id, %reason, "Record rejected by store");
                outcome.per_record_errors.push(RecordFailure {
                    index,
                    external_id: Some(external_id),
                    reason,
                });
            }
            Err(StoreError::Fatal(reason)) => {
                warn!(%kind, index, %reason, "Fatal store failure, rolling back page");
                if let Err(e) = tx.rollback().await {
                    warn!(%kind, error = %e, "Rollback after fatal failure also failed");
                }
                return Err(SyncError::PageRolledBack { kind, reason });
            }
        }
    }

    if let Err(e) = tx.commit().await {
        warn!(%kind, error = %e, "Page commit failed");
        return Err(SyncError::PageRolledBack {
            kind,
            reason: e.to_string(),
        });
    }

    outcome.processed_count = outcome.inserted + outcome.updated;
    info!(
        %kind,
        processed = outcome.processed_count,
        inserted = outcome.inserted,
        updated = outcome.updated,
        errors = outcome.per_record_errors.len(),
        "Page reconciled"
    );
    Ok(outcome)
}

async fn apply(
    tx: &mut dyn PageTransaction,
    record: RemoteRecord,
    now: DateTime<Utc>,
) -> StoreResult<Applied> {
    let kind = record.kind();
    let existing = tx.find_by_external_id(kind, record.external_id()).await?;

    let (local, applied) = match (record, existing) {
        (RemoteRecord::Product(remote), Some(LocalRecord::Product(mut local))) => {
            remote.apply_to(&mut local, now);
            (LocalRecord::Product(local), Applied::Updated)
        }
        (RemoteRecord::Product(remote), None) => {
            (LocalRecord::Product(remote.into_new(now)), Applied::Inserted)
        }
        (RemoteRecord::Order(remote), Some(LocalRecord::Order(mut local))) => {
            remote.apply_to(&mut local, now);
            (LocalRecord::Order(local), Applied::Updated)
        }
        (RemoteRecord::Order(remote), None) => {
            (LocalRecord::Order(remote.into_new(now)), Applied::Inserted)
        }
        (RemoteRecord::Category(remote), Some(LocalRecord::Category(mut local))) => {
            let parent = resolve_parent(tx, remote.parent.as_ref()).await?;
            remote.apply_to(&mut local, parent, now);
            (LocalRecord::Category(local), Applied::Updated)
        }
        (RemoteRecord::Category(remote), None) => {
            let parent = resolve_parent(tx, remote.parent.as_ref()).await?;
            (
                LocalRecord::Category(remote.into_new(parent, now)),
                Applied::Inserted,
            )
        }
        (_, Some(other)) => {
            return Err(StoreError::Record(format!(
                "lookup for a {} returned a {}",
                kind,
                other.kind()
            )))
        }
    };

    match applied {
        Applied::Inserted => tx.insert(&local).await?,
        Applied::Updated => tx.update(&local).await?,
    }
    Ok(applied)
}

/// Maps a marketplace parent id to a local category id.
///
/// Parents earlier in the same page are visible here. An unknown parent keeps
/// whatever the local record already has.
async fn resolve_parent(
    tx: &mut dyn PageTransaction,
    parent: Option<&ParentRef>,
) -> StoreResult<ParentUpdate> {
    match parent {
        None => Ok(ParentUpdate::Keep),
        Some(ParentRef::Root) => Ok(ParentUpdate::Clear),
        Some(ParentRef::External(id)) => {
            match tx.find_by_external_id(EntityKind::Category, id).await? {
                Some(LocalRecord::Category(found)) => Ok(ParentUpdate::Set(found.id)),
                _ => Ok(ParentUpdate::Keep),
            }
        }
    }
}

// =============================================================================
// Pull Helpers
// =============================================================================

/// Fetches one product page and reconciles it.
///
/// A failed fetch returns before the store is touched.
pub async fn pull_products(
    client: &RutenClient,
    store: &dyn LocalEntityStore,
    page: u32,
    page_size: u32,
) -> SyncResult<SyncOutcome> {
    let payload = client.list_products(page, page_size).await?;
    let records = remote::extract_page(EntityKind::Product, &payload);
    reconcile(EntityKind::Product, &records, store).await
}

/// Fetches one order page and reconciles it.
pub async fn pull_orders(
    client: &RutenClient,
    store: &dyn LocalEntityStore,
    query: &OrderListQuery,
) -> SyncResult<SyncOutcome> {
    let payload = client.list_orders(query).await?;
    let records = remote::extract_page(EntityKind::Order, &payload);
    reconcile(EntityKind::Order, &records, store).await
}

/// Fetches the category list and reconciles it.
pub async fn pull_categories(
    client: &RutenClient,
    store: &dyn LocalEntityStore,
) -> SyncResult<SyncOutcome> {
    let payload = client.list_categories().await?;
    let records = remote::extract_page(EntityKind::Category, &payload);
    reconcile(EntityKind::Category, &records, store).await
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use ruten_core::{OrderStatus, Product, ProductStatus};
    use ruten_db::{Database, DbConfig};
    use serde_json::json;
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    async fn db() -> Database {
        Database::new(DbConfig::in_memory()).await.unwrap()
    }

    #[tokio::test]
    async fn test_one_insert_one_update() {
        let db = db().await;
        let mut existing = Product::new("Old title", Utc::now());
        existing.external_id = Some("R2".to_string());
        existing.stock = 9;
        db.products().insert(&existing).await.unwrap();

        let page = vec![
            json!({"item_id": "R1", "title": "New", "price": "120", "stock": 3}),
            json!({"item_id": "R2", "title": "Renamed"}),
        ];
        let outcome = reconcile(EntityKind::Product, &page, &db.entity_store())
            .await
            .unwrap();

        assert_eq!(outcome.inserted, 1);
        assert_eq!(outcome.updated, 1);
        assert_eq!(outcome.processed_count, 2);
        assert!(outcome.is_clean());

        let r2 = db.products().get_by_id(&existing.id).await.unwrap().unwrap();
        assert_eq!(r2.title, "Renamed");
        // Absent from the payload: kept.
        assert_eq!(r2.stock, 9);

        let r1 = db.products().get_by_external_id("R1").await.unwrap().unwrap();
        assert_eq!(r1.price_cents, 12000);
        assert_eq!(r1.status, ProductStatus::Offline);
        assert_eq!(r1.description, "");
    }

    #[tokio::test]
    async fn test_second_run_only_updates() {
        let db = db().await;
        let store = db.entity_store();
        let page = vec![
            json!({"order_id": 1001, "buyer_name": "Lin", "total_amount": 350, "status": "pending"}),
            json!({"order_id": "1002", "total_amount": "99.5", "order_date": "2024-05-01 10:00:00"}),
        ];

        let first = reconcile(EntityKind::Order, &page, &store).await.unwrap();
        assert_eq!(first.inserted, 2);

        let second = reconcile(EntityKind::Order, &page, &store).await.unwrap();
        assert_eq!(second.inserted, 0);
        assert_eq!(second.updated, 2);
        assert_eq!(second.processed_count, page.len());

        let (orders, total) = db
            .orders()
            .list(&Default::default(), 1, 10)
            .await
            .unwrap();
        assert_eq!(total, 2);
        let o2 = orders
            .iter()
            .find(|o| o.external_id.as_deref() == Some("1002"))
            .unwrap();
        assert_eq!(o2.total_cents, 9950);
        assert_eq!(o2.status, OrderStatus::Pending);
        assert!(o2.order_date.is_some());
    }

    #[tokio::test]
    async fn test_malformed_record_is_isolated() {
        let db = db().await;
        let page = vec![
            json!({"item_id": "A", "title": "ok"}),
            json!({"title": "no id"}),
            json!({"item_id": "C", "price": "1.234"}),
            json!({"item_id": "D", "stock": -4}),
            json!({"item_id": "E"}),
        ];

        let outcome = reconcile(EntityKind::Product, &page, &db.entity_store())
            .await
            .unwrap();

        assert_eq!(outcome.processed_count, 2);
        let failed: Vec<_> = outcome
            .per_record_errors
            .iter()
            .map(|f| (f.index, f.external_id.clone()))
            .collect();
        assert_eq!(
            failed,
            vec![
                (1, None),
                (2, Some("C".to_string())),
                (3, Some("D".to_string()))
            ]
        );
        assert_eq!(db.products().count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_category_parents_resolve_within_page() {
        let db = db().await;
        let store = db.entity_store();
        let page = vec![
            json!({"category_id": 10, "name": "Books", "parent_id": 0}),
            json!({"category_id": 11, "name": "Novels", "parent_id": 10}),
            json!({"category_id": 12, "name": "Orphan", "parent_id": 999}),
        ];

        let outcome = reconcile(EntityKind::Category, &page, &store).await.unwrap();
        assert_eq!(outcome.inserted, 3);

        let books = db.categories().get_by_external_id("10").await.unwrap().unwrap();
        let novels = db.categories().get_by_external_id("11").await.unwrap().unwrap();
        let orphan = db.categories().get_by_external_id("12").await.unwrap().unwrap();
        assert_eq!(books.parent_id, None);
        assert_eq!(novels.parent_id, Some(books.id.clone()));
        assert_eq!(orphan.parent_id, None);

        // Moving Novels to the root on a later pull clears the parent.
        let page = vec![json!({"category_id": "11", "parent_id": ""})];
        reconcile(EntityKind::Category, &page, &store).await.unwrap();
        let novels = db.categories().get_by_external_id("11").await.unwrap().unwrap();
        assert_eq!(novels.parent_id, None);
        assert_eq!(novels.name, "Novels");
    }

    // -------------------------------------------------------------------------
    // Fatal failures, through an in-memory store
    // -------------------------------------------------------------------------

    #[derive(Default)]
    struct Shared {
        committed: HashMap<String, LocalRecord>,
        rolled_back: bool,
    }

    struct FlakyStore {
        shared: Arc<Mutex<Shared>>,
        fail_insert_at: Option<usize>,
        fail_commit: bool,
    }

    struct FlakyTx {
        shared: Arc<Mutex<Shared>>,
        pending: HashMap<String, LocalRecord>,
        inserts: usize,
        fail_insert_at: Option<usize>,
        fail_commit: bool,
    }

    #[async_trait]
    impl LocalEntityStore for FlakyStore {
        async fn begin_page(&self) -> StoreResult<Box<dyn PageTransaction>> {
            let pending = self.shared.lock().unwrap().committed.clone();
            Ok(Box::new(FlakyTx {
                shared: self.shared.clone(),
                pending,
                inserts: 0,
                fail_insert_at: self.fail_insert_at,
                fail_commit: self.fail_commit,
            }))
        }

        async fn get(&self, _kind: EntityKind, id: &str) -> StoreResult<Option<LocalRecord>> {
            let shared = self.shared.lock().unwrap();
            Ok(shared.committed.values().find(|r| r.id() == id).cloned())
        }
    }

    #[async_trait]
    impl PageTransaction for FlakyTx {
        async fn find_by_external_id(
            &mut self,
            _kind: EntityKind,
            external_id: &str,
        ) -> StoreResult<Option<LocalRecord>> {
            Ok(self.pending.get(external_id).cloned())
        }

        async fn insert(&mut self, record: &LocalRecord) -> StoreResult<()> {
            if self.fail_insert_at == Some(self.inserts) {
                return Err(StoreError::Fatal("disk I/O error".to_string()));
            }
            self.inserts += 1;
            let key = record.external_id().unwrap_or_default().to_string();
            self.pending.insert(key, record.clone());
            Ok(())
        }

        async fn update(&mut self, record: &LocalRecord) -> StoreResult<()> {
            let key = record.external_id().unwrap_or_default().to_string();
            self.pending.insert(key, record.clone());
            Ok(())
        }

        async fn commit(self: Box<Self>) -> StoreResult<()> {
            if self.fail_commit {
                return Err(StoreError::Fatal("database is locked".to_string()));
            }
            let FlakyTx {
                shared, pending, ..
            } = *self;
            shared.lock().unwrap().committed = pending;
            Ok(())
        }

        async fn rollback(self: Box<Self>) -> StoreResult<()> {
            self.shared.lock().unwrap().rolled_back = true;
            Ok(())
        }
    }

    fn three_products() -> Vec<Value> {
        vec![
            json!({"item_id": "P1"}),
            json!({"item_id": "P2"}),
            json!({"item_id": "P3"}),
        ]
    }

    #[tokio::test]
    async fn test_fatal_failure_rolls_back_page() {
        let shared = Arc::new(Mutex::new(Shared::default()));
        let store = FlakyStore {
            shared: shared.clone(),
            fail_insert_at: Some(2),
            fail_commit: false,
        };

        let err = reconcile(EntityKind::Product, &three_products(), &store)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            SyncError::PageRolledBack {
                kind: EntityKind::Product,
                ..
            }
        ));
        let shared = shared.lock().unwrap();
        assert!(shared.rolled_back);
        assert!(shared.committed.is_empty());
    }

    #[tokio::test]
    async fn test_commit_failure_is_fatal() {
        let shared = Arc::new(Mutex::new(Shared::default()));
        let store = FlakyStore {
            shared: shared.clone(),
            fail_insert_at: None,
            fail_commit: true,
        };

        let err = reconcile(EntityKind::Product, &three_products(), &store)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("database is locked"));
        assert!(shared.lock().unwrap().committed.is_empty());
    }

    #[tokio::test]
    async fn test_empty_page_commits_nothing() {
        let shared = Arc::new(Mutex::new(Shared::default()));
        let store = FlakyStore {
            shared,
            fail_insert_at: None,
            fail_commit: false,
        };
        let outcome = reconcile(EntityKind::Category, &[], &store).await.unwrap();
        assert_eq!(outcome, SyncOutcome::empty(EntityKind::Category));
    }
}
