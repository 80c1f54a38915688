//! # SQLite Entity Store
//!
//! Implements the `ruten_core::store` traits on top of a sqlx transaction.
//!
//! ```text
//! begin_page() ── pool.begin() ──► SqlitePageTransaction { tx }
//!                                    │ find / insert / update
//!                                    │   DbError → StoreError::{Record, Fatal}
//!                                    ├── commit()   tx.commit()
//!                                    └── rollback() tx.rollback()
//! ```
//!
//! A failing statement in SQLite aborts only that statement, so a constraint
//! violation on one record leaves the page transaction usable.

use async_trait::async_trait;
use sqlx::{Sqlite, SqlitePool, Transaction};
use tracing::debug;

use crate::error::DbError;
use crate::repository::{category, order, product};
use ruten_core::{EntityKind, LocalEntityStore, LocalRecord, PageTransaction, StoreError, StoreResult};

/// Page-transactional store over the SQLite pool.
#[derive(Debug, Clone)]
pub struct SqliteEntityStore {
    pool: SqlitePool,
}

impl SqliteEntityStore {
    pub fn new(pool: SqlitePool) -> Self {
        SqliteEntityStore { pool }
    }
}

#[async_trait]
impl LocalEntityStore for SqliteEntityStore {
    async fn begin_page(&self) -> StoreResult<Box<dyn PageTransaction>> {
        let tx = self
            .pool
            .begin()
            .await
            .map_err(|e| StoreError::Fatal(format!("cannot open page transaction: {}", e)))?;
        debug!("Page transaction opened");
        Ok(Box::new(SqlitePageTransaction { tx }))
    }

    async fn get(&self, kind: EntityKind, id: &str) -> StoreResult<Option<LocalRecord>> {
        let record = match kind {
            EntityKind::Product => product::fetch_by_id(&self.pool, id)
                .await?
                .map(LocalRecord::Product),
            EntityKind::Order => order::fetch_by_id(&self.pool, id)
                .await?
                .map(LocalRecord::Order),
            EntityKind::Category => category::fetch_by_id(&self.pool, id)
                .await?
                .map(LocalRecord::Category),
        };
        Ok(record)
    }
}

/// One open page transaction.
pub struct SqlitePageTransaction {
    tx: Transaction<'static, Sqlite>,
}

#[async_trait]
impl PageTransaction for SqlitePageTransaction {
    async fn find_by_external_id(
        &mut self,
        kind: EntityKind,
        external_id: &str,
    ) -> StoreResult<Option<LocalRecord>> {
        let conn = &mut *self.tx;
        let record = match kind {
            EntityKind::Product => product::fetch_by_external_id(conn, external_id)
                .await?
                .map(LocalRecord::Product),
            EntityKind::Order => order::fetch_by_external_id(conn, external_id)
                .await?
                .map(LocalRecord::Order),
            EntityKind::Category => category::fetch_by_external_id(conn, external_id)
                .await?
                .map(LocalRecord::Category),
        };
        Ok(record)
    }

    async fn insert(&mut self, record: &LocalRecord) -> StoreResult<()> {
        let conn = &mut *self.tx;
        let result: Result<(), DbError> = match record {
            LocalRecord::Product(p) => product::insert_row(conn, p).await,
            LocalRecord::Order(o) => order::insert_row(conn, o).await,
            LocalRecord::Category(c) => category::insert_row(conn, c).await,
        };
        Ok(result?)
    }

    async fn update(&mut self, record: &LocalRecord) -> StoreResult<()> {
        let conn = &mut *self.tx;
        let result: Result<(), DbError> = match record {
            LocalRecord::Product(p) => product::update_row(conn, p).await,
            LocalRecord::Order(o) => order::update_row(conn, o).await,
            LocalRecord::Category(c) => category::update_row(conn, c).await,
        };
        Ok(result?)
    }

    async fn commit(self: Box<Self>) -> StoreResult<()> {
        self.tx
            .commit()
            .await
            .map_err(|e| StoreError::Fatal(format!("commit failed: {}", e)))
    }

    async fn rollback(self: Box<Self>) -> StoreResult<()> {
        self.tx
            .rollback()
            .await
            .map_err(|e| StoreError::Fatal(format!("rollback failed: {}", e)))
    }
}
