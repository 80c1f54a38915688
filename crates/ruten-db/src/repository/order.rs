//! # Order Repository
//!
//! Database operations for marketplace orders.
//!
//! Orders are only ever created by a pull from the marketplace; local
//! mutations (ship, cancel, refund) rewrite the row through [`OrderRepository::update`].

use chrono::{DateTime, Utc};
use sqlx::{Executor, Sqlite, SqlitePool};
use tracing::debug;

use crate::error::{DbError, DbResult};
use ruten_core::{Order, OrderStatus};

const COLUMNS: &str = "id, external_id, buyer_name, total_cents, status, order_date, ship_date, \
                       created_at, updated_at";

#[derive(Debug, sqlx::FromRow)]
struct OrderRow {
    id: String,
    external_id: Option<String>,
    buyer_name: String,
    total_cents: i64,
    status: String,
    order_date: Option<DateTime<Utc>>,
    ship_date: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<OrderRow> for Order {
    fn from(row: OrderRow) -> Self {
        Order {
            id: row.id,
            external_id: row.external_id,
            buyer_name: row.buyer_name,
            total_cents: row.total_cents,
            status: OrderStatus::from(row.status),
            order_date: row.order_date,
            ship_date: row.ship_date,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Filters for [`OrderRepository::list`].
#[derive(Debug, Clone, Default)]
pub struct OrderFilter {
    /// Exact status match.
    pub status: Option<String>,
    /// Inclusive lower bound on `order_date`.
    pub from: Option<DateTime<Utc>>,
    /// Exclusive upper bound on `order_date`.
    pub until: Option<DateTime<Utc>>,
}

// =============================================================================
// Executor-Generic Row Functions
// =============================================================================

pub(crate) async fn fetch_by_id<'e, E>(exec: E, id: &str) -> DbResult<Option<Order>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let sql = format!("SELECT {} FROM orders WHERE id = ?1", COLUMNS);
    let row = sqlx::query_as::<_, OrderRow>(&sql)
        .bind(id)
        .fetch_optional(exec)
        .await?;
    Ok(row.map(Order::from))
}

pub(crate) async fn fetch_by_external_id<'e, E>(
    exec: E,
    external_id: &str,
) -> DbResult<Option<Order>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let sql = format!("SELECT {} FROM orders WHERE external_id = ?1", COLUMNS);
    let row = sqlx::query_as::<_, OrderRow>(&sql)
        .bind(external_id)
        .fetch_optional(exec)
        .await?;
    Ok(row.map(Order::from))
}

pub(crate) async fn insert_row<'e, E>(exec: E, order: &Order) -> DbResult<()>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query(
        r#"
        INSERT INTO orders (
            id, external_id, buyer_name, total_cents, status, order_date, ship_date,
            created_at, updated_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
        "#,
    )
    .bind(&order.id)
    .bind(&order.external_id)
    .bind(&order.buyer_name)
    .bind(order.total_cents)
    .bind(order.status.as_str())
    .bind(order.order_date)
    .bind(order.ship_date)
    .bind(order.created_at)
    .bind(order.updated_at)
    .execute(exec)
    .await?;
    Ok(())
}

pub(crate) async fn update_row<'e, E>(exec: E, order: &Order) -> DbResult<()>
where
    E: Executor<'e, Database = Sqlite>,
{
    let result = sqlx::query(
        r#"
        UPDATE orders SET
            external_id = ?2,
            buyer_name = ?3,
            total_cents = ?4,
            status = ?5,
            order_date = ?6,
            ship_date = ?7,
            updated_at = ?8
        WHERE id = ?1
        "#,
    )
    .bind(&order.id)
    .bind(&order.external_id)
    .bind(&order.buyer_name)
    .bind(order.total_cents)
    .bind(order.status.as_str())
    .bind(order.order_date)
    .bind(order.ship_date)
    .bind(order.updated_at)
    .execute(exec)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::not_found("Order", &order.id));
    }
    Ok(())
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for order database operations.
#[derive(Debug, Clone)]
pub struct OrderRepository {
    pool: SqlitePool,
}

impl OrderRepository {
    pub fn new(pool: SqlitePool) -> Self {
        OrderRepository { pool }
    }

    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Order>> {
        fetch_by_id(&self.pool, id).await
    }

    pub async fn get_by_external_id(&self, external_id: &str) -> DbResult<Option<Order>> {
        fetch_by_external_id(&self.pool, external_id).await
    }

    /// Lists orders, newest order date first. Orders without a date sort last.
    pub async fn list(
        &self,
        filter: &OrderFilter,
        page: u32,
        page_size: u32,
    ) -> DbResult<(Vec<Order>, i64)> {
        let offset = i64::from(page.saturating_sub(1)) * i64::from(page_size);
        debug!(?filter, page, page_size, "Listing orders");

        const WHERE: &str = "WHERE (?1 IS NULL OR status = ?1) \
                             AND (?2 IS NULL OR order_date >= ?2) \
                             AND (?3 IS NULL OR order_date < ?3)";

        let sql = format!(
            "SELECT {} FROM orders {} \
             ORDER BY order_date IS NULL, order_date DESC, created_at DESC LIMIT ?4 OFFSET ?5",
            COLUMNS, WHERE
        );
        let rows = sqlx::query_as::<_, OrderRow>(&sql)
            .bind(filter.status.as_deref())
            .bind(filter.from)
            .bind(filter.until)
            .bind(i64::from(page_size))
            .bind(offset)
            .fetch_all(&self.pool)
            .await?;

        let total: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM orders {}", WHERE))
            .bind(filter.status.as_deref())
            .bind(filter.from)
            .bind(filter.until)
            .fetch_one(&self.pool)
            .await?;

        Ok((rows.into_iter().map(Order::from).collect(), total))
    }

    pub async fn insert(&self, order: &Order) -> DbResult<()> {
        debug!(id = %order.id, "Inserting order");
        insert_row(&self.pool, order).await
    }

    pub async fn update(&self, order: &Order) -> DbResult<()> {
        debug!(id = %order.id, status = %order.status, "Updating order");
        update_row(&self.pool, order).await
    }
}
