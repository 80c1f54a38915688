//! # Product Repository
//!
//! Database operations for products.
//!
//! ## Key Operations
//! - Lookup by local id or marketplace `external_id`
//! - Paginated listing with an optional status filter
//! - Whole-row insert / update (the reconciler and local mutations share them)
//!
//! The row-level functions are generic over the executor so the same SQL runs
//! against the pool and inside a page transaction (see `store.rs`).

use chrono::{DateTime, Utc};
use sqlx::{Executor, Sqlite, SqlitePool};
use tracing::debug;

use crate::error::{DbError, DbResult};
use ruten_core::{Product, ProductStatus};

const COLUMNS: &str = "id, external_id, title, description, price_cents, stock, status, \
                       category_id, created_at, updated_at";

#[derive(Debug, sqlx::FromRow)]
struct ProductRow {
    id: String,
    external_id: Option<String>,
    title: String,
    description: String,
    price_cents: i64,
    stock: i64,
    status: String,
    category_id: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<ProductRow> for Product {
    fn from(row: ProductRow) -> Self {
        Product {
            id: row.id,
            external_id: row.external_id,
            title: row.title,
            description: row.description,
            price_cents: row.price_cents,
            stock: row.stock,
            status: ProductStatus::from(row.status),
            category_id: row.category_id,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

// =============================================================================
// Executor-Generic Row Functions
// =============================================================================

pub(crate) async fn fetch_by_id<'e, E>(exec: E, id: &str) -> DbResult<Option<Product>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let sql = format!("SELECT {} FROM products WHERE id = ?1", COLUMNS);
    let row = sqlx::query_as::<_, ProductRow>(&sql)
        .bind(id)
        .fetch_optional(exec)
        .await?;
    Ok(row.map(Product::from))
}

pub(crate) async fn fetch_by_external_id<'e, E>(
    exec: E,
    external_id: &str,
) -> DbResult<Option<Product>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let sql = format!("SELECT {} FROM products WHERE external_id = ?1", COLUMNS);
    let row = sqlx::query_as::<_, ProductRow>(&sql)
        .bind(external_id)
        .fetch_optional(exec)
        .await?;
    Ok(row.map(Product::from))
}

pub(crate) async fn insert_row<'e, E>(exec: E, product: &Product) -> DbResult<()>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query(
        r#"
        INSERT INTO products (
            id, external_id, title, description, price_cents, stock, status,
            category_id, created_at, updated_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
        "#,
    )
    .bind(&product.id)
    .bind(&product.external_id)
    .bind(&product.title)
    .bind(&product.description)
    .bind(product.price_cents)
    .bind(product.stock)
    .bind(product.status.as_str())
    .bind(&product.category_id)
    .bind(product.created_at)
    .bind(product.updated_at)
    .execute(exec)
    .await?;
    Ok(())
}

pub(crate) async fn update_row<'e, E>(exec: E, product: &Product) -> DbResult<()>
where
    E: Executor<'e, Database = Sqlite>,
{
    let result = sqlx::query(
        r#"
        UPDATE products SET
            external_id = ?2,
            title = ?3,
            description = ?4,
            price_cents = ?5,
            stock = ?6,
            status = ?7,
            category_id = ?8,
            updated_at = ?9
        WHERE id = ?1
        "#,
    )
    .bind(&product.id)
    .bind(&product.external_id)
    .bind(&product.title)
    .bind(&product.description)
    .bind(product.price_cents)
    .bind(product.stock)
    .bind(product.status.as_str())
    .bind(&product.category_id)
    .bind(product.updated_at)
    .execute(exec)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::not_found("Product", &product.id));
    }
    Ok(())
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for product database operations.
///
/// ## Usage
/// ```rust,ignore
/// let repo = ProductRepository::new(pool);
///
/// let (page, total) = repo.list(Some("online"), 1, 30).await?;
/// let product = repo.get_by_external_id("1001").await?;
/// ```
#[derive(Debug, Clone)]
pub struct ProductRepository {
    pool: SqlitePool,
}

impl ProductRepository {
    /// Creates a new ProductRepository.
    pub fn new(pool: SqlitePool) -> Self {
        ProductRepository { pool }
    }

    /// Gets a product by its local id.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Product>> {
        fetch_by_id(&self.pool, id).await
    }

    /// Gets a product by its marketplace `item_id`.
    pub async fn get_by_external_id(&self, external_id: &str) -> DbResult<Option<Product>> {
        fetch_by_external_id(&self.pool, external_id).await
    }

    /// Lists products, newest first.
    ///
    /// ## Returns
    /// The requested page and the total number of matching products.
    pub async fn list(
        &self,
        status: Option<&str>,
        page: u32,
        page_size: u32,
    ) -> DbResult<(Vec<Product>, i64)> {
        let offset = i64::from(page.saturating_sub(1)) * i64::from(page_size);
        debug!(?status, page, page_size, "Listing products");

        let sql = format!(
            "SELECT {} FROM products WHERE (?1 IS NULL OR status = ?1) \
             ORDER BY created_at DESC, id LIMIT ?2 OFFSET ?3",
            COLUMNS
        );
        let rows = sqlx::query_as::<_, ProductRow>(&sql)
            .bind(status)
            .bind(i64::from(page_size))
            .bind(offset)
            .fetch_all(&self.pool)
            .await?;

        let total: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM products WHERE (?1 IS NULL OR status = ?1)")
                .bind(status)
                .fetch_one(&self.pool)
                .await?;

        Ok((rows.into_iter().map(Product::from).collect(), total))
    }

    /// Inserts a new product.
    pub async fn insert(&self, product: &Product) -> DbResult<()> {
        debug!(id = %product.id, title = %product.title, "Inserting product");
        insert_row(&self.pool, product).await
    }

    /// Writes every column of an existing product.
    pub async fn update(&self, product: &Product) -> DbResult<()> {
        debug!(id = %product.id, "Updating product");
        update_row(&self.pool, product).await
    }

    /// Records the `item_id` the marketplace assigned to a local product.
    pub async fn set_external_id(&self, id: &str, external_id: &str) -> DbResult<()> {
        let result = sqlx::query("UPDATE products SET external_id = ?2, updated_at = ?3 WHERE id = ?1")
            .bind(id)
            .bind(external_id)
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Product", id));
        }
        Ok(())
    }

    /// Deletes a product. Returns the deleted row.
    pub async fn delete(&self, id: &str) -> DbResult<Product> {
        let product = self
            .get_by_id(id)
            .await?
            .ok_or_else(|| DbError::not_found("Product", id))?;

        sqlx::query("DELETE FROM products WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        debug!(id = %id, "Deleted product");
        Ok(product)
    }

    /// Counts all products.
    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM products")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
