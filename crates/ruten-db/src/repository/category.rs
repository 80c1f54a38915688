//! # Category Repository
//!
//! Database operations for store categories.
//!
//! Categories form a tree through `parent_id` (a local id). A category with
//! children cannot be deleted; the foreign key enforces it and
//! [`CategoryRepository::count_children`] lets callers check first.

use chrono::{DateTime, Utc};
use sqlx::{Executor, Sqlite, SqlitePool};
use tracing::debug;

use crate::error::{DbError, DbResult};
use ruten_core::Category;

const COLUMNS: &str = "id, external_id, name, parent_id, created_at, updated_at";

#[derive(Debug, sqlx::FromRow)]
struct CategoryRow {
    id: String,
    external_id: Option<String>,
    name: String,
    parent_id: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<CategoryRow> for Category {
    fn from(row: CategoryRow) -> Self {
        Category {
            id: row.id,
            external_id: row.external_id,
            name: row.name,
            parent_id: row.parent_id,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

// =============================================================================
// Executor-Generic Row Functions
// =============================================================================

pub(crate) async fn fetch_by_id<'e, E>(exec: E, id: &str) -> DbResult<Option<Category>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let sql = format!("SELECT {} FROM categories WHERE id = ?1", COLUMNS);
    let row = sqlx::query_as::<_, CategoryRow>(&sql)
        .bind(id)
        .fetch_optional(exec)
        .await?;
    Ok(row.map(Category::from))
}

pub(crate) async fn fetch_by_external_id<'e, E>(
    exec: E,
    external_id: &str,
) -> DbResult<Option<Category>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let sql = format!("SELECT {} FROM categories WHERE external_id = ?1", COLUMNS);
    let row = sqlx::query_as::<_, CategoryRow>(&sql)
        .bind(external_id)
        .fetch_optional(exec)
        .await?;
    Ok(row.map(Category::from))
}

pub(crate) async fn insert_row<'e, E>(exec: E, category: &Category) -> DbResult<()>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query(
        r#"
        INSERT INTO categories (id, external_id, name, parent_id, created_at, updated_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6)
        "#,
    )
    .bind(&category.id)
    .bind(&category.external_id)
    .bind(&category.name)
    .bind(&category.parent_id)
    .bind(category.created_at)
    .bind(category.updated_at)
    .execute(exec)
    .await?;
    Ok(())
}

pub(crate) async fn update_row<'e, E>(exec: E, category: &Category) -> DbResult<()>
where
    E: Executor<'e, Database = Sqlite>,
{
    let result = sqlx::query(
        r#"
        UPDATE categories SET
            external_id = ?2,
            name = ?3,
            parent_id = ?4,
            updated_at = ?5
        WHERE id = ?1
        "#,
    )
    .bind(&category.id)
    .bind(&category.external_id)
    .bind(&category.name)
    .bind(&category.parent_id)
    .bind(category.updated_at)
    .execute(exec)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::not_found("Category", &category.id));
    }
    Ok(())
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for category database operations.
#[derive(Debug, Clone)]
pub struct CategoryRepository {
    pool: SqlitePool,
}

impl CategoryRepository {
    pub fn new(pool: SqlitePool) -> Self {
        CategoryRepository { pool }
    }

    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Category>> {
        fetch_by_id(&self.pool, id).await
    }

    pub async fn get_by_external_id(&self, external_id: &str) -> DbResult<Option<Category>> {
        fetch_by_external_id(&self.pool, external_id).await
    }

    /// Lists every category, ordered by name.
    pub async fn list_all(&self) -> DbResult<Vec<Category>> {
        let sql = format!("SELECT {} FROM categories ORDER BY name, id", COLUMNS);
        let rows = sqlx::query_as::<_, CategoryRow>(&sql)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(Category::from).collect())
    }

    pub async fn insert(&self, category: &Category) -> DbResult<()> {
        debug!(id = %category.id, name = %category.name, "Inserting category");
        insert_row(&self.pool, category).await
    }

    pub async fn update(&self, category: &Category) -> DbResult<()> {
        debug!(id = %category.id, "Updating category");
        update_row(&self.pool, category).await
    }

    /// Records the `category_id` the marketplace assigned.
    pub async fn set_external_id(&self, id: &str, external_id: &str) -> DbResult<()> {
        let result =
            sqlx::query("UPDATE categories SET external_id = ?2, updated_at = ?3 WHERE id = ?1")
                .bind(id)
                .bind(external_id)
                .bind(Utc::now())
                .execute(&self.pool)
                .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Category", id));
        }
        Ok(())
    }

    /// Number of categories whose parent is `id`.
    pub async fn count_children(&self, id: &str) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM categories WHERE parent_id = ?1")
            .bind(id)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    /// Deletes a category. Returns the deleted row.
    ///
    /// Fails with a foreign key violation while children exist.
    pub async fn delete(&self, id: &str) -> DbResult<Category> {
        let category = self
            .get_by_id(id)
            .await?
            .ok_or_else(|| DbError::not_found("Category", id))?;

        sqlx::query("DELETE FROM categories WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(category)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};

    #[tokio::test]
    async fn test_tree_and_child_guard() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.categories();

        let root = Category::new("Books", Utc::now());
        let mut child = Category::new("Novels", Utc::now());
        child.parent_id = Some(root.id.clone());
        repo.insert(&root).await.unwrap();
        repo.insert(&child).await.unwrap();

        assert_eq!(repo.count_children(&root.id).await.unwrap(), 1);
        assert!(matches!(
            repo.delete(&root.id).await,
            Err(DbError::ForeignKeyViolation { .. })
        ));

        repo.delete(&child.id).await.unwrap();
        assert_eq!(repo.count_children(&root.id).await.unwrap(), 0);
        repo.delete(&root.id).await.unwrap();
        assert!(repo.list_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_parent_rejected() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.categories();

        let mut orphan = Category::new("Orphan", Utc::now());
        orphan.parent_id = Some("does-not-exist".to_string());
        assert!(matches!(
            repo.insert(&orphan).await,
            Err(DbError::ForeignKeyViolation { .. })
        ));
    }

    #[tokio::test]
    async fn test_set_external_id_and_lookup() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.categories();

        let category = Category::new("Toys", Utc::now());
        repo.insert(&category).await.unwrap();
        repo.set_external_id(&category.id, "555").await.unwrap();

        let found = repo.get_by_external_id("555").await.unwrap().unwrap();
        assert_eq!(found.id, category.id);
        assert_eq!(found.name, "Toys");
    }
}
