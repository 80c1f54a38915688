//! # API Call Log Repository
//!
//! Append-only diagnostic rows, one per remote call.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::SqlitePool;

use crate::error::DbResult;

/// A stored call record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct ApiLogEntry {
    pub id: i64,
    pub endpoint: String,
    pub method: String,
    pub request_data: Option<String>,
    pub response_data: Option<String>,
    pub status_code: Option<i64>,
    pub execution_ms: i64,
    pub correlation_id: Option<String>,
    /// `success`, `remote_error` or `transport_error`.
    pub outcome: String,
    pub created_at: DateTime<Utc>,
}

/// A call record to be written.
#[derive(Debug, Clone, Default)]
pub struct NewApiLog {
    pub endpoint: String,
    pub method: String,
    pub request_data: Option<String>,
    pub response_data: Option<String>,
    pub status_code: Option<u16>,
    pub execution_ms: i64,
    pub correlation_id: Option<String>,
    pub outcome: String,
}

#[derive(Debug, Clone)]
pub struct ApiLogRepository {
    pool: SqlitePool,
}

impl ApiLogRepository {
    pub fn new(pool: SqlitePool) -> Self {
        ApiLogRepository { pool }
    }

    /// Appends a record and returns its row id.
    pub async fn insert(&self, log: &NewApiLog) -> DbResult<i64> {
        let result = sqlx::query(
            r#"
            INSERT INTO api_logs (
                endpoint, method, request_data, response_data, status_code,
                execution_ms, correlation_id, outcome, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
        )
        .bind(&log.endpoint)
        .bind(&log.method)
        .bind(&log.request_data)
        .bind(&log.response_data)
        .bind(log.status_code.map(i64::from))
        .bind(log.execution_ms)
        .bind(&log.correlation_id)
        .bind(&log.outcome)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        Ok(result.last_insert_rowid())
    }

    /// Most recent records first.
    pub async fn recent(&self, limit: u32) -> DbResult<Vec<ApiLogEntry>> {
        let rows = sqlx::query_as::<_, ApiLogEntry>(
            r#"
            SELECT id, endpoint, method, request_data, response_data, status_code,
                   execution_ms, correlation_id, outcome, created_at
            FROM api_logs
            ORDER BY id DESC
            LIMIT ?1
            "#,
        )
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Deletes records written before `cutoff`; returns how many went.
    pub async fn prune_before(&self, cutoff: DateTime<Utc>) -> DbResult<u64> {
        let result = sqlx::query("DELETE FROM api_logs WHERE created_at < ?1")
            .bind(cutoff)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};

    #[tokio::test]
    async fn test_insert_and_recent() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.api_logs();

        for status in [200u16, 401] {
            repo.insert(&NewApiLog {
                endpoint: "/api/v1/product/list".to_string(),
                method: "GET".to_string(),
                status_code: Some(status),
                execution_ms: 12,
                outcome: if status == 200 { "success" } else { "remote_error" }.to_string(),
                ..Default::default()
            })
            .await
            .unwrap();
        }

        let logs = repo.recent(10).await.unwrap();
        assert_eq!(logs.len(), 2);
        assert_eq!(logs[0].status_code, Some(401));
        assert_eq!(logs[0].outcome, "remote_error");
        assert_eq!(logs[1].status_code, Some(200));
        assert!(logs[1].correlation_id.is_none());
    }

    #[tokio::test]
    async fn test_prune_before_keeps_recent_rows() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.api_logs();

        let mut ids = Vec::new();
        for endpoint in ["/api/v1/order/list", "/api/v1/product/list"] {
            let id = repo
                .insert(&NewApiLog {
                    endpoint: endpoint.to_string(),
                    method: "GET".to_string(),
                    outcome: "success".to_string(),
                    ..Default::default()
                })
                .await
                .unwrap();
            ids.push(id);
        }

        // Age the first row by ten days
        sqlx::query("UPDATE api_logs SET created_at = ?1 WHERE id = ?2")
            .bind(Utc::now() - chrono::Duration::days(10))
            .bind(ids[0])
            .execute(db.pool())
            .await
            .unwrap();

        let removed = repo
            .prune_before(Utc::now() - chrono::Duration::days(7))
            .await
            .unwrap();
        assert_eq!(removed, 1);

        let logs = repo.recent(10).await.unwrap();
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].endpoint, "/api/v1/product/list");
    }
}
