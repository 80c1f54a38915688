//! Health check endpoint.

use axum::extract::State;
use axum::Json;
use serde_json::{json, Value};

use crate::state::AppState;

/// Liveness plus a database ping. Never fails: a dead database is reported
/// as `"database": false`.
pub async fn health(State(state): State<AppState>) -> Json<Value> {
    let database = state.db.health_check().await;
    Json(json!({
        "status": "healthy",
        "service": "ruten-api",
        "database": database,
    }))
}
