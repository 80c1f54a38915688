//! Store category handlers.

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Deserialize;
use serde_json::Value;

use ruten_sync::reconciler;
use ruten_sync::CategoryChanges;

use super::{double_option, mirrored, required, success, sync_summary, SyncFlag};
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateCategoryRequest {
    pub name: Option<String>,
    /// Local id of the parent category.
    pub parent_id: Option<String>,
    #[serde(default)]
    pub sync_to_ruten: bool,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateCategoryRequest {
    pub name: Option<String>,
    /// `null` moves the category to the root.
    #[serde(default, deserialize_with = "double_option")]
    pub parent_id: Option<Option<String>>,
    pub sync_to_ruten: Option<bool>,
}

pub async fn list_categories(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    let categories = state.db.categories().list_all().await?;
    Ok(success(categories))
}

pub async fn get_category(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Value>> {
    let category = state
        .db
        .categories()
        .get_by_id(&id)
        .await?
        .ok_or_else(|| ApiError::not_found("Category", &id))?;
    Ok(success(category))
}

pub async fn create_category(
    State(state): State<AppState>,
    payload: Result<Json<CreateCategoryRequest>, JsonRejection>,
) -> ApiResult<Json<Value>> {
    let Json(body) = payload?;
    let name = body.name.ok_or_else(|| required("name"))?;
    let parent_id = body
        .parent_id
        .map(|id| id.trim().to_string())
        .filter(|id| !id.is_empty());

    let result = state
        .service()
        .create_category(&name, parent_id, body.sync_to_ruten)
        .await?;
    Ok(mirrored(result, |category| category))
}

pub async fn update_category(
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<UpdateCategoryRequest>, JsonRejection>,
) -> ApiResult<Json<Value>> {
    let Json(body) = payload?;
    let changes = CategoryChanges {
        name: body.name,
        parent_id: body.parent_id,
    };
    let result = state
        .service()
        .update_category(&id, changes, body.sync_to_ruten.unwrap_or(true))
        .await?;
    Ok(mirrored(result, |category| category))
}

/// Refused with a 409 while child categories exist.
pub async fn delete_category(
    State(state): State<AppState>,
    Path(id): Path<String>,
    flag: Result<Query<SyncFlag>, QueryRejection>,
) -> ApiResult<Json<Value>> {
    let Query(flag) = flag?;
    let result = state
        .service()
        .delete_category(&id, flag.sync_to_ruten.unwrap_or(true))
        .await?;
    Ok(mirrored(result, |category| category))
}

/// Pulls the marketplace category tree into the local store.
pub async fn sync_categories(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    let client = state.client()?;
    let outcome = reconciler::pull_categories(client, &state.db.entity_store()).await?;
    Ok(sync_summary(outcome))
}
