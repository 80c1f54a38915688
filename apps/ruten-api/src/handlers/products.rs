//! # Product Handlers
//!
//! Local product listing and edits, image upload and the product pull.
//!
//! ## Sync Defaults
//! ```text
//! ┌───────────────────────────────┬──────────────────────────────┐
//! │ Route                         │ sync_to_ruten default        │
//! ├───────────────────────────────┼──────────────────────────────┤
//! │ POST   /api/products          │ false                        │
//! │ PUT    /api/products/{id}     │ true (price, stock, status)  │
//! │ PUT    .../stock|price|status │ true                         │
//! │ DELETE /api/products/{id}     │ true (taken offline)         │
//! └───────────────────────────────┴──────────────────────────────┘
//! ```

use std::path::PathBuf;

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::info;

use ruten_core::validation::parse_local_status;
use ruten_core::{CoreError, Product};
use ruten_sync::reconciler;
use ruten_sync::{NewProduct, ProductChanges};

use super::{
    double_option, mirrored, money_field, page_count, required, success, sync_summary, PageQuery,
    SyncFlag,
};
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// Product as the API shows it.
#[derive(Debug, Clone, Serialize)]
pub struct ProductDto {
    pub id: String,
    pub external_id: Option<String>,
    pub title: String,
    pub description: String,
    /// Decimal amount, the way the marketplace writes it.
    pub price: Value,
    pub price_cents: i64,
    pub stock: i64,
    pub status: String,
    pub category_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Product> for ProductDto {
    fn from(p: Product) -> Self {
        ProductDto {
            price: p.price().to_wire(),
            status: p.status.as_str().to_string(),
            id: p.id,
            external_id: p.external_id,
            title: p.title,
            description: p.description,
            price_cents: p.price_cents,
            stock: p.stock,
            category_id: p.category_id,
            created_at: p.created_at,
            updated_at: p.updated_at,
        }
    }
}

// =============================================================================
// Requests
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct ProductListQuery {
    pub page: Option<u32>,
    pub page_size: Option<u32>,
    pub status: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateProductRequest {
    pub title: Option<String>,
    pub price: Option<Value>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub stock: i64,
    pub status: Option<String>,
    pub category_id: Option<String>,
    #[serde(default)]
    pub sync_to_ruten: bool,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateProductRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub price: Option<Value>,
    pub stock: Option<i64>,
    pub status: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub category_id: Option<Option<String>>,
    pub sync_to_ruten: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct StockRequest {
    pub stock: i64,
    pub sync_to_ruten: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct PriceRequest {
    pub price: Value,
    pub sync_to_ruten: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct StatusRequest {
    pub status: String,
    pub sync_to_ruten: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct ImagesRequest {
    pub paths: Vec<PathBuf>,
}

// =============================================================================
// Handlers
// =============================================================================

pub async fn list_products(
    State(state): State<AppState>,
    query: Result<Query<ProductListQuery>, QueryRejection>,
) -> ApiResult<Json<Value>> {
    let Query(query) = query?;
    let (page, page_size) = PageQuery {
        page: query.page,
        page_size: query.page_size,
    }
    .resolve(state.default_page_size())?;

    let status = query.status.as_deref().map(str::trim).filter(|s| !s.is_empty());
    let (products, total) = state.db.products().list(status, page, page_size).await?;
    let products: Vec<ProductDto> = products.into_iter().map(ProductDto::from).collect();

    Ok(success(json!({
        "products": products,
        "total": total,
        "page": page,
        "page_size": page_size,
        "pages": page_count(total, page_size),
    })))
}

pub async fn get_product(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Value>> {
    let product = state
        .db
        .products()
        .get_by_id(&id)
        .await?
        .ok_or_else(|| ApiError::not_found("Product", &id))?;
    Ok(success(ProductDto::from(product)))
}

pub async fn create_product(
    State(state): State<AppState>,
    payload: Result<Json<CreateProductRequest>, JsonRejection>,
) -> ApiResult<Json<Value>> {
    let Json(body) = payload?;

    let title = body.title.ok_or_else(|| required("title"))?;
    let price = body.price.ok_or_else(|| required("price"))?;
    let input = NewProduct {
        title,
        description: body.description,
        price: money_field("price", &price)?,
        stock: body.stock,
        status: match body.status.as_deref() {
            Some(status) => parse_local_status(status)?,
            None => Default::default(),
        },
        category_id: body.category_id,
    };

    let result = state.service().create_product(input, body.sync_to_ruten).await?;
    Ok(mirrored(result, ProductDto::from))
}

pub async fn update_product(
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<UpdateProductRequest>, JsonRejection>,
) -> ApiResult<Json<Value>> {
    let Json(body) = payload?;

    let changes = ProductChanges {
        title: body.title,
        description: body.description,
        price: body.price.as_ref().map(|p| money_field("price", p)).transpose()?,
        stock: body.stock,
        status: body.status.as_deref().map(parse_local_status).transpose()?,
        category_id: body.category_id,
    };

    let result = state
        .service()
        .update_product(&id, changes, body.sync_to_ruten.unwrap_or(true))
        .await?;
    Ok(mirrored(result, ProductDto::from))
}

pub async fn update_stock(
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<StockRequest>, JsonRejection>,
) -> ApiResult<Json<Value>> {
    let Json(body) = payload?;
    let result = state
        .service()
        .update_stock(&id, body.stock, body.sync_to_ruten.unwrap_or(true))
        .await?;
    Ok(mirrored(result, ProductDto::from))
}

pub async fn update_price(
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<PriceRequest>, JsonRejection>,
) -> ApiResult<Json<Value>> {
    let Json(body) = payload?;
    let price = money_field("price", &body.price)?;
    let result = state
        .service()
        .update_price(&id, price, body.sync_to_ruten.unwrap_or(true))
        .await?;
    Ok(mirrored(result, ProductDto::from))
}

pub async fn update_status(
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<StatusRequest>, JsonRejection>,
) -> ApiResult<Json<Value>> {
    let Json(body) = payload?;
    let status = parse_local_status(&body.status)?;
    let result = state
        .service()
        .set_product_status(&id, status, body.sync_to_ruten.unwrap_or(true))
        .await?;
    Ok(mirrored(result, ProductDto::from))
}

/// Uploads local image files to the product's marketplace listing.
///
/// Every file is checked before anything is sent; the marketplace payload is
/// returned as is.
pub async fn upload_images(
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<ImagesRequest>, JsonRejection>,
) -> ApiResult<Json<Value>> {
    let Json(body) = payload?;

    let product = state
        .db
        .products()
        .get_by_id(&id)
        .await?
        .ok_or_else(|| ApiError::not_found("Product", &id))?;
    let item_id = product.external_id.ok_or_else(|| {
        CoreError::Conflict(format!("product {} has not been listed on Ruten yet", id))
    })?;

    let response = state
        .client()?
        .upload_product_images(&item_id, &body.paths)
        .await?;
    info!(id = %id, item_id = %item_id, count = body.paths.len(), "Product images uploaded");
    Ok(success(response))
}

pub async fn delete_product(
    State(state): State<AppState>,
    Path(id): Path<String>,
    flag: Result<Query<SyncFlag>, QueryRejection>,
) -> ApiResult<Json<Value>> {
    let Query(flag) = flag?;
    let result = state
        .service()
        .delete_product(&id, flag.sync_to_ruten.unwrap_or(true))
        .await?;
    Ok(mirrored(result, ProductDto::from))
}

/// Pulls one page of marketplace products into the local store.
pub async fn sync_products(
    State(state): State<AppState>,
    query: Result<Query<PageQuery>, QueryRejection>,
) -> ApiResult<Json<Value>> {
    let Query(query) = query?;
    let (page, page_size) = query.resolve(state.default_page_size())?;

    let client = state.client()?;
    let outcome =
        reconciler::pull_products(client, &state.db.entity_store(), page, page_size).await?;
    Ok(sync_summary(outcome))
}
