//! # Order Handlers
//!
//! Orders are created by the marketplace and arrive through the order pull.
//! Locally they can only move through ship, cancel and refund, each mirrored
//! back by default.

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::Json;
use chrono::{DateTime, Days, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use ruten_core::validation::parse_compact_date;
use ruten_core::Order;
use ruten_db::OrderFilter;
use ruten_sync::reconciler;
use ruten_sync::{OrderListQuery, RefundRequest, Shipment};

use super::{mirrored, money_field, page_count, required, success, sync_summary, PageQuery};
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

#[derive(Debug, Clone, Serialize)]
pub struct OrderDto {
    pub id: String,
    pub external_id: Option<String>,
    pub buyer_name: String,
    pub total: Value,
    pub total_cents: i64,
    pub status: String,
    pub order_date: Option<DateTime<Utc>>,
    pub ship_date: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Order> for OrderDto {
    fn from(o: Order) -> Self {
        OrderDto {
            total: o.total().to_wire(),
            status: o.status.as_str().to_string(),
            id: o.id,
            external_id: o.external_id,
            buyer_name: o.buyer_name,
            total_cents: o.total_cents,
            order_date: o.order_date,
            ship_date: o.ship_date,
            created_at: o.created_at,
            updated_at: o.updated_at,
        }
    }
}

// =============================================================================
// Requests
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct OrderListParams {
    pub page: Option<u32>,
    pub page_size: Option<u32>,
    pub status: Option<String>,
    /// `YYYYMMDD`, inclusive.
    pub start_date: Option<String>,
    /// `YYYYMMDD`, inclusive.
    pub end_date: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct OrderSyncParams {
    pub page: Option<u32>,
    pub page_size: Option<u32>,
    pub order_status: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ShipRequest {
    #[serde(default)]
    pub shipping_method: String,
    #[serde(default)]
    pub tracking_number: String,
    #[serde(default)]
    pub shipping_note: String,
    pub sync_to_ruten: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CancelRequest {
    pub reason: Option<String>,
    pub sync_to_ruten: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
pub struct RefundBody {
    pub refund_amount: Option<Value>,
    pub refund_reason: Option<String>,
    pub refund_note: Option<String>,
    pub sync_to_ruten: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct DetailRequest {
    #[serde(default)]
    pub order_ids: Vec<String>,
}

// =============================================================================
// Handlers
// =============================================================================

/// Local orders, newest first.
pub async fn list_orders(
    State(state): State<AppState>,
    query: Result<Query<OrderListParams>, QueryRejection>,
) -> ApiResult<Json<Value>> {
    let Query(query) = query?;
    let (page, page_size) = PageQuery {
        page: query.page,
        page_size: query.page_size,
    }
    .resolve(state.default_page_size())?;

    let filter = OrderFilter {
        status: non_blank(query.status),
        from: non_blank(query.start_date)
            .map(|raw| parse_compact_date("start_date", &raw))
            .transpose()?
            .map(start_of_day),
        until: non_blank(query.end_date)
            .map(|raw| parse_compact_date("end_date", &raw))
            .transpose()?
            .map(day_after)
            .transpose()?,
    };

    let (orders, total) = state.db.orders().list(&filter, page, page_size).await?;
    let orders: Vec<OrderDto> = orders.into_iter().map(OrderDto::from).collect();

    Ok(success(json!({
        "orders": orders,
        "total": total,
        "page": page,
        "page_size": page_size,
        "pages": page_count(total, page_size),
    })))
}

pub async fn get_order(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Value>> {
    let order = state
        .db
        .orders()
        .get_by_id(&id)
        .await?
        .ok_or_else(|| ApiError::not_found("Order", &id))?;
    Ok(success(OrderDto::from(order)))
}

pub async fn ship_order(
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<ShipRequest>, JsonRejection>,
) -> ApiResult<Json<Value>> {
    let Json(body) = payload?;
    if body.shipping_method.trim().is_empty() {
        return Err(required("shipping_method"));
    }
    if body.tracking_number.trim().is_empty() {
        return Err(required("tracking_number"));
    }

    let shipment = Shipment {
        shipping_method: body.shipping_method.trim().to_string(),
        tracking_number: body.tracking_number.trim().to_string(),
        shipping_note: body.shipping_note,
    };
    let result = state
        .service()
        .ship_order(&id, shipment, body.sync_to_ruten.unwrap_or(true))
        .await?;
    Ok(mirrored(result, OrderDto::from))
}

pub async fn cancel_order(
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<CancelRequest>, JsonRejection>,
) -> ApiResult<Json<Value>> {
    let Json(body) = payload?;
    let result = state
        .service()
        .cancel_order(&id, body.reason, body.sync_to_ruten.unwrap_or(true))
        .await?;
    Ok(mirrored(result, OrderDto::from))
}

/// The amount defaults to the order total.
pub async fn refund_order(
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<RefundBody>, JsonRejection>,
) -> ApiResult<Json<Value>> {
    let Json(body) = payload?;
    let request = RefundRequest {
        amount: body
            .refund_amount
            .as_ref()
            .map(|amount| money_field("refund_amount", amount))
            .transpose()?,
        reason: body.refund_reason,
        note: body.refund_note,
    };
    let result = state
        .service()
        .refund_order(&id, request, body.sync_to_ruten.unwrap_or(true))
        .await?;
    Ok(mirrored(result, OrderDto::from))
}

/// Marketplace order detail, passed through untouched.
pub async fn order_detail(
    State(state): State<AppState>,
    payload: Result<Json<DetailRequest>, JsonRejection>,
) -> ApiResult<Json<Value>> {
    let Json(body) = payload?;
    let order_ids: Vec<String> = body
        .order_ids
        .into_iter()
        .map(|id| id.trim().to_string())
        .filter(|id| !id.is_empty())
        .collect();
    if order_ids.is_empty() {
        return Err(required("order_ids"));
    }

    let payload = state.client()?.get_order_detail(&order_ids).await?;
    Ok(success(payload))
}

/// Pulls one page of marketplace orders into the local store.
pub async fn sync_orders(
    State(state): State<AppState>,
    query: Result<Query<OrderSyncParams>, QueryRejection>,
) -> ApiResult<Json<Value>> {
    let Query(query) = query?;
    let (page, page_size) = PageQuery {
        page: query.page,
        page_size: query.page_size,
    }
    .resolve(state.default_page_size())?;

    let start_date = non_blank(query.start_date);
    let end_date = non_blank(query.end_date);
    if let Some(raw) = &start_date {
        parse_compact_date("start_date", raw)?;
    }
    if let Some(raw) = &end_date {
        parse_compact_date("end_date", raw)?;
    }

    let mut params = OrderListQuery {
        page,
        page_size,
        start_date,
        end_date,
        ..Default::default()
    };
    if let Some(order_status) = non_blank(query.order_status) {
        params.order_status = order_status;
    }

    let client = state.client()?;
    let outcome = reconciler::pull_orders(client, &state.db.entity_store(), &params).await?;
    Ok(sync_summary(outcome))
}

// =============================================================================
// Helpers
// =============================================================================

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn start_of_day(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(NaiveTime::MIN).and_utc()
}

/// Exclusive upper bound for an inclusive end date.
fn day_after(date: NaiveDate) -> ApiResult<DateTime<Utc>> {
    date.checked_add_days(Days::new(1))
        .map(start_of_day)
        .ok_or_else(|| ApiError::validation("end_date is out of range"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_end_date_is_inclusive() {
        let end = NaiveDate::from_ymd_opt(2024, 2, 29).unwrap();
        assert_eq!(
            day_after(end).unwrap(),
            NaiveDate::from_ymd_opt(2024, 3, 1).unwrap().and_time(NaiveTime::MIN).and_utc()
        );
    }

    #[test]
    fn test_non_blank() {
        assert_eq!(non_blank(Some("  ".into())), None);
        assert_eq!(non_blank(Some(" shipped ".into())), Some("shipped".into()));
        assert_eq!(non_blank(None), None);
    }
}
