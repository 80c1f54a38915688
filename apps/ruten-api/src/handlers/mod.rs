//! # HTTP Handlers
//!
//! One module per resource. Handlers stay thin: parse the request, call the
//! catalog service / reconciler / client, wrap the result in an envelope.
//!
//! ## Response Envelopes
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  success   {"status": "success", "data": ...}                          │
//! │  degraded  {"status": "warning", "message": ..., "data": ...,          │
//! │             "remote_error": {"operation", "external_id", "code",       │
//! │                              "message"}}                               │
//! │  error     {"status": "error", "code": ..., "message": ...}            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! A degraded result is still a 200: the local change is committed.

pub mod auth;
pub mod categories;
pub mod health;
pub mod orders;
pub mod products;

use axum::Json;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{json, Value};

use ruten_core::validation::validate_page;
use ruten_core::{Money, ValidationError};
use ruten_sync::{MirrorStatus, Propagated, SyncOutcome};

use crate::error::{ApiError, ApiResult};

// =============================================================================
// Envelopes
// =============================================================================

pub(crate) fn success<T: Serialize>(data: T) -> Json<Value> {
    Json(json!({
        "status": "success",
        "data": data,
    }))
}

/// Wraps a committed local change, converting the record with `view`.
pub(crate) fn mirrored<T, D, F>(result: Propagated<T>, view: F) -> Json<Value>
where
    D: Serialize,
    F: FnOnce(T) -> D,
{
    let Propagated { record, mirror } = result;
    let data = view(record);
    match mirror {
        MirrorStatus::Mirrored => Json(json!({
            "status": "success",
            "synced_to_ruten": true,
            "data": data,
        })),
        MirrorStatus::LocalOnly => Json(json!({
            "status": "success",
            "synced_to_ruten": false,
            "data": data,
        })),
        MirrorStatus::Degraded(warning) => Json(json!({
            "status": "warning",
            "message": warning.to_string(),
            "data": data,
            "remote_error": {
                "operation": warning.operation,
                "external_id": warning.external_id,
                "code": warning.cause.remote_code(),
                "message": warning.cause.to_string(),
            },
        })),
    }
}

pub(crate) fn sync_summary(outcome: SyncOutcome) -> Json<Value> {
    success(json!({
        "kind": outcome.kind,
        "synced_count": outcome.processed_count,
        "inserted": outcome.inserted,
        "updated": outcome.updated,
        "errors": outcome.per_record_errors,
    }))
}

// =============================================================================
// Shared Request Parts
// =============================================================================

/// `?page=&page_size=`
#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}

impl PageQuery {
    /// Resolves the defaults and checks the bounds.
    pub fn resolve(&self, default_page_size: u32) -> ApiResult<(u32, u32)> {
        let page = self.page.unwrap_or(1);
        let page_size = self.page_size.unwrap_or(default_page_size);
        validate_page(page, page_size)?;
        Ok((page, page_size))
    }
}

/// `?sync_to_ruten=` for routes without a body.
#[derive(Debug, Default, Deserialize)]
pub struct SyncFlag {
    pub sync_to_ruten: Option<bool>,
}

pub(crate) fn page_count(total: i64, page_size: u32) -> i64 {
    let page_size = i64::from(page_size.max(1));
    (total + page_size - 1) / page_size
}

/// Reads a money field sent as a number or a numeric string.
pub(crate) fn money_field(field: &str, value: &Value) -> ApiResult<Money> {
    Money::from_json(value).map_err(|e| {
        ApiError::validation(format!("{}: {}", field, e))
    })
}

pub(crate) fn required(field: &str) -> ApiError {
    ValidationError::Required {
        field: field.to_string(),
    }
    .into()
}

/// Distinguishes an absent field (`None`) from an explicit `null`
/// (`Some(None)`).
pub(crate) fn double_option<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_defaults_and_bounds() {
        let query = PageQuery::default();
        assert_eq!(query.resolve(30).unwrap(), (1, 30));

        let query = PageQuery {
            page: Some(0),
            page_size: None,
        };
        assert!(query.resolve(30).is_err());

        let query = PageQuery {
            page: Some(2),
            page_size: Some(101),
        };
        assert!(query.resolve(30).is_err());
    }

    #[test]
    fn test_page_count_rounds_up() {
        assert_eq!(page_count(0, 30), 0);
        assert_eq!(page_count(30, 30), 1);
        assert_eq!(page_count(31, 30), 2);
    }

    #[test]
    fn test_money_field_accepts_number_and_string() {
        assert_eq!(money_field("price", &json!(199.5)).unwrap().cents(), 19950);
        assert_eq!(money_field("price", &json!("12")).unwrap().cents(), 1200);
        assert!(money_field("price", &json!(true)).is_err());
    }
}
