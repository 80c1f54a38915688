//! # API Error Handling
//!
//! Every failure leaves the service as one JSON shape.
//!
//! ## Error Response Format
//! ```json
//! {
//!   "status": "error",
//!   "code": "REMOTE_ERROR",
//!   "message": "Remote API error on /api/v1/product/list (HTTP 401): bad signature",
//!   "remote_code": "AUTH_FAILED"
//! }
//! ```
//!
//! ## Status Mapping
//! ```text
//! ┌──────────────────────────┬────────┐
//! │ ErrorCode                │ HTTP   │
//! ├──────────────────────────┼────────┤
//! │ VALIDATION_ERROR         │ 400    │
//! │ INVALID_CREDENTIAL       │ 400    │
//! │ NOT_FOUND                │ 404    │
//! │ CONFLICT                 │ 409    │
//! │ REMOTE_ERROR             │ 502    │
//! │ TRANSPORT_ERROR          │ 502    │
//! │ CONFIGURATION_ERROR      │ 503    │
//! │ DATABASE_ERROR, INTERNAL │ 500    │
//! └──────────────────────────┴────────┘
//! ```

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use serde_json::json;

use ruten_core::{ConfigurationError, CoreError, StoreError, ValidationError};
use ruten_db::DbError;
use ruten_sync::{ClientError, ServiceError, SyncError};

pub type ApiResult<T> = Result<T, ApiError>;

/// Error returned by every handler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApiError {
    /// Machine-readable error code for programmatic handling
    pub code: ErrorCode,

    /// Human-readable error message for display
    pub message: String,

    /// The marketplace's own error code, when it sent one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remote_code: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    ValidationError,
    /// An incomplete credential handed in for verification
    InvalidCredential,
    NotFound,
    Conflict,
    /// The marketplace answered with a rejection
    RemoteError,
    /// The marketplace could not be reached or answered garbage
    TransportError,
    /// No usable default credential or settings
    ConfigurationError,
    DatabaseError,
    Internal,
}

impl ErrorCode {
    pub fn status(&self) -> StatusCode {
        match self {
            ErrorCode::ValidationError | ErrorCode::InvalidCredential => StatusCode::BAD_REQUEST,
            ErrorCode::NotFound => StatusCode::NOT_FOUND,
            ErrorCode::Conflict => StatusCode::CONFLICT,
            ErrorCode::RemoteError | ErrorCode::TransportError => StatusCode::BAD_GATEWAY,
            ErrorCode::ConfigurationError => StatusCode::SERVICE_UNAVAILABLE,
            ErrorCode::DatabaseError | ErrorCode::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl ApiError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        ApiError {
            code,
            message: message.into(),
            remote_code: None,
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        ApiError::new(ErrorCode::ValidationError, message)
    }

    pub fn not_found(resource: &str, id: &str) -> Self {
        ApiError::new(ErrorCode::NotFound, format!("{} not found: {}", resource, id))
    }

    pub fn internal(message: impl Into<String>) -> Self {
        ApiError::new(ErrorCode::Internal, message)
    }

    pub fn status(&self) -> StatusCode {
        self.code.status()
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{:?}] {}", self.code, self.message)
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut body = json!({
            "status": "error",
            "code": self.code,
            "message": self.message,
        });
        if let Some(remote_code) = self.remote_code {
            body["remote_code"] = json!(remote_code);
        }
        (self.code.status(), Json(body)).into_response()
    }
}

// =============================================================================
// Conversions
// =============================================================================

/// Malformed JSON bodies and query strings are validation errors, not
/// axum's plain-text rejections.
impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::validation(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::validation(rejection.body_text())
    }
}

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> Self {
        ApiError::validation(err.to_string())
    }
}

impl From<ConfigurationError> for ApiError {
    fn from(err: ConfigurationError) -> Self {
        ApiError::new(ErrorCode::ConfigurationError, err.to_string())
    }
}

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::NotFound { entity, id } => ApiError::not_found(&entity, &id),
            CoreError::Conflict(message) => ApiError::new(ErrorCode::Conflict, message),
            CoreError::Validation(e) => e.into(),
        }
    }
}

impl From<DbError> for ApiError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound { entity, id } => ApiError::not_found(&entity, &id),
            DbError::UniqueViolation { field, value } => ApiError::new(
                ErrorCode::Conflict,
                format!("{} '{}' already exists", field, value),
            ),
            DbError::ForeignKeyViolation { message } => {
                tracing::warn!("Foreign key violation: {}", message);
                ApiError::validation("Invalid reference")
            }
            DbError::ConstraintViolation { message } => ApiError::validation(message),
            other => {
                // Log the actual error but return a generic message
                tracing::error!(error = %other, "Database operation failed");
                ApiError::new(ErrorCode::DatabaseError, "Database operation failed")
            }
        }
    }
}

impl From<ClientError> for ApiError {
    fn from(err: ClientError) -> Self {
        match err {
            ClientError::Configuration(e) => e.into(),
            ClientError::RemoteApi { ref code, .. } => {
                let remote_code = code.clone();
                ApiError {
                    code: ErrorCode::RemoteError,
                    message: err.to_string(),
                    remote_code,
                }
            }
            ClientError::Transport { .. } => {
                ApiError::new(ErrorCode::TransportError, err.to_string())
            }
            ClientError::MissingFile { .. } | ClientError::InvalidRequest(_) => {
                ApiError::validation(err.to_string())
            }
        }
    }
}

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Core(e) => e.into(),
            ServiceError::Database(e) => e.into(),
            ServiceError::Remote(e) => e.into(),
        }
    }
}

impl From<SyncError> for ApiError {
    fn from(err: SyncError) -> Self {
        match err {
            SyncError::Client(e) => e.into(),
            SyncError::InvalidConfig(_) | SyncError::ConfigLoadFailed(_) => {
                ApiError::new(ErrorCode::ConfigurationError, err.to_string())
            }
            SyncError::Store(StoreError::Record(message)) => ApiError::validation(message),
            SyncError::Store(StoreError::Fatal(_)) | SyncError::PageRolledBack { .. } => {
                tracing::error!(error = %err, "Sync failed in the local store");
                ApiError::new(ErrorCode::DatabaseError, err.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ruten_core::EntityKind;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            ApiError::from(CoreError::Validation(ValidationError::Required {
                field: "title".into()
            })).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::from(CoreError::not_found("Product", "p1")).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::from(CoreError::Conflict("has children".into())).status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            ApiError::from(ConfigurationError::MissingCredential("RUTEN_API_KEY")).status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            ApiError::from(DbError::PoolExhausted).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_remote_error_keeps_marketplace_code() {
        let err = ApiError::from(SyncError::Client(ClientError::RemoteApi {
            endpoint: "/api/v1/product/list".into(),
            status: 401,
            code: Some("AUTH_FAILED".into()),
            message: "bad signature".into(),
        }));
        assert_eq!(err.status(), StatusCode::BAD_GATEWAY);
        assert_eq!(err.remote_code.as_deref(), Some("AUTH_FAILED"));
        assert!(err.message.contains("bad signature"));
    }

    #[test]
    fn test_transport_and_rollback() {
        let transport = ApiError::from(ClientError::Transport {
            endpoint: "/api/v1/order/list".into(),
            status: Some(503),
            message: "HTTP 503: <html>".into(),
            correlation_id: None,
        });
        assert_eq!(transport.code, ErrorCode::TransportError);
        assert_eq!(transport.status(), StatusCode::BAD_GATEWAY);

        let rolled_back = ApiError::from(SyncError::PageRolledBack {
            kind: EntityKind::Order,
            reason: "disk I/O error".into(),
        });
        assert_eq!(rolled_back.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_error_code_serializes_screaming_snake() {
        let value = serde_json::to_value(ErrorCode::InvalidCredential).unwrap();
        assert_eq!(value, "INVALID_CREDENTIAL");
    }
}
