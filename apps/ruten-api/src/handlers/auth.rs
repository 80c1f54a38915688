//! Credential verification and status.
//!
//! Verifying alternate credentials builds a one-off client; the default
//! client and the process environment are left alone.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;
use serde::Deserialize;
use serde_json::Value;

use ruten_core::Credential;
use ruten_sync::verifier;

use super::success;
use crate::error::{ApiError, ApiResult, ErrorCode};
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct VerifyRequest {
    #[serde(default)]
    pub api_key: String,
    #[serde(default)]
    pub secret_key: String,
    #[serde(default)]
    pub salt_key: String,
}

/// Checks the given triple with one read-only marketplace call.
///
/// A rejected credential is still a 200 with `valid: false`; only an
/// incomplete triple is an error.
pub async fn verify(
    State(state): State<AppState>,
    payload: Result<Json<VerifyRequest>, JsonRejection>,
) -> ApiResult<Json<Value>> {
    let Json(body) = payload?;
    let credential = Credential::new(body.api_key, body.secret_key, body.salt_key)
        .map_err(|e| ApiError::new(ErrorCode::InvalidCredential, e.to_string()))?;

    let verification = verifier::verify(credential, &state.config.remote, state.sink.clone()).await;
    Ok(success(verification))
}

/// Whether a default credential is configured and accepted.
pub async fn status(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    let status = verifier::credential_status(state.client_or_reason()).await;
    Ok(success(status))
}
