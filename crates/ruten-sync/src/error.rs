//! # Sync Error Types
//!
//! Error types for remote calls and sync operations.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Sync Error Categories                             │
//! │                                                                         │
//! │  ClientError (one remote call)                                         │
//! │  ┌─────────────────┐  ┌─────────────────┐  ┌─────────────────────────┐ │
//! │  │  Configuration  │  │   Transport     │  │     RemoteApi           │ │
//! │  │                 │  │                 │  │                         │ │
//! │  │  missing key    │  │  DNS / connect  │  │  non-2xx with JSON      │ │
//! │  │  bad base URL   │  │  timeout        │  │  2xx with status=fail   │ │
//! │  │                 │  │  HTML error page│  │  code + message kept    │ │
//! │  └─────────────────┘  └─────────────────┘  └─────────────────────────┘ │
//! │  ┌─────────────────┐  ┌─────────────────┐                              │
//! │  │  MissingFile    │  │ InvalidRequest  │  (rejected before sending)   │
//! │  └─────────────────┘  └─────────────────┘                              │
//! │                                                                         │
//! │  SyncError (one reconciliation or config load)                         │
//! │  ┌─────────────────┐  ┌─────────────────┐  ┌─────────────────────────┐ │
//! │  │  Config         │  │  Client(..)     │  │  PageRolledBack         │ │
//! │  │  InvalidConfig  │  │  fetching the   │  │  fatal store failure,   │ │
//! │  │  ConfigLoad     │  │  page failed    │  │  nothing persisted      │ │
//! │  └─────────────────┘  └─────────────────┘  └─────────────────────────┘ │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;

use ruten_core::{ConfigurationError, CoreError, EntityKind, StoreError, ValidationError};
use ruten_db::DbError;
use thiserror::Error;

/// Result type alias for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Result type alias for remote calls.
pub type ClientResult<T> = Result<T, ClientError>;

/// Result type alias for catalog service operations.
pub type ServiceResult<T> = Result<T, ServiceError>;

// =============================================================================
// Client Error
// =============================================================================

/// Failure of a single remote call.
///
/// The transport never retries; every variant reaches the caller.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClientError {
    /// The client could not be built, or was never configured.
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    /// The request never reached the marketplace, or the answer was unreadable.
    ///
    /// ## When This Occurs
    /// - DNS, connect or read timeout
    /// - Non-2xx answer whose body is not JSON (proxy error pages)
    /// - 2xx answer whose body is not JSON
    #[error("Transport error on {endpoint}: {message}")]
    Transport {
        endpoint: String,
        status: Option<u16>,
        message: String,
        correlation_id: Option<String>,
    },

    /// The marketplace answered with a structured failure.
    #[error("Remote API error on {endpoint} (HTTP {status}{}): {message}", code.as_deref().map(|c| format!(", code {}", c)).unwrap_or_default())]
    RemoteApi {
        endpoint: String,
        status: u16,
        code: Option<String>,
        message: String,
    },

    /// A file named for upload does not exist. Nothing was sent.
    #[error("File not found: {}", path.display())]
    MissingFile { path: PathBuf },

    /// The request was rejected locally before signing.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl ClientError {
    /// True when the call never produced an interpretable answer.
    pub fn is_transport(&self) -> bool {
        matches!(self, ClientError::Transport { .. })
    }

    /// True when the marketplace rejected the call.
    pub fn is_remote(&self) -> bool {
        matches!(self, ClientError::RemoteApi { .. })
    }

    /// HTTP status of the answer, when there was one.
    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::Transport { status, .. } => *status,
            ClientError::RemoteApi { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Marketplace error code, when one was given.
    pub fn remote_code(&self) -> Option<&str> {
        match self {
            ClientError::RemoteApi { code, .. } => code.as_deref(),
            _ => None,
        }
    }
}

// =============================================================================
// Sync Error
// =============================================================================

/// Sync error type covering configuration loading and reconciliation.
#[derive(Debug, Error)]
pub enum SyncError {
    // =========================================================================
    // Configuration Errors
    // =========================================================================
    /// Invalid sync configuration.
    #[error("Invalid sync configuration: {0}")]
    InvalidConfig(String),

    /// Failed to load config file.
    #[error("Failed to load config: {0}")]
    ConfigLoadFailed(String),

    // =========================================================================
    // Remote Errors
    // =========================================================================
    /// Fetching the page from the marketplace failed. No local changes.
    #[error(transparent)]
    Client(#[from] ClientError),

    // =========================================================================
    // Store Errors
    // =========================================================================
    /// The store could not open a page transaction. No local changes.
    #[error("Store unavailable: {0}")]
    Store(#[from] StoreError),

    /// A fatal store failure forced the whole page to be rolled back.
    #[error("Sync of {kind} page rolled back: {reason}")]
    PageRolledBack { kind: EntityKind, reason: String },
}

impl SyncError {
    /// Checks if this error might succeed if retried.
    ///
    /// Only transport-level failures qualify. Nothing in this crate retries
    /// on its own; callers decide.
    pub fn is_retryable(&self) -> bool {
        matches!(self, SyncError::Client(ClientError::Transport { .. }))
    }

    /// Checks if this is a configuration error (user action required).
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            SyncError::InvalidConfig(_)
                | SyncError::ConfigLoadFailed(_)
                | SyncError::Client(ClientError::Configuration(_))
        )
    }
}

// =============================================================================
// Service Error
// =============================================================================

/// Failure of the local step of a catalog operation.
///
/// Remote failures during outward propagation are not errors; they come back
/// as a degraded mirror status. `Remote` is only used by operations that are
/// purely remote (image upload, order detail).
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Database(#[from] DbError),

    #[error(transparent)]
    Remote(#[from] ClientError),
}

impl From<ValidationError> for ServiceError {
    fn from(err: ValidationError) -> Self {
        ServiceError::Core(CoreError::Validation(err))
    }
}

// =============================================================================
// Error Conversions
// =============================================================================

impl From<url::ParseError> for SyncError {
    fn from(err: url::ParseError) -> Self {
        SyncError::InvalidConfig(format!("invalid URL: {}", err))
    }
}

impl From<toml::de::Error> for SyncError {
    fn from(err: toml::de::Error) -> Self {
        SyncError::ConfigLoadFailed(err.to_string())
    }
}
