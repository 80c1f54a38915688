//! # Error Types
//!
//! Domain-specific error types for ruten-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  ruten-core errors (this file)                                         │
//! │  ├── CoreError           - General domain errors                       │
//! │  ├── ValidationError     - Input validation failures                   │
//! │  ├── ConfigurationError  - Missing/invalid credential material         │
//! │  └── DecodeError         - Remote record could not be decoded          │
//! │                                                                         │
//! │  store errors (store.rs)                                               │
//! │  └── StoreError          - Record-level vs fatal persistence failures  │
//! │                                                                         │
//! │  ruten-db / ruten-sync errors (separate crates)                        │
//! │  ├── DbError             - Database operation failures                 │
//! │  └── ClientError         - Signed request failures                     │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → ApiError → HTTP response          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

// =============================================================================
// Core Error
// =============================================================================

/// Core business logic errors.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A local record cannot be found.
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// The operation conflicts with the current state of the record.
    ///
    /// ## When This Occurs
    /// - Deleting a category that still has child categories
    /// - Uploading images for a product that was never pushed to the remote
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

impl CoreError {
    /// Creates a NotFound error.
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        CoreError::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value must not be negative.
    #[error("{field} must not be negative")]
    MustNotBeNegative { field: String },

    /// Value is not one of the accepted options.
    #[error("{field} must be one of: {allowed}")]
    NotAllowed { field: String, allowed: String },

    /// Invalid format (e.g., malformed amount, bad date).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },
}

// =============================================================================
// Configuration Error
// =============================================================================

/// Configuration problems detected while building a client.
///
/// ## When This Occurs
/// - One of the three credential components is missing or blank
/// - The remote base URL does not parse
///
/// These are never retryable: the process has to be reconfigured.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigurationError {
    /// A credential component is absent.
    #[error("Missing credential component: {0}")]
    MissingCredential(&'static str),

    /// Any other invalid setting.
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

// =============================================================================
// Decode Error
// =============================================================================

/// A remote record could not be turned into a [`crate::remote::RemoteRecord`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// The payload element was not a JSON object.
    #[error("record is not a JSON object")]
    NotAnObject,

    /// The join key is missing or empty.
    #[error("missing external id field '{0}'")]
    MissingExternalId(&'static str),

    /// A field is present with the wrong shape.
    #[error("invalid field '{field}': {reason}")]
    InvalidField { field: &'static str, reason: String },
}

/// Result alias for core operations.
pub type CoreResult<T> = Result<T, CoreError>;
