//! # Validation Module
//!
//! Input validation for local mutations and list filters.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: HTTP handler (ruten-api)                                     │
//! │  ├── Type validation (serde deserialization)                           │
//! │  └── THIS MODULE: field rules before any write                         │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: Database (SQLite)                                            │
//! │  ├── NOT NULL / CHECK (stock >= 0) constraints                         │
//! │  └── UNIQUE (external_id) constraints                                  │
//! │                                                                         │
//! │  Records arriving from the marketplace skip layer 1: they are          │
//! │  decoded in `remote` and only the database rules apply.                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};

use crate::error::ValidationError;
use crate::money::Money;
use crate::types::ProductStatus;

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Longest accepted product title.
pub const MAX_TITLE_LEN: usize = 200;

/// Longest accepted category name.
pub const MAX_CATEGORY_NAME_LEN: usize = 100;

/// Largest page size the partner API accepts.
pub const MAX_PAGE_SIZE: u32 = 100;

// =============================================================================
// String Validators
// =============================================================================

/// Validates a product title.
///
/// ## Rules
/// - Must not be empty after trimming
/// - At most 200 characters
///
/// ## Example
/// ```rust
/// use ruten_core::validation::validate_title;
///
/// assert!(validate_title("Ceramic mug").is_ok());
/// assert!(validate_title("   ").is_err());
/// ```
pub fn validate_title(title: &str) -> ValidationResult<()> {
    validate_text("title", title, MAX_TITLE_LEN)
}

/// Validates a category name.
pub fn validate_category_name(name: &str) -> ValidationResult<()> {
    validate_text("name", name, MAX_CATEGORY_NAME_LEN)
}

fn validate_text(field: &str, value: &str, max: usize) -> ValidationResult<()> {
    let value = value.trim();

    if value.is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }

    if value.chars().count() > max {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max,
        });
    }

    Ok(())
}

// =============================================================================
// Numeric Validators
// =============================================================================

/// Validates a stock level.
pub fn validate_stock(stock: i64) -> ValidationResult<()> {
    if stock < 0 {
        return Err(ValidationError::MustNotBeNegative {
            field: "stock".to_string(),
        });
    }
    Ok(())
}

/// Validates a price or refund amount.
pub fn validate_amount(field: &str, amount: Money) -> ValidationResult<()> {
    if amount.is_negative() {
        return Err(ValidationError::MustNotBeNegative {
            field: field.to_string(),
        });
    }
    Ok(())
}

/// Validates pagination parameters.
///
/// ## Rules
/// - `page` starts at 1
/// - `page_size` between 1 and 100
pub fn validate_page(page: u32, page_size: u32) -> ValidationResult<()> {
    if page == 0 {
        return Err(ValidationError::InvalidFormat {
            field: "page".to_string(),
            reason: "must be at least 1".to_string(),
        });
    }
    if page_size == 0 || page_size > MAX_PAGE_SIZE {
        return Err(ValidationError::InvalidFormat {
            field: "page_size".to_string(),
            reason: format!("must be between 1 and {}", MAX_PAGE_SIZE),
        });
    }
    Ok(())
}

// =============================================================================
// Status Validators
// =============================================================================

/// Parses a status supplied by a local caller.
///
/// Unlike statuses pulled from the marketplace, local callers may only set
/// `online` or `offline`.
///
/// ## Example
/// ```rust
/// use ruten_core::validation::parse_local_status;
/// use ruten_core::ProductStatus;
///
/// assert_eq!(parse_local_status("online").unwrap(), ProductStatus::Online);
/// assert!(parse_local_status("deleted").is_err());
/// ```
pub fn parse_local_status(status: &str) -> ValidationResult<ProductStatus> {
    match status.trim() {
        "online" => Ok(ProductStatus::Online),
        "offline" => Ok(ProductStatus::Offline),
        _ => Err(ValidationError::NotAllowed {
            field: "status".to_string(),
            allowed: "online, offline".to_string(),
        }),
    }
}

// =============================================================================
// Date Parsing
// =============================================================================

/// Parses a `YYYYMMDD` filter date.
pub fn parse_compact_date(field: &str, value: &str) -> ValidationResult<NaiveDate> {
    let value = value.trim();
    if value.len() != 8 || !value.chars().all(|c| c.is_ascii_digit()) {
        return Err(ValidationError::InvalidFormat {
            field: field.to_string(),
            reason: "expected YYYYMMDD".to_string(),
        });
    }

    NaiveDate::parse_from_str(value, "%Y%m%d").map_err(|e| ValidationError::InvalidFormat {
        field: field.to_string(),
        reason: e.to_string(),
    })
}

/// Parses a date as the marketplace sends it.
///
/// Tries `2024-01-31 13:45:00` first, then `20240131` (midnight). Both are
/// read as UTC. Anything else yields `None`; callers leave the field unset.
///
/// ## Example
/// ```rust
/// use ruten_core::validation::parse_remote_datetime;
///
/// assert!(parse_remote_datetime("2024-01-31 13:45:00").is_some());
/// assert!(parse_remote_datetime("20240131").is_some());
/// assert!(parse_remote_datetime("31/01/2024").is_none());
/// ```
pub fn parse_remote_datetime(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();

    if let Ok(dt) = NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S") {
        return Some(Utc.from_utc_datetime(&dt));
    }

    if value.len() == 8 {
        if let Ok(date) = NaiveDate::parse_from_str(value, "%Y%m%d") {
            return date.and_hms_opt(0, 0, 0).map(|dt| Utc.from_utc_datetime(&dt));
        }
    }

    None
}

// =============================================================================
// Unit Tests
// =============================================================================
