//! # Money Module
//!
//! Provides the `Money` type for prices and order totals.
//!
//! ## Why Integer Money?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  THE FLOATING POINT PROBLEM                                             │
//! │                                                                         │
//! │  The partner API sends prices as JSON numbers or strings:              │
//! │    "price": 199.5      "total_amount": "1280.00"                       │
//! │                                                                         │
//! │  Parsing those through f64 and back invites drift:                     │
//! │    0.1 + 0.2 = 0.30000000000000004                                      │
//! │                                                                         │
//! │  OUR SOLUTION: Integer Cents, parsed from the decimal TEXT             │
//! │    "199.5"  → 19950 cents                                               │
//! │    1280     → 128000 cents                                              │
//! │    Floats only appear when a value is written back onto the wire.     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use ruten_core::money::Money;
//!
//! let price = Money::parse_decimal("199.5").unwrap();
//! assert_eq!(price.cents(), 19950);
//! assert_eq!(price.to_decimal_string(), "199.50");
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::ops::{Add, Sub};

use crate::error::ValidationError;

// =============================================================================
// Money Type
// =============================================================================

/// A monetary value in the smallest currency unit (cents).
///
/// ## Design Decisions
/// - **i64 (signed)**: refunds can be represented as negative amounts
/// - **Single field tuple struct**: zero-cost abstraction over i64
/// - **Serialized as cents**: the local database and internal JSON use cents;
///   the remote wire format goes through [`Money::to_wire`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Money(i64);

impl Money {
    /// Creates a Money value from cents.
    ///
    /// ## Example
    /// ```rust
    /// use ruten_core::money::Money;
    ///
    /// let price = Money::from_cents(19950);
    /// assert_eq!(price.cents(), 19950);
    /// ```
    #[inline]
    pub const fn from_cents(cents: i64) -> Self {
        Money(cents)
    }

    /// Returns the value in cents.
    #[inline]
    pub const fn cents(&self) -> i64 {
        self.0
    }

    /// Returns zero money value.
    #[inline]
    pub const fn zero() -> Self {
        Money(0)
    }

    /// Checks if the value is zero.
    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Checks if the value is negative.
    #[inline]
    pub const fn is_negative(&self) -> bool {
        self.0 < 0
    }

    /// Parses a decimal amount such as `"199"`, `"199.5"` or `"-12.05"`.
    ///
    /// ## Rules
    /// - Optional leading `-` or `+`
    /// - At most two fractional digits (trailing zeros beyond that are allowed)
    /// - Surrounding whitespace is ignored
    /// - Exponent notation is rejected
    ///
    /// ## Example
    /// ```rust
    /// use ruten_core::money::Money;
    ///
    /// assert_eq!(Money::parse_decimal("1280.00").unwrap().cents(), 128000);
    /// assert!(Money::parse_decimal("12.345").is_err());
    /// assert!(Money::parse_decimal("abc").is_err());
    /// ```
    pub fn parse_decimal(input: &str) -> Result<Self, ValidationError> {
        let invalid = |reason: &str| ValidationError::InvalidFormat {
            field: "amount".to_string(),
            reason: format!("'{}' {}", input, reason),
        };

        let trimmed = input.trim();
        let (negative, digits) = match trimmed.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, trimmed.strip_prefix('+').unwrap_or(trimmed)),
        };

        let (major_str, minor_str) = match digits.split_once('.') {
            Some((major, minor)) => (major, minor),
            None => (digits, ""),
        };

        if major_str.is_empty() && minor_str.is_empty() {
            return Err(invalid("is not a number"));
        }
        if !major_str.chars().all(|c| c.is_ascii_digit())
            || !minor_str.chars().all(|c| c.is_ascii_digit())
        {
            return Err(invalid("is not a decimal number"));
        }

        // "12.500" is fine, "12.345" is not
        let significant_minor = minor_str.trim_end_matches('0');
        if significant_minor.len() > 2 {
            return Err(invalid("has more than two decimal places"));
        }

        let major: i64 = if major_str.is_empty() {
            0
        } else {
            major_str
                .parse()
                .map_err(|_| invalid("is out of range"))?
        };

        let minor: i64 = match significant_minor.len() {
            0 => 0,
            1 => significant_minor.parse::<i64>().map_err(|_| invalid("is malformed"))? * 10,
            _ => significant_minor.parse().map_err(|_| invalid("is malformed"))?,
        };

        let cents = major
            .checked_mul(100)
            .and_then(|c| c.checked_add(minor))
            .ok_or_else(|| invalid("is out of range"))?;

        Ok(Money(if negative { -cents } else { cents }))
    }

    /// Parses an amount from a JSON value (number or numeric string).
    ///
    /// Numbers go through their textual form, so `199.5` never touches
    /// floating point arithmetic on the way in.
    pub fn from_json(value: &Value) -> Result<Self, ValidationError> {
        match value {
            Value::Number(n) => Money::parse_decimal(&n.to_string()),
            Value::String(s) => Money::parse_decimal(s),
            other => Err(ValidationError::InvalidFormat {
                field: "amount".to_string(),
                reason: format!("expected number or numeric string, got {}", other),
            }),
        }
    }

    /// Formats the amount as a plain decimal string with two places.
    pub fn to_decimal_string(&self) -> String {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        format!("{}{}.{:02}", sign, abs / 100, abs % 100)
    }

    /// Converts the amount to the JSON number the partner API expects.
    ///
    /// Whole amounts are sent as integers (`199`), others as decimals
    /// (`199.5`). This is the only place money becomes a float.
    pub fn to_wire(&self) -> Value {
        if self.0 % 100 == 0 {
            Value::from(self.0 / 100)
        } else {
            Value::from(self.0 as f64 / 100.0)
        }
    }
}

// =============================================================================
// Trait Implementations
// =============================================================================

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NT${}", self.to_decimal_string())
    }
}

impl Default for Money {
    fn default() -> Self {
        Money::zero()
    }
}

impl Add for Money {
    type Output = Self;

    #[inline]
    fn add(self, other: Self) -> Self {
        Money(self.0 + other.0)
    }
}

impl Sub for Money {
    type Output = Self;

    #[inline]
    fn sub(self, other: Self) -> Self {
        Money(self.0 - other.0)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
