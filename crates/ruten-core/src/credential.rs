//! # Credential Holder
//!
//! The three secrets needed to talk to the partner API.
//!
//! ## Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Where a Credential Comes From                        │
//! │                                                                         │
//! │  Explicit values                     Process environment               │
//! │  ───────────────                     ───────────────────               │
//! │  Credential::new(key, secret, salt)  Credential::from_env()            │
//! │                                        RUTEN_API_KEY                   │
//! │                                        RUTEN_SECRET_KEY                │
//! │                                        RUTEN_SALT_KEY                  │
//! │                                                                         │
//! │  The two sources are never merged. A missing component is a           │
//! │  ConfigurationError at construction, never at call time.               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::fmt;

use crate::error::ConfigurationError;

pub(crate) type HmacSha256 = Hmac<Sha256>;

/// Environment variable holding the identity key.
pub const ENV_API_KEY: &str = "RUTEN_API_KEY";

/// Environment variable holding the signing key.
pub const ENV_SECRET_KEY: &str = "RUTEN_SECRET_KEY";

/// Environment variable holding the salt.
pub const ENV_SALT_KEY: &str = "RUTEN_SALT_KEY";

/// An immutable credential triple.
///
/// `Debug` never prints the signing key or salt, and the identity key is
/// only shown as a short preview. The HMAC state is keyed once here so that
/// signing itself cannot fail.
#[derive(Clone)]
pub struct Credential {
    api_key: String,
    secret_key: String,
    salt_key: String,
    mac: HmacSha256,
}

impl Credential {
    /// Builds a credential from explicit values.
    ///
    /// ## Example
    /// ```rust
    /// use ruten_core::Credential;
    ///
    /// let cred = Credential::new("key", "secret", "salt").unwrap();
    /// assert_eq!(cred.api_key(), "key");
    /// assert!(Credential::new("key", "", "salt").is_err());
    /// ```
    pub fn new(
        api_key: impl Into<String>,
        secret_key: impl Into<String>,
        salt_key: impl Into<String>,
    ) -> Result<Self, ConfigurationError> {
        let api_key = required(api_key.into(), "api_key")?;
        let secret_key = required(secret_key.into(), "secret_key")?;
        let salt_key = required(salt_key.into(), "salt_key")?;

        Self::build(api_key, secret_key, salt_key)
    }

    /// Loads the credential from the process environment.
    pub fn from_env() -> Result<Self, ConfigurationError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Loads the credential through an arbitrary variable lookup.
    ///
    /// `from_env` is this with `std::env::var`; tests pass a closure over a
    /// map instead of touching the real environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigurationError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let api_key = lookup(ENV_API_KEY).ok_or(ConfigurationError::MissingCredential(ENV_API_KEY))?;
        let secret_key =
            lookup(ENV_SECRET_KEY).ok_or(ConfigurationError::MissingCredential(ENV_SECRET_KEY))?;
        let salt_key =
            lookup(ENV_SALT_KEY).ok_or(ConfigurationError::MissingCredential(ENV_SALT_KEY))?;

        let api_key = required(api_key, ENV_API_KEY)?;
        let secret_key = required(secret_key, ENV_SECRET_KEY)?;
        let salt_key = required(salt_key, ENV_SALT_KEY)?;

        Self::build(api_key, secret_key, salt_key)
    }

    fn build(
        api_key: String,
        secret_key: String,
        salt_key: String,
    ) -> Result<Self, ConfigurationError> {
        let mac = HmacSha256::new_from_slice(secret_key.as_bytes())
            .map_err(|e| ConfigurationError::Invalid(format!("signing key rejected: {}", e)))?;

        Ok(Credential {
            api_key,
            secret_key,
            salt_key,
            mac,
        })
    }

    /// The identity key sent as `X-RT-Key`.
    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    /// The HMAC signing key.
    pub fn secret_key(&self) -> &str {
        &self.secret_key
    }

    /// The salt prepended to every signed string.
    pub fn salt_key(&self) -> &str {
        &self.salt_key
    }

    /// First 8 characters of the identity key followed by `...`.
    pub fn api_key_preview(&self) -> String {
        preview(&self.api_key)
    }

    /// A fresh HMAC-SHA256 instance keyed with the signing key.
    pub(crate) fn keyed_mac(&self) -> HmacSha256 {
        self.mac.clone()
    }
}

impl PartialEq for Credential {
    fn eq(&self, other: &Self) -> bool {
        self.api_key == other.api_key
            && self.secret_key == other.secret_key
            && self.salt_key == other.salt_key
    }
}

impl Eq for Credential {}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("api_key", &self.api_key_preview())
            .field("secret_key", &"<redacted>")
            .field("salt_key", &"<redacted>")
            .finish()
    }
}

/// Returns a display-safe preview of an identity key.
pub fn preview(api_key: &str) -> String {
    let head: String = api_key.chars().take(8).collect();
    format!("{}...", head)
}

fn required(value: String, name: &'static str) -> Result<String, ConfigurationError> {
    if value.trim().is_empty() {
        return Err(ConfigurationError::MissingCredential(name));
    }
    Ok(value)
}
