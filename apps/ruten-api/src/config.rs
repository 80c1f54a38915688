//! Ruten API configuration module.
//!
//! The listener settings come from environment variables with fallback to
//! defaults. Everything about the marketplace and the database lives in
//! [`ruten_sync::SyncConfig`], whose TOML path can be named here.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Listener configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Address to bind (default: 0.0.0.0)
    pub bind: String,

    /// HTTP port (default: 8000)
    pub port: u16,

    /// Optional TOML file for the sync configuration
    pub config_path: Option<PathBuf>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        ApiConfig {
            bind: "0.0.0.0".to_string(),
            port: 8000,
            config_path: None,
        }
    }
}

impl ApiConfig {
    /// Load configuration from environment variables.
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Same as [`ApiConfig::load`] with an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = ApiConfig::default();

        let config = ApiConfig {
            bind: lookup("RUTEN_API_BIND")
                .filter(|v| !v.trim().is_empty())
                .unwrap_or(defaults.bind),

            port: match lookup("RUTEN_API_PORT") {
                Some(raw) => raw
                    .trim()
                    .parse()
                    .map_err(|_| ConfigError::InvalidValue("RUTEN_API_PORT".to_string()))?,
                None => defaults.port,
            },

            config_path: lookup("RUTEN_CONFIG")
                .filter(|v| !v.trim().is_empty())
                .map(PathBuf::from),
        };

        Ok(config)
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.bind, self.port)
    }
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {0}")]
    InvalidValue(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = ApiConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, ApiConfig::default());
        assert_eq!(config.bind_address(), "0.0.0.0:8000");
    }

    #[test]
    fn test_environment_values() {
        let config = ApiConfig::from_lookup(lookup(&[
            ("RUTEN_API_BIND", "127.0.0.1"),
            ("RUTEN_API_PORT", "9100"),
            ("RUTEN_CONFIG", "/etc/ruten/ruten.toml"),
        ]))
        .unwrap();
        assert_eq!(config.bind_address(), "127.0.0.1:9100");
        assert_eq!(config.config_path, Some(PathBuf::from("/etc/ruten/ruten.toml")));
    }

    #[test]
    fn test_invalid_port() {
        let err = ApiConfig::from_lookup(lookup(&[("RUTEN_API_PORT", "eighty")])).unwrap_err();
        assert!(err.to_string().contains("RUTEN_API_PORT"));
    }
}
