//! # Sync Configuration
//!
//! Settings for the remote client, sync paging and the local database.
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     RUTEN_BASE_URL=http://127.0.0.1:9000                               │
//! │     RUTEN_TIMEOUT_SECS=10                                              │
//! │     RUTEN_PAGE_SIZE=50                                                 │
//! │     RUTEN_LOG_RETENTION_DAYS=30                                        │
//! │     RUTEN_DATABASE_PATH=/var/lib/ruten/ruten.db                        │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     explicit path, or ~/.config/ruten-bridge/ruten.toml (Linux)        │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! │     https://partner.ruten.com.tw, 30 s timeout, 30 per page            │
//! │                                                                         │
//! │  Credentials are NOT part of this file. They come from explicit        │
//! │  values or RUTEN_API_KEY / RUTEN_SECRET_KEY / RUTEN_SALT_KEY.          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! [remote]
//! base_url = "https://partner.ruten.com.tw"
//! timeout_secs = 30
//!
//! [sync]
//! page_size = 30
//! log_retention_days = 30
//!
//! [database]
//! path = "/var/lib/ruten/ruten.db"
//! ```

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

use crate::error::{SyncError, SyncResult};
use ruten_core::validation::MAX_PAGE_SIZE;
use ruten_core::{DEFAULT_BASE_URL, DEFAULT_PAGE_SIZE, DEFAULT_TIMEOUT_SECS};

/// Config file name inside the project config directory.
pub const CONFIG_FILE_NAME: &str = "ruten.toml";

// =============================================================================
// Remote Settings
// =============================================================================

/// Where and how the partner API is reached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteSettings {
    /// Scheme and host of the partner API. Tests point this at a mock server.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Whole-request timeout, fixed per client.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

impl Default for RemoteSettings {
    fn default() -> Self {
        RemoteSettings {
            base_url: default_base_url(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl RemoteSettings {
    /// Settings pointing at `base_url` with the default timeout.
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        RemoteSettings {
            base_url: base_url.into(),
            ..Default::default()
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Parses and checks the base URL.
    pub fn parsed_base_url(&self) -> SyncResult<Url> {
        let url = Url::parse(&self.base_url)?;
        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(SyncError::InvalidConfig(format!(
                "base_url must start with http:// or https://, got: {}",
                self.base_url
            )));
        }
        if url.host_str().is_none() {
            return Err(SyncError::InvalidConfig(format!(
                "base_url has no host: {}",
                self.base_url
            )));
        }
        Ok(url)
    }
}

// =============================================================================
// Sync Settings
// =============================================================================

/// Paging of pulls from the marketplace, and call log retention.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncSettings {
    /// Records requested per page (1 to 100).
    #[serde(default = "default_page_size")]
    pub page_size: u32,

    /// Days of call log kept at startup; 0 keeps everything.
    #[serde(default = "default_log_retention_days")]
    pub log_retention_days: u32,
}

fn default_page_size() -> u32 {
    DEFAULT_PAGE_SIZE
}

fn default_log_retention_days() -> u32 {
    30
}

impl Default for SyncSettings {
    fn default() -> Self {
        SyncSettings {
            page_size: default_page_size(),
            log_retention_days: default_log_retention_days(),
        }
    }
}

// =============================================================================
// Database Settings
// =============================================================================

/// Location of the local SQLite file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseSettings {
    #[serde(default = "default_database_path")]
    pub path: PathBuf,
}

fn default_database_path() -> PathBuf {
    project_dirs()
        .map(|dirs| dirs.data_dir().join("ruten.db"))
        .unwrap_or_else(|| PathBuf::from("ruten.db"))
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        DatabaseSettings {
            path: default_database_path(),
        }
    }
}

// =============================================================================
// Main Sync Configuration
// =============================================================================

/// Complete configuration for the bridge.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncConfig {
    #[serde(default)]
    pub remote: RemoteSettings,

    #[serde(default)]
    pub sync: SyncSettings,

    #[serde(default)]
    pub database: DatabaseSettings,
}

impl SyncConfig {
    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file (explicit path, else the project config dir)
    /// 3. Environment variables
    ///
    /// An explicit path that does not exist is an error; a missing default
    /// file is not.
    pub fn load(config_path: Option<PathBuf>) -> SyncResult<Self> {
        let mut config = Self::default();

        match config_path {
            Some(path) => {
                if !path.exists() {
                    return Err(SyncError::ConfigLoadFailed(format!(
                        "config file not found: {}",
                        path.display()
                    )));
                }
                config = Self::read_file(&path)?;
            }
            None => {
                if let Some(path) = Self::default_config_path() {
                    if path.exists() {
                        config = Self::read_file(&path)?;
                    } else {
                        debug!(?path, "Config file not found, using defaults");
                    }
                }
            }
        }

        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Like [`SyncConfig::load`], falling back to defaults (plus environment
    /// overrides) when the file is unusable.
    pub fn load_or_default(config_path: Option<PathBuf>) -> Self {
        match Self::load(config_path) {
            Ok(config) => config,
            Err(e) => {
                warn!(?e, "Failed to load config, using defaults");
                let mut config = Self::default();
                config.apply_env_overrides();
                if let Err(e) = config.validate() {
                    warn!(?e, "Environment overrides are invalid, ignoring them");
                    return Self::default();
                }
                config
            }
        }
    }

    fn read_file(path: &std::path::Path) -> SyncResult<Self> {
        info!(?path, "Loading config from file");
        let contents = std::fs::read_to_string(path)
            .map_err(|e| SyncError::ConfigLoadFailed(format!("{}: {}", path.display(), e)))?;
        Ok(toml::from_str(&contents)?)
    }

    /// Validates the configuration.
    pub fn validate(&self) -> SyncResult<()> {
        self.remote.parsed_base_url()?;

        if self.remote.timeout_secs == 0 {
            return Err(SyncError::InvalidConfig(
                "timeout_secs must be greater than 0".into(),
            ));
        }

        if self.sync.page_size == 0 || self.sync.page_size > MAX_PAGE_SIZE {
            return Err(SyncError::InvalidConfig(format!(
                "page_size must be between 1 and {}",
                MAX_PAGE_SIZE
            )));
        }

        Ok(())
    }

    /// Applies environment variable overrides.
    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|name| std::env::var(name).ok());
    }

    /// Applies overrides from an arbitrary variable lookup.
    ///
    /// Unparseable numbers are logged and ignored.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup("RUTEN_BASE_URL") {
            debug!(url = %url, "Overriding base URL from environment");
            self.remote.base_url = url;
        }

        if let Some(raw) = lookup("RUTEN_TIMEOUT_SECS") {
            match raw.parse::<u64>() {
                Ok(secs) => self.remote.timeout_secs = secs,
                Err(_) => warn!(value = %raw, "Ignoring invalid RUTEN_TIMEOUT_SECS"),
            }
        }

        if let Some(raw) = lookup("RUTEN_PAGE_SIZE") {
            match raw.parse::<u32>() {
                Ok(size) => self.sync.page_size = size,
                Err(_) => warn!(value = %raw, "Ignoring invalid RUTEN_PAGE_SIZE"),
            }
        }

        if let Some(raw) = lookup("RUTEN_LOG_RETENTION_DAYS") {
            match raw.parse::<u32>() {
                Ok(days) => self.sync.log_retention_days = days,
                Err(_) => warn!(value = %raw, "Ignoring invalid RUTEN_LOG_RETENTION_DAYS"),
            }
        }

        if let Some(path) = lookup("RUTEN_DATABASE_PATH") {
            debug!(path = %path, "Overriding database path from environment");
            self.database.path = PathBuf::from(path);
        }
    }

    /// Returns the default config file path.
    pub fn default_config_path() -> Option<PathBuf> {
        project_dirs().map(|dirs| dirs.config_dir().join(CONFIG_FILE_NAME))
    }
}

fn project_dirs() -> Option<directories::ProjectDirs> {
    directories::ProjectDirs::from("tw", "ruten", "ruten-bridge")
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = SyncConfig::default();
        assert_eq!(config.remote.base_url, "https://partner.ruten.com.tw");
        assert_eq!(config.remote.timeout(), Duration::from_secs(30));
        assert_eq!(config.sync.page_size, 30);
        assert_eq!(config.sync.log_retention_days, 30);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: SyncConfig = toml::from_str("[sync]\npage_size = 50\n").unwrap();
        assert_eq!(config.sync.page_size, 50);
        assert_eq!(config.remote.timeout_secs, 30);
    }

    #[test]
    fn test_load_explicit_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[remote]\nbase_url = \"http://127.0.0.1:9999\"\ntimeout_secs = 5\n\n[database]\npath = \"/tmp/x.db\""
        )
        .unwrap();

        let config = SyncConfig::load(Some(file.path().to_path_buf())).unwrap();
        assert_eq!(config.remote.base_url, "http://127.0.0.1:9999");
        assert_eq!(config.remote.timeout_secs, 5);
        assert_eq!(config.database.path, PathBuf::from("/tmp/x.db"));
    }

    #[test]
    fn test_load_missing_explicit_file_fails() {
        let err = SyncConfig::load(Some(PathBuf::from("/definitely/not/here.toml"))).unwrap_err();
        assert!(err.is_config_error());
    }

    #[test]
    fn test_overrides() {
        let vars: HashMap<&str, &str> = [
            ("RUTEN_BASE_URL", "http://localhost:8081"),
            ("RUTEN_TIMEOUT_SECS", "nope"),
            ("RUTEN_PAGE_SIZE", "100"),
            ("RUTEN_LOG_RETENTION_DAYS", "7"),
        ]
        .into_iter()
        .collect();

        let mut config = SyncConfig::default();
        config.apply_overrides(|name| vars.get(name).map(|v| v.to_string()));

        assert_eq!(config.remote.base_url, "http://localhost:8081");
        assert_eq!(config.remote.timeout_secs, 30);
        assert_eq!(config.sync.page_size, 100);
        assert_eq!(config.sync.log_retention_days, 7);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validation() {
        let mut config = SyncConfig::default();
        config.remote.base_url = "ftp://example.com".to_string();
        assert!(config.validate().is_err());

        config.remote.base_url = "not a url".to_string();
        assert!(config.validate().is_err());

        let mut config = SyncConfig::default();
        config.remote.timeout_secs = 0;
        assert!(config.validate().is_err());

        let mut config = SyncConfig::default();
        config.sync.page_size = 101;
        assert!(config.validate().is_err());
    }
}
