//! Application configuration management.
//!
//! This module handles loading and saving the application configuration,
//! which includes the API base URL, request timeout, login entry point and
//! where session tokens are stored.
//!
//! Configuration is stored at `~/.config/pocketbook/config.json`. The
//! `POCKETBOOK_API_URL` environment variable overrides the base URL.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::api::DEFAULT_LOGIN_PATH;
use crate::auth::{FileStorage, KeyringStorage, Session, Storage};

/// Application name used for config/data directory paths
const APP_NAME: &str = "pocketbook";

/// Config file name
const CONFIG_FILE: &str = "config.json";

/// Session file name in the data directory
const SESSION_FILE: &str = "session.json";

/// Environment variable overriding `api_base_url`
pub const API_URL_ENV: &str = "POCKETBOOK_API_URL";

const DEFAULT_API_BASE_URL: &str = "http://localhost:8000/api";

const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Keychain account used for the token entries
const KEYRING_ACCOUNT: &str = "session";

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    File,
    Keyring,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub api_base_url: String,
    pub request_timeout_secs: u64,
    pub login_path: String,
    pub storage: StorageBackend,
    pub last_email: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            login_path: DEFAULT_LOGIN_PATH.to_string(),
            storage: StorageBackend::File,
            last_email: None,
        }
    }
}

impl Config {
    /// Load the config file (defaults if missing), then apply environment overrides
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        let mut config = if path.exists() {
            let contents = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read config from {}", path.display()))?;
            Self::parse(&contents)?
        } else {
            Self::default()
        };
        config.apply_env();
        Ok(config)
    }

    pub fn parse(contents: &str) -> Result<Self> {
        serde_json::from_str(contents).context("Failed to parse config file")
    }

    pub fn save(&self) -> Result<()> {
        let path = Self::config_path()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    fn apply_env(&mut self) {
        if let Ok(url) = std::env::var(API_URL_ENV) {
            self.apply_api_url(&url);
        }
    }

    fn apply_api_url(&mut self, url: &str) {
        let url = url.trim();
        if !url.is_empty() {
            self.api_base_url = url.to_string();
        }
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    pub fn session_path(&self) -> Result<PathBuf> {
        let data_dir = dirs::data_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find data directory"))?;
        Ok(data_dir.join(APP_NAME).join(SESSION_FILE))
    }

    /// Open the session on the configured storage backend
    pub fn open_session(&self) -> Result<Session> {
        let storage: Arc<dyn Storage> = match self.storage {
            StorageBackend::File => Arc::new(FileStorage::new(self.session_path()?)),
            StorageBackend::Keyring => Arc::new(KeyringStorage::new(KEYRING_ACCOUNT)),
        };
        Ok(Session::new(storage))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_partial_config_uses_defaults() {
        let json = r#"{"api_base_url": "https://finance.example.com/api"}"#;
        let config = Config::parse(json).unwrap();
        assert_eq!(config.api_base_url, "https://finance.example.com/api");
        assert_eq!(config.request_timeout_secs, DEFAULT_REQUEST_TIMEOUT_SECS);
        assert_eq!(config.login_path, "/login");
        assert_eq!(config.storage, StorageBackend::File);
        assert!(config.last_email.is_none());
    }

    #[test]
    fn test_parse_keyring_backend() {
        let config = Config::parse(r#"{"storage": "keyring", "login_path": "/signin"}"#).unwrap();
        assert_eq!(config.storage, StorageBackend::Keyring);
        assert_eq!(config.login_path, "/signin");
    }

    #[test]
    fn test_parse_invalid_config() {
        assert!(Config::parse("{not json").is_err());
    }

    #[test]
    fn test_api_url_override_ignores_blank() {
        let mut config = Config::default();
        config.apply_api_url("   ");
        assert_eq!(config.api_base_url, DEFAULT_API_BASE_URL);

        config.apply_api_url(" https://staging.example.com/api ");
        assert_eq!(config.api_base_url, "https://staging.example.com/api");
    }
}
