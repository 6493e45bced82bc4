//! Application configuration management.
//!
//! This module handles loading and saving the application configuration:
//! backend URL, where tokens are persisted, refresh cadence and the last
//! used username.
//!
//! Configuration is stored at `~/.config/tradedash/config.json`.

use std::path::PathBuf;

use anyhow::Result;
use serde::{Deserialize, Serialize};

/// Application name used for config/cache directory paths
pub const APP_NAME: &str = "tradedash";

/// Config file name
const CONFIG_FILE: &str = "config.json";

/// Backend served by the dashboard's API process in development.
const DEFAULT_API_BASE_URL: &str = "http://localhost:8000";

/// Access tokens expire after 30 minutes; refresh with 5 minutes to spare.
const DEFAULT_REFRESH_INTERVAL_MINUTES: u64 = 25;

const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Environment variable overriding `api_base_url`
pub const API_URL_ENV: &str = "TRADEDASH_API_URL";

/// Where the access/refresh token pair is persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenStorage {
    /// `session.json` in the cache directory
    #[default]
    File,
    /// OS keychain
    Keyring,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub api_base_url: String,
    pub token_storage: TokenStorage,
    pub refresh_interval_minutes: u64,
    pub request_timeout_secs: u64,
    pub last_username: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            token_storage: TokenStorage::default(),
            refresh_interval_minutes: DEFAULT_REFRESH_INTERVAL_MINUTES,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            last_username: None,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        let mut config = if path.exists() {
            let contents = std::fs::read_to_string(&path)?;
            serde_json::from_str(&contents)?
        } else {
            Self::default()
        };
        config.apply_env();
        Ok(config)
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
            if !url.trim().is_empty() {
                self.api_base_url = url.trim().to_string();
            }
        }
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    pub fn cache_dir(&self) -> Result<PathBuf> {
        let cache_dir = dirs::cache_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find cache directory"))?;
        Ok(cache_dir.join(APP_NAME))
    }

    pub fn refresh_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.refresh_interval_minutes.max(1) * 60)
    }
}
