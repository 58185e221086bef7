//! Application configuration management.
//!
//! This module handles loading and saving the application configuration,
//! which includes the service URLs, the session storage backend and the
//! last used username.
//!
//! Configuration is stored at `~/.config/configdesk/config.json`. Service
//! URLs and the storage backend can be overridden from the environment.

use std::path::PathBuf;
use std::str::FromStr;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::auth::{FileStorage, KeyringStorage, MemoryStorage, SessionStorage};

/// Application name used for config directory paths
const APP_NAME: &str = "configdesk";

/// Config file name
const CONFIG_FILE: &str = "config.json";

const DEFAULT_USER_API_URL: &str = "http://localhost:8081";
const DEFAULT_CONFIG_API_URL: &str = "http://localhost:8082";

/// HTTP request timeout in seconds.
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

pub const ENV_USER_API_URL: &str = "CONFIGDESK_USER_API_URL";
pub const ENV_CONFIG_API_URL: &str = "CONFIGDESK_CONFIG_API_URL";
pub const ENV_STORAGE: &str = "CONFIGDESK_STORAGE";

/// Where the session slot lives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    File,
    Keyring,
    Memory,
}

impl FromStr for StorageBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "file" => Ok(Self::File),
            "keyring" => Ok(Self::Keyring),
            "memory" => Ok(Self::Memory),
            other => Err(anyhow::anyhow!("Unknown storage backend: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub user_api_url: String,
    pub config_api_url: String,
    pub storage: StorageBackend,
    pub request_timeout_secs: u64,
    pub last_username: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            user_api_url: DEFAULT_USER_API_URL.to_string(),
            config_api_url: DEFAULT_CONFIG_API_URL.to_string(),
            storage: StorageBackend::default(),
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            last_username: None,
        }
    }
}

impl Config {
    /// Load the config file (defaults if missing) and apply env overrides
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        let mut config = if path.exists() {
            let contents = std::fs::read_to_string(&path)?;
            serde_json::from_str(&contents)?
        } else {
            Self::default()
        };
        config.apply_overrides(|key| std::env::var(key).ok())?;
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

    /// Apply overrides from a lookup function (the environment in practice)
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(ENV_USER_API_URL) {
            self.user_api_url = url;
        }
        if let Some(url) = lookup(ENV_CONFIG_API_URL) {
            self.config_api_url = url;
        }
        if let Some(storage) = lookup(ENV_STORAGE) {
            self.storage = storage.parse()?;
        }
        Ok(())
    }

    fn config_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join(CONFIG_FILE))
    }

    fn config_dir() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME))
    }

    /// Build the configured session storage backend
    pub fn session_storage(&self) -> Result<Box<dyn SessionStorage>> {
        Ok(match self.storage {
            StorageBackend::File => Box::new(FileStorage::new(Self::config_dir()?)),
            StorageBackend::Keyring => Box::new(KeyringStorage::new()?),
            StorageBackend::Memory => Box::new(MemoryStorage::new()),
        })
    }
}
