//! Application configuration management.
//!
//! This module handles loading and saving the application configuration,
//! which includes the API base URL, request timeout, credential backend,
//! and last used email.
//!
//! Configuration is stored at `~/.config/liveshop/config.json`.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::api::client::REQUEST_TIMEOUT_SECS;
use crate::auth::{CredentialStore, FileStore, KeyringStore, MemoryStore};

/// Application name used for config/cache directory paths
const APP_NAME: &str = "liveshop";

/// Config file name
const CONFIG_FILE: &str = "config.json";

/// Environment variable overriding the API base URL
pub const API_URL_ENV: &str = "LIVESHOP_API_URL";

const DEFAULT_API_BASE_URL: &str = "http://localhost:3000/api";

/// Where session credentials are persisted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CredentialBackend {
    #[default]
    Keyring,
    File,
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub api_base_url: Option<String>,
    pub request_timeout_secs: u64,
    pub credential_backend: CredentialBackend,
    pub last_email: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: None,
            request_timeout_secs: REQUEST_TIMEOUT_SECS,
            credential_backend: CredentialBackend::default(),
            last_email: None,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        if path.exists() {
            let contents = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read config file {}", path.display()))?;
            serde_json::from_str(&contents).context("Failed to parse config file")
        } else {
            Ok(Self::default())
        }
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

    /// Apply environment overrides
    pub fn with_env(mut self) -> Self {
        if let Ok(url) = std::env::var(API_URL_ENV) {
            if !url.trim().is_empty() {
                self.api_base_url = Some(url);
            }
        }
        self
    }

    pub fn api_base_url(&self) -> &str {
        self.api_base_url.as_deref().unwrap_or(DEFAULT_API_BASE_URL)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
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

    /// Open the configured credential backend
    pub fn credential_store(&self) -> Result<Arc<dyn CredentialStore>> {
        let store: Arc<dyn CredentialStore> = match self.credential_backend {
            CredentialBackend::Keyring => Arc::new(KeyringStore::new()),
            CredentialBackend::File => Arc::new(FileStore::new(&self.cache_dir()?)),
            CredentialBackend::Memory => Arc::new(MemoryStore::new()),
        };
        Ok(store)
    }
}
