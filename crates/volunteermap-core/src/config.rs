//! Application configuration management.
//!
//! This module handles loading and saving the application configuration:
//! backend URLs, the image host API key, the last used email and cache
//! preferences.
//!
//! Configuration is stored at `~/.config/volunteermap/config.json`.
//! Environment variables (usually from a `.env` file) take precedence over
//! the file for the URLs and secrets.

use std::path::PathBuf;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::api::{DEFAULT_API_BASE_URL, DEFAULT_IMAGE_API_BASE_URL};

/// Application name used for config/cache directory paths
const APP_NAME: &str = "volunteermap";

/// Config file name
const CONFIG_FILE: &str = "config.json";

pub const API_URL_ENV: &str = "VOLUNTEERMAP_API_URL";
pub const IMAGE_API_KEY_ENV: &str = "IMGBB_API_KEY";
pub const CACHE_PASSPHRASE_ENV: &str = "VOLUNTEERMAP_CACHE_PASSPHRASE";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub api_base_url: String,
    pub image_api_base_url: String,
    pub image_api_key: Option<String>,
    pub last_email: Option<String>,
    /// Seal cached data with a passphrase-derived key
    pub encrypt_cache: bool,
    /// Skip the network and serve everything from the cache
    pub offline: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            image_api_base_url: DEFAULT_IMAGE_API_BASE_URL.to_string(),
            image_api_key: None,
            last_email: None,
            encrypt_cache: false,
            offline: false,
        }
    }
}

impl Config {
    /// Load the config file (or defaults) and apply environment overrides
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        let mut config: Self = if path.exists() {
            let contents = std::fs::read_to_string(&path)?;
            serde_json::from_str(&contents)?
        } else {
            Self::default()
        };
        config.apply_env(|name| std::env::var(name).ok());
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

    fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(url) = var(API_URL_ENV).filter(|v| !v.is_empty()) {
            self.api_base_url = url;
        }
        if let Some(key) = var(IMAGE_API_KEY_ENV).filter(|v| !v.is_empty()) {
            self.image_api_key = Some(key);
        }
    }

    /// Passphrase for the encrypted cache, only read from the environment
    pub fn cache_passphrase(&self) -> Option<String> {
        std::env::var(CACHE_PASSPHRASE_ENV).ok().filter(|v| !v.is_empty())
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
}
