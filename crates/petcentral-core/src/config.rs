//! Application configuration management.
//!
//! This module handles loading and saving the console configuration: the API
//! base address, endpoint paths, session storage backend, probe settings and
//! the last email used to log in.
//!
//! Configuration is stored at `~/.config/petcentral/config.json`.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::auth::{FileStore, KeyValueStore, KeyringStore};

/// Application name used for config/cache directory paths
const APP_NAME: &str = "petcentral";

/// Config file name
const CONFIG_FILE: &str = "config.json";

/// Production API origin
pub const DEFAULT_API_BASE_URL: &str = "https://petsocial.onrender.com";

/// Login endpoint relative to the base address
pub const DEFAULT_LOGIN_PATH: &str = "/api/auth/login";

/// Unauthenticated endpoint used to check reachability
pub const DEFAULT_HEALTH_PATH: &str = "/weatherforecast";

/// HTTP request timeout in seconds.
/// The hosted API cold-starts slowly, 30s covers a spin-up.
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Delay between availability checks while the API is down
const DEFAULT_PROBE_INTERVAL_MS: u64 = 5000;

/// Environment variable overriding `api_base_url`
pub const API_URL_ENV: &str = "PETCENTRAL_API_URL";

/// Environment variable overriding `storage` (`file` or `keyring`)
pub const STORAGE_ENV: &str = "PETCENTRAL_STORAGE";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    File,
    Keyring,
}

impl StorageBackend {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "file" => Some(Self::File),
            "keyring" | "keychain" => Some(Self::Keyring),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProbeConfig {
    pub interval_ms: u64,
    /// Keep polling after the first successful check
    pub continuous: bool,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            interval_ms: DEFAULT_PROBE_INTERVAL_MS,
            continuous: false,
        }
    }
}

impl ProbeConfig {
    /// Polling interval. Zero is not a valid period and reads as the default.
    pub fn interval(&self) -> Duration {
        if self.interval_ms == 0 {
            tracing::warn!(
                fallback_ms = DEFAULT_PROBE_INTERVAL_MS,
                "probe.interval_ms is 0, using default"
            );
            return Duration::from_millis(DEFAULT_PROBE_INTERVAL_MS);
        }
        Duration::from_millis(self.interval_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub api_base_url: String,
    pub login_path: String,
    pub health_path: String,
    pub request_timeout_secs: u64,
    pub storage: StorageBackend,
    pub probe: ProbeConfig,
    pub last_email: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            login_path: DEFAULT_LOGIN_PATH.to_string(),
            health_path: DEFAULT_HEALTH_PATH.to_string(),
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            storage: StorageBackend::default(),
            probe: ProbeConfig::default(),
            last_email: None,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file {}", path.display()))?;
            serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse config file {}", path.display()))
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    pub fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    pub fn cache_dir(&self) -> Result<PathBuf> {
        let cache_dir = dirs::cache_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find cache directory"))?;
        Ok(cache_dir.join(APP_NAME))
    }

    /// Apply `PETCENTRAL_*` environment overrides
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Apply overrides from an arbitrary lookup (the environment, in practice)
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup(API_URL_ENV).filter(|u| !u.trim().is_empty()) {
            self.api_base_url = url.trim().to_string();
        }
        if let Some(value) = lookup(STORAGE_ENV) {
            match StorageBackend::parse(&value) {
                Some(storage) => self.storage = storage,
                None => tracing::warn!(value = %value, "Ignoring unknown storage backend"),
            }
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Open the session store selected by `storage`
    pub fn open_store(&self) -> Result<Arc<dyn KeyValueStore>> {
        let store: Arc<dyn KeyValueStore> = match self.storage {
            StorageBackend::File => Arc::new(FileStore::new(self.cache_dir()?)),
            StorageBackend::Keyring => Arc::new(KeyringStore::new()),
        };
        Ok(store)
    }
}
