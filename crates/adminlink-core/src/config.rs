//! Client configuration management.
//!
//! Configuration is stored at `~/.config/adminlink/config.json` and can be
//! overridden from the environment (`ADMIN_API_BASE_URL`, `ADMIN_API_ORIGIN`).

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Application name used for config/cache directory paths
const APP_NAME: &str = "adminlink";

/// Config file name
const CONFIG_FILE: &str = "config.json";

/// Environment variable overriding the API base URL
pub const BASE_URL_ENV: &str = "ADMIN_API_BASE_URL";

/// Environment variable overriding the origin used for relative base URLs
pub const ORIGIN_ENV: &str = "ADMIN_API_ORIGIN";

const DEFAULT_BASE_URL: &str = "/api";
const DEFAULT_ORIGIN: &str = "http://localhost:3000";

/// Timeout for ordinary requests.
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Timeout for streaming/long-running requests.
const DEFAULT_STREAMING_TIMEOUT_SECS: u64 = 300;

/// Retries after the first attempt for network-level failures.
const DEFAULT_MAX_RETRIES: u32 = 3;

const DEFAULT_INITIAL_BACKOFF_MS: u64 = 1000;

/// Where tokens and the session ID are persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CredentialBackend {
    /// Process-local only; nothing survives a restart.
    Memory,
    /// OS keychain.
    #[default]
    Keyring,
    /// Passphrase-sealed file in the cache directory.
    EncryptedFile,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub base_url: String,
    pub origin: String,
    pub request_timeout_secs: u64,
    pub streaming_timeout_secs: u64,
    pub max_retries: u32,
    pub initial_backoff_ms: u64,
    pub conditional_requests: bool,
    pub credential_backend: CredentialBackend,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            origin: DEFAULT_ORIGIN.to_string(),
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            streaming_timeout_secs: DEFAULT_STREAMING_TIMEOUT_SECS,
            max_retries: DEFAULT_MAX_RETRIES,
            initial_backoff_ms: DEFAULT_INITIAL_BACKOFF_MS,
            conditional_requests: true,
            credential_backend: CredentialBackend::default(),
        }
    }
}

impl ClientConfig {
    /// Load the config file (if any) and apply environment overrides.
    pub fn load() -> Result<Self> {
        let mut config = Self::load_from(&Self::config_path()?)?;
        config.apply_env();
        Ok(config)
    }

    /// Read a config file, falling back to defaults when it does not exist.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        serde_json::from_str(&contents).context("Failed to parse config file")
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)
            .with_context(|| format!("Failed to write config file {}", path.display()))?;
        Ok(())
    }

    /// Override fields from the process environment.
    pub fn apply_env(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup(BASE_URL_ENV).filter(|v| !v.trim().is_empty()) {
            self.base_url = url;
        }
        if let Some(origin) = lookup(ORIGIN_ENV).filter(|v| !v.trim().is_empty()) {
            self.origin = origin;
        }
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    pub fn cache_dir() -> Result<PathBuf> {
        let cache_dir = dirs::cache_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find cache directory"))?;
        Ok(cache_dir.join(APP_NAME))
    }

    /// Absolute base URL, resolving a relative `base_url` against `origin`.
    pub fn resolved_base_url(&self) -> String {
        let base = self.base_url.trim();
        if base.starts_with("http://") || base.starts_with("https://") {
            return base.trim_end_matches('/').to_string();
        }
        let origin = self.origin.trim().trim_end_matches('/');
        let base = base.trim_matches('/');
        if base.is_empty() {
            origin.to_string()
        } else {
            format!("{}/{}", origin, base)
        }
    }

    /// Join a request path onto the base URL with exactly one separating slash.
    pub fn url_for(&self, path: &str) -> String {
        let base = self.resolved_base_url();
        let path = path.trim().trim_start_matches('/');
        if path.is_empty() {
            base
        } else {
            format!("{}/{}", base, path)
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn streaming_timeout(&self) -> Duration {
        Duration::from_secs(self.streaming_timeout_secs)
    }
}
