//! Application configuration management.
//!
//! Configuration is read from `~/.config/monarch-session/config.json` when
//! present, then overridden by environment variables (a `.env` file is
//! loaded by the binary before this runs).
//!
//! The encrypted-file passphrase only ever comes from the environment and
//! is never written back to disk.

use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::store::BackendKind;

/// Application name used for config/data directory paths
const APP_NAME: &str = "monarch-session";

/// Config file name
const CONFIG_FILE: &str = "config.json";

/// Encrypted session file name, used when no explicit path is configured
const SESSION_FILE: &str = "session.enc.json";

/// Keychain service name. Shared with the server that reads the session.
pub const DEFAULT_SERVICE_NAME: &str = "monarch-mcp-server";

pub const DEFAULT_API_URL: &str = "https://api.monarchmoney.com";

/// HTTP request timeout in seconds.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

pub const ENV_API_URL: &str = "MONARCH_API_URL";
pub const ENV_SERVICE: &str = "MONARCH_SESSION_SERVICE";
pub const ENV_BACKEND: &str = "MONARCH_SESSION_BACKEND";
pub const ENV_SESSION_FILE: &str = "MONARCH_SESSION_FILE";
pub const ENV_PASSPHRASE: &str = "MONARCH_SESSION_PASSPHRASE";
pub const ENV_TIMEOUT: &str = "MONARCH_REQUEST_TIMEOUT_SECS";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub api_url: String,
    pub service_name: String,
    pub backend: BackendKind,
    pub session_file: Option<PathBuf>,
    pub request_timeout_secs: u64,
    #[serde(skip)]
    pub passphrase: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            service_name: DEFAULT_SERVICE_NAME.to_string(),
            backend: BackendKind::Auto,
            session_file: None,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            passphrase: None,
        }
    }
}

impl Config {
    /// Load the config file (if any) and apply environment overrides.
    pub fn load() -> Result<Self> {
        let mut config = match Self::config_path() {
            Some(path) if path.exists() => {
                let contents = std::fs::read_to_string(&path)
                    .with_context(|| format!("Failed to read config file {}", path.display()))?;
                serde_json::from_str(&contents)
                    .with_context(|| format!("Failed to parse config file {}", path.display()))?
            }
            _ => Self::default(),
        };
        config.apply_env(|name| std::env::var(name).ok())?;
        Ok(config)
    }

    /// Apply overrides from a variable lookup. Empty values are ignored.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        if let Some(url) = get(ENV_API_URL) {
            self.api_url = url.trim_end_matches('/').to_string();
        }
        if let Some(service) = get(ENV_SERVICE) {
            self.service_name = service;
        }
        if let Some(backend) = get(ENV_BACKEND) {
            self.backend = backend
                .parse()
                .map_err(|e: String| anyhow::anyhow!(e))
                .with_context(|| format!("Invalid {}", ENV_BACKEND))?;
        }
        if let Some(path) = get(ENV_SESSION_FILE) {
            self.session_file = Some(PathBuf::from(path));
        }
        if let Some(passphrase) = lookup(ENV_PASSPHRASE).filter(|v| !v.is_empty()) {
            self.passphrase = Some(passphrase);
        }
        if let Some(timeout) = get(ENV_TIMEOUT) {
            self.request_timeout_secs = timeout
                .trim()
                .parse()
                .with_context(|| format!("Invalid {}: {}", ENV_TIMEOUT, timeout))?;
        }
        Ok(())
    }

    fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(APP_NAME).join(CONFIG_FILE))
    }

    /// Path of the encrypted session file fallback.
    pub fn session_file_path(&self) -> Option<PathBuf> {
        self.session_file
            .clone()
            .or_else(|| dirs::data_local_dir().map(|dir| dir.join(APP_NAME).join(SESSION_FILE)))
    }
}
