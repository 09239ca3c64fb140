//! Secure session storage.
//!
//! This module provides:
//! - `SecretStore`: key/value secret backend abstraction
//! - `KeyringStore`: OS keychain via the `keyring` crate
//! - `EncryptedFileStore`: passphrase-encrypted file fallback
//! - `MemoryStore`: process-local store, nothing persisted
//! - `SessionStore`: single fixed-key session token on top of a backend
//!
//! `select_backend` picks the backend at startup from configuration.

mod error;
mod file;
mod keychain;
mod memory;
mod session;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::Config;

pub use error::{StorageError, StorageResult};
pub use file::EncryptedFileStore;
pub use keychain::KeyringStore;
pub use memory::MemoryStore;
pub use session::{SessionSource, SessionStore, SessionToken, SESSION_TOKEN_KEY};

/// Key/value secret backend.
pub trait SecretStore: Send + Sync {
    /// Store a value, replacing any existing one.
    fn set(&self, key: &str, value: &str) -> StorageResult<()>;

    /// Get a value. `Ok(None)` when absent.
    fn get(&self, key: &str) -> StorageResult<Option<String>>;

    /// Delete a value. Returns whether it existed.
    fn delete(&self, key: &str) -> StorageResult<bool>;

    /// Human-readable backend label for reports and logs.
    fn describe(&self) -> String;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    #[default]
    Auto,
    Keyring,
    File,
    Memory,
}

impl FromStr for BackendKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "keyring" | "keychain" => Ok(Self::Keyring),
            "file" => Ok(Self::File),
            "memory" => Ok(Self::Memory),
            other => Err(format!("unknown session backend: {}", other)),
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Auto => "auto",
            Self::Keyring => "keyring",
            Self::File => "file",
            Self::Memory => "memory",
        };
        f.write_str(name)
    }
}

/// Outcome of backend selection.
pub struct BackendSelection {
    pub store: SessionStore,
    pub kind: BackendKind,
    /// Why a weaker backend was chosen, when `auto` had to fall back.
    pub fallback_reason: Option<String>,
}

/// Pick the session backend described by `config`, probing the OS keychain.
pub fn select_backend(config: &Config) -> StorageResult<BackendSelection> {
    select_backend_with(config, |store| store.probe(SESSION_TOKEN_KEY))
}

fn select_backend_with<F>(config: &Config, probe: F) -> StorageResult<BackendSelection>
where
    F: Fn(&KeyringStore) -> StorageResult<()>,
{
    let keyring = || KeyringStore::new(config.service_name.clone());
    let file = || -> StorageResult<EncryptedFileStore> {
        let passphrase = config
            .passphrase
            .clone()
            .ok_or(StorageError::MissingPassphrase)?;
        let path = config.session_file_path().ok_or_else(|| {
            StorageError::Unavailable("could not determine data directory".to_string())
        })?;
        EncryptedFileStore::new(path, passphrase)
    };

    let selection = match config.backend {
        BackendKind::Keyring => {
            let store = keyring();
            probe(&store)?;
            durable(Box::new(store), BackendKind::Keyring)
        }
        BackendKind::File => durable(Box::new(file()?), BackendKind::File),
        BackendKind::Memory => BackendSelection {
            store: SessionStore::new(Box::new(MemoryStore::new()), false),
            kind: BackendKind::Memory,
            fallback_reason: None,
        },
        BackendKind::Auto => {
            let store = keyring();
            match probe(&store) {
                Ok(()) => durable(Box::new(store), BackendKind::Keyring),
                Err(keyring_err) => {
                    warn!(error = %keyring_err, "System keychain unavailable");
                    match file() {
                        Ok(store) => BackendSelection {
                            store: SessionStore::new(Box::new(store), true),
                            kind: BackendKind::File,
                            fallback_reason: Some(format!(
                                "system keychain unavailable ({})",
                                keyring_err
                            )),
                        },
                        Err(file_err) => {
                            warn!(error = %file_err, "No durable session storage available");
                            BackendSelection {
                                store: SessionStore::new(Box::new(MemoryStore::new()), false),
                                kind: BackendKind::Memory,
                                fallback_reason: Some(format!(
                                    "system keychain unavailable ({}) and no encrypted file fallback ({})",
                                    keyring_err, file_err
                                )),
                            }
                        }
                    }
                }
            }
        }
    };

    debug!(
        requested = %config.backend,
        selected = %selection.kind,
        backend = %selection.store.backend(),
        "Session backend selected"
    );
    Ok(selection)
}

fn durable(store: Box<dyn SecretStore>, kind: BackendKind) -> BackendSelection {
    BackendSelection {
        store: SessionStore::new(store, true),
        kind,
        fallback_reason: None,
    }
}
