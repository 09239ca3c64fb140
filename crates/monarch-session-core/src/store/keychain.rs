//! OS keychain backend (macOS Keychain, Windows Credential Manager,
//! Linux Secret Service).

use keyring::Entry;
use tracing::debug;

use super::{SecretStore, StorageError, StorageResult};

pub struct KeyringStore {
    service: String,
}

impl KeyringStore {
    pub fn new(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
        }
    }

    fn entry(&self, key: &str) -> StorageResult<Entry> {
        Ok(Entry::new(&self.service, key)?)
    }

    /// Check that the keychain answers at all. A missing entry counts as usable.
    pub fn probe(&self, key: &str) -> StorageResult<()> {
        probe_entry(&self.entry(key)?).map_err(|e| {
            debug!(service = %self.service, error = %e, "Keychain probe failed");
            e
        })
    }
}

fn probe_entry(entry: &Entry) -> StorageResult<()> {
    match entry.get_password() {
        Ok(_) | Err(keyring::Error::NoEntry) => Ok(()),
        Err(e) => Err(StorageError::Unavailable(e.to_string())),
    }
}

fn read_entry(entry: &Entry) -> StorageResult<Option<String>> {
    match entry.get_password() {
        Ok(value) => Ok(Some(value)),
        Err(keyring::Error::NoEntry) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

fn delete_entry(entry: &Entry) -> StorageResult<bool> {
    match entry.delete_credential() {
        Ok(()) => Ok(true),
        Err(keyring::Error::NoEntry) => Ok(false),
        Err(e) => Err(e.into()),
    }
}

impl SecretStore for KeyringStore {
    fn set(&self, key: &str, value: &str) -> StorageResult<()> {
        self.entry(key)?.set_password(value)?;
        Ok(())
    }

    fn get(&self, key: &str) -> StorageResult<Option<String>> {
        read_entry(&self.entry(key)?)
    }

    fn delete(&self, key: &str) -> StorageResult<bool> {
        delete_entry(&self.entry(key)?)
    }

    fn describe(&self) -> String {
        format!("system keychain ({})", self.service)
    }
}
