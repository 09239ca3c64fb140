//! Encrypted file backend for hosts without a usable keychain.
//!
//! Each value is sealed with ChaCha20-Poly1305 under a key derived from a
//! passphrase with Argon2id. Salt and nonce are fresh on every write, so
//! the file never holds two values under the same key stream.

use std::collections::BTreeMap;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use argon2::Argon2;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use chacha20poly1305::{
    aead::{Aead, KeyInit},
    ChaCha20Poly1305, Key, Nonce,
};
use chrono::{DateTime, Utc};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::{SecretStore, StorageError, StorageResult};

const SALT_LEN: usize = 16;
const NONCE_LEN: usize = 12;
const KEY_LEN: usize = 32;

/// Envelope format version, bumped if the KDF or cipher changes.
const ENVELOPE_VERSION: u8 = 1;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Envelope {
    version: u8,
    salt: String,
    nonce: String,
    ciphertext: String,
    saved_at: DateTime<Utc>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct FileContents {
    #[serde(default)]
    entries: BTreeMap<String, Envelope>,
}

pub struct EncryptedFileStore {
    path: PathBuf,
    passphrase: String,
}

impl EncryptedFileStore {
    pub fn new(path: PathBuf, passphrase: String) -> StorageResult<Self> {
        if passphrase.is_empty() {
            return Err(StorageError::MissingPassphrase);
        }
        Ok(Self { path, passphrase })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn derive_key(&self, salt: &[u8]) -> StorageResult<[u8; KEY_LEN]> {
        let mut key = [0u8; KEY_LEN];
        Argon2::default()
            .hash_password_into(self.passphrase.as_bytes(), salt, &mut key)
            .map_err(|_| StorageError::Encrypt)?;
        Ok(key)
    }

    fn seal(&self, plaintext: &str) -> StorageResult<Envelope> {
        let mut salt = [0u8; SALT_LEN];
        let mut nonce = [0u8; NONCE_LEN];
        let mut rng = rand::rngs::OsRng;
        rng.fill_bytes(&mut salt);
        rng.fill_bytes(&mut nonce);

        let key = self.derive_key(&salt)?;
        let cipher = ChaCha20Poly1305::new(Key::from_slice(&key));
        let ciphertext = cipher
            .encrypt(Nonce::from_slice(&nonce), plaintext.as_bytes())
            .map_err(|_| StorageError::Encrypt)?;

        Ok(Envelope {
            version: ENVELOPE_VERSION,
            salt: BASE64.encode(salt),
            nonce: BASE64.encode(nonce),
            ciphertext: BASE64.encode(ciphertext),
            saved_at: Utc::now(),
        })
    }

    fn open(&self, envelope: &Envelope) -> StorageResult<String> {
        if envelope.version != ENVELOPE_VERSION {
            return Err(StorageError::Decrypt);
        }
        let salt = BASE64.decode(&envelope.salt).map_err(|_| StorageError::Decrypt)?;
        let nonce = BASE64.decode(&envelope.nonce).map_err(|_| StorageError::Decrypt)?;
        let ciphertext = BASE64
            .decode(&envelope.ciphertext)
            .map_err(|_| StorageError::Decrypt)?;
        if nonce.len() != NONCE_LEN || salt.len() < 8 {
            return Err(StorageError::Decrypt);
        }

        let key = self.derive_key(&salt).map_err(|_| StorageError::Decrypt)?;
        let cipher = ChaCha20Poly1305::new(Key::from_slice(&key));
        let plaintext = cipher
            .decrypt(Nonce::from_slice(&nonce), ciphertext.as_slice())
            .map_err(|_| StorageError::Decrypt)?;

        String::from_utf8(plaintext).map_err(|_| StorageError::Decrypt)
    }

    fn read(&self) -> StorageResult<FileContents> {
        if !self.path.exists() {
            return Ok(FileContents::default());
        }
        let contents = std::fs::read_to_string(&self.path)?;
        Ok(serde_json::from_str(&contents)?)
    }

    fn write(&self, contents: &FileContents) -> StorageResult<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let tmp = self.path.with_extension("tmp");
        // A leftover temp file keeps its old mode, so start from scratch.
        match std::fs::remove_file(&tmp) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        let mut file = create_private(&tmp)?;
        file.write_all(serde_json::to_string_pretty(contents)?.as_bytes())?;
        file.sync_all()?;
        drop(file);
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

/// Create a new file readable only by the owner.
#[cfg(unix)]
fn create_private(path: &Path) -> std::io::Result<File> {
    use std::os::unix::fs::OpenOptionsExt;
    OpenOptions::new()
        .write(true)
        .create_new(true)
        .mode(0o600)
        .open(path)
}

#[cfg(not(unix))]
fn create_private(path: &Path) -> std::io::Result<File> {
    OpenOptions::new().write(true).create_new(true).open(path)
}

impl SecretStore for EncryptedFileStore {
    fn set(&self, key: &str, value: &str) -> StorageResult<()> {
        let mut contents = self.read()?;
        contents.entries.insert(key.to_string(), self.seal(value)?);
        self.write(&contents)?;
        debug!(path = %self.path.display(), "Encrypted entry written");
        Ok(())
    }

    fn get(&self, key: &str) -> StorageResult<Option<String>> {
        let contents = self.read()?;
        match contents.entries.get(key) {
            Some(envelope) => self.open(envelope).map(Some),
            None => Ok(None),
        }
    }

    fn delete(&self, key: &str) -> StorageResult<bool> {
        let mut contents = match self.read() {
            Ok(contents) => contents,
            // An unparsable file holds nothing usable.
            Err(StorageError::Serialization(e)) => {
                warn!(path = %self.path.display(), error = %e, "Removing unreadable session file");
                std::fs::remove_file(&self.path)?;
                return Ok(true);
            }
            Err(e) => return Err(e),
        };
        if contents.entries.remove(key).is_none() {
            return Ok(false);
        }
        if contents.entries.is_empty() {
            std::fs::remove_file(&self.path)?;
        } else {
            self.write(&contents)?;
        }
        Ok(true)
    }

    fn describe(&self) -> String {
        format!("encrypted file ({})", self.path.display())
    }
}
