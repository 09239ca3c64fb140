use thiserror::Error;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Keychain error: {0}")]
    Keyring(#[from] keyring::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Failed to encrypt session")]
    Encrypt,

    #[error("Failed to decrypt session - wrong passphrase or corrupted file")]
    Decrypt,

    #[error("No passphrase configured for the encrypted session file (set MONARCH_SESSION_PASSPHRASE)")]
    MissingPassphrase,

    #[error("Secure storage unavailable: {0}")]
    Unavailable(String),

    #[error("Session has no token to save - login did not complete")]
    NoSession,
}

pub type StorageResult<T> = Result<T, StorageError>;
