use std::fmt;

use tracing::{debug, info};

use super::{SecretStore, StorageError, StorageResult};

/// Key the session token is stored under, inside the configured service namespace.
pub const SESSION_TOKEN_KEY: &str = "mm_session_token";

/// Opaque credential material from a successful login.
#[derive(Clone, PartialEq, Eq)]
pub struct SessionToken(String);

impl SessionToken {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SessionToken(<redacted>)")
    }
}

/// Anything holding a live authenticated session.
pub trait SessionSource {
    fn session_token(&self) -> Option<SessionToken>;
}

/// Persists exactly one session token in a secret store.
pub struct SessionStore {
    backend: Box<dyn SecretStore>,
    key: String,
    durable: bool,
}

impl SessionStore {
    pub fn new(backend: Box<dyn SecretStore>, durable: bool) -> Self {
        Self {
            backend,
            key: SESSION_TOKEN_KEY.to_string(),
            durable,
        }
    }

    /// Remove any stored token. A missing entry is not an error.
    pub fn delete_token(&self) -> StorageResult<()> {
        let existed = self.backend.delete(&self.key)?;
        debug!(existed, backend = %self.backend.describe(), "Session token cleared");
        Ok(())
    }

    /// Extract the token from a live session and store it, replacing any prior one.
    pub fn save_authenticated_session(&self, session: &dyn SessionSource) -> StorageResult<()> {
        let token = session
            .session_token()
            .filter(|t| !t.is_empty())
            .ok_or(StorageError::NoSession)?;
        self.backend.set(&self.key, token.as_str())?;
        info!(backend = %self.backend.describe(), "Session token saved");
        Ok(())
    }

    /// Load the stored token. Absence is `Ok(None)`, never an error.
    pub fn load_token(&self) -> StorageResult<Option<SessionToken>> {
        Ok(self
            .backend
            .get(&self.key)?
            .filter(|v| !v.is_empty())
            .map(SessionToken::new))
    }

    /// Check if a token is stored. Backend errors read as "no token".
    pub fn has_token(&self) -> bool {
        matches!(self.load_token(), Ok(Some(_)))
    }

    pub fn is_durable(&self) -> bool {
        self.durable
    }

    pub fn backend(&self) -> String {
        self.backend.describe()
    }
}
