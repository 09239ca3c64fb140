use thiserror::Error;

use crate::api::{ApiError, AuthError};
use crate::store::StorageError;

/// Failure categories of the login flow, each with remediation hints for the user.
#[derive(Error, Debug)]
pub enum SetupError {
    #[error("Login rejected: {0}")]
    Credential(String),

    #[error("MFA authentication failed: {0}")]
    Mfa(String),

    #[error("Connection test failed: {0}")]
    Verification(#[from] ApiError),

    #[error("Could not save session: {0}")]
    Storage(#[from] StorageError),

    #[error("Setup failed: {0}")]
    Other(String),
}

impl SetupError {
    /// Map an error from the initial password login.
    pub fn from_login(err: AuthError) -> Self {
        match err {
            AuthError::Credentials(reason) => SetupError::Credential(reason),
            AuthError::Mfa(reason) => SetupError::Mfa(reason),
            AuthError::MfaRequired => {
                SetupError::Other("unexpected MFA challenge".to_string())
            }
            other => SetupError::Other(other.to_string()),
        }
    }

    /// Map an error from the MFA submission. Every failure here is an MFA failure.
    pub fn from_mfa(err: AuthError) -> Self {
        match err {
            AuthError::Mfa(reason) | AuthError::Credentials(reason) => SetupError::Mfa(reason),
            other => SetupError::Mfa(other.to_string()),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            SetupError::Credential(_) => "CredentialError",
            SetupError::Mfa(_) => "MfaError",
            SetupError::Verification(_) => "VerificationError",
            SetupError::Storage(_) => "StorageError",
            SetupError::Other(_) => "Error",
        }
    }

    pub fn hints(&self) -> &'static [&'static str] {
        match self {
            SetupError::Credential(_) => &[
                "Verify your email and password are correct",
                "Check your internet connection",
            ],
            SetupError::Mfa(_) => &[
                "Please verify your MFA code and try again",
                "Ensure the MFA code is current (codes expire quickly)",
            ],
            SetupError::Verification(_) => &[
                "The login succeeded but there may be an API compatibility issue",
                "Try upgrading to the latest release of this tool",
            ],
            SetupError::Storage(_) => &[
                "Your session is still valid for this run, but may not persist",
                "Unlock your system keychain, or set MONARCH_SESSION_PASSPHRASE to use an encrypted file",
            ],
            SetupError::Other(_) => &[
                "Verify your email and password are correct",
                "Check your internet connection",
                "Ensure the MFA code is current (codes expire quickly)",
                "Try upgrading to the latest release of this tool",
            ],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_login() {
        assert!(matches!(
            SetupError::from_login(AuthError::Credentials("bad".into())),
            SetupError::Credential(_)
        ));
        assert!(matches!(
            SetupError::from_login(AuthError::InvalidResponse("x".into())),
            SetupError::Other(_)
        ));
    }

    #[test]
    fn test_from_mfa_is_always_mfa() {
        assert!(matches!(
            SetupError::from_mfa(AuthError::Credentials("bad".into())),
            SetupError::Mfa(_)
        ));
        assert!(matches!(
            SetupError::from_mfa(AuthError::InvalidResponse("x".into())),
            SetupError::Mfa(_)
        ));
    }

    #[test]
    fn test_every_kind_has_hints() {
        let errors = [
            SetupError::Credential(String::new()),
            SetupError::Mfa(String::new()),
            SetupError::Verification(ApiError::Unauthorized),
            SetupError::Storage(StorageError::NoSession),
            SetupError::Other(String::new()),
        ];
        for err in &errors {
            assert!(!err.hints().is_empty(), "{} has no hints", err.kind());
        }
    }
}
