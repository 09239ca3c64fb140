//! Remote API module for Monarch Money.
//!
//! `FinanceApi` is the seam the login flow drives; `MonarchClient` is the
//! reqwest implementation. Authenticated calls send the session token as
//! `Authorization: Token <token>`.

pub mod client;
pub mod error;

use async_trait::async_trait;
use serde_json::Value;

use crate::store::SessionSource;

pub use client::MonarchClient;
pub use error::{ApiError, AuthError};

#[async_trait]
pub trait FinanceApi: SessionSource + Send + Sync {
    /// Password login. `AuthError::MfaRequired` means a code must follow.
    async fn login(&mut self, email: &str, password: &str) -> Result<(), AuthError>;

    /// Complete an MFA challenge with a one-time code.
    async fn submit_mfa(&mut self, email: &str, password: &str, code: &str) -> Result<(), AuthError>;

    /// Lightweight authenticated call returning `{"accounts": [...]}`.
    async fn fetch_accounts(&self) -> Result<Value, ApiError>;
}
