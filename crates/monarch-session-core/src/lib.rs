//! Monarch Money session setup.
//!
//! Logs in once (with MFA when the account requires it), proves the session
//! works, and stores the session token in the OS keychain so a long-running
//! server can reuse it.
//!
//! - `store`: secure session persistence with keychain, encrypted-file and
//!   in-memory backends
//! - `api`: Monarch Money client
//! - `auth`: the interactive login state machine
//! - `config`: configuration file and environment overrides

pub mod api;
pub mod auth;
pub mod config;
pub mod store;

pub use api::{ApiError, AuthError, FinanceApi, MonarchClient};
pub use auth::{Console, LoginOrchestrator, LoginOutcome, LoginState, SetupError};
pub use config::Config;
pub use store::{
    select_backend, BackendKind, BackendSelection, SecretStore, SessionSource, SessionStore,
    SessionToken, StorageError,
};
