//! Interactive login flow.
//!
//! This module provides:
//! - `LoginOrchestrator`: the login state machine (credentials, MFA,
//!   verification, persistence)
//! - `Console`: the prompt/print seam the orchestrator talks through
//! - `SetupError`: user-facing failure categories with remediation hints

pub mod console;
pub mod error;
pub mod orchestrator;

#[cfg(test)]
pub(crate) mod testing;

pub use console::{is_yes, Console};
pub use error::SetupError;
pub use orchestrator::{LoginOrchestrator, LoginOutcome, LoginState};
