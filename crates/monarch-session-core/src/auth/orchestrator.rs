//! Interactive login state machine.
//!
//! Drives one run: confirm MFA awareness, collect credentials, clear the
//! stored session, log in (answering an MFA challenge once), verify the
//! session with an account listing, then persist it.

use std::fmt;

use anyhow::Result;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::api::{AuthError, FinanceApi};
use crate::store::SessionStore;

use super::console::{is_yes, Console};
use super::SetupError;

const RULE: &str = "=============================================";
const DIVIDER: &str = "---------------------------------------------";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginState {
    Unauthenticated,
    CredentialsSubmitted,
    MfaChallenged,
    MfaSubmitted,
    Authenticated,
    Verified,
    Persisted,
    Cancelled,
    LoginFailed,
    MfaFailed,
    VerificationFailed,
    PersistFailed,
}

impl LoginState {
    /// Whether the run stops in this state.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            LoginState::Persisted
                | LoginState::Cancelled
                | LoginState::LoginFailed
                | LoginState::MfaFailed
                | LoginState::VerificationFailed
                | LoginState::PersistFailed
        )
    }
}

impl fmt::Display for LoginState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LoginState::Unauthenticated => "unauthenticated",
            LoginState::CredentialsSubmitted => "credentials submitted",
            LoginState::MfaChallenged => "MFA challenged",
            LoginState::MfaSubmitted => "MFA submitted",
            LoginState::Authenticated => "authenticated",
            LoginState::Verified => "verified",
            LoginState::Persisted => "persisted",
            LoginState::Cancelled => "cancelled",
            LoginState::LoginFailed => "login failed",
            LoginState::MfaFailed => "MFA failed",
            LoginState::VerificationFailed => "verification failed",
            LoginState::PersistFailed => "persist failed",
        };
        f.write_str(name)
    }
}

/// Result of one run of the login flow.
#[derive(Debug)]
pub struct LoginOutcome {
    pub state: LoginState,
    /// Every state visited, starting with `Unauthenticated`.
    pub history: Vec<LoginState>,
    pub account_count: Option<usize>,
    /// True only when the token reached a durable backend.
    pub persisted: bool,
    pub used_mfa: bool,
    pub error: Option<SetupError>,
}

impl LoginOutcome {
    /// A working session was established, whether or not it was saved.
    pub fn is_success(&self) -> bool {
        matches!(self.state, LoginState::Persisted | LoginState::PersistFailed)
    }
}

pub struct LoginOrchestrator<A, C> {
    api: A,
    console: C,
    store: SessionStore,
    state: LoginState,
    history: Vec<LoginState>,
    account_count: Option<usize>,
    used_mfa: bool,
}

impl<A: FinanceApi, C: Console> LoginOrchestrator<A, C> {
    pub fn new(api: A, console: C, store: SessionStore) -> Self {
        Self {
            api,
            console,
            store,
            state: LoginState::Unauthenticated,
            history: vec![LoginState::Unauthenticated],
            account_count: None,
            used_mfa: false,
        }
    }

    pub fn into_parts(self) -> (A, C, SessionStore) {
        (self.api, self.console, self.store)
    }

    fn transition(&mut self, next: LoginState) {
        debug!(from = %self.state, to = %next, "Login state transition");
        self.state = next;
        self.history.push(next);
    }

    fn outcome(&self, persisted: bool, error: Option<SetupError>) -> LoginOutcome {
        LoginOutcome {
            state: self.state,
            history: self.history.clone(),
            account_count: self.account_count,
            persisted,
            used_mfa: self.used_mfa,
            error,
        }
    }

    /// Move to a failure state, report the error and its hints, and finish the run.
    fn fail(&mut self, state: LoginState, error: SetupError) -> LoginOutcome {
        warn!(state = %state, kind = error.kind(), error = %error, "Login flow failed");
        self.transition(state);
        self.console.say("");
        self.console.say(&format!("Error: {}", error));
        self.console.say("");
        self.console.say("Troubleshooting:");
        for hint in error.hints() {
            self.console.say(&format!("  - {}", hint));
        }
        self.console.say(&format!("\nError details: {}", error.kind()));
        self.outcome(false, Some(error))
    }

    /// Run the whole flow. Only console I/O failures are returned as `Err`.
    pub async fn run(&mut self) -> Result<LoginOutcome> {
        self.say_banner();

        let mfa_enabled = match self.confirm_security()? {
            Some(mfa_enabled) => mfa_enabled,
            None => {
                self.transition(LoginState::Cancelled);
                self.console
                    .say("Setup cancelled. Please enable MFA and try again.");
                return Ok(self.outcome(false, None));
            }
        };

        self.console.say("\nLogin Credentials");
        self.console.say(DIVIDER);
        let email = self.console.ask("Email: ")?.trim().to_string();
        let password = self.console.ask_secret("Password: ")?;
        self.transition(LoginState::CredentialsSubmitted);

        // Clear first so a failed re-login never leaves a stale token behind.
        self.clear_stored_session();

        if email.is_empty() || password.is_empty() {
            let error = SetupError::Credential("email and password are required".to_string());
            return Ok(self.fail(LoginState::LoginFailed, error));
        }

        if let Some(outcome) = self.authenticate(&email, &password).await? {
            return Ok(outcome);
        }

        if let Some(outcome) = self.verify().await {
            return Ok(outcome);
        }

        let outcome = self.persist();
        if outcome.is_success() {
            self.say_complete(mfa_enabled);
        }
        Ok(outcome)
    }

    fn say_banner(&mut self) {
        self.console.say("\nMonarch Money - Session Setup");
        self.console.say(RULE);
        self.console
            .say("This will authenticate you once and save a session");
        self.console
            .say("for reuse by the Monarch Money server.\n");
    }

    /// Ask about MFA. Returns `None` if the user declines to continue.
    fn confirm_security(&mut self) -> Result<Option<bool>> {
        self.console.say("Security Check");
        self.console.say(DIVIDER);
        let answer = self.console.ask(
            "Do you have Multi-Factor Authentication (MFA) enabled on your Monarch Money account? (yes/no): ",
        )?;
        if is_yes(&answer) {
            return Ok(Some(true));
        }

        for line in [
            "",
            RULE,
            "SECURITY RECOMMENDATION",
            RULE,
            "We strongly recommend enabling MFA to protect your",
            "financial data. Monarch Money contains sensitive",
            "information about your accounts and transactions.",
            "",
            "To enable MFA:",
            "  1. Log in to Monarch Money web app",
            "  2. Go to Settings -> Security",
            "  3. Enable Two-Factor Authentication",
            "  4. Follow the setup instructions",
            "",
            "You can proceed without MFA, but consider enabling",
            "it soon for better security.",
            RULE,
        ] {
            self.console.say(line);
        }

        let proceed = self.console.ask("\nProceed with login? (yes/no): ")?;
        if is_yes(&proceed) {
            Ok(Some(false))
        } else {
            info!("User declined to proceed without MFA");
            Ok(None)
        }
    }

    fn clear_stored_session(&mut self) {
        match self.store.delete_token() {
            Ok(()) => self.console.say("\nCleared existing stored session"),
            Err(e) => {
                warn!(error = %e, "Failed to clear stored session");
                self.console
                    .say(&format!("\nWarning: could not clear existing session: {}", e));
            }
        }
    }

    /// Log in, answering an MFA challenge once. `Some` means the run ended.
    async fn authenticate(&mut self, email: &str, password: &str) -> Result<Option<LoginOutcome>> {
        self.console.say("Authenticating with Monarch Money...");

        match self.api.login(email, password).await {
            Ok(()) => {
                self.transition(LoginState::Authenticated);
                self.console.say("Login successful!");
                info!("Login successful");
                Ok(None)
            }
            Err(AuthError::MfaRequired) => {
                self.used_mfa = true;
                self.transition(LoginState::MfaChallenged);
                self.console.say("\nMFA Required");
                self.console
                    .say("A two-factor authentication code has been sent to your device.");
                let code = self.console.ask("Enter your MFA code: ")?.trim().to_string();
                self.transition(LoginState::MfaSubmitted);

                match self.api.submit_mfa(email, password, &code).await {
                    Ok(()) => {
                        self.transition(LoginState::Authenticated);
                        self.console.say("MFA authentication successful!");
                        info!("MFA authentication successful");
                        Ok(None)
                    }
                    Err(e) => Ok(Some(self.fail(LoginState::MfaFailed, SetupError::from_mfa(e)))),
                }
            }
            Err(e) => Ok(Some(self.fail(LoginState::LoginFailed, SetupError::from_login(e)))),
        }
    }

    /// One read-only call to prove the session works. `Some` means the run ended.
    async fn verify(&mut self) -> Option<LoginOutcome> {
        self.console.say("\nTesting connection...");

        match self.api.fetch_accounts().await {
            Ok(response) => {
                match count_accounts(&response) {
                    Some(count) => {
                        self.account_count = Some(count);
                        self.console.say(&format!(
                            "Connection successful - Found {} accounts",
                            count
                        ));
                    }
                    None => {
                        warn!(response_type = json_type(&response), "Unexpected accounts response shape");
                        self.console
                            .say("Warning: Connected but received unexpected data format");
                        self.console
                            .say(&format!("Response type: {}", json_type(&response)));
                    }
                }
                self.transition(LoginState::Verified);
                None
            }
            Err(e) => Some(self.fail(LoginState::VerificationFailed, SetupError::Verification(e))),
        }
    }

    fn persist(&mut self) -> LoginOutcome {
        self.console.say(&format!(
            "\nSaving session securely to {}...",
            self.store.backend()
        ));

        match self.store.save_authenticated_session(&self.api) {
            Ok(()) => {
                self.transition(LoginState::Persisted);
                let durable = self.store.is_durable();
                if durable {
                    self.console.say("Session saved securely!");
                } else {
                    self.console
                        .say("Warning: no durable secure storage is available.");
                    self.console.say(
                        "Your session is valid for this run only and will not persist.",
                    );
                }
                self.outcome(durable, None)
            }
            Err(e) => {
                warn!(error = %e, "Failed to persist session");
                self.transition(LoginState::PersistFailed);
                self.console
                    .say(&format!("Warning: Could not save session: {}", e));
                self.console.say(
                    "Your session is still valid for this run, but may not persist.",
                );
                self.outcome(false, Some(SetupError::Storage(e)))
            }
        }
    }

    fn say_complete(&mut self, mfa_enabled: bool) {
        for line in [
            "",
            RULE,
            "Setup Complete!",
            RULE,
            "Your Monarch Money account is now connected.",
            "",
            "The server can now use the saved session for:",
            "  - get_accounts - View all your accounts",
            "  - get_transactions - Recent transactions",
            "  - get_budgets - Budget information",
            "  - get_cashflow - Income/expense analysis",
            "",
        ] {
            self.console.say(line);
        }
        if self.store.is_durable() {
            self.console
                .say("Your session is encrypted and stored securely.");
        }
        if mfa_enabled {
            self.console
                .say("MFA is enabled - your account is well protected!");
        }
        self.console.say(RULE);
    }
}

/// Length of the `accounts` array, if the response has one.
fn count_accounts(response: &Value) -> Option<usize> {
    response.get("accounts")?.as_array().map(|a| a.len())
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
