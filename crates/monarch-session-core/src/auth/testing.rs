//! Scripted fakes for driving the login flow in tests.

use std::collections::VecDeque;
use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use serde_json::Value;

use crate::api::{ApiError, AuthError, FinanceApi};
use crate::store::{MemoryStore, SecretStore, SessionSource, SessionToken, StorageError, StorageResult};

use super::Console;

/// Remote API stand-in. `accounts: None` makes the account fetch fail.
pub struct FakeApi {
    password: &'static str,
    mfa_code: Option<&'static str>,
    accounts: Option<Value>,
    token: Option<SessionToken>,
    pub login_calls: usize,
    pub mfa_calls: usize,
    fetch_calls: AtomicUsize,
}

impl FakeApi {
    pub fn new(password: &'static str, mfa_code: Option<&'static str>, accounts: Option<Value>) -> Self {
        Self {
            password,
            mfa_code,
            accounts,
            token: None,
            login_calls: 0,
            mfa_calls: 0,
            fetch_calls: AtomicUsize::new(0),
        }
    }

    pub fn fetch_calls(&self) -> usize {
        self.fetch_calls.load(Ordering::SeqCst)
    }
}

impl SessionSource for FakeApi {
    fn session_token(&self) -> Option<SessionToken> {
        self.token.clone()
    }
}

#[async_trait]
impl FinanceApi for FakeApi {
    async fn login(&mut self, _email: &str, password: &str) -> Result<(), AuthError> {
        self.login_calls += 1;
        if password != self.password {
            return Err(AuthError::Credentials("HTTP 401: Invalid email or password".to_string()));
        }
        if self.mfa_code.is_some() {
            return Err(AuthError::MfaRequired);
        }
        self.token = Some(SessionToken::new("token-after-login"));
        Ok(())
    }

    async fn submit_mfa(&mut self, _email: &str, password: &str, code: &str) -> Result<(), AuthError> {
        self.mfa_calls += 1;
        if password != self.password || Some(code) != self.mfa_code {
            return Err(AuthError::Mfa("HTTP 403: invalid code".to_string()));
        }
        self.token = Some(SessionToken::new("token-after-mfa"));
        Ok(())
    }

    async fn fetch_accounts(&self) -> Result<Value, ApiError> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        self.accounts
            .clone()
            .ok_or_else(|| ApiError::ServerError("accounts unavailable".to_string()))
    }
}

/// Console with canned answers that records everything printed.
#[derive(Default)]
pub struct ScriptedConsole {
    answers: VecDeque<String>,
    secrets: VecDeque<String>,
    pub output: Vec<String>,
}

impl ScriptedConsole {
    pub fn new(answers: &[&str], secrets: &[&str]) -> Self {
        Self {
            answers: answers.iter().map(|s| s.to_string()).collect(),
            secrets: secrets.iter().map(|s| s.to_string()).collect(),
            output: Vec::new(),
        }
    }

    pub fn printed(&self, needle: &str) -> bool {
        self.output.iter().any(|line| line.contains(needle))
    }
}

fn exhausted(prompt: &str) -> io::Error {
    io::Error::new(io::ErrorKind::UnexpectedEof, format!("no scripted answer for {:?}", prompt))
}

impl Console for ScriptedConsole {
    fn say(&mut self, line: &str) {
        self.output.push(line.to_string());
    }

    fn ask(&mut self, prompt: &str) -> io::Result<String> {
        self.output.push(prompt.to_string());
        self.answers.pop_front().ok_or_else(|| exhausted(prompt))
    }

    fn ask_secret(&mut self, prompt: &str) -> io::Result<String> {
        self.output.push(prompt.to_string());
        self.secrets.pop_front().ok_or_else(|| exhausted(prompt))
    }
}

/// Backend whose writes are refused while reads and deletes work.
#[derive(Default)]
pub struct FailingWrites {
    inner: MemoryStore,
}

impl SecretStore for FailingWrites {
    fn set(&self, _key: &str, _value: &str) -> StorageResult<()> {
        Err(StorageError::Unavailable("keychain denied write access".to_string()))
    }

    fn get(&self, key: &str) -> StorageResult<Option<String>> {
        self.inner.get(key)
    }

    fn delete(&self, key: &str) -> StorageResult<bool> {
        self.inner.delete(key)
    }

    fn describe(&self) -> String {
        "read-only test store".to_string()
    }
}
