//! monarch-login - one-time Monarch Money login.
//!
//! Authenticates interactively (including MFA), checks the session with an
//! account listing, and stores the session token in the OS keychain for
//! the Monarch Money server to reuse.

mod console;

use std::io;

use anyhow::{Context, Result};
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use monarch_session_core::{
    select_backend, ApiError, AuthError, BackendKind, Config, LoginOrchestrator, MonarchClient,
    StorageError,
};

use console::TerminalConsole;

/// Initialize the tracing subscriber for logging
fn init_tracing() {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug).
    // Logs go to stderr so prompts on stdout stay readable.
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(filter)
        .init();
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    init_tracing();
    info!("monarch-login starting");

    // Every failure is reported here; the process always exits normally.
    if let Err(e) = run().await {
        warn!(error = %e, "Setup aborted");
        report_unexpected(&e);
    }

    info!("monarch-login finished");
    Ok(())
}

async fn run() -> Result<()> {
    println!("monarch-login version {}", env!("CARGO_PKG_VERSION"));

    let config = Config::load().context("Failed to load configuration")?;

    let selection = match select_backend(&config) {
        Ok(selection) => selection,
        Err(e) => {
            report_storage_unavailable(config.backend, &e);
            return Ok(());
        }
    };

    if let Some(ref reason) = selection.fallback_reason {
        println!("\nNote: {}.", reason);
        println!("Using {} for the session.", selection.store.backend());
        if !selection.store.is_durable() {
            println!("Set MONARCH_SESSION_PASSPHRASE to store it in an encrypted file instead.");
        }
    }

    let api = MonarchClient::new(&config).context("Failed to create API client")?;
    let mut orchestrator = LoginOrchestrator::new(api, TerminalConsole::new(), selection.store);
    let outcome = orchestrator.run().await?;

    info!(
        state = %outcome.state,
        persisted = outcome.persisted,
        accounts = ?outcome.account_count,
        "Login flow finished"
    );
    Ok(())
}

/// An explicitly requested backend could not be opened. Nothing is attempted.
fn report_storage_unavailable(backend: BackendKind, error: &StorageError) {
    println!("\nError: the '{}' session backend is not available: {}", backend, error);
    println!("\nTo continue, either:");
    println!("  - unlock or install a system keychain and retry");
    println!("  - set MONARCH_SESSION_PASSPHRASE to use an encrypted session file");
    println!("  - set MONARCH_SESSION_BACKEND=auto to pick the best available backend");
}

fn report_unexpected(error: &anyhow::Error) {
    println!("\nSetup failed: {}", error);
    println!("\nTroubleshooting:");
    println!("  - Verify your email and password are correct");
    println!("  - Check your internet connection");
    println!("  - Ensure the MFA code is current (codes expire quickly)");
    println!("  - Try upgrading to the latest release of this tool");
    println!("\nError details: {}", error_kind(error));
}

/// Name the type of the innermost error we recognise, for the details line.
fn error_kind(error: &anyhow::Error) -> String {
    for cause in error.chain() {
        if let Some(e) = cause.downcast_ref::<io::Error>() {
            return format!("io::Error ({:?})", e.kind());
        }
        if cause.is::<StorageError>() {
            return "StorageError".to_string();
        }
        if cause.is::<ApiError>() {
            return "ApiError".to_string();
        }
        if cause.is::<AuthError>() {
            return "AuthError".to_string();
        }
        if cause.is::<serde_json::Error>() {
            return "serde_json::Error".to_string();
        }
    }
    "anyhow::Error".to_string()
}
