//! Application startup and utilities.
//!
//! This module contains exit codes, tracing setup, and error hints
//! that support the main entry point.

use hookcast::config::ConfigError;
use hookcast::store::StoreError;
use tracing::Level;
use tracing_subscriber::EnvFilter;

use crate::run::RunError;

/// Application exit codes.
pub mod exit_code {
    use std::process::ExitCode;

    /// Success (exit code 0).
    pub const SUCCESS: ExitCode = ExitCode::SUCCESS;

    /// Configuration error (exit code 1) - invalid args, bad config file, etc.
    pub const CONFIG_ERROR: ExitCode = ExitCode::FAILURE;

    /// Runtime error (exit code 2) - failed delivery, bad signature, store error, etc.
    ///
    /// Note: This is a function rather than a constant because `ExitCode::from()` is not `const fn`.
    pub fn runtime_error() -> ExitCode {
        ExitCode::from(2)
    }
}

/// Prints helpful hints for common configuration errors.
pub fn print_config_hint(error: &ConfigError) {
    match error {
        ConfigError::FileRead { .. } => {
            eprintln!("\nRun 'hookcast init' to generate a configuration template.");
        }
        ConfigError::InvalidRetry(_) => {
            eprintln!("\nExample: [retry] delays = [0, 60, 300, 1800, 7200]");
        }
        _ => {}
    }
}

/// Prints helpful hints for common runtime errors.
pub fn print_run_hint(error: &RunError) {
    match error {
        RunError::Store(StoreError::Corrupted { .. }) => {
            eprintln!("\nThe store file is not a hookcast store; check --store or [store] path.");
        }
        RunError::Delivery(e) if !e.is_delivery_failure() => {
            eprintln!("\nRun 'hookcast list' to see registered webhooks.");
        }
        _ => {}
    }
}

/// Sets up the tracing subscriber for logging.
///
/// Logs go to stderr so command output on stdout stays machine-readable.
pub fn setup_tracing(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::INFO };

    let filter = EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy();

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}
