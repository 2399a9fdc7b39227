//! Application startup and utilities.
//!
//! This module contains exit codes, tracing setup, and error hints
//! that support the main entry point.

use fax_relay::config::ConfigError;
use tracing::Level;
use tracing_subscriber::EnvFilter;

/// Application exit codes.
pub mod exit_code {
    use std::process::ExitCode;

    /// Success (exit code 0).
    pub const SUCCESS: ExitCode = ExitCode::SUCCESS;

    /// Configuration error (exit code 1) - invalid args, missing credentials, etc.
    pub const CONFIG_ERROR: ExitCode = ExitCode::FAILURE;

    /// Runtime error (exit code 2) - queue setup failure, worker crash, etc.
    ///
    /// Note: This is a function rather than a constant because `ExitCode::from()` is not `const fn`.
    pub fn runtime_error() -> ExitCode {
        ExitCode::from(2)
    }
}

/// Returns a hint for common configuration errors, if one applies.
#[must_use]
pub fn config_hint(error: &ConfigError) -> Option<&'static str> {
    match error {
        ConfigError::MissingRequired { .. } | ConfigError::FileRead { .. } => {
            Some("Run 'fax-relay init' to generate a configuration template.")
        }
        ConfigError::InvalidDuration {
            field: "activation_timeout",
            ..
        } => Some("Activations must be allowed to outlive the 5 minute carrier TTL."),
        _ => None,
    }
}

/// Prints helpful hints for common configuration errors.
pub fn print_config_hint(error: &ConfigError) {
    if let Some(hint) = config_hint(error) {
        eprintln!("\n{hint}");
    }
}

/// Sets up the tracing subscriber for logging.
pub fn setup_tracing(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::INFO };

    let filter = EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy();

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}
