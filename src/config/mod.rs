//! Configuration layer for fax-relay.
//!
//! This module provides:
//! - CLI argument parsing ([`Cli`], [`Command`])
//! - TOML configuration file parsing ([`TomlConfig`])
//! - Validated configuration ([`ValidatedConfig`])
//! - Configuration file generation ([`write_default_config`])
//! - Default values ([`defaults`])
//!
//! # Priority
//!
//! Configuration values are resolved with the following priority (highest to lowest):
//!
//! 1. **Explicit CLI arguments** - Values passed on the command line, or through
//!    their environment variables (`TWILIO_SID`, `MAX_FAX_ATTEMPTS`, ...)
//! 2. **TOML config file** - Values from the configuration file
//! 3. **Built-in defaults** - Hardcoded default values
//!
//! Carrier credentials and the sending number have no defaults and must come
//! from one of the first two sources.
//!
//! # Fixed Parameters
//!
//! The following parameters are intentionally not user-configurable:
//! - **Poll interval**: carrier status is polled every 15 seconds
//! - **Carrier TTL**: a submitted fax expires at the carrier after 5 minutes
//! - **Dedup window**: the submission queue collapses repeated attempts for 5 minutes

mod cli;
pub mod defaults;
mod error;
mod toml;
mod validated;

#[cfg(test)]
mod cli_tests;

pub use cli::{Cli, Command};
pub use error::ConfigError;
pub use toml::{TomlConfig, default_config_template};
pub use validated::{ValidatedConfig, write_default_config};
