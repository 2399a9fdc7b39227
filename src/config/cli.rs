//! CLI argument parsing using clap.
//!
//! Defines the command-line interface with all options and subcommands.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// fax-relay: outbound fax delivery pipeline
///
/// Reads fax jobs as JSON lines on stdin, sends them through the carrier,
/// retries failed attempts after a backoff delay, and reports every outcome
/// to the job's callback URL.
#[derive(Debug, Parser)]
#[command(name = "fax-relay")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to run
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Carrier account SID
    #[arg(long = "account-sid", env = "TWILIO_SID")]
    pub account_sid: Option<String>,

    /// Carrier auth token
    #[arg(long = "auth-token", env = "TWILIO_AUTH_TOKEN", hide_env_values = true)]
    pub auth_token: Option<String>,

    /// Fax number to send from
    #[arg(long = "from-number", env = "TWILIO_PHONE_NUMBER")]
    pub from_number: Option<String>,

    /// Carrier API root URL
    #[arg(long = "carrier-url")]
    pub carrier_url: Option<String>,

    /// Carrier API request timeout in seconds
    #[arg(long = "carrier-timeout")]
    pub carrier_timeout: Option<u64>,

    /// Attempts per fax, the first one included
    #[arg(long = "max-attempts", env = "MAX_FAX_ATTEMPTS")]
    pub max_attempts: Option<u32>,

    /// Delay in seconds before a failed fax is retried
    #[arg(long = "backoff-delay", env = "BACKOFF_DELAY")]
    pub backoff_delay: Option<u64>,

    /// Submission queue identifier
    #[arg(long = "fax-queue", env = "FAX_QUEUE_URL")]
    pub fax_queue: Option<String>,

    /// Retry queue identifier
    #[arg(long = "retry-queue", env = "RETRY_QUEUE_URL")]
    pub retry_queue: Option<String>,

    /// Webhook queue identifier
    #[arg(long = "webhook-queue", env = "WEBHOOK_QUEUE_URL")]
    pub webhook_queue: Option<String>,

    /// Callback request timeout in seconds
    #[arg(long = "webhook-timeout")]
    pub webhook_timeout: Option<u64>,

    /// Deadline in seconds for one stage activation
    #[arg(long = "activation-timeout")]
    pub activation_timeout: Option<u64>,

    /// Delay in seconds before a failed record is redelivered
    #[arg(long = "redelivery-delay")]
    pub redelivery_delay: Option<u64>,

    /// Deliveries before a record is dead-lettered
    #[arg(long = "max-receive-count")]
    pub max_receive_count: Option<u32>,

    /// Path to configuration file
    #[arg(long, short)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(long, short)]
    pub verbose: bool,
}

/// Subcommands for fax-relay
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Generate a default configuration file
    Init {
        /// Output path for the configuration file
        #[arg(long, short, default_value = "fax-relay.toml")]
        output: PathBuf,
    },
}

impl Cli {
    /// Parses CLI arguments from the command line.
    #[must_use]
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Parses CLI arguments from an iterator (useful for testing).
    pub fn parse_from_iter<I, T>(iter: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        Self::parse_from(iter)
    }

    /// Returns true if this is the init command.
    #[must_use]
    pub const fn is_init(&self) -> bool {
        matches!(self.command, Some(Command::Init { .. }))
    }
}
