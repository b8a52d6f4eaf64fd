//! CLI argument parsing using clap.
//!
//! Defines the command-line interface with all options and subcommands.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::model::WebhookId;

/// Hookcast: signed webhook delivery
///
/// Delivers HMAC-signed event notifications to registered webhook
/// endpoints and tracks each endpoint's health.
#[derive(Debug, Parser)]
#[command(name = "hookcast")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to run
    #[command(subcommand)]
    pub command: Command,

    /// Path to configuration file
    #[arg(long, short, global = true)]
    pub config: Option<PathBuf>,

    /// Path to the webhook store file
    #[arg(long, global = true)]
    pub store: Option<PathBuf>,

    /// HTTP request timeout in seconds
    #[arg(long, global = true, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Enable verbose logging
    #[arg(long, short, global = true)]
    pub verbose: bool,
}

/// Subcommands for hookcast
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Generate a default configuration file
    Init {
        /// Output path for the configuration file
        #[arg(long, short, default_value = "hookcast.toml")]
        output: PathBuf,
    },

    /// Register a webhook endpoint in the store
    Register {
        /// Endpoint URL
        url: String,

        /// Shared signing secret
        #[arg(long, env = "HOOKCAST_SECRET", hide_env_values = true)]
        secret: String,

        /// Event to subscribe to (can be specified multiple times)
        #[arg(long = "event", value_name = "EVENT")]
        events: Vec<String>,
    },

    /// List registered webhooks and their health
    List,

    /// Make a single delivery attempt
    Deliver {
        /// Webhook to deliver to
        webhook_id: WebhookId,

        /// Event name, e.g. answer.created
        #[arg(long)]
        event: String,

        /// Event data as a JSON object
        #[arg(long, value_name = "JSON")]
        data: Option<String>,

        /// Signing secret
        #[arg(long, env = "HOOKCAST_SECRET", hide_env_values = true)]
        secret: String,

        /// Attempt number (starts at 1)
        #[arg(long, default_value_t = 1)]
        attempt: u32,
    },

    /// Print the signature header value for a payload
    Sign {
        /// Signing secret
        #[arg(long, env = "HOOKCAST_SECRET", hide_env_values = true)]
        secret: String,

        /// Payload file (reads stdin if omitted)
        file: Option<PathBuf>,
    },

    /// Check a signature header value against a payload
    Verify {
        /// Signing secret
        #[arg(long, env = "HOOKCAST_SECRET", hide_env_values = true)]
        secret: String,

        /// Signature header value, e.g. sha256=ab12...
        #[arg(long)]
        signature: String,

        /// Payload file (reads stdin if omitted)
        file: Option<PathBuf>,
    },

    /// Read delivery jobs as JSON lines from stdin and deliver them with retries
    Relay {
        /// Maximum number of attempts in flight
        #[arg(long)]
        concurrency: Option<usize>,
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
        matches!(self.command, Command::Init { .. })
    }
}
