//! TOML configuration file parsing.
//!
//! Defines the structure of the configuration file with serde.

use std::path::Path;

use serde::Deserialize;

use super::ConfigError;

/// Root configuration structure from TOML file.
///
/// All fields are optional to allow partial configuration
/// that can be merged with CLI arguments.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TomlConfig {
    /// HTTP client configuration
    #[serde(default)]
    pub http: HttpSection,

    /// Webhook store configuration
    #[serde(default)]
    pub store: StoreSection,

    /// Retry schedule configuration
    #[serde(default)]
    pub retry: RetrySection,

    /// Health threshold configuration
    #[serde(default)]
    pub health: HealthSection,

    /// Delivery worker configuration
    #[serde(default)]
    pub worker: WorkerSection,
}

/// HTTP client configuration section.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HttpSection {
    /// Request timeout in seconds
    pub timeout: Option<u64>,
}

/// Webhook store configuration section.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StoreSection {
    /// Path to the webhook store file
    pub path: Option<String>,
}

/// Retry schedule configuration section.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RetrySection {
    /// Delay in seconds before each attempt, starting with attempt 1
    pub delays: Option<Vec<u64>>,
}

/// Health threshold configuration section.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HealthSection {
    /// Consecutive failures before a webhook is marked failing
    pub failing_threshold: Option<u32>,

    /// Hours of continuous failure before a failing webhook is disabled
    pub disable_after_hours: Option<u64>,
}

/// Delivery worker configuration section.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WorkerSection {
    /// Maximum attempts in flight at once
    pub concurrency: Option<usize>,

    /// Capacity of the job queue
    pub queue_capacity: Option<usize>,
}

impl TomlConfig {
    /// Loads configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
            path: path.to_path_buf(),
            source: e,
        })?;

        Self::parse(&content)
    }

    /// Parses configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML is invalid.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(ConfigError::from)
    }
}

/// Generates a default configuration file with comments.
#[must_use]
pub fn default_config_template() -> String {
    r#"# Hookcast Configuration File

[http]
# Request timeout in seconds (default: 10, can be overridden by --timeout)
# timeout = 10

[store]
# Webhook store file (default: hookcast-webhooks.json, can be overridden by --store)
# path = "hookcast-webhooks.json"

[retry]
# Delay in seconds before each attempt. The first entry is the first
# attempt and must be 0; the length is the maximum number of attempts.
# Default: immediately, 1 minute, 5 minutes, 30 minutes, 2 hours
delays = [0, 60, 300, 1800, 7200]

[health]
# Consecutive failures before a webhook is marked failing (default: 5)
# failing_threshold = 5

# Hours of unbroken failure before a failing webhook is disabled (default: 24)
# disable_after_hours = 24

[worker]
# Maximum delivery attempts in flight (default: 4, can be overridden by relay --concurrency)
# concurrency = 4

# Job queue capacity (default: 256)
# queue_capacity = 256
"#
    .to_string()
}
