//! Validated configuration after merging CLI and TOML sources.
//!
//! This module contains the final, validated configuration that is used
//! by the application. All validation is performed during construction.

use std::fmt;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::webhook::{HealthPolicy, RetrySchedule};

use super::cli::{Cli, Command};
use super::defaults;
use super::error::ConfigError;
use super::toml::TomlConfig;

const SECS_PER_HOUR: u64 = 60 * 60;

/// Fully validated configuration ready for use by the application.
///
/// # Construction
///
/// Use [`ValidatedConfig::from_raw`] to create from CLI args and optional TOML config.
/// The function validates all inputs and returns errors for invalid configurations.
#[derive(Debug)]
pub struct ValidatedConfig {
    /// HTTP request timeout
    pub timeout: Duration,

    /// Path to the webhook store file
    pub store_path: PathBuf,

    /// Delays between delivery attempts
    pub retry_schedule: RetrySchedule,

    /// Failing/disabled thresholds
    pub health_policy: HealthPolicy,

    /// Maximum attempts in flight for the relay worker
    pub concurrency: usize,

    /// Relay job queue capacity
    pub queue_capacity: usize,

    /// Verbose logging enabled
    pub verbose: bool,
}

impl fmt::Display for ValidatedConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let delays: Vec<String> = self
            .retry_schedule
            .delays()
            .iter()
            .map(|d| format!("{}s", d.as_secs()))
            .collect();

        write!(
            f,
            "Config {{ store: {}, timeout: {}s, retry: [{}], failing_after: {}, \
             disable_after: {}h, concurrency: {}, queue: {} }}",
            self.store_path.display(),
            self.timeout.as_secs(),
            delays.join(", "),
            self.health_policy.failing_threshold,
            self.health_policy.disable_after.as_secs() / SECS_PER_HOUR,
            self.concurrency,
            self.queue_capacity,
        )
    }
}

impl ValidatedConfig {
    /// Creates a validated configuration from CLI arguments and optional TOML config.
    ///
    /// CLI arguments take precedence over TOML config values.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The timeout or disable window is zero
    /// - The retry schedule is empty or does not start at 0
    /// - The failing threshold is zero
    /// - The worker concurrency or queue capacity is zero
    pub fn from_raw(cli: &Cli, toml: Option<&TomlConfig>) -> Result<Self, ConfigError> {
        let timeout = Self::resolve_timeout(cli, toml)?;
        let store_path = Self::resolve_store_path(cli, toml);
        let retry_schedule = Self::build_retry_schedule(toml)?;
        let health_policy = Self::build_health_policy(toml)?;
        let (concurrency, queue_capacity) = Self::resolve_worker(cli, toml)?;

        Ok(Self {
            timeout,
            store_path,
            retry_schedule,
            health_policy,
            concurrency,
            queue_capacity,
            verbose: cli.verbose,
        })
    }

    /// Loads and merges configuration from CLI and optional config file.
    ///
    /// If `cli.config` is set, loads the TOML file from that path.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The config file cannot be read or parsed
    /// - The merged configuration is invalid
    pub fn load(cli: &Cli) -> Result<Self, ConfigError> {
        let toml = if let Some(ref path) = cli.config {
            Some(TomlConfig::load(path)?)
        } else {
            None
        };

        Self::from_raw(cli, toml.as_ref())
    }

    fn resolve_timeout(cli: &Cli, toml: Option<&TomlConfig>) -> Result<Duration, ConfigError> {
        // Priority: CLI explicit > TOML > default
        let seconds = cli
            .timeout
            .or_else(|| toml.and_then(|t| t.http.timeout))
            .unwrap_or(defaults::HTTP_TIMEOUT_SECS);

        if seconds == 0 {
            return Err(ConfigError::InvalidDuration {
                field: "timeout",
                reason: "must be greater than 0".to_string(),
            });
        }

        Ok(Duration::from_secs(seconds))
    }

    fn resolve_store_path(cli: &Cli, toml: Option<&TomlConfig>) -> PathBuf {
        cli.store
            .clone()
            .or_else(|| toml.and_then(|t| t.store.path.as_ref().map(PathBuf::from)))
            .unwrap_or_else(defaults::store_path)
    }

    fn build_retry_schedule(toml: Option<&TomlConfig>) -> Result<RetrySchedule, ConfigError> {
        let Some(delays) = toml.and_then(|t| t.retry.delays.as_deref()) else {
            return Ok(RetrySchedule::default());
        };

        match delays.first() {
            None => Err(ConfigError::InvalidRetry(
                "delays must list at least one attempt".to_string(),
            )),
            Some(&first) if first != 0 => Err(ConfigError::InvalidRetry(format!(
                "the first attempt must be immediate (delays[0] = 0), got {first}s"
            ))),
            Some(_) => Ok(RetrySchedule::from_delays(
                delays.iter().copied().map(Duration::from_secs).collect(),
            )),
        }
    }

    fn build_health_policy(toml: Option<&TomlConfig>) -> Result<HealthPolicy, ConfigError> {
        let health = toml.map(|t| &t.health);

        let threshold = health
            .and_then(|h| h.failing_threshold)
            .unwrap_or(defaults::FAILING_THRESHOLD);

        let hours = health
            .and_then(|h| h.disable_after_hours)
            .unwrap_or(defaults::DISABLE_AFTER_HOURS);

        if threshold == 0 {
            return Err(ConfigError::InvalidHealth(
                "failing_threshold must be greater than 0".to_string(),
            ));
        }

        let secs = hours
            .checked_mul(SECS_PER_HOUR)
            .filter(|&s| s > 0)
            .ok_or_else(|| ConfigError::InvalidDuration {
                field: "disable_after_hours",
                reason: format!("must be between 1 and {}", u64::MAX / SECS_PER_HOUR),
            })?;

        Ok(HealthPolicy::new()
            .with_failing_threshold(threshold)
            .with_disable_after(Duration::from_secs(secs)))
    }

    fn resolve_worker(
        cli: &Cli,
        toml: Option<&TomlConfig>,
    ) -> Result<(usize, usize), ConfigError> {
        let worker = toml.map(|t| &t.worker);

        let cli_concurrency = match cli.command {
            Command::Relay { concurrency } => concurrency,
            _ => None,
        };

        let concurrency = cli_concurrency
            .or_else(|| worker.and_then(|w| w.concurrency))
            .unwrap_or(defaults::WORKER_CONCURRENCY);

        let queue_capacity = worker
            .and_then(|w| w.queue_capacity)
            .unwrap_or(defaults::QUEUE_CAPACITY);

        if concurrency == 0 {
            return Err(ConfigError::InvalidWorker(
                "concurrency must be greater than 0".to_string(),
            ));
        }

        if queue_capacity == 0 {
            return Err(ConfigError::InvalidWorker(
                "queue_capacity must be greater than 0".to_string(),
            ));
        }

        Ok((concurrency, queue_capacity))
    }
}

/// Writes the default configuration template to a new file.
///
/// # Errors
///
/// Returns an error if the file already exists or cannot be written.
pub fn write_default_config(path: &Path) -> Result<(), ConfigError> {
    let template = super::toml::default_config_template();

    let mut file = std::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .map_err(|e| {
            if e.kind() == std::io::ErrorKind::AlreadyExists {
                ConfigError::AlreadyExists {
                    path: path.to_path_buf(),
                }
            } else {
                ConfigError::FileWrite {
                    path: path.to_path_buf(),
                    source: e,
                }
            }
        })?;

    file.write_all(template.as_bytes())
        .map_err(|e| ConfigError::FileWrite {
            path: path.to_path_buf(),
            source: e,
        })
}
