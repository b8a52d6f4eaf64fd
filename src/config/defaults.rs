//! Default values for configuration options.
//!
//! Values the engine already defines are taken from there, so the CLI and
//! the library cannot drift apart.

use std::path::PathBuf;

use crate::dispatch;
use crate::webhook::{self, HealthPolicy};

const SECS_PER_HOUR: u64 = 60 * 60;

/// Default HTTP request timeout in seconds.
pub const HTTP_TIMEOUT_SECS: u64 = webhook::DEFAULT_TIMEOUT.as_secs();

/// Default webhook store file.
pub const STORE_PATH: &str = "hookcast-webhooks.json";

/// Default consecutive failures before a webhook is marked failing.
pub const FAILING_THRESHOLD: u32 = HealthPolicy::DEFAULT_FAILING_THRESHOLD;

/// Default hours of continuous failure before a webhook is disabled.
pub const DISABLE_AFTER_HOURS: u64 =
    HealthPolicy::DEFAULT_DISABLE_AFTER.as_secs() / SECS_PER_HOUR;

/// Default maximum attempts in flight.
pub const WORKER_CONCURRENCY: usize = dispatch::DEFAULT_CONCURRENCY;

/// Default job queue capacity.
pub const QUEUE_CAPACITY: usize = 256;

/// Default webhook store file as `PathBuf`.
#[must_use]
pub fn store_path() -> PathBuf {
    PathBuf::from(STORE_PATH)
}
