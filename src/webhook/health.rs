//! Failure/recovery state machine for webhook health.
//!
//! ```text
//!            5 consecutive failures          streak >= 24h
//!   active ──────────────────────────▶ failing ─────────────▶ disabled
//!     ▲                                   │                      │
//!     └──────────── any success ──────────┴──────────────────────┘
//! ```
//!
//! Transitions are pure: [`HealthPolicy::transition`] maps the previous
//! [`Health`] and an attempt [`Outcome`] to the next one. Persisting the
//! result is the executor's job.

use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::model::{Health, WebhookStatus};

/// Result of one delivery attempt, as far as health tracking cares.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The endpoint answered 2xx.
    Success,
    /// Anything else: non-2xx, transport error, timeout or cancellation.
    Failure,
}

/// Thresholds for escalating a webhook's status.
///
/// # Defaults
///
/// - `failing_threshold`: 5 consecutive failures
/// - `disable_after`: 24 hours of unbroken failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HealthPolicy {
    /// Consecutive failures at which an active webhook becomes failing.
    pub failing_threshold: u32,

    /// Length of a failure streak after which a failing webhook is disabled.
    pub disable_after: Duration,
}

impl HealthPolicy {
    /// Default failing threshold.
    pub const DEFAULT_FAILING_THRESHOLD: u32 = 5;

    /// Default streak length before disabling (24 hours).
    pub const DEFAULT_DISABLE_AFTER: Duration = Duration::from_secs(24 * 60 * 60);

    /// Creates a policy with default thresholds.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            failing_threshold: Self::DEFAULT_FAILING_THRESHOLD,
            disable_after: Self::DEFAULT_DISABLE_AFTER,
        }
    }

    /// Sets the failing threshold.
    ///
    /// # Panics
    ///
    /// Panics if `threshold` is 0.
    #[must_use]
    pub const fn with_failing_threshold(mut self, threshold: u32) -> Self {
        assert!(threshold >= 1, "failing_threshold must be at least 1");
        self.failing_threshold = threshold;
        self
    }

    /// Sets the streak length after which a webhook is disabled.
    #[must_use]
    pub const fn with_disable_after(mut self, disable_after: Duration) -> Self {
        self.disable_after = disable_after;
        self
    }

    /// Computes the health after an attempt finished at `now`.
    #[must_use]
    pub fn transition(&self, previous: &Health, outcome: Outcome, now: DateTime<Utc>) -> Health {
        match outcome {
            Outcome::Success => Health {
                status: WebhookStatus::Active,
                consecutive_failures: 0,
                last_failure_at: previous.last_failure_at,
                last_success_at: Some(now),
                failure_streak_started_at: None,
            },
            Outcome::Failure => self.on_failure(previous, now),
        }
    }

    fn on_failure(&self, previous: &Health, now: DateTime<Utc>) -> Health {
        let consecutive_failures = previous.consecutive_failures.saturating_add(1);
        let streak_started_at = streak_start(previous, now);

        let status = match previous.status {
            WebhookStatus::Disabled => WebhookStatus::Disabled,
            WebhookStatus::Failing if self.streak_expired(streak_started_at, now) => {
                WebhookStatus::Disabled
            }
            _ if consecutive_failures >= self.failing_threshold => WebhookStatus::Failing,
            unchanged => unchanged,
        };

        Health {
            status,
            consecutive_failures,
            last_failure_at: Some(now),
            last_success_at: previous.last_success_at,
            failure_streak_started_at: Some(streak_started_at),
        }
    }

    fn streak_expired(&self, started_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        // A clock that went backwards yields a negative span: not expired.
        (now - started_at)
            .to_std()
            .is_ok_and(|elapsed| elapsed >= self.disable_after)
    }
}

impl Default for HealthPolicy {
    fn default() -> Self {
        Self::new()
    }
}

/// Start of the failure streak this failure belongs to.
///
/// Records written before the streak start was tracked only carry
/// `last_failure_at`; for those it is the best available approximation.
fn streak_start(previous: &Health, now: DateTime<Utc>) -> DateTime<Utc> {
    if previous.consecutive_failures == 0 {
        return now;
    }
    previous
        .failure_streak_started_at
        .or(previous.last_failure_at)
        .unwrap_or(now)
}
