//! Webhook records as seen by the delivery engine.
//!
//! A [`Webhook`] is owned by the subscription registry. The engine reads it
//! before each attempt and writes back only its [`Health`].

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Event names emitted by the platform's producers.
pub mod event {
    /// A new answer was posted.
    pub const ANSWER_CREATED: &str = "answer.created";
    /// A new comment was posted.
    pub const COMMENT_CREATED: &str = "comment.created";
    /// An approach was marked as stuck.
    pub const APPROACH_STUCK: &str = "approach.stuck";
    /// A problem was marked as solved.
    pub const PROBLEM_SOLVED: &str = "problem.solved";
    /// The subscriber was mentioned.
    pub const MENTION: &str = "mention";

    /// All known event names.
    pub const ALL: [&str; 5] = [
        ANSWER_CREATED,
        COMMENT_CREATED,
        APPROACH_STUCK,
        PROBLEM_SOLVED,
        MENTION,
    ];

    /// Returns true if `name` is one of the known event names.
    #[must_use]
    pub fn is_known(name: &str) -> bool {
        ALL.contains(&name)
    }
}

/// Opaque webhook identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WebhookId(Uuid);

impl WebhookId {
    /// Generates a fresh random identifier.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Wraps an existing UUID.
    #[must_use]
    pub const fn from_uuid(id: Uuid) -> Self {
        Self(id)
    }
}

impl Default for WebhookId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for WebhookId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0.hyphenated(), f)
    }
}

impl FromStr for WebhookId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// Shared signing secret.
///
/// Never printed: both `Debug` and `Display` redact the value.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Secret(String);

impl Secret {
    /// Wraps a secret value.
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Returns the raw key bytes used for signing.
    #[must_use]
    pub fn expose(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(***)")
    }
}

impl fmt::Display for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("***")
    }
}

/// Health status of a webhook.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WebhookStatus {
    /// Delivering normally, or only isolated failures so far.
    #[default]
    Active,
    /// A burst of consecutive failures has been observed.
    Failing,
    /// The endpoint has been failing for long enough to stop deliveries.
    ///
    /// Only the owning registry may reactivate a disabled webhook.
    Disabled,
}

impl WebhookStatus {
    /// Returns the lowercase wire name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Failing => "failing",
            Self::Disabled => "disabled",
        }
    }
}

impl fmt::Display for WebhookStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// The health fields the engine owns on a [`Webhook`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Health {
    /// Current status.
    #[serde(default)]
    pub status: WebhookStatus,

    /// Attempts since the last success that did not succeed.
    #[serde(default)]
    pub consecutive_failures: u32,

    /// Time of the most recent failed attempt.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_failure_at: Option<DateTime<Utc>>,

    /// Time of the most recent successful attempt.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_success_at: Option<DateTime<Utc>>,

    /// Time of the first failure after the most recent success.
    ///
    /// `None` while no failure streak is in progress.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_streak_started_at: Option<DateTime<Utc>>,
}

/// A registered webhook subscription.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Webhook {
    /// Immutable identifier.
    pub id: WebhookId,

    /// Destination endpoint.
    pub url: url::Url,

    /// Shared signing key.
    pub secret: Secret,

    /// Event names this webhook wants to receive.
    #[serde(default)]
    pub subscribed_events: BTreeSet<String>,

    /// Engine-maintained delivery health.
    #[serde(default, flatten)]
    pub health: Health,
}

impl Webhook {
    /// Creates an active webhook with a fresh identifier and no history.
    #[must_use]
    pub fn new(url: url::Url, secret: Secret) -> Self {
        Self {
            id: WebhookId::new(),
            url,
            secret,
            subscribed_events: BTreeSet::new(),
            health: Health::default(),
        }
    }

    /// Sets the subscribed events.
    #[must_use]
    pub fn with_events<I, S>(mut self, events: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.subscribed_events = events.into_iter().map(Into::into).collect();
        self
    }

    /// Replaces the health fields.
    #[must_use]
    pub fn with_health(mut self, health: Health) -> Self {
        self.health = health;
        self
    }

    /// Returns true if the webhook subscribes to `event`.
    #[must_use]
    pub fn is_subscribed(&self, event: &str) -> bool {
        self.subscribed_events.contains(event)
    }

    /// Returns the current status.
    #[must_use]
    pub const fn status(&self) -> WebhookStatus {
        self.health.status
    }
}
