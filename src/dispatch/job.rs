//! Delivery job definition.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::model::{Secret, WebhookId};
use crate::webhook::DeliveryRequest;

/// One queued delivery attempt.
///
/// Serializes to a single JSON object, so jobs can be fed to the worker
/// one per line:
///
/// ```json
/// {"webhook_id":"6f1c...","event":"answer.created","data":{"answer_id":"a1"},"secret":"s3cr3t"}
/// ```
///
/// `data` and `attempt` are optional and default to `{}` and 1.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeliveryJob {
    /// Target webhook.
    pub webhook_id: WebhookId,

    /// Event name.
    pub event: String,

    /// Event data.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,

    /// Signing secret.
    pub secret: Secret,

    /// Attempt number, starting at 1.
    #[serde(default = "first_attempt")]
    pub attempt: u32,
}

const fn first_attempt() -> u32 {
    1
}

impl DeliveryJob {
    /// Creates a first-attempt job.
    #[must_use]
    pub fn new(
        webhook_id: WebhookId,
        event: impl Into<String>,
        data: Option<Value>,
        secret: Secret,
    ) -> Self {
        Self {
            webhook_id,
            event: event.into(),
            data,
            secret,
            attempt: first_attempt(),
        }
    }

    /// Returns the same job for the following attempt.
    #[must_use]
    pub fn next_attempt(mut self) -> Self {
        self.attempt = self.attempt.saturating_add(1);
        self
    }

    /// Borrows the job as a request for the executor.
    #[must_use]
    pub fn request(&self) -> DeliveryRequest<'_> {
        DeliveryRequest::new(
            self.webhook_id,
            &self.event,
            self.data.as_ref(),
            &self.secret,
        )
        .with_attempt(self.attempt)
    }
}
