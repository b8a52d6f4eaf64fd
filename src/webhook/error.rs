//! Error types for webhook delivery.

use thiserror::Error;

use crate::model::WebhookId;
use crate::store::StoreError;

/// Error type for HTTP operations.
///
/// Describes what went wrong at the transport level without dictating
/// recovery strategy.
#[derive(Debug, Error)]
pub enum HttpError {
    /// Network connection failed.
    ///
    /// This includes DNS resolution failures, connection refused,
    /// TLS failures and other network-level errors.
    #[error("Connection error: {0}")]
    Connection(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// Request timed out.
    ///
    /// The server did not respond within the configured timeout period.
    #[error("Request timed out")]
    Timeout,

    /// The provided URL is invalid.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
}

/// The delivery envelope could not be built.
///
/// Raised before any network I/O and never counted against the
/// webhook's failure streak.
#[derive(Debug, Error)]
pub enum PayloadError {
    /// The event name was empty.
    #[error("Event name must not be empty")]
    EmptyEvent,

    /// The data value could not be serialized to JSON.
    #[error("Failed to serialize event data: {0}")]
    Serialize(#[from] serde_json::Error),

    /// The data serialized to something other than a JSON object.
    #[error("Event data must serialize to a JSON object, got {kind}")]
    NotAnObject {
        /// JSON type that was produced instead.
        kind: &'static str,
    },

    /// A request header could not be encoded.
    #[error("Invalid header value: {0}")]
    Header(#[from] http::header::InvalidHeaderValue),
}

/// Why a single delivery attempt counted as a failure.
#[derive(Debug, Error)]
pub enum FailureCause {
    /// The endpoint answered with a non-2xx status.
    #[error("Endpoint returned {status}")]
    Status {
        /// HTTP status code returned by the endpoint
        status: http::StatusCode,
        /// Response body (truncated), if it was valid UTF-8
        body: Option<String>,
    },

    /// The request never produced a response.
    #[error(transparent)]
    Http(#[from] HttpError),

    /// The caller cancelled the attempt or its deadline passed.
    #[error("Delivery cancelled")]
    Cancelled,
}

/// Error returned by a delivery call.
#[derive(Debug, Error)]
pub enum DeliveryError {
    /// The webhook id did not resolve to a record.
    #[error("Webhook {0} not found")]
    NotFound(WebhookId),

    /// The repository could not be read.
    #[error("Failed to look up webhook: {0}")]
    Lookup(#[source] StoreError),

    /// Attempt numbers start at 1.
    #[error("Invalid delivery attempt number {0}: attempts start at 1")]
    InvalidAttempt(u32),

    /// The envelope could not be built; nothing was sent.
    #[error("Failed to build payload: {0}")]
    Payload(#[from] PayloadError),

    /// Cancellation was requested before the request was sent.
    #[error("Delivery cancelled before sending")]
    Cancelled,

    /// The attempt was made and did not succeed.
    #[error("Webhook delivery failed (attempt {attempt}): {cause}")]
    Failed {
        /// Attempt number that failed
        attempt: u32,
        /// Underlying cause
        #[source]
        cause: FailureCause,
    },
}

impl DeliveryError {
    /// Returns true if this error came from an actual delivery attempt.
    ///
    /// Only these errors are worth retrying per the schedule; the others
    /// indicate a caller or registry problem.
    #[must_use]
    pub const fn is_delivery_failure(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }
}
