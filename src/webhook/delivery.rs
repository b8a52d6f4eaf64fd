//! Delivery attempt executor.
//!
//! One call to [`Deliverer::deliver`] is one attempt: look the webhook up,
//! build and sign the envelope, POST it, then record the outcome on the
//! webhook's health. The executor keeps no state between calls.

use std::future::Future;

use http::header::{CONTENT_TYPE, HeaderName, HeaderValue};
use serde::Serialize;
use serde_json::Value;

use crate::model::{Health, Secret, Webhook, WebhookId, WebhookStatus};
use crate::store::{StoreError, WebhookRepository};
use crate::time::{Clock, SystemClock};

use super::health::{HealthPolicy, Outcome};
use super::payload::Payload;
use super::signature::{SIGNATURE_HEADER, sign};
use super::{DeliveryError, FailureCause, HttpClient, HttpError, HttpRequest, HttpResponse};

/// Header carrying the webhook id.
pub const WEBHOOK_ID_HEADER: &str = "x-webhook-id";

/// Header carrying the 1-based attempt number.
pub const ATTEMPT_HEADER: &str = "x-delivery-attempt";

/// Longest response body excerpt kept for failure reports.
const BODY_EXCERPT_LIMIT: usize = 512;

/// How many times a conflicting health write is recomputed and retried.
const HEALTH_UPDATE_TRIES: usize = 5;

/// One delivery attempt, as requested by an event producer or worker.
///
/// `T` is the event data; anything serializable to a JSON object works.
#[derive(Debug)]
pub struct DeliveryRequest<'a, T: ?Sized = Value> {
    /// Webhook to deliver to.
    pub webhook_id: WebhookId,
    /// Event name, e.g. `answer.created`.
    pub event: &'a str,
    /// Event data; `None` is sent as `{}`.
    pub data: Option<&'a T>,
    /// Key used to sign the body.
    pub secret: &'a Secret,
    /// Attempt number, starting at 1.
    pub attempt: u32,
}

impl<'a, T: ?Sized> DeliveryRequest<'a, T> {
    /// Creates a first-attempt request.
    #[must_use]
    pub const fn new(
        webhook_id: WebhookId,
        event: &'a str,
        data: Option<&'a T>,
        secret: &'a Secret,
    ) -> Self {
        Self {
            webhook_id,
            event,
            data,
            secret,
            attempt: 1,
        }
    }

    /// Sets the attempt number.
    #[must_use]
    pub const fn with_attempt(mut self, attempt: u32) -> Self {
        self.attempt = attempt;
        self
    }
}

/// Delivers signed webhook events and tracks endpoint health.
///
/// # Type Parameters
///
/// - `H`: HTTP client
/// - `R`: repository holding the webhook records
/// - `C`: clock used for envelope timestamps and health times
///
/// # Example
///
/// ```no_run
/// use hookcast::model::{Secret, WebhookId};
/// use hookcast::store::MemoryRepository;
/// use hookcast::webhook::{Deliverer, DeliveryRequest, ReqwestClient};
/// use serde_json::json;
///
/// # async fn example(id: WebhookId) -> Result<(), Box<dyn std::error::Error>> {
/// let deliverer = Deliverer::new(ReqwestClient::new()?, MemoryRepository::new());
/// let secret = Secret::new("s3cr3t");
/// let data = json!({"answer_id": "a1"});
///
/// deliverer
///     .deliver(&DeliveryRequest::new(id, "answer.created", Some(&data), &secret))
///     .await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct Deliverer<H, R, C = SystemClock> {
    client: H,
    repository: R,
    clock: C,
    policy: HealthPolicy,
}

impl<H, R> Deliverer<H, R, SystemClock> {
    /// Creates a deliverer using the system clock and default thresholds.
    #[must_use]
    pub fn new(client: H, repository: R) -> Self {
        Self {
            client,
            repository,
            clock: SystemClock,
            policy: HealthPolicy::default(),
        }
    }
}

impl<H, R, C> Deliverer<H, R, C> {
    /// Replaces the clock.
    #[must_use]
    pub fn with_clock<C2>(self, clock: C2) -> Deliverer<H, R, C2> {
        Deliverer {
            client: self.client,
            repository: self.repository,
            clock,
            policy: self.policy,
        }
    }

    /// Sets the health thresholds.
    #[must_use]
    pub const fn with_health_policy(mut self, policy: HealthPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Returns the health thresholds in use.
    #[must_use]
    pub const fn health_policy(&self) -> &HealthPolicy {
        &self.policy
    }

    /// Returns the repository.
    #[must_use]
    pub const fn repository(&self) -> &R {
        &self.repository
    }
}

impl<H: HttpClient, R: WebhookRepository, C: Clock> Deliverer<H, R, C> {
    /// Makes one delivery attempt.
    ///
    /// # Errors
    ///
    /// - [`DeliveryError::InvalidAttempt`] if the attempt number is 0
    /// - [`DeliveryError::NotFound`] / [`DeliveryError::Lookup`] if the
    ///   webhook cannot be resolved
    /// - [`DeliveryError::Payload`] if the envelope cannot be built
    /// - [`DeliveryError::Failed`] if the attempt was made and did not
    ///   get a 2xx answer
    ///
    /// Health is updated only when a request was actually attempted.
    pub async fn deliver<T>(&self, request: &DeliveryRequest<'_, T>) -> Result<(), DeliveryError>
    where
        T: Serialize + ?Sized + Sync,
    {
        self.deliver_until(request, std::future::pending()).await
    }

    /// Makes one delivery attempt that gives up when `cancel` completes.
    ///
    /// Pass a deadline (`tokio::time::sleep(..)`) or a shutdown signal. An
    /// attempt cancelled while the request is in flight counts as a failure
    /// and still updates health.
    ///
    /// # Errors
    ///
    /// Same as [`deliver`](Self::deliver), plus:
    /// - [`DeliveryError::Cancelled`] if `cancel` was already complete before
    ///   the request was sent; health is left untouched
    /// - [`DeliveryError::Failed`] with [`FailureCause::Cancelled`] if it
    ///   completed while the request was in flight
    pub async fn deliver_until<T, F>(
        &self,
        request: &DeliveryRequest<'_, T>,
        cancel: F,
    ) -> Result<(), DeliveryError>
    where
        T: Serialize + ?Sized + Sync,
        F: Future<Output = ()> + Send,
    {
        if request.attempt == 0 {
            return Err(DeliveryError::InvalidAttempt(request.attempt));
        }

        let webhook = self
            .repository
            .find_webhook(request.webhook_id)
            .await
            .map_err(DeliveryError::Lookup)?
            .ok_or(DeliveryError::NotFound(request.webhook_id))?;

        let http_request = self.build_request(&webhook, request)?;

        tokio::pin!(cancel);
        let cancelled_before_send = tokio::select! {
            biased;
            () = &mut cancel => true,
            () = std::future::ready(()) => false,
        };
        if cancelled_before_send {
            tracing::debug!(
                webhook_id = %webhook.id,
                attempt = request.attempt,
                "Delivery cancelled before sending"
            );
            return Err(DeliveryError::Cancelled);
        }

        tracing::debug!(
            webhook_id = %webhook.id,
            event = request.event,
            attempt = request.attempt,
            url = %webhook.url,
            "Delivering webhook"
        );

        let result = tokio::select! {
            biased;
            () = &mut cancel => Err(FailureCause::Cancelled),
            response = self.client.request(http_request) => interpret(response),
        };

        let outcome = if result.is_ok() {
            Outcome::Success
        } else {
            Outcome::Failure
        };
        self.record_outcome(&webhook, outcome).await;

        match result {
            Ok(()) => {
                tracing::info!(
                    webhook_id = %webhook.id,
                    event = request.event,
                    attempt = request.attempt,
                    "Webhook delivered"
                );
                Ok(())
            }
            Err(cause) => {
                tracing::warn!(
                    webhook_id = %webhook.id,
                    event = request.event,
                    attempt = request.attempt,
                    error = %cause,
                    "Webhook delivery failed"
                );
                Err(DeliveryError::Failed {
                    attempt: request.attempt,
                    cause,
                })
            }
        }
    }

    /// Builds the signed POST for one attempt.
    fn build_request<T>(
        &self,
        webhook: &Webhook,
        request: &DeliveryRequest<'_, T>,
    ) -> Result<HttpRequest, DeliveryError>
    where
        T: Serialize + ?Sized,
    {
        let payload = Payload::build(request.event, request.data, self.clock.now())?;
        let signature = sign(payload.as_bytes(), request.secret.expose());
        let signature = HeaderValue::try_from(signature).map_err(super::PayloadError::from)?;
        let webhook_id = HeaderValue::try_from(webhook.id.to_string())
            .map_err(super::PayloadError::from)?;

        Ok(HttpRequest::post(webhook.url.clone(), payload.into_bytes())
            .with_header(CONTENT_TYPE, HeaderValue::from_static("application/json"))
            .with_header(HeaderName::from_static(SIGNATURE_HEADER), signature)
            .with_header(HeaderName::from_static(WEBHOOK_ID_HEADER), webhook_id)
            .with_header(
                HeaderName::from_static(ATTEMPT_HEADER),
                HeaderValue::from(request.attempt),
            ))
    }

    /// Persists the health transition for `outcome`.
    ///
    /// Never fails: storage errors are logged, since the caller must still
    /// learn the real network outcome.
    async fn record_outcome(&self, webhook: &Webhook, outcome: Outcome) {
        let mut current = webhook.health.clone();

        for _ in 0..HEALTH_UPDATE_TRIES {
            let next = self.policy.transition(&current, outcome, self.clock.now());

            match self
                .repository
                .update_health(webhook.id, &current, &next)
                .await
            {
                Ok(()) => {
                    log_status_change(webhook.id, &current, &next);
                    return;
                }
                Err(StoreError::Conflict { current: latest, .. }) => {
                    tracing::debug!(
                        webhook_id = %webhook.id,
                        "Health changed concurrently, recomputing"
                    );
                    current = latest;
                }
                Err(e) => {
                    tracing::error!(
                        webhook_id = %webhook.id,
                        error = %e,
                        consecutive_failures = next.consecutive_failures,
                        status = %next.status,
                        "Failed to update webhook health"
                    );
                    return;
                }
            }
        }

        tracing::error!(
            webhook_id = %webhook.id,
            tries = HEALTH_UPDATE_TRIES,
            "Gave up updating webhook health after repeated conflicts"
        );
    }
}

/// Maps a transport result to success or a failure cause.
fn interpret(response: Result<HttpResponse, HttpError>) -> Result<(), FailureCause> {
    let response = response?;
    if response.is_success() {
        return Ok(());
    }

    Err(FailureCause::Status {
        status: response.status,
        body: response.body_excerpt(BODY_EXCERPT_LIMIT),
    })
}

fn log_status_change(id: WebhookId, previous: &Health, next: &Health) {
    if previous.status == next.status {
        return;
    }

    match next.status {
        WebhookStatus::Active => {
            tracing::info!(webhook_id = %id, from = %previous.status, "Webhook recovered");
        }
        WebhookStatus::Failing => tracing::warn!(
            webhook_id = %id,
            consecutive_failures = next.consecutive_failures,
            "Webhook marked as failing"
        ),
        WebhookStatus::Disabled => tracing::warn!(
            webhook_id = %id,
            consecutive_failures = next.consecutive_failures,
            failing_since = ?next.failure_streak_started_at,
            "Webhook disabled after continuous failure"
        ),
    }
}
