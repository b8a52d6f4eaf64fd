//! Tests for `Deliverer`.

use super::delivery::{Deliverer, DeliveryRequest};
use super::{
    DeliveryError, FailureCause, HttpClient, HttpError, HttpRequest, HttpResponse, PayloadError,
    verify,
};
use crate::model::{Health, Secret, Webhook, WebhookId, WebhookStatus};
use crate::store::{MemoryRepository, StoreError, WebhookRepository};
use crate::time::FixedClock;
use chrono::{DateTime, Duration, Utc};
use serde_json::{Value, json};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Mock HTTP client that returns a configurable sequence of responses.
#[derive(Debug)]
struct MockClient {
    responses: Mutex<Vec<Result<HttpResponse, HttpError>>>,
    requests: Mutex<Vec<HttpRequest>>,
    call_count: AtomicUsize,
}

impl MockClient {
    fn new(responses: Vec<Result<HttpResponse, HttpError>>) -> Self {
        Self {
            responses: Mutex::new(responses),
            requests: Mutex::new(Vec::new()),
            call_count: AtomicUsize::new(0),
        }
    }

    fn with_status(status: u16) -> Self {
        Self::repeating(status, 1)
    }

    fn repeating(status: u16, times: usize) -> Self {
        let status = http::StatusCode::from_u16(status).unwrap();
        Self::new((0..times).map(|_| Ok(HttpResponse::status(status))).collect())
    }

    fn timing_out() -> Self {
        Self::new(vec![Err(HttpError::Timeout)])
    }

    /// A client whose request never completes.
    fn hanging() -> Self {
        Self::new(Vec::new())
    }

    fn calls(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }

    fn captured_requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().unwrap().clone()
    }
}

impl HttpClient for MockClient {
    async fn request(&self, req: HttpRequest) -> Result<HttpResponse, HttpError> {
        self.call_count.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(req);
        let next = {
            let mut responses = self.responses.lock().unwrap();
            (!responses.is_empty()).then(|| responses.remove(0))
        };
        match next {
            Some(response) => response,
            None => std::future::pending().await,
        }
    }
}

/// Repository whose health writes always fail.
#[derive(Debug)]
struct BrokenWrites(MemoryRepository);

impl WebhookRepository for BrokenWrites {
    async fn find_webhook(&self, id: WebhookId) -> Result<Option<Webhook>, StoreError> {
        self.0.find_webhook(id).await
    }

    async fn update_health(&self, _: WebhookId, _: &Health, _: &Health) -> Result<(), StoreError> {
        Err(StoreError::Write(std::io::Error::other("disk full")))
    }
}

/// Repository that lets another writer sneak in before the first health write.
#[derive(Debug)]
struct RacingWriter {
    inner: MemoryRepository,
    raced: AtomicUsize,
}

impl WebhookRepository for RacingWriter {
    async fn find_webhook(&self, id: WebhookId) -> Result<Option<Webhook>, StoreError> {
        self.inner.find_webhook(id).await
    }

    async fn update_health(
        &self,
        id: WebhookId,
        expected: &Health,
        new: &Health,
    ) -> Result<(), StoreError> {
        if self.raced.fetch_add(1, Ordering::SeqCst) == 0 {
            let concurrent = Health {
                consecutive_failures: expected.consecutive_failures + 1,
                last_failure_at: Some(now()),
                failure_streak_started_at: Some(now()),
                ..expected.clone()
            };
            self.inner.update_health(id, expected, &concurrent).await?;
        }
        self.inner.update_health(id, expected, new).await
    }
}

fn now() -> DateTime<Utc> {
    DateTime::parse_from_rfc3339("2026-03-01T12:00:00Z")
        .unwrap()
        .with_timezone(&Utc)
}

fn test_secret() -> Secret {
    Secret::new("test-webhook-secret")
}

fn test_webhook() -> Webhook {
    Webhook::new(
        url::Url::parse("https://receiver.example.com/hooks").unwrap(),
        test_secret(),
    )
    .with_events(["answer.created"])
}

fn setup(
    client: MockClient,
    webhook: &Webhook,
) -> (
    Deliverer<Arc<MockClient>, Arc<MemoryRepository>, FixedClock>,
    Arc<MockClient>,
    Arc<MemoryRepository>,
) {
    let client = Arc::new(client);
    let repo = Arc::new(MemoryRepository::new());
    repo.insert(webhook.clone());
    let deliverer = Deliverer::new(client.clone(), repo.clone()).with_clock(FixedClock(now()));
    (deliverer, client, repo)
}

async fn deliver_once<H: HttpClient, R: WebhookRepository>(
    deliverer: &Deliverer<H, R, FixedClock>,
    webhook: &Webhook,
    data: Option<&Value>,
) -> Result<(), DeliveryError> {
    let secret = test_secret();
    deliverer
        .deliver(&DeliveryRequest::new(
            webhook.id,
            "answer.created",
            data,
            &secret,
        ))
        .await
}

mod request_shape {
    use super::*;

    #[tokio::test]
    async fn posts_to_webhook_url() {
        let webhook = test_webhook();
        let (deliverer, client, _) = setup(MockClient::with_status(200), &webhook);

        deliver_once(&deliverer, &webhook, None).await.unwrap();

        let requests = client.captured_requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].method, http::Method::POST);
        assert_eq!(requests[0].url, webhook.url);
    }

    #[tokio::test]
    async fn sets_protocol_headers() {
        let webhook = test_webhook();
        let (deliverer, client, _) = setup(MockClient::with_status(200), &webhook);

        deliver_once(&deliverer, &webhook, None).await.unwrap();

        let request = &client.captured_requests()[0];
        assert_eq!(request.header("content-type"), Some("application/json"));
        assert_eq!(
            request.header("x-webhook-id"),
            Some(webhook.id.to_string().as_str())
        );
        assert_eq!(request.header("x-delivery-attempt"), Some("1"));
        assert!(request.header("x-signature").unwrap().starts_with("sha256="));
    }

    #[tokio::test]
    async fn body_is_the_envelope() {
        let webhook = test_webhook();
        let (deliverer, client, _) = setup(MockClient::with_status(200), &webhook);
        let data = json!({"answer_id": "abc123", "question_id": "xyz789"});

        deliver_once(&deliverer, &webhook, Some(&data)).await.unwrap();

        let body: Value = serde_json::from_slice(&client.captured_requests()[0].body).unwrap();
        assert_eq!(body["event"], "answer.created");
        assert_eq!(body["timestamp"], "2026-03-01T12:00:00Z");
        assert_eq!(body["data"], data);
    }

    #[tokio::test]
    async fn absent_data_is_sent_as_empty_object() {
        let webhook = test_webhook();
        let (deliverer, client, _) = setup(MockClient::with_status(200), &webhook);

        deliver_once(&deliverer, &webhook, None).await.unwrap();

        let body: Value = serde_json::from_slice(&client.captured_requests()[0].body).unwrap();
        assert_eq!(body["data"], json!({}));
    }

    #[tokio::test]
    async fn attempt_header_follows_attempt_number() {
        let webhook = test_webhook();
        let (deliverer, client, _) = setup(MockClient::repeating(200, 3), &webhook);
        let secret = test_secret();

        for attempt in 1..=3 {
            let data = json!({ "attempt": attempt });
            let request = DeliveryRequest::new(webhook.id, "answer.created", Some(&data), &secret)
                .with_attempt(attempt);
            deliverer.deliver(&request).await.unwrap();
        }

        let attempts: Vec<_> = client
            .captured_requests()
            .iter()
            .map(|r| r.header("x-delivery-attempt").unwrap().to_string())
            .collect();
        assert_eq!(attempts, vec!["1", "2", "3"]);
    }
}

mod signature {
    use super::*;

    async fn assert_signature_verifies(data: Value) {
        let webhook = test_webhook();
        let (deliverer, client, _) = setup(MockClient::with_status(200), &webhook);

        deliver_once(&deliverer, &webhook, Some(&data)).await.unwrap();

        let request = &client.captured_requests()[0];
        let header = request.header("x-signature").unwrap();
        assert_eq!(header, super::super::sign(&request.body, b"test-webhook-secret"));
        assert!(verify(&request.body, b"test-webhook-secret", header));
    }

    #[tokio::test]
    async fn plain_payload_signature_verifies() {
        assert_signature_verifies(json!({"test": "data"})).await;
    }

    #[tokio::test]
    async fn unicode_nested_payload_signature_verifies() {
        assert_signature_verifies(json!({
            "title": "Ünïcödé ✓ 🎉",
            "nested": {"deep": {"list": [1, "二", {"emoji": "🔥"}]}},
        }))
        .await;
    }

    #[tokio::test]
    async fn signature_uses_supplied_secret_not_stored_one() {
        let webhook = test_webhook();
        let (deliverer, client, _) = setup(MockClient::with_status(200), &webhook);
        let rotated = Secret::new("rotated-secret");

        deliverer
            .deliver(&DeliveryRequest::<Value>::new(
                webhook.id,
                "mention",
                None,
                &rotated,
            ))
            .await
            .unwrap();

        let request = &client.captured_requests()[0];
        assert!(verify(
            &request.body,
            b"rotated-secret",
            request.header("x-signature").unwrap()
        ));
    }
}

mod outcomes {
    use super::*;

    #[tokio::test]
    async fn any_2xx_is_success() {
        for status in [200, 201, 202, 204] {
            let webhook = test_webhook();
            let (deliverer, _, _) = setup(MockClient::with_status(status), &webhook);

            let result = deliver_once(&deliverer, &webhook, None).await;
            assert!(result.is_ok(), "status {status} should succeed");
        }
    }

    #[tokio::test]
    async fn non_2xx_is_failure() {
        for status in [301, 400, 401, 403, 404, 500, 502, 503] {
            let webhook = test_webhook();
            let (deliverer, _, repo) = setup(MockClient::with_status(status), &webhook);

            let result = deliver_once(&deliverer, &webhook, None).await;

            match result {
                Err(DeliveryError::Failed {
                    attempt: 1,
                    cause: FailureCause::Status { status: got, .. },
                }) => assert_eq!(got.as_u16(), status),
                other => panic!("status {status}: expected failure, got {other:?}"),
            }
            assert_eq!(repo.get(webhook.id).unwrap().health.consecutive_failures, 1);
        }
    }

    #[tokio::test]
    async fn failure_body_is_kept_for_diagnostics() {
        let webhook = test_webhook();
        let response = HttpResponse::new(
            http::StatusCode::BAD_REQUEST,
            b"unknown event type".to_vec(),
        );
        let (deliverer, _, _) = setup(MockClient::new(vec![Ok(response)]), &webhook);

        let result = deliver_once(&deliverer, &webhook, None).await;

        assert!(matches!(
            result,
            Err(DeliveryError::Failed { cause: FailureCause::Status { body: Some(ref body), .. }, .. })
                if body == "unknown event type"
        ));
    }

    #[tokio::test]
    async fn timeout_is_failure() {
        let webhook = test_webhook();
        let (deliverer, _, repo) = setup(MockClient::timing_out(), &webhook);

        let result = deliver_once(&deliverer, &webhook, None).await;

        assert!(matches!(
            result,
            Err(DeliveryError::Failed {
                cause: FailureCause::Http(HttpError::Timeout),
                ..
            })
        ));
        let health = repo.get(webhook.id).unwrap().health;
        assert_eq!(health.consecutive_failures, 1);
        assert_eq!(health.last_failure_at, Some(now()));
    }

    #[tokio::test]
    async fn already_cancelled_attempt_sends_nothing() {
        let webhook = test_webhook();
        let (deliverer, client, repo) = setup(MockClient::hanging(), &webhook);
        let secret = test_secret();
        let request = DeliveryRequest::<Value>::new(webhook.id, "answer.created", None, &secret);

        let result = deliverer.deliver_until(&request, async {}).await;

        assert!(matches!(result, Err(DeliveryError::Cancelled)));
        assert!(!result.unwrap_err().is_delivery_failure());
        assert_eq!(client.calls(), 0);
        assert_eq!(repo.get(webhook.id).unwrap().health, webhook.health);
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_cancels_hanging_request() {
        let webhook = test_webhook();
        let (deliverer, client, repo) = setup(MockClient::hanging(), &webhook);
        let secret = test_secret();
        let request = DeliveryRequest::<Value>::new(webhook.id, "answer.created", None, &secret);

        let result = deliverer
            .deliver_until(&request, tokio::time::sleep(std::time::Duration::from_secs(10)))
            .await;

        assert!(matches!(
            result,
            Err(DeliveryError::Failed {
                cause: FailureCause::Cancelled,
                ..
            })
        ));
        assert_eq!(client.calls(), 1);
        assert_eq!(repo.get(webhook.id).unwrap().health.consecutive_failures, 1);
    }

    #[tokio::test]
    async fn disabled_webhook_is_still_attempted() {
        let webhook = test_webhook().with_health(Health {
            status: WebhookStatus::Disabled,
            consecutive_failures: 40,
            last_failure_at: Some(now() - Duration::hours(30)),
            last_success_at: None,
            failure_streak_started_at: Some(now() - Duration::hours(50)),
        });
        let (deliverer, client, repo) = setup(MockClient::with_status(200), &webhook);

        deliver_once(&deliverer, &webhook, None).await.unwrap();

        assert_eq!(client.calls(), 1);
        assert_eq!(repo.get(webhook.id).unwrap().status(), WebhookStatus::Active);
    }
}

mod pre_flight_errors {
    use super::*;

    #[tokio::test]
    async fn unknown_webhook_is_not_found_and_sends_nothing() {
        let webhook = test_webhook();
        let (deliverer, client, repo) = setup(MockClient::with_status(200), &webhook);
        let missing = WebhookId::new();
        let secret = test_secret();

        let result = deliverer
            .deliver(&DeliveryRequest::<Value>::new(missing, "answer.created", None, &secret))
            .await;

        assert!(matches!(result, Err(DeliveryError::NotFound(id)) if id == missing));
        assert_eq!(client.calls(), 0);
        assert_eq!(repo.health_writes(), 0);
    }

    #[tokio::test]
    async fn payload_error_sends_nothing_and_keeps_health() {
        let webhook = test_webhook();
        let (deliverer, client, repo) = setup(MockClient::with_status(200), &webhook);
        let secret = test_secret();
        let data = json!("not an object");

        let result = deliverer
            .deliver(&DeliveryRequest::new(webhook.id, "answer.created", Some(&data), &secret))
            .await;

        assert!(matches!(
            result,
            Err(DeliveryError::Payload(PayloadError::NotAnObject { .. }))
        ));
        assert_eq!(client.calls(), 0);
        assert_eq!(repo.health_writes(), 0);
        assert_eq!(repo.get(webhook.id).unwrap().health, Health::default());
    }

    #[tokio::test]
    async fn attempt_zero_is_rejected() {
        let webhook = test_webhook();
        let (deliverer, client, _) = setup(MockClient::with_status(200), &webhook);
        let secret = test_secret();
        let request = DeliveryRequest::<Value>::new(webhook.id, "answer.created", None, &secret)
            .with_attempt(0);

        let result = deliverer.deliver(&request).await;

        assert!(matches!(result, Err(DeliveryError::InvalidAttempt(0))));
        assert!(!result.unwrap_err().is_delivery_failure());
        assert_eq!(client.calls(), 0);
    }
}

mod health_tracking {
    use super::*;

    #[tokio::test]
    async fn success_resets_failures() {
        let webhook = test_webhook().with_health(Health {
            status: WebhookStatus::Failing,
            consecutive_failures: 5,
            last_failure_at: Some(now() - Duration::minutes(10)),
            last_success_at: None,
            failure_streak_started_at: Some(now() - Duration::hours(1)),
        });
        let (deliverer, _, repo) = setup(MockClient::with_status(200), &webhook);

        deliver_once(&deliverer, &webhook, None).await.unwrap();

        let health = repo.get(webhook.id).unwrap().health;
        assert_eq!(health.status, WebhookStatus::Active);
        assert_eq!(health.consecutive_failures, 0);
        assert_eq!(health.last_success_at, Some(now()));
        assert_eq!(health.failure_streak_started_at, None);
    }

    #[tokio::test]
    async fn fifth_failure_marks_failing() {
        let webhook = test_webhook();
        let (deliverer, _, repo) = setup(MockClient::repeating(500, 5), &webhook);

        for n in 1..=5 {
            let _ = deliver_once(&deliverer, &webhook, None).await;
            let health = repo.get(webhook.id).unwrap().health;
            assert_eq!(health.consecutive_failures, n);
            let expected = if n < 5 {
                WebhookStatus::Active
            } else {
                WebhookStatus::Failing
            };
            assert_eq!(health.status, expected, "after failure {n}");
        }
    }

    #[tokio::test]
    async fn long_failure_streak_disables() {
        let webhook = test_webhook().with_health(Health {
            status: WebhookStatus::Failing,
            consecutive_failures: 10,
            last_failure_at: Some(now() - Duration::hours(25)),
            last_success_at: None,
            failure_streak_started_at: Some(now() - Duration::hours(25)),
        });
        let (deliverer, _, repo) = setup(MockClient::with_status(500), &webhook);

        let _ = deliver_once(&deliverer, &webhook, None).await;

        assert_eq!(repo.get(webhook.id).unwrap().status(), WebhookStatus::Disabled);
    }

    #[tokio::test]
    async fn health_write_failure_does_not_hide_outcome() {
        let webhook = test_webhook();
        let repo = BrokenWrites(MemoryRepository::new());
        repo.0.insert(webhook.clone());
        let deliverer = Deliverer::new(MockClient::with_status(200), repo)
            .with_clock(FixedClock(now()));

        let result = deliver_once(&deliverer, &webhook, None).await;

        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn health_write_failure_keeps_failure_outcome() {
        let webhook = test_webhook();
        let repo = BrokenWrites(MemoryRepository::new());
        repo.0.insert(webhook.clone());
        let deliverer = Deliverer::new(MockClient::with_status(503), repo)
            .with_clock(FixedClock(now()));

        let result = deliver_once(&deliverer, &webhook, None).await;

        assert!(result.unwrap_err().is_delivery_failure());
    }

    #[tokio::test]
    async fn concurrent_update_is_not_lost() {
        let webhook = test_webhook();
        let repo = RacingWriter {
            inner: MemoryRepository::new(),
            raced: AtomicUsize::new(0),
        };
        repo.inner.insert(webhook.clone());
        let deliverer = Deliverer::new(MockClient::with_status(500), repo)
            .with_clock(FixedClock(now()));

        let _ = deliver_once(&deliverer, &webhook, None).await;

        // One failure from the racing writer, one from this attempt.
        let health = deliverer.repository().inner.get(webhook.id).unwrap().health;
        assert_eq!(health.consecutive_failures, 2);
    }

    #[tokio::test]
    async fn url_rotation_between_attempts_is_picked_up() {
        let webhook = test_webhook();
        let (deliverer, client, repo) = setup(MockClient::repeating(200, 2), &webhook);
        let rotated = url::Url::parse("https://new-receiver.example.com/hooks").unwrap();

        deliver_once(&deliverer, &webhook, None).await.unwrap();
        repo.rotate_url(webhook.id, rotated.clone()).unwrap();
        deliver_once(&deliverer, &webhook, None).await.unwrap();

        let urls: Vec<_> = client.captured_requests().into_iter().map(|r| r.url).collect();
        assert_eq!(urls, vec![webhook.url.clone(), rotated]);
    }
}
