//! Production HTTP client implementation using reqwest.

use std::time::Duration;

use super::{HttpClient, HttpError, HttpRequest, HttpResponse};

/// `User-Agent` sent with every delivery.
pub const USER_AGENT: &str = concat!("hookcast/", env!("CARGO_PKG_VERSION"));

/// Default per-request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Most bytes of a response body that are read; the rest is discarded.
pub const MAX_RESPONSE_BODY: usize = 4 * 1024;

/// Production HTTP client using reqwest.
///
/// Wraps a pooled `reqwest::Client` configured with a request timeout
/// and the crate's user agent. Redirects are not followed: a webhook
/// endpoint that redirects is treated as a non-2xx answer. At most
/// [`MAX_RESPONSE_BODY`] bytes of each response body are read.
///
/// # Example
///
/// ```no_run
/// use hookcast::webhook::{HttpClient, HttpRequest, ReqwestClient};
/// use url::Url;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let client = ReqwestClient::new()?;
/// let url = Url::parse("https://receiver.example.com/hooks")?;
/// let response = client.request(HttpRequest::post(url, b"{}".to_vec())).await?;
/// println!("Status: {}", response.status);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct ReqwestClient {
    inner: reqwest::Client,
}

impl ReqwestClient {
    /// Creates a client with the default 10 second timeout.
    ///
    /// # Errors
    ///
    /// Returns an error if the TLS backend cannot be initialized.
    pub fn new() -> Result<Self, HttpError> {
        Self::with_timeout(DEFAULT_TIMEOUT)
    }

    /// Creates a client whose requests time out after `timeout`.
    ///
    /// # Errors
    ///
    /// Returns an error if the TLS backend cannot be initialized.
    pub fn with_timeout(timeout: Duration) -> Result<Self, HttpError> {
        let inner = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| HttpError::Connection(Box::new(e)))?;

        Ok(Self { inner })
    }

    /// Creates an HTTP client from an existing reqwest client.
    #[must_use]
    pub const fn from_client(client: reqwest::Client) -> Self {
        Self { inner: client }
    }
}

impl HttpClient for ReqwestClient {
    async fn request(&self, req: HttpRequest) -> Result<HttpResponse, HttpError> {
        let mut response = self
            .inner
            .request(req.method, req.url.as_str())
            .headers(req.headers)
            .body(req.body)
            .send()
            .await
            .map_err(classify)?;

        let status = response.status();
        let mut body = Vec::new();
        while body.len() < MAX_RESPONSE_BODY {
            let Some(chunk) = response.chunk().await.map_err(classify)? else {
                break;
            };
            let room = MAX_RESPONSE_BODY - body.len();
            body.extend_from_slice(&chunk[..chunk.len().min(room)]);
        }

        Ok(HttpResponse::new(status, body))
    }
}

fn classify(e: reqwest::Error) -> HttpError {
    if e.is_timeout() {
        HttpError::Timeout
    } else if e.is_builder() {
        HttpError::InvalidUrl(e.to_string())
    } else {
        HttpError::Connection(Box::new(e))
    }
}
