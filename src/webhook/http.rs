//! HTTP request/response values and the client seam.

use super::HttpError;

/// An outbound HTTP request.
///
/// Built by the delivery executor and handed to any [`HttpClient`]. Uses
/// the `http` crate's method and header types so that clients stay
/// library-agnostic.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    /// HTTP method
    pub method: http::Method,
    /// Target URL
    pub url: url::Url,
    /// HTTP headers to send
    pub headers: http::HeaderMap,
    /// Request body
    pub body: Vec<u8>,
}

impl HttpRequest {
    /// Creates a POST request carrying `body`.
    #[must_use]
    pub fn post(url: url::Url, body: Vec<u8>) -> Self {
        Self {
            method: http::Method::POST,
            url,
            headers: http::HeaderMap::new(),
            body,
        }
    }

    /// Sets a header, replacing any existing value.
    #[must_use]
    pub fn with_header(mut self, name: http::HeaderName, value: http::HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Returns a header value as a string, if present and valid ASCII.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

/// A response received from a webhook endpoint.
///
/// The body is fully buffered; receivers typically answer with little or
/// nothing.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    /// HTTP status code
    pub status: http::StatusCode,
    /// Response body
    pub body: Vec<u8>,
}

impl HttpResponse {
    /// Creates a new response.
    #[must_use]
    pub const fn new(status: http::StatusCode, body: Vec<u8>) -> Self {
        Self { status, body }
    }

    /// Creates a response with an empty body.
    #[must_use]
    pub const fn status(status: http::StatusCode) -> Self {
        Self::new(status, Vec::new())
    }

    /// Returns true if the status is in `[200, 300)`.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Returns at most `limit` bytes of the body as text.
    ///
    /// `None` if the body is empty or not UTF-8. The cut is moved back to
    /// the nearest character boundary.
    #[must_use]
    pub fn body_excerpt(&self, limit: usize) -> Option<String> {
        let text = match std::str::from_utf8(&self.body) {
            Ok(text) => text,
            // A capped body may end partway through a character.
            Err(e) if e.error_len().is_none() => {
                std::str::from_utf8(&self.body[..e.valid_up_to()]).ok()?
            }
            Err(_) => return None,
        };
        if text.is_empty() {
            return None;
        }
        if text.len() <= limit {
            return Some(text.to_string());
        }

        let mut end = limit;
        while !text.is_char_boundary(end) {
            end -= 1;
        }
        Some(format!("{}...", &text[..end]))
    }
}

/// Trait for sending HTTP requests.
///
/// Lets the delivery executor run against a mock in tests and against
/// [`ReqwestClient`](super::ReqwestClient) in production.
pub trait HttpClient: Send + Sync {
    /// Sends a request and returns the response.
    ///
    /// A response with any status code is `Ok`; deciding whether the
    /// status counts as success is the caller's job.
    ///
    /// # Errors
    ///
    /// Returns [`HttpError`] when no response was received:
    /// - Network connection fails ([`HttpError::Connection`])
    /// - Request times out ([`HttpError::Timeout`])
    /// - URL is invalid ([`HttpError::InvalidUrl`])
    fn request(
        &self,
        req: HttpRequest,
    ) -> impl std::future::Future<Output = Result<HttpResponse, HttpError>> + Send;
}

impl<T: HttpClient> HttpClient for std::sync::Arc<T> {
    async fn request(&self, req: HttpRequest) -> Result<HttpResponse, HttpError> {
        (**self).request(req).await
    }
}
