//! Shared HTTP substrate for every provider adapter.
//!
//! One `HttpClient` per adapter instance: Bearer auth, JSON in/out, a
//! per-request timeout, and bounded exponential-backoff retries on network
//! errors, timeouts, and a configurable set of HTTP statuses.

use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::Method;
use serde_json::{json, Value};
use thiserror::Error;
use tracing::{debug, warn};

use vidgen_core::config::HttpConfig;

// ─────────────────────────────────────────────
// Errors
// ─────────────────────────────────────────────

/// Transport-level failure, after retries were exhausted.
#[derive(Debug, Error)]
pub enum HttpError {
    /// The server answered with a non-success status.
    #[error("HTTP {status}: {message}")]
    Status {
        status: u16,
        message: String,
        /// Parsed response body (`{"raw_response": ...}` when not JSON).
        body: Value,
    },
    #[error("request timed out after {0:?}")]
    Timeout(Duration),
    #[error("network error: {0}")]
    Network(String),
}

impl HttpError {
    /// HTTP status, if the server answered at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            HttpError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    fn from_reqwest(err: &reqwest::Error, timeout: Duration) -> Self {
        if err.is_timeout() {
            HttpError::Timeout(timeout)
        } else {
            HttpError::Network(err.to_string())
        }
    }
}

// ─────────────────────────────────────────────
// Retry policy
// ─────────────────────────────────────────────

/// When and how long to back off between attempts.
#[derive(Clone, Debug)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub retry_on_status: Vec<u16>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&HttpConfig::default())
    }
}

/// Upper bound for a single backoff delay, in seconds.
pub const MAX_BACKOFF_SECS: f64 = 300.0;

fn backoff_secs(secs: f64) -> Duration {
    let secs = if secs.is_nan() { 0.0 } else { secs.clamp(0.0, MAX_BACKOFF_SECS) };
    Duration::from_secs_f64(secs)
}

impl From<&HttpConfig> for RetryPolicy {
    fn from(cfg: &HttpConfig) -> Self {
        Self {
            max_retries: cfg.max_retries,
            base_delay: backoff_secs(cfg.base_delay),
            max_delay: backoff_secs(cfg.max_delay),
            retry_on_status: cfg.retry_on_status.clone(),
        }
    }
}

impl RetryPolicy {
    /// `min(base * 2^attempt, cap)`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.min(31));
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }

    pub fn should_retry_status(&self, status: u16) -> bool {
        self.retry_on_status.contains(&status)
    }
}

// ─────────────────────────────────────────────
// HttpClient
// ─────────────────────────────────────────────

/// JSON-over-HTTP client bound to one base URL and API key.
pub struct HttpClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    /// Headers attached to every request (after auth, before per-call headers).
    default_headers: HeaderMap,
    timeout: Duration,
    retry: RetryPolicy,
}

impl std::fmt::Debug for HttpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpClient")
            .field("base_url", &self.base_url)
            .field("timeout", &self.timeout)
            .field("max_retries", &self.retry.max_retries)
            .finish()
    }
}

impl HttpClient {
    /// Create a client for `base_url`, authenticating with `api_key`.
    pub fn new(base_url: &str, api_key: &str, settings: &HttpConfig) -> Self {
        let timeout = Duration::from_secs(settings.timeout.max(1));
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|e| {
                warn!(error = %e, "failed to build tuned HTTP client, using defaults");
                reqwest::Client::new()
            });

        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            default_headers: HeaderMap::new(),
            timeout,
            retry: RetryPolicy::from(settings),
        }
    }

    /// Attach a header to every request this client sends.
    pub fn with_default_header(mut self, name: &str, value: &str) -> Self {
        match (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            (Ok(n), Ok(v)) => {
                self.default_headers.insert(n, v);
            }
            _ => warn!("Invalid header: {}={}", name, value),
        }
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Join `path` onto the base URL.
    pub fn url(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            return path.to_string();
        }
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// Send a request and decode the JSON response.
    ///
    /// Retries on network errors, timeouts, and statuses in the retry set.
    /// Other 4xx/5xx responses fail immediately with [`HttpError::Status`].
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
        query: Option<&[(&str, &str)]>,
        headers: Option<&HeaderMap>,
    ) -> Result<Value, HttpError> {
        let url = self.url(path);
        let mut attempt: u32 = 0;

        loop {
            let mut req = self
                .client
                .request(method.clone(), &url)
                .bearer_auth(&self.api_key)
                .headers(self.default_headers.clone());
            if let Some(h) = headers {
                req = req.headers(h.clone());
            }
            if let Some(q) = query {
                req = req.query(q);
            }
            if let Some(b) = body {
                req = req.json(b);
            }

            debug!(method = %method, url = %url, attempt = attempt, "HTTP request");

            let response = match req.send().await {
                Ok(resp) => resp,
                Err(e) => {
                    let err = HttpError::from_reqwest(&e, self.timeout);
                    if attempt < self.retry.max_retries {
                        let delay = self.retry.delay_for(attempt);
                        warn!(url = %url, error = %err, delay_ms = delay.as_millis() as u64, "request failed, retrying");
                        tokio::time::sleep(delay).await;
                        attempt += 1;
                        continue;
                    }
                    return Err(err);
                }
            };

            let status = response.status().as_u16();
            if self.retry.should_retry_status(status) && attempt < self.retry.max_retries {
                let delay = self.retry.delay_for(attempt);
                warn!(url = %url, status = status, delay_ms = delay.as_millis() as u64, "retryable status, retrying");
                tokio::time::sleep(delay).await;
                attempt += 1;
                continue;
            }

            let text = response
                .text()
                .await
                .map_err(|e| HttpError::from_reqwest(&e, self.timeout))?;
            let data = parse_body(&text);

            if status >= 400 {
                let message = extract_error_message(&data, status);
                warn!(url = %url, status = status, message = %message, "API error");
                return Err(HttpError::Status {
                    status,
                    message,
                    body: data,
                });
            }

            return Ok(data);
        }
    }

    pub async fn get(&self, path: &str) -> Result<Value, HttpError> {
        self.request(Method::GET, path, None, None, None).await
    }

    pub async fn post(&self, path: &str, body: &Value) -> Result<Value, HttpError> {
        self.request(Method::POST, path, Some(body), None, None).await
    }

    pub async fn delete(&self, path: &str) -> Result<Value, HttpError> {
        self.request(Method::DELETE, path, None, None, None).await
    }
}

/// Decode a response body; non-JSON text is wrapped as `{"raw_response": text}`.
pub fn parse_body(text: &str) -> Value {
    serde_json::from_str(text).unwrap_or_else(|_| json!({ "raw_response": text }))
}

/// Best-effort error message from a vendor error body.
fn extract_error_message(data: &Value, status: u16) -> String {
    let candidates = [
        data.pointer("/error/message"),
        data.get("error").filter(|v| v.is_string()),
        data.get("message"),
        data.get("msg"),
    ];
    candidates
        .into_iter()
        .flatten()
        .filter_map(Value::as_str)
        .find(|s| !s.is_empty())
        .map(String::from)
        .unwrap_or_else(|| format!("HTTP {status}"))
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn fast_settings() -> HttpConfig {
        HttpConfig {
            timeout: 5,
            max_retries: 3,
            base_delay: 0.001,
            max_delay: 0.01,
            ..HttpConfig::default()
        }
    }

    // ── Unit tests ──

    #[test]
    fn test_delay_for_backoff_and_cap() {
        let policy = RetryPolicy {
            max_retries: 5,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            retry_on_status: vec![503],
        };
        assert_eq!(policy.delay_for(0), Duration::from_secs(1));
        assert_eq!(policy.delay_for(1), Duration::from_secs(2));
        assert_eq!(policy.delay_for(3), Duration::from_secs(8));
        assert_eq!(policy.delay_for(5), Duration::from_secs(30));
        assert_eq!(policy.delay_for(60), Duration::from_secs(30));
    }

    #[test]
    fn test_default_policy() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_retries, 3);
        assert!(policy.should_retry_status(429));
        assert!(policy.should_retry_status(504));
        assert!(!policy.should_retry_status(400));
        assert!(!policy.should_retry_status(404));
    }

    #[test]
    fn test_huge_delays_are_capped() {
        let policy = RetryPolicy::from(&HttpConfig {
            base_delay: 1e20,
            max_delay: 1e20,
            ..HttpConfig::default()
        });
        assert_eq!(policy.base_delay, Duration::from_secs(300));
        assert_eq!(policy.delay_for(4), Duration::from_secs(300));

        let negative = RetryPolicy::from(&HttpConfig {
            base_delay: -1.0,
            max_delay: f64::NAN,
            ..HttpConfig::default()
        });
        assert_eq!(negative.delay_for(2), Duration::ZERO);

        // Building a client from the same settings must not panic either.
        let _ = HttpClient::new("https://api.example.com", "k", &HttpConfig {
            max_delay: 1e20,
            ..HttpConfig::default()
        });
    }

    #[test]
    fn test_url_join() {
        let client = HttpClient::new("https://api.example.com/v1/", "k", &fast_settings());
        assert_eq!(client.url("/tasks/1"), "https://api.example.com/v1/tasks/1");
        assert_eq!(client.url("tasks/1"), "https://api.example.com/v1/tasks/1");
        assert_eq!(client.url("https://other.host/x"), "https://other.host/x");
    }

    #[test]
    fn test_parse_body_non_json() {
        assert_eq!(parse_body("<html>oops</html>"), json!({"raw_response": "<html>oops</html>"}));
        assert_eq!(parse_body(r#"{"id": 1}"#), json!({"id": 1}));
    }

    #[test]
    fn test_extract_error_message_shapes() {
        assert_eq!(
            extract_error_message(&json!({"error": {"message": "bad prompt"}}), 400),
            "bad prompt"
        );
        assert_eq!(extract_error_message(&json!({"error": "denied"}), 403), "denied");
        assert_eq!(extract_error_message(&json!({"message": "nope"}), 400), "nope");
        assert_eq!(extract_error_message(&json!({"msg": "quota"}), 429), "quota");
        assert_eq!(extract_error_message(&json!({}), 500), "HTTP 500");
    }

    // ── Integration tests with mock server ──

    #[tokio::test]
    async fn test_post_sends_auth_and_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/tasks"))
            .and(header("Authorization", "Bearer secret"))
            .and(body_partial_json(json!({"prompt": "a fox"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "t-1"})))
            .expect(1)
            .mount(&server)
            .await;

        let client = HttpClient::new(&server.uri(), "secret", &fast_settings());
        let resp = client.post("/tasks", &json!({"prompt": "a fox"})).await.unwrap();
        assert_eq!(resp["id"], "t-1");
    }

    #[tokio::test]
    async fn test_default_and_call_headers() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/status"))
            .and(header("X-Async", "enable"))
            .and(header("X-Trace", "abc"))
            .and(query_param("verbose", "1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
            .mount(&server)
            .await;

        let client = HttpClient::new(&server.uri(), "k", &fast_settings())
            .with_default_header("X-Async", "enable");
        let mut extra = HeaderMap::new();
        extra.insert("X-Trace", HeaderValue::from_static("abc"));

        let resp = client
            .request(Method::GET, "/status", None, Some(&[("verbose", "1")]), Some(&extra))
            .await
            .unwrap();
        assert_eq!(resp["ok"], true);
    }

    #[tokio::test]
    async fn test_retries_then_succeeds() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/flaky"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(2)
            .expect(2)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/flaky"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"done": true})))
            .expect(1)
            .mount(&server)
            .await;

        let client = HttpClient::new(&server.uri(), "k", &fast_settings());
        let resp = client.get("/flaky").await.unwrap();
        assert_eq!(resp["done"], true);
    }

    #[tokio::test]
    async fn test_retries_exhausted() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/down"))
            .respond_with(
                ResponseTemplate::new(429).set_body_json(json!({"error": {"message": "slow down"}})),
            )
            .expect(4)
            .mount(&server)
            .await;

        let client = HttpClient::new(&server.uri(), "k", &fast_settings());
        let err = client.get("/down").await.unwrap_err();
        assert_eq!(err.status(), Some(429));
        assert!(err.to_string().contains("slow down"));
    }

    #[tokio::test]
    async fn test_client_error_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/tasks"))
            .respond_with(
                ResponseTemplate::new(400).set_body_json(json!({"message": "invalid model"})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let client = HttpClient::new(&server.uri(), "k", &fast_settings());
        let err = client.post("/tasks", &json!({})).await.unwrap_err();
        match err {
            HttpError::Status { status, message, body } => {
                assert_eq!(status, 400);
                assert_eq!(message, "invalid model");
                assert_eq!(body["message"], "invalid model");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_non_json_success_wrapped() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/tasks/1"))
            .respond_with(ResponseTemplate::new(200).set_body_string("deleted"))
            .mount(&server)
            .await;

        let client = HttpClient::new(&server.uri(), "k", &fast_settings());
        let resp = client.delete("/tasks/1").await.unwrap();
        assert_eq!(resp, json!({"raw_response": "deleted"}));
    }

    #[tokio::test]
    async fn test_network_error_after_retries() {
        let client = HttpClient::new("http://127.0.0.1:1", "k", &fast_settings());
        let err = client.get("/x").await.unwrap_err();
        assert!(matches!(err, HttpError::Network(_)));
        assert_eq!(err.status(), None);
    }
}
