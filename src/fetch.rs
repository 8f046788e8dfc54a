//! Resilient JSON fetcher
//!
//! Issues HTTP GET requests where every attempt is bounded by a timeout and
//! failed attempts are retried with linear backoff:
//!
//! | Attempt failed | Wait before next attempt |
//! |----------------|--------------------------|
//! | 1              | 200ms                    |
//! | 2              | 400ms                    |
//! | n              | n * 200ms                |
//!
//! Non-success statuses, transport errors, timeouts and undecodable bodies are
//! all retried. When the budget is spent the last failure is returned inside a
//! [`FetchError`].

use crate::observability::metrics::metrics;
use reqwest::Client;
use serde::de::DeserializeOwned;
use std::time::Duration;
use thiserror::Error;
use tokio::time::{sleep, timeout};
use tracing::{debug, warn};

/// Backoff unit, multiplied by the number of the attempt that just failed
pub const BACKOFF_STEP: Duration = Duration::from_millis(200);

/// Timeout and retry budget for a single fetch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Upper bound for one attempt, including reading the body
    pub timeout: Duration,
    /// Attempts allowed after the first one
    pub max_retries: u32,
    pub backoff_step: Duration,
}

impl RetryPolicy {
    pub fn new(timeout: Duration, max_retries: u32) -> Self {
        Self {
            timeout,
            max_retries,
            backoff_step: BACKOFF_STEP,
        }
    }

    /// Override the backoff unit
    pub fn with_backoff_step(mut self, backoff_step: Duration) -> Self {
        self.backoff_step = backoff_step;
        self
    }

    /// Delay after the given (1-based) failed attempt
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        self.backoff_step.saturating_mul(attempt)
    }

    /// Total attempts this policy allows
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }
}

/// Extra request options applied to every attempt
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    pub headers: Vec<(String, String)>,
}

impl RequestOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a header sent with every attempt
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }
}

/// Why a single attempt failed
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AttemptFailure {
    #[error("timed out after {0:?}")]
    Timeout(Duration),
    #[error("upstream returned status {0}")]
    Status(u16),
    #[error("transport error: {0}")]
    Transport(String),
    #[error("invalid JSON body: {0}")]
    Decode(String),
}

/// Every attempt failed; carries the cause of the last one
#[derive(Debug, Clone, Error)]
#[error("fetching {url} failed after {attempts} attempt(s): {cause}")]
pub struct FetchError {
    pub url: String,
    pub attempts: u32,
    #[source]
    pub cause: AttemptFailure,
}

/// HTTP client wrapper implementing the timeout and retry policy
#[derive(Debug, Clone)]
pub struct ResilientFetcher {
    client: Client,
}

impl ResilientFetcher {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Build a fetcher whose requests carry the given User-Agent
    pub fn with_user_agent(user_agent: &str) -> Result<Self, reqwest::Error> {
        let client = Client::builder().user_agent(user_agent).build()?;
        Ok(Self::new(client))
    }

    /// GET `url` and decode the body as JSON, retrying per `policy`
    pub async fn fetch_json<T: DeserializeOwned>(
        &self,
        url: &str,
        options: &RequestOptions,
        policy: RetryPolicy,
    ) -> Result<T, FetchError> {
        let mut attempt = 0;

        loop {
            attempt += 1;
            metrics().upstream_attempt();

            debug!(
                attempt,
                max_attempts = policy.max_attempts(),
                url = %url,
                "Fetching upstream JSON"
            );

            // Dropping the attempt future on timeout aborts the in-flight request
            let cause = match timeout(policy.timeout, self.attempt(url, options)).await {
                Ok(Ok(value)) => return Ok(value),
                Ok(Err(failure)) => failure,
                Err(_) => AttemptFailure::Timeout(policy.timeout),
            };

            if attempt >= policy.max_attempts() {
                metrics().upstream_failure();
                return Err(FetchError {
                    url: url.to_string(),
                    attempts: attempt,
                    cause,
                });
            }

            let delay = policy.backoff_for(attempt);
            warn!(
                attempt,
                error = %cause,
                delay_ms = delay.as_millis() as u64,
                url = %url,
                "Upstream fetch failed, retrying"
            );
            sleep(delay).await;
        }
    }

    async fn attempt<T: DeserializeOwned>(
        &self,
        url: &str,
        options: &RequestOptions,
    ) -> Result<T, AttemptFailure> {
        let mut request = self.client.get(url);
        for (name, value) in &options.headers {
            request = request.header(name.as_str(), value.as_str());
        }

        let response = request
            .send()
            .await
            .map_err(|e| AttemptFailure::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AttemptFailure::Status(status.as_u16()));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| AttemptFailure::Transport(e.to_string()))?;

        serde_json::from_slice(&body).map_err(|e| AttemptFailure::Decode(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};
    use std::time::Instant;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn fast_policy(max_retries: u32) -> RetryPolicy {
        RetryPolicy::new(Duration::from_millis(500), max_retries)
            .with_backoff_step(Duration::from_millis(10))
    }

    #[test]
    fn test_linear_backoff() {
        let policy = RetryPolicy::new(Duration::from_secs(1), 3);

        assert_eq!(policy.backoff_for(1), Duration::from_millis(200));
        assert_eq!(policy.backoff_for(2), Duration::from_millis(400));
        assert_eq!(policy.backoff_for(3), Duration::from_millis(600));
        assert_eq!(policy.max_attempts(), 4);
    }

    #[tokio::test]
    async fn test_fetch_success_first_attempt() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/data"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
            .expect(1)
            .mount(&mock_server)
            .await;

        let fetcher = ResilientFetcher::new(Client::new());
        let value: Value = fetcher
            .fetch_json(
                &format!("{}/data", mock_server.uri()),
                &RequestOptions::new(),
                fast_policy(2),
            )
            .await
            .unwrap();

        assert_eq!(value, json!({"ok": true}));
    }

    #[tokio::test]
    async fn test_fetch_sends_custom_headers() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/data"))
            .and(header("x-feed-test", "yes"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .expect(1)
            .mount(&mock_server)
            .await;

        let fetcher = ResilientFetcher::new(Client::new());
        let options = RequestOptions::new().with_header("x-feed-test", "yes");
        let value: Value = fetcher
            .fetch_json(
                &format!("{}/data", mock_server.uri()),
                &options,
                fast_policy(0),
            )
            .await
            .unwrap();

        assert_eq!(value, json!([]));
    }

    #[tokio::test]
    async fn test_fetch_retries_after_server_error() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/data"))
            .respond_with(ResponseTemplate::new(500))
            .up_to_n_times(1)
            .mount(&mock_server)
            .await;

        Mock::given(method("GET"))
            .and(path("/data"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"n": 2})))
            .mount(&mock_server)
            .await;

        let fetcher = ResilientFetcher::new(Client::new());
        let value: Value = fetcher
            .fetch_json(
                &format!("{}/data", mock_server.uri()),
                &RequestOptions::new(),
                fast_policy(2),
            )
            .await
            .unwrap();

        assert_eq!(value, json!({"n": 2}));
        assert_eq!(mock_server.received_requests().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_client_errors_are_retried_too() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/data"))
            .respond_with(ResponseTemplate::new(404))
            .expect(3)
            .mount(&mock_server)
            .await;

        let fetcher = ResilientFetcher::new(Client::new());
        let err = fetcher
            .fetch_json::<Value>(
                &format!("{}/data", mock_server.uri()),
                &RequestOptions::new(),
                fast_policy(2),
            )
            .await
            .unwrap_err();

        assert_eq!(err.attempts, 3);
        assert_eq!(err.cause, AttemptFailure::Status(404));
    }

    #[tokio::test]
    async fn test_invalid_json_is_retryable_and_reported() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/data"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
            .expect(2)
            .mount(&mock_server)
            .await;

        let fetcher = ResilientFetcher::new(Client::new());
        let err = fetcher
            .fetch_json::<Value>(
                &format!("{}/data", mock_server.uri()),
                &RequestOptions::new(),
                fast_policy(1),
            )
            .await
            .unwrap_err();

        assert_eq!(err.attempts, 2);
        assert!(matches!(err.cause, AttemptFailure::Decode(_)));
    }

    #[tokio::test]
    async fn test_no_retries_means_single_attempt() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/data"))
            .respond_with(ResponseTemplate::new(503))
            .expect(1)
            .mount(&mock_server)
            .await;

        let fetcher = ResilientFetcher::new(Client::new());
        let err = fetcher
            .fetch_json::<Value>(
                &format!("{}/data", mock_server.uri()),
                &RequestOptions::new(),
                fast_policy(0),
            )
            .await
            .unwrap_err();

        assert_eq!(err.attempts, 1);
        assert!(err.to_string().contains("503"));
    }

    #[tokio::test]
    async fn test_timeouts_use_full_retry_budget_with_linear_backoff() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/slow"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({}))
                    .set_delay(Duration::from_secs(2)),
            )
            .mount(&mock_server)
            .await;

        let fetcher = ResilientFetcher::new(Client::new());
        let policy = RetryPolicy::new(Duration::from_millis(100), 2);

        let started = Instant::now();
        let err = fetcher
            .fetch_json::<Value>(
                &format!("{}/slow", mock_server.uri()),
                &RequestOptions::new(),
                policy,
            )
            .await
            .unwrap_err();
        let elapsed = started.elapsed();

        assert_eq!(err.attempts, 3);
        assert_eq!(
            err.cause,
            AttemptFailure::Timeout(Duration::from_millis(100))
        );
        assert_eq!(mock_server.received_requests().await.unwrap().len(), 3);

        // Three 100ms timeouts plus 200ms and 400ms of backoff
        assert!(elapsed >= Duration::from_millis(900), "elapsed {elapsed:?}");
        assert!(elapsed < Duration::from_millis(1900), "elapsed {elapsed:?}");
    }

    #[tokio::test]
    async fn test_network_error_reported_as_transport() {
        let fetcher = ResilientFetcher::new(Client::new());
        let err = fetcher
            .fetch_json::<Value>("http://127.0.0.1:1/data", &RequestOptions::new(), fast_policy(1))
            .await
            .unwrap_err();

        assert_eq!(err.attempts, 2);
        assert!(matches!(err.cause, AttemptFailure::Transport(_)));
    }
}
