use std::{future::Future, time::Duration};

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use thiserror::Error;
use tokio::time::sleep;
use url::Url;

/// Total attempts made against the deliverability API per check.
pub const MAX_CHECK_ATTEMPTS: u32 = 3;

const DEFAULT_BACKOFF_UNIT: Duration = Duration::from_secs(1);

/// Confirms that an address can plausibly receive mail.
///
/// `Ok(false)` means the external service judged the address undeliverable;
/// exhausting all attempts is a distinct error, never a silent `false`.
#[async_trait]
pub trait EmailVerifier: Send + Sync {
    async fn check(&self, email: &str) -> Result<bool, DeliverabilityError>;
}

/// Client for the external email deliverability API.
#[derive(Clone)]
pub struct DeliverabilityClient {
    http: Client,
    base_url: Url,
    api_key: String,
    backoff_unit: Duration,
}

impl DeliverabilityClient {
    /// Creates a new client with the provided configuration.
    pub fn new(api_key: impl Into<String>, base_url: Url, http: Client) -> Self {
        Self {
            http,
            base_url,
            api_key: api_key.into(),
            backoff_unit: DEFAULT_BACKOFF_UNIT,
        }
    }

    /// Overrides the unit used to scale retry backoff.
    pub fn with_backoff_unit(mut self, backoff_unit: Duration) -> Self {
        self.backoff_unit = backoff_unit;
        self
    }

    fn validate_url(&self, email: &str) -> Result<Url, DeliverabilityError> {
        let mut url = self.base_url.join("validate")?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("api_key", &self.api_key);
            query.append_pair("email", email);
        }
        Ok(url)
    }

    async fn attempt(&self, url: Url) -> Result<bool, AttemptError> {
        let response = self.http.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| String::from("<unavailable>"));
            return Err(AttemptError::Status { status, body });
        }

        let body: ValidationResponse = response.json().await?;
        Ok(body.status.eq_ignore_ascii_case("valid"))
    }
}

#[async_trait]
impl EmailVerifier for DeliverabilityClient {
    async fn check(&self, email: &str) -> Result<bool, DeliverabilityError> {
        let url = self.validate_url(email)?;
        retry_with_backoff(self.backoff_unit, || self.attempt(url.clone())).await
    }
}

#[derive(Debug, Deserialize)]
struct ValidationResponse {
    status: String,
}

/// Runs `operation` up to [`MAX_CHECK_ATTEMPTS`] times.
///
/// The wait before each retry is `2^(attempts_remaining)` backoff units, so
/// with three attempts the first retry waits four units and the second two.
/// The sleep is a plain `tokio::time::sleep`, dropped promptly on
/// cancellation.
async fn retry_with_backoff<T, F, Fut>(
    backoff_unit: Duration,
    mut operation: F,
) -> Result<T, DeliverabilityError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, AttemptError>>,
{
    let mut attempt = 1u32;
    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                let remaining = MAX_CHECK_ATTEMPTS - attempt;
                if remaining == 0 {
                    return Err(DeliverabilityError::Exhausted {
                        attempts: MAX_CHECK_ATTEMPTS,
                        source: err,
                    });
                }
                sleep(backoff_delay(backoff_unit, remaining)).await;
                attempt += 1;
            }
        }
    }
}

fn backoff_delay(unit: Duration, attempts_remaining: u32) -> Duration {
    unit * 2u32.pow(attempts_remaining)
}

/// A single failed call to the deliverability API.
#[derive(Debug, Error)]
pub enum AttemptError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("unexpected status {status}: {body}")]
    Status { status: StatusCode, body: String },
}

/// Errors produced by the deliverability client.
#[derive(Debug, Error)]
pub enum DeliverabilityError {
    #[error("failed to build url: {0}")]
    Url(#[from] url::ParseError),
    #[error("deliverability check failed after {attempts} attempts: {source}")]
    Exhausted {
        attempts: u32,
        #[source]
        source: AttemptError,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use serde_json::json;
    use std::cell::Cell;
    use tokio::time::Instant;

    fn client(base_url: &Url) -> DeliverabilityClient {
        DeliverabilityClient::new(
            "key-1",
            base_url.clone(),
            Client::builder().build().expect("client"),
        )
    }

    fn attempt_failure() -> AttemptError {
        AttemptError::Status {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            body: "boom".to_string(),
        }
    }

    #[test]
    fn backoff_is_keyed_to_attempts_remaining() {
        assert_eq!(
            backoff_delay(Duration::from_secs(1), 2),
            Duration::from_secs(4)
        );
        assert_eq!(
            backoff_delay(Duration::from_secs(1), 1),
            Duration::from_secs(2)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn two_failures_then_success_makes_exactly_three_attempts() {
        let calls = Cell::new(0u32);
        let started = Instant::now();

        let result = retry_with_backoff(Duration::from_secs(1), || {
            let call = calls.get() + 1;
            calls.set(call);
            async move {
                if call < 3 {
                    Err(attempt_failure())
                } else {
                    Ok(true)
                }
            }
        })
        .await;

        assert!(result.expect("check succeeds"));
        assert_eq!(calls.get(), 3);
        // First retry waits 4s, second waits 2s.
        assert_eq!(started.elapsed(), Duration::from_secs(6));
    }

    #[tokio::test(start_paused = true)]
    async fn exhaustion_is_an_error_after_three_attempts() {
        let calls = Cell::new(0u32);

        let result: Result<bool, _> = retry_with_backoff(Duration::from_secs(1), || {
            calls.set(calls.get() + 1);
            async { Err(attempt_failure()) }
        })
        .await;

        assert_eq!(calls.get(), 3);
        match result.unwrap_err() {
            DeliverabilityError::Exhausted { attempts, .. } => assert_eq!(attempts, 3),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn valid_status_returns_true() {
        let server = MockServer::start_async().await;
        let base = Url::parse(&server.url("/")).expect("url");

        let mock = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/validate")
                    .query_param("api_key", "key-1")
                    .query_param("email", "mo@example.com");
                then.status(200)
                    .json_body(json!({ "status": "valid", "sub_status": "" }));
            })
            .await;

        let deliverable = client(&base)
            .check("mo@example.com")
            .await
            .expect("check succeeds");
        mock.assert_async().await;
        assert!(deliverable);
    }

    #[tokio::test]
    async fn status_comparison_is_case_insensitive() {
        let server = MockServer::start_async().await;
        let base = Url::parse(&server.url("/")).expect("url");

        server
            .mock_async(|when, then| {
                when.method(GET).path("/validate");
                then.status(200).json_body(json!({ "status": "Valid" }));
            })
            .await;

        let deliverable = client(&base)
            .check("mo@example.com")
            .await
            .expect("check succeeds");
        assert!(deliverable);
    }

    #[tokio::test]
    async fn invalid_status_returns_false_without_retrying() {
        let server = MockServer::start_async().await;
        let base = Url::parse(&server.url("/")).expect("url");

        let mock = server
            .mock_async(|when, then| {
                when.method(GET).path("/validate");
                then.status(200).json_body(json!({ "status": "invalid" }));
            })
            .await;

        let deliverable = client(&base)
            .check("mo@example.com")
            .await
            .expect("check succeeds");
        assert!(!deliverable);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn server_errors_exhaust_all_attempts() {
        let server = MockServer::start_async().await;
        let base = Url::parse(&server.url("/")).expect("url");

        let mock = server
            .mock_async(|when, then| {
                when.method(GET).path("/validate");
                then.status(502).body("bad gateway");
            })
            .await;

        let err = client(&base)
            .with_backoff_unit(Duration::from_millis(1))
            .check("mo@example.com")
            .await
            .expect_err("should exhaust");

        match err {
            DeliverabilityError::Exhausted { attempts, source } => {
                assert_eq!(attempts, 3);
                assert!(matches!(source, AttemptError::Status { status, .. }
                    if status == StatusCode::BAD_GATEWAY));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(mock.hits_async().await, 3);
    }

    #[tokio::test]
    async fn malformed_body_counts_as_attempt_failure() {
        let server = MockServer::start_async().await;
        let base = Url::parse(&server.url("/")).expect("url");

        server
            .mock_async(|when, then| {
                when.method(GET).path("/validate");
                then.status(200).body("not json");
            })
            .await;

        let err = client(&base)
            .with_backoff_unit(Duration::from_millis(1))
            .check("mo@example.com")
            .await
            .expect_err("should exhaust");
        assert!(matches!(err, DeliverabilityError::Exhausted { .. }));
    }
}
