//! Transport to the extraction endpoint and the retrying fetch built on it.

use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use tracing::{error, info, warn};

use crate::config::ApiConfig;
use crate::error::{FetchError, TransportError};
use crate::models::{ExtractResponse, PayloadKind, RequestSpec};
use crate::traits::Transport;

const ERROR_BODY_LIMIT: usize = 300;

/// HTTP client for the extraction endpoint.
pub struct ExtractClient {
    client: Client,
    config: ApiConfig,
}

impl ExtractClient {
    pub fn new(config: ApiConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self { client, config })
    }

    pub fn config(&self) -> &ApiConfig {
        &self.config
    }
}

#[async_trait]
impl Transport for ExtractClient {
    async fn send(&self, spec: &RequestSpec, timeout: Duration) -> Result<Value, TransportError> {
        let response = self
            .client
            .post(&self.config.endpoint)
            .basic_auth(&self.config.api_key, Some(""))
            .timeout(timeout)
            .json(spec)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TransportError::Status {
                status: status.as_u16(),
                body: excerpt(&body),
            });
        }

        Ok(response.json::<Value>().await?)
    }
}

impl Clone for ExtractClient {
    fn clone(&self) -> Self {
        Self {
            client: self.client.clone(),
            config: self.config.clone(),
        }
    }
}

fn excerpt(body: &str) -> String {
    let trimmed = body.trim();
    match trimmed.char_indices().nth(ERROR_BODY_LIMIT) {
        Some((cut, _)) => format!("{}...", &trimmed[..cut]),
        None => trimmed.to_string(),
    }
}

/// Delay slept after the 0-indexed `attempt` fails: `2^attempt` seconds.
pub fn backoff_delay(attempt: u32) -> Duration {
    Duration::from_secs(2u64.saturating_pow(attempt))
}

/// Sends `spec` through `transport`, retrying failed attempts with
/// exponential backoff.
///
/// An attempt fails on any transport error or when the response lacks the
/// payload key the spec asks for. A response that carries the key is
/// returned as-is, even when the payload is empty. At most `max_attempts`
/// calls are made.
pub async fn fetch<T>(
    transport: &T,
    spec: &RequestSpec,
    max_attempts: u32,
) -> Result<ExtractResponse, FetchError>
where
    T: Transport + ?Sized,
{
    if max_attempts == 0 {
        return Err(FetchError::InvalidRequest("max_attempts must be at least 1"));
    }
    if spec.url.trim().is_empty() {
        return Err(FetchError::InvalidRequest("url must not be empty"));
    }

    let expected = spec.expected_payload();
    let timeout = spec.timeout();
    let mut attempt = 0;

    loop {
        info!(
            "Requesting {} for {} (attempt {}/{})",
            expected.key(),
            spec.url,
            attempt + 1,
            max_attempts
        );

        let failure = match transport.send(spec, timeout).await {
            Ok(body) => match parse_payload(body, expected) {
                Ok(response) => {
                    info!("Attempt {}/{} succeeded", attempt + 1, max_attempts);
                    return Ok(response);
                }
                Err(e) => e,
            },
            Err(e) => e,
        };

        if attempt + 1 >= max_attempts {
            error!(
                "Attempt {}/{} failed: {}; no attempts left",
                attempt + 1,
                max_attempts,
                failure
            );
            return Err(FetchError::Exhausted {
                attempts: max_attempts,
                last_error: failure,
            });
        }

        let delay = backoff_delay(attempt);
        warn!(
            "Attempt {}/{} failed: {}; retrying in {}s",
            attempt + 1,
            max_attempts,
            failure,
            delay.as_secs()
        );
        tokio::time::sleep(delay).await;
        attempt += 1;
    }
}

fn parse_payload(body: Value, expected: PayloadKind) -> Result<ExtractResponse, TransportError> {
    match body.get(expected.key()) {
        None | Some(Value::Null) => Err(TransportError::MissingPayload(expected.key())),
        Some(_) => Ok(serde_json::from_value(body)?),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Action, CaptureFilter};
    use serde_json::json;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use tokio::time::Instant;

    /// Replays scripted replies and records when each call happened.
    struct ScriptedTransport {
        replies: Mutex<VecDeque<Result<Value, TransportError>>>,
        calls: Mutex<Vec<(Instant, Duration)>>,
    }

    impl ScriptedTransport {
        fn new(replies: Vec<Result<Value, TransportError>>) -> Self {
            Self {
                replies: Mutex::new(replies.into()),
                calls: Mutex::new(Vec::new()),
            }
        }

        fn call_count(&self) -> usize {
            self.calls.lock().unwrap().len()
        }

        fn gaps(&self) -> Vec<Duration> {
            let calls = self.calls.lock().unwrap();
            calls.windows(2).map(|w| w[1].0 - w[0].0).collect()
        }
    }

    #[async_trait]
    impl Transport for ScriptedTransport {
        async fn send(&self, _spec: &RequestSpec, timeout: Duration) -> Result<Value, TransportError> {
            self.calls.lock().unwrap().push((Instant::now(), timeout));
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Err(TransportError::Status {
                    status: 503,
                    body: "unavailable".to_string(),
                }))
        }
    }

    fn capture_spec() -> RequestSpec {
        RequestSpec::browser_html("http://quotes.toscrape.com/scroll")
            .with_action(Action::scroll_bottom())
            .with_capture(CaptureFilter::url_contains("/api/quotes"))
    }

    #[tokio::test(start_paused = true)]
    async fn always_failing_transport_uses_every_attempt_with_backoff() {
        let transport = ScriptedTransport::new(vec![]);

        let err = fetch(&transport, &capture_spec(), 4).await.unwrap_err();

        assert!(matches!(err, FetchError::Exhausted { attempts: 4, .. }));
        assert_eq!(transport.call_count(), 4);
        assert_eq!(
            transport.gaps(),
            vec![
                Duration::from_secs(1),
                Duration::from_secs(2),
                Duration::from_secs(4)
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn single_attempt_never_sleeps() {
        let transport = ScriptedTransport::new(vec![]);
        let started = Instant::now();

        let err = fetch(&transport, &capture_spec(), 1).await.unwrap_err();

        assert!(matches!(err, FetchError::Exhausted { attempts: 1, .. }));
        assert_eq!(transport.call_count(), 1);
        assert_eq!(started.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn missing_payload_key_is_retried() {
        let transport = ScriptedTransport::new(vec![
            Ok(json!({"url": "http://quotes.toscrape.com/scroll", "browserHtml": "<html></html>"})),
            Ok(json!({
                "url": "http://quotes.toscrape.com/scroll",
                "networkCapture": [{"url": "/api/quotes?page=1", "method": "GET", "status": 200}]
            })),
        ]);

        let response = fetch(&transport, &capture_spec(), 3).await.unwrap();

        assert_eq!(transport.call_count(), 2);
        assert_eq!(response.network_capture.unwrap().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn empty_capture_list_is_a_normal_result() {
        let transport = ScriptedTransport::new(vec![Ok(json!({"networkCapture": []}))]);

        let response = fetch(&transport, &capture_spec(), 3).await.unwrap();

        assert_eq!(transport.call_count(), 1);
        assert_eq!(response.network_capture, Some(vec![]));
    }

    #[tokio::test(start_paused = true)]
    async fn mistyped_capture_entry_does_not_fail_the_response() {
        let transport = ScriptedTransport::new(vec![Ok(json!({
            "networkCapture": [
                {"url": "/api/quotes?page=1", "method": null, "status": 200},
                {"url": "/api/quotes?page=2", "method": "GET", "status": 200}
            ]
        }))]);

        let response = fetch(&transport, &capture_spec(), 3).await.unwrap();

        assert_eq!(transport.call_count(), 1);
        assert_eq!(response.network_capture.unwrap().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_depends_on_capture() {
        let transport = ScriptedTransport::new(vec![
            Ok(json!({"networkCapture": []})),
            Ok(json!({"browserHtml": ""})),
        ]);

        fetch(&transport, &capture_spec(), 1).await.unwrap();
        fetch(&transport, &RequestSpec::browser_html("http://quotes.toscrape.com/"), 1)
            .await
            .unwrap();

        let timeouts: Vec<Duration> = transport.calls.lock().unwrap().iter().map(|c| c.1).collect();
        assert_eq!(timeouts, vec![Duration::from_secs(60), Duration::from_secs(30)]);
    }

    #[tokio::test]
    async fn invalid_requests_make_no_calls() {
        let transport = ScriptedTransport::new(vec![]);

        let err = fetch(&transport, &capture_spec(), 0).await.unwrap_err();
        assert!(matches!(err, FetchError::InvalidRequest(_)));

        let err = fetch(&transport, &RequestSpec::browser_html(" "), 3).await.unwrap_err();
        assert!(matches!(err, FetchError::InvalidRequest(_)));

        assert_eq!(transport.call_count(), 0);
    }

    #[test]
    fn backoff_doubles_each_attempt() {
        let delays: Vec<u64> = (0..4).map(|a| backoff_delay(a).as_secs()).collect();
        assert_eq!(delays, vec![1, 2, 4, 8]);
    }

    #[test]
    fn long_error_bodies_are_truncated() {
        let body = "x".repeat(ERROR_BODY_LIMIT + 50);
        let short = excerpt(&body);
        assert_eq!(short.len(), ERROR_BODY_LIMIT + 3);
        assert!(short.ends_with("..."));
        assert_eq!(excerpt("  short  "), "short");
    }
}
