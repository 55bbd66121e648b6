//! JSON-over-HTTP POST with exponential backoff.
//!
//! Both upstreams (chat completion and image generation) go through
//! [`RetryingCaller`]. Transient failures (non-2xx, connection errors,
//! timeouts) are retried; a 2xx body that fails to decode is not.

use std::collections::BTreeMap;
use std::future::Future;
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

use fortec_core::config::RetryConfig;

use crate::error::UpstreamError;

/// How many times to try and how long to wait in between.
///
/// After failed attempt `k` (1-based) the caller sleeps `base_delay * 2^k`
/// before attempt `k + 1`: 2, 4, 8 … units.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
        }
    }

    pub fn from_config(cfg: &RetryConfig) -> Self {
        Self::new(cfg.max_attempts, Duration::from_millis(cfg.base_delay_ms))
    }

    /// Delay to wait after failed attempt `attempt` (1-based).
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
        self.base_delay.saturating_mul(factor)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_secs(1))
    }
}

/// Outcome of a single attempt, as seen by the retry loop.
#[derive(Debug)]
pub(crate) enum AttemptError {
    Retryable(UpstreamError),
    Fatal(UpstreamError),
}

/// Drive `op` until it succeeds, fails fatally, or runs out of attempts.
///
/// `op` receives the 1-based attempt number.
pub(crate) async fn retry_with_backoff<T, F, Fut>(
    policy: &RetryPolicy,
    endpoint: &str,
    mut op: F,
) -> Result<T, UpstreamError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, AttemptError>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;

    loop {
        match op(attempt).await {
            Ok(value) => {
                if attempt > 1 {
                    info!(endpoint, attempt, "upstream request succeeded after retry");
                }
                return Ok(value);
            }
            Err(AttemptError::Fatal(e)) => {
                error!(endpoint, attempt, error = %e, "upstream response unusable, not retrying");
                return Err(e);
            }
            Err(AttemptError::Retryable(e)) => {
                warn!(endpoint, attempt, max = max_attempts, error = %e, "upstream request failed");
                if attempt >= max_attempts {
                    error!(endpoint, attempts = attempt, "upstream retries exhausted");
                    return Err(e);
                }
                let delay = policy.backoff(attempt);
                debug!(endpoint, attempt, delay_ms = delay.as_millis() as u64, "backing off");
                sleep(delay).await;
                attempt += 1;
            }
        }
    }
}

/// HTTP client that POSTs JSON and retries transient failures.
#[derive(Clone)]
pub struct RetryingCaller {
    client: reqwest::Client,
    policy: RetryPolicy,
}

impl RetryingCaller {
    pub fn new(policy: RetryPolicy) -> Self {
        Self::with_client(reqwest::Client::new(), policy)
    }

    pub fn with_client(client: reqwest::Client, policy: RetryPolicy) -> Self {
        Self { client, policy }
    }

    /// POST `body` as JSON to `endpoint` and decode a JSON response.
    ///
    /// Each attempt is bounded by `timeout`. On exhaustion the error reflects
    /// the last failure's cause: `Timeout`, `Network`, or `Status`.
    pub async fn post_json<B, T>(
        &self,
        endpoint: &str,
        headers: &HeaderMap,
        body: &B,
        timeout: Duration,
    ) -> Result<T, UpstreamError>
    where
        B: Serialize + Sync + ?Sized,
        T: DeserializeOwned + Send,
    {
        retry_with_backoff(&self.policy, endpoint, move |attempt| async move {
            let resp = self
                .client
                .post(endpoint)
                .headers(headers.clone())
                .timeout(timeout)
                .json(body)
                .send()
                .await
                .map_err(|e| AttemptError::Retryable(transport_error(&e, attempt)))?;

            let status = resp.status();
            if !status.is_success() {
                let text = resp.text().await.unwrap_or_default();
                return Err(AttemptError::Retryable(UpstreamError::Status {
                    attempts: attempt,
                    status: status.as_u16(),
                    body: text,
                }));
            }

            let bytes = resp
                .bytes()
                .await
                .map_err(|e| AttemptError::Retryable(transport_error(&e, attempt)))?;

            serde_json::from_slice::<T>(&bytes)
                .map_err(|e| AttemptError::Fatal(UpstreamError::Parse(e.to_string())))
        })
        .await
    }
}

fn transport_error(e: &reqwest::Error, attempt: u32) -> UpstreamError {
    if e.is_timeout() {
        UpstreamError::Timeout { attempts: attempt }
    } else {
        UpstreamError::Network {
            attempts: attempt,
            message: e.to_string(),
        }
    }
}

/// Build request headers: optional bearer token plus static extras.
///
/// Invalid header names or values are skipped with a warning.
pub fn build_headers(api_key: Option<&str>, extra: &BTreeMap<String, String>) -> HeaderMap {
    let mut headers = HeaderMap::new();

    for (name, value) in extra {
        match (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            (Ok(name), Ok(value)) => {
                headers.insert(name, value);
            }
            _ => warn!(header = %name, "skipping invalid upstream header"),
        }
    }

    if let Some(key) = api_key.filter(|k| !k.is_empty()) {
        match HeaderValue::from_str(&format!("Bearer {key}")) {
            Ok(mut value) => {
                value.set_sensitive(true);
                headers.insert(AUTHORIZATION, value);
            }
            Err(_) => warn!("api key is not a valid header value, sending without auth"),
        }
    }

    headers
}
