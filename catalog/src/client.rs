//! Outbound GET client used for every upstream catalog call.

use crate::error::{AttemptFailure, FetchError};
use crate::metrics_defs::{
    UPSTREAM_ATTEMPTS, UPSTREAM_EXHAUSTED, UPSTREAM_REQUEST_DURATION, UPSTREAM_RETRIES,
};
use bytes::Bytes;
use reqwest::StatusCode;
use reqwest::header::HeaderMap;
use reqwest::redirect;
use shared::{counter, histogram};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tokio::time::sleep;
use url::Url;

pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
pub const DEFAULT_BACKOFF_STEP: Duration = Duration::from_secs(2);
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10 * 60);
pub const DEFAULT_MAX_CONNECTIONS_PER_HOST: usize = 1000;

/// Linear retry schedule: the attempt at zero-based index `i` waits
/// `i * backoff_step` before firing.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff_step: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, backoff_step: Duration) -> Self {
        Self {
            max_attempts,
            backoff_step,
        }
    }

    pub fn delay_for_attempt(&self, index: u32) -> Duration {
        self.backoff_step * index
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ATTEMPTS, DEFAULT_BACKOFF_STEP)
    }
}

#[derive(Clone, Debug)]
pub struct ClientOptions {
    /// Ceiling for one attempt, from connect until the body is read.
    pub timeout: Duration,
    pub retry: RetryPolicy,
    pub max_connections_per_host: usize,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            retry: RetryPolicy::default(),
            max_connections_per_host: DEFAULT_MAX_CONNECTIONS_PER_HOST,
        }
    }
}

/// GET client with bounded retries.
///
/// An attempt succeeds only if the transport completes and the status is
/// exactly `200 OK`; redirects are not followed and count as failures.
/// Cloning is cheap and clones share the connection pool and the per-host
/// limits, so one instance serves the whole process.
#[derive(Clone)]
pub struct FetchClient {
    client: reqwest::Client,
    retry: RetryPolicy,
    host_limits: Arc<HostLimits>,
}

impl FetchClient {
    pub fn new(options: ClientOptions) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .timeout(options.timeout)
            .redirect(redirect::Policy::none())
            .pool_max_idle_per_host(options.max_connections_per_host)
            .build()
            .map_err(FetchError::Build)?;

        Ok(Self {
            client,
            retry: options.retry,
            host_limits: Arc::new(HostLimits::new(options.max_connections_per_host)),
        })
    }

    /// Fetches `url` and returns the raw body of the first successful attempt.
    ///
    /// Failed attempts are only logged. Once the attempts run out the error
    /// carries the failure of the last one.
    pub async fn fetch(&self, url: &Url, headers: &HeaderMap) -> Result<Bytes, FetchError> {
        let host = url
            .host_str()
            .ok_or_else(|| FetchError::InvalidUrl(url.to_string()))?;
        let limit = self.host_limits.for_host(host);
        let max_attempts = self.retry.max_attempts.max(1);
        let mut index = 0;

        loop {
            if index > 0 {
                let delay = self.retry.delay_for_attempt(index);
                tracing::info!(
                    url = %url,
                    attempt = index + 1,
                    max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    "Retrying upstream request"
                );
                counter!(UPSTREAM_RETRIES).increment(1);
                sleep(delay).await;
            }

            counter!(UPSTREAM_ATTEMPTS).increment(1);
            let started = Instant::now();
            let outcome = {
                // The semaphore is never closed, so acquiring cannot fail.
                let _permit = limit.acquire().await.ok();
                self.attempt(url, headers).await
            };
            let outcome_tag = if outcome.is_ok() { "ok" } else { "error" };
            histogram!(UPSTREAM_REQUEST_DURATION, "outcome" => outcome_tag)
                .record(started.elapsed().as_secs_f64());

            match outcome {
                Ok(body) => return Ok(body),
                Err(failure) => {
                    tracing::warn!(
                        url = %url,
                        attempt = index + 1,
                        max_attempts,
                        error = %failure,
                        "Upstream request attempt failed"
                    );
                    index += 1;
                    if index >= max_attempts {
                        counter!(UPSTREAM_EXHAUSTED).increment(1);
                        return Err(FetchError::Exhausted {
                            url: url.to_string(),
                            attempts: max_attempts,
                            last: failure,
                        });
                    }
                }
            }
        }
    }

    async fn attempt(&self, url: &Url, headers: &HeaderMap) -> Result<Bytes, AttemptFailure> {
        let response = self
            .client
            .get(url.clone())
            .headers(headers.clone())
            .send()
            .await?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(AttemptFailure::Status(status));
        }

        Ok(response.bytes().await?)
    }
}

/// Caps concurrent in-flight attempts per upstream host.
struct HostLimits {
    per_host: usize,
    semaphores: Mutex<HashMap<String, Arc<Semaphore>>>,
}

impl HostLimits {
    fn new(per_host: usize) -> Self {
        Self {
            per_host: per_host.max(1),
            semaphores: Mutex::new(HashMap::new()),
        }
    }

    fn for_host(&self, host: &str) -> Arc<Semaphore> {
        let mut semaphores = self
            .semaphores
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        semaphores
            .entry(host.to_string())
            .or_insert_with(|| Arc::new(Semaphore::new(self.per_host)))
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_linear_backoff() {
        let policy = RetryPolicy::default();

        assert_eq!(policy.delay_for_attempt(0), Duration::ZERO);
        assert_eq!(policy.delay_for_attempt(1), Duration::from_secs(2));
        assert_eq!(policy.delay_for_attempt(2), Duration::from_secs(4));
    }

    #[test]
    fn test_host_limits_are_shared_per_host() {
        let limits = HostLimits::new(2);

        let a = limits.for_host("api.example.com");
        let b = limits.for_host("api.example.com");
        let other = limits.for_host("img.example.com");

        assert!(Arc::ptr_eq(&a, &b));
        assert!(!Arc::ptr_eq(&a, &other));

        let _first = a.try_acquire().unwrap();
        let _second = b.try_acquire().unwrap();
        assert!(a.try_acquire().is_err());
        assert!(other.try_acquire().is_ok());
    }

    #[test]
    fn test_zero_limit_is_clamped() {
        let limits = HostLimits::new(0);
        assert!(limits.for_host("h").try_acquire().is_ok());
    }
}
