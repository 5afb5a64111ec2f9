use crate::client::{
    ClientOptions, DEFAULT_MAX_ATTEMPTS, DEFAULT_MAX_CONNECTIONS_PER_HOST, RetryPolicy,
};
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;
use url::Url;

pub const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (X11; Linux x86_64; rv:146.0) Gecko/20100101 Firefox/146.0";

#[derive(Error, Debug, PartialEq)]
pub enum ValidationError {
    #[error("max_attempts must be at least 1")]
    ZeroAttempts,

    #[error("max_connections_per_host must be at least 1")]
    ZeroConnections,

    #[error("timeout_secs must be at least 1")]
    ZeroTimeout,

    #[error("user_agent cannot be empty")]
    EmptyUserAgent,

    #[error("endpoint {endpoint} uses unsupported scheme {scheme}")]
    UnsupportedScheme {
        endpoint: &'static str,
        scheme: String,
    },
}

/// Upstream endpoint URLs. Pagination defaults are baked into the list
/// endpoints; `search` and `episodes` get their query parameter appended.
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct Endpoints {
    pub trending: Url,
    pub latest: Url,
    pub for_you: Url,
    pub popular_search: Url,
    pub search: Url,
    pub episodes: Url,
}

impl Endpoints {
    fn named(&self) -> [(&'static str, &Url); 6] {
        [
            ("trending", &self.trending),
            ("latest", &self.latest),
            ("for_you", &self.for_you),
            ("popular_search", &self.popular_search),
            ("search", &self.search),
            ("episodes", &self.episodes),
        ]
    }
}

/// Upstream catalog configuration
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct CatalogConfig {
    pub endpoints: Endpoints,
    /// Sent as `User-Agent`; the upstream rejects clients it does not recognize.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    /// Per-attempt timeout.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Backoff step; attempt `i` (zero-based) waits `i * retry_backoff_ms`.
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,
    #[serde(default = "default_max_connections_per_host")]
    pub max_connections_per_host: usize,
}

impl CatalogConfig {
    /// Config with the default client settings for the given endpoints.
    pub fn new(endpoints: Endpoints) -> Self {
        Self {
            endpoints,
            user_agent: default_user_agent(),
            timeout_secs: default_timeout_secs(),
            max_attempts: default_max_attempts(),
            retry_backoff_ms: default_retry_backoff_ms(),
            max_connections_per_host: default_max_connections_per_host(),
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.max_attempts == 0 {
            return Err(ValidationError::ZeroAttempts);
        }
        if self.max_connections_per_host == 0 {
            return Err(ValidationError::ZeroConnections);
        }
        if self.timeout_secs == 0 {
            return Err(ValidationError::ZeroTimeout);
        }
        if self.user_agent.trim().is_empty() {
            return Err(ValidationError::EmptyUserAgent);
        }

        for (endpoint, url) in self.endpoints.named() {
            if !matches!(url.scheme(), "http" | "https") {
                return Err(ValidationError::UnsupportedScheme {
                    endpoint,
                    scheme: url.scheme().to_string(),
                });
            }
        }

        Ok(())
    }

    pub fn client_options(&self) -> ClientOptions {
        ClientOptions {
            timeout: Duration::from_secs(self.timeout_secs),
            retry: RetryPolicy::new(
                self.max_attempts,
                Duration::from_millis(self.retry_backoff_ms),
            ),
            max_connections_per_host: self.max_connections_per_host,
        }
    }
}

fn default_user_agent() -> String {
    DEFAULT_USER_AGENT.to_string()
}

fn default_timeout_secs() -> u64 {
    600
}

fn default_max_attempts() -> u32 {
    DEFAULT_MAX_ATTEMPTS
}

fn default_retry_backoff_ms() -> u64 {
    2000
}

fn default_max_connections_per_host() -> usize {
    DEFAULT_MAX_CONNECTIONS_PER_HOST
}
