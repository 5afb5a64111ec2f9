use crate::perimeter::RateSpec;
use catalog::config::CatalogConfig;
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum ValidationError {
    #[error("Port cannot be 0")]
    InvalidPort,

    #[error("Invalid catalog config: {0}")]
    Catalog(#[from] catalog::config::ValidationError),

    #[error("allowed_origins cannot be empty")]
    EmptyAllowedOrigins,

    #[error("Invalid rate limit {0:?}, expected <count>-<S|M|H|D>")]
    InvalidRateLimit(String),

    #[error("fanout_deadline_secs must be at least 1")]
    ZeroDeadline,
}

/// Gateway configuration
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct Config {
    /// Main listener for API requests
    pub listener: Listener,
    /// Admin listener for health and readiness checks
    pub admin_listener: Listener,
    pub catalog: CatalogConfig,
    #[serde(default)]
    pub perimeter: PerimeterConfig,
    /// Upper bound on the list fan-out of a detail lookup. When absent the
    /// lookup waits for every list source to settle.
    #[serde(default)]
    pub fanout_deadline_secs: Option<u64>,
}

impl Config {
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.listener.validate()?;
        self.admin_listener.validate()?;
        self.catalog.validate()?;
        self.perimeter.validate()?;

        if self.fanout_deadline_secs == Some(0) {
            return Err(ValidationError::ZeroDeadline);
        }

        Ok(())
    }

    pub fn fanout_deadline(&self) -> Option<Duration> {
        self.fanout_deadline_secs.map(Duration::from_secs)
    }
}

/// Network listener configuration
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct Listener {
    /// Host address to bind to (e.g., "0.0.0.0" or "127.0.0.1")
    pub host: String,
    pub port: u16,
}

impl Listener {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.port == 0 {
            return Err(ValidationError::InvalidPort);
        }
        Ok(())
    }
}

/// Settings for the checks applied to every request before routing.
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct PerimeterConfig {
    /// Origins allowed by CORS. `"*"` allows any origin.
    #[serde(default = "default_allowed_origins")]
    pub allowed_origins: Vec<String>,
    /// Per-client request rate, e.g. `20-S` for twenty requests per second.
    #[serde(default = "default_rate_limit")]
    pub rate_limit: String,
    /// Identify clients by `X-Forwarded-For` / `X-Real-IP` when present
    /// instead of the socket peer address. Enable only behind a proxy.
    #[serde(default = "default_trust_forwarded_for")]
    pub trust_forwarded_for: bool,
}

impl Default for PerimeterConfig {
    fn default() -> Self {
        Self {
            allowed_origins: default_allowed_origins(),
            rate_limit: default_rate_limit(),
            trust_forwarded_for: default_trust_forwarded_for(),
        }
    }
}

impl PerimeterConfig {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.allowed_origins.is_empty() {
            return Err(ValidationError::EmptyAllowedOrigins);
        }
        self.rate_spec()?;
        Ok(())
    }

    pub fn rate_spec(&self) -> Result<RateSpec, ValidationError> {
        self.rate_limit
            .parse()
            .map_err(|_| ValidationError::InvalidRateLimit(self.rate_limit.clone()))
    }
}

fn default_allowed_origins() -> Vec<String> {
    vec!["*".to_string()]
}

fn default_rate_limit() -> String {
    "20-S".to_string()
}

fn default_trust_forwarded_for() -> bool {
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: &str = r#"
listener:
  host: "0.0.0.0"
  port: 8080
admin_listener:
  host: "127.0.0.1"
  port: 8081
catalog:
  endpoints:
    trending: "https://catalog.example.com/api/trending"
    latest: "https://catalog.example.com/api/latest"
    for_you: "https://catalog.example.com/api/foryou?page=1"
    popular_search: "https://catalog.example.com/api/populersearch"
    search: "https://catalog.example.com/api/search"
    episodes: "https://catalog.example.com/api/allepisode"
"#;

    fn parse(extra: &str) -> Config {
        serde_yaml::from_str(&format!("{BASE}{extra}")).unwrap()
    }

    #[test]
    fn test_defaults() {
        let config = parse("");
        config.validate().unwrap();

        assert_eq!(config.listener.port, 8080);
        assert_eq!(config.perimeter, PerimeterConfig::default());
        assert_eq!(config.perimeter.allowed_origins, vec!["*"]);
        assert_eq!(config.perimeter.rate_limit, "20-S");
        assert_eq!(config.fanout_deadline(), None);
        assert_eq!(config.catalog.max_attempts, 3);
    }

    #[test]
    fn test_perimeter_and_deadline() {
        let config = parse(
            r#"
perimeter:
  allowed_origins: ["https://app.example.com"]
  rate_limit: "100-M"
  trust_forwarded_for: true
fanout_deadline_secs: 15
"#,
        );
        config.validate().unwrap();

        assert_eq!(config.perimeter.allowed_origins, vec!["https://app.example.com"]);
        assert!(config.perimeter.trust_forwarded_for);
        assert_eq!(config.fanout_deadline(), Some(Duration::from_secs(15)));
    }

    #[test]
    fn test_validation_errors() {
        let mut config = parse("");
        config.admin_listener.port = 0;
        assert_eq!(config.validate(), Err(ValidationError::InvalidPort));

        let mut config = parse("");
        config.perimeter.allowed_origins.clear();
        assert_eq!(config.validate(), Err(ValidationError::EmptyAllowedOrigins));

        let mut config = parse("");
        config.perimeter.rate_limit = "20 per second".into();
        assert_eq!(
            config.validate(),
            Err(ValidationError::InvalidRateLimit("20 per second".into()))
        );

        let mut config = parse("");
        config.fanout_deadline_secs = Some(0);
        assert_eq!(config.validate(), Err(ValidationError::ZeroDeadline));

        let mut config = parse("");
        config.catalog.max_attempts = 0;
        assert_eq!(
            config.validate(),
            Err(ValidationError::Catalog(
                catalog::config::ValidationError::ZeroAttempts
            ))
        );
    }
}
