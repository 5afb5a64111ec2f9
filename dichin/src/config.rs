use gateway::config::Config as GatewayConfig;
use serde::Deserialize;
use std::fs::File;

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct MetricsConfig {
    pub statsd_host: String,
    pub statsd_port: u16,
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct LoggingConfig {
    /// Default filter when `RUST_LOG` is unset, e.g. `info` or `gateway=debug`.
    #[serde(default = "default_level")]
    pub level: String,
    pub sentry_dsn: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            sentry_dsn: None,
        }
    }
}

fn default_level() -> String {
    "info".to_string()
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct Config {
    pub metrics: Option<MetricsConfig>,
    #[serde(default)]
    pub logging: LoggingConfig,
    pub gateway: GatewayConfig,
}

impl Config {
    pub fn from_file(path: &std::path::Path) -> Result<Self, ConfigError> {
        let file = File::open(path)?;
        let config: Config = serde_yaml::from_reader(file)?;
        config.gateway.validate()?;

        Ok(config)
    }
}

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("could not load config from file: {0}")]
    LoadError(#[from] std::io::Error),
    #[error("could not parse config: {0}")]
    ParseError(#[from] serde_yaml::Error),
    #[error("invalid config: {0}")]
    Invalid(#[from] gateway::config::ValidationError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_tmp_file(s: &str) -> tempfile::NamedTempFile {
        let mut tmp = tempfile::NamedTempFile::new().expect("create temp file");
        write!(tmp, "{}", s).expect("write yaml");

        tmp
    }

    const GATEWAY_YAML: &str = r#"
            gateway:
                listener:
                    host: 0.0.0.0
                    port: 8080
                admin_listener:
                    host: 127.0.0.1
                    port: 8081
                catalog:
                    endpoints:
                        trending: https://catalog.example.com/api/trending
                        latest: https://catalog.example.com/api/latest
                        for_you: https://catalog.example.com/api/foryou
                        popular_search: https://catalog.example.com/api/populersearch
                        search: https://catalog.example.com/api/search
                        episodes: https://catalog.example.com/api/allepisode
        "#;

    #[test]
    fn gateway_only_config() {
        let tmp = write_tmp_file(GATEWAY_YAML);
        let config = Config::from_file(tmp.path()).expect("load config");

        assert_eq!(config.metrics, None);
        assert_eq!(config.logging, LoggingConfig::default());
        assert_eq!(config.gateway.listener.port, 8080);
        assert_eq!(config.gateway.perimeter.rate_limit, "20-S");
    }

    #[test]
    fn full_config() {
        let yaml = format!(
            r#"
            metrics:
                statsd_host: 127.0.0.1
                statsd_port: 8125
            logging:
                level: debug
                sentry_dsn: https://key@sentry.example.com/1
            {}"#,
            GATEWAY_YAML.trim_start()
        );
        let tmp = write_tmp_file(&yaml);
        let config = Config::from_file(tmp.path()).expect("load config");

        assert_eq!(
            config.metrics,
            Some(MetricsConfig {
                statsd_host: "127.0.0.1".into(),
                statsd_port: 8125,
            })
        );
        assert_eq!(config.logging.level, "debug");
        assert_eq!(
            config.logging.sentry_dsn.as_deref(),
            Some("https://key@sentry.example.com/1")
        );
    }

    #[test]
    fn invalid_gateway_config() {
        let yaml = GATEWAY_YAML.replace("port: 8081", "port: 0");
        let tmp = write_tmp_file(&yaml);

        assert!(matches!(
            Config::from_file(tmp.path()),
            Err(ConfigError::Invalid(
                gateway::config::ValidationError::InvalidPort
            ))
        ));
    }

    #[test]
    fn missing_file() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let result = Config::from_file(&dir.path().join("missing.yaml"));

        assert!(matches!(result, Err(ConfigError::LoadError(_))));
    }
}
