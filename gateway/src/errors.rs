use crate::config::ValidationError;
use thiserror::Error;

/// Result type alias for gateway operations
pub type Result<T, E = GatewayError> = std::result::Result<T, E>;

/// Errors that can occur while setting up or serving the gateway.
///
/// Upstream and resolution failures are not listed here: they are turned
/// into responses where they happen and never abort a request.
#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(#[from] ValidationError),

    #[error("Upstream client error: {0}")]
    UpstreamClient(#[from] catalog::FetchError),

    #[error("Response serialization error: {0}")]
    ResponseSerialization(#[from] serde_json::Error),
}
