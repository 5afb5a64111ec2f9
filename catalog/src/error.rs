use reqwest::StatusCode;
use thiserror::Error;

/// Why a single attempt against the upstream did not succeed.
#[derive(Error, Debug)]
pub enum AttemptFailure {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("unexpected status code {0}")]
    Status(StatusCode),
}

/// Errors returned by [`crate::client::FetchClient::fetch`].
#[derive(Error, Debug)]
pub enum FetchError {
    /// Every attempt failed; carries the failure of the last one.
    #[error("request to {url} failed after {attempts} attempts")]
    Exhausted {
        url: String,
        attempts: u32,
        #[source]
        last: AttemptFailure,
    },

    #[error("invalid upstream url: {0}")]
    InvalidUrl(String),

    #[error("invalid request header: {0}")]
    InvalidHeader(String),

    #[error("could not build http client: {0}")]
    Build(#[source] reqwest::Error),
}

impl FetchError {
    /// Status code of the last attempt, if it got as far as a response.
    pub fn last_status(&self) -> Option<StatusCode> {
        match self {
            FetchError::Exhausted {
                last: AttemptFailure::Status(status),
                ..
            } => Some(*status),
            _ => None,
        }
    }

    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            FetchError::Exhausted {
                last: AttemptFailure::Transport(_),
                ..
            }
        )
    }
}

/// A response body that does not have the container shape the endpoint
/// is supposed to return.
#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("malformed flat list response: {0}")]
    FlatList(#[source] serde_json::Error),
    #[error("malformed grouped feed response: {0}")]
    GroupedFeed(#[source] serde_json::Error),
}

/// Failure of one source: either the fetch or the decode of its body.
#[derive(Error, Debug)]
pub enum SourceError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error(transparent)]
    Decode(#[from] DecodeError),
}
