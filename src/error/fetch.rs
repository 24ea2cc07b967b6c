use reqwest::StatusCode;
use thiserror::Error as ThisError;

use super::ErrorKind;

#[derive(Debug, ThisError)]
pub enum FetchError {
    /// Connection refused, DNS failure, timeout, or a body that could not be read.
    #[error("HTTP request error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Upstream error with status: {0}")]
    UpstreamStatus(StatusCode),

    /// Body is not JSON, or does not match `[{ "id": int, "title": string }, ...]`.
    #[error("Malformed upstream payload: {0}")]
    Decode(#[from] serde_json::Error),
}

impl FetchError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            FetchError::Transport(_) | FetchError::UpstreamStatus(_) => ErrorKind::Transport,
            FetchError::Decode(_) => ErrorKind::Decode,
        }
    }
}
