use thiserror::Error;

/// Errors returned by the replay client.
///
/// A block that does not exist (yet) is not an error: `replay_block` returns `Ok(None)`.
#[derive(Debug, Error)]
pub enum ReplayError {
    /// The request was rejected locally before any network call.
    #[error("invalid replay request: {0}")]
    InvalidRequest(String),

    /// Connection failure, timeout, or a retryable HTTP status after all retries.
    #[error("transport error: {0}")]
    Transport(String),

    /// The API key was missing or refused.
    #[error("unauthorized (HTTP {status}): {body}")]
    Unauthorized { status: u16, body: String },

    /// The service refused the request for a non-transient reason.
    #[error("request rejected (HTTP {status}): {body}")]
    Rejected { status: u16, body: String },

    /// The response body was not a chainhook payload.
    #[error("failed to decode replay response: {0}")]
    Decode(String),

    #[error("replay cancelled")]
    Cancelled,
}

impl ReplayError {
    /// Returns `true` if retrying the same request may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transport(_))
    }

    /// Classify an HTTP status that is neither success nor "not found".
    pub(crate) fn from_status(status: u16, body: String) -> Self {
        match status {
            401 | 403 => Self::Unauthorized { status, body },
            408 | 425 | 429 | 500..=599 => Self::Transport(format!("HTTP {}: {}", status, body)),
            _ => Self::Rejected { status, body },
        }
    }
}

impl From<reqwest::Error> for ReplayError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_builder() {
            // Bad base URL or header value: retrying cannot help.
            Self::InvalidRequest(e.to_string())
        } else if e.is_decode() {
            Self::Decode(e.to_string())
        } else {
            Self::Transport(e.to_string())
        }
    }
}
