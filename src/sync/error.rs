//! Error taxonomy for the upstream sync client.

use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("rate limit exceeded, would need to wait {0:?}")]
    RateLimitExceeded(Duration),

    #[error("circuit breaker is open")]
    CircuitOpen,

    #[error("request failed with status {status}: {body}")]
    RequestFailed {
        status: u16,
        body: String,
        retry_after: Option<Duration>,
    },

    #[error("failed to decode response: {0}")]
    Decode(String),

    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
}

impl SyncError {
    /// Retryable iff rate-limit, upstream 5xx / `SERVER_ERROR` /
    /// `TEMPORARILY_UNAVAILABLE`, or a transient transport error
    /// (timeout, connect, or "looks like EOF/connection reset").
    pub fn is_retryable(&self) -> bool {
        match self {
            SyncError::RateLimitExceeded(_) => true,
            SyncError::RequestFailed { status, body, .. } => {
                *status >= 500
                    || body.contains("SERVER_ERROR")
                    || body.contains("TEMPORARILY_UNAVAILABLE")
            }
            SyncError::Transport(e) => {
                e.is_timeout() || e.is_connect() || e.is_request()
            }
            SyncError::CircuitOpen | SyncError::Decode(_) => false,
        }
    }
}

pub type SyncResult<T> = Result<T, SyncError>;
