//! Error types for the sync engine.
//!
//! The split that matters is [`ClientError::is_retryable`]: transient
//! failures are retried and then queued, everything else is surfaced to the
//! caller straight away.

use std::time::Duration;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, ClientError>;

#[derive(Debug, Error)]
pub enum ClientError {
    /// The server has no live record for this story. Callers holding a
    /// snapshot retry once with it.
    #[error("story {0} not found")]
    NotFound(String),

    /// Rejected input. Never retried.
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    /// Connection refused, reset, DNS failure and the like.
    #[error("network error: {0}")]
    Network(String),

    /// Any other non-success response.
    #[error("server returned {status}: {body}")]
    Upstream { status: u16, body: String },

    /// The same like is already being sent.
    #[error("a like for story {story_id} by {user_id} is already in flight")]
    InFlight { story_id: String, user_id: String },

    #[error("offline")]
    Offline,

    #[error("local storage: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed payload: {0}")]
    Json(#[from] serde_json::Error),
}

impl ClientError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Timeouts, connection failures, 5xx, 409 and 429.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Timeout(_) | Self::Network(_) | Self::Offline => true,
            Self::Upstream { status, .. } => *status >= 500 || *status == 409 || *status == 429,
            _ => false,
        }
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            return Self::Upstream {
                status: e.status().map_or(200, |s| s.as_u16()),
                body: e.to_string(),
            };
        }
        Self::Network(e.to_string())
    }
}
