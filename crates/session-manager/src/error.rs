//! Refresh failure kinds
//!
//! `Clone` so a single in-flight refresh outcome can be handed to every
//! caller waiting on it.

use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RefreshError {
    #[error("no refresh token stored")]
    NoRefreshToken,

    #[error("refresh request failed: {0}")]
    Http(String),

    #[error("refresh token rejected: {0}")]
    Rejected(String),

    #[error("invalid refresh response: {0}")]
    InvalidResponse(String),

    #[error("refresh timed out after {0:?}")]
    Timeout(Duration),

    #[error("refresh task failed: {0}")]
    Task(String),

    #[error("refresh result discarded: session changed while it was in flight")]
    Superseded,
}

impl From<session_auth::Error> for RefreshError {
    fn from(err: session_auth::Error) -> Self {
        use session_auth::Error;
        match err {
            Error::RefreshRejected(msg) => RefreshError::Rejected(msg),
            Error::InvalidResponse(msg) | Error::InvalidRecord(msg) => {
                RefreshError::InvalidResponse(msg)
            }
            other => RefreshError::Http(other.to_string()),
        }
    }
}
