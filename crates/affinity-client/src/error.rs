//! Client error taxonomy.
//!
//! The reconciliation layer treats every variant the same way (state left
//! untouched, one notification), so the split only matters for logging.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("server returned {status} {code}: {message}")]
    Status {
        status: u16,
        code: String,
        message: String,
    },

    #[error("could not decode response: {0}")]
    Decode(String),

    #[error("invalid client configuration: {0}")]
    Config(String),
}

impl ClientError {
    /// True when the server rejected the caller's session.
    pub fn is_unauthenticated(&self) -> bool {
        matches!(self, ClientError::Status { status: 401, .. })
    }
}

pub type Result<T> = std::result::Result<T, ClientError>;
