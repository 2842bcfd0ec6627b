//! Request gateway errors.

use thiserror::Error;

use super::ErrorKind;

/// Errors surfaced by the request gateway.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RequestError {
    /// The server answered 401. The session has already been cleared when
    /// this reaches the caller.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Request timed out after {0} ms")]
    Timeout(u64),

    #[error("Network error: {0}")]
    Network(String),

    #[error("HTTP {status}: {message}")]
    Status { status: u16, message: String },

    /// Well-formed envelope carrying `success: false`.
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Failed to parse response: {0}")]
    Parse(String),

    #[error("Invalid endpoint: {0}")]
    InvalidEndpoint(String),
}

impl RequestError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            RequestError::Unauthorized(_) => ErrorKind::Authorization,
            RequestError::Timeout(_) | RequestError::Network(_) => ErrorKind::Network,
            RequestError::Status { status, .. } if *status >= 500 => ErrorKind::Network,
            RequestError::Status { .. } | RequestError::Api { .. } => ErrorKind::Request,
            RequestError::Parse(_) => ErrorKind::Protocol,
            RequestError::InvalidEndpoint(_) => ErrorKind::Configuration,
        }
    }

    /// HTTP status attached to the error, if the server answered at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            RequestError::Unauthorized(_) => Some(401),
            RequestError::Status { status, .. } | RequestError::Api { status, .. } => Some(*status),
            _ => None,
        }
    }
}
