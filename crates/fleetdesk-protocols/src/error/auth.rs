//! Authentication flow errors.

use thiserror::Error;

use super::{ErrorKind, StorageError};

/// Errors raised by login, verify and logout.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("Invalid credentials: {0}")]
    InvalidCredentials(String),

    #[error("Session expired or invalid: {0}")]
    SessionExpired(String),

    #[error("Authentication server error: {status} - {message}")]
    Server { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Timeout after {0} ms")]
    Timeout(u64),

    #[error("Malformed authentication response: {0}")]
    Protocol(String),

    #[error("Token store error: {0}")]
    Storage(String),
}

impl AuthError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AuthError::InvalidCredentials(_) | AuthError::SessionExpired(_) => {
                ErrorKind::Authentication
            }
            AuthError::Server { .. } | AuthError::Network(_) | AuthError::Timeout(_) => {
                ErrorKind::Network
            }
            AuthError::Protocol(_) => ErrorKind::Protocol,
            AuthError::Storage(_) => ErrorKind::Storage,
        }
    }
}

impl From<StorageError> for AuthError {
    fn from(e: StorageError) -> Self {
        AuthError::Storage(e.to_string())
    }
}
