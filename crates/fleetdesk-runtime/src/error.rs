//! Runtime errors.

use thiserror::Error;

use fleetdesk_config::ConfigError;
use fleetdesk_protocols::error::{AuthError, ErrorKind, RequestError, TransferError};

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Request(#[from] RequestError),

    #[error(transparent)]
    Transfer(#[from] TransferError),
}

impl RuntimeError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            RuntimeError::Config(_) => ErrorKind::Configuration,
            RuntimeError::Auth(e) => e.kind(),
            RuntimeError::Request(e) => e.kind(),
            RuntimeError::Transfer(e) => e.kind(),
        }
    }
}
