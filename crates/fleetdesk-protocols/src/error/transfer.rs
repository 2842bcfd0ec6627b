//! Transfer queue errors.

use thiserror::Error;

use super::ErrorKind;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransferError {
    #[error("Transfer already queued or active: {0}")]
    DuplicateTask(String),

    #[error("Transfer not found: {0}")]
    NotFound(String),

    #[error("Transfer still in progress: {0}")]
    NotFinished(String),

    /// Reason reported by the caller-supplied executor, passed through as-is.
    #[error("Transfer executor failed: {0}")]
    Executor(String),

    #[error("Transfer I/O error: {0}")]
    Io(String),
}

impl TransferError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            TransferError::DuplicateTask(_) => ErrorKind::DuplicateTask,
            TransferError::Executor(_) => ErrorKind::Executor,
            TransferError::Io(_) => ErrorKind::Storage,
            TransferError::NotFound(_) | TransferError::NotFinished(_) => ErrorKind::Other,
        }
    }
}

impl From<std::io::Error> for TransferError {
    fn from(e: std::io::Error) -> Self {
        TransferError::Io(e.to_string())
    }
}
