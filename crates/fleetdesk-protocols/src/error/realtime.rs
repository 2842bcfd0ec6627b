//! Realtime connection errors.

use thiserror::Error;

use super::ErrorKind;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RealtimeError {
    #[error("Handshake rejected with status {status}")]
    HandshakeRejected { status: u16 },

    #[error("Connection failed: {0}")]
    Connect(String),

    #[error("Transport closed: {0}")]
    TransportClosed(String),

    #[error("Malformed realtime message: {0}")]
    Protocol(String),

    #[error("Reconnect attempts exhausted after {attempts} attempts")]
    ConnectionExhausted { attempts: u32 },

    #[error("Not connected")]
    NotConnected,
}

impl RealtimeError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            RealtimeError::HandshakeRejected { status } if *status == 401 || *status == 403 => {
                ErrorKind::Authentication
            }
            RealtimeError::HandshakeRejected { .. }
            | RealtimeError::Connect(_)
            | RealtimeError::TransportClosed(_)
            | RealtimeError::NotConnected => ErrorKind::Network,
            RealtimeError::Protocol(_) => ErrorKind::Protocol,
            RealtimeError::ConnectionExhausted { .. } => ErrorKind::ConnectionExhausted,
        }
    }

    /// Whether the error ends the reconnect cycle.
    pub fn is_terminal(&self) -> bool {
        matches!(self, RealtimeError::ConnectionExhausted { .. })
    }
}
