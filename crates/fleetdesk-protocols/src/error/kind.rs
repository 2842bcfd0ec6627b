//! Error classification shared by every runtime error enum.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Classified failure category.
///
/// Every runtime error maps to exactly one kind so that callers can react to
/// a class of failure (redirect to login, show a disconnected badge) without
/// matching on each crate's enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Bad credentials, expired or invalid token.
    Authentication,
    /// 401-equivalent on an authenticated call.
    Authorization,
    /// Timeout, refused connection, dropped transport.
    Network,
    /// Malformed realtime message or unparsable response body.
    Protocol,
    /// Reconnect attempts exhausted.
    ConnectionExhausted,
    /// Transfer queue re-enqueue of a live identifier.
    DuplicateTask,
    /// Transfer executor failure.
    Executor,
    /// Request rejected by the server for a non-transient reason.
    Request,
    /// Durable store failure.
    Storage,
    /// Invalid configuration or endpoint.
    Configuration,
    /// Anything else.
    Other,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Authentication => "authentication",
            ErrorKind::Authorization => "authorization",
            ErrorKind::Network => "network",
            ErrorKind::Protocol => "protocol",
            ErrorKind::ConnectionExhausted => "connection_exhausted",
            ErrorKind::DuplicateTask => "duplicate_task",
            ErrorKind::Executor => "executor",
            ErrorKind::Request => "request",
            ErrorKind::Storage => "storage",
            ErrorKind::Configuration => "configuration",
            ErrorKind::Other => "other",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
