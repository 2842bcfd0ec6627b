//! Connection state and observer events.

use std::fmt;

use serde::Serialize;

use fleetdesk_protocols::RealtimeError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    Reconnecting,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
            ConnectionState::Reconnecting => "reconnecting",
        };
        f.write_str(s)
    }
}

/// Published on the status watch channel after every change.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConnectionStatus {
    pub state: ConnectionState,
    /// Failed attempts since the last successful connect.
    pub attempt: u32,
    /// Most recent failure. `ConnectionExhausted` once retries are spent.
    pub last_error: Option<RealtimeError>,
}

impl ConnectionStatus {
    pub fn is_exhausted(&self) -> bool {
        self.state == ConnectionState::Disconnected
            && matches!(self.last_error, Some(RealtimeError::ConnectionExhausted { .. }))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ConnectionEvent {
    StateChanged {
        from: ConnectionState,
        to: ConnectionState,
    },
    /// A connect or reconnect attempt failed.
    AttemptFailed { attempt: u32, error: RealtimeError },
    /// Reconnect attempts are spent. Only an explicit connect starts over.
    Exhausted { attempts: u32 },
    /// An inbound frame could not be decoded. The connection stays up.
    ProtocolError { error: RealtimeError },
}
