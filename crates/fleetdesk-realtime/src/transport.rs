//! Transport seam between the connection manager and the wire.

use std::fmt;

use async_trait::async_trait;

use fleetdesk_protocols::RealtimeError;

/// Handshake parameters for one connect attempt.
#[derive(Clone)]
pub struct ConnectRequest {
    pub url: String,
    /// Bearer credential carried at handshake time.
    pub token: Option<String>,
}

impl fmt::Debug for ConnectRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectRequest")
            .field("url", &self.url)
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Both halves of an established transport.
pub struct TransportPair {
    pub sink: Box<dyn FrameSink>,
    pub stream: Box<dyn FrameStream>,
}

/// Opens transports. A rejected handshake is an error like any other
/// connect failure.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, request: ConnectRequest) -> Result<TransportPair, RealtimeError>;
}

#[async_trait]
pub trait FrameSink: Send {
    async fn send(&mut self, frame: String) -> Result<(), RealtimeError>;

    /// Best-effort close.
    async fn close(&mut self);
}

#[async_trait]
pub trait FrameStream: Send {
    /// Next text frame. `None` once the peer closed the transport. A
    /// `Protocol` error covers a single undecodable frame, any other error
    /// ends the transport.
    async fn next_frame(&mut self) -> Option<Result<String, RealtimeError>>;
}
