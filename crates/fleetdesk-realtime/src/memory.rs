//! In-process transport.
//!
//! [`MemoryServer`] plays the server side: it can refuse or reject
//! handshakes, push events, drop the live connection and report every frame
//! the client sent. [`MemoryConnector`] is the client half handed to a
//! [`ConnectionManager`](crate::ConnectionManager).

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{Value, json};
use tokio::sync::mpsc;
use tracing::debug;

use fleetdesk_protocols::RealtimeError;

use crate::message::ControlMessage;
use crate::transport::{ConnectRequest, Connector, FrameSink, FrameStream, TransportPair};

enum ServerFrame {
    Text(String),
    Binary(Vec<u8>),
    Drop,
}

struct LiveConnection {
    id: u64,
    tx: mpsc::UnboundedSender<ServerFrame>,
}

#[derive(Default)]
struct ServerState {
    refuse_next: u32,
    refuse_all: bool,
    required_token: Option<String>,
    attempts: u32,
    tokens: Vec<Option<String>>,
    received: Vec<String>,
    next_id: u64,
    live: Option<LiveConnection>,
}

/// Server side of the in-process transport. Cloning shares the server.
#[derive(Clone, Default)]
pub struct MemoryServer {
    state: Arc<Mutex<ServerState>>,
}

impl MemoryServer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn connector(&self) -> MemoryConnector {
        MemoryConnector {
            server: self.clone(),
        }
    }

    /// Refuse the next `n` connect attempts.
    pub fn refuse_next(&self, n: u32) {
        self.state.lock().refuse_next = n;
    }

    pub fn refuse_all(&self, refuse: bool) {
        self.state.lock().refuse_all = refuse;
    }

    /// Reject handshakes whose credential differs from `token` with a 401.
    pub fn require_token(&self, token: impl Into<String>) {
        self.state.lock().required_token = Some(token.into());
    }

    /// Push an event to the live connection. Returns false when none is up.
    pub fn emit(&self, topic: &str, payload: Value) -> bool {
        self.emit_raw(json!({"topic": topic, "payload": payload}).to_string())
    }

    pub fn emit_on(&self, channel: &str, topic: &str, payload: Value) -> bool {
        self.emit_raw(json!({"topic": topic, "channel": channel, "payload": payload}).to_string())
    }

    pub fn emit_raw(&self, frame: impl Into<String>) -> bool {
        match &self.state.lock().live {
            Some(live) => live.tx.send(ServerFrame::Text(frame.into())).is_ok(),
            None => false,
        }
    }

    /// Push a binary frame, decoded as UTF-8 text on the client side.
    pub fn emit_binary(&self, bytes: impl Into<Vec<u8>>) -> bool {
        match &self.state.lock().live {
            Some(live) => live.tx.send(ServerFrame::Binary(bytes.into())).is_ok(),
            None => false,
        }
    }

    /// Drop the live connection as a network failure would.
    pub fn drop_connection(&self) -> bool {
        match self.state.lock().live.take() {
            Some(live) => live.tx.send(ServerFrame::Drop).is_ok(),
            None => false,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.state
            .lock()
            .live
            .as_ref()
            .is_some_and(|live| !live.tx.is_closed())
    }

    /// Connect attempts seen, successful or not.
    pub fn attempts(&self) -> u32 {
        self.state.lock().attempts
    }

    /// Credential presented on each attempt, in order.
    pub fn tokens(&self) -> Vec<Option<String>> {
        self.state.lock().tokens.clone()
    }

    /// Raw frames received from clients, in order.
    pub fn sent_frames(&self) -> Vec<String> {
        self.state.lock().received.clone()
    }

    /// Received frames that decode as control messages.
    pub fn sent_messages(&self) -> Vec<ControlMessage> {
        self.state
            .lock()
            .received
            .iter()
            .filter_map(|frame| serde_json::from_str(frame).ok())
            .collect()
    }

    fn accept(&self, request: &ConnectRequest) -> Result<(u64, mpsc::UnboundedReceiver<ServerFrame>), RealtimeError> {
        let mut state = self.state.lock();
        state.attempts += 1;
        state.tokens.push(request.token.clone());

        if state.refuse_all {
            return Err(RealtimeError::Connect("connection refused".to_string()));
        }
        if state.refuse_next > 0 {
            state.refuse_next -= 1;
            return Err(RealtimeError::Connect("connection refused".to_string()));
        }
        if let Some(required) = &state.required_token {
            if request.token.as_ref() != Some(required) {
                return Err(RealtimeError::HandshakeRejected { status: 401 });
            }
        }

        let (tx, rx) = mpsc::unbounded_channel();
        state.next_id += 1;
        let id = state.next_id;
        state.live = Some(LiveConnection { id, tx });
        debug!("Memory server accepted connection {}", id);
        Ok((id, rx))
    }

    fn receive(&self, id: u64, frame: String) -> Result<(), RealtimeError> {
        let mut state = self.state.lock();
        if state.live.as_ref().is_some_and(|live| live.id == id) {
            state.received.push(frame);
            Ok(())
        } else {
            Err(RealtimeError::TransportClosed("connection dropped".to_string()))
        }
    }

    fn hang_up(&self, id: u64) {
        let mut state = self.state.lock();
        if state.live.as_ref().is_some_and(|live| live.id == id) {
            state.live = None;
        }
    }
}

/// Client half of the in-process transport.
#[derive(Clone)]
pub struct MemoryConnector {
    server: MemoryServer,
}

#[async_trait]
impl Connector for MemoryConnector {
    async fn connect(&self, request: ConnectRequest) -> Result<TransportPair, RealtimeError> {
        let (id, rx) = self.server.accept(&request)?;
        Ok(TransportPair {
            sink: Box::new(MemorySink {
                server: self.server.clone(),
                id,
            }),
            stream: Box::new(MemoryStream { rx }),
        })
    }
}

struct MemorySink {
    server: MemoryServer,
    id: u64,
}

#[async_trait]
impl FrameSink for MemorySink {
    async fn send(&mut self, frame: String) -> Result<(), RealtimeError> {
        self.server.receive(self.id, frame)
    }

    async fn close(&mut self) {
        self.server.hang_up(self.id);
    }
}

struct MemoryStream {
    rx: mpsc::UnboundedReceiver<ServerFrame>,
}

#[async_trait]
impl FrameStream for MemoryStream {
    async fn next_frame(&mut self) -> Option<Result<String, RealtimeError>> {
        match self.rx.recv().await? {
            ServerFrame::Text(text) => Some(Ok(text)),
            ServerFrame::Binary(bytes) => {
                Some(String::from_utf8(bytes).map_err(|e| RealtimeError::Protocol(e.to_string())))
            }
            ServerFrame::Drop => Some(Err(RealtimeError::TransportClosed(
                "dropped by server".to_string(),
            ))),
        }
    }
}
