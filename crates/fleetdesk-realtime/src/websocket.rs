//! WebSocket transport.

use async_trait::async_trait;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::{HeaderValue, header::AUTHORIZATION};
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::{debug, trace};
use url::Url;

use fleetdesk_protocols::RealtimeError;

use crate::transport::{ConnectRequest, Connector, FrameSink, FrameStream, TransportPair};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Connects over WebSocket, sending the credential as an
/// `Authorization: Bearer` header on the upgrade request.
#[derive(Debug, Clone, Default)]
pub struct WebSocketConnector;

impl WebSocketConnector {
    pub fn new() -> Self {
        Self
    }
}

/// Normalize `http(s)` to `ws(s)`.
pub(crate) fn websocket_url(raw: &str) -> Result<Url, RealtimeError> {
    let mut url = Url::parse(raw).map_err(|e| RealtimeError::Connect(format!("{}: {}", raw, e)))?;
    let scheme = match url.scheme() {
        "ws" | "http" => "ws",
        "wss" | "https" => "wss",
        other => {
            return Err(RealtimeError::Connect(format!(
                "unsupported realtime scheme: {}",
                other
            )));
        }
    };
    if url.scheme() != scheme && url.set_scheme(scheme).is_err() {
        return Err(RealtimeError::Connect(format!("cannot use {} as {}", raw, scheme)));
    }
    Ok(url)
}

#[async_trait]
impl Connector for WebSocketConnector {
    async fn connect(&self, request: ConnectRequest) -> Result<TransportPair, RealtimeError> {
        let url = websocket_url(&request.url)?;
        let mut upgrade = url
            .as_str()
            .into_client_request()
            .map_err(|e| RealtimeError::Connect(e.to_string()))?;

        if let Some(token) = &request.token {
            let value = HeaderValue::from_str(&format!("Bearer {}", token))
                .map_err(|e| RealtimeError::Connect(format!("invalid credential header: {}", e)))?;
            upgrade.headers_mut().insert(AUTHORIZATION, value);
        }

        debug!("Opening WebSocket to {}", url);
        let (ws_stream, _) = match tokio_tungstenite::connect_async(upgrade).await {
            Ok(pair) => pair,
            Err(WsError::Http(response)) => {
                return Err(RealtimeError::HandshakeRejected {
                    status: response.status().as_u16(),
                });
            }
            Err(e) => return Err(RealtimeError::Connect(e.to_string())),
        };

        let (sink, stream) = ws_stream.split();
        Ok(TransportPair {
            sink: Box::new(WsFrameSink(sink)),
            stream: Box::new(WsFrameStream(stream)),
        })
    }
}

struct WsFrameSink(SplitSink<WsStream, Message>);

#[async_trait]
impl FrameSink for WsFrameSink {
    async fn send(&mut self, frame: String) -> Result<(), RealtimeError> {
        trace!("ws send: {}", frame);
        self.0
            .send(Message::Text(frame.into()))
            .await
            .map_err(|e| RealtimeError::TransportClosed(e.to_string()))
    }

    async fn close(&mut self) {
        if let Err(e) = self.0.close().await {
            debug!("WebSocket close failed: {}", e);
        }
    }
}

struct WsFrameStream(SplitStream<WsStream>);

#[async_trait]
impl FrameStream for WsFrameStream {
    async fn next_frame(&mut self) -> Option<Result<String, RealtimeError>> {
        loop {
            match self.0.next().await? {
                Ok(Message::Text(text)) => return Some(Ok(text.as_str().to_owned())),
                Ok(Message::Binary(bytes)) => {
                    return Some(
                        String::from_utf8(bytes.to_vec())
                            .map_err(|e| RealtimeError::Protocol(e.to_string())),
                    );
                }
                Ok(Message::Close(frame)) => {
                    debug!("WebSocket closed by peer: {:?}", frame);
                    return None;
                }
                Ok(_) => continue,
                Err(e) => return Some(Err(RealtimeError::TransportClosed(e.to_string()))),
            }
        }
    }
}

#[cfg(test)]
#[path = "websocket_tests.rs"]
mod tests;
