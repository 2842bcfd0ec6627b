use super::*;
use std::time::Duration;

use parking_lot::Mutex;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::StatusCode;

use fleetdesk_protocols::StaticCredential;

use crate::{ConnectionManager, ConnectionState, ReconnectPolicy};

#[test]
fn test_websocket_url_mapping() {
    assert_eq!(websocket_url("http://h:1/rt").unwrap().as_str(), "ws://h:1/rt");
    assert_eq!(websocket_url("https://h/rt").unwrap().as_str(), "wss://h/rt");
    assert_eq!(websocket_url("ws://h/rt").unwrap().as_str(), "ws://h/rt");
    assert!(websocket_url("ftp://h/rt").is_err());
    assert!(websocket_url("not a url").is_err());
}

/// Accepts one client, records its Authorization header, forwards the first
/// frame it receives, then pushes one event.
async fn spawn_server(
    reject: bool,
) -> (String, Arc<Mutex<Option<String>>>, tokio::sync::oneshot::Receiver<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let seen_auth = Arc::new(Mutex::new(None));
    let (first_frame_tx, first_frame_rx) = tokio::sync::oneshot::channel();

    let auth = seen_auth.clone();
    tokio::spawn(async move {
        let (tcp, _) = listener.accept().await.unwrap();
        let callback = |req: &Request, resp: Response| -> Result<Response, ErrorResponse> {
            *auth.lock() = req
                .headers()
                .get("authorization")
                .and_then(|v| v.to_str().ok())
                .map(str::to_string);
            if reject {
                let mut denied = ErrorResponse::new(None);
                *denied.status_mut() = StatusCode::UNAUTHORIZED;
                return Err(denied);
            }
            Ok(resp)
        };
        let Ok(mut ws) = tokio_tungstenite::accept_hdr_async(tcp, callback).await else {
            return;
        };
        if let Some(Ok(Message::Text(text))) = ws.next().await {
            let _ = first_frame_tx.send(text.as_str().to_owned());
        }
        let event = r#"{"topic":"location.update","channel":"device:42","payload":{"lat":1}}"#;
        ws.send(Message::Text(event.into())).await.unwrap();
        // Keep the socket open until the client goes away.
        while let Some(Ok(_)) = ws.next().await {}
    });

    (format!("ws://{}/realtime", addr), seen_auth, first_frame_rx)
}

#[tokio::test]
async fn test_loopback_join_and_event() {
    let (url, seen_auth, first_frame) = spawn_server(false).await;
    let manager = ConnectionManager::new(
        url,
        ReconnectPolicy::fixed(Duration::from_millis(50), 3),
        Arc::new(WebSocketConnector::new()),
        Arc::new(StaticCredential::new("tok-1")),
    );

    let received = Arc::new(Mutex::new(Vec::new()));
    let sink = received.clone();
    let _sub = manager.subscribe("location.update", move |event| sink.lock().push(event.clone()));
    let _channel = manager.join_channel("device:42");
    manager.connect();

    let frame = tokio::time::timeout(Duration::from_secs(5), first_frame)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(frame, r#"{"type":"join","channel":"device:42"}"#);
    assert_eq!(seen_auth.lock().as_deref(), Some("Bearer tok-1"));

    tokio::time::timeout(Duration::from_secs(5), async {
        while received.lock().is_empty() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap();
    assert_eq!(received.lock()[0].payload["lat"], 1);
    assert_eq!(manager.state(), ConnectionState::Connected);
    manager.disconnect();
}

#[tokio::test]
async fn test_non_utf8_binary_frame_is_reported_not_dropped() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let accepted = Arc::new(Mutex::new(0u32));

    let count = accepted.clone();
    tokio::spawn(async move {
        while let Ok((tcp, _)) = listener.accept().await {
            *count.lock() += 1;
            let Ok(mut ws) = tokio_tungstenite::accept_async(tcp).await else {
                continue;
            };
            tokio::spawn(async move {
                ws.send(Message::Binary(vec![0xff, 0xfe].into())).await.unwrap();
                let event = r#"{"topic":"location.update","payload":{"lat":2}}"#;
                ws.send(Message::Text(event.into())).await.unwrap();
                while let Some(Ok(_)) = ws.next().await {}
            });
        }
    });

    let manager = ConnectionManager::new(
        format!("ws://{}/realtime", addr),
        ReconnectPolicy::fixed(Duration::from_millis(50), 3),
        Arc::new(WebSocketConnector::new()),
        Arc::new(StaticCredential::new("tok-1")),
    );
    let events = Arc::new(Mutex::new(Vec::new()));
    let log = events.clone();
    let _events = manager.on_event(move |event| log.lock().push(event.clone()));
    let received = Arc::new(Mutex::new(Vec::new()));
    let sink = received.clone();
    let _sub = manager.subscribe("location.update", move |event| sink.lock().push(event.clone()));
    manager.connect();

    tokio::time::timeout(Duration::from_secs(5), async {
        while received.lock().is_empty() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap();

    assert_eq!(received.lock()[0].payload["lat"], 2);
    let events = events.lock();
    assert!(events.iter().any(|e| matches!(
        e,
        crate::ConnectionEvent::ProtocolError { error: RealtimeError::Protocol(_) }
    )));
    assert!(!events.iter().any(|e| matches!(
        e,
        crate::ConnectionEvent::StateChanged { to: ConnectionState::Reconnecting, .. }
    )));
    assert_eq!(manager.state(), ConnectionState::Connected);
    assert_eq!(*accepted.lock(), 1);
    drop(events);
    manager.disconnect();
}

#[tokio::test]
async fn test_rejected_handshake_reports_status() {
    let (url, _seen_auth, _first) = spawn_server(true).await;
    let result = WebSocketConnector::new()
        .connect(ConnectRequest { url, token: None })
        .await;
    assert!(matches!(
        result,
        Err(RealtimeError::HandshakeRejected { status: 401 })
    ));
}

#[tokio::test]
async fn test_refused_connection() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let result = WebSocketConnector::new()
        .connect(ConnectRequest {
            url: format!("ws://{}/realtime", addr),
            token: None,
        })
        .await;
    assert!(matches!(result, Err(RealtimeError::Connect(_))));
}
