//! Realtime wire messages.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use fleetdesk_protocols::RealtimeError;

/// Outbound control message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ControlMessage {
    Join { channel: String },
    Leave { channel: String },
}

impl ControlMessage {
    pub fn join(channel: impl Into<String>) -> Self {
        ControlMessage::Join {
            channel: channel.into(),
        }
    }

    pub fn leave(channel: impl Into<String>) -> Self {
        ControlMessage::Leave {
            channel: channel.into(),
        }
    }

    pub fn channel(&self) -> &str {
        match self {
            ControlMessage::Join { channel } | ControlMessage::Leave { channel } => channel,
        }
    }

    pub fn to_frame(&self) -> Result<String, RealtimeError> {
        serde_json::to_string(self).map_err(|e| RealtimeError::Protocol(e.to_string()))
    }
}

/// Inbound event, delivered to every subscriber of `topic`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InboundEvent {
    pub topic: String,
    #[serde(default)]
    pub payload: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel: Option<String>,
}

/// Decode an inbound text frame.
pub fn parse_inbound(frame: &str) -> Result<InboundEvent, RealtimeError> {
    let event: InboundEvent =
        serde_json::from_str(frame).map_err(|e| RealtimeError::Protocol(e.to_string()))?;
    if event.topic.is_empty() {
        return Err(RealtimeError::Protocol("event has an empty topic".to_string()));
    }
    Ok(event)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_control_wire_format() {
        let join = ControlMessage::join("device:42").to_frame().unwrap();
        let value: Value = serde_json::from_str(&join).unwrap();
        assert_eq!(value, json!({"type": "join", "channel": "device:42"}));

        let leave = ControlMessage::leave("device:42").to_frame().unwrap();
        let value: Value = serde_json::from_str(&leave).unwrap();
        assert_eq!(value, json!({"type": "leave", "channel": "device:42"}));
    }

    #[test]
    fn test_parse_inbound() {
        let event = parse_inbound(
            r#"{"topic":"location.update","channel":"device:42","payload":{"lat":1.5}}"#,
        )
        .unwrap();
        assert_eq!(event.topic, "location.update");
        assert_eq!(event.channel.as_deref(), Some("device:42"));
        assert_eq!(event.payload["lat"], 1.5);
    }

    #[test]
    fn test_parse_inbound_without_payload() {
        let event = parse_inbound(r#"{"topic":"ping"}"#).unwrap();
        assert!(event.payload.is_null());
        assert!(event.channel.is_none());
    }

    #[test]
    fn test_parse_inbound_rejects_malformed() {
        assert!(matches!(parse_inbound("not json"), Err(RealtimeError::Protocol(_))));
        assert!(matches!(parse_inbound(r#"{"payload":{}}"#), Err(RealtimeError::Protocol(_))));
        assert!(matches!(parse_inbound(r#"{"topic":""}"#), Err(RealtimeError::Protocol(_))));
    }
}
