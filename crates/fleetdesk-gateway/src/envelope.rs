//! Normalized response envelope.

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use fleetdesk_protocols::RequestError;

/// A successful response after normalization.
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    pub status: u16,
    /// Payload. `Null` for an empty or 204 response.
    pub data: Value,
    pub message: Option<String>,
}

impl Envelope {
    /// Decode `data` into `T`. A shape mismatch is a parse error.
    pub fn into_data<T: DeserializeOwned>(self) -> Result<T, RequestError> {
        serde_json::from_value(self.data).map_err(|e| RequestError::Parse(e.to_string()))
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_null()
    }
}

/// Normalize a 2xx response body.
///
/// - `204` or an empty body yields `Null` data.
/// - An object with a boolean `success` is an envelope: `false` becomes
///   [`RequestError::Api`], `true` yields `data` (or the remaining fields when
///   `data` is absent).
/// - Any other JSON value is the data itself.
/// - A body that is not JSON is [`RequestError::Parse`], never empty data.
pub fn parse_envelope(status: u16, body: &[u8]) -> Result<Envelope, RequestError> {
    if status == 204 || body.iter().all(u8::is_ascii_whitespace) {
        return Ok(Envelope {
            status,
            data: Value::Null,
            message: None,
        });
    }

    let value: Value =
        serde_json::from_slice(body).map_err(|e| RequestError::Parse(e.to_string()))?;

    let Value::Object(mut object) = value else {
        return Ok(Envelope {
            status,
            data: value,
            message: None,
        });
    };

    let Some(success) = object.get("success").and_then(Value::as_bool) else {
        return Ok(Envelope {
            status,
            data: Value::Object(object),
            message: None,
        });
    };

    let message = take_message(&mut object);
    if !success {
        return Err(RequestError::Api {
            status,
            message: message.unwrap_or_else(|| "request failed".to_string()),
        });
    }

    object.remove("success");
    let data = match object.remove("data") {
        Some(data) => data,
        None if object.is_empty() => Value::Null,
        None => Value::Object(object),
    };

    Ok(Envelope {
        status,
        data,
        message,
    })
}

fn take_message(object: &mut Map<String, Value>) -> Option<String> {
    match object.remove("message") {
        Some(Value::String(message)) => Some(message),
        Some(other) => Some(other.to_string()),
        None => object
            .get("error")
            .and_then(Value::as_str)
            .map(str::to_string),
    }
}

/// Human-readable reason from a non-2xx body.
pub(crate) fn error_message(body: &[u8], fallback: &str) -> String {
    if let Ok(Value::Object(mut object)) = serde_json::from_slice::<Value>(body) {
        if let Some(message) = take_message(&mut object) {
            return message;
        }
    }
    let text = String::from_utf8_lossy(body);
    let text = text.trim();
    if text.is_empty() {
        fallback.to_string()
    } else {
        text.chars().take(200).collect()
    }
}
