//! Socket frame format.
//!
//! Inbound text frames: `{"type": "<event>", "payload": <any>}`.
//! Outbound replies reuse the same shape; failures are sent as
//! `{"type": "error", "error": {"code", "message"}}`.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::http::envelope::{ErrorBody, HandlerError};

/// Event name used for error frames.
pub const ERROR_EVENT: &str = "error";

/// A decoded client frame.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct InboundFrame {
    #[serde(rename = "type")]
    pub event: String,
    #[serde(default)]
    pub payload: Value,
}

impl InboundFrame {
    /// Decode a text frame.
    pub fn parse(text: &str) -> Result<Self, HandlerError> {
        let frame: Self = serde_json::from_str(text)
            .map_err(|e| bad_frame(format!("Malformed frame: {e}")))?;
        if frame.event.trim().is_empty() {
            return Err(bad_frame("Frame type must not be empty"));
        }
        Ok(frame)
    }
}

/// A frame sent to the client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutboundFrame {
    #[serde(rename = "type")]
    pub event: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorBody>,
}

impl OutboundFrame {
    pub fn event(event: impl Into<String>, payload: Value) -> Self {
        Self {
            event: event.into(),
            payload: Some(payload),
            error: None,
        }
    }

    pub fn error(err: &HandlerError) -> Self {
        Self {
            event: ERROR_EVENT.to_string(),
            payload: None,
            error: Some(err.body()),
        }
    }

    pub fn to_text(&self) -> String {
        // Value and String fields always serialize
        serde_json::to_string(self).unwrap_or_else(|_| String::from(r#"{"type":"error"}"#))
    }
}

/// Message for a connection's writer task.
#[derive(Debug, Clone, PartialEq)]
pub enum Outbound {
    Frame(OutboundFrame),
    Close,
}

pub(crate) fn bad_frame(message: impl Into<String>) -> HandlerError {
    HandlerError::new(axum::http::StatusCode::BAD_REQUEST, "bad_frame", message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_frame() {
        let frame = InboundFrame::parse(r#"{"type":"page_view","payload":{"path":"/"}}"#).unwrap();
        assert_eq!(frame.event, "page_view");
        assert_eq!(frame.payload, json!({"path": "/"}));

        let frame = InboundFrame::parse(r#"{"type":"echo"}"#).unwrap();
        assert_eq!(frame.payload, Value::Null);
    }

    #[test]
    fn test_parse_rejects_bad_frames() {
        for text in ["not json", r#"{"payload":1}"#, r#"{"type":""}"#, "[1,2]"] {
            let err = InboundFrame::parse(text).unwrap_err();
            assert_eq!(err.code(), "bad_frame", "{text}");
        }
    }

    #[test]
    fn test_outbound_shapes() {
        let text = OutboundFrame::event("echo", json!("hi")).to_text();
        assert_eq!(text, r#"{"type":"echo","payload":"hi"}"#);

        let text = OutboundFrame::error(&HandlerError::not_found("gone")).to_text();
        let value: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(
            value,
            json!({"type": "error", "error": {"code": "not_found", "message": "gone"}})
        );
    }
}
