use crate::power::{PowerDelta, PowerSnapshot};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Messages sent from client to server
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ClientMessage {
    Ping,
}

/// Messages sent from server to client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ServerMessage {
    /// Full state, sent once to a session when it connects.
    Snapshot(PowerSnapshot),
    /// Only the phases that changed.
    Update(PowerDelta),
    Pong {
        timestamp: String,
    },
    Error {
        message: String,
        code: String,
    },
}

impl ServerMessage {
    pub fn pong() -> Self {
        let now = chrono::Utc::now().to_rfc3339();
        ServerMessage::Pong { timestamp: now }
    }

    pub fn error(message: impl Into<String>, code: impl Into<String>) -> Self {
        ServerMessage::Error {
            message: message.into(),
            code: code.into(),
        }
    }
}

/// What a client does with an incoming text frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Incoming {
    /// Snapshot or update; both are merged into local state.
    Power(PowerDelta),
    Pong,
    Error(String),
}

/// Decode a server frame leniently: unknown types yield `None`, and phase values
/// that are not numbers (or numeric strings) are dropped from the delta.
pub fn decode_server_frame(text: &str) -> Option<Incoming> {
    let value: Value = serde_json::from_str(text).ok()?;
    match value.get("type").and_then(Value::as_str)? {
        "snapshot" | "update" => Some(Incoming::Power(PowerDelta::from_json_lenient(&value))),
        "pong" => Some(Incoming::Pong),
        "error" => {
            let message = value
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("unknown error");
            Some(Incoming::Error(message.to_string()))
        }
        _ => None,
    }
}
