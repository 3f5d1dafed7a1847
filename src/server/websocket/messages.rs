//! WebSocket message types.
//!
//! Server to client traffic reuses the `{type, data}` envelope of the
//! notification feed. Clients send `{type, payload}`.

use serde::{Deserialize, Serialize};

/// Client -> Server message envelope.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ClientMessage {
    #[serde(rename = "type")]
    pub msg_type: String,
    #[serde(default)]
    pub payload: serde_json::Value,
}

/// Sent when a client message cannot be handled.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ErrorPayload {
    pub code: String,
    pub message: String,
}

impl ErrorPayload {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }
}

#[derive(Debug, Default, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueStartPayload {
    #[serde(default)]
    pub force_refresh: bool,
}

/// Message types understood on the socket, beyond the notification feed.
pub mod msg_types {
    pub const PING: &str = "ping";
    pub const PONG: &str = "pong";
    pub const ERROR: &str = "error";

    pub const QUEUE_START: &str = "queue:start";
    pub const QUEUE_PAUSE: &str = "queue:pause";
    pub const QUEUE_RESUME: &str = "queue:resume";
    pub const QUEUE_CANCEL: &str = "queue:cancel";
    /// Client request for the queue status, and the server's reply to any
    /// queue command.
    pub const QUEUE_STATUS: &str = "queue:status";
}
