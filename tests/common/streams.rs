//! WebSocket helpers

use super::constants::EVENT_TIMEOUT_MS;
use futures::StreamExt;
use serde_json::Value;
use std::time::Duration;
use tokio::time::timeout;
use tokio_tungstenite::{connect_async, tungstenite::Message};

pub type WsStream =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

pub async fn connect_ws(base_url: &str) -> WsStream {
    let ws_url = base_url.replace("http://", "ws://") + "/v1/ws";
    let (ws_stream, _) = connect_async(ws_url)
        .await
        .expect("Failed to connect to WebSocket");
    ws_stream
}

/// Wait for a message of `expected_type`, skipping anything else. Returns
/// `None` on timeout or when the socket closes.
pub async fn wait_for_message(ws: &mut WsStream, expected_type: &str) -> Option<Value> {
    let deadline = Duration::from_millis(EVENT_TIMEOUT_MS);
    timeout(deadline, async {
        while let Some(Ok(msg)) = ws.next().await {
            if let Message::Text(text) = msg {
                let value: Value = serde_json::from_str(&text).ok()?;
                if value["type"] == expected_type {
                    return Some(value);
                }
            }
        }
        None
    })
    .await
    .ok()
    .flatten()
}
