//! WebSocket route handler.
//!
//! Handles the upgrade, forwards bus notifications, answers client commands.

use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::Response,
};
use futures::{SinkExt, Stream, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, error};

use super::messages::{msg_types, ClientMessage, ErrorPayload, QueueStartPayload};
use crate::enrichment_queue::{QueueError, QueueHandle, QueueStatus};
use crate::notifications::{NotificationBus, WireMessage};
use crate::server::streams::{wire_stream, KEEPALIVE_INTERVAL};

const REPLY_BUFFER: usize = 16;

/// Route handler for `GET /v1/ws`.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(bus): State<NotificationBus>,
    State(queue): State<QueueHandle>,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, bus, queue))
}

async fn handle_socket(socket: WebSocket, bus: NotificationBus, queue: QueueHandle) {
    let subscription = bus.subscribe();
    let subscriber_id = subscription.id();
    debug!("WebSocket subscriber {} connected", subscriber_id);

    let (ws_sink, ws_stream) = socket.split();
    let (reply_tx, reply_rx) = mpsc::channel(REPLY_BUFFER);

    let outgoing_handle = tokio::spawn(forward_outgoing(
        ws_sink,
        wire_stream(subscription, KEEPALIVE_INTERVAL),
        reply_rx,
    ));

    process_incoming(ws_stream, &reply_tx, &queue).await;

    debug!("WebSocket subscriber {} disconnected", subscriber_id);
    outgoing_handle.abort();
}

/// Forward notifications and command replies to the socket.
async fn forward_outgoing(
    mut ws_sink: futures::stream::SplitSink<WebSocket, Message>,
    notifications: impl Stream<Item = WireMessage> + Send + 'static,
    mut reply_rx: mpsc::Receiver<WireMessage>,
) {
    tokio::pin!(notifications);
    loop {
        let msg = tokio::select! {
            next = notifications.next() => match next {
                Some(msg) => msg,
                None => break,
            },
            Some(reply) = reply_rx.recv() => reply,
        };
        match serde_json::to_string(&msg) {
            Ok(json) => {
                if ws_sink.send(Message::Text(json.into())).await.is_err() {
                    break;
                }
            }
            Err(e) => {
                error!("Failed to serialize WebSocket message: {}", e);
            }
        }
    }
}

async fn process_incoming(
    mut ws_stream: futures::stream::SplitStream<WebSocket>,
    reply_tx: &mpsc::Sender<WireMessage>,
    queue: &QueueHandle,
) {
    while let Some(result) = ws_stream.next().await {
        match result {
            Ok(Message::Text(text)) => {
                let reply = match serde_json::from_str::<ClientMessage>(&text) {
                    Ok(msg) => handle_client_message(msg, queue).await,
                    Err(e) => {
                        debug!("Failed to parse client message: {}", e);
                        error_message("parse_error", format!("Invalid message format: {}", e))
                    }
                };
                if reply_tx.send(reply).await.is_err() {
                    break;
                }
            }
            Ok(Message::Binary(_)) => {
                debug!("Received binary message, ignoring");
            }
            Ok(Message::Ping(_)) => {
                debug!("Received ping");
            }
            Ok(Message::Pong(_)) => {
                debug!("Received pong");
            }
            Ok(Message::Close(_)) => {
                debug!("Received close frame");
                break;
            }
            Err(e) => {
                debug!("WebSocket error: {}", e);
                break;
            }
        }
    }
}

async fn handle_client_message(msg: ClientMessage, queue: &QueueHandle) -> WireMessage {
    match msg.msg_type.as_str() {
        msg_types::PING => WireMessage::new(msg_types::PONG, serde_json::json!({})),
        msg_types::QUEUE_STATUS => WireMessage::new(msg_types::QUEUE_STATUS, queue.status().await),
        msg_types::QUEUE_START => {
            let payload: QueueStartPayload =
                serde_json::from_value(msg.payload).unwrap_or_default();
            queue_reply(queue.start(payload.force_refresh).await)
        }
        msg_types::QUEUE_PAUSE => queue_reply(queue.pause().await),
        msg_types::QUEUE_RESUME => queue_reply(queue.resume().await),
        msg_types::QUEUE_CANCEL => queue_reply(queue.cancel().await),
        other => {
            debug!("Unknown message type: {}", other);
            error_message("unknown_type", format!("Unknown message type: {}", other))
        }
    }
}

fn queue_reply(result: Result<QueueStatus, QueueError>) -> WireMessage {
    match result {
        Ok(status) => WireMessage::new(msg_types::QUEUE_STATUS, status),
        Err(err) => {
            let code = match err {
                QueueError::AlreadyRunning => "already_running",
                QueueError::NotRunning => "not_running",
                QueueError::Unavailable => "unavailable",
                QueueError::Store(_) => "store_error",
            };
            error_message(code, err.to_string())
        }
    }
}

fn error_message(code: &str, message: String) -> WireMessage {
    WireMessage::new(msg_types::ERROR, ErrorPayload::new(code, message))
}
