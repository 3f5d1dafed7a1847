//! `GET /v1/events`: the notification feed as Server-Sent Events.

use axum::{
    extract::State,
    response::sse::{Event, Sse},
};
use futures::{Stream, StreamExt};
use std::convert::Infallible;
use tracing::{debug, error};

use super::streams::{wire_stream, KEEPALIVE_INTERVAL};
use crate::notifications::NotificationBus;

/// Each SSE `data:` line carries one `{type, data}` envelope.
pub async fn events_handler(
    State(bus): State<NotificationBus>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let subscription = bus.subscribe();
    debug!("SSE subscriber {} connected", subscription.id());

    let events = wire_stream(subscription, KEEPALIVE_INTERVAL).filter_map(|message| async move {
        match serde_json::to_string(&message) {
            Ok(json) => Some(Ok(Event::default().data(json))),
            Err(e) => {
                error!("Failed to serialize SSE message: {}", e);
                None
            }
        }
    });

    Sse::new(events)
}
