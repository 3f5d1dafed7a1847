//! Shared plumbing for the push transports (SSE and WebSocket).

use futures::{stream, Stream, StreamExt};
use std::time::Duration;
use tokio::time::{interval_at, Instant};

use crate::notifications::{Subscription, WireMessage};

pub const KEEPALIVE_INTERVAL: Duration = Duration::from_secs(30);

/// `connected` first, then every bus notification in publish order, with a
/// `keepalive` whenever `keepalive` elapses. Ends when the bus goes away.
pub fn wire_stream(
    subscription: Subscription,
    keepalive: Duration,
) -> impl Stream<Item = WireMessage> + Send + 'static {
    let connected = WireMessage::connected(subscription.id());
    let ticker = interval_at(Instant::now() + keepalive, keepalive);

    let live = stream::unfold(
        (subscription, ticker),
        |(mut subscription, mut ticker)| async move {
            let message = tokio::select! {
                notification = subscription.recv() => {
                    WireMessage::from(notification?.as_ref())
                }
                _ = ticker.tick() => WireMessage::keepalive(),
            };
            Some((message, (subscription, ticker)))
        },
    );

    stream::once(async move { connected }).chain(live)
}
