//! In-process publish/subscribe bus.
//!
//! Each subscriber owns a bounded channel. Publishing never awaits: when a
//! subscriber's buffer is full the new message is dropped for that subscriber
//! only, so one stalled client connection cannot slow enrichment down.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, warn};

use super::models::{Notification, NotificationEvent};
use crate::server::metrics;

pub const DEFAULT_SUBSCRIBER_BUFFER: usize = 64;

struct SubscriberEntry {
    sender: mpsc::Sender<Arc<Notification>>,
    dropped: u64,
}

struct BusState {
    subscribers: HashMap<u64, SubscriberEntry>,
    next_sequence: u64,
    last_timestamp: Option<DateTime<Utc>>,
}

struct BusInner {
    state: Mutex<BusState>,
    next_subscriber_id: AtomicU64,
    buffer_size: usize,
}

/// Broadcast channel for enrichment and queue lifecycle events.
///
/// Cheap to clone; all clones share the same subscriber list.
#[derive(Clone)]
pub struct NotificationBus {
    inner: Arc<BusInner>,
}

impl Default for NotificationBus {
    fn default() -> Self {
        Self::new(DEFAULT_SUBSCRIBER_BUFFER)
    }
}

impl NotificationBus {
    /// Create a bus whose subscribers buffer up to `buffer_size` messages.
    pub fn new(buffer_size: usize) -> Self {
        Self {
            inner: Arc::new(BusInner {
                state: Mutex::new(BusState {
                    subscribers: HashMap::new(),
                    next_sequence: 1,
                    last_timestamp: None,
                }),
                next_subscriber_id: AtomicU64::new(1),
                buffer_size: buffer_size.max(1),
            }),
        }
    }

    /// Register a new subscriber.
    pub fn subscribe(&self) -> Subscription {
        let (tx, rx) = mpsc::channel(self.inner.buffer_size);
        let id = self.inner.next_subscriber_id.fetch_add(1, Ordering::Relaxed);

        let mut state = self.lock_state();
        state.subscribers.insert(
            id,
            SubscriberEntry {
                sender: tx,
                dropped: 0,
            },
        );
        debug!("Bus subscriber {} registered ({} total)", id, state.subscribers.len());

        Subscription {
            id,
            receiver: rx,
            bus: Arc::downgrade(&self.inner),
        }
    }

    /// Deliver `event` to every current subscriber.
    ///
    /// Returns the notification as stamped by the bus.
    pub fn publish(&self, event: NotificationEvent) -> Arc<Notification> {
        let mut state = self.lock_state();

        // Timestamp and sequence are assigned under the lock so concurrent
        // producers still observe monotonic ordering.
        let mut timestamp = Utc::now();
        if let Some(last) = state.last_timestamp {
            if timestamp < last {
                timestamp = last;
            }
        }
        state.last_timestamp = Some(timestamp);
        let sequence = state.next_sequence;
        state.next_sequence += 1;

        let notification = Arc::new(Notification {
            sequence,
            timestamp,
            event,
        });

        let mut closed = Vec::new();
        for (id, entry) in state.subscribers.iter_mut() {
            match entry.sender.try_send(Arc::clone(&notification)) {
                Ok(()) => {}
                Err(TrySendError::Full(_)) => {
                    entry.dropped += 1;
                    metrics::record_bus_message_dropped();
                    if entry.dropped == 1 || entry.dropped % 100 == 0 {
                        warn!(
                            "Bus subscriber {} is not keeping up, {} messages dropped",
                            id, entry.dropped
                        );
                    }
                }
                Err(TrySendError::Closed(_)) => closed.push(*id),
            }
        }
        for id in closed {
            state.subscribers.remove(&id);
            debug!("Bus subscriber {} disconnected", id);
        }

        notification
    }

    /// Number of currently registered subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.lock_state().subscribers.len()
    }

    fn lock_state(&self) -> std::sync::MutexGuard<'_, BusState> {
        lock_ignoring_poison(&self.inner.state)
    }
}

fn lock_ignoring_poison(state: &Mutex<BusState>) -> std::sync::MutexGuard<'_, BusState> {
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// A live subscription. Dropping it unsubscribes.
pub struct Subscription {
    id: u64,
    receiver: mpsc::Receiver<Arc<Notification>>,
    bus: std::sync::Weak<BusInner>,
}

impl Subscription {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Wait for the next notification. Returns `None` once unsubscribed or the
    /// bus is gone.
    pub async fn recv(&mut self) -> Option<Arc<Notification>> {
        self.receiver.recv().await
    }

    /// Non-blocking receive.
    pub fn try_recv(&mut self) -> Option<Arc<Notification>> {
        self.receiver.try_recv().ok()
    }

    /// Explicitly unsubscribe.
    pub fn unsubscribe(self) {
        drop(self)
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(inner) = self.bus.upgrade() {
            let mut state = lock_ignoring_poison(&inner.state);
            state.subscribers.remove(&self.id);
        }
    }
}
