//! Live notifications for enrichment and queue lifecycle transitions.

mod bus;
mod models;

pub use bus::{NotificationBus, Subscription, DEFAULT_SUBSCRIBER_BUFFER};
pub use models::{event_types, Notification, NotificationEvent, QueueStopReason, WireMessage};
