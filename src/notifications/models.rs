//! Notification event models.
//!
//! Every event serializes to the `{type, data}` envelope that live clients
//! receive. The bus stamps each event with a timestamp and sequence number at
//! publish time, see [`Notification`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::enrichment::{EnrichmentResult, EntityType};

/// Event type identifiers as they appear on the wire.
pub mod event_types {
    pub const ARTIST_IMAGES_UPDATED: &str = "artist:images:updated";
    pub const ALBUM_COVER_UPDATED: &str = "album:cover:updated";
    pub const CACHE_INVALIDATE: &str = "metadata:cache:invalidate";
    pub const ENRICHMENT_STARTED: &str = "enrichment:started";
    pub const ENRICHMENT_PROGRESS: &str = "enrichment:progress";
    pub const ENRICHMENT_COMPLETED: &str = "enrichment:completed";
    pub const ENRICHMENT_ERROR: &str = "enrichment:error";
    pub const BATCH_STARTED: &str = "batch:enrichment:started";
    pub const BATCH_PROGRESS: &str = "batch:enrichment:progress";
    pub const BATCH_COMPLETED: &str = "batch:enrichment:completed";
    pub const QUEUE_STARTED: &str = "queue:started";
    pub const QUEUE_STOPPED: &str = "queue:stopped";
    pub const QUEUE_ITEM_COMPLETED: &str = "queue:item:completed";
    pub const QUEUE_ITEM_ERROR: &str = "queue:item:error";
    pub const QUEUE_COMPLETED: &str = "queue:completed";

    /// Synthetic events generated by the transport adapters, never by the bus.
    pub const CONNECTED: &str = "connected";
    pub const KEEPALIVE: &str = "keepalive";
}

/// Why a queue session stopped before exhausting its pending list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueStopReason {
    Paused,
    Cancelled,
}

/// Domain events published on the [`NotificationBus`](super::NotificationBus).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum NotificationEvent {
    #[serde(rename = "artist:images:updated", rename_all = "camelCase")]
    ArtistImagesUpdated { artist_id: String, image_path: String },

    #[serde(rename = "album:cover:updated", rename_all = "camelCase")]
    AlbumCoverUpdated { album_id: String, cover_path: String },

    #[serde(rename = "metadata:cache:invalidate", rename_all = "camelCase")]
    CacheInvalidate {
        entity_type: EntityType,
        entity_id: String,
    },

    #[serde(rename = "enrichment:started", rename_all = "camelCase")]
    EnrichmentStarted {
        entity_type: EntityType,
        entity_id: String,
        force_refresh: bool,
    },

    #[serde(rename = "enrichment:progress", rename_all = "camelCase")]
    EnrichmentProgress {
        entity_type: EntityType,
        entity_id: String,
        capability: String,
        outcome: String,
        completed: usize,
        total: usize,
    },

    #[serde(rename = "enrichment:completed", rename_all = "camelCase")]
    EnrichmentCompleted { result: EnrichmentResult },

    #[serde(rename = "enrichment:error", rename_all = "camelCase")]
    EnrichmentError { result: EnrichmentResult },

    #[serde(rename = "batch:enrichment:started", rename_all = "camelCase")]
    BatchStarted {
        batch_id: String,
        entity_type: EntityType,
        total: usize,
    },

    #[serde(rename = "batch:enrichment:progress", rename_all = "camelCase")]
    BatchProgress {
        batch_id: String,
        entity_id: String,
        processed: usize,
        total: usize,
        success: bool,
    },

    #[serde(rename = "batch:enrichment:completed", rename_all = "camelCase")]
    BatchCompleted {
        batch_id: String,
        processed: usize,
        failed: usize,
        duration_ms: u64,
    },

    #[serde(rename = "queue:started", rename_all = "camelCase")]
    QueueStarted {
        total_pending: usize,
        pending_artists: usize,
        pending_albums: usize,
        force_refresh: bool,
    },

    #[serde(rename = "queue:stopped", rename_all = "camelCase")]
    QueueStopped {
        reason: QueueStopReason,
        processed: usize,
        remaining: usize,
    },

    #[serde(rename = "queue:item:completed", rename_all = "camelCase")]
    QueueItemCompleted {
        entity_type: EntityType,
        entity_id: String,
        processed: usize,
        total_pending: usize,
        updated: bool,
        errors: Vec<String>,
        eta_seconds: Option<u64>,
    },

    #[serde(rename = "queue:item:error", rename_all = "camelCase")]
    QueueItemError {
        entity_type: EntityType,
        entity_id: String,
        processed: usize,
        total_pending: usize,
        error: String,
    },

    #[serde(rename = "queue:completed", rename_all = "camelCase")]
    QueueCompleted {
        processed: usize,
        failed: usize,
        duration_ms: u64,
    },
}

impl NotificationEvent {
    /// The wire `type` of this event.
    pub fn event_type(&self) -> &'static str {
        use event_types::*;
        match self {
            NotificationEvent::ArtistImagesUpdated { .. } => ARTIST_IMAGES_UPDATED,
            NotificationEvent::AlbumCoverUpdated { .. } => ALBUM_COVER_UPDATED,
            NotificationEvent::CacheInvalidate { .. } => CACHE_INVALIDATE,
            NotificationEvent::EnrichmentStarted { .. } => ENRICHMENT_STARTED,
            NotificationEvent::EnrichmentProgress { .. } => ENRICHMENT_PROGRESS,
            NotificationEvent::EnrichmentCompleted { .. } => ENRICHMENT_COMPLETED,
            NotificationEvent::EnrichmentError { .. } => ENRICHMENT_ERROR,
            NotificationEvent::BatchStarted { .. } => BATCH_STARTED,
            NotificationEvent::BatchProgress { .. } => BATCH_PROGRESS,
            NotificationEvent::BatchCompleted { .. } => BATCH_COMPLETED,
            NotificationEvent::QueueStarted { .. } => QUEUE_STARTED,
            NotificationEvent::QueueStopped { .. } => QUEUE_STOPPED,
            NotificationEvent::QueueItemCompleted { .. } => QUEUE_ITEM_COMPLETED,
            NotificationEvent::QueueItemError { .. } => QUEUE_ITEM_ERROR,
            NotificationEvent::QueueCompleted { .. } => QUEUE_COMPLETED,
        }
    }
}

/// An event as delivered to subscribers.
#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    pub sequence: u64,
    pub timestamp: DateTime<Utc>,
    pub event: NotificationEvent,
}

/// Client-facing envelope: `{type, data}` where `data` carries the server
/// timestamp alongside the event payload.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WireMessage {
    #[serde(rename = "type")]
    pub msg_type: String,
    pub data: serde_json::Value,
}

impl WireMessage {
    pub fn new(msg_type: impl Into<String>, data: impl Serialize) -> Self {
        Self {
            msg_type: msg_type.into(),
            data: serde_json::to_value(data).unwrap_or(serde_json::Value::Null),
        }
    }

    /// Transport-level `connected` message.
    pub fn connected(subscriber_id: u64) -> Self {
        Self::new(
            event_types::CONNECTED,
            serde_json::json!({
                "subscriberId": subscriber_id,
                "serverVersion": format!("{}-{}", env!("CARGO_PKG_VERSION"), env!("GIT_HASH")),
                "timestamp": Utc::now(),
            }),
        )
    }

    /// Transport-level `keepalive` message.
    pub fn keepalive() -> Self {
        Self::new(
            event_types::KEEPALIVE,
            serde_json::json!({ "timestamp": Utc::now() }),
        )
    }
}

impl From<&Notification> for WireMessage {
    fn from(notification: &Notification) -> Self {
        let mut data = match serde_json::to_value(&notification.event) {
            Ok(serde_json::Value::Object(mut tagged)) => tagged
                .remove("data")
                .unwrap_or(serde_json::Value::Object(Default::default())),
            _ => serde_json::Value::Object(Default::default()),
        };
        if let serde_json::Value::Object(map) = &mut data {
            map.insert(
                "timestamp".to_string(),
                serde_json::Value::String(notification.timestamp.to_rfc3339()),
            );
            map.insert(
                "sequence".to_string(),
                serde_json::Value::from(notification.sequence),
            );
        }
        WireMessage {
            msg_type: notification.event.event_type().to_string(),
            data,
        }
    }
}
