use crate::enrichment::EnrichmentRequest;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum QueueState {
    Idle,
    Running,
    Paused,
    Stopping,
}

impl QueueState {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueueState::Idle => "idle",
            QueueState::Running => "running",
            QueueState::Paused => "paused",
            QueueState::Stopping => "stopping",
        }
    }
}

/// Snapshot of the queue returned by every control operation.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueStatus {
    pub state: QueueState,
    pub force_refresh: bool,
    /// Pending counts are taken once when the session starts.
    pub total_pending: usize,
    pub pending_artists: usize,
    pub pending_albums: usize,
    pub processed: usize,
    pub failed: usize,
    pub remaining: usize,
    pub current: Option<EnrichmentRequest>,
    /// Advisory only.
    pub eta_seconds: Option<u64>,
    pub started_at: Option<DateTime<Utc>>,
}

impl QueueStatus {
    pub fn idle() -> Self {
        Self {
            state: QueueState::Idle,
            force_refresh: false,
            total_pending: 0,
            pending_artists: 0,
            pending_albums: 0,
            processed: 0,
            failed: 0,
            remaining: 0,
            current: None,
            eta_seconds: None,
            started_at: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QueueError {
    #[error("Queue is already running")]
    AlreadyRunning,

    #[error("Queue is not running")]
    NotRunning,

    #[error("Failed to compute pending entities: {0}")]
    Store(String),

    #[error("Queue worker is not available")]
    Unavailable,
}

/// Tuning knobs of the queue worker.
#[derive(Debug, Clone)]
pub struct QueueSettings {
    /// Minimum pause between two items.
    pub item_delay: Duration,
    /// Number of recent item durations averaged for the ETA.
    pub eta_window: usize,
}

pub const DEFAULT_ITEM_DELAY_MS: u64 = 250;
pub const DEFAULT_ETA_WINDOW: usize = 20;

impl Default for QueueSettings {
    fn default() -> Self {
        Self {
            item_delay: Duration::from_millis(DEFAULT_ITEM_DELAY_MS),
            eta_window: DEFAULT_ETA_WINDOW,
        }
    }
}
