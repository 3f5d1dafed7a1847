//! Background enrichment of everything lacking fresh metadata.
//!
//! A [`QueueWorker`] processes one session at a time, one item at a time,
//! and is controlled through a cloneable [`QueueHandle`]. Pause and cancel
//! take effect at item boundaries.

mod eta;
mod handle;
mod models;
mod worker;

pub use handle::QueueHandle;
pub use models::{
    QueueError, QueueSettings, QueueState, QueueStatus, DEFAULT_ETA_WINDOW, DEFAULT_ITEM_DELAY_MS,
};
pub use worker::QueueWorker;
