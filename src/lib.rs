//! Metadata Enrichment Server Library
//!
//! This library exposes the internal modules for testing and potential reuse.

pub mod agents;
pub mod config;
pub mod enrichment;
pub mod enrichment_queue;
pub mod metadata_store;
pub mod notifications;
pub mod server;
pub mod sqlite_persistence;

// Re-export commonly used types for convenience
pub use enrichment::{EnrichmentDeps, EnrichmentService};
pub use enrichment_queue::{QueueHandle, QueueWorker};
pub use metadata_store::{MetadataStore, SqliteMetadataStore};
pub use notifications::NotificationBus;
pub use server::{run_server, RequestsLoggingLevel};
