use super::EntityType;
use thiserror::Error;

/// Hard errors of a single enrichment. Provider failures are never hard; they
/// end up in [`EnrichmentResult::errors`](super::EnrichmentResult).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum EnrichmentError {
    #[error("{entity_type} {entity_id} not found")]
    EntityNotFound {
        entity_type: EntityType,
        entity_id: String,
    },

    #[error("failed to load {entity_type} {entity_id}: {message}")]
    Store {
        entity_type: EntityType,
        entity_id: String,
        message: String,
    },
}

/// Failure to download or store a remote asset.
#[derive(Debug, Error)]
pub enum AssetError {
    #[error("download failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("download returned HTTP {0}")]
    Status(u16),

    #[error("asset is not an image ({0})")]
    NotAnImage(String),

    #[error("asset exceeds {0} bytes")]
    TooLarge(usize),

    #[error("failed to write asset: {0}")]
    Io(#[from] std::io::Error),
}
