//! Provider agents and the capability contracts they implement.
//!
//! An agent wraps one external metadata source. It implements whichever of
//! the capability traits below the source can answer; the [`AgentRegistry`]
//! hands orchestrators an ordered, typed list of agents per capability.

pub mod coverart;
mod defaults;
mod gate;
pub mod lastfm;
pub mod musicbrainz;
mod registry;
pub mod wikipedia;

pub use defaults::register_builtin_agents;
pub use gate::ProviderGate;
pub use registry::{
    AgentInfo, AgentRegistration, AgentRegistry, AgentSettings, ProviderHandle,
};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CapabilityKind {
    ArtistBio,
    ArtistImages,
    AlbumCover,
    CanonicalId,
}

impl CapabilityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CapabilityKind::ArtistBio => "artist_bio",
            CapabilityKind::ArtistImages => "artist_images",
            CapabilityKind::AlbumCover => "album_cover",
            CapabilityKind::CanonicalId => "canonical_id",
        }
    }
}

impl fmt::Display for CapabilityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors raised by a single provider call. Always soft from the
/// orchestrator's point of view.
#[derive(Debug, Error)]
pub enum AgentError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("unexpected HTTP status {0}")]
    Status(u16),

    #[error("rate limited by provider")]
    RateLimited,

    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error("not configured: {0}")]
    NotConfigured(String),

    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

/// What an agent knows about the artist being enriched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtistQuery {
    pub id: String,
    pub name: String,
    pub mbid: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlbumQuery {
    pub id: String,
    pub title: String,
    pub artist_name: Option<String>,
    pub mbid: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Biography {
    pub text: String,
    pub source_url: Option<String>,
}

/// An image hosted by a provider, not yet downloaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteImage {
    pub url: String,
}

#[async_trait]
pub trait ArtistBioRetriever: Send + Sync {
    /// `Ok(None)` means the provider has nothing for this artist.
    async fn get_artist_bio(&self, artist: &ArtistQuery) -> Result<Option<Biography>, AgentError>;
}

#[async_trait]
pub trait ArtistImageRetriever: Send + Sync {
    /// Images ordered best first. An empty list means no answer.
    async fn get_artist_images(&self, artist: &ArtistQuery)
        -> Result<Vec<RemoteImage>, AgentError>;
}

#[async_trait]
pub trait AlbumCoverRetriever: Send + Sync {
    async fn get_album_cover(&self, album: &AlbumQuery) -> Result<Option<RemoteImage>, AgentError>;
}

/// Resolves canonical MusicBrainz identifiers.
#[async_trait]
pub trait CanonicalIdResolver: Send + Sync {
    async fn resolve_artist_id(&self, artist: &ArtistQuery) -> Result<Option<String>, AgentError>;
    async fn resolve_album_id(&self, album: &AlbumQuery) -> Result<Option<String>, AgentError>;
}

/// Type-level handle for a capability, used for typed registry discovery.
pub trait Capability: Send + Sync + 'static {
    type Retriever: ?Sized + Send + Sync;
    const KIND: CapabilityKind;

    fn select(registration: &AgentRegistration) -> Option<Arc<Self::Retriever>>;
}

pub mod capabilities {
    use super::*;

    pub struct ArtistBio;
    pub struct ArtistImages;
    pub struct AlbumCover;
    pub struct CanonicalId;

    impl Capability for ArtistBio {
        type Retriever = dyn ArtistBioRetriever;
        const KIND: CapabilityKind = CapabilityKind::ArtistBio;

        fn select(registration: &AgentRegistration) -> Option<Arc<Self::Retriever>> {
            registration.artist_bio.clone()
        }
    }

    impl Capability for ArtistImages {
        type Retriever = dyn ArtistImageRetriever;
        const KIND: CapabilityKind = CapabilityKind::ArtistImages;

        fn select(registration: &AgentRegistration) -> Option<Arc<Self::Retriever>> {
            registration.artist_images.clone()
        }
    }

    impl Capability for AlbumCover {
        type Retriever = dyn AlbumCoverRetriever;
        const KIND: CapabilityKind = CapabilityKind::AlbumCover;

        fn select(registration: &AgentRegistration) -> Option<Arc<Self::Retriever>> {
            registration.album_cover.clone()
        }
    }

    impl Capability for CanonicalId {
        type Retriever = dyn CanonicalIdResolver;
        const KIND: CapabilityKind = CapabilityKind::CanonicalId;

        fn select(registration: &AgentRegistration) -> Option<Arc<Self::Retriever>> {
            registration.canonical_id.clone()
        }
    }
}

/// Map a non-success HTTP status to an agent error. 429 and 503 are the
/// statuses providers use for throttling.
pub(crate) fn status_error(status: reqwest::StatusCode) -> AgentError {
    match status.as_u16() {
        429 | 503 => AgentError::RateLimited,
        code => AgentError::Status(code),
    }
}
