//! Per-entity enrichment orchestration.
//!
//! An orchestrator loads the entity, consults the [`FreshnessPolicy`], walks
//! the registry's agents per capability in priority order, materializes
//! remote assets, persists what succeeded and reports progress on the
//! [`NotificationBus`]. Partial failure is never an `Err`.

mod album;
mod artist;
pub mod assets;
mod batch;
mod chain;
mod error;
mod freshness;
mod inflight;
mod models;
mod report;
#[cfg(test)]
pub(crate) mod test_support;

pub use album::AlbumEnricher;
pub use artist::ArtistEnricher;
pub use assets::{AssetKind, AssetStore, FileSystemAssetStore};
pub use batch::BatchResult;
pub use error::{AssetError, EnrichmentError};
pub use freshness::{FreshnessPolicy, DEFAULT_FRESHNESS_DAYS};
pub use models::{
    CapabilityOutcome, CapabilityReport, EnrichmentRequest, EnrichmentResult, EntityType,
};

use crate::agents::AgentRegistry;
use crate::metadata_store::MetadataStore;
use crate::notifications::NotificationBus;
use async_trait::async_trait;
use inflight::InFlight;
use std::sync::Arc;

/// Collaborators shared by the orchestrators.
#[derive(Clone)]
pub struct EnrichmentDeps {
    pub store: Arc<dyn MetadataStore>,
    pub registry: Arc<AgentRegistry>,
    pub assets: Arc<dyn AssetStore>,
    pub bus: NotificationBus,
    pub freshness: FreshnessPolicy,
}

/// Anything that can enrich a single entity. The queue depends on this
/// rather than on [`EnrichmentService`] directly.
#[async_trait]
pub trait EntityEnricher: Send + Sync {
    async fn enrich(
        &self,
        request: &EnrichmentRequest,
    ) -> Result<EnrichmentResult, EnrichmentError>;
}

type EnrichmentOutcome = Result<EnrichmentResult, EnrichmentError>;

/// Outcome of a shared run, tagged with whether that run bypassed freshness.
#[derive(Clone)]
struct SharedRun {
    forced: bool,
    outcome: EnrichmentOutcome,
}

struct ServiceInner {
    deps: EnrichmentDeps,
    artists: ArtistEnricher,
    albums: AlbumEnricher,
    inflight: InFlight<(EntityType, String), SharedRun>,
}

/// Entry point for manual, batch and queued enrichment.
///
/// Concurrent requests for the same entity share a single run. A forced
/// request never settles for an unforced run's result: it waits for that run
/// to end and then makes its own pass.
#[derive(Clone)]
pub struct EnrichmentService {
    inner: Arc<ServiceInner>,
}

impl EnrichmentService {
    pub fn new(deps: EnrichmentDeps) -> Self {
        Self {
            inner: Arc::new(ServiceInner {
                artists: ArtistEnricher::new(deps.clone()),
                albums: AlbumEnricher::new(deps.clone()),
                deps,
                inflight: InFlight::new(),
            }),
        }
    }

    pub fn deps(&self) -> &EnrichmentDeps {
        &self.inner.deps
    }

    pub async fn enrich_artist(&self, artist_id: &str, force_refresh: bool) -> EnrichmentOutcome {
        self.shared_run(EntityType::Artist, artist_id, force_refresh, || {
            self.inner.artists.enrich(artist_id, force_refresh)
        })
        .await
    }

    pub async fn enrich_album(&self, album_id: &str, force_refresh: bool) -> EnrichmentOutcome {
        self.shared_run(EntityType::Album, album_id, force_refresh, || {
            self.inner.albums.enrich(album_id, force_refresh)
        })
        .await
    }

    async fn shared_run<F, Fut>(
        &self,
        entity_type: EntityType,
        entity_id: &str,
        force_refresh: bool,
        work: F,
    ) -> EnrichmentOutcome
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = EnrichmentOutcome>,
    {
        let run = self
            .inner
            .inflight
            .run_accepting(
                (entity_type, entity_id.to_string()),
                |run| run.forced || !force_refresh,
                || async move {
                    SharedRun {
                        forced: force_refresh,
                        outcome: work().await,
                    }
                },
            )
            .await;
        run.outcome
    }
}

#[async_trait]
impl EntityEnricher for EnrichmentService {
    async fn enrich(&self, request: &EnrichmentRequest) -> EnrichmentOutcome {
        match request.entity_type {
            EntityType::Artist => {
                self.enrich_artist(&request.entity_id, request.force_refresh)
                    .await
            }
            EntityType::Album => {
                self.enrich_album(&request.entity_id, request.force_refresh)
                    .await
            }
        }
    }
}
