use super::assets::AssetKind;
use super::chain::{run_chain, settle, Applied, CapabilityRun};
use super::models::{EnrichmentResult, EntityType};
use super::report::{self, ProgressReporter};
use super::{EnrichmentDeps, EnrichmentError};
use crate::agents::capabilities::{AlbumCover, CanonicalId};
use crate::agents::{AlbumQuery, CapabilityKind, RemoteImage};
use crate::metadata_store::AlbumField;
use crate::notifications::NotificationEvent;
use chrono::Utc;
use std::time::Instant;
use tracing::{debug, error, info};

/// Enriches one album: canonical release-group id, then the cover.
pub struct AlbumEnricher {
    deps: EnrichmentDeps,
}

impl AlbumEnricher {
    pub fn new(deps: EnrichmentDeps) -> Self {
        Self { deps }
    }

    pub async fn enrich(
        &self,
        album_id: &str,
        force_refresh: bool,
    ) -> Result<EnrichmentResult, EnrichmentError> {
        let started = Instant::now();
        let album = self
            .deps
            .store
            .get_album(album_id)
            .map_err(|e| report::load_error(EntityType::Album, album_id, e))?
            .ok_or_else(|| report::not_found(EntityType::Album, album_id))?;

        let mut result = EnrichmentResult::new(EntityType::Album, album_id);
        if self
            .deps
            .freshness
            .should_skip(force_refresh, &[album.cover.as_ref()], Utc::now())
        {
            debug!("Album {} is fresh, skipping", album_id);
            result.capabilities = vec![CapabilityRun::fresh(CapabilityKind::AlbumCover).report];
            return Ok(report::finish_skipped(result, started));
        }

        info!(
            "Enriching album {} ({}), force_refresh={}",
            album.title, album_id, force_refresh
        );
        self.deps.bus.publish(NotificationEvent::EnrichmentStarted {
            entity_type: EntityType::Album,
            entity_id: album_id.to_string(),
            force_refresh,
        });

        let mut query = AlbumQuery {
            id: album.id.clone(),
            title: album.title.clone(),
            artist_name: album.artist_name.clone(),
            mbid: album.mbid.map(|f| f.value),
        };
        let needs_canonical_id = query.mbid.is_none();
        let progress = ProgressReporter::new(
            &self.deps.bus,
            EntityType::Album,
            album_id,
            1 + usize::from(needs_canonical_id),
        );

        // The cover archive is keyed by release-group id, so resolve it first.
        if needs_canonical_id {
            let run = self.resolve_canonical_id(&query).await;
            progress.report(&run);
            if let Some(mbid) = &run.value {
                query.mbid = Some(mbid.clone());
            }
            report::absorb(&mut result, run);
        }

        let cover = self.enrich_cover(&query).await;
        progress.report(&cover);

        let mut asset_events = Vec::new();
        if let Some(cover_path) = &cover.asset_path {
            asset_events.push(NotificationEvent::AlbumCoverUpdated {
                album_id: album_id.to_string(),
                cover_path: cover_path.clone(),
            });
        }
        report::absorb(&mut result, cover);

        Ok(report::finish(&self.deps.bus, result, started, asset_events))
    }

    async fn resolve_canonical_id(&self, query: &AlbumQuery) -> CapabilityRun {
        let providers = self.deps.registry.agents_for::<CanonicalId>();
        let run = run_chain(providers, move |agent| async move {
            agent
                .resolve_album_id(query)
                .await
                .map(|id| id.filter(|id| !id.trim().is_empty()))
        })
        .await;

        let store = &self.deps.store;
        settle(CapabilityKind::CanonicalId, run, |mbid: String| async move {
            store
                .set_album_field(&query.id, AlbumField::Mbid, &mbid)
                .map_err(|e| {
                    error!("Failed to persist mbid for album {}: {:#}", query.id, e);
                    format!("failed to persist canonical id: {:#}", e)
                })?;
            Ok::<_, String>(Applied {
                value: mbid,
                asset_path: None,
            })
        })
        .await
    }

    async fn enrich_cover(&self, query: &AlbumQuery) -> CapabilityRun {
        let providers = self.deps.registry.agents_for::<AlbumCover>();
        let run = run_chain(providers, move |agent| async move {
            agent
                .get_album_cover(query)
                .await
                .map(|cover| cover.filter(|c| !c.url.trim().is_empty()))
        })
        .await;

        let store = &self.deps.store;
        let assets = &self.deps.assets;
        settle(
            CapabilityKind::AlbumCover,
            run,
            |cover: RemoteImage| async move {
                let path = assets
                    .store_from_url(&cover.url, AssetKind::AlbumCover, &query.id)
                    .await
                    .map_err(|e| format!("failed to store cover: {}", e))?;
                store
                    .set_album_field(&query.id, AlbumField::Cover, &path)
                    .map_err(|e| {
                        error!("Failed to persist cover for album {}: {:#}", query.id, e);
                        format!("failed to persist cover: {:#}", e)
                    })?;
                Ok::<_, String>(Applied {
                    value: path.clone(),
                    asset_path: Some(path),
                })
            },
        )
        .await
    }
}
