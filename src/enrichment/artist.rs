use super::assets::AssetKind;
use super::chain::{run_chain, settle, Applied, CapabilityRun};
use super::models::{EnrichmentResult, EntityType};
use super::report::{self, ProgressReporter};
use super::{EnrichmentDeps, EnrichmentError};
use crate::agents::capabilities::{ArtistBio, ArtistImages, CanonicalId};
use crate::agents::{ArtistQuery, Biography, CapabilityKind, RemoteImage};
use crate::metadata_store::ArtistField;
use crate::notifications::NotificationEvent;
use chrono::Utc;
use std::time::Instant;
use tracing::{debug, error, info};

/// Enriches one artist: canonical id, biography and image.
pub struct ArtistEnricher {
    deps: EnrichmentDeps,
}

impl ArtistEnricher {
    pub fn new(deps: EnrichmentDeps) -> Self {
        Self { deps }
    }

    pub async fn enrich(
        &self,
        artist_id: &str,
        force_refresh: bool,
    ) -> Result<EnrichmentResult, EnrichmentError> {
        let started = Instant::now();
        let artist = self
            .deps
            .store
            .get_artist(artist_id)
            .map_err(|e| report::load_error(EntityType::Artist, artist_id, e))?
            .ok_or_else(|| report::not_found(EntityType::Artist, artist_id))?;

        let now = Utc::now();
        let freshness = &self.deps.freshness;
        let mut result = EnrichmentResult::new(EntityType::Artist, artist_id);

        if freshness.should_skip(
            force_refresh,
            &[artist.bio.as_ref(), artist.image.as_ref()],
            now,
        ) {
            debug!("Artist {} is fresh, skipping", artist_id);
            result.capabilities = vec![
                CapabilityRun::fresh(CapabilityKind::ArtistBio).report,
                CapabilityRun::fresh(CapabilityKind::ArtistImages).report,
            ];
            return Ok(report::finish_skipped(result, started));
        }
        let bio_fresh = !force_refresh && freshness.is_fresh(artist.bio.as_ref(), now);
        let image_fresh = !force_refresh && freshness.is_fresh(artist.image.as_ref(), now);

        info!(
            "Enriching artist {} ({}), force_refresh={}",
            artist.name, artist_id, force_refresh
        );
        self.deps.bus.publish(NotificationEvent::EnrichmentStarted {
            entity_type: EntityType::Artist,
            entity_id: artist_id.to_string(),
            force_refresh,
        });

        let mut query = ArtistQuery {
            id: artist.id.clone(),
            name: artist.name.clone(),
            mbid: artist.mbid.map(|f| f.value),
        };
        let needs_canonical_id = query.mbid.is_none();
        let progress = ProgressReporter::new(
            &self.deps.bus,
            EntityType::Artist,
            artist_id,
            2 + usize::from(needs_canonical_id),
        );

        if needs_canonical_id {
            let run = self.resolve_canonical_id(&query).await;
            progress.report(&run);
            if let Some(mbid) = &run.value {
                query.mbid = Some(mbid.clone());
            }
            report::absorb(&mut result, run);
        }

        // Different capabilities run concurrently; the provider gates keep
        // calls to any single agent serialized.
        let (bio, image) = tokio::join!(
            async {
                let run = if bio_fresh {
                    CapabilityRun::fresh(CapabilityKind::ArtistBio)
                } else {
                    self.enrich_bio(&query).await
                };
                progress.report(&run);
                run
            },
            async {
                let run = if image_fresh {
                    CapabilityRun::fresh(CapabilityKind::ArtistImages)
                } else {
                    self.enrich_image(&query).await
                };
                progress.report(&run);
                run
            }
        );

        let mut asset_events = Vec::new();
        if let Some(image_path) = &image.asset_path {
            asset_events.push(NotificationEvent::ArtistImagesUpdated {
                artist_id: artist_id.to_string(),
                image_path: image_path.clone(),
            });
        }
        report::absorb(&mut result, bio);
        report::absorb(&mut result, image);

        Ok(report::finish(&self.deps.bus, result, started, asset_events))
    }

    async fn resolve_canonical_id(&self, query: &ArtistQuery) -> CapabilityRun {
        let providers = self.deps.registry.agents_for::<CanonicalId>();
        let run = run_chain(providers, move |agent| async move {
            agent
                .resolve_artist_id(query)
                .await
                .map(|id| id.filter(|id| !id.trim().is_empty()))
        })
        .await;

        let store = &self.deps.store;
        settle(CapabilityKind::CanonicalId, run, |mbid: String| async move {
            store
                .set_artist_field(&query.id, ArtistField::Mbid, &mbid)
                .map_err(|e| {
                    error!("Failed to persist mbid for artist {}: {:#}", query.id, e);
                    format!("failed to persist canonical id: {:#}", e)
                })?;
            Ok::<_, String>(Applied {
                value: mbid,
                asset_path: None,
            })
        })
        .await
    }

    async fn enrich_bio(&self, query: &ArtistQuery) -> CapabilityRun {
        let providers = self.deps.registry.agents_for::<ArtistBio>();
        let run = run_chain(providers, move |agent| async move {
            agent
                .get_artist_bio(query)
                .await
                .map(|bio| bio.filter(|b| !b.text.trim().is_empty()))
        })
        .await;

        let store = &self.deps.store;
        settle(CapabilityKind::ArtistBio, run, |bio: Biography| async move {
            store
                .set_artist_field(&query.id, ArtistField::Bio, &bio.text)
                .map_err(|e| {
                    error!("Failed to persist bio for artist {}: {:#}", query.id, e);
                    format!("failed to persist bio: {:#}", e)
                })?;
            Ok::<_, String>(Applied {
                value: bio.text,
                asset_path: None,
            })
        })
        .await
    }

    async fn enrich_image(&self, query: &ArtistQuery) -> CapabilityRun {
        let providers = self.deps.registry.agents_for::<ArtistImages>();
        let run = run_chain(providers, move |agent| async move {
            agent
                .get_artist_images(query)
                .await
                .map(|images| images.into_iter().find(|img| !img.url.trim().is_empty()))
        })
        .await;

        let store = &self.deps.store;
        let assets = &self.deps.assets;
        settle(
            CapabilityKind::ArtistImages,
            run,
            |image: RemoteImage| async move {
                let path = assets
                    .store_from_url(&image.url, AssetKind::ArtistImage, &query.id)
                    .await
                    .map_err(|e| format!("failed to store image: {}", e))?;
                store
                    .set_artist_field(&query.id, ArtistField::Image, &path)
                    .map_err(|e| {
                        error!("Failed to persist image for artist {}: {:#}", query.id, e);
                        format!("failed to persist image: {:#}", e)
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
