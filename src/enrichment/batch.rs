//! Foreground enrichment of every album of one artist.

use super::models::{EnrichmentResult, EntityType};
use super::report;
use super::{EnrichmentError, EnrichmentService};
use crate::notifications::NotificationEvent;
use chrono::Utc;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tracing::{info, warn};

static BATCH_COUNTER: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchResult {
    pub batch_id: String,
    pub artist_id: String,
    pub total: usize,
    pub processed: usize,
    pub failed: usize,
    pub duration_ms: u64,
    pub results: Vec<EnrichmentResult>,
    /// Hard errors of albums that could not be enriched at all.
    pub errors: Vec<String>,
}

fn next_batch_id() -> String {
    format!(
        "batch-{}-{}",
        Utc::now().timestamp_millis(),
        BATCH_COUNTER.fetch_add(1, Ordering::Relaxed)
    )
}

impl EnrichmentService {
    /// Enrich all albums of `artist_id` sequentially, publishing
    /// `batch:enrichment:*` events along the way.
    pub async fn enrich_artist_albums(
        &self,
        artist_id: &str,
        force_refresh: bool,
    ) -> Result<BatchResult, EnrichmentError> {
        let started = Instant::now();
        let store = &self.deps().store;

        store
            .get_artist(artist_id)
            .map_err(|e| report::load_error(EntityType::Artist, artist_id, e))?
            .ok_or_else(|| report::not_found(EntityType::Artist, artist_id))?;
        let albums = store
            .list_albums_for_artist(artist_id)
            .map_err(|e| report::load_error(EntityType::Artist, artist_id, e))?;

        let batch_id = next_batch_id();
        let total = albums.len();
        info!(
            "Batch {}: enriching {} albums of artist {}",
            batch_id, total, artist_id
        );
        let bus = &self.deps().bus;
        bus.publish(NotificationEvent::BatchStarted {
            batch_id: batch_id.clone(),
            entity_type: EntityType::Album,
            total,
        });

        let mut batch = BatchResult {
            batch_id: batch_id.clone(),
            artist_id: artist_id.to_string(),
            total,
            processed: 0,
            failed: 0,
            duration_ms: 0,
            results: Vec::with_capacity(total),
            errors: Vec::new(),
        };

        for album in albums {
            let success = match self.enrich_album(&album.id, force_refresh).await {
                Ok(result) => {
                    let success = !result.is_failure();
                    batch.results.push(result);
                    success
                }
                Err(e) => {
                    warn!("Batch {}: album {} failed: {}", batch_id, album.id, e);
                    batch.errors.push(e.to_string());
                    false
                }
            };
            batch.processed += 1;
            if !success {
                batch.failed += 1;
            }
            bus.publish(NotificationEvent::BatchProgress {
                batch_id: batch_id.clone(),
                entity_id: album.id.clone(),
                processed: batch.processed,
                total,
                success,
            });
        }

        batch.duration_ms = started.elapsed().as_millis() as u64;
        bus.publish(NotificationEvent::BatchCompleted {
            batch_id: batch_id.clone(),
            processed: batch.processed,
            failed: batch.failed,
            duration_ms: batch.duration_ms,
        });
        info!(
            "Batch {} finished: {} processed, {} failed in {}ms",
            batch_id, batch.processed, batch.failed, batch.duration_ms
        );
        Ok(batch)
    }
}
