//! Assembling an [`EnrichmentResult`] and announcing it on the bus.

use super::chain::CapabilityRun;
use super::models::{EnrichmentResult, EntityType};
use super::EnrichmentError;
use crate::agents::CapabilityKind;
use crate::notifications::{NotificationBus, NotificationEvent};
use crate::server::metrics;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;
use tracing::{info, warn};

/// Publishes `enrichment:progress` as capabilities finish, possibly from
/// concurrently running futures.
pub(crate) struct ProgressReporter<'a> {
    bus: &'a NotificationBus,
    entity_type: EntityType,
    entity_id: &'a str,
    total: usize,
    completed: AtomicUsize,
}

impl<'a> ProgressReporter<'a> {
    pub fn new(
        bus: &'a NotificationBus,
        entity_type: EntityType,
        entity_id: &'a str,
        total: usize,
    ) -> Self {
        Self {
            bus,
            entity_type,
            entity_id,
            total,
            completed: AtomicUsize::new(0),
        }
    }

    pub fn report(&self, run: &CapabilityRun) {
        let completed = self.completed.fetch_add(1, Ordering::SeqCst) + 1;
        self.bus.publish(NotificationEvent::EnrichmentProgress {
            entity_type: self.entity_type,
            entity_id: self.entity_id.to_string(),
            capability: run.report.capability.as_str().to_string(),
            outcome: run.report.outcome.as_str().to_string(),
            completed,
            total: self.total,
        });
    }
}

/// Fold a capability run into the result.
pub(crate) fn absorb(result: &mut EnrichmentResult, run: CapabilityRun) {
    if run.updated() {
        match run.report.capability {
            CapabilityKind::ArtistBio => result.bio_updated = true,
            CapabilityKind::ArtistImages => result.images_updated = true,
            CapabilityKind::AlbumCover => result.cover_updated = true,
            CapabilityKind::CanonicalId => result.canonical_id_updated = true,
        }
    }
    result.errors.extend(run.errors);
    result.providers_called.extend(run.providers_called);
    result.capabilities.push(run.report);
}

fn record_metrics(result: &EnrichmentResult, started: Instant) {
    for report in &result.capabilities {
        metrics::record_capability_outcome(report.capability.as_str(), report.outcome.as_str());
    }
    metrics::record_enrichment(result.entity_type.as_str(), started.elapsed());
}

/// Cache-guard short circuit: no events, no provider calls.
pub(crate) fn finish_skipped(mut result: EnrichmentResult, started: Instant) -> EnrichmentResult {
    result.skipped_fresh = true;
    result.duration_ms = started.elapsed().as_millis() as u64;
    record_metrics(&result, started);
    result
}

/// Publish asset events, the cache invalidation and the terminal event.
pub(crate) fn finish(
    bus: &NotificationBus,
    mut result: EnrichmentResult,
    started: Instant,
    asset_events: Vec<NotificationEvent>,
) -> EnrichmentResult {
    result.duration_ms = started.elapsed().as_millis() as u64;
    record_metrics(&result, started);

    for event in asset_events {
        bus.publish(event);
    }
    if result.any_updated() {
        bus.publish(NotificationEvent::CacheInvalidate {
            entity_type: result.entity_type,
            entity_id: result.entity_id.clone(),
        });
    }

    if result.is_failure() {
        warn!(
            "Enrichment of {} {} failed: {:?}",
            result.entity_type, result.entity_id, result.errors
        );
        bus.publish(NotificationEvent::EnrichmentError {
            result: result.clone(),
        });
    } else {
        info!(
            "Enriched {} {} in {}ms ({} soft errors)",
            result.entity_type,
            result.entity_id,
            result.duration_ms,
            result.errors.len()
        );
        bus.publish(NotificationEvent::EnrichmentCompleted {
            result: result.clone(),
        });
    }
    result
}

pub(crate) fn load_error(
    entity_type: EntityType,
    entity_id: &str,
    error: anyhow::Error,
) -> EnrichmentError {
    tracing::error!("Failed to load {} {}: {:#}", entity_type, entity_id, error);
    EnrichmentError::Store {
        entity_type,
        entity_id: entity_id.to_string(),
        message: format!("{:#}", error),
    }
}

pub(crate) fn not_found(entity_type: EntityType, entity_id: &str) -> EnrichmentError {
    EnrichmentError::EntityNotFound {
        entity_type,
        entity_id: entity_id.to_string(),
    }
}
