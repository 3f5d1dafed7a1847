use super::eta::EtaEstimator;
use super::handle::{QueueCommand, QueueHandle};
use super::models::{QueueError, QueueSettings, QueueState, QueueStatus};
use crate::agents::AgentRegistry;
use crate::enrichment::{
    EnrichmentDeps, EnrichmentError, EnrichmentRequest, EnrichmentResult, EntityEnricher,
    EntityType, FreshnessPolicy,
};
use crate::metadata_store::MetadataStore;
use crate::notifications::{NotificationBus, NotificationEvent, QueueStopReason};
use crate::server::metrics;
use chrono::{DateTime, Utc};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, RwLock};
use tokio::task::{JoinError, JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

const COMMAND_BUFFER: usize = 32;

type ItemOutcome = Result<EnrichmentResult, EnrichmentError>;

/// One run of the queue, from start until completion or cancel.
struct Session {
    state: QueueState,
    force_refresh: bool,
    pending: VecDeque<EnrichmentRequest>,
    total_pending: usize,
    pending_artists: usize,
    pending_albums: usize,
    processed: usize,
    failed: usize,
    pause_requested: bool,
    started: Instant,
    started_at: DateTime<Utc>,
    next_item_at: tokio::time::Instant,
    eta: EtaEstimator,
    eta_seconds: Option<u64>,
}

struct InFlightItem {
    request: EnrichmentRequest,
    started: Instant,
    handle: JoinHandle<ItemOutcome>,
}

/// What happens once the in-flight item has been accounted for.
enum Boundary {
    Continue,
    Pause,
    Cancel,
    Complete,
}

/// Drives queue sessions. Owns the session; controlled through a
/// [`QueueHandle`].
pub struct QueueWorker {
    enricher: Arc<dyn EntityEnricher>,
    store: Arc<dyn MetadataStore>,
    registry: Arc<AgentRegistry>,
    bus: NotificationBus,
    freshness: FreshnessPolicy,
    settings: QueueSettings,
    command_rx: mpsc::Receiver<QueueCommand>,
    status: Arc<RwLock<QueueStatus>>,
    shutdown_token: CancellationToken,
    session: Option<Session>,
    in_flight: Option<InFlightItem>,
}

impl QueueWorker {
    /// Create a worker and the handle that controls it. The worker does
    /// nothing until [`QueueWorker::run`] is spawned.
    pub fn new(
        enricher: Arc<dyn EntityEnricher>,
        deps: &EnrichmentDeps,
        settings: QueueSettings,
        shutdown_token: CancellationToken,
    ) -> (Self, QueueHandle) {
        let (command_tx, command_rx) = mpsc::channel(COMMAND_BUFFER);
        let status = Arc::new(RwLock::new(QueueStatus::idle()));
        let worker = Self {
            enricher,
            store: deps.store.clone(),
            registry: deps.registry.clone(),
            bus: deps.bus.clone(),
            freshness: deps.freshness,
            settings,
            command_rx,
            status: status.clone(),
            shutdown_token,
            session: None,
            in_flight: None,
        };
        (worker, QueueHandle::new(command_tx, status))
    }

    /// Main worker loop.
    pub async fn run(mut self) {
        info!(
            "Starting enrichment queue worker (item delay {:?})",
            self.settings.item_delay
        );
        metrics::set_queue_running(false);

        loop {
            let dispatch_at = self.dispatch_deadline();

            tokio::select! {
                _ = self.shutdown_token.cancelled() => {
                    info!("Enrichment queue received shutdown signal");
                    break;
                }
                command = self.command_rx.recv() => match command {
                    Some(command) => self.handle_command(command).await,
                    None => {
                        info!("All queue handles dropped, stopping worker");
                        break;
                    }
                },
                joined = wait_in_flight(&mut self.in_flight) => {
                    self.finish_item(joined).await;
                }
                _ = sleep_until(dispatch_at) => {
                    self.dispatch_next().await;
                }
            }
        }

        if let Some(item) = self.in_flight.take() {
            item.handle.abort();
        }
        metrics::set_queue_running(false);
        info!("Enrichment queue worker stopped");
    }

    async fn handle_command(&mut self, command: QueueCommand) {
        match command {
            QueueCommand::Start {
                force_refresh,
                response,
            } => {
                let result = self.start(force_refresh).await;
                let _ = response.send(result);
            }
            QueueCommand::Pause { response } => {
                let result = self.pause().await;
                let _ = response.send(result);
            }
            QueueCommand::Resume { response } => {
                let result = self.resume().await;
                let _ = response.send(result);
            }
            QueueCommand::Cancel { response } => {
                let result = self.cancel().await;
                let _ = response.send(result);
            }
        }
    }

    async fn start(&mut self, force_refresh: bool) -> Result<QueueStatus, QueueError> {
        if self.session.is_some() {
            return Err(QueueError::AlreadyRunning);
        }

        let stale_before = if force_refresh {
            None
        } else {
            Some(self.freshness.stale_before(Utc::now()))
        };
        let artists = self
            .store
            .list_artists_needing_enrichment(stale_before)
            .map_err(|e| QueueError::Store(format!("{:#}", e)))?;
        let albums = self
            .store
            .list_albums_needing_enrichment(stale_before)
            .map_err(|e| QueueError::Store(format!("{:#}", e)))?;

        let pending_artists = artists.len();
        let pending_albums = albums.len();
        let pending: VecDeque<EnrichmentRequest> = artists
            .into_iter()
            .map(|id| (EntityType::Artist, id))
            .chain(albums.into_iter().map(|id| (EntityType::Album, id)))
            .map(|(entity_type, entity_id)| EnrichmentRequest {
                entity_type,
                entity_id,
                force_refresh,
            })
            .collect();
        let total_pending = pending.len();

        info!(
            "Queue started: {} artists, {} albums pending (force_refresh={})",
            pending_artists, pending_albums, force_refresh
        );
        self.session = Some(Session {
            state: QueueState::Running,
            force_refresh,
            pending,
            total_pending,
            pending_artists,
            pending_albums,
            processed: 0,
            failed: 0,
            pause_requested: false,
            started: Instant::now(),
            started_at: Utc::now(),
            next_item_at: tokio::time::Instant::now(),
            eta: EtaEstimator::new(self.settings.eta_window),
            eta_seconds: None,
        });
        metrics::set_queue_running(true);
        let mut events = vec![NotificationEvent::QueueStarted {
            total_pending,
            pending_artists,
            pending_albums,
            force_refresh,
        }];
        if total_pending == 0 {
            events.extend(self.complete_session());
        }
        Ok(self.sync_and_publish(events).await)
    }

    async fn pause(&mut self) -> Result<QueueStatus, QueueError> {
        let item_in_flight = self.in_flight.is_some();
        let session = self.session.as_mut().ok_or(QueueError::NotRunning)?;
        let mut events = Vec::new();
        if session.state == QueueState::Running {
            if item_in_flight {
                debug!("Pause requested, waiting for in-flight item");
                session.pause_requested = true;
            } else {
                events.extend(self.enter_paused());
            }
        }
        Ok(self.sync_and_publish(events).await)
    }

    async fn resume(&mut self) -> Result<QueueStatus, QueueError> {
        let session = self.session.as_mut().ok_or(QueueError::NotRunning)?;
        match session.state {
            QueueState::Paused => {
                info!("Queue resumed with {} items left", session.pending.len());
                session.state = QueueState::Running;
                metrics::set_queue_running(true);
            }
            QueueState::Running => session.pause_requested = false,
            QueueState::Stopping | QueueState::Idle => return Err(QueueError::NotRunning),
        }
        Ok(self.sync_status().await)
    }

    async fn cancel(&mut self) -> Result<QueueStatus, QueueError> {
        let item_in_flight = self.in_flight.is_some();
        let session = self.session.as_mut().ok_or(QueueError::NotRunning)?;
        let mut events = Vec::new();
        if session.state != QueueState::Stopping {
            if item_in_flight {
                debug!("Cancel requested, waiting for in-flight item");
                session.state = QueueState::Stopping;
            } else {
                events.extend(self.stop_session());
            }
        }
        Ok(self.sync_and_publish(events).await)
    }

    /// When the next item may be dispatched, if one may be dispatched at all.
    fn dispatch_deadline(&self) -> Option<tokio::time::Instant> {
        if self.in_flight.is_some() {
            return None;
        }
        self.session
            .as_ref()
            .filter(|s| s.state == QueueState::Running && !s.pending.is_empty())
            .map(|s| s.next_item_at)
    }

    async fn dispatch_next(&mut self) {
        let Some(request) = self.session.as_mut().and_then(|s| s.pending.pop_front()) else {
            return;
        };
        debug!("Queue dispatching {} {}", request.entity_type, request.entity_id);

        let enricher = self.enricher.clone();
        let task_request = request.clone();
        let handle = tokio::spawn(async move { enricher.enrich(&task_request).await });
        self.in_flight = Some(InFlightItem {
            request,
            started: Instant::now(),
            handle,
        });
        self.sync_status().await;
    }

    async fn finish_item(&mut self, joined: Result<ItemOutcome, JoinError>) {
        let Some(item) = self.in_flight.take() else {
            return;
        };
        let Some(session) = self.session.as_mut() else {
            return;
        };
        let request = item.request;
        let entity_type = request.entity_type.as_str();

        session.processed += 1;
        session.eta.record(item.started.elapsed());
        session.eta_seconds = session.eta.estimate(session.pending.len());

        let mut pace = self.settings.item_delay;
        let event = match joined {
            Ok(Ok(result)) => {
                let failed = result.is_failure();
                if failed {
                    session.failed += 1;
                }
                metrics::record_queue_item(entity_type, if failed { "failed" } else { "completed" });
                pace = pacing_delay(&self.registry, pace, &result.providers_called);
                NotificationEvent::QueueItemCompleted {
                    entity_type: request.entity_type,
                    entity_id: request.entity_id,
                    processed: session.processed,
                    total_pending: session.total_pending,
                    updated: result.any_updated(),
                    errors: result.errors,
                    eta_seconds: session.eta_seconds,
                }
            }
            Ok(Err(e)) => {
                warn!("Queue item {} {} failed: {}", entity_type, request.entity_id, e);
                session.failed += 1;
                metrics::record_queue_item(entity_type, "error");
                NotificationEvent::QueueItemError {
                    entity_type: request.entity_type,
                    entity_id: request.entity_id,
                    processed: session.processed,
                    total_pending: session.total_pending,
                    error: e.to_string(),
                }
            }
            Err(e) => {
                let message = if e.is_panic() {
                    "enrichment task panicked".to_string()
                } else {
                    format!("enrichment task aborted: {}", e)
                };
                error!(
                    "Queue item {} {}: {}",
                    entity_type, request.entity_id, message
                );
                session.failed += 1;
                metrics::record_queue_item(entity_type, "panic");
                NotificationEvent::QueueItemError {
                    entity_type: request.entity_type,
                    entity_id: request.entity_id,
                    processed: session.processed,
                    total_pending: session.total_pending,
                    error: message,
                }
            }
        };
        session.next_item_at = tokio::time::Instant::now() + pace;

        let boundary = if session.state == QueueState::Stopping {
            Boundary::Cancel
        } else if session.pending.is_empty() {
            Boundary::Complete
        } else if session.pause_requested {
            Boundary::Pause
        } else {
            Boundary::Continue
        };

        let mut events = vec![event];
        events.extend(match boundary {
            Boundary::Continue => None,
            Boundary::Pause => self.enter_paused(),
            Boundary::Cancel => self.stop_session(),
            Boundary::Complete => self.complete_session(),
        });
        self.sync_and_publish(events).await;
    }

    fn enter_paused(&mut self) -> Option<NotificationEvent> {
        let session = self.session.as_mut()?;
        session.state = QueueState::Paused;
        session.pause_requested = false;
        info!(
            "Queue paused after {} of {} items",
            session.processed, session.total_pending
        );
        metrics::set_queue_running(false);
        Some(NotificationEvent::QueueStopped {
            reason: QueueStopReason::Paused,
            processed: session.processed,
            remaining: session.pending.len(),
        })
    }

    /// End the session on cancel, discarding what is left.
    fn stop_session(&mut self) -> Option<NotificationEvent> {
        let session = self.session.take()?;
        info!(
            "Queue cancelled after {} items, {} discarded",
            session.processed,
            session.pending.len()
        );
        metrics::set_queue_running(false);
        Some(NotificationEvent::QueueStopped {
            reason: QueueStopReason::Cancelled,
            processed: session.processed,
            remaining: session.pending.len(),
        })
    }

    fn complete_session(&mut self) -> Option<NotificationEvent> {
        let session = self.session.take()?;
        let duration_ms = session.started.elapsed().as_millis() as u64;
        info!(
            "Queue completed: {} processed, {} failed in {}ms",
            session.processed, session.failed, duration_ms
        );
        metrics::set_queue_running(false);
        Some(NotificationEvent::QueueCompleted {
            processed: session.processed,
            failed: session.failed,
            duration_ms,
        })
    }

    /// Update the shared status first so that a subscriber reacting to an
    /// event already observes the matching state.
    async fn sync_and_publish(&self, events: Vec<NotificationEvent>) -> QueueStatus {
        let status = self.sync_status().await;
        for event in events {
            self.bus.publish(event);
        }
        status
    }

    /// Publish the current snapshot to handles and return it.
    async fn sync_status(&self) -> QueueStatus {
        let snapshot = match &self.session {
            None => QueueStatus::idle(),
            Some(session) => QueueStatus {
                state: session.state,
                force_refresh: session.force_refresh,
                total_pending: session.total_pending,
                pending_artists: session.pending_artists,
                pending_albums: session.pending_albums,
                processed: session.processed,
                failed: session.failed,
                remaining: session.pending.len(),
                current: self.in_flight.as_ref().map(|item| item.request.clone()),
                eta_seconds: session.eta_seconds,
                started_at: Some(session.started_at),
            },
        };
        *self.status.write().await = snapshot.clone();
        snapshot
    }
}

/// The wait before the next item: the configured delay, stretched to the
/// slowest rate limit among the agents the last item called.
pub(crate) fn pacing_delay(
    registry: &AgentRegistry,
    item_delay: Duration,
    providers_called: &[String],
) -> Duration {
    providers_called
        .iter()
        .filter_map(|name| registry.min_interval_for(name))
        .fold(item_delay, Duration::max)
}

async fn wait_in_flight(slot: &mut Option<InFlightItem>) -> Result<ItemOutcome, JoinError> {
    match slot {
        Some(item) => (&mut item.handle).await,
        None => std::future::pending().await,
    }
}

async fn sleep_until(deadline: Option<tokio::time::Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::{AgentRegistration, AgentSettings};
    use crate::enrichment::AssetStore;
    use crate::metadata_store::{ArtistField, SqliteMetadataStore};
    use crate::notifications::{event_types, Notification, Subscription};
    use async_trait::async_trait;
    use std::sync::Mutex;
    use tempfile::TempDir;
    use tokio::sync::Semaphore;

    struct NoAssets;

    #[async_trait]
    impl AssetStore for NoAssets {
        async fn store_from_url(
            &self,
            _url: &str,
            _kind: crate::enrichment::AssetKind,
            _entity_id: &str,
        ) -> Result<String, crate::enrichment::AssetError> {
            Err(crate::enrichment::AssetError::Status(404))
        }
    }

    #[derive(Default)]
    struct FakeEnricher {
        panic_on: Option<&'static str>,
        missing: Option<&'static str>,
        gate: Option<Arc<Semaphore>>,
        seen: Mutex<Vec<String>>,
    }

    impl FakeEnricher {
        fn seen(&self) -> Vec<String> {
            self.seen.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl EntityEnricher for FakeEnricher {
        async fn enrich(&self, request: &EnrichmentRequest) -> ItemOutcome {
            self.seen.lock().unwrap().push(request.entity_id.clone());
            if let Some(gate) = &self.gate {
                gate.acquire().await.unwrap().forget();
            }
            if self.panic_on == Some(request.entity_id.as_str()) {
                panic!("enricher blew up");
            }
            if self.missing == Some(request.entity_id.as_str()) {
                return Err(EnrichmentError::EntityNotFound {
                    entity_type: request.entity_type,
                    entity_id: request.entity_id.clone(),
                });
            }
            let mut result = EnrichmentResult::new(request.entity_type, &request.entity_id);
            result.bio_updated = true;
            Ok(result)
        }
    }

    struct Harness {
        handle: QueueHandle,
        store: Arc<SqliteMetadataStore>,
        bus: NotificationBus,
        shutdown: CancellationToken,
        _temp_dir: TempDir,
    }

    impl Drop for Harness {
        fn drop(&mut self) {
            self.shutdown.cancel();
        }
    }

    fn harness(enricher: Arc<FakeEnricher>, seed: impl FnOnce(&SqliteMetadataStore)) -> Harness {
        let temp_dir = TempDir::new().unwrap();
        let store = Arc::new(SqliteMetadataStore::new(temp_dir.path().join("metadata.db")).unwrap());
        seed(&store);
        let bus = NotificationBus::new(256);
        let deps = EnrichmentDeps {
            store: store.clone(),
            registry: Arc::new(AgentRegistry::new()),
            assets: Arc::new(NoAssets),
            bus: bus.clone(),
            freshness: FreshnessPolicy::default(),
        };
        let shutdown = CancellationToken::new();
        let settings = QueueSettings {
            item_delay: Duration::ZERO,
            eta_window: 5,
        };
        let (worker, handle) = QueueWorker::new(enricher, &deps, settings, shutdown.clone());
        tokio::spawn(worker.run());
        Harness {
            handle,
            store,
            bus,
            shutdown,
            _temp_dir: temp_dir,
        }
    }

    fn three_entities(store: &SqliteMetadataStore) {
        store.upsert_artist("artist-1", "One").unwrap();
        store.upsert_artist("artist-2", "Two").unwrap();
        store.upsert_album("album-1", "Album", Some("artist-1")).unwrap();
    }

    async fn wait_for(sub: &mut Subscription, event_type: &str) -> Arc<Notification> {
        tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                let notification = sub.recv().await.expect("bus closed");
                if notification.event.event_type() == event_type {
                    return notification;
                }
            }
        })
        .await
        .expect("timed out waiting for event")
    }

    async fn wait_until_in_flight(handle: &QueueHandle) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while handle.status().await.current.is_none() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("no item went in flight");
    }

    #[tokio::test]
    async fn test_processes_artists_then_albums_and_completes() {
        let enricher = Arc::new(FakeEnricher::default());
        let h = harness(enricher.clone(), three_entities);
        let mut sub = h.bus.subscribe();

        let status = h.handle.start(false).await.unwrap();
        assert_eq!(status.state, QueueState::Running);
        assert_eq!(status.total_pending, 3);
        assert_eq!(status.pending_artists, 2);
        assert_eq!(status.pending_albums, 1);

        let completed = wait_for(&mut sub, event_types::QUEUE_COMPLETED).await;
        match &completed.event {
            NotificationEvent::QueueCompleted {
                processed, failed, ..
            } => {
                assert_eq!(*processed, 3);
                assert_eq!(*failed, 0);
            }
            other => panic!("unexpected event {:?}", other),
        }
        assert_eq!(enricher.seen(), vec!["artist-1", "artist-2", "album-1"]);
        assert_eq!(h.handle.status().await.state, QueueState::Idle);
    }

    #[tokio::test]
    async fn test_panicking_item_does_not_stop_the_session() {
        let enricher = Arc::new(FakeEnricher {
            panic_on: Some("artist-2"),
            missing: Some("album-1"),
            ..Default::default()
        });
        let h = harness(enricher.clone(), |store| {
            three_entities(store);
            store.upsert_album("album-2", "Second", None).unwrap();
        });
        let mut sub = h.bus.subscribe();

        h.handle.start(false).await.unwrap();

        let mut item_errors = Vec::new();
        let mut item_completed = Vec::new();
        loop {
            let n = tokio::time::timeout(Duration::from_secs(5), sub.recv())
                .await
                .unwrap()
                .unwrap();
            match &n.event {
                NotificationEvent::QueueItemError { entity_id, .. } => {
                    item_errors.push(entity_id.clone())
                }
                NotificationEvent::QueueItemCompleted { entity_id, .. } => {
                    item_completed.push(entity_id.clone())
                }
                NotificationEvent::QueueCompleted {
                    processed, failed, ..
                } => {
                    assert_eq!(*processed, 4);
                    assert_eq!(*failed, 2);
                    break;
                }
                _ => {}
            }
        }
        assert_eq!(item_errors, vec!["artist-2", "album-1"]);
        assert_eq!(item_completed, vec!["artist-1", "album-2"]);
    }

    #[tokio::test]
    async fn test_pause_is_idempotent_and_resume_continues_at_cursor() {
        let gate = Arc::new(Semaphore::new(0));
        let enricher = Arc::new(FakeEnricher {
            gate: Some(gate.clone()),
            ..Default::default()
        });
        let h = harness(enricher.clone(), three_entities);
        let mut sub = h.bus.subscribe();

        h.handle.start(false).await.unwrap();
        wait_until_in_flight(&h.handle).await;

        // Pause waits for the in-flight item.
        h.handle.pause().await.unwrap();
        h.handle.pause().await.unwrap();
        gate.add_permits(1);
        let stopped = wait_for(&mut sub, event_types::QUEUE_STOPPED).await;
        match &stopped.event {
            NotificationEvent::QueueStopped {
                reason,
                processed,
                remaining,
            } => {
                assert_eq!(*reason, QueueStopReason::Paused);
                assert_eq!(*processed, 1);
                assert_eq!(*remaining, 2);
            }
            other => panic!("unexpected event {:?}", other),
        }

        let status = h.handle.pause().await.unwrap();
        assert_eq!(status.state, QueueState::Paused);
        assert!(sub.try_recv().is_none());
        assert_eq!(enricher.seen(), vec!["artist-1"]);

        let status = h.handle.resume().await.unwrap();
        assert_eq!(status.state, QueueState::Running);
        gate.add_permits(2);
        wait_for(&mut sub, event_types::QUEUE_COMPLETED).await;
        assert_eq!(enricher.seen(), vec!["artist-1", "artist-2", "album-1"]);
    }

    #[tokio::test]
    async fn test_controls_on_idle_queue_are_rejected() {
        let h = harness(Arc::new(FakeEnricher::default()), |_| {});

        assert_eq!(h.handle.resume().await.unwrap_err(), QueueError::NotRunning);
        assert_eq!(h.handle.pause().await.unwrap_err(), QueueError::NotRunning);
        assert_eq!(h.handle.cancel().await.unwrap_err(), QueueError::NotRunning);
        assert_eq!(h.handle.status().await.state, QueueState::Idle);
    }

    #[tokio::test]
    async fn test_start_while_running_fails() {
        let gate = Arc::new(Semaphore::new(0));
        let h = harness(
            Arc::new(FakeEnricher {
                gate: Some(gate.clone()),
                ..Default::default()
            }),
            three_entities,
        );

        h.handle.start(false).await.unwrap();
        assert_eq!(
            h.handle.start(true).await.unwrap_err(),
            QueueError::AlreadyRunning
        );
        gate.add_permits(3);
    }

    #[tokio::test]
    async fn test_cancel_discards_remaining_items() {
        let gate = Arc::new(Semaphore::new(0));
        let enricher = Arc::new(FakeEnricher {
            gate: Some(gate.clone()),
            ..Default::default()
        });
        let h = harness(enricher.clone(), three_entities);
        let mut sub = h.bus.subscribe();

        h.handle.start(false).await.unwrap();
        wait_until_in_flight(&h.handle).await;

        let status = h.handle.cancel().await.unwrap();
        assert_eq!(status.state, QueueState::Stopping);
        gate.add_permits(1);

        let stopped = wait_for(&mut sub, event_types::QUEUE_STOPPED).await;
        match &stopped.event {
            NotificationEvent::QueueStopped {
                reason,
                processed,
                remaining,
            } => {
                assert_eq!(*reason, QueueStopReason::Cancelled);
                assert_eq!(*processed, 1);
                assert_eq!(*remaining, 2);
            }
            other => panic!("unexpected event {:?}", other),
        }
        assert_eq!(h.handle.status().await.state, QueueState::Idle);
        assert_eq!(enricher.seen(), vec!["artist-1"]);
    }

    #[tokio::test]
    async fn test_fresh_entities_are_only_queued_when_forced() {
        let enricher = Arc::new(FakeEnricher::default());
        let h = harness(enricher.clone(), |store| {
            store.upsert_artist("artist-1", "One").unwrap();
            store
                .set_artist_field("artist-1", ArtistField::Bio, "bio")
                .unwrap();
            store
                .set_artist_field("artist-1", ArtistField::Image, "images/artist/a.jpg")
                .unwrap();
        });
        let mut sub = h.bus.subscribe();

        let status = h.handle.start(false).await.unwrap();
        assert_eq!(status.state, QueueState::Idle);
        wait_for(&mut sub, event_types::QUEUE_COMPLETED).await;
        assert!(enricher.seen().is_empty());

        let status = h.handle.start(true).await.unwrap();
        assert_eq!(status.total_pending, 1);
        assert!(status.force_refresh);
        wait_for(&mut sub, event_types::QUEUE_COMPLETED).await;
        assert_eq!(enricher.seen(), vec!["artist-1"]);

        // Keep the store alive until the end of the test.
        assert!(h.store.get_artist("artist-1").unwrap().is_some());
    }

    #[test]
    fn test_pacing_follows_slowest_agent_called() {
        let registry = AgentRegistry::new();
        registry.register(AgentRegistration::new(
            "slow",
            AgentSettings {
                rate_limit: Duration::from_millis(1100),
                ..Default::default()
            },
        ));
        registry.register(AgentRegistration::new(
            "fast",
            AgentSettings {
                rate_limit: Duration::from_millis(100),
                ..Default::default()
            },
        ));
        let base = Duration::from_millis(250);

        assert_eq!(pacing_delay(&registry, base, &[]), base);
        assert_eq!(pacing_delay(&registry, base, &["fast".to_string()]), base);
        assert_eq!(
            pacing_delay(
                &registry,
                base,
                &["fast".to_string(), "slow".to_string(), "unknown".to_string()]
            ),
            Duration::from_millis(1100)
        );
    }
}
