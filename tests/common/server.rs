//! Test server lifecycle management
//!
//! Each test gets an isolated server with its own database, fake agents and
//! queue worker.

use super::agents::{FakeAgent, FakeAssetStore};
use super::constants::*;
use super::fixtures::create_test_store;
use enrichment_server::agents::{AgentRegistration, AgentRegistry, AgentSettings};
use enrichment_server::enrichment::{EnrichmentDeps, EnrichmentService, FreshnessPolicy};
use enrichment_server::enrichment_queue::{QueueSettings, QueueWorker};
use enrichment_server::metadata_store::MetadataStore;
use enrichment_server::notifications::NotificationBus;
use enrichment_server::server::{
    make_app, make_metrics_app, RequestsLoggingLevel, ServerConfig, ServerState,
};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

fn agent_settings(priority: i32) -> AgentSettings {
    AgentSettings {
        enabled: true,
        priority,
        rate_limit: Duration::ZERO,
        timeout: Duration::from_secs(5),
    }
}

/// Test server instance with an isolated metadata database.
///
/// When dropped, the server and the queue worker shut down and temp
/// resources are cleaned up.
pub struct TestServer {
    /// Base URL for making requests (e.g., "http://127.0.0.1:12345")
    pub base_url: String,

    /// Base URL of the metrics endpoint.
    #[allow(dead_code)]
    pub metrics_url: String,

    /// Store for direct database checks in tests
    #[allow(dead_code)]
    pub store: Arc<dyn MetadataStore>,

    /// Priority 1 agent. Fails biographies of FLAKY_ARTIST_ID.
    #[allow(dead_code)]
    pub primary: Arc<FakeAgent>,

    /// Priority 2 biography agent.
    #[allow(dead_code)]
    pub backup: Arc<FakeAgent>,

    // Private fields - keep resources alive until drop
    _temp_db_dir: TempDir,
    shutdown: CancellationToken,
}

impl TestServer {
    /// Spawns a new test server on a random port
    ///
    /// # Panics
    ///
    /// Panics if the fixture database cannot be created, binding fails or
    /// the server does not become ready in time.
    pub async fn spawn() -> Self {
        let (temp_db_dir, store) = create_test_store().expect("Failed to create test store");
        let store: Arc<dyn MetadataStore> = Arc::new(store);

        let primary = FakeAgent::new(PRIMARY_AGENT, &[FLAKY_ARTIST_ID]);
        let backup = FakeAgent::new(BACKUP_AGENT, &[]);

        let registry = Arc::new(AgentRegistry::new());
        registry.register(
            AgentRegistration::new(PRIMARY_AGENT, agent_settings(1))
                .with_artist_bio(primary.clone())
                .with_artist_images(primary.clone())
                .with_album_cover(primary.clone()),
        );
        registry.register(
            AgentRegistration::new(BACKUP_AGENT, agent_settings(2)).with_artist_bio(backup.clone()),
        );

        let deps = EnrichmentDeps {
            store: store.clone(),
            registry,
            assets: Arc::new(FakeAssetStore),
            bus: NotificationBus::new(256),
            freshness: FreshnessPolicy::from_days(30),
        };
        let service = EnrichmentService::new(deps.clone());

        let shutdown = CancellationToken::new();
        let (worker, queue) = QueueWorker::new(
            Arc::new(service.clone()),
            &deps,
            QueueSettings {
                item_delay: Duration::ZERO,
                ..Default::default()
            },
            shutdown.clone(),
        );
        tokio::spawn(worker.run());

        // Bind to random ports
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind to random port");
        let port = listener
            .local_addr()
            .expect("Failed to get local address")
            .port();
        let metrics_listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind metrics port");
        let metrics_port = metrics_listener
            .local_addr()
            .expect("Failed to get metrics address")
            .port();

        let config = ServerConfig {
            port,
            metrics_port,
            requests_logging_level: RequestsLoggingLevel::None,
        };
        let app = make_app(ServerState::new(config, service, queue));

        let api_shutdown = shutdown.clone();
        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async move { api_shutdown.cancelled().await })
                .await
                .expect("Server failed");
        });
        let metrics_shutdown = shutdown.clone();
        tokio::spawn(async move {
            axum::serve(metrics_listener, make_metrics_app())
                .with_graceful_shutdown(async move { metrics_shutdown.cancelled().await })
                .await
                .expect("Metrics server failed");
        });

        let server = Self {
            base_url: format!("http://127.0.0.1:{}", port),
            metrics_url: format!("http://127.0.0.1:{}", metrics_port),
            store,
            primary,
            backup,
            _temp_db_dir: temp_db_dir,
            shutdown,
        };

        server.wait_for_ready().await;

        server
    }

    /// Waits for the server to become ready by polling the home endpoint
    async fn wait_for_ready(&self) {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(100))
            .build()
            .expect("Failed to build reqwest client");

        let start = std::time::Instant::now();
        let timeout = Duration::from_millis(SERVER_READY_TIMEOUT_MS);

        loop {
            if start.elapsed() > timeout {
                panic!(
                    "Server did not become ready within {}ms",
                    SERVER_READY_TIMEOUT_MS
                );
            }

            match client.get(format!("{}/", self.base_url)).send().await {
                Ok(response) if response.status().is_success() => return,
                _ => {
                    tokio::time::sleep(Duration::from_millis(SERVER_READY_POLL_INTERVAL_MS)).await;
                }
            }
        }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}
