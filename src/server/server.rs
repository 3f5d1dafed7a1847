use anyhow::{Context, Result};
use axum::{
    extract::State,
    middleware,
    response::{IntoResponse, Json},
    routing::get,
    Router,
};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::info;

use super::agent_routes::agent_routes;
use super::events::events_handler;
use super::metadata_routes::metadata_routes;
use super::metrics::metrics_handler;
use super::queue_routes::queue_routes;
use super::state::ServerState;
use super::websocket::ws_handler;
use super::{log_requests, ServerConfig};
use crate::enrichment::EnrichmentService;
use crate::enrichment_queue::QueueHandle;

#[derive(Serialize)]
struct ServerStats {
    pub uptime: String,
    pub hash: String,
    pub subscribers: usize,
    pub agents: usize,
}

fn format_uptime(duration: std::time::Duration) -> String {
    let seconds = duration.as_secs();
    let days = seconds / 86400;
    let hours = (seconds % 86400) / 3600;
    let minutes = (seconds % 3600) / 60;
    let seconds = seconds % 60;
    format!("{}d {:02}:{:02}:{:02}", days, hours, minutes, seconds)
}

async fn home(State(state): State<ServerState>) -> impl IntoResponse {
    let stats = ServerStats {
        uptime: format_uptime(state.start_time.elapsed()),
        hash: state.hash.clone(),
        subscribers: state.bus.subscriber_count(),
        agents: state.registry.all_agents().len(),
    };
    Json(stats)
}

pub fn make_app(state: ServerState) -> Router {
    let metadata: Router<ServerState> = metadata_routes()
        .nest("/queue", queue_routes())
        .nest("/agents", agent_routes());

    Router::new()
        .route("/", get(home))
        .route("/v1/events", get(events_handler))
        .route("/v1/ws", get(ws_handler))
        .nest("/v1/metadata", metadata)
        .layer(middleware::from_fn_with_state(state.clone(), log_requests))
        .with_state(state)
}

pub fn make_metrics_app() -> Router {
    Router::new().route("/metrics", get(metrics_handler))
}

/// Serve the API and the metrics endpoint until `shutdown` is cancelled.
pub async fn run_server(
    config: ServerConfig,
    enrichment: EnrichmentService,
    queue: QueueHandle,
    shutdown: CancellationToken,
) -> Result<()> {
    let port = config.port;
    let metrics_port = config.metrics_port;
    let app = make_app(ServerState::new(config, enrichment, queue));

    let listener = tokio::net::TcpListener::bind(format!("127.0.0.1:{}", port))
        .await
        .with_context(|| format!("Failed to bind port {}", port))?;
    let metrics_listener = tokio::net::TcpListener::bind(format!("127.0.0.1:{}", metrics_port))
        .await
        .with_context(|| format!("Failed to bind metrics port {}", metrics_port))?;

    info!("Ready to serve at port {}!", port);
    info!("Metrics available at port {}!", metrics_port);

    let api_shutdown = shutdown.clone();
    let api = axum::serve(listener, app)
        .with_graceful_shutdown(async move { api_shutdown.cancelled().await });
    let metrics = axum::serve(metrics_listener, make_metrics_app())
        .with_graceful_shutdown(async move { shutdown.cancelled().await });

    tokio::try_join!(
        async move { api.await.context("API server failed") },
        async move { metrics.await.context("Metrics server failed") },
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_uptime() {
        assert_eq!(
            format_uptime(std::time::Duration::from_secs(90061)),
            "1d 01:01:01"
        );
        assert_eq!(format_uptime(std::time::Duration::from_secs(59)), "0d 00:00:59");
    }
}
