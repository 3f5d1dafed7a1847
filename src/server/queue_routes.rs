//! Background queue control routes.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use tracing::{error, info};

use super::metadata_routes::error_response;
use crate::enrichment_queue::{QueueError, QueueHandle, QueueStatus};
use crate::server::state::ServerState;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartQueueBody {
    #[serde(default)]
    pub force_refresh: bool,
}

fn queue_response(result: Result<QueueStatus, QueueError>) -> Response {
    match result {
        Ok(status) => Json(status).into_response(),
        Err(err) => {
            let status = match &err {
                QueueError::AlreadyRunning | QueueError::NotRunning => StatusCode::CONFLICT,
                QueueError::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
                QueueError::Store(_) => {
                    error!("Queue error: {}", err);
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            };
            error_response(status, err.to_string())
        }
    }
}

async fn get_status(State(queue): State<QueueHandle>) -> Json<QueueStatus> {
    Json(queue.status().await)
}

/// The body is optional; an empty request starts a non-forced session.
async fn start(State(queue): State<QueueHandle>, body: Option<Json<StartQueueBody>>) -> Response {
    let force_refresh = body.map(|Json(b)| b.force_refresh).unwrap_or(false);
    info!("Queue start requested (forceRefresh={})", force_refresh);
    queue_response(queue.start(force_refresh).await)
}

async fn pause(State(queue): State<QueueHandle>) -> Response {
    queue_response(queue.pause().await)
}

async fn resume(State(queue): State<QueueHandle>) -> Response {
    queue_response(queue.resume().await)
}

async fn cancel(State(queue): State<QueueHandle>) -> Response {
    queue_response(queue.cancel().await)
}

pub fn queue_routes() -> Router<ServerState> {
    Router::new()
        .route("/", get(get_status))
        .route("/start", post(start))
        .route("/pause", post(pause))
        .route("/resume", post(resume))
        .route("/cancel", post(cancel))
}
