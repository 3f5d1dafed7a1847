//! Agent registry introspection and toggling.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, put},
    Json, Router,
};
use serde::Deserialize;
use tracing::info;

use super::metadata_routes::error_response;
use crate::agents::AgentInfo;
use crate::server::state::{SharedAgentRegistry, ServerState};

#[derive(Debug, Deserialize)]
pub struct UpdateAgentBody {
    pub enabled: bool,
}

async fn list_agents(State(registry): State<SharedAgentRegistry>) -> Json<Vec<AgentInfo>> {
    Json(registry.all_agents())
}

async fn update_agent(
    State(registry): State<SharedAgentRegistry>,
    Path(name): Path<String>,
    Json(body): Json<UpdateAgentBody>,
) -> Response {
    if !registry.set_enabled(&name, body.enabled) {
        return error_response(StatusCode::NOT_FOUND, format!("unknown agent {}", name));
    }
    info!("Agent {} enabled={}", name, body.enabled);
    match registry.all_agents().into_iter().find(|a| a.name == name) {
        Some(info) => Json(info).into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

pub fn agent_routes() -> Router<ServerState> {
    Router::new()
        .route("/", get(list_agents))
        .route("/{name}", put(update_agent))
}
