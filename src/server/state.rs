use axum::extract::FromRef;

use crate::agents::AgentRegistry;
use crate::enrichment::EnrichmentService;
use crate::enrichment_queue::QueueHandle;
use crate::notifications::NotificationBus;
use std::sync::Arc;
use std::time::Instant;

use super::ServerConfig;

pub type SharedAgentRegistry = Arc<AgentRegistry>;

#[derive(Clone)]
pub struct ServerState {
    pub config: ServerConfig,
    pub start_time: Instant,
    pub enrichment: EnrichmentService,
    pub queue: QueueHandle,
    pub registry: SharedAgentRegistry,
    pub bus: NotificationBus,
    pub hash: String,
}

impl ServerState {
    pub fn new(config: ServerConfig, enrichment: EnrichmentService, queue: QueueHandle) -> Self {
        let deps = enrichment.deps();
        let registry = deps.registry.clone();
        let bus = deps.bus.clone();
        ServerState {
            config,
            start_time: Instant::now(),
            enrichment,
            queue,
            registry,
            bus,
            hash: env!("GIT_HASH").to_owned(),
        }
    }
}

impl FromRef<ServerState> for ServerConfig {
    fn from_ref(input: &ServerState) -> Self {
        input.config.clone()
    }
}

impl FromRef<ServerState> for EnrichmentService {
    fn from_ref(input: &ServerState) -> Self {
        input.enrichment.clone()
    }
}

impl FromRef<ServerState> for QueueHandle {
    fn from_ref(input: &ServerState) -> Self {
        input.queue.clone()
    }
}

impl FromRef<ServerState> for SharedAgentRegistry {
    fn from_ref(input: &ServerState) -> Self {
        input.registry.clone()
    }
}

impl FromRef<ServerState> for NotificationBus {
    fn from_ref(input: &ServerState) -> Self {
        input.bus.clone()
    }
}
