mod agent_routes;
pub mod config;
mod events;
mod http_layers;
mod metadata_routes;
pub mod metrics;
mod queue_routes;
pub mod server;
pub mod state;
pub mod streams;
pub mod websocket;

pub use config::ServerConfig;
pub use http_layers::*;
pub use server::{make_app, make_metrics_app, run_server};
pub use state::ServerState;
