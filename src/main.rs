use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, level_filters::LevelFilter};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use enrichment_server::agents::{register_builtin_agents, AgentRegistry};
use enrichment_server::config::{self, AppConfig, FileConfig};
use enrichment_server::enrichment::{
    EnrichmentDeps, EnrichmentService, FileSystemAssetStore, FreshnessPolicy,
};
use enrichment_server::enrichment_queue::QueueWorker;
use enrichment_server::metadata_store::SqliteMetadataStore;
use enrichment_server::notifications::NotificationBus;
use enrichment_server::server::{metrics, run_server, RequestsLoggingLevel, ServerConfig};

fn parse_path(s: &str) -> Result<PathBuf, String> {
    let path_buf = PathBuf::from(s);
    let original_path = match path_buf.canonicalize() {
        Ok(path) => path,
        Err(msg) => {
            if msg.kind() == std::io::ErrorKind::NotFound {
                path_buf
            } else {
                return Err(format!("Error resolving path '{}': {}", s, msg));
            }
        }
    };
    if original_path.is_absolute() {
        return Ok(original_path);
    }
    let cwd = std::env::current_dir().map_err(|e| format!("Failed to get current dir: {}", e))?;
    Ok(cwd.join(original_path))
}

#[derive(Parser, Debug)]
struct CliArgs {
    /// Path to TOML configuration file. Values in the file override CLI arguments.
    #[clap(long, value_parser = parse_path)]
    pub config: Option<PathBuf>,

    /// Directory holding metadata.db. Can also be specified in config file.
    #[clap(long, value_parser = parse_path)]
    pub db_dir: Option<PathBuf>,

    /// Root directory for downloaded images. Defaults to db_dir.
    #[clap(long, value_parser = parse_path)]
    pub media_path: Option<PathBuf>,

    /// The port to listen on.
    #[clap(short, long, default_value_t = 3001)]
    pub port: u16,

    /// The port for the metrics server (Prometheus scraping).
    #[clap(long, default_value_t = 9091)]
    pub metrics_port: u16,

    /// The level of logging to perform on each request.
    #[clap(long, default_value = "path")]
    pub logging_level: RequestsLoggingLevel,

    /// Last.fm API key. The Last.fm agent stays disabled without one.
    #[clap(long, env = "LASTFM_API_KEY")]
    pub lastfm_api_key: Option<String>,
}

impl From<&CliArgs> for config::CliConfig {
    fn from(args: &CliArgs) -> Self {
        config::CliConfig {
            db_dir: args.db_dir.clone(),
            media_path: args.media_path.clone(),
            port: args.port,
            metrics_port: args.metrics_port,
            logging_level: args.logging_level.clone(),
            lastfm_api_key: args.lastfm_api_key.clone(),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli_args = CliArgs::parse();

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .with_env_var("LOG_LEVEL")
                .from_env_lossy(),
        )
        .try_init()
        .context("Failed to initialize logging")?;

    let file_config = match &cli_args.config {
        Some(path) => {
            info!("Loading config from {:?}", path);
            Some(FileConfig::load(path)?)
        }
        None => None,
    };
    let cli_config = config::CliConfig::from(&cli_args);
    let app_config = AppConfig::resolve(&cli_config, file_config)?;

    metrics::init_metrics();

    let db_path = app_config.metadata_db_path();
    info!("Opening metadata store at {:?}", db_path);
    let store = Arc::new(SqliteMetadataStore::new(&db_path)?);

    let client = reqwest::Client::builder()
        .user_agent(app_config.enrichment.musicbrainz_user_agent.clone())
        .timeout(app_config.enrichment.default_timeout)
        .build()
        .context("Failed to build HTTP client")?;

    let registry = Arc::new(AgentRegistry::new());
    register_builtin_agents(&registry, &app_config.agents, &client);
    for agent in registry.all_agents() {
        info!(
            "Agent {} (priority {}, enabled {}): {:?}",
            agent.name, agent.priority, agent.enabled, agent.capabilities
        );
    }

    let deps = EnrichmentDeps {
        store,
        registry,
        assets: Arc::new(FileSystemAssetStore::new(
            client.clone(),
            app_config.media_path.clone(),
        )),
        bus: NotificationBus::new(app_config.bus_buffer),
        freshness: FreshnessPolicy::from_days(app_config.enrichment.freshness_days),
    };
    let service = EnrichmentService::new(deps.clone());

    let shutdown_token = CancellationToken::new();
    let (worker, queue) = QueueWorker::new(
        Arc::new(service.clone()),
        &deps,
        app_config.queue.clone(),
        shutdown_token.child_token(),
    );
    let worker_handle = tokio::spawn(worker.run());

    let server_config = ServerConfig {
        requests_logging_level: app_config.logging_level.clone(),
        port: app_config.port,
        metrics_port: app_config.metrics_port,
    };

    let ctrl_c_token = shutdown_token.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            return;
        }
        info!("Received Ctrl+C, initiating graceful shutdown");
        ctrl_c_token.cancel();
    });

    let result = run_server(server_config, service, queue, shutdown_token.clone()).await;
    info!("HTTP server stopped: {:?}", result);
    shutdown_token.cancel();
    if let Err(e) = worker_handle.await {
        error!("Queue worker task failed: {}", e);
    }
    result
}
