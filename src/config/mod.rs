mod file_config;

pub use file_config::{AgentConfig, EnrichmentConfig, FileConfig, QueueConfig};

use crate::agents::{coverart, lastfm, musicbrainz, wikipedia, AgentSettings};
use crate::enrichment::DEFAULT_FRESHNESS_DAYS;
use crate::enrichment_queue::{QueueSettings, DEFAULT_ETA_WINDOW, DEFAULT_ITEM_DELAY_MS};
use crate::notifications::DEFAULT_SUBSCRIBER_BUFFER;
use crate::server::RequestsLoggingLevel;
use anyhow::{bail, Result};
use clap::ValueEnum;
use std::path::PathBuf;
use std::time::Duration;
use tracing::warn;

pub const DEFAULT_TIMEOUT_SECS: u64 = 15;

/// Command line values fed into [`AppConfig::resolve`]. Any of them may be
/// replaced by the TOML file.
#[derive(Debug, Clone, Default)]
pub struct CliConfig {
    pub db_dir: Option<PathBuf>,
    pub media_path: Option<PathBuf>,
    pub port: u16,
    pub metrics_port: u16,
    pub logging_level: RequestsLoggingLevel,
    pub lastfm_api_key: Option<String>,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    // Core settings
    pub db_dir: PathBuf,
    pub media_path: PathBuf,
    pub port: u16,
    pub metrics_port: u16,
    pub logging_level: RequestsLoggingLevel,

    // Feature configs (with defaults)
    pub enrichment: EnrichmentSettings,
    pub queue: QueueSettings,
    pub bus_buffer: usize,
    pub agents: AgentsSettings,
}

#[derive(Debug, Clone)]
pub struct EnrichmentSettings {
    pub freshness_days: i64,
    pub default_timeout: Duration,
    pub musicbrainz_user_agent: String,
}

/// Resolved settings of one provider agent.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderSettings {
    pub enabled: bool,
    pub priority: i32,
    pub rate_limit: Duration,
    pub timeout: Duration,
    pub api_key: Option<String>,
}

impl ProviderSettings {
    pub fn agent_settings(&self) -> AgentSettings {
        AgentSettings {
            enabled: self.enabled,
            priority: self.priority,
            rate_limit: self.rate_limit,
            timeout: self.timeout,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AgentsSettings {
    pub lastfm: ProviderSettings,
    pub wikipedia: ProviderSettings,
    pub musicbrainz: ProviderSettings,
    pub coverartarchive: ProviderSettings,
}

const KNOWN_AGENTS: [&str; 4] = [
    lastfm::AGENT_NAME,
    wikipedia::AGENT_NAME,
    musicbrainz::AGENT_NAME,
    coverart::AGENT_NAME,
];

impl AppConfig {
    /// Merges command line values with the optional config file. A key set in
    /// the file wins over the flag.
    pub fn resolve(cli: &CliConfig, file_config: Option<FileConfig>) -> Result<Self> {
        let file = file_config.unwrap_or_default();

        let db_dir = file
            .db_dir
            .map(PathBuf::from)
            .or_else(|| cli.db_dir.clone())
            .ok_or_else(|| {
                anyhow::anyhow!("db_dir must be specified via --db-dir or in config file")
            })?;

        // Validate db_dir exists
        if !db_dir.exists() {
            bail!("Database directory does not exist: {:?}", db_dir);
        }
        if !db_dir.is_dir() {
            bail!("db_dir is not a directory: {:?}", db_dir);
        }

        let media_path = file
            .media_path
            .map(PathBuf::from)
            .or_else(|| cli.media_path.clone())
            .unwrap_or_else(|| db_dir.clone());

        let port = file.port.unwrap_or(cli.port);
        let metrics_port = file.metrics_port.unwrap_or(cli.metrics_port);

        let logging_level = file
            .logging_level
            .and_then(|s| parse_logging_level(&s))
            .unwrap_or_else(|| cli.logging_level.clone());

        let enrichment_file = file.enrichment.unwrap_or_default();
        let enrichment = EnrichmentSettings {
            freshness_days: enrichment_file
                .freshness_days
                .unwrap_or(DEFAULT_FRESHNESS_DAYS),
            default_timeout: Duration::from_secs(
                enrichment_file
                    .default_timeout_secs
                    .unwrap_or(DEFAULT_TIMEOUT_SECS),
            ),
            musicbrainz_user_agent: enrichment_file
                .musicbrainz_user_agent
                .unwrap_or_else(|| default_user_agent().to_string()),
        };
        if enrichment.freshness_days <= 0 {
            bail!(
                "freshness_days must be positive, got {}",
                enrichment.freshness_days
            );
        }

        let queue_file = file.queue.unwrap_or_default();
        let queue = QueueSettings {
            item_delay: Duration::from_millis(
                queue_file.item_delay_ms.unwrap_or(DEFAULT_ITEM_DELAY_MS),
            ),
            eta_window: queue_file.eta_window.unwrap_or(DEFAULT_ETA_WINDOW),
        };
        let bus_buffer = queue_file.bus_buffer.unwrap_or(DEFAULT_SUBSCRIBER_BUFFER);
        if bus_buffer == 0 {
            bail!("queue.bus_buffer must be at least 1");
        }

        if let Some(unknown) = file
            .agents
            .keys()
            .find(|name| !KNOWN_AGENTS.contains(&name.as_str()))
        {
            bail!(
                "Unknown agent in config: {} (known: {})",
                unknown,
                KNOWN_AGENTS.join(", ")
            );
        }
        let agent_file = |name: &str| file.agents.get(name).cloned().unwrap_or_default();
        let timeout = enrichment.default_timeout;

        let mut lastfm_settings = provider(agent_file(lastfm::AGENT_NAME), 1, 200, timeout);
        lastfm_settings.api_key = lastfm_settings
            .api_key
            .or_else(|| cli.lastfm_api_key.clone());
        let explicitly_enabled = file
            .agents
            .get(lastfm::AGENT_NAME)
            .and_then(|a| a.enabled)
            .unwrap_or(false);
        if lastfm_settings.api_key.is_none() {
            if explicitly_enabled {
                warn!("Last.fm agent enabled without an api_key, disabling it");
            }
            lastfm_settings.enabled = false;
        }

        let agents = AgentsSettings {
            lastfm: lastfm_settings,
            wikipedia: provider(agent_file(wikipedia::AGENT_NAME), 2, 500, timeout),
            musicbrainz: provider(agent_file(musicbrainz::AGENT_NAME), 1, 1100, timeout),
            coverartarchive: provider(agent_file(coverart::AGENT_NAME), 1, 500, timeout),
        };

        Ok(Self {
            db_dir,
            media_path,
            port,
            metrics_port,
            logging_level,
            enrichment,
            queue,
            bus_buffer,
            agents,
        })
    }

    pub fn metadata_db_path(&self) -> PathBuf {
        self.db_dir.join("metadata.db")
    }
}

fn provider(
    file: AgentConfig,
    priority: i32,
    rate_limit_ms: u64,
    timeout: Duration,
) -> ProviderSettings {
    ProviderSettings {
        enabled: file.enabled.unwrap_or(true),
        priority: file.priority.unwrap_or(priority),
        rate_limit: Duration::from_millis(file.rate_limit_ms.unwrap_or(rate_limit_ms)),
        timeout: file.timeout_secs.map(Duration::from_secs).unwrap_or(timeout),
        api_key: file.api_key.filter(|k| !k.trim().is_empty()),
    }
}

fn default_user_agent() -> &'static str {
    concat!("enrichment-server/", env!("CARGO_PKG_VERSION"))
}

/// Case-insensitive, same names as the `--logging-level` flag.
fn parse_logging_level(s: &str) -> Option<RequestsLoggingLevel> {
    RequestsLoggingLevel::from_str(s, true).ok()
}
