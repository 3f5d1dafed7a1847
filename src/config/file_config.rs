use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct FileConfig {
    // Core settings (can override CLI)
    pub db_dir: Option<String>,
    pub media_path: Option<String>,
    pub port: Option<u16>,
    pub metrics_port: Option<u16>,
    pub logging_level: Option<String>,

    // Feature configs
    pub enrichment: Option<EnrichmentConfig>,
    pub queue: Option<QueueConfig>,
    /// Per-agent overrides keyed by agent name.
    pub agents: BTreeMap<String, AgentConfig>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct EnrichmentConfig {
    pub freshness_days: Option<i64>,
    pub default_timeout_secs: Option<u64>,
    pub musicbrainz_user_agent: Option<String>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct QueueConfig {
    pub item_delay_ms: Option<u64>,
    pub eta_window: Option<usize>,
    /// Per-subscriber buffer of the notification bus.
    pub bus_buffer: Option<usize>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct AgentConfig {
    pub enabled: Option<bool>,
    pub priority: Option<i32>,
    pub rate_limit_ms: Option<u64>,
    pub timeout_secs: Option<u64>,
    pub api_key: Option<String>,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        toml::from_str(&content).with_context(|| format!("Failed to parse config file: {:?}", path))
    }
}
