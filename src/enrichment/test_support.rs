//! Scripted agents and an in-memory asset store for orchestrator tests.

use super::assets::{AssetKind, AssetStore};
use super::error::AssetError;
use super::{EnrichmentDeps, FreshnessPolicy};
use crate::agents::{
    AgentError, AgentRegistry, AlbumCoverRetriever, AlbumQuery, ArtistBioRetriever,
    ArtistImageRetriever, ArtistQuery, Biography, CanonicalIdResolver, RemoteImage,
};
use crate::metadata_store::{MetadataStore, SqliteMetadataStore};
use crate::notifications::NotificationBus;
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

#[derive(Clone)]
pub enum Script {
    Answer(&'static str),
    Empty,
    Fail,
}

impl Script {
    fn text(&self) -> Result<Option<String>, AgentError> {
        match self {
            Script::Answer(text) => Ok(Some(text.to_string())),
            Script::Empty => Ok(None),
            Script::Fail => Err(AgentError::Status(500)),
        }
    }
}

/// Answers every capability from one script.
pub struct ScriptedAgent {
    script: Script,
    delay: Duration,
    calls: AtomicUsize,
}

impl ScriptedAgent {
    pub fn new(script: Script) -> Arc<Self> {
        Self::slow(script, Duration::ZERO)
    }

    /// Sleeps for `delay` before every answer.
    pub fn slow(script: Script, delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            script,
            delay,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    async fn answer(&self) -> Result<Option<String>, AgentError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.script.text()
    }
}

#[async_trait]
impl ArtistBioRetriever for ScriptedAgent {
    async fn get_artist_bio(&self, _artist: &ArtistQuery) -> Result<Option<Biography>, AgentError> {
        Ok(self.answer().await?.map(|text| Biography {
            text,
            source_url: None,
        }))
    }
}

#[async_trait]
impl ArtistImageRetriever for ScriptedAgent {
    async fn get_artist_images(
        &self,
        _artist: &ArtistQuery,
    ) -> Result<Vec<RemoteImage>, AgentError> {
        Ok(self
            .answer()
            .await?
            .map(|url| vec![RemoteImage { url }])
            .unwrap_or_default())
    }
}

#[async_trait]
impl AlbumCoverRetriever for ScriptedAgent {
    async fn get_album_cover(&self, _album: &AlbumQuery) -> Result<Option<RemoteImage>, AgentError> {
        Ok(self.answer().await?.map(|url| RemoteImage { url }))
    }
}

#[async_trait]
impl CanonicalIdResolver for ScriptedAgent {
    async fn resolve_artist_id(&self, _artist: &ArtistQuery) -> Result<Option<String>, AgentError> {
        self.answer().await
    }

    async fn resolve_album_id(&self, _album: &AlbumQuery) -> Result<Option<String>, AgentError> {
        self.answer().await
    }
}

/// Records requested URLs; fails for URLs containing "broken".
#[derive(Default)]
pub struct MemoryAssetStore {
    stored: Mutex<Vec<String>>,
}

impl MemoryAssetStore {
    pub fn stored(&self) -> Vec<String> {
        self.stored.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl AssetStore for MemoryAssetStore {
    async fn store_from_url(
        &self,
        url: &str,
        kind: AssetKind,
        entity_id: &str,
    ) -> Result<String, AssetError> {
        if url.contains("broken") {
            return Err(AssetError::Status(404));
        }
        if let Ok(mut stored) = self.stored.lock() {
            stored.push(url.to_string());
        }
        Ok(format!("images/{}/{}.jpg", kind.dir_name(), entity_id))
    }
}

pub struct Fixture {
    pub store: Arc<SqliteMetadataStore>,
    pub registry: Arc<AgentRegistry>,
    pub assets: Arc<MemoryAssetStore>,
    pub bus: NotificationBus,
    _temp_dir: TempDir,
}

impl Fixture {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().unwrap();
        let store = Arc::new(SqliteMetadataStore::new(temp_dir.path().join("metadata.db")).unwrap());
        Self {
            store,
            registry: Arc::new(AgentRegistry::new()),
            assets: Arc::new(MemoryAssetStore::default()),
            bus: NotificationBus::new(256),
            _temp_dir: temp_dir,
        }
    }

    pub fn deps(&self) -> EnrichmentDeps {
        let store: Arc<dyn MetadataStore> = self.store.clone();
        EnrichmentDeps {
            store,
            registry: self.registry.clone(),
            assets: self.assets.clone(),
            bus: self.bus.clone(),
            freshness: FreshnessPolicy::default(),
        }
    }
}
