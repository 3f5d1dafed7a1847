//! In-process providers and asset store, so tests never leave the machine.

use async_trait::async_trait;
use enrichment_server::agents::{
    AgentError, AlbumCoverRetriever, AlbumQuery, ArtistBioRetriever, ArtistImageRetriever,
    ArtistQuery, Biography, RemoteImage,
};
use enrichment_server::enrichment::{AssetError, AssetKind, AssetStore};
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Answers biography, images and covers for every entity, except the
/// biographies listed in `failing_bio`.
pub struct FakeAgent {
    name: String,
    failing_bio: HashSet<String>,
    calls: AtomicUsize,
}

impl FakeAgent {
    pub fn new(name: &str, failing_bio: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            failing_bio: failing_bio.iter().map(|id| id.to_string()).collect(),
            calls: AtomicUsize::new(0),
        })
    }

    /// Number of provider calls served so far, across all capabilities.
    #[allow(dead_code)]
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn count(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl ArtistBioRetriever for FakeAgent {
    async fn get_artist_bio(&self, artist: &ArtistQuery) -> Result<Option<Biography>, AgentError> {
        self.count();
        if self.failing_bio.contains(&artist.id) {
            return Err(AgentError::Status(500));
        }
        Ok(Some(Biography {
            text: format!("{} biography by {}", artist.name, self.name),
            source_url: None,
        }))
    }
}

#[async_trait]
impl ArtistImageRetriever for FakeAgent {
    async fn get_artist_images(
        &self,
        artist: &ArtistQuery,
    ) -> Result<Vec<RemoteImage>, AgentError> {
        self.count();
        Ok(vec![RemoteImage {
            url: format!("https://images.test/{}/{}.jpg", self.name, artist.id),
        }])
    }
}

#[async_trait]
impl AlbumCoverRetriever for FakeAgent {
    async fn get_album_cover(&self, album: &AlbumQuery) -> Result<Option<RemoteImage>, AgentError> {
        self.count();
        Ok(Some(RemoteImage {
            url: format!("https://images.test/{}/{}.jpg", self.name, album.id),
        }))
    }
}

/// Pretends every download succeeded.
pub struct FakeAssetStore;

#[async_trait]
impl AssetStore for FakeAssetStore {
    async fn store_from_url(
        &self,
        _url: &str,
        kind: AssetKind,
        entity_id: &str,
    ) -> Result<String, AssetError> {
        Ok(format!("images/{}/{}.jpg", kind.dir_name(), entity_id))
    }
}
