//! Cover Art Archive agent. Needs the album's release-group mbid, so it only
//! answers once the canonical id has been resolved.

use super::{status_error, AgentError, AlbumCoverRetriever, AlbumQuery, RemoteImage};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::collections::HashMap;

pub const AGENT_NAME: &str = "coverartarchive";
const COVER_ART_ARCHIVE_BASE: &str = "https://coverartarchive.org";

pub struct CoverArtArchiveAgent {
    client: Client,
    base_url: String,
}

#[derive(Deserialize)]
struct CoverArtResponse {
    #[serde(default)]
    images: Vec<CoverArtImage>,
}

#[derive(Deserialize)]
struct CoverArtImage {
    #[serde(default)]
    front: bool,
    image: Option<String>,
    #[serde(default)]
    thumbnails: HashMap<String, String>,
}

impl CoverArtArchiveAgent {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            base_url: COVER_ART_ARCHIVE_BASE.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

/// Prefer the front cover's large thumbnail; full-size originals can be
/// tens of megabytes.
fn pick_front_cover(body: &str) -> Result<Option<RemoteImage>, AgentError> {
    let parsed: CoverArtResponse =
        serde_json::from_str(body).map_err(|e| AgentError::InvalidResponse(e.to_string()))?;

    let image = parsed
        .images
        .iter()
        .find(|img| img.front)
        .or_else(|| parsed.images.first());

    Ok(image.and_then(|img| {
        ["1200", "large", "500"]
            .iter()
            .find_map(|size| img.thumbnails.get(*size).cloned())
            .or_else(|| img.image.clone())
            .filter(|url| !url.trim().is_empty())
            .map(|url| RemoteImage { url })
    }))
}

#[async_trait]
impl AlbumCoverRetriever for CoverArtArchiveAgent {
    async fn get_album_cover(&self, album: &AlbumQuery) -> Result<Option<RemoteImage>, AgentError> {
        let Some(mbid) = &album.mbid else {
            return Ok(None);
        };

        let url = format!("{}/release-group/{}", self.base_url, mbid);
        let response = self.client.get(&url).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(status_error(response.status()));
        }

        let body = response.text().await?;
        pick_front_cover(&body)
    }
}
