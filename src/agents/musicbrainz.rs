//! MusicBrainz agent resolving canonical artist and release-group ids.
//!
//! MusicBrainz allows one request per second per client and rejects
//! anonymous user agents, so the client must be built with a descriptive
//! `User-Agent`. Ambiguous search results are not scored: the first hit wins.

use super::{status_error, AgentError, AlbumQuery, ArtistQuery, CanonicalIdResolver};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

pub const AGENT_NAME: &str = "musicbrainz";
const MUSICBRAINZ_API_BASE: &str = "https://musicbrainz.org/ws/2";

pub struct MusicBrainzAgent {
    client: Client,
    base_url: String,
}

#[derive(Deserialize)]
struct ArtistSearchResponse {
    #[serde(default)]
    artists: Vec<MbEntity>,
}

#[derive(Deserialize)]
struct ReleaseGroupSearchResponse {
    #[serde(default, rename = "release-groups")]
    release_groups: Vec<MbEntity>,
}

#[derive(Deserialize)]
struct MbEntity {
    id: String,
}

impl MusicBrainzAgent {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            base_url: MUSICBRAINZ_API_BASE.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    async fn search(&self, entity: &str, query: &str) -> Result<String, AgentError> {
        let url = format!(
            "{}/{}/?query={}&fmt=json&limit=1",
            self.base_url,
            entity,
            urlencoding::encode(query)
        );
        debug!("MusicBrainz search: {}", url);

        let response = self.client.get(&url).send().await?;
        if !response.status().is_success() {
            return Err(status_error(response.status()));
        }
        Ok(response.text().await?)
    }
}

/// Escape Lucene special characters inside a quoted phrase.
fn lucene_escape(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}

fn artist_query(artist: &ArtistQuery) -> String {
    format!("artist:\"{}\"", lucene_escape(&artist.name))
}

fn release_group_query(album: &AlbumQuery) -> String {
    match &album.artist_name {
        Some(artist_name) => format!(
            "releasegroup:\"{}\" AND artist:\"{}\"",
            lucene_escape(&album.title),
            lucene_escape(artist_name)
        ),
        None => format!("releasegroup:\"{}\"", lucene_escape(&album.title)),
    }
}

fn parse_artist_search(body: &str) -> Result<Option<String>, AgentError> {
    let parsed: ArtistSearchResponse =
        serde_json::from_str(body).map_err(|e| AgentError::InvalidResponse(e.to_string()))?;
    Ok(parsed.artists.into_iter().next().map(|a| a.id))
}

fn parse_release_group_search(body: &str) -> Result<Option<String>, AgentError> {
    let parsed: ReleaseGroupSearchResponse =
        serde_json::from_str(body).map_err(|e| AgentError::InvalidResponse(e.to_string()))?;
    Ok(parsed.release_groups.into_iter().next().map(|rg| rg.id))
}

#[async_trait]
impl CanonicalIdResolver for MusicBrainzAgent {
    async fn resolve_artist_id(&self, artist: &ArtistQuery) -> Result<Option<String>, AgentError> {
        let body = self.search("artist", &artist_query(artist)).await?;
        parse_artist_search(&body)
    }

    async fn resolve_album_id(&self, album: &AlbumQuery) -> Result<Option<String>, AgentError> {
        let body = self
            .search("release-group", &release_group_query(album))
            .await?;
        parse_release_group_search(&body)
    }
}
