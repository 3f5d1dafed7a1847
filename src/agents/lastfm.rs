//! Last.fm agent: artist biographies, artist images and album covers.
//!
//! Last.fm asks clients to stay under 5 requests per second; the default
//! rate limit for this agent is 200ms.

use super::{
    status_error, AgentError, AlbumCoverRetriever, AlbumQuery, ArtistBioRetriever,
    ArtistImageRetriever, ArtistQuery, Biography, RemoteImage,
};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

pub const AGENT_NAME: &str = "lastfm";
const LASTFM_API_BASE: &str = "https://ws.audioscrobbler.com/2.0/";

/// Hash of the grey star image Last.fm serves when it has no real picture.
const PLACEHOLDER_IMAGE_HASH: &str = "2a96cbd8b46e442fc41c2b86b821562f";

/// Last.fm error code for "the artist/album you supplied could not be found".
const ERROR_NOT_FOUND: i64 = 6;
const ERROR_RATE_LIMIT: i64 = 29;

pub struct LastFmAgent {
    client: Client,
    api_key: String,
    base_url: String,
}

#[derive(Deserialize)]
struct ArtistInfoResponse {
    artist: Option<LastFmArtist>,
    error: Option<i64>,
    message: Option<String>,
}

#[derive(Deserialize)]
struct LastFmArtist {
    url: Option<String>,
    bio: Option<LastFmBio>,
    #[serde(default)]
    image: Vec<LastFmImage>,
}

#[derive(Deserialize)]
struct LastFmBio {
    summary: Option<String>,
    content: Option<String>,
}

#[derive(Deserialize)]
struct LastFmImage {
    #[serde(rename = "#text")]
    url: Option<String>,
    size: Option<String>,
}

#[derive(Deserialize)]
struct AlbumInfoResponse {
    album: Option<LastFmAlbum>,
    error: Option<i64>,
    message: Option<String>,
}

#[derive(Deserialize)]
struct LastFmAlbum {
    #[serde(default)]
    image: Vec<LastFmImage>,
}

impl LastFmAgent {
    pub fn new(client: Client, api_key: impl Into<String>) -> Self {
        Self {
            client,
            api_key: api_key.into(),
            base_url: LASTFM_API_BASE.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    async fn get_json(&self, params: &[(&str, &str)]) -> Result<String, AgentError> {
        if self.api_key.is_empty() {
            return Err(AgentError::NotConfigured("missing Last.fm API key".to_string()));
        }

        let response = self
            .client
            .get(&self.base_url)
            .query(params)
            .query(&[("api_key", self.api_key.as_str()), ("format", "json")])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(status_error(response.status()));
        }
        Ok(response.text().await?)
    }

    async fn artist_info(&self, artist: &ArtistQuery) -> Result<Option<LastFmArtist>, AgentError> {
        let body = match &artist.mbid {
            Some(mbid) => {
                self.get_json(&[("method", "artist.getinfo"), ("mbid", mbid.as_str())])
                    .await?
            }
            None => {
                self.get_json(&[
                    ("method", "artist.getinfo"),
                    ("artist", artist.name.as_str()),
                    ("autocorrect", "1"),
                ])
                .await?
            }
        };
        parse_artist_info(&body)
    }
}

fn api_error(code: i64, message: Option<String>) -> Result<(), AgentError> {
    match code {
        ERROR_NOT_FOUND => Ok(()),
        ERROR_RATE_LIMIT => Err(AgentError::RateLimited),
        _ => Err(AgentError::InvalidResponse(format!(
            "Last.fm error {}: {}",
            code,
            message.unwrap_or_default()
        ))),
    }
}

fn parse_artist_info(body: &str) -> Result<Option<LastFmArtist>, AgentError> {
    let parsed: ArtistInfoResponse =
        serde_json::from_str(body).map_err(|e| AgentError::InvalidResponse(e.to_string()))?;
    if let Some(code) = parsed.error {
        api_error(code, parsed.message)?;
        return Ok(None);
    }
    Ok(parsed.artist)
}

fn parse_album_info(body: &str) -> Result<Option<LastFmAlbum>, AgentError> {
    let parsed: AlbumInfoResponse =
        serde_json::from_str(body).map_err(|e| AgentError::InvalidResponse(e.to_string()))?;
    if let Some(code) = parsed.error {
        api_error(code, parsed.message)?;
        return Ok(None);
    }
    Ok(parsed.album)
}

/// Last.fm appends a "Read more on Last.fm" anchor to every bio.
fn clean_bio(raw: &str) -> String {
    let text = match raw.find("<a href") {
        Some(idx) => &raw[..idx],
        None => raw,
    };
    text.trim().to_string()
}

fn extract_bio(artist: &LastFmArtist) -> Option<Biography> {
    let bio = artist.bio.as_ref()?;
    let text = [bio.content.as_deref(), bio.summary.as_deref()]
        .into_iter()
        .flatten()
        .map(clean_bio)
        .find(|text| !text.is_empty())?;
    Some(Biography {
        text,
        source_url: artist.url.clone(),
    })
}

fn size_rank(size: Option<&str>) -> u8 {
    match size {
        Some("mega") => 5,
        Some("extralarge") => 4,
        Some("large") => 3,
        Some("medium") => 2,
        Some("small") => 1,
        _ => 0,
    }
}

/// Real images only, largest first.
fn extract_images(images: &[LastFmImage]) -> Vec<RemoteImage> {
    let mut usable: Vec<&LastFmImage> = images
        .iter()
        .filter(|img| {
            img.url
                .as_deref()
                .map(|url| !url.trim().is_empty() && !url.contains(PLACEHOLDER_IMAGE_HASH))
                .unwrap_or(false)
        })
        .collect();
    usable.sort_by_key(|img| std::cmp::Reverse(size_rank(img.size.as_deref())));
    usable
        .into_iter()
        .filter_map(|img| img.url.clone())
        .map(|url| RemoteImage { url })
        .collect()
}

#[async_trait]
impl ArtistBioRetriever for LastFmAgent {
    async fn get_artist_bio(&self, artist: &ArtistQuery) -> Result<Option<Biography>, AgentError> {
        debug!("Last.fm bio lookup for {}", artist.name);
        Ok(self.artist_info(artist).await?.as_ref().and_then(extract_bio))
    }
}

#[async_trait]
impl ArtistImageRetriever for LastFmAgent {
    async fn get_artist_images(
        &self,
        artist: &ArtistQuery,
    ) -> Result<Vec<RemoteImage>, AgentError> {
        debug!("Last.fm image lookup for {}", artist.name);
        Ok(self
            .artist_info(artist)
            .await?
            .map(|a| extract_images(&a.image))
            .unwrap_or_default())
    }
}

#[async_trait]
impl AlbumCoverRetriever for LastFmAgent {
    async fn get_album_cover(&self, album: &AlbumQuery) -> Result<Option<RemoteImage>, AgentError> {
        // Stored album mbids are release-group ids, which Last.fm only
        // sometimes knows, so the artist/title lookup goes first.
        let body = match (&album.artist_name, &album.mbid) {
            (Some(artist_name), _) => {
                self.get_json(&[
                    ("method", "album.getinfo"),
                    ("artist", artist_name.as_str()),
                    ("album", album.title.as_str()),
                    ("autocorrect", "1"),
                ])
                .await?
            }
            (None, Some(mbid)) => {
                self.get_json(&[("method", "album.getinfo"), ("mbid", mbid.as_str())])
                    .await?
            }
            (None, None) => return Ok(None),
        };
        Ok(parse_album_info(&body)?.and_then(|a| extract_images(&a.image).into_iter().next()))
    }
}
