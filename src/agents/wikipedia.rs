//! Wikipedia agent backed by the REST page summary endpoint.

use super::{
    status_error, AgentError, ArtistBioRetriever, ArtistImageRetriever, ArtistQuery, Biography,
    RemoteImage,
};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tracing::debug;

pub const AGENT_NAME: &str = "wikipedia";
const WIKIPEDIA_API_BASE: &str = "https://en.wikipedia.org/api/rest_v1";

pub struct WikipediaAgent {
    client: Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct PageSummary {
    #[serde(rename = "type")]
    page_type: Option<String>,
    extract: Option<String>,
    content_urls: Option<ContentUrls>,
    originalimage: Option<SummaryImage>,
    thumbnail: Option<SummaryImage>,
}

#[derive(Debug, Deserialize)]
struct ContentUrls {
    desktop: Option<PageUrl>,
}

#[derive(Debug, Deserialize)]
struct PageUrl {
    page: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SummaryImage {
    source: Option<String>,
}

impl WikipediaAgent {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            base_url: WIKIPEDIA_API_BASE.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    async fn summary(&self, title: &str) -> Result<Option<PageSummary>, AgentError> {
        let url = format!(
            "{}/page/summary/{}",
            self.base_url,
            urlencoding::encode(&page_title(title))
        );
        debug!("Wikipedia summary lookup: {}", url);

        let response = self.client.get(&url).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(status_error(response.status()));
        }

        let body = response.text().await?;
        parse_summary(&body)
    }
}

fn page_title(name: &str) -> String {
    name.trim().replace(' ', "_")
}

/// Disambiguation pages are treated as "no answer".
fn parse_summary(body: &str) -> Result<Option<PageSummary>, AgentError> {
    let summary: PageSummary =
        serde_json::from_str(body).map_err(|e| AgentError::InvalidResponse(e.to_string()))?;
    if summary.page_type.as_deref() == Some("disambiguation") {
        return Ok(None);
    }
    Ok(Some(summary))
}

fn extract_bio(summary: &PageSummary) -> Option<Biography> {
    let text = summary.extract.as_deref()?.trim();
    if text.is_empty() {
        return None;
    }
    Some(Biography {
        text: text.to_string(),
        source_url: summary
            .content_urls
            .as_ref()
            .and_then(|c| c.desktop.as_ref())
            .and_then(|d| d.page.clone()),
    })
}

fn extract_images(summary: &PageSummary) -> Vec<RemoteImage> {
    [summary.originalimage.as_ref(), summary.thumbnail.as_ref()]
        .into_iter()
        .flatten()
        .filter_map(|img| img.source.clone())
        .filter(|url| !url.trim().is_empty())
        .map(|url| RemoteImage { url })
        .collect()
}

#[async_trait]
impl ArtistBioRetriever for WikipediaAgent {
    async fn get_artist_bio(&self, artist: &ArtistQuery) -> Result<Option<Biography>, AgentError> {
        Ok(self
            .summary(&artist.name)
            .await?
            .as_ref()
            .and_then(extract_bio))
    }
}

#[async_trait]
impl ArtistImageRetriever for WikipediaAgent {
    async fn get_artist_images(
        &self,
        artist: &ArtistQuery,
    ) -> Result<Vec<RemoteImage>, AgentError> {
        Ok(self
            .summary(&artist.name)
            .await?
            .as_ref()
            .map(extract_images)
            .unwrap_or_default())
    }
}
