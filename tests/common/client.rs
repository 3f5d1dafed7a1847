//! HTTP client for end-to-end tests
//!
//! Wraps reqwest with one method per server endpoint. When API routes or
//! request formats change, update only this file.

use super::constants::*;
use reqwest::Response;
use serde_json::json;
use std::time::Duration;

pub struct TestClient {
    /// The underlying reqwest client (public for custom requests in tests)
    pub client: reqwest::Client,
    /// The base URL of the test server
    pub base_url: String,
}

#[allow(dead_code)]
impl TestClient {
    pub fn new(base_url: String) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .expect("Failed to build reqwest client");

        Self { client, base_url }
    }

    // ========================================================================
    // Enrichment
    // ========================================================================

    pub async fn enrich_artist(&self, id: &str, force_refresh: bool) -> Response {
        self.client
            .post(format!(
                "{}/v1/metadata/artists/{}/enrich?forceRefresh={}",
                self.base_url, id, force_refresh
            ))
            .send()
            .await
            .expect("Enrich artist request failed")
    }

    pub async fn enrich_album(&self, id: &str, force_refresh: bool) -> Response {
        self.client
            .post(format!(
                "{}/v1/metadata/albums/{}/enrich?forceRefresh={}",
                self.base_url, id, force_refresh
            ))
            .send()
            .await
            .expect("Enrich album request failed")
    }

    pub async fn enrich_artist_albums(&self, artist_id: &str, force_refresh: bool) -> Response {
        self.client
            .post(format!(
                "{}/v1/metadata/artists/{}/albums/enrich?forceRefresh={}",
                self.base_url, artist_id, force_refresh
            ))
            .send()
            .await
            .expect("Batch enrich request failed")
    }

    // ========================================================================
    // Queue
    // ========================================================================

    pub async fn queue_status(&self) -> Response {
        self.client
            .get(format!("{}/v1/metadata/queue", self.base_url))
            .send()
            .await
            .expect("Queue status request failed")
    }

    pub async fn queue_start(&self, force_refresh: bool) -> Response {
        self.client
            .post(format!("{}/v1/metadata/queue/start", self.base_url))
            .json(&json!({ "forceRefresh": force_refresh }))
            .send()
            .await
            .expect("Queue start request failed")
    }

    /// `action` is one of `pause`, `resume` or `cancel`.
    pub async fn queue_control(&self, action: &str) -> Response {
        self.client
            .post(format!("{}/v1/metadata/queue/{}", self.base_url, action))
            .send()
            .await
            .expect("Queue control request failed")
    }

    // ========================================================================
    // Agents
    // ========================================================================

    pub async fn list_agents(&self) -> Response {
        self.client
            .get(format!("{}/v1/metadata/agents", self.base_url))
            .send()
            .await
            .expect("List agents request failed")
    }

    pub async fn set_agent_enabled(&self, name: &str, enabled: bool) -> Response {
        self.client
            .put(format!("{}/v1/metadata/agents/{}", self.base_url, name))
            .json(&json!({ "enabled": enabled }))
            .send()
            .await
            .expect("Update agent request failed")
    }

    // ========================================================================
    // Streams
    // ========================================================================

    pub async fn open_events(&self) -> Response {
        self.client
            .get(format!("{}/v1/events", self.base_url))
            .timeout(Duration::from_secs(60))
            .send()
            .await
            .expect("Events request failed")
    }
}
