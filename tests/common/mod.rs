//! Common test infrastructure
//!
//! This module provides all the infrastructure needed for end-to-end tests.
//! Tests should only import from this module, not from internal submodules.
//!
//! # Example
//!
//! ```no_run
//! mod common;
//! use common::{TestServer, TestClient, ARTIST_1_ID};
//! use reqwest::StatusCode;
//!
//! #[tokio::test]
//! async fn test_enrich_artist() {
//!     let server = TestServer::spawn().await;
//!     let client = TestClient::new(server.base_url.clone());
//!
//!     let response = client.enrich_artist(ARTIST_1_ID, false).await;
//!     assert_eq!(response.status(), StatusCode::OK);
//! }
//! ```

mod agents;
mod client;
mod constants;
mod fixtures;
mod server;
mod streams;

// Public API - this is what tests import
#[allow(unused_imports)]
pub use agents::FakeAgent;
pub use client::TestClient;
pub use constants::*;
pub use server::TestServer;
#[allow(unused_imports)]
pub use streams::{connect_ws, wait_for_message, WsStream};
