//! End-to-end tests for the background enrichment queue

mod common;

use common::{connect_ws, wait_for_message, TestClient, TestServer, FIXTURE_ENTITY_COUNT};
use futures::SinkExt;
use reqwest::StatusCode;
use serde_json::{json, Value};
use tokio_tungstenite::tungstenite::Message;

#[tokio::test]
async fn test_idle_queue_status() {
    let server = TestServer::spawn().await;
    let client = TestClient::new(server.base_url.clone());

    let response = client.queue_status().await;
    assert_eq!(response.status(), StatusCode::OK);

    let status: Value = response.json().await.unwrap();
    assert_eq!(status["state"], "idle");
    assert_eq!(status["processed"], 0);
    assert!(status["current"].is_null());
}

#[tokio::test]
async fn test_controls_on_idle_queue_conflict() {
    let server = TestServer::spawn().await;
    let client = TestClient::new(server.base_url.clone());

    for action in ["pause", "resume", "cancel"] {
        let response = client.queue_control(action).await;
        assert_eq!(response.status(), StatusCode::CONFLICT, "action {}", action);
    }
}

#[tokio::test]
async fn test_queue_processes_every_pending_entity() {
    let server = TestServer::spawn().await;
    let client = TestClient::new(server.base_url.clone());
    let mut ws = connect_ws(&server.base_url).await;
    wait_for_message(&mut ws, "connected")
        .await
        .expect("Did not receive connected");

    let response = client.queue_start(false).await;
    assert_eq!(response.status(), StatusCode::OK);

    let started = wait_for_message(&mut ws, "queue:started")
        .await
        .expect("Did not receive queue:started");
    assert_eq!(started["data"]["totalPending"], FIXTURE_ENTITY_COUNT);
    assert_eq!(started["data"]["pendingArtists"], 2);
    assert_eq!(started["data"]["pendingAlbums"], 2);

    let completed = wait_for_message(&mut ws, "queue:completed")
        .await
        .expect("Did not receive queue:completed");
    assert_eq!(completed["data"]["processed"], FIXTURE_ENTITY_COUNT);

    let status: Value = client.queue_status().await.json().await.unwrap();
    assert_eq!(status["state"], "idle");

    for id in [common::ARTIST_1_ID, common::FLAKY_ARTIST_ID] {
        let artist = server.store.get_artist(id).unwrap().unwrap();
        assert!(artist.bio.is_some(), "{} has no bio", id);
    }
    for id in [common::ALBUM_1_ID, common::ALBUM_2_ID] {
        let album = server.store.get_album(id).unwrap().unwrap();
        assert!(album.cover.is_some(), "{} has no cover", id);
    }
}

#[tokio::test]
async fn test_fresh_entities_are_not_queued_again() {
    let server = TestServer::spawn().await;
    let client = TestClient::new(server.base_url.clone());
    let mut ws = connect_ws(&server.base_url).await;
    wait_for_message(&mut ws, "connected").await.unwrap();

    client.queue_start(false).await;
    wait_for_message(&mut ws, "queue:completed")
        .await
        .expect("First session did not complete");

    let response = client.queue_start(false).await;
    assert_eq!(response.status(), StatusCode::OK);
    let completed = wait_for_message(&mut ws, "queue:completed")
        .await
        .expect("Second session did not complete");
    assert_eq!(completed["data"]["processed"], 0);
}

#[tokio::test]
async fn test_queue_control_over_websocket() {
    let server = TestServer::spawn().await;
    let mut ws = connect_ws(&server.base_url).await;

    ws.send(Message::Text(json!({"type": "queue:status"}).to_string().into()))
        .await
        .unwrap();
    let status = wait_for_message(&mut ws, "queue:status")
        .await
        .expect("Did not receive queue:status");
    assert_eq!(status["data"]["state"], "idle");

    ws.send(Message::Text(json!({"type": "queue:pause"}).to_string().into()))
        .await
        .unwrap();
    let error = wait_for_message(&mut ws, "error")
        .await
        .expect("Pausing an idle queue should fail");
    assert_eq!(error["data"]["code"], "not_running");

    ws.send(Message::Text(
        json!({"type": "queue:start", "payload": {"forceRefresh": true}})
            .to_string()
            .into(),
    ))
    .await
    .unwrap();
    let completed = wait_for_message(&mut ws, "queue:completed")
        .await
        .expect("Did not receive queue:completed");
    assert_eq!(completed["data"]["processed"], FIXTURE_ENTITY_COUNT);
}
