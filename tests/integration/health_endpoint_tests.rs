//! Integration tests for the plain HTTP routes.

use super::test_helpers::spawn_bridge;

#[tokio::test]
async fn health_returns_ok() {
    let bridge = spawn_bridge().await;

    let resp = reqwest::get(format!("http://{}/health", bridge.addr))
        .await
        .expect("health request");
    assert_eq!(resp.status(), reqwest::StatusCode::OK);
    assert_eq!(resp.text().await.expect("body"), "ok");
}

/// A plain GET on the WebSocket route is refused without starting an engine.
#[tokio::test]
async fn websocket_route_rejects_plain_http() {
    let bridge = spawn_bridge().await;

    let resp = reqwest::get(bridge.ws_url().replacen("ws://", "http://", 1))
        .await
        .expect("plain request");
    assert!(
        resp.status().is_client_error(),
        "unexpected status {}",
        resp.status()
    );
}

#[tokio::test]
async fn unknown_route_is_not_found() {
    let bridge = spawn_bridge().await;

    let resp = reqwest::get(format!("http://{}/engine", bridge.addr))
        .await
        .expect("request");
    assert_eq!(resp.status(), reqwest::StatusCode::NOT_FOUND);
}
