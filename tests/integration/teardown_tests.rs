//! Integration tests for session teardown: whichever side ends first, the
//! engine process and the client channel both go away, and only for that
//! session.

use super::test_helpers::{
    connect, engine_pid, expect_closed, process_alive, recv_text, send, spawn_bridge,
    spawn_bridge_with, wait_for_exit, FAKE_ENGINE,
};

#[tokio::test]
async fn client_close_kills_the_engine() {
    let bridge = spawn_bridge().await;
    let mut client = connect(&bridge).await;
    let pid = engine_pid(&mut client).await;
    assert!(process_alive(pid));

    client.close(None).await.expect("close");

    assert!(wait_for_exit(pid).await, "engine {pid} survived client close");
}

/// Dropping the TCP connection without a close frame still tears down.
#[tokio::test]
async fn abrupt_disconnect_kills_the_engine() {
    let bridge = spawn_bridge().await;
    let mut client = connect(&bridge).await;
    let pid = engine_pid(&mut client).await;

    drop(client);

    assert!(wait_for_exit(pid).await, "engine {pid} survived disconnect");
}

#[tokio::test]
async fn engine_exit_closes_the_client() {
    let bridge = spawn_bridge().await;
    let mut client = connect(&bridge).await;
    send(&mut client, "isready").await;
    assert_eq!(recv_text(&mut client).await, "readyok");

    send(&mut client, "quit").await;

    expect_closed(&mut client).await;
}

/// Ending one session leaves every other session and its engine untouched.
#[tokio::test]
async fn teardown_only_affects_its_own_session() {
    let bridge = spawn_bridge().await;
    let mut doomed = connect(&bridge).await;
    let mut survivor = connect(&bridge).await;
    let doomed_pid = engine_pid(&mut doomed).await;
    let survivor_pid = engine_pid(&mut survivor).await;

    doomed.close(None).await.expect("close");
    assert!(wait_for_exit(doomed_pid).await);

    assert!(process_alive(survivor_pid));
    send(&mut survivor, "isready").await;
    assert_eq!(recv_text(&mut survivor).await, "readyok");
}

/// A build that cannot be executed closes only the connection that tried
/// it; the server keeps accepting.
#[tokio::test]
async fn spawn_failure_closes_the_client() {
    let bridge = spawn_bridge_with(FAKE_ENGINE, 0o644).await;

    let mut first = connect(&bridge).await;
    expect_closed(&mut first).await;

    let mut second = connect(&bridge).await;
    expect_closed(&mut second).await;
}
