//! End-to-end tests for one bridged engine session: client messages reach
//! the engine as lines and engine lines come back as messages.

use super::test_helpers::{connect, recv_text, send, spawn_bridge};

#[tokio::test]
async fn isready_gets_readyok() {
    let bridge = spawn_bridge().await;
    let mut client = connect(&bridge).await;

    send(&mut client, "isready").await;
    assert_eq!(recv_text(&mut client).await, "readyok");
}

/// Messages sent back-to-back reach the engine in order and every reply
/// arrives in emission order.
#[tokio::test]
async fn messages_and_replies_keep_their_order() {
    let bridge = spawn_bridge().await;
    let mut client = connect(&bridge).await;

    for i in 0..20 {
        send(&mut client, &format!("position {i}")).await;
    }
    for i in 0..20 {
        assert_eq!(recv_text(&mut client).await, format!("echo:position {i}"));
    }
}

#[tokio::test]
async fn commands_are_trimmed_before_the_engine_sees_them() {
    let bridge = spawn_bridge().await;
    let mut client = connect(&bridge).await;

    send(&mut client, "  isready\t\n").await;
    assert_eq!(recv_text(&mut client).await, "readyok");
}

/// Blank and `\r`-only engine lines never become messages.
#[tokio::test]
async fn blank_engine_lines_are_not_forwarded() {
    let bridge = spawn_bridge().await;
    let mut client = connect(&bridge).await;

    send(&mut client, "burst").await;
    send(&mut client, "isready").await;

    assert_eq!(recv_text(&mut client).await, "line-1");
    assert_eq!(recv_text(&mut client).await, "line-2");
    assert_eq!(recv_text(&mut client).await, "line-3");
    assert_eq!(recv_text(&mut client).await, "readyok");
}

#[tokio::test]
async fn engine_starts_in_its_build_directory() {
    let bridge = spawn_bridge().await;
    let mut client = connect(&bridge).await;

    send(&mut client, "cwd").await;
    let reply = recv_text(&mut client).await;

    let expected = std::fs::canonicalize(bridge.engine.working_dir()).expect("canonical");
    assert_eq!(reply, format!("cwd {}", expected.display()));
}

/// Two clients get two engines and never see each other's traffic.
#[tokio::test]
async fn concurrent_sessions_are_isolated() {
    let bridge = spawn_bridge().await;
    let mut first = connect(&bridge).await;
    let mut second = connect(&bridge).await;

    send(&mut first, "from-first").await;
    send(&mut second, "from-second").await;

    assert_eq!(recv_text(&mut first).await, "echo:from-first");
    assert_eq!(recv_text(&mut second).await, "echo:from-second");

    send(&mut first, "pid").await;
    send(&mut second, "pid").await;
    let first_pid = recv_text(&mut first).await;
    let second_pid = recv_text(&mut second).await;
    assert_ne!(first_pid, second_pid, "each session owns its own process");
}
