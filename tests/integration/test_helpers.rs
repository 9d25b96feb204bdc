//! Shared helpers for bridge integration tests.
//!
//! Installs a scripted fake engine into a temporary engine directory, serves
//! the bridge on an ephemeral port, and wraps the WebSocket client calls the
//! tests repeat.

use std::os::unix::fs::PermissionsExt;
use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use tempfile::TempDir;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;

use engine_bridge::config::BridgeConfig;
use engine_bridge::engine::isa::{CpuFeature, FixedCpu};
use engine_bridge::engine::resolver::{binary_file_name, resolve};
use engine_bridge::engine::EngineBinary;
use engine_bridge::gateway::{serve_with_listener, AppState};
use engine_bridge::platform::HostOs;

pub type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// How long any single expectation may wait.
pub const WAIT: Duration = Duration::from_secs(5);

/// Line-protocol stand-in for the real engine.
///
/// - `isready` answers `readyok`
/// - `pid` answers `pid <process id>`
/// - `cwd` answers `cwd <working directory>`
/// - `burst` answers three lines with blank lines around them
/// - `quit` exits
/// - anything else is echoed back as `echo:<line>`
pub const FAKE_ENGINE: &str = "#!/bin/sh
while IFS= read -r line; do
  case \"$line\" in
    isready) echo readyok ;;
    pid) echo \"pid $$\" ;;
    cwd) echo \"cwd $(pwd)\" ;;
    burst) printf '\\nline-1\\n\\n\\nline-2\\n\\r\\nline-3\\n' ;;
    quit) exit 0 ;;
    *) echo \"echo:$line\" ;;
  esac
done
";

/// A running bridge and the engine directory it serves.
pub struct Bridge {
    pub addr: String,
    pub ct: CancellationToken,
    pub engine: EngineBinary,
    _engine_dir: TempDir,
}

impl Bridge {
    pub fn ws_url(&self) -> String {
        format!("ws://{}/ws", self.addr)
    }
}

impl Drop for Bridge {
    fn drop(&mut self) {
        self.ct.cancel();
    }
}

/// Install `script` as the Linux `bmi2` build with the given file mode.
pub fn install_engine(script: &str, mode: u32) -> (TempDir, EngineBinary) {
    let temp = tempfile::tempdir().expect("tempdir");
    let dir = temp.path().join(HostOs::Linux.subdir());
    std::fs::create_dir_all(&dir).expect("platform dir");
    let path = dir.join(binary_file_name(HostOs::Linux, "bmi2"));
    std::fs::write(&path, script).expect("write engine");
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(mode)).expect("chmod");

    let binary = resolve(
        temp.path(),
        HostOs::Linux,
        "bmi2",
        &FixedCpu::new(&[CpuFeature::Bmi2]),
    )
    .expect("resolve fake engine");
    (temp, binary)
}

/// Serve the bridge for `script` on `127.0.0.1:0`.
pub async fn spawn_bridge_with(script: &str, mode: u32) -> Bridge {
    let (engine_dir, engine) = install_engine(script, mode);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind ephemeral");
    let addr = listener.local_addr().expect("local addr");

    let config = BridgeConfig {
        engine_dir: Some(engine_dir.path().to_path_buf()),
        http_port: addr.port(),
        ..BridgeConfig::default()
    };
    let state = Arc::new(AppState {
        config: Arc::new(config),
        engine: Arc::new(engine.clone()),
    });

    let ct = CancellationToken::new();
    let server_ct = ct.clone();
    tokio::spawn(async move {
        let _ = serve_with_listener(listener, state, server_ct).await;
    });

    Bridge {
        addr: addr.to_string(),
        ct,
        engine,
        _engine_dir: engine_dir,
    }
}

/// Serve the bridge with [`FAKE_ENGINE`].
pub async fn spawn_bridge() -> Bridge {
    spawn_bridge_with(FAKE_ENGINE, 0o755).await
}

pub async fn connect(bridge: &Bridge) -> Client {
    let (client, _response) = tokio_tungstenite::connect_async(bridge.ws_url())
        .await
        .expect("websocket connect");
    client
}

pub async fn send(client: &mut Client, text: &str) {
    use futures_util::SinkExt;
    client
        .send(Message::text(text.to_owned()))
        .await
        .expect("send message");
}

/// Next text message; panics on close or timeout.
pub async fn recv_text(client: &mut Client) -> String {
    let next = async {
        loop {
            match client.next().await {
                Some(Ok(Message::Text(text))) => return text.to_string(),
                Some(Ok(Message::Close(frame))) => panic!("closed early: {frame:?}"),
                Some(Ok(_)) => {}
                Some(Err(err)) => panic!("client error: {err}"),
                None => panic!("stream ended early"),
            }
        }
    };
    tokio::time::timeout(WAIT, next)
        .await
        .expect("timed out waiting for a message")
}

/// Wait for the server to close the channel; panics if a text message
/// arrives first or nothing happens in time.
pub async fn expect_closed(client: &mut Client) {
    let closed = async {
        loop {
            match client.next().await {
                None | Some(Err(_) | Ok(Message::Close(_))) => return,
                Some(Ok(Message::Text(text))) => panic!("unexpected message: {text}"),
                Some(Ok(_)) => {}
            }
        }
    };
    tokio::time::timeout(WAIT, closed)
        .await
        .expect("timed out waiting for close");
}

/// Ask the fake engine for its process id.
pub async fn engine_pid(client: &mut Client) -> u32 {
    send(client, "pid").await;
    let reply = recv_text(client).await;
    reply
        .strip_prefix("pid ")
        .and_then(|pid| pid.parse().ok())
        .unwrap_or_else(|| panic!("unexpected pid reply: {reply}"))
}

/// Whether a process with `pid` exists (zombies included).
pub fn process_alive(pid: u32) -> bool {
    std::process::Command::new("kill")
        .args(["-0", &pid.to_string()])
        .stderr(std::process::Stdio::null())
        .status()
        .is_ok_and(|status| status.success())
}

/// Poll until `pid` is gone; returns `false` on timeout.
pub async fn wait_for_exit(pid: u32) -> bool {
    for _ in 0..50 {
        if !process_alive(pid) {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    false
}
