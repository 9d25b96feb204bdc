//! Engine session manager.
//!
//! One session pairs one upgraded client connection with one dedicated engine
//! process. The session task runs the client-to-engine receive loop while a
//! second task runs the [`pump`] for engine-to-client traffic. Whichever
//! direction ends first ends the session, and [`run_session`] always finishes
//! with the same teardown: kill the engine once, release its pipes, close the
//! client channel.

use std::time::Duration;

use axum::extract::ws::{close_code, CloseFrame, Message, WebSocket};
use futures_util::{future, Sink, SinkExt, Stream, StreamExt};
use tokio::io::AsyncWrite;
use tokio::task::JoinHandle;
use tokio_util::codec::FramedWrite;
use tracing::{debug, error, info, info_span, warn, Instrument};

use crate::engine::codec::EngineCodec;
use crate::engine::forwarder::{pump, ForwardOutcome, ForwardReport};
use crate::engine::spawner::{spawn_engine, EnginePipes, EngineProcess, Termination};
use crate::engine::EngineBinary;
use crate::session::lifecycle::{Lifecycle, SessionState};
use crate::Result;

/// Time the forwarder gets to drain after the engine is killed.
const PUMP_DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

/// How a client channel closed; used only for logging.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum CloseKind {
    /// Normal or going-away close, or the stream simply ended.
    Graceful,
    /// Any other close code or a transport error.
    Abnormal,
}

/// Which side ended a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEnd {
    /// The client closed or its connection failed.
    Client(CloseKind),
    /// Writing to engine stdin failed.
    EngineInputFailed(String),
    /// Engine stdout ended or could not be read.
    EngineOutputEnded(ForwardOutcome),
}

/// Classify a close frame as graceful or abnormal.
#[must_use]
pub fn classify_close(frame: Option<&CloseFrame>) -> CloseKind {
    match frame {
        None => CloseKind::Graceful,
        Some(f) if f.code == close_code::NORMAL || f.code == close_code::AWAY => {
            CloseKind::Graceful
        }
        Some(_) => CloseKind::Abnormal,
    }
}

/// Client-to-engine loop.
///
/// Every text message (or UTF-8 binary message) is trimmed and written to
/// `engine_in` as exactly one `\n`-terminated line, in arrival order. Ping
/// and pong frames are ignored. Returns when the client closes, the client
/// stream fails, or an engine write fails.
pub async fn receive_loop<S, W>(
    session_id: &str,
    inbound: &mut S,
    engine_in: &mut FramedWrite<W, EngineCodec>,
) -> SessionEnd
where
    S: Stream<Item = std::result::Result<Message, axum::Error>> + Unpin,
    W: AsyncWrite + Unpin,
{
    loop {
        let message = match inbound.next().await {
            None => {
                info!(session_id, "client stream ended");
                return SessionEnd::Client(CloseKind::Graceful);
            }
            Some(Err(err)) => {
                warn!(session_id, %err, "error reading client message");
                return SessionEnd::Client(CloseKind::Abnormal);
            }
            Some(Ok(message)) => message,
        };

        let command = match message {
            Message::Text(text) => text.as_str().trim().to_owned(),
            Message::Binary(bytes) => match std::str::from_utf8(&bytes) {
                Ok(text) => text.trim().to_owned(),
                Err(err) => {
                    warn!(session_id, %err, "skipping non-utf8 binary message");
                    continue;
                }
            },
            Message::Ping(_) | Message::Pong(_) => continue,
            Message::Close(frame) => {
                let kind = classify_close(frame.as_ref());
                match kind {
                    CloseKind::Graceful => info!(session_id, "client disconnected"),
                    CloseKind::Abnormal => warn!(
                        session_id,
                        code = frame.as_ref().map(|f| f.code),
                        "client closed abnormally"
                    ),
                }
                return SessionEnd::Client(kind);
            }
        };

        debug!(session_id, command = %command, "client -> engine");
        if let Err(err) = engine_in.send(command).await {
            warn!(session_id, %err, "failed to write command to engine");
            return SessionEnd::EngineInputFailed(err.to_string());
        }
    }
}

/// Run one engine session over an upgraded WebSocket.
///
/// # Errors
///
/// Returns `AppError::Spawn` if the engine could not be launched; the client
/// channel is closed and the session goes straight to `Closed`.
pub async fn run_session(socket: WebSocket, engine: &EngineBinary) -> Result<SessionEnd> {
    let session_id = uuid::Uuid::new_v4().to_string();
    let span = info_span!("engine_session", session_id = %session_id);
    drive_session(session_id, socket, engine)
        .instrument(span)
        .await
}

async fn drive_session(
    session_id: String,
    mut socket: WebSocket,
    engine: &EngineBinary,
) -> Result<SessionEnd> {
    let mut lifecycle = Lifecycle::new();
    info!(session_id = %session_id, "client connected");

    let (mut process, pipes) = match spawn_engine(engine, &session_id) {
        Ok(spawned) => spawned,
        Err(err) => {
            advance(&mut lifecycle, SessionState::Closed);
            close_client(&session_id, &mut socket).await;
            return Err(err);
        }
    };

    let EnginePipes { stdin, stdout } = pipes;
    advance(&mut lifecycle, SessionState::Running);

    let (ws_tx, mut ws_rx) = socket.split();
    let client_sink = ws_tx.with(|line: String| {
        future::ready(Ok::<Message, axum::Error>(Message::Text(line.into())))
    });

    let pump_id = session_id.clone();
    let mut forwarder =
        tokio::spawn(async move { pump(&pump_id, stdout, client_sink).await }.in_current_span());
    let mut engine_in = FramedWrite::new(stdin, EngineCodec::new());

    // `drained` is `Some` once the forwarder task has been joined.
    let (end, drained) = tokio::select! {
        end = receive_loop(&session_id, &mut ws_rx, &mut engine_in) => (end, None),
        joined = &mut forwarder => {
            let outcome = match &joined {
                Ok((report, _)) => report.outcome.clone(),
                Err(err) => ForwardOutcome::ReadFailed(err.to_string()),
            };
            info!(session_id = %session_id, outcome = ?outcome, "engine output ended");
            (SessionEnd::EngineOutputEnded(outcome), Some(joined.ok()))
        }
    };

    // Teardown: the single exit path for a running session.
    advance(&mut lifecycle, SessionState::Closing);
    drop(engine_in);
    log_termination(&session_id, &mut process).await;

    let drained = match drained {
        Some(done) => done,
        None => drain_forwarder(&session_id, forwarder).await,
    };
    if let Some((report, mut sink)) = drained {
        debug!(
            session_id = %session_id,
            forwarded = report.forwarded,
            skipped = report.skipped,
            "forwarder finished"
        );
        close_sink(&session_id, &mut sink).await;
    }
    drop(ws_rx);

    advance(&mut lifecycle, SessionState::Closed);
    info!(session_id = %session_id, end = ?end, "session closed");
    Ok(end)
}

async fn log_termination(session_id: &str, process: &mut EngineProcess) {
    let pid = process.pid();
    match process.terminate().await {
        Termination::Killed => info!(session_id, pid, "engine process terminated"),
        Termination::AlreadyExited(code) => {
            info!(session_id, pid, code, "engine process had already exited");
        }
        Termination::Unreaped => warn!(session_id, pid, "engine process may still be running"),
        Termination::Repeated => debug!(session_id, pid, "engine already terminated"),
    }
}

async fn drain_forwarder<K>(
    session_id: &str,
    mut forwarder: JoinHandle<(ForwardReport, K)>,
) -> Option<(ForwardReport, K)> {
    match tokio::time::timeout(PUMP_DRAIN_TIMEOUT, &mut forwarder).await {
        Ok(Ok(done)) => Some(done),
        Ok(Err(err)) => {
            warn!(session_id, %err, "forwarder task failed");
            None
        }
        Err(_elapsed) => {
            warn!(session_id, "forwarder did not stop after engine kill, aborting");
            forwarder.abort();
            None
        }
    }
}

async fn close_sink<K>(session_id: &str, sink: &mut K)
where
    K: Sink<String> + Unpin,
    K::Error: std::fmt::Display,
{
    if let Err(err) = sink.close().await {
        debug!(session_id, %err, "client channel already closed");
    }
}

async fn close_client(session_id: &str, socket: &mut WebSocket) {
    if let Err(err) = SinkExt::close(socket).await {
        debug!(session_id, %err, "client channel already closed");
    }
}

fn advance(lifecycle: &mut Lifecycle, next: SessionState) {
    if let Err(err) = lifecycle.advance(next) {
        error!(%err, "session lifecycle violation");
    }
}
