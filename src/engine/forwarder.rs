//! Engine-to-client stream forwarder.
//!
//! Reads newline-delimited lines from an engine's stdout through
//! [`EngineCodec`] and sends every non-empty line, in order, as one outbound
//! message on the client sink. Lines are not altered beyond the codec's
//! replacement of invalid UTF-8. The pump never escalates errors:
//! end of stream, a read failure and a closed client all simply stop it, and
//! the owning session performs the teardown.

use futures_util::{Sink, SinkExt, StreamExt};
use tokio::io::AsyncRead;
use tokio_util::codec::FramedRead;
use tracing::{debug, warn};

use crate::engine::codec::EngineCodec;

/// Why a pump stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ForwardOutcome {
    /// Engine stdout reached end of stream (process exited or was killed).
    EndOfStream,
    /// Reading engine stdout failed, or a line exceeded the codec limit.
    ReadFailed(String),
    /// The client sink rejected a message; the client is gone.
    ClientGone,
}

/// Counters reported when a pump stops.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForwardReport {
    /// Why the pump stopped.
    pub outcome: ForwardOutcome,
    /// Lines delivered to the client.
    pub forwarded: u64,
    /// Empty lines skipped.
    pub skipped: u64,
}

/// Copy engine output lines to `sink` until either side ends.
///
/// Returns the report together with the sink so the session can close the
/// client channel during teardown.
pub async fn pump<R, K>(session_id: &str, stdout: R, mut sink: K) -> (ForwardReport, K)
where
    R: AsyncRead + Unpin,
    K: Sink<String> + Unpin,
    K::Error: std::fmt::Display,
{
    let mut framed = FramedRead::new(stdout, EngineCodec::new());
    let mut forwarded = 0_u64;
    let mut skipped = 0_u64;

    let outcome = loop {
        match framed.next().await {
            None => {
                debug!(session_id, "forwarder: engine stdout closed");
                break ForwardOutcome::EndOfStream;
            }
            Some(Err(err)) => {
                warn!(session_id, error = %err, "forwarder: engine stdout read failed");
                break ForwardOutcome::ReadFailed(err.to_string());
            }
            Some(Ok(line)) => {
                if line.is_empty() {
                    skipped += 1;
                    continue;
                }
                debug!(session_id, line = %line, "engine -> client");
                if let Err(err) = sink.send(line).await {
                    debug!(session_id, error = %err, "forwarder: client send failed, stopping");
                    break ForwardOutcome::ClientGone;
                }
                forwarded += 1;
            }
        }
    };

    (
        ForwardReport {
            outcome,
            forwarded,
            skipped,
        },
        sink,
    )
}
