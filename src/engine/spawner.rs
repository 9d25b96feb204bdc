//! Engine process spawner.
//!
//! Launches one engine process per session with:
//! - the working directory set to the executable's own directory,
//! - piped stdin/stdout and discarded stderr,
//! - `kill_on_drop(true)` so runtime shutdown never leaks processes.
//!
//! The returned [`EngineProcess`] owns the child; the [`EnginePipes`] go to
//! the two directions of the session. [`EngineProcess::terminate`] is the one
//! teardown path and a drop guard issues the kill if a session unwinds before
//! reaching it.

use std::io::ErrorKind;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tracing::{debug, info, warn};

use crate::engine::resolver::EngineBinary;
use crate::{AppError, Result};

/// Time allowed for a killed engine to be reaped.
pub const REAP_TIMEOUT: Duration = Duration::from_secs(5);

/// How a call to [`EngineProcess::terminate`] ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// The kill signal was delivered and the process was reaped.
    Killed,
    /// The process had already exited on its own.
    AlreadyExited(Option<i32>),
    /// The kill signal was delivered but the process was not reaped in time.
    Unreaped,
    /// `terminate` already ran for this process; nothing was sent.
    Repeated,
}

/// A running engine process, owned by one session.
#[derive(Debug)]
pub struct EngineProcess {
    child: Child,
    pid: Option<u32>,
    terminated: bool,
}

/// The engine's stdio pipes, handed out once at spawn time.
#[derive(Debug)]
pub struct EnginePipes {
    /// Client-to-engine direction.
    pub stdin: ChildStdin,
    /// Engine-to-client direction.
    pub stdout: ChildStdout,
}

/// Spawn a fresh engine process for `session_id`.
///
/// # Errors
///
/// - `AppError::Spawn("failed to spawn engine: …")` on OS spawn failure.
/// - `AppError::Spawn("failed to capture engine …")` if a pipe is missing.
pub fn spawn_engine(
    binary: &EngineBinary,
    session_id: &str,
) -> Result<(EngineProcess, EnginePipes)> {
    let mut cmd = Command::new(binary.path());
    cmd.current_dir(binary.working_dir())
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .kill_on_drop(true);

    let mut child = cmd.spawn().map_err(|err| {
        AppError::Spawn(format!(
            "failed to spawn engine {}: {err}",
            binary.path().display()
        ))
    })?;

    let stdin = child
        .stdin
        .take()
        .ok_or_else(|| AppError::Spawn("failed to capture engine stdin".into()))?;
    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| AppError::Spawn("failed to capture engine stdout".into()))?;

    let pid = child.id();
    info!(
        session_id,
        pid,
        cwd = %binary.working_dir().display(),
        "engine process started"
    );

    Ok((
        EngineProcess {
            child,
            pid,
            terminated: false,
        },
        EnginePipes { stdin, stdout },
    ))
}

impl EngineProcess {
    /// OS process id captured at spawn time.
    #[must_use]
    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    /// Whether [`terminate`](Self::terminate) has run.
    #[must_use]
    pub fn is_terminated(&self) -> bool {
        self.terminated
    }

    /// Force-kill the engine and reap it. Only the first call signals the
    /// process; later calls return [`Termination::Repeated`].
    ///
    /// A process that already exited is not an error.
    pub async fn terminate(&mut self) -> Termination {
        if self.terminated {
            return Termination::Repeated;
        }
        self.terminated = true;

        if let Ok(Some(status)) = self.child.try_wait() {
            debug!(pid = self.pid, ?status, "engine already exited");
            return Termination::AlreadyExited(status.code());
        }

        match self.child.start_kill() {
            Ok(()) => {}
            Err(err) if err.kind() == ErrorKind::InvalidInput => {
                debug!(pid = self.pid, %err, "engine exited before kill");
                return Termination::AlreadyExited(None);
            }
            Err(err) => {
                warn!(pid = self.pid, %err, "failed to kill engine process");
            }
        }

        match tokio::time::timeout(REAP_TIMEOUT, self.child.wait()).await {
            Ok(Ok(status)) => {
                debug!(pid = self.pid, status = %describe_exit(status), "engine reaped");
                Termination::Killed
            }
            Ok(Err(err)) => {
                warn!(pid = self.pid, %err, "error waiting for engine process");
                Termination::Unreaped
            }
            Err(_elapsed) => {
                warn!(pid = self.pid, "engine did not exit after kill");
                Termination::Unreaped
            }
        }
    }
}

impl Drop for EngineProcess {
    fn drop(&mut self) {
        if !self.terminated {
            // Unwinding or cancelled session: make sure the kill is still issued.
            let _ = self.child.start_kill();
        }
    }
}

/// Human-readable exit description.
#[must_use]
pub fn describe_exit(status: ExitStatus) -> String {
    if status.success() {
        "exited normally (code 0)".to_owned()
    } else {
        status.code().map_or_else(
            || "terminated by signal".to_owned(),
            |c| format!("exited with code {c}"),
        )
    }
}
