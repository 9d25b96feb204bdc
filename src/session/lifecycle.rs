//! Per-session lifecycle state machine.

use std::fmt::{Display, Formatter};

use crate::{AppError, Result};

/// Lifecycle state of one engine session.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum SessionState {
    /// Connection upgraded; no engine yet.
    Created,
    /// Engine running and both directions bridged.
    Running,
    /// Teardown in progress.
    Closing,
    /// Terminal.
    Closed,
}

impl SessionState {
    /// Whether moving from `self` to `next` is a legal transition.
    #[must_use]
    pub fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Created, Self::Running | Self::Closed)
                | (Self::Running, Self::Closing)
                | (Self::Closing, Self::Closed)
        )
    }
}

impl Display for SessionState {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Created => f.write_str("created"),
            Self::Running => f.write_str("running"),
            Self::Closing => f.write_str("closing"),
            Self::Closed => f.write_str("closed"),
        }
    }
}

/// Tracks a session's state and rejects reentry.
#[derive(Debug)]
pub struct Lifecycle {
    state: SessionState,
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}

impl Lifecycle {
    /// Start in [`SessionState::Created`].
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: SessionState::Created,
        }
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Move to `next`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Session` if the transition is not allowed.
    pub fn advance(&mut self, next: SessionState) -> Result<()> {
        if !self.state.can_transition_to(next) {
            return Err(AppError::Session(format!(
                "invalid transition {} -> {next}",
                self.state
            )));
        }
        self.state = next;
        Ok(())
    }
}
