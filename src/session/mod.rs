//! Engine sessions: one client channel bridged to one engine process.

pub mod lifecycle;
pub mod manager;

pub use lifecycle::{Lifecycle, SessionState};
pub use manager::{run_session, CloseKind, SessionEnd};
