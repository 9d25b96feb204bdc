//! Error types shared across the application.

use std::fmt::{Display, Formatter};

/// Shared application result type.
pub type Result<T> = std::result::Result<T, AppError>;

/// Application error enumeration covering all domain failure modes.
#[derive(Debug)]
pub enum AppError {
    /// Configuration parsing or validation failure.
    Config(String),
    /// Host operating system has no engine build.
    Platform(String),
    /// Engine directory or binary does not exist.
    NotFound(String),
    /// Instruction-set token is unknown or unsupported by the host CPU.
    Capability(String),
    /// Engine process could not be launched.
    Spawn(String),
    /// Engine line stream framing failure.
    Engine(String),
    /// Session lifecycle was driven through an invalid transition.
    Session(String),
    /// File-system, socket, or pipe I/O failure.
    Io(String),
}

impl Display for AppError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Config(msg) => write!(f, "config: {msg}"),
            Self::Platform(msg) => write!(f, "platform: {msg}"),
            Self::NotFound(msg) => write!(f, "not found: {msg}"),
            Self::Capability(msg) => write!(f, "capability: {msg}"),
            Self::Spawn(msg) => write!(f, "spawn: {msg}"),
            Self::Engine(msg) => write!(f, "engine: {msg}"),
            Self::Session(msg) => write!(f, "session: {msg}"),
            Self::Io(msg) => write!(f, "io: {msg}"),
        }
    }
}

impl std::error::Error for AppError {}

impl From<toml::de::Error> for AppError {
    fn from(err: toml::de::Error) -> Self {
        Self::Config(format!("invalid config: {err}"))
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl AppError {
    /// Whether this error belongs to the startup class that aborts the whole service.
    #[must_use]
    pub fn is_fatal_startup(&self) -> bool {
        matches!(
            self,
            Self::Config(_) | Self::Platform(_) | Self::NotFound(_) | Self::Capability(_)
        )
    }
}
