//! Host operating system classification.
//!
//! Engine builds are shipped per platform in fixed subdirectories of the
//! engine base directory. `HostOs` maps the running OS to that layout and
//! records which platform has uniform hardware (a single build for every CPU).

use std::fmt::{Display, Formatter};

use crate::{AppError, Result};

/// Operating systems that have engine builds.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum HostOs {
    /// Linux; one build per instruction set.
    Linux,
    /// Windows; one `.exe` build per instruction set.
    Windows,
    /// macOS; a single Apple Silicon build.
    MacOs,
}

impl HostOs {
    /// Classify the operating system this binary was compiled for.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Platform` when the OS has no engine build.
    pub fn current() -> Result<Self> {
        Self::from_name(std::env::consts::OS)
    }

    /// Classify an OS by its `std::env::consts::OS` name.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Platform` for any name other than `linux`,
    /// `windows` or `macos`.
    pub fn from_name(name: &str) -> Result<Self> {
        match name {
            "linux" => Ok(Self::Linux),
            "windows" => Ok(Self::Windows),
            "macos" => Ok(Self::MacOs),
            other => Err(AppError::Platform(format!(
                "unsupported operating system: {other}"
            ))),
        }
    }

    /// Subdirectory of the engine base directory holding this platform's builds.
    #[must_use]
    pub fn subdir(self) -> &'static str {
        match self {
            Self::Linux => "Linux",
            Self::Windows => "Windows",
            Self::MacOs => "MacOS",
        }
    }

    /// Executable file extension, including the dot, or empty.
    #[must_use]
    pub fn exe_suffix(self) -> &'static str {
        match self {
            Self::Windows => ".exe",
            Self::Linux | Self::MacOs => "",
        }
    }

    /// `true` where a single build serves every host; the instruction-set
    /// token is ignored and no CPU check runs.
    #[must_use]
    pub fn is_uniform_hardware(self) -> bool {
        matches!(self, Self::MacOs)
    }
}

impl Display for HostOs {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Linux => f.write_str("linux"),
            Self::Windows => f.write_str("windows"),
            Self::MacOs => f.write_str("macos"),
        }
    }
}
