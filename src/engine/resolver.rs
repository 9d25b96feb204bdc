//! Startup-time engine binary resolution.
//!
//! Turns the configured engine base directory, the host OS and the requested
//! instruction-set token into one validated executable path. Every failure is
//! fatal for the service: resolution runs once, before the listener binds, and
//! the result is shared read-only by every session.

use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::engine::isa::{CpuProbe, InstructionSet};
use crate::platform::HostOs;
use crate::{AppError, Result};

/// File name prefix shared by every engine build.
pub const ENGINE_NAME: &str = "pikafish";

/// The single build name used on uniform-hardware platforms.
pub const UNIFORM_BUILD_NAME: &str = "pikafish-apple-silicon";

/// Resolved engine executable, fixed for the life of the process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineBinary {
    path: PathBuf,
    base_dir: PathBuf,
}

impl EngineBinary {
    /// Absolute or configured path to the executable.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Engine base directory the executable was resolved under.
    #[must_use]
    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Directory the engine process starts in: the executable's own directory,
    /// where its network weights and other resources live.
    #[must_use]
    pub fn working_dir(&self) -> &Path {
        self.path.parent().unwrap_or(&self.base_dir)
    }
}

/// Expected executable file name for `os` and `token`.
///
/// The token is lowercased. Uniform-hardware platforms ignore it.
#[must_use]
pub fn binary_file_name(os: HostOs, token: &str) -> String {
    if os.is_uniform_hardware() {
        return UNIFORM_BUILD_NAME.to_owned();
    }
    format!(
        "{ENGINE_NAME}-{}{}",
        token.trim().to_ascii_lowercase(),
        os.exe_suffix()
    )
}

/// Resolve and validate the engine executable.
///
/// Checks, in order: the base directory exists, the platform build exists,
/// and (except on uniform-hardware platforms) the host CPU supports the
/// requested instruction set.
///
/// # Errors
///
/// - `AppError::NotFound` if `base_dir` or the resolved executable is missing.
/// - `AppError::Capability` if the token is unknown or the CPU lacks a
///   required feature.
pub fn resolve(
    base_dir: &Path,
    os: HostOs,
    token: &str,
    cpu: &dyn CpuProbe,
) -> Result<EngineBinary> {
    if !base_dir.is_dir() {
        return Err(AppError::NotFound(format!(
            "engine directory not found: {}",
            base_dir.display()
        )));
    }

    if os.is_uniform_hardware() {
        info!(%os, token, "ignoring instruction set on uniform-hardware platform");
    }

    let path = base_dir
        .join(os.subdir())
        .join(binary_file_name(os, token));

    if !path.exists() {
        return Err(AppError::NotFound(format!(
            "engine executable not found: {}",
            path.display()
        )));
    }

    if !os.is_uniform_hardware() {
        let isa: InstructionSet = token.parse()?;
        if !isa.is_supported_by(cpu) {
            let missing: Vec<String> = isa
                .required_features()
                .iter()
                .filter(|&&f| !cpu.has(f))
                .map(ToString::to_string)
                .collect();
            warn!(%isa, missing = ?missing, "host cpu lacks required features");
            return Err(AppError::Capability(format!(
                "current cpu does not support instruction set {isa} (missing {})",
                missing.join(", ")
            )));
        }
    }

    info!(path = %path.display(), %os, "engine executable resolved");
    Ok(EngineBinary {
        path,
        base_dir: base_dir.to_path_buf(),
    })
}
