//! Service configuration: optional TOML file merged with CLI overrides.

use std::fs;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::engine::isa::DEFAULT_ISA_TOKEN;
use crate::{AppError, Result};

fn default_cpu_feature() -> String {
    DEFAULT_ISA_TOKEN.into()
}

fn default_bind_address() -> IpAddr {
    IpAddr::V4(Ipv4Addr::UNSPECIFIED)
}

fn default_http_port() -> u16 {
    8080
}

fn default_ws_path() -> String {
    "/ws".into()
}

/// Bridge configuration parsed from `config.toml`.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case", deny_unknown_fields)]
pub struct BridgeConfig {
    /// Engine base directory containing the `Linux`, `Windows` and `MacOS` builds.
    #[serde(default)]
    pub engine_dir: Option<PathBuf>,
    /// Instruction-set token selecting the engine build.
    #[serde(default = "default_cpu_feature")]
    pub cpu_feature: String,
    /// Address the HTTP listener binds to.
    #[serde(default = "default_bind_address")]
    pub bind_address: IpAddr,
    /// Port the HTTP listener binds to.
    #[serde(default = "default_http_port")]
    pub http_port: u16,
    /// Route that upgrades to a WebSocket engine session.
    #[serde(default = "default_ws_path")]
    pub ws_path: String,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            engine_dir: None,
            cpu_feature: default_cpu_feature(),
            bind_address: default_bind_address(),
            http_port: default_http_port(),
            ws_path: default_ws_path(),
        }
    }
}

/// Values supplied on the command line; each one wins over the file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigOverrides {
    /// `--engine-dir`
    pub engine_dir: Option<PathBuf>,
    /// `--cpu-feature`
    pub cpu_feature: Option<String>,
    /// `--bind`
    pub bind_address: Option<IpAddr>,
    /// `--port`
    pub http_port: Option<u16>,
}

impl BridgeConfig {
    /// Load configuration from a TOML file path.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if the file cannot be read or contains
    /// invalid TOML.
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .map_err(|err| AppError::Config(format!("failed to read config: {err}")))?;
        Self::from_toml_str(&raw)
    }

    /// Parse configuration from a TOML string.
    ///
    /// The engine directory may be left out here and supplied on the command
    /// line; call [`validate`](Self::validate) after applying overrides.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` on invalid TOML or unknown keys.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        Ok(toml::from_str(raw)?)
    }

    /// Apply command-line values on top of the file values.
    pub fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(dir) = overrides.engine_dir {
            self.engine_dir = Some(dir);
        }
        if let Some(token) = overrides.cpu_feature {
            self.cpu_feature = token;
        }
        if let Some(addr) = overrides.bind_address {
            self.bind_address = addr;
        }
        if let Some(port) = overrides.http_port {
            self.http_port = port;
        }
    }

    /// Check the merged configuration.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if the engine directory is missing, the
    /// instruction-set token is blank, or the WebSocket path does not start
    /// with `/`, contains route parameters or wildcards, or shadows `/health`.
    pub fn validate(&self) -> Result<()> {
        if self.engine_dir.is_none() {
            return Err(AppError::Config(
                "engine_dir is required (--engine-dir or config file)".into(),
            ));
        }

        if self.cpu_feature.trim().is_empty() {
            return Err(AppError::Config("cpu_feature must not be empty".into()));
        }

        if !self.ws_path.starts_with('/') || self.ws_path.len() < 2 {
            return Err(AppError::Config(format!(
                "ws_path must be an absolute route like /ws, got {:?}",
                self.ws_path
            )));
        }

        if self.ws_path.contains(['{', '}', '*'])
            || self.ws_path.split('/').any(|segment| segment.starts_with(':'))
        {
            return Err(AppError::Config(format!(
                "ws_path must be a literal route without parameters or wildcards, got {:?}",
                self.ws_path
            )));
        }

        if self.ws_path == "/health" {
            return Err(AppError::Config(
                "ws_path must not shadow the /health route".into(),
            ));
        }

        Ok(())
    }

    /// Engine base directory.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if no directory was configured.
    pub fn engine_dir(&self) -> Result<&Path> {
        self.engine_dir
            .as_deref()
            .ok_or_else(|| AppError::Config("engine_dir is not configured".into()))
    }

    /// Socket address the HTTP listener binds to.
    #[must_use]
    pub fn bind_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_address, self.http_port)
    }
}
