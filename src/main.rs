#![forbid(unsafe_code)]

//! `engine-bridge` server binary.
//!
//! Resolves the engine build for this host once, then serves WebSocket
//! sessions that each drive a dedicated engine process.

use std::net::IpAddr;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, ValueEnum};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

use engine_bridge::config::{BridgeConfig, ConfigOverrides};
use engine_bridge::engine::isa::HostCpu;
use engine_bridge::engine::resolver;
use engine_bridge::gateway::{self, AppState};
use engine_bridge::platform::HostOs;
use engine_bridge::{AppError, Result};

#[derive(Debug, Copy, Clone, Eq, PartialEq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Parser)]
#[command(
    name = "engine-bridge",
    about = "WebSocket server giving each client its own pikafish engine",
    version,
    long_about = None
)]
struct Cli {
    /// Engine base directory (contains `Linux`, `Windows`, `MacOS`).
    #[arg(long, visible_alias = "pikafish")]
    engine_dir: Option<PathBuf>,

    /// CPU feature level of the build to run:
    /// vnni512 > avx512 > avx512f > avxvnni > bmi2 > avx2 > sse41-popcnt.
    #[arg(long)]
    cpu_feature: Option<String>,

    /// Optional TOML configuration file; command-line values win.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Address to bind the HTTP listener to.
    #[arg(long)]
    bind: Option<IpAddr>,

    /// Port to bind the HTTP listener to.
    #[arg(long)]
    port: Option<u16>,

    /// Log output format (text or json).
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,
}

fn main() -> Result<()> {
    let args = Cli::parse();
    init_tracing(args.log_format)?;
    info!("engine-bridge bootstrap");

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|err| AppError::Config(format!("failed to build tokio runtime: {err}")))?
        .block_on(run(args))
}

async fn run(args: Cli) -> Result<()> {
    // ── Load configuration ──────────────────────────────
    let mut config = match &args.config {
        Some(path) => BridgeConfig::load_from_path(path)?,
        None => BridgeConfig::default(),
    };
    config.apply_overrides(ConfigOverrides {
        engine_dir: args.engine_dir,
        cpu_feature: args.cpu_feature,
        bind_address: args.bind,
        http_port: args.port,
    });
    config.validate()?;
    info!(?config, "configuration loaded");

    // ── Resolve the engine build ────────────────────────
    let engine = resolve_engine(&config).inspect_err(|err| {
        error!(%err, fatal = err.is_fatal_startup(), "cannot start: engine resolution failed");
    })?;

    let state = Arc::new(AppState {
        config: Arc::new(config),
        engine: Arc::new(engine),
    });

    // ── Serve ───────────────────────────────────────────
    let ct = CancellationToken::new();
    let mut server = tokio::spawn(gateway::serve(state, ct.clone()));

    let early = tokio::select! {
        () = shutdown_signal() => {
            info!("shutdown signal received");
            ct.cancel();
            None
        }
        finished = &mut server => Some(finished),
    };
    let finished = match early {
        Some(finished) => finished,
        None => server.await,
    };

    match finished {
        Ok(Ok(())) => {}
        Ok(Err(err)) => {
            error!(%err, "server failed");
            return Err(err);
        }
        Err(err) => return Err(AppError::Io(format!("server task failed: {err}"))),
    }

    info!("engine-bridge shut down");
    Ok(())
}

fn resolve_engine(config: &BridgeConfig) -> Result<engine_bridge::engine::EngineBinary> {
    let os = HostOs::current()?;
    resolver::resolve(config.engine_dir()?, os, &config.cpu_feature, &HostCpu)
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => {}
                    _ = sigterm.recv() => {}
                }
            }
            Err(err) => {
                tracing::warn!(%err, "failed to register SIGTERM handler, using ctrl-c only");
                let _ = ctrl_c.await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        if let Err(err) = ctrl_c.await {
            tracing::error!(%err, "ctrl-c signal handler failed");
        }
    }
}

fn init_tracing(log_format: LogFormat) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = fmt().with_env_filter(env_filter);

    match log_format {
        LogFormat::Text => subscriber
            .try_init()
            .map_err(|err| AppError::Config(format!("failed to init tracing: {err}")))?,
        LogFormat::Json => subscriber
            .json()
            .try_init()
            .map_err(|err| AppError::Config(format!("failed to init tracing: {err}")))?,
    }

    Ok(())
}
