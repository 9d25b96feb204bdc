#![forbid(unsafe_code)]

//! `engine-bridge-ctl`: command-line client for a running `engine-bridge`.
//!
//! Opens one WebSocket session (and so one engine process), exchanges a few
//! protocol lines and disconnects, which makes the server kill the engine.

use std::io::Write;
use std::time::Duration;

use clap::{Parser, Subcommand, ValueEnum};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;
type CtlResult<T> = std::result::Result<T, Box<dyn std::error::Error>>;

#[derive(Debug, Parser)]
#[command(
    name = "engine-bridge-ctl",
    about = "Client for an engine-bridge server",
    version,
    long_about = None
)]
struct Cli {
    /// WebSocket URL of the bridge.
    #[arg(long, default_value = "ws://127.0.0.1:8080/ws")]
    url: String,

    /// Seconds to wait for the engine before giving up.
    #[arg(long, default_value_t = 10)]
    timeout: u64,

    #[command(subcommand)]
    command: Command,
}

/// Engine handshake dialect.
#[derive(Debug, Copy, Clone, Eq, PartialEq, ValueEnum)]
enum Protocol {
    /// Universal Chess Interface.
    Uci,
    /// Universal Chinese Chess Interface.
    Ucci,
}

impl Protocol {
    fn handshake(self) -> &'static str {
        match self {
            Self::Uci => "uci",
            Self::Ucci => "ucci",
        }
    }

    fn ready_token(self) -> &'static str {
        match self {
            Self::Uci => "uciok",
            Self::Ucci => "ucciok",
        }
    }

    /// Option name from an `option ...` line.
    fn option_name(self, line: &str) -> Option<String> {
        let rest = line.strip_prefix("option ")?;
        let rest = match self {
            Self::Uci => rest.strip_prefix("name ")?,
            Self::Ucci => rest,
        };
        let name = rest.split(" type ").next().unwrap_or(rest).trim();
        (!name.is_empty()).then(|| name.to_owned())
    }
}

/// Engine identity and options gathered during a handshake.
#[derive(Debug, Default, PartialEq, Eq)]
struct Handshake {
    engine_name: Option<String>,
    options: Vec<String>,
}

impl Handshake {
    /// Record one engine line. Returns `true` once the ready token arrives.
    fn observe(&mut self, protocol: Protocol, line: &str) -> bool {
        if line == protocol.ready_token() {
            return true;
        }
        if let Some(name) = line.strip_prefix("id name ") {
            self.engine_name = Some(name.to_owned());
        } else if let Some(option) = protocol.option_name(line) {
            self.options.push(option);
        }
        false
    }

    fn print(&self, out: &mut impl Write, protocol: Protocol) -> std::io::Result<()> {
        writeln!(out, "protocol: {}", protocol.handshake())?;
        writeln!(
            out,
            "engine:   {}",
            self.engine_name.as_deref().unwrap_or("(unnamed)")
        )?;
        writeln!(out, "options:  {}", self.options.len())?;
        for option in &self.options {
            writeln!(out, "  {option}")?;
        }
        Ok(())
    }
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the protocol handshake and list the engine's options.
    Probe {
        /// Handshake dialect.
        #[arg(long, value_enum, default_value_t = Protocol::Uci)]
        protocol: Protocol,
    },

    /// Send commands and print replies until a terminating line.
    Send {
        /// Commands, one message each, sent in order.
        #[arg(required = true)]
        commands: Vec<String>,

        /// Stop after a reply starting with this prefix.
        #[arg(long, default_value = "bestmove")]
        until: String,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let args = Cli::parse();

    if let Err(err) = run(args).await {
        eprintln!("Error: {err}");
        std::process::exit(1);
    }
}

async fn run(args: Cli) -> CtlResult<()> {
    let (mut socket, _response) = tokio_tungstenite::connect_async(args.url.as_str())
        .await
        .map_err(|err| format!("failed to connect to {}: {err}", args.url))?;
    let limit = Duration::from_secs(args.timeout);

    let result = match args.command {
        Command::Probe { protocol } => probe(&mut socket, protocol, limit)
            .await
            .and_then(|handshake| {
                handshake
                    .print(&mut std::io::stdout(), protocol)
                    .map_err(Into::into)
            }),
        Command::Send { commands, until } => {
            send(&mut socket, &commands, &until, limit, &mut std::io::stdout()).await
        }
    };

    // Closing the session makes the server kill the engine.
    let _ = socket.close(None).await;
    result
}

async fn probe(socket: &mut Socket, protocol: Protocol, limit: Duration) -> CtlResult<Handshake> {
    socket.send(Message::text(protocol.handshake().to_owned())).await?;

    let mut handshake = Handshake::default();
    let collect = async {
        while let Some(line) = next_line(socket).await? {
            if handshake.observe(protocol, &line) {
                return Ok(true);
            }
        }
        CtlResult::Ok(false)
    };
    let finished = tokio::time::timeout(limit, collect).await;

    match finished {
        Ok(Ok(true)) => Ok(handshake),
        Ok(Ok(false)) => Err("engine closed before completing the handshake".into()),
        Ok(Err(err)) => Err(err),
        Err(_) => Err(format!("no {} within {limit:?}", protocol.ready_token()).into()),
    }
}

async fn send(
    socket: &mut Socket,
    commands: &[String],
    until: &str,
    limit: Duration,
    out: &mut impl Write,
) -> CtlResult<()> {
    for command in commands {
        socket.send(Message::text(command.clone())).await?;
    }

    let collect = async {
        while let Some(line) = next_line(socket).await? {
            writeln!(out, "{line}")?;
            if line.starts_with(until) {
                return Ok(true);
            }
        }
        CtlResult::Ok(false)
    };

    match tokio::time::timeout(limit, collect).await {
        Ok(Ok(true)) => Ok(()),
        Ok(Ok(false)) => Err("connection closed before the terminating line".into()),
        Ok(Err(err)) => Err(err),
        Err(_) => Err(format!("no line starting with {until:?} within {limit:?}").into()),
    }
}

/// Next text message, or `None` once the server closes the session.
async fn next_line(socket: &mut Socket) -> CtlResult<Option<String>> {
    while let Some(message) = socket.next().await {
        match message? {
            Message::Text(text) => return Ok(Some(text.to_string())),
            Message::Close(_) => return Ok(None),
            _ => {}
        }
    }
    Ok(None)
}
