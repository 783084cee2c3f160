//! Live Connections command line client
//!
//! Joins an area, logs what the other participants do and forwards pointer
//! positions read from stdin as `x y` lines.

use anyhow::{Context, Result};
use clap::Parser;
use liveconn::proto::{Message, MessageKind};
use liveconn::transport::CloseInfo;
use liveconn::{area_from_path, Client, ClientConfig, Handlers, LogMode, PointerPosition};
use std::path::PathBuf;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

/// Buffered pointer positions between stdin and the session
const POINTER_BUFFER: usize = 64;

#[derive(Parser, Debug)]
#[command(name = "liveconn")]
#[command(version)]
#[command(about = "Share your pointer with everyone in a Live Connections area")]
struct Args {
    /// JSON configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Server authority, host[:port]
    #[arg(long)]
    host: Option<String>,

    /// Use ws/http instead of wss/https
    #[arg(long)]
    insecure: bool,

    /// Area to join, as an id or a page path like /abc; a new area is created when omitted
    #[arg(long)]
    area: Option<String>,

    /// Minimum milliseconds between two pointer events
    #[arg(long, value_name = "MS")]
    pointer_interval: Option<u64>,

    /// Log verbosity: silent, warn or debug
    #[arg(long)]
    log: Option<LogMode>,

    /// Bound every payload to its declared frame size
    #[arg(long)]
    strict_frames: bool,

    /// Give up when authentication is not acknowledged in time
    #[arg(long, value_name = "MS")]
    auth_timeout: Option<u64>,

    /// File remembering the user of each area
    #[arg(long, value_name = "FILE")]
    store: Option<PathBuf>,
}

impl Args {
    /// Configuration file values overridden by flags
    fn to_config(&self) -> Result<ClientConfig> {
        let mut config = match &self.config {
            Some(path) => ClientConfig::from_json_file(path)
                .with_context(|| format!("Failed to load configuration from {}", path.display()))?,
            None => ClientConfig::default(),
        };

        if let Some(host) = &self.host {
            config = config.with_host(host.clone());
        }
        if self.insecure {
            config = config.with_secure(false);
        }
        if let Some(ms) = self.pointer_interval {
            config = config.with_pointer_interval(Duration::from_millis(ms));
        }
        if let Some(log) = self.log {
            config = config.with_log_mode(log);
        }
        if self.strict_frames {
            config = config.with_strict_frames(true);
        }
        if let Some(ms) = self.auth_timeout {
            config = config.with_auth_timeout(Duration::from_millis(ms));
        }
        if let Some(path) = &self.store {
            config = config.with_store_path(path.clone());
        }

        config.validate()?;
        Ok(config)
    }

    /// Area named on the command line
    fn area(&self) -> Option<&str> {
        self.area.as_deref().and_then(area_from_path)
    }
}

/// Install the log subscriber; `RUST_LOG` wins over the configured mode
fn init_tracing(mode: LogMode) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(mode.directive()));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

/// Handlers logging everything the server sends
fn logging_handlers() -> Handlers {
    Handlers::new()
        .on(MessageKind::MouseMove, |message: Message| {
            if let Message::MouseMove(pos) = message {
                info!("{} moved to ({}, {})", pos.sender_name, pos.x, pos.y);
            }
        })
        .on(MessageKind::InitMouseCoords, |message: Message| {
            if let Message::InitMouseCoords(pos) = message {
                info!("{} is at ({}, {})", pos.sender_name, pos.x, pos.y);
            }
        })
        .on(MessageKind::UsersOnline, |_: Message| {
            info!("Users online changed");
        })
        .on(MessageKind::AuthOk, |message: Message| {
            if let Message::AuthOk(text) = message {
                debug!("Server acknowledged credentials: {}", text);
            }
        })
        .on_close(|close: &CloseInfo| {
            if close.clean {
                info!("Connection closed, code={:?} reason={:?}", close.code, close.reason);
            } else {
                warn!("Connection died");
            }
        })
        .on_error(|reason: &str| {
            warn!("Connection failed: {}", reason);
        })
}

/// Parse an `x y` line
fn parse_pointer(line: &str) -> Option<PointerPosition> {
    let mut parts = line.split_whitespace();
    let x = parts.next()?.parse().ok()?;
    let y = parts.next()?.parse().ok()?;
    if parts.next().is_some() {
        return None;
    }
    Some(PointerPosition::new(x, y))
}

/// Feed stdin lines to the session until stdin or the session ends
async fn read_pointer_lines(tx: mpsc::Sender<PointerPosition>) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) if line.trim().is_empty() => {}
            Ok(Some(line)) => match parse_pointer(&line) {
                Some(position) => {
                    if tx.send(position).await.is_err() {
                        break;
                    }
                }
                None => warn!("Ignoring input {:?}, expected \"x y\"", line),
            },
            Ok(None) => break,
            Err(e) => {
                warn!("Failed to read stdin: {}", e);
                break;
            }
        }
    }
    debug!("Pointer input closed");
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = args.to_config()?;
    init_tracing(config.log);

    let client = Client::from_config(config)?;
    info!("Connecting to {}", client.config().socket_url());

    let identity = client.resolve_identity(args.area()).await?;
    info!(
        "Joined area {} as {}{}",
        identity.user.area,
        identity.user.name,
        if identity.restored { " (restored)" } else { "" }
    );

    let (mut session, mut events) = client.connect(identity.user, logging_handlers()).await?;

    let (tx, mut pointer) = mpsc::channel(POINTER_BUFFER);
    tokio::spawn(read_pointer_lines(tx));

    let state = client.run(&mut session, &mut events, &mut pointer).await?;
    info!("Session ended in {:?}", state);
    Ok(())
}
