//! playercount: live editor player count, shared chat and a globe of where
//! everyone is looking.
//!
//! Counts and chat are printed to the terminal. Lines typed on stdin are sent
//! as chat; `/login <name>` reports an editor account to register as.

mod config;
mod display;
mod window;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use playercount_globe::GlobeTextures;
use playercount_sdk::chat::ValidationError;
use playercount_sdk::client::{self, SessionHandle};
use playercount_sdk::identity::SharedIdentity;
use playercount_sdk::{AngularPosition, Event};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::runtime::Runtime;
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

use crate::config::{Config, Resolved};
use crate::display::Display;

#[derive(Parser, Debug)]
#[command(name = "playercount", about = "Live player count, chat and globe for the editor relay")]
pub struct Cli {
    /// Relay URL (ws:// or wss://)
    #[arg(long, env = "PLAYERCOUNT_URL")]
    url: Option<String>,

    /// Editor account to register as once connected
    #[arg(long)]
    username: Option<String>,

    /// Config file (default: ~/.config/playercount/app.toml)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Terminal only, don't open the globe window
    #[arg(long)]
    no_globe: bool,

    /// Land mask image (red channel: 1 = land)
    #[arg(long)]
    land_texture: Option<PathBuf>,

    /// Highlight mask image (red channel scales marker glow)
    #[arg(long)]
    highlight_texture: Option<PathBuf>,

    /// Write the effective settings to the config file and exit
    #[arg(long)]
    save_config: bool,
}

fn main() -> Result<()> {
    init_tracing()?;

    let cli = Cli::parse();
    let config_path = cli.config.clone().unwrap_or_else(config::default_path);
    let file = Config::load(&config_path);
    let resolved = Resolved::merge(&cli, &file)?;

    if cli.save_config {
        resolved.to_config().save(&config_path)?;
        println!("Saved {}", config_path.display());
        return Ok(());
    }

    tracing::info!(
        url = %resolved.session.url,
        username = ?resolved.username,
        globe = resolved.globe,
        "starting playercount"
    );

    let runtime = Runtime::new().context("starting tokio runtime")?;

    let identity = SharedIdentity::new();
    if let Some(name) = &resolved.username {
        identity.set_account(name.clone());
    }

    let (handle, events) = {
        let _guard = runtime.enter();
        client::connect(resolved.session.clone(), Arc::new(identity.clone()))
    };

    let (positions_tx, positions_rx) = mpsc::unbounded_channel();
    runtime.spawn(pump_events(
        events,
        positions_tx,
        resolved.session.max_chat_messages,
    ));
    runtime.spawn(read_input(
        BufReader::new(tokio::io::stdin()),
        handle.clone(),
        identity,
    ));

    let result = if resolved.globe {
        GlobeTextures::load(
            resolved.land_texture.as_deref(),
            resolved.highlight_texture.as_deref(),
        )
        .map_err(anyhow::Error::from)
        .and_then(|textures| window::run(positions_rx, textures, resolved.style))
    } else {
        drop(positions_rx);
        runtime.block_on(async { tokio::signal::ctrl_c().await.context("waiting for ctrl-c") })
    };

    shut_down(runtime, &handle);
    result
}

/// Close the session, then stop the runtime without joining blocking tasks.
///
/// The stdin reader sits in a blocking read that cannot be cancelled; a
/// plain drop of the runtime would wait for the next line of input.
fn shut_down(runtime: Runtime, handle: &SessionHandle) {
    runtime.block_on(handle.shutdown());
    runtime.shutdown_timeout(Duration::from_millis(250));
}

fn init_tracing() -> Result<()> {
    // JSON logs with PLAYERCOUNT_LOG_JSON=1, human-readable otherwise.
    // Logs go to stderr; stdout carries counts and chat.
    let json_logs = std::env::var("PLAYERCOUNT_LOG_JSON").unwrap_or_default() == "1";
    let filter = EnvFilter::from_default_env()
        .add_directive("playercount=info".parse()?)
        .add_directive("playercount_sdk=info".parse()?);
    if json_logs {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    }
    Ok(())
}

/// Print every session event and forward marker positions to the globe.
async fn pump_events(
    mut events: mpsc::Receiver<Event>,
    positions: mpsc::UnboundedSender<Vec<AngularPosition>>,
    max_chat_messages: usize,
) {
    let mut display = Display::new(std::io::stdout(), max_chat_messages);
    while let Some(event) = events.recv().await {
        if let Event::Count(snapshot) = &event {
            // No receiver in terminal-only mode.
            let _ = positions.send(snapshot.positions.clone());
        }
        if let Err(e) = display.handle(&event) {
            tracing::warn!(error = %e, "terminal write failed");
        }
    }
    tracing::debug!("event stream ended");
}

/// Send input lines as chat until EOF.
async fn read_input<R: AsyncBufRead + Unpin>(
    input: R,
    handle: SessionHandle,
    identity: SharedIdentity,
) {
    let mut lines = input.lines();
    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                tracing::warn!(error = %e, "stdin read failed");
                break;
            }
        };

        if let Some(name) = line.strip_prefix("/login ") {
            let name = name.trim();
            if !name.is_empty() {
                identity.set_account(name);
                tracing::info!(username = name, "account reported, registering on next tick");
            }
            continue;
        }

        match handle.send_chat(&line).await {
            Ok(()) | Err(ValidationError::Empty) => {}
            Err(e) => eprintln!("Not sent: {e}"),
        }
    }
}
