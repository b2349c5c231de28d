//! hubwire CLI - connects the demo game bot to a hub.
//!
//! See the `hubwire` library for the protocol engine.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use hubwire::bot::GameBot;
use hubwire::{Config, Connection, Mode};
use mimalloc::MiMalloc;

/// Global allocator configured per M-MIMALLOC-APPS guideline.
#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

/// Connect a game bot to a SignalR hub.
#[derive(Parser, Debug)]
#[command(name = "hubwire", version, about)]
struct Cli {
    /// Base URL of the hub server
    #[arg(long = "conn-str")]
    conn_str: Option<String>,

    /// Hub name
    #[arg(long = "hub-name")]
    hub_name: Option<String>,

    /// Bot name sent with the mode request
    #[arg(long)]
    name: Option<String>,

    /// Session mode
    #[arg(long, value_enum, conflicts_with = "debug")]
    mode: Option<Mode>,

    /// Shorthand for --mode debug
    #[arg(long)]
    debug: bool,

    /// Directory holding config.json
    #[arg(long = "config-dir")]
    config_dir: Option<PathBuf>,
}

impl Cli {
    fn into_config(self) -> Result<Config> {
        let mut config = match &self.config_dir {
            Some(dir) => Config::load_from_dir(dir)?,
            None => Config::load()?,
        };
        if let Some(url) = self.conn_str {
            config.server_url = url;
        }
        if let Some(hub) = self.hub_name {
            config.hub = hub;
        }
        if let Some(name) = self.name {
            config.name = name;
        }
        if self.debug {
            config.mode = Mode::Debug;
        } else if let Some(mode) = self.mode {
            config.mode = mode;
        }
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_secs()
        .init();

    let config = Cli::parse().into_config()?;
    log::info!(
        "Starting {} against {}/{} in {:?} mode",
        config.name,
        config.server_url,
        config.hub,
        config.mode
    );

    let connection = Arc::new(Connection::from_config(&config)?);
    let dispatcher = GameBot::new(&config.name, connection.sender()).into_dispatcher();

    let listener = {
        let connection = Arc::clone(&connection);
        tokio::spawn(async move { connection.listen(&dispatcher).await })
    };

    if let Err(e) = connection.ready().await {
        // The listener holds the root cause.
        listener.await.context("listener task panicked")??;
        return Err(e.into());
    }

    connection
        .send_invocation(config.mode.target(), (connection.name(),))
        .await
        .with_context(|| format!("Failed to request {} mode", config.mode.target()))?;

    let keepalive = config
        .keepalive_interval()
        .map(|interval| connection.spawn_keepalive(interval));

    {
        let connection = Arc::clone(&connection);
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                log::info!("Interrupted, closing connection");
                connection.cancel();
            }
        });
    }

    let result = listener.await.context("listener task panicked")?;
    if let Some(keepalive) = keepalive {
        keepalive.abort();
    }
    result?;
    Ok(())
}
