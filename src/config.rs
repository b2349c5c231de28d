//! Configuration loading.
//!
//! Settings come from three layers, later ones winning:
//!
//! 1. Built-in defaults
//! 2. `config.json` in the config directory
//! 3. `HUBWIRE_*` environment variables
//!
//! Command-line flags are applied on top by the binary. The access token
//! is never written to or read from the file.

use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// File name inside the config directory.
pub const CONFIG_FILE: &str = "config.json";

/// Session mode the bot requests once connected.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Practice game against the server.
    #[default]
    Debug,
    /// Ranked game against other bots.
    Fight,
}

impl Mode {
    /// Hub target invoked to enter this mode.
    pub fn target(self) -> &'static str {
        match self {
            Self::Debug => "Debug",
            Self::Fight => "Fight",
        }
    }
}

impl FromStr for Mode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "debug" => Ok(Self::Debug),
            "fight" => Ok(Self::Fight),
            other => anyhow::bail!("unknown mode '{other}' (expected debug or fight)"),
        }
    }
}

/// Configuration for a hub client.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    /// Base URL of the hub server.
    pub server_url: String,
    /// Hub name appended to the base URL.
    pub hub: String,
    /// Client label sent with the mode request.
    pub name: String,
    /// Session mode.
    pub mode: Mode,
    /// Per-frame read timeout in seconds.
    pub read_timeout_secs: u64,
    /// Seconds between keep-alive pings; 0 disables them.
    pub keepalive_interval_secs: u64,
    /// Bearer token - NOT serialized to disk (env or flag only).
    #[serde(skip)]
    pub access_token: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_url: "https://cybertank.sibedge.com:5001".to_string(),
            hub: "gameHub".to_string(),
            name: "gobot".to_string(),
            mode: Mode::Debug,
            read_timeout_secs: crate::constants::FRAME_READ_TIMEOUT.as_secs(),
            keepalive_interval_secs: crate::constants::KEEPALIVE_INTERVAL.as_secs(),
            access_token: None,
        }
    }
}

impl Config {
    /// Returns the configuration directory path.
    ///
    /// `HUBWIRE_CONFIG_DIR` wins; otherwise the platform config dir
    /// (Linux: `~/.config/hubwire`).
    pub fn config_dir() -> Result<PathBuf> {
        if let Ok(dir) = std::env::var("HUBWIRE_CONFIG_DIR") {
            return Ok(PathBuf::from(dir));
        }
        Ok(dirs::config_dir()
            .context("Could not determine config directory")?
            .join("hubwire"))
    }

    /// Loads configuration from the default directory, with environment
    /// variable overrides.
    pub fn load() -> Result<Self> {
        Self::load_from_dir(&Self::config_dir()?)
    }

    /// Loads `config.json` from `dir` (defaults when absent), then applies
    /// environment variable overrides.
    pub fn load_from_dir(dir: &Path) -> Result<Self> {
        let path = dir.join(CONFIG_FILE);
        let mut config = if path.exists() {
            let content = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse {}", path.display()))?
        } else {
            log::debug!("No config file at {}, using defaults", path.display());
            Self::default()
        };
        config.apply_env_overrides();
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(server_url) = std::env::var("HUBWIRE_SERVER_URL") {
            self.server_url = server_url;
        }

        if let Ok(hub) = std::env::var("HUBWIRE_HUB") {
            self.hub = hub;
        }

        if let Ok(name) = std::env::var("HUBWIRE_NAME") {
            self.name = name;
        }

        if let Ok(token) = std::env::var("HUBWIRE_TOKEN") {
            if !token.is_empty() {
                self.access_token = Some(token);
            }
        }

        if let Ok(mode) = std::env::var("HUBWIRE_MODE") {
            match mode.parse() {
                Ok(mode) => self.mode = mode,
                Err(e) => log::warn!("Ignoring HUBWIRE_MODE: {}", e),
            }
        }

        if let Some(secs) = env_secs("HUBWIRE_READ_TIMEOUT") {
            self.read_timeout_secs = secs;
        }

        if let Some(secs) = env_secs("HUBWIRE_KEEPALIVE") {
            self.keepalive_interval_secs = secs;
        }
    }

    /// Per-frame read timeout. Zero is raised to one second.
    pub fn read_timeout(&self) -> Duration {
        Duration::from_secs(self.read_timeout_secs.max(1))
    }

    /// Keep-alive interval, `None` when disabled.
    pub fn keepalive_interval(&self) -> Option<Duration> {
        (self.keepalive_interval_secs > 0)
            .then(|| Duration::from_secs(self.keepalive_interval_secs))
    }
}

fn env_secs(var: &str) -> Option<u64> {
    let raw = std::env::var(var).ok()?;
    match raw.parse() {
        Ok(secs) => Some(secs),
        Err(e) => {
            log::warn!("Ignoring {}={:?}: {}", var, raw, e);
            None
        }
    }
}
