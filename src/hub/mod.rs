//! Hub connection.
//!
//! A [`Connection`] owns everything one client needs to talk to one hub:
//! the negotiated identifier, the two socket halves, the lifecycle state,
//! and a cancellation token.
//!
//! # Architecture
//!
//! ```text
//! Connection
//!     ├── negotiate   POST {base}/{hub}/negotiate, cached once
//!     ├── connect     WebSocket upgrade + handshake
//!     ├── listen      receive loop, routes invocations to a Dispatcher
//!     └── sender()    HubSender clones sharing the write mutex
//! ```
//!
//! # Usage
//!
//! ```ignore
//! let connection = Arc::new(Connection::new("https://example.com:5001", "gameHub")?);
//! let listener = {
//!     let connection = Arc::clone(&connection);
//!     tokio::spawn(async move { connection.listen(&dispatcher).await })
//! };
//! connection.ready().await?;
//! connection.send_invocation("Fight", ("gobot",)).await?;
//! ```
//!
//! A connection is single-use: once the loop ends it reports `Closed` or
//! `Failed` and refuses to connect again.

mod handshake;
mod invoke;
mod listen;
mod negotiate;

use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{watch, Mutex};
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::constants::{FRAME_READ_TIMEOUT, HTTP_REQUEST_TIMEOUT, NEGOTIATE_PATH};
use crate::error::{HubError, Result};
use crate::ws::{self, WsReader, WsWriter};

pub use invoke::{HubSender, IntoArguments};

/// Lifecycle state of a [`Connection`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HubState {
    /// Created, nothing sent yet.
    Idle,
    /// Connection identifier obtained.
    Negotiated,
    /// Socket open and handshake accepted.
    HandshakeComplete,
    /// Receive loop is reading.
    Ready,
    /// Receive loop is running a handler.
    Dispatching,
    /// Loop ended cleanly (server close or cancellation).
    Closed,
    /// Loop or connect ended with an error.
    Failed(String),
}

impl HubState {
    /// Whether the connection can no longer be used.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Closed | Self::Failed(_))
    }

    fn is_connected(&self) -> bool {
        matches!(self, Self::HandshakeComplete | Self::Ready | Self::Dispatching)
    }
}

/// Client connection to one hub.
pub struct Connection {
    name: String,
    hub: String,
    base_url: String,
    access_token: Option<String>,
    read_timeout: Duration,
    http: reqwest::Client,
    /// Cached socket id. The lock is held across the negotiate request.
    socket_id: Mutex<Option<String>>,
    writer: Arc<Mutex<Option<WsWriter>>>,
    reader: Mutex<Option<WsReader>>,
    /// Set while a receive loop owns the reader.
    listening: AtomicBool,
    state: watch::Sender<HubState>,
    cancel: CancellationToken,
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("name", &self.name)
            .field("hub", &self.hub)
            .field("base_url", &self.base_url)
            .field("state", &*self.state.borrow())
            .finish_non_exhaustive()
    }
}

impl Connection {
    /// Create an idle connection to `hub` under `base_url`.
    ///
    /// Nothing is sent until [`negotiate`](Self::negotiate),
    /// [`connect`](Self::connect) or [`listen`](Self::listen).
    pub fn new(base_url: &str, hub: &str) -> Result<Self> {
        let base_url = base_url.trim_end_matches('/');
        let parsed = reqwest::Url::parse(base_url)
            .map_err(|e| HubError::Negotiation(format!("invalid base URL {base_url}: {e}")))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(HubError::Negotiation(format!(
                "unsupported URL scheme: {}",
                parsed.scheme()
            )));
        }
        let hub = hub.trim_matches('/');
        if hub.is_empty() {
            return Err(HubError::Negotiation("hub name is empty".to_string()));
        }

        let http = reqwest::Client::builder()
            .timeout(HTTP_REQUEST_TIMEOUT)
            .build()
            .map_err(|e| HubError::Negotiation(format!("failed to build HTTP client: {e}")))?;

        let (state, _) = watch::channel(HubState::Idle);

        Ok(Self {
            name: String::new(),
            hub: hub.to_string(),
            base_url: base_url.to_string(),
            access_token: None,
            read_timeout: FRAME_READ_TIMEOUT,
            http,
            socket_id: Mutex::new(None),
            writer: Arc::new(Mutex::new(None)),
            reader: Mutex::new(None),
            listening: AtomicBool::new(false),
            state,
            cancel: CancellationToken::new(),
        })
    }

    /// Build a connection from loaded configuration.
    pub fn from_config(config: &Config) -> Result<Self> {
        let connection = Self::new(&config.server_url, &config.hub)?
            .with_name(&config.name)
            .with_read_timeout(config.read_timeout());
        Ok(match &config.access_token {
            Some(token) => connection.with_access_token(token),
            None => connection,
        })
    }

    /// Set the client label.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Override the per-frame read timeout.
    #[must_use]
    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    /// Send `Authorization: Bearer <token>` on negotiate and upgrade.
    #[must_use]
    pub fn with_access_token(mut self, token: impl Into<String>) -> Self {
        self.access_token = Some(token.into());
        self
    }

    /// Client label.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Hub name.
    pub fn hub(&self) -> &str {
        &self.hub
    }

    /// Current lifecycle state.
    pub fn state(&self) -> HubState {
        self.state.borrow().clone()
    }

    /// Wait until the receive loop is reading.
    ///
    /// Fails with [`HubError::Terminated`] when the connection ends
    /// before it becomes ready, or has already ended.
    pub async fn ready(&self) -> Result<()> {
        let mut rx = self.state.subscribe();
        let state = rx
            .wait_for(|s| {
                matches!(s, HubState::Ready | HubState::Dispatching) || s.is_terminal()
            })
            .await
            .map_err(|e| HubError::Terminated(e.to_string()))?
            .clone();
        match state {
            HubState::Failed(reason) => Err(HubError::Terminated(reason)),
            HubState::Closed => Err(HubError::Terminated("closed".to_string())),
            _ => Ok(()),
        }
    }

    /// Ask the receive loop to stop. The loop ends with `Ok(())`.
    pub fn cancel(&self) {
        log::debug!("Cancellation requested for hub {}", self.hub);
        self.cancel.cancel();
    }

    /// Whether [`cancel`](Self::cancel) has been called or the loop ended.
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Open the socket and complete the handshake.
    ///
    /// Negotiates first if needed. A no-op when already connected.
    pub async fn connect(&self) -> Result<()> {
        self.ensure_reusable()?;
        if self.state.borrow().is_connected() {
            log::debug!("Already connected to hub {}", self.hub);
            return Ok(());
        }

        let result = self.open_socket().await;
        if let Err(e) = &result {
            if !matches!(e, HubError::Negotiation(_)) {
                self.set_state(HubState::Failed(e.to_string()));
            }
        }
        result
    }

    async fn open_socket(&self) -> Result<()> {
        let id = self.negotiate().await?;
        let url = self.socket_url_for(&id)?;

        log::info!("Connecting to hub {} as '{}'", self.hub, self.name);
        log::debug!("Socket URL: {}", url);
        let (mut writer, mut reader) = ws::connect(&url, self.access_token.as_deref()).await?;

        handshake::handshake(&mut writer, &mut reader, self.read_timeout).await?;

        *self.writer.lock().await = Some(writer);
        *self.reader.lock().await = Some(reader);
        self.set_state(HubState::HandshakeComplete);
        log::info!("Handshake complete for hub {}", self.hub);
        Ok(())
    }

    /// WebSocket URL for the negotiated connection.
    pub async fn socket_url(&self) -> Result<String> {
        let id = self
            .socket_id
            .lock()
            .await
            .clone()
            .ok_or(HubError::NotConnected)?;
        self.socket_url_for(&id)
    }

    fn socket_url_for(&self, id: &str) -> Result<String> {
        let hub_url = ws::http_to_ws_scheme(&self.hub_url());
        let mut url = reqwest::Url::parse(&hub_url)
            .map_err(|e| HubError::Transport(format!("invalid socket URL {hub_url}: {e}")))?;
        url.query_pairs_mut().append_pair("id", id);
        Ok(url.into())
    }

    fn hub_url(&self) -> String {
        format!("{}/{}", self.base_url, self.hub)
    }

    fn negotiate_url(&self) -> String {
        format!("{}/{}", self.hub_url(), NEGOTIATE_PATH)
    }

    fn ensure_reusable(&self) -> Result<()> {
        if self.state.borrow().is_terminal() {
            return Err(HubError::NotReusable);
        }
        Ok(())
    }

    fn set_state(&self, next: HubState) {
        let previous = self.state.send_replace(next.clone());
        if previous != next {
            log::debug!("Hub {} state: {:?} -> {:?}", self.hub, previous, next);
        }
    }

    /// Drop both socket halves, closing the writer gracefully.
    async fn teardown(&self) {
        drop(self.reader.lock().await.take());
        let writer = self.writer.lock().await.take();
        if let Some(mut writer) = writer {
            if let Err(e) = writer.close().await {
                log::debug!("Socket close for hub {}: {}", self.hub, e);
            }
        }
        self.cancel.cancel();
    }
}
