//! Receive loop.
//!
//! Reads one frame at a time and routes it by message kind:
//!
//! | Kind            | Effect                                   |
//! |-----------------|------------------------------------------|
//! | Ping            | none                                     |
//! | Invocation      | dispatch, then keep reading              |
//! | Close           | log server error text, end with `Ok`     |
//! | anything else   | end with `UnsupportedMessageKind`        |
//!
//! Connecting and each read race the connection's cancellation token.

use std::sync::atomic::Ordering;

use super::{Connection, HubState};
use crate::dispatch::{Dispatcher, Handler};
use crate::error::{HubError, Result};
use crate::protocol::{frame, Envelope, MessageKind};

impl Connection {
    /// Negotiate, connect, then receive and dispatch until the server
    /// closes, [`cancel`](Self::cancel) is called, or an error occurs.
    ///
    /// Cancellation and server close return `Ok(())`. In every case the
    /// socket is closed before returning, and the connection ends in a
    /// terminal state.
    ///
    /// Only one loop may run at a time. A second call while one is running
    /// fails with [`HubError::AlreadyListening`] and leaves the running
    /// loop untouched.
    pub async fn listen<H: Handler>(&self, dispatcher: &Dispatcher<H>) -> Result<()> {
        self.ensure_reusable()?;
        if self.listening.swap(true, Ordering::AcqRel) {
            log::warn!("Receive loop for hub {} is already running", self.hub);
            return Err(HubError::AlreadyListening);
        }

        let result = self.receive(dispatcher).await;
        self.teardown().await;
        self.listening.store(false, Ordering::Release);

        match &result {
            Ok(()) => {
                log::info!("Hub {} connection closed", self.hub);
                self.set_state(HubState::Closed);
            }
            Err(e) => {
                log::error!("Hub {} connection failed: {}", self.hub, e);
                self.set_state(HubState::Failed(e.to_string()));
            }
        }
        result
    }

    async fn receive<H: Handler>(&self, dispatcher: &Dispatcher<H>) -> Result<()> {
        tokio::select! {
            biased;
            () = self.cancel.cancelled() => {
                log::info!("Cancelled before hub {} connected", self.hub);
                return Ok(());
            }
            connected = self.connect() => connected?,
        }

        let mut reader = self
            .reader
            .lock()
            .await
            .take()
            .ok_or(HubError::NotConnected)?;

        if self.cancel.is_cancelled() {
            log::info!("Cancelled before hub {} became ready", self.hub);
            return Ok(());
        }

        dispatcher.handler().on_start();
        self.set_state(HubState::Ready);
        log::info!("Listening on hub {}", self.hub);

        loop {
            let bytes = tokio::select! {
                () = self.cancel.cancelled() => {
                    log::info!("Receive loop for hub {} cancelled", self.hub);
                    return Ok(());
                }
                read = reader.recv_frame(self.read_timeout) => read?,
            };
            let Some(bytes) = bytes else {
                return Ok(());
            };

            let envelope: Envelope = frame::decode(&bytes)?;
            match envelope.kind {
                MessageKind::Ping => log::trace!("Ping from hub {}", self.hub),
                MessageKind::Invocation => {
                    let (target, arguments) = envelope.into_call()?;
                    log::debug!("Invocation '{}' with {} arguments", target, arguments.len());
                    self.set_state(HubState::Dispatching);
                    dispatcher.dispatch(&target, arguments).await?;
                    self.set_state(HubState::Ready);
                }
                MessageKind::Close => {
                    match envelope.error.as_deref() {
                        Some(error) if !error.is_empty() => {
                            log::warn!("Hub {} closed the connection: {}", self.hub, error);
                        }
                        _ => log::info!("Hub {} closed the connection", self.hub),
                    }
                    return Ok(());
                }
                kind => return Err(HubError::UnsupportedMessageKind(kind)),
            }
        }
    }
}
