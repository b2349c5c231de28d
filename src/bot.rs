//! Demo game bot.
//!
//! Answers the game server's two requests with fixed moves:
//!
//! - `requestArrangement` → `ReceiveArrangement(board)` with [`ARRANGEMENT`]
//! - `requestStep` → `ReceiveStep(1, 0)`
//!
//! Server chat arrives as `receiveMessage(text)` and is logged. Every other
//! target is ignored.

use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use serde_json::Value;

use crate::dispatch::{Dispatcher, Handler};
use crate::hub::HubSender;

/// Fixed 10x10 ship layout; 1 marks an occupied cell.
pub const ARRANGEMENT: [[u8; 10]; 10] = [
    [1, 0, 0, 1, 0, 0, 0, 0, 1, 1],
    [1, 0, 0, 1, 0, 0, 0, 0, 0, 0],
    [0, 0, 0, 0, 0, 0, 0, 0, 0, 0],
    [0, 1, 0, 0, 0, 0, 1, 1, 0, 0],
    [0, 1, 0, 0, 0, 0, 0, 0, 0, 0],
    [0, 0, 0, 0, 0, 0, 0, 1, 1, 0],
    [0, 0, 0, 1, 1, 0, 0, 0, 0, 0],
    [0, 1, 0, 0, 0, 0, 0, 0, 0, 0],
    [0, 1, 0, 1, 0, 1, 0, 0, 0, 0],
    [0, 0, 0, 1, 0, 1, 0, 0, 0, 0],
];

/// Cell the bot fires at on every step.
pub const STEP: (u8, u8) = (1, 0);

/// Game bot replying through a [`HubSender`].
#[derive(Debug)]
pub struct GameBot {
    name: String,
    sender: HubSender,
}

impl GameBot {
    /// Create a bot that replies through `sender`.
    pub fn new(name: impl Into<String>, sender: HubSender) -> Self {
        Self {
            name: name.into(),
            sender,
        }
    }

    /// Wrap the bot in a dispatcher with its typed operations registered.
    pub fn into_dispatcher(self) -> Dispatcher<Self> {
        Dispatcher::new(self).on("receiveMessage", |bot: Arc<Self>, text: String| async move {
            log::info!("[{}] server says: {}", bot.name, text);
        })
    }

    async fn send_arrangement(&self) -> anyhow::Result<()> {
        self.sender
            .send_invocation("ReceiveArrangement", (ARRANGEMENT,))
            .await
            .context("ReceiveArrangement")
    }

    async fn send_step(&self) -> anyhow::Result<()> {
        self.sender
            .send_invocation("ReceiveStep", STEP)
            .await
            .context("ReceiveStep")
    }
}

#[async_trait]
impl Handler for GameBot {
    async fn handle(&self, target: &str, arguments: Vec<Value>) -> anyhow::Result<()> {
        match target {
            "requestArrangement" => self.send_arrangement().await,
            "requestStep" => self.send_step().await,
            _ => {
                log::debug!("Ignoring '{}' with arguments {:?}", target, arguments);
                Ok(())
            }
        }
    }

    fn on_start(&self) {
        log::info!("Bot '{}' is listening", self.name);
    }
}
