//! hubwire - client engine for the SignalR JSON hub protocol.
//!
//! Negotiates a connection over HTTP, upgrades to a WebSocket, performs the
//! protocol handshake, then routes server invocations to local handler code
//! while other tasks invoke server targets on the same socket.
//!
//! # Architecture
//!
//! - **Connection** - owns one hub session: negotiate, connect, listen
//! - **Dispatcher** - typed operation table in front of a catch-all handler
//! - **HubSender** - cloneable writer for outbound invocations
//!
//! # Modules
//!
//! - [`hub`] - connection lifecycle, receive loop, outbound invocations
//! - [`dispatch`] - handler trait and typed dispatch
//! - [`protocol`] - wire messages and record-separator framing
//! - [`ws`] - WebSocket transport halves
//! - [`config`] - configuration loading
//! - [`bot`] - demo game bot

pub mod bot;
pub mod config;
pub mod constants;
pub mod dispatch;
pub mod error;
pub mod hub;
pub mod protocol;
pub mod ws;

// Re-export commonly used types
pub use config::{Config, Mode};
pub use dispatch::{Dispatcher, Handler};
pub use error::{HubError, Result};
pub use hub::{Connection, HubSender, HubState, IntoArguments};
