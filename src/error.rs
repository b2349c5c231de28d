//! Error type shared by every protocol component.

use crate::protocol::MessageKind;

/// Errors that can occur while negotiating, connecting, or exchanging
/// frames with a hub.
#[derive(Debug, thiserror::Error)]
pub enum HubError {
    /// Negotiate request failed, returned an error status, had an
    /// unparseable body, or offered no WebSockets transport.
    #[error("negotiation failed: {0}")]
    Negotiation(String),

    /// Server rejected the handshake with the given error text.
    #[error("handshake rejected: {0}")]
    Handshake(String),

    /// Received frame was empty or not a valid JSON envelope.
    #[error("malformed frame: {0}")]
    Frame(String),

    /// Server sent a message kind this client does not support.
    #[error("unsupported message kind: {0}")]
    UnsupportedMessageKind(MessageKind),

    /// Socket-level failure: connect, read, write, or read timeout.
    #[error("transport error: {0}")]
    Transport(String),

    /// An outbound argument or envelope could not be serialized.
    #[error("encode error: {0}")]
    Encode(String),

    /// A handler operation returned an error.
    #[error("handler for '{target}' failed: {message}")]
    Handler {
        /// Target name of the invocation being handled.
        target: String,
        /// Rendered error chain.
        message: String,
    },

    /// Operation requires an open socket, but none is established.
    #[error("not connected")]
    NotConnected,

    /// Connection already reached a terminal state and cannot be reused.
    #[error("connection already terminated; create a new connection")]
    NotReusable,

    /// A receive loop is already running on this connection.
    #[error("receive loop already running")]
    AlreadyListening,

    /// Receive loop ended before the connection became ready.
    #[error("connection terminated: {0}")]
    Terminated(String),
}

impl HubError {
    /// Wrap a handler failure, keeping the full error chain in the message.
    pub(crate) fn handler(target: &str, error: &anyhow::Error) -> Self {
        Self::Handler {
            target: target.to_string(),
            message: format!("{error:#}"),
        }
    }
}

/// Result alias used throughout the crate.
pub type Result<T, E = HubError> = std::result::Result<T, E>;
