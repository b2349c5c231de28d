//! Hub protocol wire format.
//!
//! - [`messages`] - envelope, negotiate and handshake types
//! - [`frame`] - record-separator framing codec

pub mod frame;
pub mod messages;

pub use messages::{
    AvailableTransport, Envelope, HandshakeRequest, HandshakeResponse, MessageKind,
    NegotiateResponse,
};
