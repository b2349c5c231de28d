//! Protocol and timing constants for hubwire.
//!
//! This module centralizes the magic numbers and wire-level names of the
//! hub protocol so they are documented in one place.
//!
//! # Categories
//!
//! - **Framing**: record separator and handshake payload
//! - **Negotiation**: transport names
//! - **Timeouts**: network and read timeouts
//! - **Dispatch**: reserved target names

use std::time::Duration;

// ============================================================================
// Framing
// ============================================================================

/// Record separator byte terminating every frame on the wire.
///
/// JSON text never contains a raw `0x1E`, so the separator cannot occur
/// inside a well-formed payload.
pub const RECORD_SEPARATOR: u8 = 0x1E;

/// Sub-protocol name sent in the handshake request.
pub const PROTOCOL_NAME: &str = "json";

/// Sub-protocol version sent in the handshake request.
pub const PROTOCOL_VERSION: u32 = 1;

// ============================================================================
// Negotiation
// ============================================================================

/// Transport name the server must advertise during negotiation.
pub const WEBSOCKETS_TRANSPORT: &str = "WebSockets";

/// Path segment appended to the hub URL for the negotiate request.
pub const NEGOTIATE_PATH: &str = "negotiate";

// ============================================================================
// Timeouts
// ============================================================================

/// Bound on a single frame read, measured from the start of the read.
///
/// Applies to the handshake response and to every frame read by the
/// receive loop. Expiry is a transport failure.
pub const FRAME_READ_TIMEOUT: Duration = Duration::from_secs(10);

/// HTTP client request timeout for the negotiate call.
pub const HTTP_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Default interval between client keep-alive pings.
///
/// Matches the server-side default keep-alive of the hub protocol.
pub const KEEPALIVE_INTERVAL: Duration = Duration::from_secs(15);

// ============================================================================
// Dispatch
// ============================================================================

/// Target name that never resolves to a typed operation.
///
/// Invocations addressed to this name always go to the handler's
/// catch-all entry point.
pub const FALLBACK_TARGET: &str = "Default";
