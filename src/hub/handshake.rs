//! Protocol handshake, the first exchange on a freshly opened socket.

use std::time::Duration;

use crate::error::{HubError, Result};
use crate::protocol::{frame, HandshakeRequest, HandshakeResponse};
use crate::ws::{WsReader, WsWriter};

/// Send the handshake request and read exactly one response frame.
///
/// The response read is bounded by `timeout`. A non-empty `error` in the
/// response is a [`HubError::Handshake`].
pub(super) async fn handshake(
    writer: &mut WsWriter,
    reader: &mut WsReader,
    timeout: Duration,
) -> Result<()> {
    writer.send_frame(frame::encode(&HandshakeRequest::default())?).await?;
    log::debug!("Handshake request sent");

    let bytes = reader.recv_frame(timeout).await?.ok_or_else(|| {
        HubError::Handshake("socket closed before handshake response".to_string())
    })?;

    let response: HandshakeResponse = frame::decode(&bytes)?;
    response.into_result()
}
