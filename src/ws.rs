//! WebSocket transport for hub frames.
//!
//! [`connect`] performs the upgrade and splits the socket. The
//! [`WsWriter`] half sits behind the connection's write mutex; the
//! [`WsReader`] half is owned by whoever is reading (the handshake, then
//! the receive loop). Both speak in encoded hub frames, not WebSocket
//! messages.

use std::time::Duration;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::{header, HeaderValue};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use crate::error::{HubError, Result};

type Socket = WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

/// Write half of a hub socket.
#[derive(Debug)]
pub struct WsWriter {
    sink: SplitSink<Socket, Message>,
}

impl WsWriter {
    /// Send an encoded hub frame as one text message.
    ///
    /// Frames are JSON plus a record separator, so they are always UTF-8.
    pub async fn send_frame(&mut self, frame: Vec<u8>) -> Result<()> {
        let text = String::from_utf8(frame).map_err(|e| HubError::Encode(e.to_string()))?;
        self.sink
            .send(Message::Text(text))
            .await
            .map_err(|e| HubError::Transport(format!("send failed: {e}")))
    }

    /// Send a close frame and flush the sink.
    pub async fn close(&mut self) -> Result<()> {
        self.sink
            .close()
            .await
            .map_err(|e| HubError::Transport(format!("close failed: {e}")))
    }
}

/// Read half of a hub socket.
#[derive(Debug)]
pub struct WsReader {
    stream: SplitStream<Socket>,
}

impl WsReader {
    /// Read the next data frame, bounded by `limit` from the start of the call.
    ///
    /// Control frames are skipped (tungstenite answers pings itself).
    /// Returns `Ok(None)` when the peer sends a WebSocket close frame; the
    /// stream ending without one is a transport error.
    pub async fn recv_frame(&mut self, limit: Duration) -> Result<Option<Vec<u8>>> {
        let read = async {
            loop {
                let message = match self.stream.next().await {
                    Some(Ok(message)) => message,
                    Some(Err(e)) => return Err(HubError::Transport(format!("read failed: {e}"))),
                    None => {
                        return Err(HubError::Transport(
                            "connection ended without close frame".to_string(),
                        ))
                    }
                };
                match message {
                    Message::Text(text) => return Ok(Some(text.into_bytes())),
                    Message::Binary(data) => return Ok(Some(data)),
                    Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => {}
                    Message::Close(Some(close)) => {
                        log::info!(
                            "WebSocket closed by server ({}): {}",
                            u16::from(close.code),
                            close.reason
                        );
                        return Ok(None);
                    }
                    Message::Close(None) => {
                        log::info!("WebSocket closed by server without a status");
                        return Ok(None);
                    }
                }
            }
        };

        tokio::time::timeout(limit, read).await.map_err(|elapsed| {
            HubError::Transport(format!("read timed out after {limit:?}: {elapsed}"))
        })?
    }
}

/// Open a WebSocket to `url`, sending `Authorization: Bearer <token>` on
/// the upgrade when a token is given.
pub async fn connect(url: &str, bearer: Option<&str>) -> Result<(WsWriter, WsReader)> {
    let mut request = url
        .into_client_request()
        .map_err(|e| HubError::Transport(format!("invalid WebSocket URL {url}: {e}")))?;

    if let Some(token) = bearer {
        let value = HeaderValue::from_str(&format!("Bearer {token}"))
            .map_err(|e| HubError::Transport(format!("invalid access token: {e}")))?;
        request.headers_mut().insert(header::AUTHORIZATION, value);
    }

    let (socket, response) = tokio_tungstenite::connect_async(request)
        .await
        .map_err(|e| HubError::Transport(format!("WebSocket connect failed: {e}")))?;
    log::trace!("Upgrade response status: {}", response.status());

    let (sink, stream) = socket.split();
    Ok((WsWriter { sink }, WsReader { stream }))
}

/// Rewrite an `http(s)://` URL to `ws(s)://`. Other schemes pass through.
#[must_use]
pub fn http_to_ws_scheme(url: &str) -> String {
    if let Some(rest) = url.strip_prefix("https://") {
        format!("wss://{rest}")
    } else if let Some(rest) = url.strip_prefix("http://") {
        format!("ws://{rest}")
    } else {
        url.to_string()
    }
}
