//! Outbound invocations and keep-alive pings.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use serde_json::Value;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use super::Connection;
use crate::error::{HubError, Result};
use crate::protocol::{frame, Envelope};
use crate::ws::WsWriter;

/// Conversion of a Rust argument list into raw invocation arguments.
///
/// Implemented for `()`, tuples of up to six `Serialize` values, and
/// `Vec<serde_json::Value>`. Each element is serialized on its own.
pub trait IntoArguments {
    /// Serialize every argument, in order.
    fn into_arguments(self) -> Result<Vec<Value>>;
}

impl IntoArguments for Vec<Value> {
    fn into_arguments(self) -> Result<Vec<Value>> {
        Ok(self)
    }
}

impl IntoArguments for () {
    fn into_arguments(self) -> Result<Vec<Value>> {
        Ok(Vec::new())
    }
}

fn to_argument<T: Serialize>(value: &T) -> Result<Value> {
    serde_json::to_value(value).map_err(|e| HubError::Encode(e.to_string()))
}

macro_rules! impl_into_arguments {
    ($($ty:ident $var:ident),+) => {
        impl<$($ty: Serialize),+> IntoArguments for ($($ty,)+) {
            fn into_arguments(self) -> Result<Vec<Value>> {
                let ($($var,)+) = self;
                Ok(vec![$(to_argument(&$var)?),+])
            }
        }
    };
}

impl_into_arguments!(A1 a1);
impl_into_arguments!(A1 a1, A2 a2);
impl_into_arguments!(A1 a1, A2 a2, A3 a3);
impl_into_arguments!(A1 a1, A2 a2, A3 a3, A4 a4);
impl_into_arguments!(A1 a1, A2 a2, A3 a3, A4 a4, A5 a5);
impl_into_arguments!(A1 a1, A2 a2, A3 a3, A4 a4, A5 a5, A6 a6);

/// Cloneable handle for writing to a connection's socket.
///
/// All clones share the connection's write mutex, so frames from
/// concurrent senders never interleave.
#[derive(Clone, Debug)]
pub struct HubSender {
    writer: Arc<Mutex<Option<WsWriter>>>,
}

impl HubSender {
    /// Invoke `target` on the server without waiting for a result.
    pub async fn send_invocation<A: IntoArguments>(
        &self,
        target: &str,
        arguments: A,
    ) -> Result<()> {
        let envelope = Envelope::invocation(target, arguments.into_arguments()?);
        log::debug!("Invoking '{}' with {} arguments", target, envelope.args().len());
        self.send_envelope(&envelope).await
    }

    /// Send a keep-alive ping.
    pub async fn send_ping(&self) -> Result<()> {
        log::trace!("Sending ping");
        self.send_envelope(&Envelope::ping()).await
    }

    /// Encode and write one envelope.
    ///
    /// Fails with [`HubError::NotConnected`] before the handshake and after
    /// teardown.
    pub async fn send_envelope(&self, envelope: &Envelope) -> Result<()> {
        let bytes = frame::encode(envelope)?;
        let mut guard = self.writer.lock().await;
        let writer = guard.as_mut().ok_or(HubError::NotConnected)?;
        writer.send_frame(bytes).await
    }

    /// Whether a socket is currently open for writing.
    pub async fn is_connected(&self) -> bool {
        self.writer.lock().await.is_some()
    }
}

impl Connection {
    /// A sender sharing this connection's socket.
    pub fn sender(&self) -> HubSender {
        HubSender {
            writer: Arc::clone(&self.writer),
        }
    }

    /// Invoke `target` on the server. See [`HubSender::send_invocation`].
    pub async fn send_invocation<A: IntoArguments>(
        &self,
        target: &str,
        arguments: A,
    ) -> Result<()> {
        self.sender().send_invocation(target, arguments).await
    }

    /// Send a ping every `interval` until the connection is cancelled,
    /// torn down, or a write fails. A zero interval disables pings and the
    /// returned task finishes at once.
    pub fn spawn_keepalive(&self, interval: Duration) -> JoinHandle<()> {
        let sender = self.sender();
        let cancel = self.cancel.clone();
        let hub = self.hub.clone();

        tokio::spawn(async move {
            if interval.is_zero() {
                log::debug!("Keep-alive for hub {} disabled", hub);
                return;
            }

            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            // First tick completes immediately.
            ticker.tick().await;

            loop {
                tokio::select! {
                    () = cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        if let Err(e) = sender.send_ping().await {
                            log::debug!("Keep-alive for hub {} stopped: {}", hub, e);
                            break;
                        }
                    }
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Serialize)]
    struct Cell {
        x: u8,
        y: u8,
    }

    #[test]
    fn test_tuple_arguments_serialize_in_order() {
        let args = ("gobot", 3, Cell { x: 1, y: 2 }).into_arguments().unwrap();
        assert_eq!(args, vec![json!("gobot"), json!(3), json!({"x": 1, "y": 2})]);
    }

    #[test]
    fn test_unit_and_raw_arguments() {
        assert!(().into_arguments().unwrap().is_empty());
        let raw = vec![json!(null), json!([1, 0])];
        assert_eq!(raw.clone().into_arguments().unwrap(), raw);
    }

    #[test]
    fn test_unserializable_argument_is_encode_error() {
        let mut map = std::collections::HashMap::new();
        map.insert((1, 2), "tuple keys are not valid JSON object keys");
        assert!(matches!(
            (map,).into_arguments(),
            Err(HubError::Encode(_))
        ));
    }

    #[tokio::test]
    async fn test_send_before_connect_is_not_connected() {
        let connection = Connection::new("https://example.com", "gameHub").unwrap();
        let sender = connection.sender();
        assert!(!sender.is_connected().await);
        assert!(matches!(
            sender.send_invocation("Fight", ("gobot",)).await,
            Err(HubError::NotConnected)
        ));
        assert!(matches!(
            connection.send_invocation("Debug", ()).await,
            Err(HubError::NotConnected)
        ));
    }

    #[tokio::test]
    async fn test_keepalive_stops_when_not_connected() {
        let connection = Connection::new("https://example.com", "gameHub").unwrap();
        let handle = connection.spawn_keepalive(Duration::from_millis(5));
        tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_zero_keepalive_interval_is_disabled() {
        let connection = Connection::new("https://example.com", "gameHub").unwrap();
        let handle = connection.spawn_keepalive(Duration::ZERO);
        tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .unwrap()
            .unwrap();
        assert!(!connection.is_cancelled());
    }

    #[tokio::test]
    async fn test_keepalive_stops_on_cancel() {
        let connection = Connection::new("https://example.com", "gameHub").unwrap();
        let handle = connection.spawn_keepalive(Duration::from_secs(3600));
        connection.cancel();
        tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .unwrap()
            .unwrap();
    }
}
