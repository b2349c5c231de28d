//! Wire message types for negotiation, handshake, and hub envelopes.
//!
//! All types map one-to-one onto the JSON shapes the server speaks.
//! Field names follow the protocol's camelCase spelling on the wire.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::constants::{PROTOCOL_NAME, PROTOCOL_VERSION};
use crate::error::{HubError, Result};

/// Message kind carried in the `type` field of every envelope.
///
/// Codes follow the hub protocol numbering, starting at 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "i64", into = "i64")]
pub enum MessageKind {
    /// Call a named target with arguments (1).
    Invocation,
    /// One item of a streaming result (2).
    StreamItem,
    /// Completion of an earlier invocation (3).
    Completion,
    /// Call expecting a streamed result (4).
    StreamInvocation,
    /// Cancel a streaming invocation (5).
    CancelInvocation,
    /// Keep-alive (6).
    Ping,
    /// Server is closing the connection (7).
    Close,
    /// Any code this client does not know.
    Unknown(i64),
}

impl MessageKind {
    /// Numeric wire code for this kind.
    pub fn code(self) -> i64 {
        match self {
            Self::Invocation => 1,
            Self::StreamItem => 2,
            Self::Completion => 3,
            Self::StreamInvocation => 4,
            Self::CancelInvocation => 5,
            Self::Ping => 6,
            Self::Close => 7,
            Self::Unknown(code) => code,
        }
    }

    fn label(self) -> &'static str {
        match self {
            Self::Invocation => "invocation",
            Self::StreamItem => "stream-item",
            Self::Completion => "completion",
            Self::StreamInvocation => "stream-invocation",
            Self::CancelInvocation => "cancel-invocation",
            Self::Ping => "ping",
            Self::Close => "close",
            Self::Unknown(_) => "unknown",
        }
    }
}

impl From<i64> for MessageKind {
    fn from(code: i64) -> Self {
        match code {
            1 => Self::Invocation,
            2 => Self::StreamItem,
            3 => Self::Completion,
            4 => Self::StreamInvocation,
            5 => Self::CancelInvocation,
            6 => Self::Ping,
            7 => Self::Close,
            other => Self::Unknown(other),
        }
    }
}

impl From<MessageKind> for i64 {
    fn from(kind: MessageKind) -> Self {
        kind.code()
    }
}

impl std::fmt::Display for MessageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.label(), self.code())
    }
}

/// Hub message envelope, the payload of every post-handshake frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope {
    /// Message kind.
    #[serde(rename = "type")]
    pub kind: MessageKind,
    /// Optional string headers.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub headers: HashMap<String, String>,
    /// Correlation id. Absent for fire-and-forget invocations.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub invocation_id: Option<String>,
    /// Target name. Required for invocation kinds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    /// Undecoded argument values, in call order.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arguments: Option<Vec<Value>>,
    /// Error text on failed completions and close messages.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Envelope {
    /// Build a non-blocking invocation of `target`.
    pub fn invocation(target: impl Into<String>, arguments: Vec<Value>) -> Self {
        Self {
            kind: MessageKind::Invocation,
            headers: HashMap::new(),
            invocation_id: None,
            target: Some(target.into()),
            arguments: Some(arguments),
            error: None,
        }
    }

    /// Build a keep-alive ping.
    pub fn ping() -> Self {
        Self {
            kind: MessageKind::Ping,
            headers: HashMap::new(),
            invocation_id: None,
            target: None,
            arguments: None,
            error: None,
        }
    }

    /// Argument values, empty when the envelope carries none.
    pub fn args(&self) -> &[Value] {
        self.arguments.as_deref().unwrap_or_default()
    }

    /// Split an invocation into its target and arguments.
    ///
    /// Fails with [`HubError::Frame`] when the target is missing or empty.
    pub fn into_call(self) -> Result<(String, Vec<Value>)> {
        match self.target {
            Some(target) if !target.is_empty() => {
                Ok((target, self.arguments.unwrap_or_default()))
            }
            _ => Err(HubError::Frame(format!("{} without target", self.kind))),
        }
    }
}

/// Handshake request, the first frame sent on a new socket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandshakeRequest {
    /// Sub-protocol name.
    pub protocol: String,
    /// Sub-protocol version.
    pub version: u32,
}

impl Default for HandshakeRequest {
    fn default() -> Self {
        Self {
            protocol: PROTOCOL_NAME.to_string(),
            version: PROTOCOL_VERSION,
        }
    }
}

/// Handshake response. An absent or empty error means success.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct HandshakeResponse {
    /// Server-supplied rejection reason.
    #[serde(default)]
    pub error: Option<String>,
}

impl HandshakeResponse {
    /// Convert into `Ok(())` or [`HubError::Handshake`].
    pub fn into_result(self) -> Result<()> {
        match self.error {
            Some(error) if !error.is_empty() => Err(HubError::Handshake(error)),
            _ => Ok(()),
        }
    }
}

/// One transport advertised by the negotiate endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AvailableTransport {
    /// Transport name, e.g. `WebSockets`.
    pub transport: String,
    /// Supported transfer formats, e.g. `Text`, `Binary`.
    #[serde(default)]
    pub transport_formats: Vec<String>,
}

/// Body of a successful negotiate response.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NegotiateResponse {
    /// Connection identifier allocated by the server.
    pub connection_id: String,
    /// Separate socket token issued by newer servers.
    #[serde(default)]
    pub connection_token: Option<String>,
    /// Transports the server offers.
    #[serde(default)]
    pub available_transports: Vec<AvailableTransport>,
}

impl NegotiateResponse {
    /// Whether a transport named exactly `name` is offered.
    pub fn supports(&self, name: &str) -> bool {
        self.available_transports
            .iter()
            .any(|t| t.transport == name)
    }

    /// Identifier to put in the socket URL: the token when present,
    /// otherwise the connection id.
    pub fn socket_id(&self) -> &str {
        self.connection_token
            .as_deref()
            .filter(|token| !token.is_empty())
            .unwrap_or(&self.connection_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_message_kind_codes() {
        for code in 1..=7i64 {
            assert_eq!(MessageKind::from(code).code(), code);
        }
        assert_eq!(MessageKind::from(1), MessageKind::Invocation);
        assert_eq!(MessageKind::from(6), MessageKind::Ping);
        assert_eq!(MessageKind::from(7), MessageKind::Close);
        assert_eq!(MessageKind::from(9), MessageKind::Unknown(9));
    }

    #[test]
    fn test_out_of_byte_range_kinds_stay_unknown() {
        for code in [300, -1, i64::from(u32::MAX) + 1] {
            let envelope: Envelope = serde_json::from_value(json!({"type": code})).unwrap();
            assert_eq!(envelope.kind, MessageKind::Unknown(code));
        }
        let value = serde_json::to_value(MessageKind::Unknown(300)).unwrap();
        assert_eq!(value, json!(300));
    }

    #[test]
    fn test_invocation_serializes_without_optional_fields() {
        let envelope = Envelope::invocation("Fight", vec![json!("gobot")]);
        let value = serde_json::to_value(&envelope).unwrap();
        assert_eq!(
            value,
            json!({"type": 1, "target": "Fight", "arguments": ["gobot"]})
        );
    }

    #[test]
    fn test_invocation_with_no_arguments_keeps_empty_array() {
        let value = serde_json::to_value(Envelope::invocation("Ready", Vec::new())).unwrap();
        assert_eq!(value, json!({"type": 1, "target": "Ready", "arguments": []}));
    }

    #[test]
    fn test_ping_serializes_to_type_only() {
        let value = serde_json::to_value(Envelope::ping()).unwrap();
        assert_eq!(value, json!({"type": 6}));
    }

    #[test]
    fn test_envelope_ignores_unknown_properties() {
        let envelope: Envelope = serde_json::from_value(json!({
            "type": 7,
            "error": "server shutting down",
            "allowReconnect": true
        }))
        .unwrap();
        assert_eq!(envelope.kind, MessageKind::Close);
        assert_eq!(envelope.error.as_deref(), Some("server shutting down"));
        assert!(envelope.args().is_empty());
    }

    #[test]
    fn test_envelope_keeps_headers_and_invocation_id() {
        let envelope: Envelope = serde_json::from_value(json!({
            "type": 1,
            "headers": {"trace": "abc"},
            "invocationId": "42",
            "target": "requestStep",
            "arguments": []
        }))
        .unwrap();
        assert_eq!(envelope.headers.get("trace").map(String::as_str), Some("abc"));
        assert_eq!(envelope.invocation_id.as_deref(), Some("42"));
    }

    #[test]
    fn test_envelope_without_type_is_rejected() {
        let result = serde_json::from_value::<Envelope>(json!({"target": "x"}));
        assert!(result.is_err());
    }

    #[test]
    fn test_into_call_requires_target() {
        let envelope: Envelope =
            serde_json::from_value(json!({"type": 1, "arguments": [1]})).unwrap();
        assert!(matches!(envelope.into_call(), Err(HubError::Frame(_))));

        let envelope: Envelope =
            serde_json::from_value(json!({"type": 1, "target": "", "arguments": [1]})).unwrap();
        assert!(matches!(envelope.into_call(), Err(HubError::Frame(_))));

        let envelope = Envelope::invocation("Foo", vec![json!(1), json!("x")]);
        let (target, args) = envelope.into_call().unwrap();
        assert_eq!(target, "Foo");
        assert_eq!(args, vec![json!(1), json!("x")]);
    }

    #[test]
    fn test_handshake_request_default() {
        let value = serde_json::to_value(HandshakeRequest::default()).unwrap();
        assert_eq!(value, json!({"protocol": "json", "version": 1}));
    }

    #[test]
    fn test_handshake_response_outcomes() {
        let ok: HandshakeResponse = serde_json::from_value(json!({})).unwrap();
        assert!(ok.into_result().is_ok());

        let empty: HandshakeResponse = serde_json::from_value(json!({"error": ""})).unwrap();
        assert!(empty.into_result().is_ok());

        let failed: HandshakeResponse =
            serde_json::from_value(json!({"error": "boom"})).unwrap();
        match failed.into_result() {
            Err(HubError::Handshake(text)) => assert_eq!(text, "boom"),
            other => panic!("expected handshake error, got {other:?}"),
        }
    }

    #[test]
    fn test_negotiate_response_transport_lookup() {
        let response: NegotiateResponse = serde_json::from_value(json!({
            "connectionId": "abc123",
            "availableTransports": [
                {"transport": "ServerSentEvents", "transportFormats": ["Text"]},
                {"transport": "WebSockets", "transportFormats": ["Text", "Binary"]}
            ]
        }))
        .unwrap();
        assert!(response.supports("WebSockets"));
        assert!(!response.supports("LongPolling"));
        assert_eq!(response.socket_id(), "abc123");
    }

    #[test]
    fn test_negotiate_response_prefers_connection_token() {
        let response: NegotiateResponse = serde_json::from_value(json!({
            "connectionId": "abc123",
            "connectionToken": "tok456",
            "availableTransports": []
        }))
        .unwrap();
        assert_eq!(response.socket_id(), "tok456");
    }
}
