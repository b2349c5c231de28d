//! Record-separator framing.
//!
//! Every frame is one JSON document followed by a single `0x1E` byte:
//!
//! ```text
//! {"type":1,"target":"requestStep","arguments":[]}␞
//! ```
//!
//! The decoder assumes one document per buffer. Several frames coalesced
//! into one buffer fail to parse and surface as [`HubError::Frame`].

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::constants::RECORD_SEPARATOR;
use crate::error::{HubError, Result};

/// Serialize `message` as JSON and append the record separator.
pub fn encode<T: Serialize>(message: &T) -> Result<Vec<u8>> {
    let mut bytes = serde_json::to_vec(message).map_err(|e| HubError::Encode(e.to_string()))?;
    bytes.push(RECORD_SEPARATOR);
    Ok(bytes)
}

/// Strip one trailing record separator, if present, and parse the rest.
pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    let payload = bytes.strip_suffix(&[RECORD_SEPARATOR]).unwrap_or(bytes);
    if payload.is_empty() {
        return Err(HubError::Frame("empty frame".to_string()));
    }
    serde_json::from_slice(payload).map_err(|e| HubError::Frame(e.to_string()))
}
