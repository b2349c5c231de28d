//! Negotiate request.

use reqwest::header::CONTENT_TYPE;

use super::{Connection, HubState};
use crate::constants::WEBSOCKETS_TRANSPORT;
use crate::error::{HubError, Result};
use crate::protocol::NegotiateResponse;

impl Connection {
    /// Obtain the socket identifier, negotiating on the first call only.
    ///
    /// Later calls return the cached identifier without any HTTP request.
    /// Concurrent first calls wait on the same request.
    pub async fn negotiate(&self) -> Result<String> {
        self.ensure_reusable()?;

        let mut cached = self.socket_id.lock().await;
        if let Some(id) = cached.as_ref() {
            return Ok(id.clone());
        }

        let response = self.request_negotiation().await?;
        if !response.supports(WEBSOCKETS_TRANSPORT) {
            let offered: Vec<&str> = response
                .available_transports
                .iter()
                .map(|t| t.transport.as_str())
                .collect();
            return Err(HubError::Negotiation(format!(
                "server does not offer {WEBSOCKETS_TRANSPORT} (offered: {offered:?})"
            )));
        }

        let id = response.socket_id().to_string();
        log::info!("Negotiated connection {} on hub {}", response.connection_id, self.hub);
        *cached = Some(id.clone());
        drop(cached);

        self.set_state(HubState::Negotiated);
        Ok(id)
    }

    async fn request_negotiation(&self) -> Result<NegotiateResponse> {
        let url = self.negotiate_url();
        log::debug!("POST {}", url);

        let mut request = self.http.post(&url).header(CONTENT_TYPE, "application/json");
        if let Some(token) = &self.access_token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| HubError::Negotiation(format!("request to {url} failed: {e}")))?;

        let status = response.status();
        if status.is_client_error() || status.is_server_error() {
            return Err(HubError::Negotiation(status.to_string()));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| HubError::Negotiation(format!("failed to read response: {e}")))?;

        serde_json::from_slice(&body)
            .map_err(|e| HubError::Negotiation(format!("invalid negotiate response: {e}")))
    }
}
