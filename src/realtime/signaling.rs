//! SDP offer/answer exchange with the realtime endpoint.

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use tracing::debug;

use super::config::RealtimeConfiguration;
use crate::error::ParleyError;

/// Exchanges a local SDP offer for the remote answer.
#[async_trait]
pub trait SdpSignaler: Send + Sync {
    async fn exchange(
        &self,
        offer: &str,
        config: &RealtimeConfiguration,
    ) -> Result<String, ParleyError>;
}

/// `POST {base_url}?model={model}` with a bearer token and `application/sdp` body.
#[derive(Debug, Clone, Default)]
pub struct HttpSignaler {
    client: reqwest::Client,
}

impl HttpSignaler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl SdpSignaler for HttpSignaler {
    async fn exchange(
        &self,
        offer: &str,
        config: &RealtimeConfiguration,
    ) -> Result<String, ParleyError> {
        let url = config.signaling_url()?;
        debug!(url = %url, offer_len = offer.len(), "posting SDP offer");

        let response = self
            .client
            .post(&url)
            .header(AUTHORIZATION, format!("Bearer {}", config.api_key))
            .header(CONTENT_TYPE, "application/sdp")
            .body(offer.to_string())
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(status_to_error(status.as_u16(), &body));
        }
        if body.trim().is_empty() {
            return Err(ParleyError::Signaling(
                "Realtime endpoint returned an empty SDP answer".into(),
            ));
        }
        debug!(status = status.as_u16(), answer_len = body.len(), "received SDP answer");
        Ok(body)
    }
}

/// Map a failed signaling status to an error.
pub fn status_to_error(status: u16, body: &str) -> ParleyError {
    match status {
        401 | 403 => ParleyError::Authentication(body.to_string()),
        _ => ParleyError::api(status, body),
    }
}
