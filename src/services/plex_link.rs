// Plex device linking
// The screen shows a short code, the user enters it at plex.tv/link and
// the pin resource starts carrying an auth token.

use anyhow::Context;
use reqwest::{Client, RequestBuilder};
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;

const PLEX_TV_BASE: &str = "https://plex.tv";
const PLEX_PRODUCT: &str = "Plex Dream";

pub const DEFAULT_LINK_TIMEOUT: Duration = Duration::from_secs(300);
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);

#[derive(Debug, Error)]
pub enum LinkError {
    #[error("plex.tv rejected the request: {0}")]
    Rejected(reqwest::StatusCode),

    #[error("timed out after {0:?} waiting for the device to be linked")]
    Timeout(Duration),

    #[error(transparent)]
    Request(#[from] anyhow::Error),
}

/// Code the user types in at the link URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkCode {
    pub pin_id: u64,
    pub code: String,
    pub link_url: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PinResponse {
    id: u64,
    code: String,
    auth_token: Option<String>,
}

pub struct PlexLinkClient {
    client: Client,
    client_identifier: String,
    base_url: String,
}

impl PlexLinkClient {
    pub fn new(client_identifier: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            client_identifier: client_identifier.into(),
            base_url: PLEX_TV_BASE.to_string(),
        }
    }

    #[cfg(test)]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn with_plex_headers(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .header("X-Plex-Product", PLEX_PRODUCT)
            .header("X-Plex-Version", env!("CARGO_PKG_VERSION"))
            .header("X-Plex-Client-Identifier", &self.client_identifier)
            .header("X-Plex-Device", "Screensaver")
            .header("X-Plex-Device-Name", "Plex Dream")
            .header("X-Plex-Platform", std::env::consts::OS)
            .header("Accept", "application/json")
    }

    /// Request a short (non-strong) pin for the user to enter
    pub async fn request_pin(&self) -> Result<LinkCode, LinkError> {
        let url = format!("{}/api/v2/pins", self.base_url);
        let response = self
            .with_plex_headers(self.client.post(&url))
            .form(&[("strong", "false")])
            .send()
            .await
            .context("Failed to request pin from plex.tv")?;

        if !response.status().is_success() {
            return Err(LinkError::Rejected(response.status()));
        }

        let pin: PinResponse = response
            .json()
            .await
            .context("Failed to parse pin response")?;

        tracing::debug!("Requested link pin {} ({})", pin.id, pin.code);

        Ok(LinkCode {
            pin_id: pin.id,
            link_url: format!("{}/link#!?code={}", PLEX_TV_BASE, pin.code),
            code: pin.code,
        })
    }

    /// Auth token once the user has entered the code, `None` until then
    pub async fn check_pin(&self, pin_id: u64) -> Result<Option<String>, LinkError> {
        let url = format!("{}/api/v2/pins/{}", self.base_url, pin_id);
        let response = self
            .with_plex_headers(self.client.get(&url))
            .send()
            .await
            .context("Failed to check pin")?;

        if !response.status().is_success() {
            return Err(LinkError::Rejected(response.status()));
        }

        let pin: PinResponse = response
            .json()
            .await
            .context("Failed to parse pin check response")?;

        Ok(pin.auth_token.filter(|t| !t.is_empty()))
    }

    /// Poll until the pin is claimed or `timeout` elapses.
    /// A failed check aborts the flow.
    pub async fn poll_for_auth(
        &self,
        pin_id: u64,
        timeout: Duration,
        interval: Duration,
    ) -> Result<String, LinkError> {
        let deadline = tokio::time::Instant::now() + timeout;
        let mut attempts = 0u32;

        while tokio::time::Instant::now() < deadline {
            attempts += 1;
            if let Some(token) = self.check_pin(pin_id).await? {
                tracing::info!("Device linked after {} checks", attempts);
                return Ok(token);
            }
            tracing::debug!("Pin {} not linked yet, waiting {:?}", pin_id, interval);
            tokio::time::sleep(interval).await;
        }

        tracing::warn!("Gave up on pin {} after {} checks", pin_id, attempts);
        Err(LinkError::Timeout(timeout))
    }
}
