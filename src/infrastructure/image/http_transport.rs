//! HTTP transport for downloading image bytes.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{Client, Url};
use tracing::debug;

use crate::domain::errors::{CacheError, CacheResult, ConfigError};
use crate::domain::ports::TransportPort;
use crate::infrastructure::config::HttpConfig;

/// `reqwest` backed transport.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    /// Creates a transport from HTTP settings.
    ///
    /// # Errors
    /// Returns error if HTTP client creation fails.
    pub fn new(config: &HttpConfig) -> Result<Self, ConfigError> {
        let client = Client::builder()
            .user_agent(config.user_agent.as_str())
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ConfigError::Http(e.to_string()))?;

        Ok(Self { client })
    }

    /// Wraps an existing client.
    #[must_use]
    pub const fn with_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl TransportPort for ReqwestTransport {
    async fn get(&self, url: &Url) -> CacheResult<Bytes> {
        debug!(url = %url, "Downloading image from network");

        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| CacheError::network(format!("Request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(CacheError::network(format!(
                "HTTP {}: {}",
                status.as_u16(),
                status.canonical_reason().unwrap_or("Unknown")
            )));
        }

        response
            .bytes()
            .await
            .map_err(|e| CacheError::network(format!("Failed to read body: {e}")))
    }
}
