//! Byte transport port definition.

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::Url;

use crate::domain::errors::CacheResult;

/// Port for downloading raw bytes from a remote location.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TransportPort: Send + Sync {
    /// Performs a GET and returns the full response body.
    ///
    /// Non-success statuses are reported as `CacheError::Network`.
    async fn get(&self, url: &Url) -> CacheResult<Bytes>;
}
