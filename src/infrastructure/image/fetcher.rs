//! Fetch, decode and optionally persist a single image.

use std::path::Path;
use std::sync::Arc;

use bytes::Bytes;
use tracing::{debug, warn};

use crate::domain::entities::{FetchRequest, FetchSource};
use crate::domain::errors::{CacheError, CacheResult};
use crate::domain::ports::{ImageDecoderPort, TransportPort};

use super::disk_cache::DiskImageCache;
use super::in_flight::Epoch;

/// Result of a successful fetch.
#[derive(Debug, Clone)]
pub struct Fetched {
    /// The decoded image.
    pub image: Arc<image::DynamicImage>,
    /// Set when a persist target was given and writing to it failed.
    pub persist_error: Option<CacheError>,
}

/// Turns a [`FetchRequest`] into a decoded image.
///
/// Remote and local sources share one path: read bytes, decode on the blocking
/// pool, then write the raw bytes to the persist target if one was requested.
#[derive(Clone)]
pub struct FetchCoordinator {
    transport: Arc<dyn TransportPort>,
    decoder: Arc<dyn ImageDecoderPort>,
    disk_cache: DiskImageCache,
}

impl std::fmt::Debug for FetchCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FetchCoordinator")
            .field("disk_cache", &self.disk_cache)
            .finish_non_exhaustive()
    }
}

impl FetchCoordinator {
    /// Creates a coordinator writing through `disk_cache`.
    #[must_use]
    pub fn new(
        transport: Arc<dyn TransportPort>,
        decoder: Arc<dyn ImageDecoderPort>,
        disk_cache: DiskImageCache,
    ) -> Self {
        Self {
            transport,
            decoder,
            disk_cache,
        }
    }

    /// Fetches and decodes the request's source.
    ///
    /// Bytes are persisted only after they decode. A failed write is logged and
    /// reported through [`Fetched::persist_error`]; the image is still returned.
    ///
    /// # Errors
    /// Returns a network or I/O error if the bytes cannot be read, or a decode
    /// error if they are not an image.
    pub async fn fetch(&self, request: FetchRequest) -> CacheResult<Fetched> {
        self.run(request, None).await
    }

    /// Like [`FetchCoordinator::fetch`], but skips the write if the tier was
    /// cleared after `epoch` began.
    ///
    /// # Errors
    /// Same as `fetch`.
    pub async fn fetch_in(&self, request: FetchRequest, epoch: &Epoch) -> CacheResult<Fetched> {
        self.run(request, Some(epoch)).await
    }

    async fn run(&self, request: FetchRequest, epoch: Option<&Epoch>) -> CacheResult<Fetched> {
        let bytes = self.read_source(&request.source).await?;

        let decoder = self.decoder.clone();
        let bytes_for_decode = bytes.clone();
        let decoded = tokio::task::spawn_blocking(move || decoder.decode(&bytes_for_decode))
            .await
            .map_err(|e| CacheError::decode(format!("Decode task panicked: {e}")))?
            .inspect_err(|e| {
                warn!(source = %request.source, error = %e, "Failed to decode image");
            })?;

        let persist_error = match &request.persist_to {
            Some(path) => self.persist(&bytes, path, epoch).await,
            None => None,
        };

        debug!(
            source = %request.source,
            width = decoded.width(),
            height = decoded.height(),
            "Image fetched"
        );

        Ok(Fetched {
            image: Arc::new(decoded),
            persist_error,
        })
    }

    async fn persist(
        &self,
        bytes: &Bytes,
        path: &Path,
        epoch: Option<&Epoch>,
    ) -> Option<CacheError> {
        let _admitted = match epoch {
            Some(epoch) => {
                let Some(guard) = epoch.admit().await else {
                    debug!(path = %path.display(), "Cache cleared during fetch, not persisting");
                    return None;
                };
                Some(guard)
            }
            None => None,
        };

        match self.disk_cache.write(bytes, path).await {
            Ok(()) => None,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Failed to cache to disk");
                Some(e)
            }
        }
    }

    async fn read_source(&self, source: &FetchSource) -> CacheResult<Bytes> {
        match source {
            FetchSource::Remote(url) => self.transport.get(url).await,
            FetchSource::Local(path) => tokio::fs::read(path)
                .await
                .map(Bytes::from)
                .map_err(|e| CacheError::io(format!("Failed to read {}: {e}", path.display()))),
        }
    }
}
