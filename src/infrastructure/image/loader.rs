//! Image cache facade.
//!
//! Two independent tiers sit in front of the network:
//! - disk: raw bytes under `<root>/<folder>/<key><ext>`, survives restarts
//! - memory: decoded images, lives as long as the cache instance
//!
//! Neither tier feeds the other. Concurrent requests for one key in one tier
//! share a single fetch.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use reqwest::Url;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::domain::entities::{CacheKey, CacheTier, FetchRequest, ImageSource, LoadedImage};
use crate::domain::errors::{CacheError, CacheResult, ConfigError};
use crate::domain::ports::{ImageCachePort, ImageDecoderPort, TransportPort};
use crate::infrastructure::config::{AppConfig, HttpConfig, validate_folder_name};

use super::decoder::StandardDecoder;
use super::disk_cache::DiskImageCache;
use super::extension::extension_of;
use super::fetcher::FetchCoordinator;
use super::http_transport::ReqwestTransport;
use super::in_flight::{Epoch, InFlight};

/// Message sent when a background request finishes.
#[derive(Debug, Clone)]
pub struct ImageLoadedEvent {
    /// The requested key.
    pub key: CacheKey,
    /// The tier the request went through.
    pub tier: CacheTier,
    /// The loaded image, or why there is none.
    pub result: CacheResult<LoadedImage>,
}

impl ImageLoadedEvent {
    /// Returns the image if the request succeeded.
    #[must_use]
    pub fn image(&self) -> Option<&Arc<image::DynamicImage>> {
        self.result.as_ref().ok().map(|loaded| &loaded.image)
    }
}

/// Builds an [`ImageCache`], validating configuration up front.
#[derive(Default)]
pub struct ImageCacheBuilder {
    folder_name: Option<String>,
    root_dir: Option<PathBuf>,
    memory_cache: Option<Arc<dyn ImageCachePort>>,
    transport: Option<Arc<dyn TransportPort>>,
    decoder: Option<Arc<dyn ImageDecoderPort>>,
    http: HttpConfig,
}

impl ImageCacheBuilder {
    /// Creates an empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds folder name, root directory and HTTP settings from `config`.
    #[must_use]
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            folder_name: config.cache.folder_name.clone(),
            root_dir: config.cache.root_dir.clone(),
            http: config.http.clone(),
            ..Self::default()
        }
    }

    /// Sets the disk cache folder name.
    #[must_use]
    pub fn folder_name(mut self, name: impl Into<String>) -> Self {
        self.folder_name = Some(name.into());
        self
    }

    /// Sets the data root the folder is created under.
    #[must_use]
    pub fn root_dir(mut self, root: impl Into<PathBuf>) -> Self {
        self.root_dir = Some(root.into());
        self
    }

    /// Sets the memory tier backing store.
    #[must_use]
    pub fn memory_cache(mut self, cache: Arc<dyn ImageCachePort>) -> Self {
        self.memory_cache = Some(cache);
        self
    }

    /// Replaces the default HTTP transport.
    #[must_use]
    pub fn transport(mut self, transport: Arc<dyn TransportPort>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Replaces the default decoder.
    #[must_use]
    pub fn decoder(mut self, decoder: Arc<dyn ImageDecoderPort>) -> Self {
        self.decoder = Some(decoder);
        self
    }

    /// Sets HTTP settings for the default transport.
    #[must_use]
    pub fn http(mut self, http: HttpConfig) -> Self {
        self.http = http;
        self
    }

    /// Validates the configuration and builds the cache.
    ///
    /// # Errors
    /// Returns error if the folder name or memory cache is missing, the folder
    /// name is not a single path component, no data root can be found, or the
    /// HTTP client cannot be created.
    pub fn build(self) -> Result<ImageCache, ConfigError> {
        let folder_name = self.folder_name.ok_or(ConfigError::MissingFolderName)?;
        validate_folder_name(&folder_name)?;

        let memory_cache = self.memory_cache.ok_or(ConfigError::MissingMemoryCache)?;

        let root_dir = match self.root_dir {
            Some(root) => root,
            None => AppConfig::default_data_root().ok_or(ConfigError::DataRootNotFound)?,
        };

        let transport: Arc<dyn TransportPort> = match self.transport {
            Some(transport) => transport,
            None => Arc::new(ReqwestTransport::new(&self.http)?),
        };
        let decoder = self
            .decoder
            .unwrap_or_else(|| Arc::new(StandardDecoder) as Arc<dyn ImageDecoderPort>);

        let disk_cache = DiskImageCache::new(&root_dir, &folder_name);
        let fetcher = FetchCoordinator::new(transport, decoder, disk_cache.clone());

        debug!(path = %disk_cache.path().display(), "Image cache configured");

        Ok(ImageCache {
            disk_cache,
            memory_cache,
            fetcher,
            disk_loads: Arc::new(InFlight::new()),
            memory_loads: Arc::new(InFlight::new()),
        })
    }
}

/// Retrieves images by key through a disk tier or a memory tier.
///
/// Cheap to clone; clones share tiers and in-flight fetches.
#[derive(Clone)]
pub struct ImageCache {
    disk_cache: DiskImageCache,
    memory_cache: Arc<dyn ImageCachePort>,
    fetcher: FetchCoordinator,
    disk_loads: Arc<InFlight>,
    memory_loads: Arc<InFlight>,
}

impl std::fmt::Debug for ImageCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageCache")
            .field("cache_dir", &self.disk_cache.path())
            .field("disk_loads", &self.disk_loads.len())
            .field("memory_loads", &self.memory_loads.len())
            .finish_non_exhaustive()
    }
}

impl ImageCache {
    /// Starts building a cache.
    #[must_use]
    pub fn builder() -> ImageCacheBuilder {
        ImageCacheBuilder::new()
    }

    /// Returns the disk cache directory (it may not exist yet).
    #[must_use]
    pub fn cache_dir(&self) -> &Path {
        self.disk_cache.path()
    }

    /// Returns the memory tier backing store.
    #[must_use]
    pub fn memory_cache(&self) -> &Arc<dyn ImageCachePort> {
        &self.memory_cache
    }

    /// Returns the file path `key` is stored under for `url`.
    #[must_use]
    pub fn local_path(&self, key: &CacheKey, url: &Url) -> PathBuf {
        self.disk_cache.entry_path(key, extension_of(url).as_deref())
    }

    /// Loads an image through the disk tier.
    ///
    /// An existing file for the key is read back; otherwise `url` is downloaded
    /// and the bytes are written to the key's file once they decode.
    ///
    /// # Errors
    /// Returns error if the key cannot name a file, or the image cannot be
    /// read, downloaded or decoded.
    pub async fn local_image(
        &self,
        key: impl Into<CacheKey>,
        url: &Url,
    ) -> CacheResult<LoadedImage> {
        let key = key.into();
        key.validate_file_stem()?;

        let (load, started) = self.disk_loads.join_or_start(&key, |epoch| {
            Self::load_local(
                self.disk_cache.clone(),
                self.fetcher.clone(),
                key.clone(),
                url.clone(),
                epoch,
            )
        });
        if !started {
            debug!(key = %key, "Joined in-flight disk load");
        }
        load.await
    }

    async fn load_local(
        disk_cache: DiskImageCache,
        fetcher: FetchCoordinator,
        key: CacheKey,
        url: Url,
        epoch: Epoch,
    ) -> CacheResult<LoadedImage> {
        let path = disk_cache.entry_path(&key, extension_of(&url).as_deref());

        let (request, source) = if disk_cache.exists(&path).await {
            trace!(key = %key, path = %path.display(), "Disk cache hit");
            (FetchRequest::local(path), ImageSource::DiskCache)
        } else {
            trace!(key = %key, "Disk cache miss");
            (
                FetchRequest::remote(url).persist_to(path),
                ImageSource::Network,
            )
        };

        let fetched = fetcher.fetch_in(request, &epoch).await?;
        debug!(key = %key, source = %source, "Image loaded successfully");

        Ok(LoadedImage {
            key,
            image: fetched.image,
            source,
            persist_error: fetched.persist_error,
        })
    }

    /// Loads an image through the memory tier.
    ///
    /// A cached image is returned without fetching. Otherwise `url` is
    /// downloaded, decoded and stored under `key`. Nothing touches the disk.
    ///
    /// # Errors
    /// Returns error if the image cannot be downloaded or decoded.
    pub async fn in_memory_image(
        &self,
        key: impl Into<CacheKey>,
        url: &Url,
    ) -> CacheResult<LoadedImage> {
        let key = key.into();

        if let Some(image) = self.memory_cache.get(&key).await {
            return Ok(LoadedImage {
                key,
                image,
                source: ImageSource::MemoryCache,
                persist_error: None,
            });
        }

        let (load, started) = self.memory_loads.join_or_start(&key, |epoch| {
            Self::load_memory(
                self.memory_cache.clone(),
                self.fetcher.clone(),
                key.clone(),
                url.clone(),
                epoch,
            )
        });
        if !started {
            debug!(key = %key, "Joined in-flight memory load");
        }
        load.await
    }

    async fn load_memory(
        memory_cache: Arc<dyn ImageCachePort>,
        fetcher: FetchCoordinator,
        key: CacheKey,
        url: Url,
        epoch: Epoch,
    ) -> CacheResult<LoadedImage> {
        let fetched = fetcher.fetch(FetchRequest::remote(url)).await?;
        if let Some(_admitted) = epoch.admit().await {
            memory_cache.put(key.clone(), fetched.image.clone()).await;
        } else {
            debug!(key = %key, "Memory cache cleared during fetch, not storing");
        }
        debug!(key = %key, source = "network", "Image loaded successfully");

        Ok(LoadedImage {
            key,
            image: fetched.image,
            source: ImageSource::Network,
            persist_error: None,
        })
    }

    /// Like [`ImageCache::local_image`], but returns `CacheError::Cancelled`
    /// as soon as `cancel` fires.
    ///
    /// A fetch already started keeps running and still writes its file.
    ///
    /// # Errors
    /// Returns the errors of `local_image`, or `Cancelled`.
    pub async fn local_image_cancellable(
        &self,
        key: impl Into<CacheKey>,
        url: &Url,
        cancel: &CancellationToken,
    ) -> CacheResult<LoadedImage> {
        tokio::select! {
            biased;
            () = cancel.cancelled() => Err(CacheError::Cancelled),
            result = self.local_image(key, url) => result,
        }
    }

    /// Like [`ImageCache::in_memory_image`], but returns
    /// `CacheError::Cancelled` as soon as `cancel` fires.
    ///
    /// # Errors
    /// Returns the errors of `in_memory_image`, or `Cancelled`.
    pub async fn in_memory_image_cancellable(
        &self,
        key: impl Into<CacheKey>,
        url: &Url,
        cancel: &CancellationToken,
    ) -> CacheResult<LoadedImage> {
        tokio::select! {
            biased;
            () = cancel.cancelled() => Err(CacheError::Cancelled),
            result = self.in_memory_image(key, url) => result,
        }
    }

    /// Loads through the disk tier in the background.
    ///
    /// Exactly one [`ImageLoadedEvent`] is sent on `reply` when the request
    /// succeeds, fails or is cancelled through the returned token.
    ///
    /// # Panics
    /// Panics if called outside a tokio runtime.
    pub fn request_local_image(
        &self,
        key: impl Into<CacheKey>,
        url: Url,
        reply: mpsc::UnboundedSender<ImageLoadedEvent>,
    ) -> CancellationToken {
        self.spawn_request(CacheTier::Disk, key.into(), url, reply)
    }

    /// Loads through the memory tier in the background.
    ///
    /// Exactly one [`ImageLoadedEvent`] is sent on `reply`.
    ///
    /// # Panics
    /// Panics if called outside a tokio runtime.
    pub fn request_in_memory_image(
        &self,
        key: impl Into<CacheKey>,
        url: Url,
        reply: mpsc::UnboundedSender<ImageLoadedEvent>,
    ) -> CancellationToken {
        self.spawn_request(CacheTier::Memory, key.into(), url, reply)
    }

    fn spawn_request(
        &self,
        tier: CacheTier,
        key: CacheKey,
        url: Url,
        reply: mpsc::UnboundedSender<ImageLoadedEvent>,
    ) -> CancellationToken {
        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let cache = self.clone();

        tokio::spawn(async move {
            let result = match tier {
                CacheTier::Disk => {
                    cache
                        .local_image_cancellable(key.clone(), &url, &token)
                        .await
                }
                CacheTier::Memory => {
                    cache
                        .in_memory_image_cancellable(key.clone(), &url, &token)
                        .await
                }
            };
            if let Err(e) = &result {
                debug!(key = %key, tier = %tier, error = %e, "Image request failed");
            }
            let event = ImageLoadedEvent { key, tier, result };
            if reply.send(event).is_err() {
                trace!(tier = %tier, "Image event receiver dropped");
            }
        });

        cancel
    }

    /// Deletes the disk cache directory.
    ///
    /// Downloads already running still answer their callers but no longer
    /// write to disk; the next request for a key fetches again.
    ///
    /// # Errors
    /// Returns `CacheError::DiskClear` if the directory cannot be removed.
    pub async fn try_clear_local_cache(&self) -> CacheResult<()> {
        self.disk_loads.invalidate(self.disk_cache.clear()).await
    }

    /// Deletes the disk cache directory, reporting success.
    pub async fn clear_local_cache(&self) -> bool {
        match self.try_clear_local_cache().await {
            Ok(()) => true,
            Err(e) => {
                warn!(error = %e, "Failed to clear disk cache");
                false
            }
        }
    }

    /// Empties the memory tier.
    ///
    /// Fetches already running are not stored when they finish.
    pub async fn clear_in_memory_cache(&self) -> bool {
        self.memory_loads.invalidate(self.memory_cache.clear()).await;
        true
    }

    /// Clears both tiers. True only if both succeeded.
    pub async fn clear_all(&self) -> bool {
        let memory = self.clear_in_memory_cache().await;
        let disk = self.clear_local_cache().await;
        info!(memory, disk, "Cleared image caches");
        memory && disk
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use crate::domain::ports::mocks::{StubTransport, png_bytes};
    use crate::infrastructure::image::MemoryImageCache;
    use tempfile::TempDir;

    const HERO_URL: &str = "http://h/a/b/hero.png";
    const PLAIN_URL: &str = "http://h/a/b/hero";

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    fn stub() -> StubTransport {
        StubTransport::new()
            .serve(HERO_URL, png_bytes(4, 3))
            .serve(PLAIN_URL, png_bytes(2, 2))
    }

    fn build(transport: Arc<StubTransport>, temp: &TempDir) -> ImageCache {
        ImageCache::builder()
            .folder_name("imageFolder")
            .root_dir(temp.path())
            .memory_cache(Arc::new(MemoryImageCache::new()))
            .transport(transport)
            .build()
            .unwrap()
    }

    #[test]
    fn test_missing_folder_name_is_config_error() {
        let result = ImageCache::builder()
            .memory_cache(Arc::new(MemoryImageCache::new()))
            .root_dir("/tmp")
            .build();
        assert!(matches!(result, Err(ConfigError::MissingFolderName)));
    }

    #[test]
    fn test_missing_memory_cache_is_config_error() {
        let result = ImageCache::builder()
            .folder_name("imageFolder")
            .root_dir("/tmp")
            .transport(Arc::new(StubTransport::new()))
            .build();
        assert!(matches!(result, Err(ConfigError::MissingMemoryCache)));
    }

    #[test]
    fn test_invalid_folder_names_rejected() {
        for name in ["", "  ", "..", "a/b"] {
            let result = ImageCache::builder()
                .folder_name(name)
                .root_dir("/tmp")
                .memory_cache(Arc::new(MemoryImageCache::new()))
                .transport(Arc::new(StubTransport::new()))
                .build();
            assert!(
                matches!(result, Err(ConfigError::InvalidFolderName { .. })),
                "{name:?} accepted"
            );
        }
    }

    #[test]
    fn test_cache_dir_layout() {
        let temp = TempDir::new().unwrap();
        let cache = build(Arc::new(stub()), &temp);

        assert_eq!(cache.cache_dir(), temp.path().join("imageFolder"));
        assert_eq!(
            cache.local_path(&CacheKey::new("uniqueKey"), &url(HERO_URL)),
            temp.path().join("imageFolder").join("uniqueKey.png")
        );
    }

    #[tokio::test]
    async fn test_local_image_round_trip() {
        let temp = TempDir::new().unwrap();
        let transport = Arc::new(stub());
        let cache = build(transport.clone(), &temp);

        let loaded = cache.local_image("k1", &url(HERO_URL)).await.unwrap();
        assert_eq!(loaded.source, ImageSource::Network);
        assert!(loaded.is_persisted());

        let path = temp.path().join("imageFolder").join("k1.png");
        let on_disk = image::open(&path).unwrap();
        assert_eq!(on_disk.to_rgb8(), loaded.image.to_rgb8());
    }

    #[tokio::test]
    async fn test_local_image_without_extension() {
        let temp = TempDir::new().unwrap();
        let cache = build(Arc::new(stub()), &temp);

        cache.local_image("k2", &url(PLAIN_URL)).await.unwrap();
        assert!(temp.path().join("imageFolder").join("k2").is_file());
    }

    #[tokio::test]
    async fn test_second_local_call_served_from_disk() {
        let temp = TempDir::new().unwrap();
        let transport = Arc::new(stub());
        let cache = build(transport.clone(), &temp);

        let first = cache.local_image("k1", &url(HERO_URL)).await.unwrap();
        let second = cache.local_image("k1", &url(HERO_URL)).await.unwrap();

        assert_eq!(transport.calls(), 1);
        assert_eq!(first.source, ImageSource::Network);
        assert_eq!(second.source, ImageSource::DiskCache);
        assert_eq!(second.image.width(), 4);
    }

    #[tokio::test]
    async fn test_clear_local_cache_forces_refetch() {
        let temp = TempDir::new().unwrap();
        let transport = Arc::new(stub());
        let cache = build(transport.clone(), &temp);

        cache.local_image("k1", &url(HERO_URL)).await.unwrap();
        assert!(cache.clear_local_cache().await);
        assert!(!cache.cache_dir().exists());

        let again = cache.local_image("k1", &url(HERO_URL)).await.unwrap();
        assert_eq!(again.source, ImageSource::Network);
        assert_eq!(transport.calls(), 2);
        assert!(cache.cache_dir().join("k1.png").is_file());
    }

    #[tokio::test]
    async fn test_in_memory_miss_then_hit() {
        let temp = TempDir::new().unwrap();
        let transport = Arc::new(stub());
        let cache = build(transport.clone(), &temp);

        assert!(cache.memory_cache().get(&CacheKey::new("uniqueKey")).await.is_none());

        let first = cache.in_memory_image("uniqueKey", &url(HERO_URL)).await.unwrap();
        let stored = cache.memory_cache().get(&CacheKey::new("uniqueKey")).await.unwrap();
        assert!(Arc::ptr_eq(&first.image, &stored));

        let second = cache.in_memory_image("uniqueKey", &url(HERO_URL)).await.unwrap();
        assert_eq!(second.source, ImageSource::MemoryCache);
        assert!(Arc::ptr_eq(&first.image, &second.image));
        assert_eq!(transport.calls(), 1);
        assert!(!cache.cache_dir().exists());
    }

    #[tokio::test]
    async fn test_clear_in_memory_cache_forces_refetch() {
        let temp = TempDir::new().unwrap();
        let transport = Arc::new(stub());
        let cache = build(transport.clone(), &temp);

        cache.in_memory_image("k1", &url(HERO_URL)).await.unwrap();
        assert!(cache.clear_in_memory_cache().await);
        assert!(cache.memory_cache().is_empty());

        let again = cache.in_memory_image("k1", &url(HERO_URL)).await.unwrap();
        assert_eq!(again.source, ImageSource::Network);
        assert_eq!(transport.calls(), 2);
    }

    #[tokio::test]
    async fn test_tiers_are_independent() {
        let temp = TempDir::new().unwrap();
        let transport = Arc::new(stub());
        let cache = build(transport.clone(), &temp);

        cache.local_image("k1", &url(HERO_URL)).await.unwrap();
        // The disk entry does not seed the memory tier.
        let mem = cache.in_memory_image("k1", &url(HERO_URL)).await.unwrap();
        assert_eq!(mem.source, ImageSource::Network);
        assert_eq!(transport.calls(), 2);
        assert_eq!(std::fs::read_dir(cache.cache_dir()).unwrap().count(), 1);

        cache.clear_in_memory_cache().await;
        let disk = cache.local_image("k1", &url(HERO_URL)).await.unwrap();
        assert_eq!(disk.source, ImageSource::DiskCache);

        cache.in_memory_image("k1", &url(HERO_URL)).await.unwrap();
        cache.clear_local_cache().await;
        let mem = cache.in_memory_image("k1", &url(HERO_URL)).await.unwrap();
        assert_eq!(mem.source, ImageSource::MemoryCache);
        assert_eq!(transport.calls(), 3);
    }

    #[tokio::test]
    async fn test_clear_all() {
        let temp = TempDir::new().unwrap();
        let cache = build(Arc::new(stub()), &temp);

        cache.local_image("k1", &url(HERO_URL)).await.unwrap();
        cache.in_memory_image("k1", &url(HERO_URL)).await.unwrap();

        assert!(cache.clear_all().await);
        assert!(cache.memory_cache().is_empty());
        assert!(!cache.cache_dir().exists());
    }

    fn spawn_memory_load(
        cache: &ImageCache,
        key: &'static str,
    ) -> tokio::task::JoinHandle<CacheResult<LoadedImage>> {
        let cache = cache.clone();
        tokio::spawn(async move { cache.in_memory_image(key, &url(HERO_URL)).await })
    }

    #[tokio::test]
    async fn test_memory_fetch_finishing_after_clear_is_not_stored() {
        let temp = TempDir::new().unwrap();
        let transport = Arc::new(stub().with_delay(Duration::from_millis(100)));
        let cache = build(transport.clone(), &temp);

        let early = spawn_memory_load(&cache, "k1");
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(cache.clear_in_memory_cache().await);

        let early = early.await.unwrap().unwrap();
        assert_eq!(early.source, ImageSource::Network);
        assert!(cache.memory_cache().is_empty());

        let late = cache.in_memory_image("k1", &url(HERO_URL)).await.unwrap();
        assert_eq!(late.source, ImageSource::Network);
        assert_eq!(transport.calls(), 2);
    }

    #[tokio::test]
    async fn test_memory_request_after_clear_does_not_join_old_fetch() {
        let temp = TempDir::new().unwrap();
        let transport = Arc::new(stub().with_delay(Duration::from_millis(100)));
        let cache = build(transport.clone(), &temp);

        let early = spawn_memory_load(&cache, "k1");
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(cache.clear_in_memory_cache().await);

        let late = cache.in_memory_image("k1", &url(HERO_URL)).await.unwrap();
        assert!(early.await.unwrap().is_ok());

        assert_eq!(transport.calls(), 2);
        let stored = cache.memory_cache().get(&CacheKey::new("k1")).await.unwrap();
        assert!(Arc::ptr_eq(&stored, &late.image));
    }

    #[tokio::test]
    async fn test_download_finishing_after_clear_is_not_written() {
        let temp = TempDir::new().unwrap();
        let transport = Arc::new(stub().with_delay(Duration::from_millis(100)));
        let cache = build(transport.clone(), &temp);
        let path = cache.local_path(&CacheKey::new("k1"), &url(HERO_URL));

        let early = {
            let cache = cache.clone();
            tokio::spawn(async move { cache.local_image("k1", &url(HERO_URL)).await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(cache.clear_local_cache().await);

        let early = early.await.unwrap().unwrap();
        assert_eq!(early.source, ImageSource::Network);
        assert!(early.persist_error.is_none());
        assert!(!path.exists());

        let late = cache.local_image("k1", &url(HERO_URL)).await.unwrap();
        assert_eq!(late.source, ImageSource::Network);
        assert_eq!(transport.calls(), 2);
        assert!(path.is_file());
    }

    #[tokio::test]
    async fn test_concurrent_local_requests_share_one_fetch() {
        let temp = TempDir::new().unwrap();
        let transport = Arc::new(stub().with_delay(Duration::from_millis(100)));
        let cache = build(transport.clone(), &temp);
        let hero = url(HERO_URL);

        let results = futures_util::future::join_all(
            (0..5).map(|_| cache.local_image("k1", &hero)),
        )
        .await;

        assert!(results.iter().all(Result::is_ok));
        assert_eq!(transport.calls(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_memory_requests_share_one_fetch() {
        let temp = TempDir::new().unwrap();
        let transport = Arc::new(stub().with_delay(Duration::from_millis(100)));
        let cache = build(transport.clone(), &temp);
        let hero = url(HERO_URL);

        let results = futures_util::future::join_all(
            (0..5).map(|_| cache.in_memory_image("k1", &hero)),
        )
        .await;

        let images: Vec<_> = results.into_iter().map(Result::unwrap).collect();
        assert!(images.iter().all(|l| Arc::ptr_eq(&l.image, &images[0].image)));
        assert_eq!(transport.calls(), 1);
    }

    #[tokio::test]
    async fn test_network_failure_is_reported_and_not_cached() {
        let temp = TempDir::new().unwrap();
        let transport = Arc::new(stub());
        let cache = build(transport.clone(), &temp);
        let missing = url("http://h/missing.png");

        let err = cache.local_image("k1", &missing).await.unwrap_err();
        assert!(err.is_network_error());
        assert!(!cache.cache_dir().join("k1.png").exists());

        let err = cache.in_memory_image("k1", &missing).await.unwrap_err();
        assert!(err.is_network_error());
        assert!(cache.memory_cache().is_empty());
    }

    #[tokio::test]
    async fn test_undecodable_download_not_persisted() {
        let temp = TempDir::new().unwrap();
        let transport = Arc::new(
            StubTransport::new().serve(HERO_URL, bytes::Bytes::from_static(b"not an image")),
        );
        let cache = build(transport.clone(), &temp);

        let err = cache.local_image("k1", &url(HERO_URL)).await.unwrap_err();
        assert!(err.is_decode_error());
        assert!(!cache.cache_dir().join("k1.png").exists());

        cache.local_image("k1", &url(HERO_URL)).await.unwrap_err();
        assert_eq!(transport.calls(), 2);
    }

    #[tokio::test]
    async fn test_invalid_key_rejected_before_fetch() {
        let temp = TempDir::new().unwrap();
        let transport = Arc::new(stub());
        let cache = build(transport.clone(), &temp);

        let err = cache.local_image("../escape", &url(HERO_URL)).await.unwrap_err();
        assert!(matches!(err, CacheError::InvalidKey { .. }));
        assert_eq!(transport.calls(), 0);
    }

    #[tokio::test]
    async fn test_cancelled_before_start() {
        let temp = TempDir::new().unwrap();
        let transport = Arc::new(stub());
        let cache = build(transport.clone(), &temp);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = cache
            .local_image_cancellable("k1", &url(HERO_URL), &cancel)
            .await
            .unwrap_err();
        assert!(err.is_cancelled());
        assert_eq!(transport.calls(), 0);
    }

    #[tokio::test]
    async fn test_cancel_detaches_but_fetch_completes() {
        let temp = TempDir::new().unwrap();
        let transport = Arc::new(stub().with_delay(Duration::from_millis(100)));
        let cache = build(transport.clone(), &temp);
        let cancel = CancellationToken::new();

        let canceller = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            canceller.cancel();
        });

        let err = cache
            .local_image_cancellable("k1", &url(HERO_URL), &cancel)
            .await
            .unwrap_err();
        assert!(err.is_cancelled());

        let loaded = cache.local_image("k1", &url(HERO_URL)).await.unwrap();
        assert_eq!(loaded.image.width(), 4);
        assert_eq!(transport.calls(), 1);
        assert!(cache.cache_dir().join("k1.png").is_file());
    }

    #[tokio::test]
    async fn test_request_delivers_exactly_one_event() {
        let temp = TempDir::new().unwrap();
        let cache = build(Arc::new(stub()), &temp);
        let (tx, mut rx) = mpsc::unbounded_channel();

        cache.request_local_image("k1", url(HERO_URL), tx.clone());
        cache.request_in_memory_image("k2", url("http://h/missing.png"), tx);

        let mut events = Vec::new();
        while let Some(event) = rx.recv().await {
            events.push(event);
        }
        events.sort_by(|a, b| a.key.cmp(&b.key));

        assert_eq!(events.len(), 2);
        assert_eq!(events[0].key, CacheKey::new("k1"));
        assert_eq!(events[0].tier, CacheTier::Disk);
        assert!(events[0].image().is_some());
        assert_eq!(events[1].tier, CacheTier::Memory);
        assert!(events[1].image().is_none());
    }

    #[tokio::test]
    async fn test_request_cancellation_sends_cancelled_event() {
        let temp = TempDir::new().unwrap();
        let transport = Arc::new(stub().with_delay(Duration::from_millis(200)));
        let cache = build(transport, &temp);
        let (tx, mut rx) = mpsc::unbounded_channel();

        let token = cache.request_in_memory_image("k1", url(HERO_URL), tx);
        token.cancel();

        let event = rx.recv().await.unwrap();
        assert!(matches!(event.result, Err(CacheError::Cancelled)));
        assert!(rx.recv().await.is_none());
    }
}
