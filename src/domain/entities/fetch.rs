//! Domain types for image fetching and caching.

use std::path::PathBuf;
use std::sync::Arc;

use reqwest::Url;

use super::CacheKey;
use crate::domain::errors::CacheError;

/// Where bytes for a fetch come from.
///
/// Local files and remote URLs go through the same fetch path so a disk hit and
/// a network miss share decoding and error handling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchSource {
    /// Remote resource fetched through the transport.
    Remote(Url),
    /// File on the local filesystem.
    Local(PathBuf),
}

impl std::fmt::Display for FetchSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Remote(url) => write!(f, "{url}"),
            Self::Local(path) => write!(f, "{}", path.display()),
        }
    }
}

/// A single fetch: a source and an optional path to persist raw bytes to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    /// Location of the bytes.
    pub source: FetchSource,
    /// Where to atomically write the raw bytes after a successful decode.
    pub persist_to: Option<PathBuf>,
}

impl FetchRequest {
    /// Fetch from a remote URL without persisting.
    #[must_use]
    pub const fn remote(url: Url) -> Self {
        Self {
            source: FetchSource::Remote(url),
            persist_to: None,
        }
    }

    /// Read a local file.
    #[must_use]
    pub const fn local(path: PathBuf) -> Self {
        Self {
            source: FetchSource::Local(path),
            persist_to: None,
        }
    }

    /// Sets the persist target.
    #[must_use]
    pub fn persist_to(mut self, path: PathBuf) -> Self {
        self.persist_to = Some(path);
        self
    }
}

/// Where an image was loaded from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageSource {
    /// Served from the in-memory tier.
    MemoryCache,
    /// Read back from a file in the disk tier.
    DiskCache,
    /// Downloaded from network.
    Network,
}

impl std::fmt::Display for ImageSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MemoryCache => write!(f, "memory"),
            Self::DiskCache => write!(f, "disk"),
            Self::Network => write!(f, "network"),
        }
    }
}

/// Which cache tier a request went through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheTier {
    /// Files under the cache directory.
    Disk,
    /// Decoded images held by the memory cache.
    Memory,
}

impl std::fmt::Display for CacheTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Disk => write!(f, "disk"),
            Self::Memory => write!(f, "memory"),
        }
    }
}

/// A successfully loaded image.
#[derive(Debug, Clone)]
pub struct LoadedImage {
    /// The key the image was requested under.
    pub key: CacheKey,
    /// The decoded image.
    pub image: Arc<image::DynamicImage>,
    /// Where the image came from.
    pub source: ImageSource,
    /// Set when the image was downloaded but writing it to disk failed.
    pub persist_error: Option<CacheError>,
}

impl LoadedImage {
    /// Returns true if the fetched bytes were written to the disk tier or did
    /// not need to be.
    #[must_use]
    pub const fn is_persisted(&self) -> bool {
        self.persist_error.is_none()
    }
}
