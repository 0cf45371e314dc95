//! imagecache - fetch remote images through a disk or memory cache.
//!
//! The crate is split the clean-architecture way: the domain layer holds keys,
//! errors and port traits; the infrastructure layer implements the tiers, the
//! fetch pipeline, the HTTP transport and configuration, and composes them into
//! [`ImageCache`](infrastructure::ImageCache).

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

/// Domain layer containing entities, errors, and port definitions.
pub mod domain;
/// Infrastructure layer containing adapters for external services.
pub mod infrastructure;

pub use domain::{CacheError, CacheKey, CacheResult, ConfigError, ImageSource, LoadedImage};
pub use infrastructure::{ImageCache, ImageCacheBuilder, ImageLoadedEvent, MemoryImageCache};

/// Current version of the crate.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name.
pub const NAME: &str = "imagecache";
