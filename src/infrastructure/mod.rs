//! Infrastructure layer with external service adapters.

/// Application configuration.
pub mod config;
/// Image handling (caching, fetching, decoding).
pub mod image;

pub use self::config::{AppConfig, CacheConfig, CliArgs, Command, ConfigFile, HttpConfig, LogLevel};
pub use self::image::{
    CacheStats, DiskImageCache, FetchCoordinator, Fetched, ImageCache, ImageCacheBuilder,
    ImageLoadedEvent, MemoryImageCache, ReqwestTransport, StandardDecoder, extension_of,
    extension_of_str,
};
