//! Image handling infrastructure.
//!
//! This module provides:
//! - Memory caching of decoded images
//! - Disk caching of raw bytes with atomic writes
//! - File suffix derivation from URLs
//! - The fetch/decode/persist pipeline and its default HTTP transport
//! - The `ImageCache` facade with per-key fetch coalescing

pub mod decoder;
pub mod disk_cache;
pub mod extension;
pub mod fetcher;
pub mod http_transport;
pub mod in_flight;
pub mod loader;
pub mod memory_cache;

pub use decoder::StandardDecoder;
pub use disk_cache::DiskImageCache;
pub use extension::{extension_of, extension_of_str};
pub use fetcher::{FetchCoordinator, Fetched};
pub use http_transport::ReqwestTransport;
pub use in_flight::{Epoch, InFlight, SharedLoad};
pub use loader::{ImageCache, ImageCacheBuilder, ImageLoadedEvent};
pub use memory_cache::{CacheStats, MemoryImageCache};
