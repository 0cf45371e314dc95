//! Domain layer with core cache entities and port definitions.

/// Entity definitions.
pub mod entities;
/// Error types.
pub mod errors;
/// Port definitions.
pub mod ports;

pub use entities::{CacheKey, CacheTier, FetchRequest, FetchSource, ImageSource, LoadedImage};
pub use errors::{CacheError, CacheResult, ConfigError};
pub use ports::{ImageCachePort, ImageDecoderPort, TransportPort};
