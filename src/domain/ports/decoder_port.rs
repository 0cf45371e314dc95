//! Image decoder port definition.

use crate::domain::errors::CacheResult;

/// Port for turning raw bytes into a decoded image.
///
/// Decoding is CPU bound; callers run it on the blocking pool.
pub trait ImageDecoderPort: Send + Sync {
    /// Decodes `bytes` into an image.
    ///
    /// # Errors
    /// Returns `CacheError::Decode` if the payload is not a supported image.
    fn decode(&self, bytes: &[u8]) -> CacheResult<image::DynamicImage>;
}
