//! Default image decoder backed by the `image` crate.

use crate::domain::errors::{CacheError, CacheResult};
use crate::domain::ports::ImageDecoderPort;

/// Decodes any format the `image` crate was built with, guessing from content.
#[derive(Debug, Clone, Copy, Default)]
pub struct StandardDecoder;

impl ImageDecoderPort for StandardDecoder {
    fn decode(&self, bytes: &[u8]) -> CacheResult<image::DynamicImage> {
        image::load_from_memory(bytes)
            .map_err(|e| CacheError::decode(format!("Failed to decode image: {e}")))
    }
}
