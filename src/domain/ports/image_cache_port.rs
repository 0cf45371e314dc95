//! Port definition for the in-memory image tier.

use std::sync::Arc;

use crate::domain::entities::CacheKey;

/// Backing store for decoded images.
/// Implementations must be thread-safe.
#[async_trait::async_trait]
pub trait ImageCachePort: Send + Sync {
    /// Attempts to get an image from the cache.
    /// Returns None if not cached.
    async fn get(&self, key: &CacheKey) -> Option<Arc<image::DynamicImage>>;

    /// Stores an image in the cache, replacing any previous entry.
    async fn put(&self, key: CacheKey, image: Arc<image::DynamicImage>);

    /// Returns the current number of cached images.
    /// Must not block and must stay exact while a writer is active.
    fn len(&self) -> usize;

    /// Returns true if the cache is empty.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Clears all images from the cache.
    async fn clear(&self);
}
