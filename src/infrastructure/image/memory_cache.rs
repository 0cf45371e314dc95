//! In-memory image cache implementation.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use tokio::sync::RwLock;
use tracing::{debug, trace};

use crate::domain::entities::CacheKey;
use crate::domain::ports::ImageCachePort;

/// Unbounded in-memory store for decoded images.
/// Thread-safe; entries live until cleared or the cache is dropped.
#[derive(Default)]
pub struct MemoryImageCache {
    cache: RwLock<HashMap<CacheKey, Arc<image::DynamicImage>>>,
    hits: AtomicU64,
    misses: AtomicU64,
    // Only written while the map's write lock is held.
    size: AtomicUsize,
}

impl MemoryImageCache {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns cache statistics.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn stats(&self) -> CacheStats {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let total = hits + misses;
        let hit_rate = if total > 0 {
            (hits as f64 / total as f64) * 100.0
        } else {
            0.0
        };
        CacheStats {
            hits,
            misses,
            hit_rate,
            size: self.len(),
        }
    }

    /// Checks for an entry without touching the hit counters.
    pub async fn contains(&self, key: &CacheKey) -> bool {
        self.cache.read().await.contains_key(key)
    }
}

impl std::fmt::Debug for MemoryImageCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryImageCache")
            .field("stats", &self.stats())
            .finish_non_exhaustive()
    }
}

/// Statistics about cache performance.
#[derive(Debug, Clone)]
pub struct CacheStats {
    /// Number of cache hits.
    pub hits: u64,
    /// Number of cache misses.
    pub misses: u64,
    /// Hit rate as a percentage.
    pub hit_rate: f64,
    /// Current number of cached images.
    pub size: usize,
}

impl std::fmt::Display for CacheStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Cache: {} images, {:.1}% hit rate ({} hits, {} misses)",
            self.size, self.hit_rate, self.hits, self.misses
        )
    }
}

#[async_trait::async_trait]
impl ImageCachePort for MemoryImageCache {
    async fn get(&self, key: &CacheKey) -> Option<Arc<image::DynamicImage>> {
        let cache = self.cache.read().await;
        if let Some(img) = cache.get(key) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            trace!(key = %key, "Memory cache hit");
            Some(img.clone())
        } else {
            self.misses.fetch_add(1, Ordering::Relaxed);
            trace!(key = %key, "Memory cache miss");
            None
        }
    }

    async fn put(&self, key: CacheKey, image: Arc<image::DynamicImage>) {
        let mut cache = self.cache.write().await;
        debug!(key = %key, "Storing image in memory cache");
        if cache.insert(key, image).is_none() {
            self.size.store(cache.len(), Ordering::Release);
        }
    }

    fn len(&self) -> usize {
        self.size.load(Ordering::Acquire)
    }

    async fn clear(&self) {
        let mut cache = self.cache.write().await;
        let count = cache.len();
        cache.clear();
        self.size.store(0, Ordering::Release);
        debug!(count, "Cleared memory image cache");
    }
}
