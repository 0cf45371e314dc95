//! Domain entity definitions.

mod cache_key;
mod fetch;

pub use cache_key::CacheKey;
pub use fetch::{CacheTier, FetchRequest, FetchSource, ImageSource, LoadedImage};
