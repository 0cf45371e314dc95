//! Domain error types.

mod cache_error;
mod config_error;

pub use cache_error::{CacheError, CacheResult};
pub use config_error::ConfigError;
