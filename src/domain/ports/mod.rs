//! Traits the infrastructure layer implements.

mod decoder_port;
mod image_cache_port;
mod transport_port;

pub use decoder_port::ImageDecoderPort;
pub use image_cache_port::ImageCachePort;
pub use transport_port::TransportPort;
