//! Cache error types.

use thiserror::Error;

/// Result type for cache operations.
pub type CacheResult<T> = std::result::Result<T, CacheError>;

/// Errors that can occur while fetching or caching an image.
///
/// The type is `Clone` so a single in-flight fetch can hand the same failure to
/// every caller waiting on it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[allow(missing_docs)]
pub enum CacheError {
    #[error("network error: {message}")]
    Network { message: String },

    #[error("decode error: {message}")]
    Decode { message: String },

    #[error("io error: {message}")]
    Io { message: String },

    #[error("failed to write cache file: {message}")]
    DiskWrite { message: String },

    #[error("failed to clear cache directory: {message}")]
    DiskClear { message: String },

    #[error("invalid cache key {key:?}: {reason}")]
    InvalidKey { key: String, reason: String },

    #[error("request cancelled")]
    Cancelled,

    #[error("background task failed: {message}")]
    TaskFailed { message: String },
}

impl CacheError {
    /// Creates network error.
    #[must_use]
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
        }
    }

    /// Creates decode error.
    #[must_use]
    pub fn decode(message: impl Into<String>) -> Self {
        Self::Decode {
            message: message.into(),
        }
    }

    /// Creates io error.
    #[must_use]
    pub fn io(message: impl Into<String>) -> Self {
        Self::Io {
            message: message.into(),
        }
    }

    /// Creates disk write error.
    #[must_use]
    pub fn disk_write(message: impl Into<String>) -> Self {
        Self::DiskWrite {
            message: message.into(),
        }
    }

    /// Creates disk clear error.
    #[must_use]
    pub fn disk_clear(message: impl Into<String>) -> Self {
        Self::DiskClear {
            message: message.into(),
        }
    }

    /// Creates invalid key error.
    #[must_use]
    pub fn invalid_key(key: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidKey {
            key: key.into(),
            reason: reason.into(),
        }
    }

    /// Creates task failure error.
    #[must_use]
    pub fn task_failed(message: impl Into<String>) -> Self {
        Self::TaskFailed {
            message: message.into(),
        }
    }

    /// Returns whether the transport failed.
    #[must_use]
    pub const fn is_network_error(&self) -> bool {
        matches!(self, Self::Network { .. })
    }

    /// Returns whether the payload could not be decoded.
    #[must_use]
    pub const fn is_decode_error(&self) -> bool {
        matches!(self, Self::Decode { .. })
    }

    /// Returns whether the caller gave up before the fetch completed.
    #[must_use]
    pub const fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

impl From<tokio::task::JoinError> for CacheError {
    fn from(e: tokio::task::JoinError) -> Self {
        Self::task_failed(e.to_string())
    }
}
