//! Configuration error types.

use thiserror::Error;

/// Errors raised while building a cache or loading configuration.
#[derive(Debug, Error)]
#[allow(missing_docs)]
pub enum ConfigError {
    #[error("cache folder name is required for the disk tier")]
    MissingFolderName,

    #[error("invalid cache folder name {name:?}: {reason}")]
    InvalidFolderName { name: String, reason: String },

    #[error("a memory cache handle is required for the memory tier")]
    MissingMemoryCache,

    #[error("failed to determine application data directory")]
    DataRootNotFound,

    #[error("failed to determine config directory")]
    ConfigDirNotFound,

    #[error("config file not found: {}", .0.display())]
    ConfigNotFound(std::path::PathBuf),

    #[error("failed to create HTTP client: {0}")]
    Http(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("toml serialization error: {0}")]
    TomlSer(#[from] toml::ser::Error),

    #[error("toml deserialization error: {0}")]
    TomlDe(#[from] toml::de::Error),
}

impl ConfigError {
    /// Creates invalid folder name error.
    #[must_use]
    pub fn invalid_folder(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidFolderName {
            name: name.into(),
            reason: reason.into(),
        }
    }
}
