//! Cache key entity.

use crate::domain::errors::CacheError;

/// Caller-supplied identifier for a cached image.
///
/// Keys are opaque and must be unique within one cache instance. For the disk
/// tier the key also becomes the file stem, see [`CacheKey::validate_file_stem`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey(String);

impl CacheKey {
    /// Creates a new `CacheKey` from any string-like input.
    #[must_use]
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Derives a stable key from a URL by hashing it.
    #[must_use]
    pub fn from_url(url: &str) -> Self {
        use sha2::{Digest, Sha256};
        let mut hasher = Sha256::new();
        hasher.update(url.as_bytes());
        let result = hasher.finalize();
        Self(hex::encode(&result[..16]))
    }

    /// Returns the inner string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Checks that the key can be used as a file stem inside the cache directory.
    ///
    /// # Errors
    /// Returns `CacheError::InvalidKey` for empty keys, `.`/`..`, and keys
    /// containing path separators or NUL bytes.
    pub fn validate_file_stem(&self) -> Result<(), CacheError> {
        let key = self.0.as_str();
        if key.is_empty() {
            return Err(CacheError::invalid_key(key, "key is empty"));
        }
        if key == "." || key == ".." {
            return Err(CacheError::invalid_key(key, "key is a relative path"));
        }
        if key.contains(['/', '\\', '\0']) {
            return Err(CacheError::invalid_key(
                key,
                "key contains a path separator",
            ));
        }
        Ok(())
    }
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for CacheKey {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for CacheKey {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl AsRef<str> for CacheKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
