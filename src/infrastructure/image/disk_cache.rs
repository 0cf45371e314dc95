//! Disk-based image cache for persistence across sessions.
//!
//! Entries are flat files named `<key><ext>` inside one directory. There is no
//! index: a file's existence is the cache record.

use std::io::Write;
use std::path::{Path, PathBuf};

use tokio::fs;
use tracing::{debug, info, trace};

use crate::domain::entities::CacheKey;
use crate::domain::errors::{CacheError, CacheResult};

/// Disk tier rooted at `<root>/<folder_name>`.
#[derive(Debug, Clone)]
pub struct DiskImageCache {
    cache_dir: PathBuf,
}

impl DiskImageCache {
    /// Creates a disk cache for `<root>/<folder_name>`.
    ///
    /// The directory is not touched until first use.
    #[must_use]
    pub fn new(root: impl AsRef<Path>, folder_name: &str) -> Self {
        Self {
            cache_dir: root.as_ref().join(folder_name),
        }
    }

    /// Returns the cache directory path without creating it.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.cache_dir
    }

    /// Returns the cache directory, creating it and any missing parents.
    ///
    /// # Errors
    /// Returns error if the directory cannot be created.
    pub async fn directory(&self) -> CacheResult<PathBuf> {
        if !fs::try_exists(&self.cache_dir).await.unwrap_or(false) {
            fs::create_dir_all(&self.cache_dir).await.map_err(|e| {
                CacheError::io(format!(
                    "Failed to create cache dir {}: {e}",
                    self.cache_dir.display()
                ))
            })?;
            debug!(path = %self.cache_dir.display(), "Created cache directory");
        }
        Ok(self.cache_dir.clone())
    }

    /// Returns the file path for `key` with an optional suffix.
    #[must_use]
    pub fn entry_path(&self, key: &CacheKey, extension: Option<&str>) -> PathBuf {
        let mut name = key.as_str().to_string();
        if let Some(ext) = extension {
            name.push_str(ext);
        }
        self.cache_dir.join(name)
    }

    /// Checks if a file exists at `path`.
    pub async fn exists(&self, path: &Path) -> bool {
        let found = fs::try_exists(path).await.unwrap_or(false);
        trace!(path = %path.display(), found, "Disk cache lookup");
        found
    }

    /// Atomically writes `bytes` to `path`.
    ///
    /// Bytes land in a temporary file next to `path` and are renamed into place,
    /// so readers see either the old state or the complete file.
    ///
    /// # Errors
    /// Returns `CacheError::DiskWrite` if the directory cannot be created or
    /// the file cannot be written or renamed.
    pub async fn write(&self, bytes: &[u8], path: &Path) -> CacheResult<()> {
        self.directory()
            .await
            .map_err(|e| CacheError::disk_write(e.to_string()))?;

        let parent = path
            .parent()
            .ok_or_else(|| CacheError::disk_write("Invalid cache path"))?
            .to_path_buf();
        let target = path.to_path_buf();
        let data = bytes.to_vec();
        let size = data.len();

        tokio::task::spawn_blocking(move || -> std::io::Result<()> {
            let mut temp_file = tempfile::NamedTempFile::new_in(&parent)?;
            temp_file.write_all(&data)?;
            temp_file.as_file().sync_all()?;
            temp_file.persist(&target).map_err(|e| e.error)?;
            Ok(())
        })
        .await
        .map_err(|e| CacheError::disk_write(format!("Write task panicked: {e}")))?
        .map_err(|e| {
            CacheError::disk_write(format!("Failed to write {}: {e}", path.display()))
        })?;

        debug!(path = %path.display(), size, "Stored image in disk cache");
        Ok(())
    }

    /// Deletes the cache directory and everything in it.
    ///
    /// A missing directory is not an error. The directory is recreated by the
    /// next call that needs it.
    ///
    /// # Errors
    /// Returns `CacheError::DiskClear` if removal fails.
    pub async fn clear(&self) -> CacheResult<()> {
        match fs::remove_dir_all(&self.cache_dir).await {
            Ok(()) => {
                info!(path = %self.cache_dir.display(), "Cleared disk cache");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.cache_dir.display(), "Disk cache already empty");
                Ok(())
            }
            Err(e) => Err(CacheError::disk_clear(format!(
                "Failed to remove {}: {e}",
                self.cache_dir.display()
            ))),
        }
    }
}
