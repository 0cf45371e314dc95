//! The TOML config file: where it lives, how it is read and written.

use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

use super::app_config::AppConfig;
use crate::domain::errors::ConfigError;

/// File name looked up inside the platform config directory.
pub const CONFIG_FILE_NAME: &str = "config.toml";

/// A config file location, remembering whether the user chose it.
///
/// The platform default is forgiving: a missing file is created with defaults
/// and a malformed one is ignored. A file passed with `--config` must exist and
/// parse.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    path: PathBuf,
    explicit: bool,
}

impl ConfigFile {
    /// Uses `path_override` if given, else `config.toml` in the platform
    /// config directory.
    ///
    /// # Errors
    /// Returns `ConfigDirNotFound` if there is no override and no platform
    /// config directory.
    pub fn locate(path_override: Option<&Path>) -> Result<Self, ConfigError> {
        match path_override {
            Some(path) => Ok(Self::explicit(path)),
            None => AppConfig::default_config_dir()
                .map(|dir| Self::in_dir(&dir))
                .ok_or(ConfigError::ConfigDirNotFound),
        }
    }

    /// A file the user named.
    #[must_use]
    pub fn explicit(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            explicit: true,
        }
    }

    /// The default file inside `dir`.
    #[must_use]
    pub fn in_dir(dir: &Path) -> Self {
        Self {
            path: dir.join(CONFIG_FILE_NAME),
            explicit: false,
        }
    }

    /// Path of the file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads and validates the configuration.
    ///
    /// # Errors
    /// Returns `ConfigNotFound` or `TomlDe` for a bad explicit file,
    /// `InvalidFolderName` if `[cache] folder_name` cannot name a directory,
    /// and `Io` if the file cannot be read or the defaults cannot be written.
    pub fn load(&self) -> Result<AppConfig, ConfigError> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                if self.explicit {
                    return Err(ConfigError::ConfigNotFound(self.path.clone()));
                }
                info!(path = %self.path.display(), "No config file, writing defaults");
                let config = AppConfig::default();
                self.save(&config)?;
                return Ok(self.attach(config));
            }
            Err(e) => return Err(e.into()),
        };

        let config = match toml::from_str::<AppConfig>(&content) {
            Ok(config) => config,
            Err(e) if self.explicit => return Err(e.into()),
            Err(e) => {
                warn!(
                    path = %self.path.display(),
                    error = %e,
                    "Malformed config file, using defaults"
                );
                AppConfig::default()
            }
        };
        config.cache.validate()?;

        debug!(path = %self.path.display(), "Config loaded");
        Ok(self.attach(config))
    }

    /// Writes `config` through a temp file in the same directory, creating the
    /// directory if needed.
    ///
    /// # Errors
    /// Returns error if serialization or any file operation fails.
    pub fn save(&self, config: &AppConfig) -> Result<(), ConfigError> {
        let parent = self
            .path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        fs::create_dir_all(parent)?;

        let content = toml::to_string_pretty(config)?;
        let mut temp_file = NamedTempFile::new_in(parent)?;
        temp_file.write_all(content.as_bytes())?;
        temp_file.as_file().sync_all()?;
        temp_file.persist(&self.path).map_err(|e| e.error)?;
        Ok(())
    }

    fn attach(&self, mut config: AppConfig) -> AppConfig {
        config.config = Some(self.path.clone());
        config
    }
}
