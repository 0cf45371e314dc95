//! Application configuration.

use directories::{ProjectDirs, UserDirs};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use super::args::CliArgs;
use crate::domain::errors::ConfigError;

const APP_NAME: &str = "imagecache";
const APP_QUALIFIER: &str = "com";
const APP_ORGANIZATION: &str = "linuxmobile";

/// Folder name used when the config file does not set one.
pub const DEFAULT_FOLDER_NAME: &str = "ImageCacheable";

/// Log level configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Trace level.
    Trace,
    /// Debug level.
    Debug,
    /// Info level.
    #[default]
    Info,
    /// Warning level.
    Warn,
    /// Error level.
    Error,
}

impl LogLevel {
    /// Converts to tracing level.
    #[must_use]
    pub const fn to_tracing_level(self) -> tracing::Level {
        match self {
            Self::Trace => tracing::Level::TRACE,
            Self::Debug => tracing::Level::DEBUG,
            Self::Info => tracing::Level::INFO,
            Self::Warn => tracing::Level::WARN,
            Self::Error => tracing::Level::ERROR,
        }
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Trace => write!(f, "trace"),
            Self::Debug => write!(f, "debug"),
            Self::Info => write!(f, "info"),
            Self::Warn => write!(f, "warn"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// Application configuration, loaded from `config.toml` and CLI flags.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Configuration file path.
    #[serde(skip)]
    pub config: Option<PathBuf>,

    /// Log file path.
    #[serde(default)]
    pub log_path: Option<PathBuf>,

    /// Log verbosity level.
    #[serde(default)]
    pub log_level: LogLevel,

    /// Disk cache settings.
    #[serde(default)]
    pub cache: CacheConfig,

    /// HTTP transport settings.
    #[serde(default)]
    pub http: HttpConfig,
}

/// Disk cache configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Subdirectory of the data root holding cached files.
    #[serde(default = "default_folder_name")]
    pub folder_name: Option<String>,

    /// Overrides the application data root.
    #[serde(default)]
    pub root_dir: Option<PathBuf>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            folder_name: default_folder_name(),
            root_dir: None,
        }
    }
}

impl CacheConfig {
    /// Checks that a configured folder name can name a directory.
    ///
    /// # Errors
    /// Returns `InvalidFolderName` for a bad folder name.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.folder_name
            .as_deref()
            .map_or(Ok(()), validate_folder_name)
    }

    /// Returns the configured root, or the platform default.
    #[must_use]
    pub fn effective_root_dir(&self) -> Option<PathBuf> {
        self.root_dir.clone().or_else(AppConfig::default_data_root)
    }
}

/// Checks that `name` is a single, non-relative path component.
///
/// # Errors
/// Returns `InvalidFolderName` describing the problem.
pub fn validate_folder_name(name: &str) -> Result<(), ConfigError> {
    if name.trim().is_empty() {
        return Err(ConfigError::invalid_folder(name, "folder name is empty"));
    }
    if name == "." || name == ".." {
        return Err(ConfigError::invalid_folder(name, "folder name is a relative path"));
    }
    if name.contains(['/', '\\', '\0']) {
        return Err(ConfigError::invalid_folder(
            name,
            "folder name must be a single path component",
        ));
    }
    Ok(())
}

/// HTTP transport configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    /// Request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// User agent sent with every request.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            user_agent: default_user_agent(),
        }
    }
}

#[allow(clippy::unnecessary_wraps)]
fn default_folder_name() -> Option<String> {
    Some(DEFAULT_FOLDER_NAME.to_string())
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_user_agent() -> String {
    format!("{APP_NAME}/{}", env!("CARGO_PKG_VERSION"))
}

impl AppConfig {
    /// Merges CLI arguments into the configuration.
    pub fn merge_with_args(&mut self, args: &CliArgs) {
        if let Some(config_path) = &args.config {
            self.config = Some(config_path.clone());
        }
        if let Some(log_path) = &args.log_path {
            self.log_path = Some(log_path.clone());
        }
        if let Some(log_level) = args.log_level {
            self.log_level = log_level;
        }
        if let Some(root_dir) = &args.root_dir {
            self.cache.root_dir = Some(root_dir.clone());
        }
        if let Some(folder_name) = &args.folder_name {
            self.cache.folder_name = Some(folder_name.clone());
        }
        if let Some(timeout_secs) = args.timeout_secs {
            self.http.timeout_secs = timeout_secs;
        }
    }

    /// Returns default config directory.
    #[must_use]
    pub fn default_config_dir() -> Option<PathBuf> {
        ProjectDirs::from(APP_QUALIFIER, APP_ORGANIZATION, APP_NAME)
            .map(|dirs| dirs.config_dir().to_path_buf())
    }

    /// Returns default log file path.
    #[must_use]
    pub fn default_log_path() -> Option<PathBuf> {
        ProjectDirs::from(APP_QUALIFIER, APP_ORGANIZATION, APP_NAME)
            .map(|dirs| dirs.data_dir().join("imagecache.log"))
    }

    /// Returns the platform documents directory, falling back to the
    /// application data directory where there is none.
    #[must_use]
    pub fn default_data_root() -> Option<PathBuf> {
        UserDirs::new()
            .and_then(|dirs| dirs.document_dir().map(std::path::Path::to_path_buf))
            .or_else(|| {
                ProjectDirs::from(APP_QUALIFIER, APP_ORGANIZATION, APP_NAME)
                    .map(|dirs| dirs.data_dir().to_path_buf())
            })
    }

    /// Returns effective log path. Logging to a file is opt-in.
    #[must_use]
    pub fn effective_log_path(&self) -> Option<PathBuf> {
        self.log_path.clone()
    }
}
