//! Application configuration.

/// Config file schema and defaults.
pub mod app_config;
/// Command-line arguments.
pub mod args;
/// Reading and writing the config file.
pub mod storage;

pub use app_config::{
    AppConfig, CacheConfig, DEFAULT_FOLDER_NAME, HttpConfig, LogLevel, validate_folder_name,
};
pub use args::{CliArgs, Command};
pub use storage::{CONFIG_FILE_NAME, ConfigFile};
