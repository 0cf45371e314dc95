use super::app_config::LogLevel;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Command-line interface of the `imagecache` binary.
#[derive(Debug, Parser)]
#[command(
    name = "imagecache",
    version,
    about = "Fetch remote images through a disk or memory cache",
    long_about = None
)]
pub struct CliArgs {
    /// Configuration file path.
    #[arg(short, long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Log file path.
    #[arg(long, value_name = "PATH")]
    pub log_path: Option<PathBuf>,

    /// Log verbosity level.
    #[arg(long, value_enum)]
    pub log_level: Option<LogLevel>,

    /// Application data root the cache folder lives under.
    #[arg(long, value_name = "PATH", env = "IMAGECACHE_ROOT")]
    pub root_dir: Option<PathBuf>,

    /// Cache folder name inside the data root.
    #[arg(long, value_name = "NAME")]
    pub folder_name: Option<String>,

    /// HTTP request timeout in seconds.
    #[arg(long)]
    pub timeout_secs: Option<u64>,

    /// Print results as JSON.
    #[arg(long)]
    pub json: bool,

    /// What to do.
    #[command(subcommand)]
    pub command: Command,
}

/// Subcommands of the binary.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Fetch an image through the disk cache.
    Local {
        /// Remote image URL.
        url: String,
        /// Cache key; derived from the URL when omitted.
        #[arg(short, long)]
        key: Option<String>,
    },
    /// Fetch an image through the in-memory cache.
    Memory {
        /// Remote image URL.
        url: String,
        /// Cache key; derived from the URL when omitted.
        #[arg(short, long)]
        key: Option<String>,
        /// Number of times to request the image.
        #[arg(long, default_value_t = 2)]
        repeat: usize,
    },
    /// Delete the disk cache directory.
    Clear,
    /// Print the disk cache directory.
    Dir,
}
