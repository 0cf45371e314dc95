use std::sync::Arc;

use clap::Parser;
use color_eyre::eyre::{Result, WrapErr};
use reqwest::Url;
use serde::Serialize;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use imagecache::infrastructure::{
    AppConfig, CliArgs, Command, ConfigFile, ImageCacheBuilder, MemoryImageCache,
};
use imagecache::{CacheKey, ImageCache, LoadedImage};

fn init_logging(config: &AppConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_level.to_string()));

    if let Some(log_path) = config.effective_log_path() {
        if let Some(parent) = log_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_path)?;

        let file_layer = fmt::layer()
            .with_writer(file)
            .with_ansi(false)
            .with_target(true)
            .with_thread_ids(false);

        tracing_subscriber::registry()
            .with(filter)
            .with(file_layer)
            .init();

        info!(path = %log_path.display(), "Logging initialized");
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_writer(std::io::stderr))
            .init();
    }

    Ok(())
}

fn load_config(args: &CliArgs) -> Result<AppConfig> {
    let mut config = ConfigFile::locate(args.config.as_deref())?.load()?;
    config.merge_with_args(args);
    Ok(config)
}

#[derive(Debug, Serialize)]
struct Report {
    key: String,
    source: String,
    width: u32,
    height: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    persist_error: Option<String>,
}

impl Report {
    fn new(loaded: &LoadedImage, path: Option<String>) -> Self {
        Self {
            key: loaded.key.to_string(),
            source: loaded.source.to_string(),
            width: loaded.image.width(),
            height: loaded.image.height(),
            path,
            persist_error: loaded.persist_error.as_ref().map(ToString::to_string),
        }
    }

    fn print(&self, json: bool) -> Result<()> {
        if json {
            println!("{}", serde_json::to_string(self)?);
        } else {
            println!(
                "{} {}x{} from {}{}",
                self.key,
                self.width,
                self.height,
                self.source,
                self.path
                    .as_ref()
                    .map(|p| format!(" ({p})"))
                    .unwrap_or_default()
            );
        }
        Ok(())
    }
}

fn resolve(url: &str, key: Option<String>) -> Result<(Url, CacheKey)> {
    let parsed = Url::parse(url).wrap_err_with(|| format!("invalid URL: {url}"))?;
    let key = key.map_or_else(|| CacheKey::from_url(url), CacheKey::new);
    Ok((parsed, key))
}

async fn run(cache: ImageCache, args: CliArgs) -> Result<()> {
    match args.command {
        Command::Local { url, key } => {
            let (url, key) = resolve(&url, key)?;
            let loaded = cache.local_image(key.clone(), &url).await?;
            let path = cache.local_path(&key, &url);
            Report::new(&loaded, Some(path.display().to_string())).print(args.json)?;
        }
        Command::Memory { url, key, repeat } => {
            let (url, key) = resolve(&url, key)?;
            for _ in 0..repeat.max(1) {
                let loaded = cache.in_memory_image(key.clone(), &url).await?;
                Report::new(&loaded, None).print(args.json)?;
            }
        }
        Command::Clear => {
            cache.try_clear_local_cache().await?;
            println!("cleared {}", cache.cache_dir().display());
        }
        Command::Dir => {
            println!("{}", cache.cache_dir().display());
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    dotenvy::dotenv().ok();

    let args = CliArgs::parse();
    let config = load_config(&args)?;

    init_logging(&config)?;

    info!(version = imagecache::VERSION, "Starting imagecache");

    let cache = ImageCacheBuilder::from_config(&config)
        .memory_cache(Arc::new(MemoryImageCache::new()))
        .build()?;

    run(cache, args).await
}
