use std::sync::Arc;

use clap::Parser;
use color_eyre::eyre::{Result, WrapErr};
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use optimedia::domain::entities::{ImageFormat, MediaReference, TransformOptions};
use optimedia::domain::ports::SystemClock;
use optimedia::infrastructure::config::Command;
use optimedia::infrastructure::storage::DeviceStore;
use optimedia::infrastructure::{CliArgs, MediaConfig, StorageManager};
use optimedia::presentation::MediaSubsystem;

fn init_logging(config: &MediaConfig) -> Result<()> {
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
        tracing_subscriber::registry().with(filter).init();
    }

    Ok(())
}

fn load_config(args: &CliArgs) -> Result<MediaConfig> {
    let storage = StorageManager::new().wrap_err("Failed to locate config directory")?;
    let mut config = storage
        .load_config(args.config.as_deref())
        .wrap_err("Failed to load configuration")?;
    config.merge_with_args(args);
    Ok(config)
}

fn transform_options(
    width: Option<u32>,
    height: Option<u32>,
    quality: Option<u8>,
    format: Option<ImageFormat>,
) -> TransformOptions {
    TransformOptions {
        quality,
        format,
        width,
        height,
    }
}

async fn start(config: &MediaConfig) -> Result<MediaSubsystem> {
    MediaSubsystem::start(config)
        .await
        .wrap_err("Failed to start media subsystem")
}

async fn open_store(config: &MediaConfig) -> Result<Option<DeviceStore>> {
    let store = MediaSubsystem::open_store(config, Arc::new(SystemClock))
        .await
        .wrap_err("Failed to open device store")?;
    if store.is_none() {
        println!("no device store configured");
    }
    Ok(store)
}

async fn run(args: CliArgs, config: &MediaConfig) -> Result<()> {
    match args.command {
        Command::Resolve {
            path,
            width,
            height,
            quality,
            format,
            fallback,
        } => {
            let subsystem = start(config).await?;
            let options = transform_options(width, height, quality, format);
            match subsystem
                .resolver()
                .try_resolve(&MediaReference::path(path), &options)
                .await
            {
                Ok(resolved) => {
                    info!(source = %resolved.source, "Resolved media");
                    println!("{}", resolved.url);
                }
                Err(e) => match fallback {
                    Some(fallback) => {
                        info!(error = %e, "Resolution failed, printing fallback");
                        println!("{fallback}");
                    }
                    None => return Err(e).wrap_err("Failed to resolve media"),
                },
            }
        }
        Command::Warm {
            paths,
            width,
            height,
        } => {
            let subsystem = start(config).await?;
            let references: Vec<MediaReference> =
                paths.into_iter().map(MediaReference::path).collect();
            let options = transform_options(width, height, None, None);
            let summary = subsystem.preloader().warm(&references, &options).await;
            info!(stats = %subsystem.memory_stats(), "Warm finished");
            println!("{summary}");
        }
        Command::Avatars { paths, size } => {
            let subsystem = start(config).await?;
            let summary = subsystem.preloader().warm_avatars(&paths, size).await;
            info!(stats = %subsystem.memory_stats(), "Avatar warm finished");
            println!("{summary}");
        }
        Command::Sweep => {
            if let Some(store) = open_store(config).await? {
                let removed = store.sweep().await;
                println!("removed {removed} expired entries");
            }
        }
        Command::Clear => {
            if let Some(store) = open_store(config).await? {
                let removed = store.clear().await;
                println!("removed {removed} entries");
            }
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let args = CliArgs::parse();
    let config = load_config(&args)?;

    init_logging(&config)?;

    info!(version = optimedia::VERSION, "Starting {}", optimedia::NAME);

    run(args, &config).await
}
