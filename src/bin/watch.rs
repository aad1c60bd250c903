//! Watch the content folder; re-extract changed pages and save the snapshot automatically.

use clap::Parser;
use mosdac_assist::extract::Extractor;
use mosdac_assist::watch::{run_watcher, WatchContext};
use mosdac_assist::{AppContext, Config};
use std::path::PathBuf;
use std::sync::Arc;
use anyhow::Result;

#[derive(Parser, Debug)]
#[command(name = "watch")]
#[command(about = "Watch the content folder for changes and auto re-extract")]
struct Args {
    /// Debounce delay in milliseconds; overrides ingest.debounce_ms
    #[arg(long)]
    debounce_ms: Option<u64>,

    /// Content folder; overrides ingest.content_folder
    #[arg(long)]
    folder: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = Config::load()?;

    // RUST_LOG wins over the configured level
    env_logger::Builder::from_env(
        env_logger::Env::default().filter_or("RUST_LOG", &config.app.log_level),
    )
    .init();

    log::info!("Starting MOSDAC Assist file watcher");
    let folder = args
        .folder
        .or_else(|| config.ingest.content_folder.clone())
        .ok_or_else(|| anyhow::anyhow!(
            "No content folder. Pass --folder or set ingest.content_folder in config.toml."
        ))?;
    let debounce_ms = args.debounce_ms.unwrap_or(config.ingest.debounce_ms);
    log::info!("Content folder: {}", folder.display());
    log::info!("Debounce: {} ms", debounce_ms);

    let extractor = Extractor::from_config(&config.extraction)?;
    let ctx = AppContext::open(config).await?;
    let watch_ctx = WatchContext {
        store: Arc::clone(&ctx.store),
        extractor,
        ledger: Some(ctx.db.clone()),
        snapshots: Some(Arc::clone(&ctx.snapshots)),
    };

    log::info!("Watching for changes (Ctrl+C to stop)");
    run_watcher(watch_ctx, &folder, debounce_ms).await?;
    Ok(())
}
