use anyhow::{Context, Result};
use clap::Parser;
use mosdac_assist::extract::Extractor;
use mosdac_assist::ingest::ingest_folder;
use mosdac_assist::respond::load_faqs;
use mosdac_assist::{AppContext, Config};
use std::path::PathBuf;
use std::time::Instant;

#[derive(Parser, Debug)]
#[command(name = "ingest")]
#[command(about = "Extract entities and relationships from portal pages (incremental by default)")]
struct Args {
    /// Re-extract every page even when its content hash is unchanged
    #[arg(short, long)]
    force: bool,

    /// Content folder; overrides ingest.content_folder
    #[arg(long)]
    folder: Option<PathBuf>,

    /// Extra FAQ file (.json or .yaml) to merge
    #[arg(long)]
    faq: Option<PathBuf>,
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

    log::info!("Starting MOSDAC Assist ingestion");
    let folder = args
        .folder
        .or_else(|| config.ingest.content_folder.clone())
        .ok_or_else(|| anyhow::anyhow!(
            "No content folder. Pass --folder or set ingest.content_folder in config.toml."
        ))?;
    log::info!("Content folder: {}", folder.display());
    log::info!("Database path: {}", config.db_path().display());

    let extractor = Extractor::from_config(&config.extraction)?;
    let ctx = AppContext::open(config).await?;
    let before = ctx.store.snapshot();
    let (entities_before, relationships_before) =
        (before.entities().len(), before.relationships().len());
    drop(before);

    if let Some(faq_path) = &args.faq {
        let faqs = load_faqs(faq_path)
            .with_context(|| format!("Failed to load FAQs from {}", faq_path.display()))?;
        log::info!("Merging {} FAQs from {}", faqs.len(), faq_path.display());
        ctx.store.add_faqs(faqs);
    }

    if args.force {
        log::info!("Mode: full re-extraction (all pages)");
    }
    let start = Instant::now();
    let summary = ingest_folder(&ctx.store, &extractor, &folder, Some(&ctx.db), args.force).await?;

    if summary.processed == 0 && args.faq.is_none() {
        log::info!("No new or modified pages. Ingestion complete.");
        return Ok(());
    }

    ctx.persist().await?;

    let after = ctx.store.snapshot();
    println!("\n=== Ingestion Summary ===");
    println!("  Pages discovered:      {}", summary.discovered);
    println!("  Pages processed:       {}", summary.processed);
    println!("  Pages unchanged:       {}", summary.unchanged);
    println!("  Pages failed:          {}", summary.failed);
    println!("  Mentions:              {}", summary.mentions);
    println!("  Attributes:            {}", summary.attributes);
    println!("  Unresolved relations:  {}", summary.unresolved_relations);
    println!(
        "  Entities:              {} (+{})",
        after.entities().len(),
        after.entities().len().saturating_sub(entities_before)
    );
    println!(
        "  Relationships:         {} (+{})",
        after.relationships().len(),
        after.relationships().len().saturating_sub(relationships_before)
    );
    println!("  Knowledge version:     {}", after.version());
    println!("  Time:                  {:?}", start.elapsed());

    if summary.failed > 0 {
        log::warn!("{} page(s) failed; see warnings above", summary.failed);
    }

    Ok(())
}
