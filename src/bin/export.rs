use anyhow::{Context, Result};
use clap::Parser;
use mosdac_assist::graph::{self, ExportFormat};
use mosdac_assist::{AppContext, Config};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "export")]
#[command(about = "Export the knowledge graph (json, csv or gexf) or the raw snapshot")]
struct Args {
    /// json, csv or gexf
    #[arg(short, long, default_value = "json")]
    format: String,

    /// Output file; stdout when omitted
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Write the full knowledge snapshot instead of the graph
    #[arg(long)]
    snapshot: bool,

    /// Print graph metrics with this many central nodes to stderr
    #[arg(long)]
    metrics: Option<usize>,
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

    let ctx = AppContext::open(config).await?;

    let body = if args.snapshot {
        ctx.store.dump().to_json()?
    } else {
        let format: ExportFormat = args.format.parse()?;
        let data = ctx.store.graph();
        if let Some(top_k) = args.metrics {
            let m = graph::metrics(&data, top_k);
            eprintln!(
                "nodes={} edges={} density={:.4} avg_degree={:.2} clusters={}",
                m.node_count, m.edge_count, m.density, m.avg_degree, m.clusters
            );
            for node in &m.central_nodes {
                eprintln!("  {:<30} degree {}", node.label, node.degree);
            }
        }
        graph::export(&data, format)?
    };

    match &args.output {
        Some(path) => {
            std::fs::write(path, &body)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            log::info!("Wrote {} bytes to {}", body.len(), path.display());
        }
        None => println!("{}", body),
    }

    Ok(())
}
