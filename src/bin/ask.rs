//! Answer a single question from the command line.

use anyhow::Result;
use clap::Parser;
use mosdac_assist::{AppContext, Config};

#[derive(Parser, Debug)]
#[command(name = "ask")]
#[command(about = "Ask the MOSDAC assistant one question")]
struct Args {
    /// The question
    query: Vec<String>,

    /// Print the full answer (intent, retrieval result, metrics) as JSON
    #[arg(long)]
    json: bool,

    #[arg(long, default_value = "cli")]
    user: String,

    #[arg(long, default_value = "ask")]
    session: String,
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

    let query = args.query.join(" ");
    if query.trim().is_empty() {
        anyhow::bail!("Usage: ask <question>");
    }

    let ctx = AppContext::open(config).await?;
    let assistant = ctx.assistant()?;

    let answer = assistant
        .answer_detailed(&query, &args.user, &args.session)
        .await;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&answer)?);
        return Ok(());
    }

    println!("{}", answer.message.content);
    if let Some(meta) = &answer.message.metadata {
        println!();
        println!("Intent:      {}", meta.intent_type);
        println!("Confidence:  {:.0}%", meta.confidence * 100.0);
        if !meta.sources.is_empty() {
            println!("Sources:     {}", meta.sources.join(", "));
        }
        if meta.escalate {
            println!(
                "Escalated:   {}",
                meta.escalation_reason.as_deref().unwrap_or("yes")
            );
        }
        if !meta.suggestions.is_empty() {
            println!("Try also:    {}", meta.suggestions.join(" | "));
        }
    }
    println!("Latency:     {} ms", answer.metrics.latency_ms);

    Ok(())
}
