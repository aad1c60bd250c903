use clap::Parser;
use mosdac_assist::metrics::{percentile, QueryLogger};
use mosdac_assist::{db::Db, db::migrate, config::Config};

#[derive(Parser, Debug)]
#[command(name = "stats")]
#[command(about = "Query statistics from the query log")]
struct Args {
    /// Window in hours
    #[arg(long, default_value = "24")]
    hours: u32,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let config = Config::load()?;
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(&config.app.log_level),
    )
    .init();

    let db = Db::new(config.db_path());
    db.with_connection(|conn| migrate::run_migrations(conn)).await?;
    let logger = QueryLogger::new(db);

    println!("\n=== MOSDAC Assist Query Statistics ===\n");

    let stats = logger.summary(args.hours).await?;
    if stats.is_empty() {
        println!("No queries found in the last {} hours.", args.hours);
        println!("\nAsk some questions to generate statistics.");
        return Ok(());
    }

    println!("{}-Hour Query Statistics by Intent:\n", args.hours);
    println!("{:-<86}", "");
    println!(
        "{:<16} {:>8} {:>12} {:>10} {:>12} {:>12} {:>10}",
        "Intent", "Count", "Avg (ms)", "Max (ms)", "Confidence", "Escalated", "Errors"
    );
    println!("{:-<86}", "");
    for s in &stats {
        println!(
            "{:<16} {:>8} {:>12} {:>10} {:>11.0}% {:>12} {:>10}",
            s.intent_type,
            s.count,
            s.avg_latency_ms as i64,
            s.max_latency_ms,
            s.avg_confidence * 100.0,
            s.escalations,
            s.errors
        );
    }
    println!("{:-<86}", "");

    let total: i64 = stats.iter().map(|s| s.count).sum();
    let escalated: i64 = stats.iter().map(|s| s.escalations).sum();
    println!(
        "\nEscalation rate: {:.1}% ({} of {})",
        escalated as f64 * 100.0 / total as f64,
        escalated,
        total
    );

    let latencies = logger.latencies(args.hours).await?;
    if !latencies.is_empty() {
        println!("\nLatency Percentiles (All Intents):\n");
        println!("{:-<50}", "");
        println!("{:<15} {:>15}", "Percentile", "Latency (ms)");
        println!("{:-<50}", "");
        println!("{:<15} {:>15}", "P50", percentile(&latencies, 0.50));
        println!("{:<15} {:>15}", "P95", percentile(&latencies, 0.95));
        println!("{:<15} {:>15}", "P99", percentile(&latencies, 0.99));
        println!("{:-<50}", "");
    }

    println!();

    Ok(())
}
