use anyhow::{Context, Result};
use mosdac_assist::db::{migrate, Db};
use mosdac_assist::error::AssistError;
use mosdac_assist::server::HttpServer;
use mosdac_assist::{AppContext, Config};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::load()?;

    // RUST_LOG wins over the configured level
    env_logger::Builder::from_env(
        env_logger::Env::default()
            .filter_or("RUST_LOG", &config.app.log_level)
    ).init();

    let args: Vec<String> = std::env::args().collect();
    let command = args.get(1).map(|s| s.as_str()).unwrap_or("verify");

    match command {
        "serve" => run_http_server(config).await?,
        "chat" => run_chat(config).await?,
        _ => run_verification(config).await?,
    }

    Ok(())
}

/// Serve the HTTP API
async fn run_http_server(config: Config) -> Result<()> {
    log::info!("Starting MOSDAC Assist HTTP server v{}", env!("CARGO_PKG_VERSION"));

    let port = config.http_server.port;
    let ctx = AppContext::open(config)
        .await
        .context("Failed to open database and knowledge snapshot")?;
    log::info!("Database initialized: {}", ctx.db.path().display());

    let server = HttpServer::from_context(&ctx)?;
    server.run(port).await?;

    Ok(())
}

/// Interactive question/answer loop on stdin
async fn run_chat(config: Config) -> Result<()> {
    let ctx = AppContext::open(config).await?;
    let assistant = ctx.assistant()?;
    let session_id = uuid::Uuid::new_v4().to_string();

    let set = ctx.store.snapshot();
    println!(
        "MOSDAC Assist v{}: {} entities, {} relationships, {} FAQs. Empty line or \"exit\" quits.",
        env!("CARGO_PKG_VERSION"),
        set.entities().len(),
        set.relationships().len(),
        set.faqs().len()
    );
    drop(set);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();
    loop {
        stdout.write_all(b"\n> ").await?;
        stdout.flush().await?;
        let line = match lines.next_line().await? {
            Some(l) => l,
            None => break,
        };
        let query = line.trim();
        if query.is_empty() || query.eq_ignore_ascii_case("exit") {
            break;
        }

        let message = assistant.answer(query, "cli", &session_id).await;
        println!("{}", message.content);
        if let Some(meta) = &message.metadata {
            println!(
                "[confidence {:.0}%{}{}]",
                meta.confidence * 100.0,
                if meta.sources.is_empty() {
                    String::new()
                } else {
                    format!(", sources: {}", meta.sources.join(", "))
                },
                if meta.escalate { ", escalated" } else { "" }
            );
        }
    }

    Ok(())
}

/// Migrate, then check schema, pragmas and the stored snapshot
async fn run_verification(config: Config) -> Result<()> {
    log::info!("Starting MOSDAC Assist v{}", env!("CARGO_PKG_VERSION"));
    log::info!("Configuration loaded successfully");
    log::info!("Database path: {}", config.db_path().display());
    if let Some(folder) = &config.ingest.content_folder {
        log::info!("Content folder: {}", folder.display());
    }

    let db = Db::new(config.db_path());
    db.with_connection(|conn| migrate::run_migrations(conn)).await?;
    verify_database_schema(&db).await?;

    let ctx = AppContext::open(config).await?;
    let set = ctx.store.snapshot();
    log::info!(
        "Knowledge v{}: {} entities, {} relationships, {} FAQs",
        set.version(),
        set.entities().len(),
        set.relationships().len(),
        set.faqs().len()
    );

    Ok(())
}

/// Verify that all expected database objects exist
async fn verify_database_schema(db: &Db) -> Result<()> {
    db.with_connection(|conn| {
        let mut stmt = conn.prepare("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")?;
        let tables: Vec<String> = stmt.query_map([], |row| row.get::<_, String>(0))?
            .collect::<std::result::Result<Vec<_>, rusqlite::Error>>()?;

        let expected_tables = ["ingested_files", "knowledge_snapshots", "query_logs", "schema_migrations"];
        let mut all_tables_exist = true;
        for table in &expected_tables {
            if tables.iter().any(|t| t == table) {
                log::debug!("✓ Table exists: {}", table);
            } else {
                log::error!("Missing table: {}", table);
                all_tables_exist = false;
            }
        }
        if !all_tables_exist {
            return Err(AssistError::Config("Not all required tables exist".to_string()));
        }

        let applied = migrate::get_applied_migrations(conn)?;
        log::debug!("✓ {} migrations applied", applied.len());

        let journal_mode: String = conn.query_row("PRAGMA journal_mode", [], |row| row.get(0))?;
        if journal_mode.to_uppercase() != "WAL" {
            return Err(AssistError::Config(format!("Journal mode is not WAL: {}", journal_mode)));
        }
        log::debug!("✓ Journal mode: WAL");

        let integrity: String = conn.query_row("PRAGMA integrity_check", [], |row| row.get(0))?;
        if integrity != "ok" {
            return Err(AssistError::Config(format!("Database integrity check failed: {}", integrity)));
        }
        log::info!("✓ Database integrity: OK");

        Ok(())
    }).await?;

    log::info!("✓ Database schema verification complete");
    Ok(())
}
