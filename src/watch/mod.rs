//! File watcher: re-extract pages under the content folder when they change.
//!
//! Uses the notify crate to watch the directory, debounces events, and for each
//! changed page runs the ingest pipeline and persists the updated snapshot.

mod watcher;

use std::path::Path;
use std::sync::mpsc;
use std::sync::{Arc, Mutex};

use crate::db::Db;
use crate::error::{AssistError, Result};
use crate::extract::{ExtractionReport, Extractor};
use crate::ingest::{
    compute_file_hash, file_metadata, ingest_file, is_supported, record_ingested, FileMetadata,
    ParserRegistry,
};
use crate::knowledge::{KnowledgeStore, SnapshotStore};

/// Build FileMetadata for a changed path under `root`.
/// Returns None if the path is gone, outside root, or not a supported page.
pub fn file_metadata_from_path(absolute_path: &Path, root: &Path) -> Result<Option<FileMetadata>> {
    if !absolute_path.is_file() || !is_supported(absolute_path) {
        return Ok(None);
    }
    let root = root
        .canonicalize()
        .map_err(|e| AssistError::Config(format!("root canonicalize: {}", e)))?;
    let absolute_path = absolute_path.canonicalize()?;

    if !absolute_path.starts_with(&root) {
        return Ok(None);
    }
    file_metadata(&root, &absolute_path).map(Some)
}

async fn get_stored_hash(db: &Db, source_id: &str) -> Result<Option<String>> {
    let source_id = source_id.to_string();
    db.with_connection(move |conn| {
        let mut stmt = conn.prepare("SELECT file_hash FROM ingested_files WHERE source_id = ?1")?;
        let mut rows = stmt.query([&source_id])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(row.get::<_, String>(0)?));
        }
        Ok(None)
    })
    .await
}

/// Everything a file change needs to be re-extracted and persisted.
pub struct WatchContext {
    pub store: Arc<KnowledgeStore>,
    pub extractor: Extractor,
    pub ledger: Option<Db>,
    pub snapshots: Option<Arc<dyn SnapshotStore>>,
}

/// Handle a single file change: hash check, then extract if changed.
///
/// Returns the extraction report, or None when the change was ignored.
pub async fn handle_file_change(
    ctx: &WatchContext,
    root: &Path,
    path: &Path,
    parser_registry: &ParserRegistry,
) -> Result<Option<ExtractionReport>> {
    let start = std::time::Instant::now();

    let file = match file_metadata_from_path(path, root)? {
        Some(f) => f,
        None => return Ok(None),
    };

    let current_hash = compute_file_hash(&file.absolute_path)?;
    if let Some(db) = &ctx.ledger {
        if get_stored_hash(db, &file.relative_path).await?.as_deref() == Some(current_hash.as_str()) {
            log::debug!("watch: {} unchanged", file.relative_path);
            return Ok(None);
        }
    }

    let report = ingest_file(&ctx.store, &ctx.extractor, parser_registry, &file)?;
    if let Some(db) = &ctx.ledger {
        record_ingested(db, &file.relative_path, &current_hash).await?;
    }
    if let Some(snapshots) = &ctx.snapshots {
        snapshots.save(&ctx.store.dump()).await?;
    }

    log::info!(
        "watch: {} ({} mentions, {} relationships) in {:?}",
        file.relative_path,
        report.mentions,
        report.relationships,
        start.elapsed()
    );
    Ok(Some(report))
}

/// Run the file watcher: spawn watcher thread, then async loop that receives paths
/// and calls handle_file_change. Runs until the watcher thread exits.
pub async fn run_watcher(ctx: WatchContext, root: &Path, debounce_ms: u64) -> Result<()> {
    let (tx, rx) = mpsc::channel();
    let rx = Arc::new(Mutex::new(rx));

    let watch_root = root.to_path_buf();
    std::thread::spawn(move || {
        if let Err(e) = watcher::run_watcher_thread(&watch_root, debounce_ms, tx) {
            log::error!("watcher thread error: {}", e);
        }
    });

    let parser_registry = ParserRegistry::new();

    loop {
        let rx_clone = rx.clone();
        let path = tokio::task::spawn_blocking(move || {
            rx_clone.lock().unwrap_or_else(|e| e.into_inner()).recv()
        })
        .await
        .map_err(|e| AssistError::Config(format!("watcher task join: {}", e)))?;

        let path = match path {
            Ok(p) => p,
            Err(_) => break,
        };

        if let Err(e) = handle_file_change(&ctx, root, &path, &parser_registry).await {
            log::error!("watch handle_file_change {}: {}", path.display(), e);
        }
    }
    Ok(())
}
