//! Content ingestion: discover pages, reduce them to text and feed them to the
//! extractor, skipping pages whose content was already extracted.

pub mod walker;
pub mod metadata;
pub mod parsers;
pub mod incremental;

pub use walker::{FileMetadata, discover_files, file_metadata, is_supported};
pub use incremental::{
    FileClassification, classify_files, forget_all, get_existing_hashes, record_ingested,
};
pub use metadata::{compute_file_hash, content_hash};
pub use parsers::{ParserRegistry, ParsedDocument};

use std::path::Path;

use serde::Serialize;

use crate::db::Db;
use crate::error::Result;
use crate::extract::{ExtractionReport, Extractor};
use crate::knowledge::KnowledgeStore;

/// Totals for one ingestion run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct IngestSummary {
    pub discovered: usize,
    pub processed: usize,
    pub unchanged: usize,
    pub failed: usize,
    pub mentions: usize,
    pub new_entities: usize,
    pub attributes: usize,
    pub relationships: usize,
    pub unresolved_relations: usize,
}

impl IngestSummary {
    fn add(&mut self, report: &ExtractionReport) {
        self.processed += 1;
        self.mentions += report.mentions;
        self.new_entities += report.new_entities;
        self.attributes += report.attributes;
        self.relationships += report.relationships;
        self.unresolved_relations += report.unresolved_relations;
    }
}

/// Parse one file and merge its text into `store`
///
/// The file's relative path is the source identifier.
pub fn ingest_file(
    store: &KnowledgeStore,
    extractor: &Extractor,
    parser_registry: &ParserRegistry,
    file: &FileMetadata,
) -> Result<ExtractionReport> {
    let content = std::fs::read_to_string(&file.absolute_path)?;
    let parsed = parser_registry.parse(&content, &file.relative_path, &file.extension)?;
    log::debug!(
        "Parsed {} as {} ({} chars{})",
        file.relative_path,
        parsed.doc_type,
        parsed.text.len(),
        parsed
            .title
            .as_deref()
            .map(|t| format!(", title \"{}\"", t))
            .unwrap_or_default()
    );
    Ok(store.process_document(extractor, &parsed.text, &file.relative_path))
}

/// Ingest every supported page under `root`
///
/// # Arguments
///
/// * `store` - Knowledge store to merge into
/// * `extractor` - Pattern-driven extractor
/// * `root` - Content folder
/// * `ledger` - Database holding the ingested-file hashes; without it every
///   page is processed
/// * `force` - Process every page even when its hash is unchanged
///
/// # Returns
///
/// Run totals. A page that fails to read or parse is logged and counted in
/// `failed`; the run continues.
pub async fn ingest_folder(
    store: &KnowledgeStore,
    extractor: &Extractor,
    root: &Path,
    ledger: Option<&Db>,
    force: bool,
) -> Result<IngestSummary> {
    let start = std::time::Instant::now();
    let files = discover_files(root)?;
    let mut summary = IngestSummary {
        discovered: files.len(),
        ..IngestSummary::default()
    };

    let pending = match ledger {
        Some(db) if !force => {
            let existing = get_existing_hashes(db).await?;
            let classification = classify_files(&files, &existing)?;
            log::info!(
                "Incremental: {} new, {} modified, {} unchanged (skipped)",
                classification.new_files.len(),
                classification.modified_files.len(),
                classification.unchanged_files.len()
            );
            summary.unchanged = classification.unchanged_files.len();
            classification.pending()
        }
        _ => files,
    };

    let registry = ParserRegistry::new();
    for file in &pending {
        match ingest_file(store, extractor, &registry, file) {
            Ok(report) => {
                summary.add(&report);
                if let Some(db) = ledger {
                    let hash = compute_file_hash(&file.absolute_path)?;
                    record_ingested(db, &file.relative_path, &hash).await?;
                }
            }
            Err(e) => {
                log::warn!("Failed to ingest {}: {}", file.relative_path, e);
                summary.failed += 1;
            }
        }
    }

    log::info!(
        "Ingested {} of {} files in {:?}: {} mentions, {} new entities, {} relationships",
        summary.processed,
        summary.discovered,
        start.elapsed(),
        summary.mentions,
        summary.new_entities,
        summary.relationships
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::migrate;
    use tempfile::TempDir;

    fn content(temp: &TempDir) -> std::path::PathBuf {
        let root = temp.path().join("content");
        std::fs::create_dir_all(root.join("missions")).unwrap();
        std::fs::write(
            root.join("missions/insat3d.md"),
            "# INSAT-3D\n\nINSAT-3D carries an Imager for weather monitoring.\n",
        )
        .unwrap();
        std::fs::write(
            root.join("oceansat2.html"),
            "<p>OCEANSAT-2 carries the Ocean Colour Monitor.</p>",
        )
        .unwrap();
        root
    }

    #[tokio::test]
    async fn test_ingest_folder_without_ledger() {
        let temp = TempDir::new().unwrap();
        let root = content(&temp);
        let store = KnowledgeStore::new();

        let summary = ingest_folder(&store, &Extractor::default(), &root, None, false)
            .await
            .unwrap();

        assert_eq!(summary.discovered, 2);
        assert_eq!(summary.processed, 2);
        assert_eq!(summary.failed, 0);
        assert_eq!(summary.relationships, 2);

        let set = store.snapshot();
        let insat = set.entity_by_name("INSAT-3D").unwrap();
        assert_eq!(insat.source_documents, vec!["missions/insat3d.md".to_string()]);
        assert!(set.entity_by_name("OCEANSAT-2").is_some());
    }

    #[tokio::test]
    async fn test_ledger_skips_unchanged_pages() {
        let temp = TempDir::new().unwrap();
        let root = content(&temp);
        let db = Db::new(temp.path().join("ledger.db"));
        db.with_connection(|conn| migrate::run_migrations(conn)).await.unwrap();
        let store = KnowledgeStore::new();
        let extractor = Extractor::default();

        let first = ingest_folder(&store, &extractor, &root, Some(&db), false).await.unwrap();
        assert_eq!(first.processed, 2);
        let mentions = store.snapshot().entity_by_name("INSAT-3D").unwrap().mentions.len();

        let second = ingest_folder(&store, &extractor, &root, Some(&db), false).await.unwrap();
        assert_eq!(second.processed, 0);
        assert_eq!(second.unchanged, 2);
        assert_eq!(
            store.snapshot().entity_by_name("INSAT-3D").unwrap().mentions.len(),
            mentions
        );

        std::fs::write(root.join("oceansat2.html"), "<p>SCATSAT-1 provides Ocean Surface Winds.</p>").unwrap();
        let third = ingest_folder(&store, &extractor, &root, Some(&db), false).await.unwrap();
        assert_eq!(third.processed, 1);

        let forced = ingest_folder(&store, &extractor, &root, Some(&db), true).await.unwrap();
        assert_eq!(forced.processed, 2);
    }
}
