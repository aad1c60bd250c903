//! Incremental ingestion: skip pages whose content hash was already extracted.
//!
//! Extraction is append-only, so feeding an unchanged page again would double
//! its mentions. The `ingested_files` table remembers what went in.

use std::collections::HashMap;

use rusqlite::params;

use crate::db::Db;
use crate::error::{AssistError, Result};
use crate::ingest::{compute_file_hash, FileMetadata};

/// Discovered files split against the ingested-file ledger.
#[derive(Debug, Default)]
pub struct FileClassification {
    /// Never extracted.
    pub new_files: Vec<FileMetadata>,
    /// Extracted before with different content; re-extraction appends new mentions.
    pub modified_files: Vec<FileMetadata>,
    /// Same hash as last time; skipped.
    pub unchanged_files: Vec<FileMetadata>,
}

impl FileClassification {
    /// New and modified files, in discovery order.
    pub fn pending(&self) -> Vec<FileMetadata> {
        self.new_files
            .iter()
            .chain(self.modified_files.iter())
            .cloned()
            .collect()
    }
}

/// `source_id → file_hash` for every ingested page.
pub async fn get_existing_hashes(db: &Db) -> Result<HashMap<String, String>> {
    db.with_connection(|conn| {
        let mut stmt = conn.prepare("SELECT source_id, file_hash FROM ingested_files")?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;
        let mut map = HashMap::new();
        for row in rows {
            let (source_id, hash) = row?;
            map.insert(source_id, hash);
        }
        Ok::<HashMap<String, String>, AssistError>(map)
    })
    .await
}

/// Classify `files` by comparing current hashes with `existing_hashes`.
pub fn classify_files(
    files: &[FileMetadata],
    existing_hashes: &HashMap<String, String>,
) -> Result<FileClassification> {
    let mut classification = FileClassification::default();

    for file in files {
        let current_hash = compute_file_hash(&file.absolute_path)?;
        match existing_hashes.get(&file.relative_path) {
            None => classification.new_files.push(file.clone()),
            Some(stored) if stored != &current_hash => classification.modified_files.push(file.clone()),
            Some(_) => classification.unchanged_files.push(file.clone()),
        }
    }

    Ok(classification)
}

/// Record that `source_id` was extracted with content `file_hash`.
pub async fn record_ingested(db: &Db, source_id: &str, file_hash: &str) -> Result<()> {
    let source_id = source_id.to_string();
    let file_hash = file_hash.to_string();
    db.with_connection(move |conn| {
        conn.execute(
            "INSERT INTO ingested_files (source_id, file_hash, ingested_at)
             VALUES (?1, ?2, CURRENT_TIMESTAMP)
             ON CONFLICT(source_id) DO UPDATE SET
                file_hash = excluded.file_hash,
                ingested_at = excluded.ingested_at",
            params![source_id, file_hash],
        )?;
        Ok::<_, AssistError>(())
    })
    .await
}

/// Forget every ingested page, e.g. after the knowledge base was cleared.
pub async fn forget_all(db: &Db) -> Result<usize> {
    db.with_connection(|conn| {
        let removed = conn.execute("DELETE FROM ingested_files", [])?;
        Ok::<_, AssistError>(removed)
    })
    .await
}
