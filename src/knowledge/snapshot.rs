//! Persisted snapshot schema and the stores that read/write it whole.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension};
use serde::{Deserialize, Serialize};

use super::{Entity, FaqItem, Relationship};
use crate::db::Db;
use crate::error::{AssistError, Result};

/// Snapshot bookkeeping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotMetadata {
    pub last_updated: DateTime<Utc>,
    pub version: u64,
    pub total_items: usize,
}

/// Everything needed to fully reload a knowledge store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeSnapshot {
    pub entities: Vec<Entity>,
    pub relationships: Vec<Relationship>,
    #[serde(default)]
    pub faqs: Vec<FaqItem>,
    pub metadata: SnapshotMetadata,
}

impl KnowledgeSnapshot {
    /// Parse a snapshot; any syntax or shape error is a snapshot error.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| AssistError::Snapshot(format!("malformed snapshot: {}", e)))
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// External key-value persistence for whole snapshots.
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    async fn save(&self, snapshot: &KnowledgeSnapshot) -> Result<()>;

    /// `Ok(None)` when nothing has been saved yet.
    async fn load(&self) -> Result<Option<KnowledgeSnapshot>>;
}

/// Snapshot kept in a single JSON file.
pub struct JsonFileSnapshotStore {
    path: PathBuf,
}

impl JsonFileSnapshotStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl SnapshotStore for JsonFileSnapshotStore {
    async fn save(&self, snapshot: &KnowledgeSnapshot) -> Result<()> {
        let json = snapshot.to_json()?;
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        // Write next to the target and rename so readers never see a partial file
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, json).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        log::debug!(
            "Saved snapshot v{} to {}",
            snapshot.metadata.version,
            self.path.display()
        );
        Ok(())
    }

    async fn load(&self) -> Result<Option<KnowledgeSnapshot>> {
        if !tokio::fs::try_exists(&self.path).await? {
            return Ok(None);
        }
        let json = tokio::fs::read_to_string(&self.path).await?;
        KnowledgeSnapshot::from_json(&json).map(Some)
    }
}

/// Snapshot kept as a JSON payload in the SQLite `knowledge_snapshots` table.
pub struct SqliteSnapshotStore {
    db: Db,
    key: String,
}

impl SqliteSnapshotStore {
    pub const DEFAULT_KEY: &'static str = "knowledge_base";

    pub fn new(db: Db) -> Self {
        Self::with_key(db, Self::DEFAULT_KEY)
    }

    pub fn with_key(db: Db, key: &str) -> Self {
        Self {
            db,
            key: key.to_string(),
        }
    }
}

#[async_trait]
impl SnapshotStore for SqliteSnapshotStore {
    async fn save(&self, snapshot: &KnowledgeSnapshot) -> Result<()> {
        let payload = serde_json::to_string(snapshot)?;
        let key = self.key.clone();
        let version = snapshot.metadata.version as i64;
        let total_items = snapshot.metadata.total_items as i64;
        let updated_at = snapshot.metadata.last_updated.to_rfc3339();
        self.db
            .with_connection(move |conn| {
                conn.execute(
                    r#"
                    INSERT INTO knowledge_snapshots (key, payload, version, total_items, updated_at)
                    VALUES (?1, ?2, ?3, ?4, ?5)
                    ON CONFLICT(key) DO UPDATE SET
                        payload = excluded.payload,
                        version = excluded.version,
                        total_items = excluded.total_items,
                        updated_at = excluded.updated_at
                    "#,
                    params![key, payload, version, total_items, updated_at],
                )?;
                Ok(())
            })
            .await
    }

    async fn load(&self) -> Result<Option<KnowledgeSnapshot>> {
        let key = self.key.clone();
        let payload: Option<String> = self
            .db
            .with_connection(move |conn| {
                let payload = conn
                    .query_row(
                        "SELECT payload FROM knowledge_snapshots WHERE key = ?1",
                        [&key],
                        |row| row.get(0),
                    )
                    .optional()?;
                Ok(payload)
            })
            .await?;
        payload
            .map(|json| KnowledgeSnapshot::from_json(&json))
            .transpose()
    }
}
