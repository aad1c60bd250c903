//! Process-level wiring shared by the server and the command-line tools.

use std::sync::Arc;

use crate::chat::Assistant;
use crate::config::Config;
use crate::db::{migrate, Db};
use crate::error::Result;
use crate::knowledge::{JsonFileSnapshotStore, KnowledgeStore, SnapshotStore, SqliteSnapshotStore};
use crate::metrics::QueryLogger;
use crate::respond::load_faqs;

/// Migrated database, restored knowledge store and the snapshot store it came from.
pub struct AppContext {
    pub config: Config,
    pub db: Db,
    pub store: Arc<KnowledgeStore>,
    pub snapshots: Arc<dyn SnapshotStore>,
}

impl AppContext {
    /// Migrate the database, restore the last snapshot and load the FAQ file.
    ///
    /// Snapshots go to `app.snapshot_path` when set, otherwise to SQLite. FAQs
    /// from `ingest.faq_path` are merged after the restore.
    pub async fn open(config: Config) -> Result<Self> {
        let db = Db::new(config.db_path());
        db.with_connection(|conn| migrate::run_migrations(conn)).await?;

        let snapshots: Arc<dyn SnapshotStore> = match &config.app.snapshot_path {
            Some(path) => Arc::new(JsonFileSnapshotStore::new(path)),
            None => Arc::new(SqliteSnapshotStore::new(db.clone())),
        };

        let store = Arc::new(KnowledgeStore::new());
        match snapshots.load().await? {
            Some(snapshot) => store.load(snapshot)?,
            None => log::info!("No knowledge snapshot found, starting empty"),
        }

        if let Some(faq_path) = &config.ingest.faq_path {
            let faqs = load_faqs(faq_path)?;
            log::info!("Loaded {} FAQs from {}", faqs.len(), faq_path.display());
            store.add_faqs(faqs);
        }

        Ok(Self {
            config,
            db,
            store,
            snapshots,
        })
    }

    /// Assistant over this context's store, logging queries to its database.
    pub fn assistant(&self) -> Result<Assistant> {
        Ok(Assistant::from_config(&self.config, Arc::clone(&self.store))?
            .with_logger(QueryLogger::new(self.db.clone())))
    }

    /// Write the current knowledge set to the snapshot store.
    pub async fn persist(&self) -> Result<()> {
        let snapshot = self.store.dump();
        self.snapshots.save(&snapshot).await?;
        log::info!(
            "Saved knowledge snapshot v{} ({} items)",
            snapshot.metadata.version,
            snapshot.metadata.total_items
        );
        Ok(())
    }
}
