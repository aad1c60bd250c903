use rusqlite::{Connection, params};
use crate::error::{Result, AssistError};

/// Migration metadata
struct Migration {
    version: u32,
    name: &'static str,
    sql: &'static str,
}

/// Schema migrations, applied in version order.
const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        name: "001_knowledge_snapshots",
        sql: r#"
            CREATE TABLE IF NOT EXISTS knowledge_snapshots (
                key TEXT PRIMARY KEY,
                payload TEXT NOT NULL,
                version INTEGER NOT NULL,
                total_items INTEGER NOT NULL,
                updated_at TEXT NOT NULL
            );
        "#,
    },
    Migration {
        version: 2,
        name: "002_query_logs",
        sql: r#"
            CREATE TABLE IF NOT EXISTS query_logs (
                query_id TEXT PRIMARY KEY,
                timestamp TEXT NOT NULL,
                user_id TEXT,
                session_id TEXT,
                query_text TEXT NOT NULL,
                intent_type TEXT NOT NULL,
                entity_count INTEGER NOT NULL,
                relationship_count INTEGER NOT NULL,
                spatial_match_count INTEGER NOT NULL,
                confidence REAL NOT NULL,
                latency_ms INTEGER NOT NULL,
                error INTEGER NOT NULL DEFAULT 0,
                escalated INTEGER NOT NULL DEFAULT 0,
                generation_path TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_logs_timestamp_intent ON query_logs(timestamp, intent_type);
        "#,
    },
    Migration {
        version: 3,
        name: "003_ingested_files",
        sql: r#"
            CREATE TABLE IF NOT EXISTS ingested_files (
                source_id TEXT PRIMARY KEY,
                file_hash TEXT NOT NULL,
                ingested_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
            );
        "#,
    },
];

/// Create schema_migrations table if it doesn't exist
fn ensure_migrations_table(conn: &Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            applied_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;
    Ok(())
}

/// Get list of applied migrations
pub fn get_applied_migrations(conn: &Connection) -> Result<Vec<String>> {
    let mut stmt = conn.prepare("SELECT name FROM schema_migrations ORDER BY version")?;
    let names: Vec<String> = stmt
        .query_map([], |row| row.get::<_, String>(0))?
        .collect::<std::result::Result<Vec<_>, rusqlite::Error>>()
        .map_err(AssistError::Database)?;
    Ok(names)
}

/// Run all pending migrations
pub fn run_migrations(conn: &mut Connection) -> Result<()> {
    ensure_migrations_table(conn)?;

    let applied = get_applied_migrations(conn)?;

    for migration in MIGRATIONS {
        if applied.iter().any(|name| name == migration.name) {
            log::debug!("Migration {} already applied, skipping", migration.name);
            continue;
        }

        log::info!("Applying migration: {} (version {})", migration.name, migration.version);

        let tx = conn.transaction()?;
        tx.execute_batch(migration.sql)?;
        tx.execute(
            "INSERT INTO schema_migrations (version, name) VALUES (?1, ?2)",
            params![migration.version, migration.name],
        )?;
        tx.commit()?;
    }

    log::debug!("All migrations completed");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_migrations_apply_once() {
        let mut conn = Connection::open_in_memory().unwrap();
        run_migrations(&mut conn).unwrap();
        run_migrations(&mut conn).unwrap();

        let applied = get_applied_migrations(&conn).unwrap();
        assert_eq!(
            applied,
            vec!["001_knowledge_snapshots", "002_query_logs", "003_ingested_files"]
        );

        let tables: Vec<String> = conn
            .prepare("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<std::result::Result<_, _>>()
            .unwrap();
        assert!(tables.contains(&"knowledge_snapshots".to_string()));
        assert!(tables.contains(&"query_logs".to_string()));
        assert!(tables.contains(&"ingested_files".to_string()));
    }
}
