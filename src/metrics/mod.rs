//! Per-query metrics and their optional SQLite log.

use chrono::{DateTime, Utc};
use rusqlite::params;
use serde::Serialize;
use uuid::Uuid;

use crate::db::Db;
use crate::error::{AssistError, Result};
use crate::respond::GenerationPath;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// What one answered query produced and how long it took.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryMetrics {
    pub query_id: String,
    pub timestamp: DateTime<Utc>,
    pub user_id: String,
    pub session_id: String,
    pub query_text: String,
    pub intent_type: String,
    pub entity_count: usize,
    pub relationship_count: usize,
    pub spatial_match_count: usize,
    pub confidence: f32,
    pub latency_ms: u64,
    pub error: bool,
    pub escalated: bool,
    pub cache_hit: bool,
    pub generation_path: GenerationPath,
}

impl QueryMetrics {
    pub fn new(user_id: &str, session_id: &str, query_text: &str) -> Self {
        Self {
            query_id: Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            user_id: user_id.to_string(),
            session_id: session_id.to_string(),
            query_text: query_text.to_string(),
            intent_type: String::new(),
            entity_count: 0,
            relationship_count: 0,
            spatial_match_count: 0,
            confidence: 0.0,
            latency_ms: 0,
            error: false,
            escalated: false,
            cache_hit: false,
            generation_path: GenerationPath::Template,
        }
    }
}

/// Aggregate over a window of logged queries, grouped by intent type.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IntentStats {
    pub intent_type: String,
    pub count: i64,
    pub avg_latency_ms: f64,
    pub max_latency_ms: i64,
    pub avg_confidence: f64,
    pub escalations: i64,
    pub errors: i64,
}

/// Value at quantile `p` of ascending `sorted_values`, 0 when empty.
pub fn percentile(sorted_values: &[i64], p: f64) -> i64 {
    if sorted_values.is_empty() {
        return 0;
    }
    let index = ((sorted_values.len() - 1) as f64 * p).ceil() as usize;
    sorted_values[index.min(sorted_values.len() - 1)]
}

/// Writes [`QueryMetrics`] to the `query_logs` table and reads summaries back.
#[derive(Debug, Clone)]
pub struct QueryLogger {
    db: Db,
}

impl QueryLogger {
    /// The database must already be migrated.
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    pub async fn log(&self, metrics: &QueryMetrics) -> Result<()> {
        let m = metrics.clone();
        self.db
            .with_connection(move |conn| {
                conn.execute(
                    r#"
                    INSERT INTO query_logs (
                        query_id, timestamp, user_id, session_id, query_text,
                        intent_type, entity_count, relationship_count, spatial_match_count,
                        confidence, latency_ms, error, escalated, generation_path
                    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)
                    "#,
                    params![
                        m.query_id,
                        m.timestamp.format(TIMESTAMP_FORMAT).to_string(),
                        m.user_id,
                        m.session_id,
                        m.query_text,
                        m.intent_type,
                        m.entity_count as i64,
                        m.relationship_count as i64,
                        m.spatial_match_count as i64,
                        m.confidence as f64,
                        m.latency_ms as i64,
                        m.error,
                        m.escalated,
                        m.generation_path.as_str(),
                    ],
                )?;
                Ok::<_, AssistError>(())
            })
            .await
    }

    /// Per-intent aggregates for the last `hours` hours, busiest first.
    pub async fn summary(&self, hours: u32) -> Result<Vec<IntentStats>> {
        let window = format!("-{} hours", hours);
        self.db
            .with_connection(move |conn| {
                let mut stmt = conn.prepare(
                    r#"
                    SELECT
                        intent_type,
                        COUNT(*),
                        AVG(latency_ms),
                        MAX(latency_ms),
                        AVG(confidence),
                        SUM(escalated),
                        SUM(error)
                    FROM query_logs
                    WHERE timestamp > datetime('now', ?1)
                    GROUP BY intent_type
                    ORDER BY COUNT(*) DESC, intent_type
                    "#,
                )?;
                let rows = stmt.query_map(params![window], |row| {
                    Ok(IntentStats {
                        intent_type: row.get(0)?,
                        count: row.get(1)?,
                        avg_latency_ms: row.get::<_, Option<f64>>(2)?.unwrap_or(0.0),
                        max_latency_ms: row.get::<_, Option<i64>>(3)?.unwrap_or(0),
                        avg_confidence: row.get::<_, Option<f64>>(4)?.unwrap_or(0.0),
                        escalations: row.get::<_, Option<i64>>(5)?.unwrap_or(0),
                        errors: row.get::<_, Option<i64>>(6)?.unwrap_or(0),
                    })
                })?;
                rows.collect::<std::result::Result<Vec<_>, _>>()
                    .map_err(AssistError::Database)
            })
            .await
    }

    /// Ascending latencies for the last `hours` hours.
    pub async fn latencies(&self, hours: u32) -> Result<Vec<i64>> {
        let window = format!("-{} hours", hours);
        self.db
            .with_connection(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT latency_ms FROM query_logs
                     WHERE timestamp > datetime('now', ?1)
                     ORDER BY latency_ms",
                )?;
                let rows = stmt.query_map(params![window], |row| row.get::<_, i64>(0))?;
                rows.collect::<std::result::Result<Vec<_>, _>>()
                    .map_err(AssistError::Database)
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::migrate;
    use tempfile::TempDir;

    async fn logger(temp: &TempDir) -> QueryLogger {
        let db = Db::new(temp.path().join("metrics.db"));
        db.with_connection(|conn| migrate::run_migrations(conn)).await.unwrap();
        QueryLogger::new(db)
    }

    fn metrics(intent: &str, latency_ms: u64, escalated: bool) -> QueryMetrics {
        QueryMetrics {
            intent_type: intent.to_string(),
            latency_ms,
            escalated,
            confidence: 0.8,
            ..QueryMetrics::new("u1", "s1", "what does INSAT-3D carry")
        }
    }

    #[test]
    fn test_percentile() {
        let values = vec![10, 20, 30, 40, 50];
        assert_eq!(percentile(&values, 0.5), 30);
        assert_eq!(percentile(&values, 0.95), 50);
        assert_eq!(percentile(&[], 0.5), 0);
    }

    #[tokio::test]
    async fn test_log_and_summarize() {
        let temp = TempDir::new().unwrap();
        let logger = logger(&temp).await;

        logger.log(&metrics("relationship", 12, false)).await.unwrap();
        logger.log(&metrics("relationship", 30, true)).await.unwrap();
        logger.log(&metrics("geospatial", 5, false)).await.unwrap();

        let summary = logger.summary(24).await.unwrap();
        assert_eq!(summary.len(), 2);
        assert_eq!(summary[0].intent_type, "relationship");
        assert_eq!(summary[0].count, 2);
        assert_eq!(summary[0].max_latency_ms, 30);
        assert_eq!(summary[0].escalations, 1);
        assert!((summary[0].avg_latency_ms - 21.0).abs() < 1e-9);

        assert_eq!(logger.latencies(24).await.unwrap(), vec![5, 12, 30]);
    }

    #[tokio::test]
    async fn test_old_entries_outside_window() {
        let temp = TempDir::new().unwrap();
        let logger = logger(&temp).await;

        let mut old = metrics("search", 7, false);
        old.timestamp = Utc::now() - chrono::Duration::hours(48);
        logger.log(&old).await.unwrap();

        assert!(logger.summary(24).await.unwrap().is_empty());
        assert_eq!(logger.summary(72).await.unwrap().len(), 1);
    }
}
