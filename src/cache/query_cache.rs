use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use crate::intent::QueryIntent;
use crate::search::QueryResult;

/// Parsed intent and executed result for one query text.
#[derive(Debug, Clone)]
pub struct CachedQuery {
    pub intent: QueryIntent,
    pub result: QueryResult,
}

/// Thread-safe LRU cache of executed queries
///
/// Keyed by knowledge version and normalized query text, so any write to the
/// knowledge store makes older entries unreachable; they age out by LRU.
pub struct QueryCache {
    cache: Mutex<LruCache<(u64, String), Arc<CachedQuery>>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

/// Lowercase, trim and collapse whitespace so trivially different spellings share an entry.
pub fn normalize_query(query: &str) -> String {
    query
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

impl QueryCache {
    /// Create a new query cache with the specified capacity
    ///
    /// # Arguments
    ///
    /// * `capacity` - Maximum number of cached queries (0 is treated as 1)
    pub fn new(capacity: usize) -> Self {
        let cap = NonZeroUsize::new(capacity.max(1)).unwrap_or(NonZeroUsize::MIN);
        Self {
            cache: Mutex::new(LruCache::new(cap)),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Look up `query` as executed against knowledge `version`
    ///
    /// # Returns
    ///
    /// Some(entry) if the same normalized query ran against the same version
    pub fn get(&self, version: u64, query: &str) -> Option<Arc<CachedQuery>> {
        let key = (version, normalize_query(query));
        let found = self
            .cache
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(&key)
            .cloned();
        let counter = if found.is_some() { &self.hits } else { &self.misses };
        counter.fetch_add(1, Ordering::Relaxed);
        found
    }

    pub fn put(&self, version: u64, query: &str, entry: CachedQuery) -> Arc<CachedQuery> {
        let entry = Arc::new(entry);
        self.cache
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .put((version, normalize_query(query)), entry.clone());
        entry
    }

    pub fn len(&self) -> usize {
        self.cache.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.cache.lock().unwrap_or_else(|e| e.into_inner()).clear();
    }

    /// (hits, misses) since creation
    pub fn stats(&self) -> (u64, u64) {
        (
            self.hits.load(Ordering::Relaxed),
            self.misses.load(Ordering::Relaxed),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::Strategy;

    fn entry(confidence: f32) -> CachedQuery {
        let mut result = QueryResult::from_strategy(Strategy::Semantic, vec![], vec![], vec![], 0.7);
        result.confidence = confidence;
        CachedQuery {
            intent: QueryIntent::default(),
            result,
        }
    }

    #[test]
    fn test_normalized_hit() {
        let cache = QueryCache::new(10);
        cache.put(1, "Latest  SST imagery", entry(0.75));

        let hit = cache.get(1, "  latest sst IMAGERY ");
        assert!(hit.is_some());
        assert_eq!(hit.unwrap().result.confidence, 0.75);
        assert_eq!(cache.stats(), (1, 0));
    }

    #[test]
    fn test_version_change_misses() {
        let cache = QueryCache::new(10);
        cache.put(1, "rainfall over mumbai", entry(0.85));

        assert!(cache.get(2, "rainfall over mumbai").is_none());
        assert_eq!(cache.stats(), (0, 1));
    }

    #[test]
    fn test_eviction_respects_recent_use() {
        let cache = QueryCache::new(2);
        cache.put(1, "query1", entry(0.1));
        cache.put(1, "query2", entry(0.2));

        let _ = cache.get(1, "query1");
        cache.put(1, "query3", entry(0.3));

        assert!(cache.get(1, "query1").is_some());
        assert!(cache.get(1, "query2").is_none());
        assert!(cache.get(1, "query3").is_some());
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_capacity_zero_and_clear() {
        let cache = QueryCache::new(0);
        cache.put(1, "a", entry(0.1));
        cache.put(1, "b", entry(0.2));
        assert_eq!(cache.len(), 1);

        cache.clear();
        assert!(cache.is_empty());
    }
}
