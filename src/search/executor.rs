//! Strategy selection per intent type, fusion, and result finishing.

use super::{fusion, relational, semantic, spatial, suggest, temporal, QueryResult};
use crate::config::QueryConfig;
use crate::intent::{IntentType, QueryIntent};
use crate::knowledge::KnowledgeSet;

#[derive(Debug, Clone)]
pub struct QueryExecutor {
    semantic_limit: usize,
    temporal_limit: usize,
    broaden_below: f32,
}

impl Default for QueryExecutor {
    fn default() -> Self {
        Self::from_config(&QueryConfig::default())
    }
}

impl QueryExecutor {
    pub fn from_config(config: &QueryConfig) -> Self {
        Self {
            semantic_limit: config.semantic_limit,
            temporal_limit: config.temporal_limit,
            broaden_below: config.broaden_below,
        }
    }

    /// Run the strategies `intent` calls for against `set`.
    ///
    /// # Strategy selection
    ///
    /// | intent type                  | strategies                                  |
    /// |------------------------------|---------------------------------------------|
    /// | geospatial                   | spatial                                     |
    /// | temporal, temporal+geospatial| temporal, plus spatial when locations exist |
    /// | relationship                 | relational                                  |
    /// | anything else                | semantic; below `broaden_below` also spatial (with locations) and relational (with entities) |
    ///
    /// More than one strategy result is fused with [`fusion::fuse`].
    /// Explanation and suggestions are always regenerated at the end.
    pub fn execute(&self, intent: &QueryIntent, query: &str, set: &KnowledgeSet) -> QueryResult {
        let start = std::time::Instant::now();
        let mut results = Vec::new();

        match intent.intent_type {
            IntentType::Geospatial => results.push(spatial::search(set, intent)),
            IntentType::Temporal | IntentType::TemporalGeospatial => {
                results.push(temporal::search(set, intent, self.temporal_limit));
                if !intent.locations.is_empty() {
                    results.push(spatial::search(set, intent));
                }
            }
            IntentType::Relationship => results.push(relational::search(set, intent)),
            IntentType::Search | IntentType::Filter | IntentType::Comparison => {
                let semantic = semantic::search(set, query, self.semantic_limit);
                let broaden = semantic.confidence < self.broaden_below;
                results.push(semantic);
                if broaden {
                    if !intent.locations.is_empty() {
                        results.push(spatial::search(set, intent));
                    }
                    if !intent.entities.is_empty() {
                        results.push(relational::search(set, intent));
                    }
                }
            }
        }

        let mut result = if results.len() == 1 {
            results.remove(0)
        } else {
            fusion::fuse(results)
        };
        result.refresh_explanation();
        result.suggestions = suggest::suggestions(intent, &result);

        log::debug!(
            "Executed {} query v{} in {:?}: {}",
            intent.intent_type,
            set.version(),
            start.elapsed(),
            result.explanation
        );
        result
    }
}
