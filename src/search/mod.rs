//! Intent-driven retrieval over the knowledge set.
//!
//! Four strategies (spatial, temporal, relational, semantic) each produce a
//! [`QueryResult`]; [`QueryExecutor`] picks strategies from the intent type and
//! fuses their results when more than one ran.

pub mod executor;
pub mod fusion;
pub mod relational;
pub mod semantic;
pub mod spatial;
pub mod suggest;
pub mod temporal;

pub use executor::QueryExecutor;

use serde::{Deserialize, Serialize};

use crate::knowledge::{Entity, Relationship};

/// Retrieval strategy that contributed to a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    Spatial,
    Temporal,
    Relational,
    Semantic,
}

impl Strategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Strategy::Spatial => "spatial",
            Strategy::Temporal => "temporal",
            Strategy::Relational => "relational",
            Strategy::Semantic => "semantic",
        }
    }
}

/// An entity judged to cover a resolved location.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpatialMatch {
    pub entity: Entity,
    pub location: String,
    pub spatial_relation: String,
    pub confidence: f32,
    #[serde(default)]
    pub coverage: Option<String>,
    #[serde(default)]
    pub resolution: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryResult {
    pub entities: Vec<Entity>,
    pub relationships: Vec<Relationship>,
    pub spatial_matches: Vec<SpatialMatch>,
    pub confidence: f32,
    pub explanation: String,
    pub suggestions: Vec<String>,
    pub strategies: Vec<Strategy>,
}

impl QueryResult {
    /// Result of a single strategy, before explanation and suggestions are filled.
    pub fn from_strategy(
        strategy: Strategy,
        entities: Vec<Entity>,
        relationships: Vec<Relationship>,
        spatial_matches: Vec<SpatialMatch>,
        confidence_when_found: f32,
    ) -> Self {
        let found = !entities.is_empty() || !relationships.is_empty() || !spatial_matches.is_empty();
        Self {
            entities,
            relationships,
            spatial_matches,
            confidence: if found { confidence_when_found } else { 0.0 },
            explanation: String::new(),
            suggestions: Vec::new(),
            strategies: vec![strategy],
        }
    }

    /// Entities, relationships and spatial matches together.
    pub fn item_count(&self) -> usize {
        self.entities.len() + self.relationships.len() + self.spatial_matches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.item_count() == 0
    }

    /// Source identifiers of every referenced entity and relationship.
    pub fn sources(&self) -> Vec<String> {
        let mut out: Vec<String> = Vec::new();
        let entity_sources = self
            .entities
            .iter()
            .chain(self.spatial_matches.iter().map(|m| &m.entity))
            .flat_map(|e| e.source_documents.iter());
        let relationship_sources = self
            .relationships
            .iter()
            .flat_map(|r| r.source_identifiers.iter());
        for source in entity_sources.chain(relationship_sources) {
            if !out.contains(source) {
                out.push(source.clone());
            }
        }
        out
    }

    /// Regenerate the human-readable summary.
    pub fn refresh_explanation(&mut self) {
        let strategies: Vec<&str> = self.strategies.iter().map(|s| s.as_str()).collect();
        self.explanation = if self.is_empty() {
            format!("No matching knowledge found using {} retrieval", strategies.join(" + "))
        } else {
            format!(
                "Found {} entities, {} relationships and {} spatial matches using {} retrieval (confidence {:.2})",
                self.entities.len(),
                self.relationships.len(),
                self.spatial_matches.len(),
                strategies.join(" + "),
                self.confidence
            )
        };
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::knowledge::{EntityMention, EntityType, KnowledgeSet};
    use std::collections::BTreeMap;

    /// Add one mention with the given context to `set`.
    pub(crate) fn mention(set: &mut KnowledgeSet, name: &str, ty: EntityType, context: &str, source: &str) -> String {
        set.add_mention(
            name,
            ty,
            EntityMention {
                text: name.to_string(),
                context: context.to_string(),
                confidence: 0.8,
                source_identifier: source.to_string(),
            },
            BTreeMap::new(),
        )
    }

    #[test]
    fn test_confidence_zero_when_strategy_finds_nothing() {
        let r = QueryResult::from_strategy(Strategy::Semantic, vec![], vec![], vec![], 0.7);
        assert_eq!(r.confidence, 0.0);
        assert!(r.is_empty());
    }

    #[test]
    fn test_sources_are_deduplicated() {
        let mut set = KnowledgeSet::default();
        mention(&mut set, "INSAT-3D", EntityType::Satellite, "", "a");
        mention(&mut set, "Imager", EntityType::Sensor, "", "a");
        mention(&mut set, "Imager", EntityType::Sensor, "", "b");
        let mut r = QueryResult::from_strategy(Strategy::Semantic, set.entities().to_vec(), vec![], vec![], 0.7);
        assert_eq!(r.sources(), vec!["a".to_string(), "b".to_string()]);
        r.refresh_explanation();
        assert!(r.explanation.starts_with("Found 2 entities"));
    }
}
