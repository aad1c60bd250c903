//! Semantic strategy: lexical overlap between query tokens and entity names,
//! types and mention contexts.

use super::{QueryResult, Strategy};
use crate::knowledge::{Entity, KnowledgeSet};
use crate::text::significant_tokens;

pub const SEMANTIC_CONFIDENCE: f32 = 0.7;
/// Entities must score strictly above this to be included.
pub const INCLUSION_THRESHOLD: f32 = 0.3;

/// Per-entity relevance in [0, 1].
///
/// * 0.4 when a token occurs in the entity name
/// * 0.3 when a token (or its singular) occurs in the entity type
/// * up to 0.3 for the share of tokens found in the mention contexts
pub fn score_entity(entity: &Entity, tokens: &[String]) -> f32 {
    if tokens.is_empty() {
        return 0.0;
    }
    let name = entity.name.to_lowercase();
    let entity_type = entity.entity_type.as_str();
    let contexts = entity
        .mentions
        .iter()
        .map(|m| m.context.to_lowercase())
        .collect::<Vec<_>>()
        .join(" ");

    let mut score = 0.0;
    if tokens.iter().any(|t| name.contains(t.as_str())) {
        score += 0.4;
    }
    if tokens.iter().any(|t| {
        let singular = t.strip_suffix('s').unwrap_or(t);
        entity_type.contains(t.as_str()) || (singular.len() > 2 && entity_type.contains(singular))
    }) {
        score += 0.3;
    }
    let in_context = tokens.iter().filter(|t| contexts.contains(t.as_str())).count();
    score += 0.3 * in_context as f32 / tokens.len() as f32;
    score
}

/// Entities scoring above the inclusion threshold, best first, at most `limit`.
pub fn search(set: &KnowledgeSet, query: &str, limit: usize) -> QueryResult {
    let tokens = significant_tokens(query);
    let mut scored: Vec<(f32, &Entity)> = set
        .entities()
        .iter()
        .map(|e| (score_entity(e, &tokens), e))
        .filter(|(score, _)| *score > INCLUSION_THRESHOLD)
        .collect();
    scored.sort_by(|a, b| b.0.total_cmp(&a.0));
    let entities = scored
        .into_iter()
        .take(limit)
        .map(|(_, e)| e.clone())
        .collect();

    QueryResult::from_strategy(Strategy::Semantic, entities, Vec::new(), Vec::new(), SEMANTIC_CONFIDENCE)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::knowledge::EntityType;
    use crate::search::tests::mention;

    #[test]
    fn test_score_components() {
        let mut set = KnowledgeSet::default();
        mention(&mut set, "SCATSAT-1", EntityType::Satellite, "scatsat-1 measures ocean winds", "d");
        let entity = &set.entities()[0];

        let tokens = significant_tokens("scatsat winds");
        // name hit + both tokens in context
        assert!((score_entity(entity, &tokens) - 0.7).abs() < 1e-6);

        let tokens = significant_tokens("list satellites");
        // type hit via singular, neither token in context
        assert!((score_entity(entity, &tokens) - 0.3).abs() < 1e-6);
        assert_eq!(score_entity(entity, &[]), 0.0);
    }

    #[test]
    fn test_threshold_and_ordering() {
        let mut set = KnowledgeSet::default();
        mention(&mut set, "Imager", EntityType::Sensor, "imaging in visible and infrared", "d");
        mention(&mut set, "Sounder", EntityType::Sensor, "profiles of temperature", "d");
        mention(&mut set, "SST", EntityType::DataProduct, "derived from the imager infrared", "d");

        let result = search(&set, "imager infrared", 50);
        let names: Vec<_> = result.entities.iter().map(|e| e.name.as_str()).collect();
        // Imager: 0.4 + 0.15; SST: 0.3 from context only, not above threshold
        assert_eq!(names, vec!["Imager"]);
        assert_eq!(result.confidence, 0.7);
    }

    #[test]
    fn test_limit() {
        let mut set = KnowledgeSet::default();
        for i in 0..5 {
            mention(&mut set, &format!("Sensor {}", i), EntityType::Sensor, "", "d");
        }
        assert_eq!(search(&set, "sensor", 3).entities.len(), 3);
        assert!(search(&set, "zz", 3).is_empty());
    }
}
