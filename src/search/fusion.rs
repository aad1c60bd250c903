//! Weighted fusion of per-strategy results.

use std::collections::HashSet;

use super::QueryResult;

/// Combine strategy results into one.
///
/// # Algorithm
///
/// - Entities and relationships are unioned by id; the first result to
///   contribute an id wins, later copies are dropped.
/// - Spatial matches are concatenated.
/// - Confidence is the average of each result's confidence weighted by its
///   item count (`entities + relationships + spatial_matches`):
///
/// ```text
/// confidence = Σ confidence_i · items_i / Σ items_i
/// ```
///
///   falling back to the maximum confidence when every result is empty.
///
/// Explanation and suggestions are left empty for the caller to regenerate.
pub fn fuse(results: Vec<QueryResult>) -> QueryResult {
    let total_weight: usize = results.iter().map(|r| r.item_count()).sum();
    let confidence = if total_weight == 0 {
        results.iter().map(|r| r.confidence).fold(0.0, f32::max)
    } else {
        results
            .iter()
            .map(|r| r.confidence * r.item_count() as f32)
            .sum::<f32>()
            / total_weight as f32
    };

    let mut fused = QueryResult {
        entities: Vec::new(),
        relationships: Vec::new(),
        spatial_matches: Vec::new(),
        confidence,
        explanation: String::new(),
        suggestions: Vec::new(),
        strategies: Vec::new(),
    };
    let mut entity_ids = HashSet::new();
    let mut relationship_ids = HashSet::new();

    for result in results {
        for entity in result.entities {
            if entity_ids.insert(entity.id.clone()) {
                fused.entities.push(entity);
            }
        }
        for relationship in result.relationships {
            if relationship_ids.insert(relationship.id.clone()) {
                fused.relationships.push(relationship);
            }
        }
        fused.spatial_matches.extend(result.spatial_matches);
        for strategy in result.strategies {
            if !fused.strategies.contains(&strategy) {
                fused.strategies.push(strategy);
            }
        }
    }

    log::debug!(
        "Fused {} strategies: {} entities, {} relationships, {} spatial matches, confidence {:.3}",
        fused.strategies.len(),
        fused.entities.len(),
        fused.relationships.len(),
        fused.spatial_matches.len(),
        fused.confidence
    );
    fused
}
