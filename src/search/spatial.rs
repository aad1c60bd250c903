//! Spatial strategy: entities whose mentions or coverage name a resolved place.

use super::{QueryResult, SpatialMatch, Strategy};
use crate::intent::QueryIntent;
use crate::knowledge::{Entity, KnowledgeSet};

/// Fixed confidence of every spatial match and of a non-empty result.
pub const SPATIAL_CONFIDENCE: f32 = 0.85;

/// First of `locations` the entity's mentions or `coverage` attribute name.
fn matched_location<'a>(entity: &Entity, locations: &'a [String]) -> Option<&'a String> {
    let coverage = entity
        .attribute_text("coverage")
        .map(|c| c.to_lowercase());
    locations.iter().find(|location| {
        let needle = location.to_lowercase();
        entity.mentions.iter().any(|m| {
            m.context.to_lowercase().contains(&needle) || m.text.to_lowercase().contains(&needle)
        }) || coverage.as_deref().is_some_and(|c| c.contains(&needle))
    })
}

fn matches_data_type(entity: &Entity, data_types: &[String]) -> bool {
    let entity_type = entity.entity_type.as_str();
    let name = entity.name.to_lowercase();
    let product_type = entity
        .attribute_text("product_type")
        .map(|p| p.to_lowercase())
        .unwrap_or_default();
    data_types.iter().any(|token| {
        let token = token.to_lowercase();
        entity_type.contains(&token) || name.contains(&token) || product_type.contains(&token)
    })
}

pub fn search(set: &KnowledgeSet, intent: &QueryIntent) -> QueryResult {
    let mut locations = intent.locations.clone();
    if let Some(scope) = &intent.spatial_scope {
        if !locations.contains(&scope.name) {
            locations.push(scope.name.clone());
        }
    }

    let mut entities = Vec::new();
    let mut matches = Vec::new();
    if !locations.is_empty() {
        for entity in set.entities() {
            let Some(location) = matched_location(entity, &locations) else {
                continue;
            };
            if !intent.data_types.is_empty() && !matches_data_type(entity, &intent.data_types) {
                continue;
            }
            matches.push(SpatialMatch {
                entity: entity.clone(),
                location: location.clone(),
                spatial_relation: "covers".to_string(),
                confidence: SPATIAL_CONFIDENCE,
                coverage: entity.attribute_text("coverage"),
                resolution: entity.attribute_text("resolution"),
            });
            entities.push(entity.clone());
        }
    }

    let relevant: Vec<&str> = entities.iter().map(|e| e.id.as_str()).collect();
    let relationships = set
        .relationships()
        .iter()
        .filter(|r| {
            relevant.contains(&r.source_entity_id.as_str())
                && relevant.contains(&r.target_entity_id.as_str())
        })
        .cloned()
        .collect();

    QueryResult::from_strategy(Strategy::Spatial, entities, relationships, matches, SPATIAL_CONFIDENCE)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gazetteer::Gazetteer;
    use crate::intent::SpatialScope;
    use crate::knowledge::{AttributeValue, EntityType, Relationship};
    use crate::search::tests::mention;

    fn scoped(name: &str) -> QueryIntent {
        let gazetteer = Gazetteer::default();
        QueryIntent {
            spatial_scope: gazetteer.resolve(name).map(SpatialScope::from),
            ..Default::default()
        }
    }

    #[test]
    fn test_single_match_for_mumbai_context() {
        let mut set = KnowledgeSet::default();
        mention(&mut set, "Rainfall", EntityType::DataProduct, "Heavy rainfall recorded over Mumbai", "d1");
        mention(&mut set, "SARAL", EntityType::Satellite, "Altimetry over the Bay of Bengal", "d2");

        let result = search(&set, &scoped("Mumbai"));
        assert_eq!(result.spatial_matches.len(), 1);
        let m = &result.spatial_matches[0];
        assert_eq!(m.entity.name, "Rainfall");
        assert_eq!(m.spatial_relation, "covers");
        assert_eq!(m.confidence, 0.85);
        assert_eq!(result.confidence, 0.85);
    }

    #[test]
    fn test_coverage_attribute_and_data_type_filter() {
        let mut set = KnowledgeSet::default();
        let dem = mention(&mut set, "DEM", EntityType::DataProduct, "Elevation model tiles", "d1");
        set.set_attribute(&dem, "coverage", AttributeValue::Text("Kerala and Karnataka".into()));
        let sat = mention(&mut set, "CARTOSAT-1", EntityType::Satellite, "Stereo pairs over Kerala", "d2");
        set.add_relationship(Relationship::new(&sat, &dem, "provides", 0.8, vec![], vec![]));

        let mut intent = scoped("Kerala");
        let all = search(&set, &intent);
        assert_eq!(all.entities.len(), 2);
        assert_eq!(all.relationships.len(), 1);

        intent.data_types = vec!["dem".to_string()];
        let filtered = search(&set, &intent);
        assert_eq!(filtered.entities.len(), 1);
        assert_eq!(filtered.entities[0].name, "DEM");
        assert_eq!(
            filtered.spatial_matches[0].coverage.as_deref(),
            Some("Kerala and Karnataka")
        );
        assert!(filtered.relationships.is_empty());
    }

    #[test]
    fn test_no_location_no_matches() {
        let mut set = KnowledgeSet::default();
        mention(&mut set, "Rainfall", EntityType::DataProduct, "over Mumbai", "d1");
        let result = search(&set, &QueryIntent::default());
        assert!(result.is_empty());
        assert_eq!(result.confidence, 0.0);
    }
}
