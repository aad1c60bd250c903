//! Relational strategy: relationships matching the query's relation verbs.

use super::{QueryResult, Strategy};
use crate::intent::QueryIntent;
use crate::knowledge::{Entity, KnowledgeSet, Relationship};

pub const RELATIONAL_CONFIDENCE: f32 = 0.8;

fn matches_verb(relationship: &Relationship, verbs: &[String]) -> bool {
    let relation_type = relationship.relationship_type.to_lowercase();
    verbs.iter().any(|verb| {
        let spaced = verb.replace('_', " ");
        relation_type.contains(verb.as_str())
            || relationship.evidence.iter().any(|e| {
                let e = e.to_lowercase();
                e.contains(verb.as_str()) || e.contains(&spaced)
            })
    })
}

/// Relationships whose type or evidence contains one of the intent's verbs,
/// plus every entity they reference.
///
/// Without verbs (a broadened search) relationships touching the intent's
/// entities are used instead. Relationships touching the intent's entities are
/// listed first either way.
pub fn search(set: &KnowledgeSet, intent: &QueryIntent) -> QueryResult {
    let focus: Vec<&str> = intent
        .entities
        .iter()
        .filter_map(|name| set.entity_by_name(name))
        .map(|e| e.id.as_str())
        .collect();
    let touches_focus =
        |r: &Relationship| focus.contains(&r.source_entity_id.as_str()) || focus.contains(&r.target_entity_id.as_str());

    let mut relationships: Vec<Relationship> = set
        .relationships()
        .iter()
        .filter(|r| {
            if intent.relationship_verbs.is_empty() {
                touches_focus(r)
            } else {
                matches_verb(r, &intent.relationship_verbs)
            }
        })
        .cloned()
        .collect();
    relationships.sort_by_key(|r| !touches_focus(r));

    let mut entities: Vec<Entity> = Vec::new();
    for relationship in &relationships {
        for id in [&relationship.source_entity_id, &relationship.target_entity_id] {
            if entities.iter().any(|e| &e.id == id) {
                continue;
            }
            if let Some(entity) = set.entity_by_id(id) {
                entities.push(entity.clone());
            }
        }
    }

    QueryResult::from_strategy(Strategy::Relational, entities, relationships, Vec::new(), RELATIONAL_CONFIDENCE)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::knowledge::EntityType;
    use crate::search::tests::mention;

    fn carries_set() -> KnowledgeSet {
        let mut set = KnowledgeSet::default();
        let oceansat = mention(&mut set, "OCEANSAT-2", EntityType::Satellite, "", "d1");
        let ocm = mention(&mut set, "OCM", EntityType::Sensor, "", "d1");
        let insat = mention(&mut set, "INSAT-3D", EntityType::Satellite, "", "d2");
        let imager = mention(&mut set, "Imager", EntityType::Sensor, "", "d2");
        let sst = mention(&mut set, "SST", EntityType::DataProduct, "", "d2");
        set.add_relationship(Relationship::new(&oceansat, &ocm, "carries", 0.85, vec!["OCEANSAT-2 carries the OCM".into()], vec!["d1".into()]));
        set.add_relationship(Relationship::new(&insat, &imager, "carries", 0.85, vec!["INSAT-3D carries an Imager".into()], vec!["d2".into()]));
        set.add_relationship(Relationship::new(&imager, &sst, "provides", 0.8, vec!["Imager provides SST".into()], vec!["d2".into()]));
        set
    }

    #[test]
    fn test_verb_match_and_focus_ordering() {
        let set = carries_set();
        let intent = QueryIntent {
            relationship_verbs: vec!["carries".into()],
            entities: vec!["INSAT-3D".into()],
            ..Default::default()
        };
        let result = search(&set, &intent);
        assert_eq!(result.relationships.len(), 2);
        assert_eq!(result.relationships[0].evidence[0], "INSAT-3D carries an Imager");
        assert_eq!(result.entities.len(), 4);
        assert_eq!(result.entities[0].name, "INSAT-3D");
        assert_eq!(result.confidence, 0.8);
    }

    #[test]
    fn test_used_for_matches_spaced_evidence() {
        let mut set = KnowledgeSet::default();
        let a = mention(&mut set, "Scatterometer", EntityType::Sensor, "", "d");
        let b = mention(&mut set, "Ocean Surface Winds", EntityType::DataProduct, "", "d");
        set.add_relationship(Relationship::new(&a, &b, "measures", 0.75, vec!["Scatterometer is used for ocean surface winds".into()], vec![]));
        let intent = QueryIntent {
            relationship_verbs: vec!["used_for".into()],
            ..Default::default()
        };
        assert_eq!(search(&set, &intent).relationships.len(), 1);
    }

    #[test]
    fn test_without_verbs_uses_entity_neighbourhood() {
        let set = carries_set();
        let intent = QueryIntent {
            entities: vec!["Imager".into()],
            ..Default::default()
        };
        let result = search(&set, &intent);
        assert_eq!(result.relationships.len(), 2);

        let nothing = search(&set, &QueryIntent::default());
        assert!(nothing.is_empty());
        assert_eq!(nothing.confidence, 0.0);
    }
}
