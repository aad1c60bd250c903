//! Follow-up hints attached to every query result.

use std::collections::BTreeSet;

use super::QueryResult;
use crate::intent::QueryIntent;

pub const MAX_SUGGESTIONS: usize = 3;

/// Ranked follow-up hints for `result`, at most [`MAX_SUGGESTIONS`].
pub fn suggestions(intent: &QueryIntent, result: &QueryResult) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();

    if result.entities.is_empty() && result.spatial_matches.is_empty() {
        out.push("Try naming a specific satellite, for example INSAT-3D or OCEANSAT-2".to_string());
        out.push("Add a location such as Kerala, Gujarat or Mumbai".to_string());
        out.push("Specify a data type such as SST, rainfall, DEM or NDVI".to_string());
    } else {
        if intent.intent_type.is_geospatial() && result.spatial_matches.is_empty() {
            out.push(
                "Try a broader area, such as a state name instead of a city".to_string(),
            );
        }
        if intent.locations.is_empty() && !intent.intent_type.is_geospatial() {
            out.push("Add a location, for example \"over Kerala\", to narrow the results".to_string());
        }
        let types: BTreeSet<_> = result
            .entities
            .iter()
            .chain(result.spatial_matches.iter().map(|m| &m.entity))
            .map(|e| e.entity_type)
            .collect();
        for entity_type in types {
            out.push(format!("Explore related {}", entity_type.plural_label()));
        }
    }

    out.truncate(MAX_SUGGESTIONS);
    out
}
