//! Rule-based intent classification.
//!
//! Independent passes each record [`IntentSignal`]s and add to a running score.
//! The primary type is then chosen by priority: relationship, temporal
//! (combined with geospatial when both fired), geospatial, comparison, filter,
//! and finally plain search.

use chrono::{Days, Local, Months, NaiveDate};
use regex::Regex;

use super::{IntentSignal, IntentType, QueryIntent, SignalKind, SpatialScope, Timeframe};
use crate::gazetteer::Gazetteer;
use crate::knowledge::Entity;
use crate::text::tokenize;

const GEOSPATIAL_WEIGHT: f32 = 0.4;
const LOCATION_WEIGHT: f32 = 0.4;
const TEMPORAL_WEIGHT: f32 = 0.3;
const RELATIONSHIP_WEIGHT: f32 = 0.3;
const DATA_TYPE_WEIGHT: f32 = 0.3;
const ENTITY_WEIGHT: f32 = 0.2;

fn rx(pattern: &str) -> Regex {
    Regex::new(pattern).expect("built-in intent pattern must compile")
}

pub struct IntentParser {
    gazetteer: Gazetteer,
    place_phrase: Regex,
    recency: Regex,
    past_period: Regex,
    year_range: Regex,
    year: Regex,
    comparison: Regex,
    filter: Regex,
    relation_verbs: Vec<(&'static str, Regex)>,
    data_types: Vec<(&'static str, Regex)>,
}

impl Default for IntentParser {
    fn default() -> Self {
        Self::new(Gazetteer::default())
    }
}

impl IntentParser {
    pub fn new(gazetteer: Gazetteer) -> Self {
        Self {
            gazetteer,
            place_phrase: rx(
                r"\b(?:in|over|near|around|for|across|covering|within|at|of)\s+(?P<place>[a-z]+(?:\s+[a-z]+)?)",
            ),
            recency: rx(r"\b(?:recent|recently|latest|newest|current|currently|today|now|this\s+(?:week|month))\b"),
            past_period: rx(r"\b(?:past|last)\s+(?P<n>\d+)\s+(?P<unit>years?|months?|days?)\b"),
            year_range: rx(r"\b(?P<from>(?:19|20)\d{2})\s*(?:-|to|and|until)\s*(?P<to>(?:19|20)\d{2})\b"),
            year: rx(r"\b(?P<y>(?:19|20)\d{2})\b"),
            comparison: rx(r"\b(?:compare|comparison|versus|vs\.?|difference\s+between|better\s+than)\b"),
            filter: rx(r"\b(?:only|filter(?:ed)?|limit(?:ed)?\s+to|excluding|except)\b"),
            relation_verbs: vec![
                ("carries", rx(r"\b(?:carry|carries|carried|carrying|onboard|on\s+board|equipped)\b")),
                ("provides", rx(r"\b(?:provide|provides|provided|providing|generates?|produces?)\b")),
                ("used_for", rx(r"\bused\s+for\b|\buses?\s+of\b")),
            ],
            data_types: vec![
                ("imagery", rx(r"\b(?:imagery|images?|scenes?)\b")),
                ("dataset", rx(r"\bdata\s*sets?\b")),
                ("dem", rx(r"\b(?:dem|digital\s+elevation|elevation|terrain)\b")),
                ("lulc", rx(r"\b(?:lulc|land\s+use|land\s+cover)\b")),
                ("ndvi", rx(r"\b(?:ndvi|vegetation)\b")),
                ("sst", rx(r"\b(?:sst|sea\s+surface\s+temperature)\b")),
                ("rainfall", rx(r"\b(?:rain|rainfall|precipitation)\b")),
                ("wind", rx(r"\b(?:winds?|cyclones?)\b")),
                ("chlorophyll", rx(r"\b(?:chlorophyll|ocean\s+colou?r)\b")),
                ("cloud", rx(r"\bclouds?\b")),
                ("soil moisture", rx(r"\bsoil\s+moisture\b")),
                ("aod", rx(r"\b(?:aod|aerosols?)\b")),
            ],
        }
    }

    pub fn gazetteer(&self) -> &Gazetteer {
        &self.gazetteer
    }

    /// Classify `query` relative to today's date.
    pub fn parse(&self, query: &str, known_entities: &[Entity]) -> QueryIntent {
        self.parse_at(query, known_entities, Local::now().date_naive())
    }

    /// Classify `query`; relative timeframes are resolved against `today`.
    pub fn parse_at(&self, query: &str, known_entities: &[Entity], today: NaiveDate) -> QueryIntent {
        let lowered = query.to_lowercase();
        let mut intent = QueryIntent::default();
        let mut score = 0.0f32;

        score += self.geospatial_pass(&lowered, &mut intent);
        score += self.resolve_locations(&lowered, &mut intent);
        score += self.temporal_pass(&lowered, today, &mut intent);
        score += self.relationship_pass(&lowered, &mut intent);
        score += self.data_type_pass(&lowered, &mut intent);
        score += self.entity_pass(&lowered, known_entities, &mut intent);

        if self.comparison.is_match(&lowered) {
            signal(&mut intent, SignalKind::Comparison, "comparison", 0.0);
        }
        if self.filter.is_match(&lowered) {
            signal(&mut intent, SignalKind::Filter, "filter", 0.0);
        }

        intent.intent_type = select_type(&intent);
        intent.confidence = score.min(1.0);
        log::debug!(
            "Intent {} ({:.2}) for {:?}: {} signals",
            intent.intent_type,
            intent.confidence,
            query,
            intent.signals.len()
        );
        intent
    }

    /// Verb-phrase followed by a place the gazetteer knows.
    fn geospatial_pass(&self, lowered: &str, intent: &mut QueryIntent) -> f32 {
        for caps in self.place_phrase.captures_iter(lowered) {
            let place = &caps["place"];
            let first_word = place.split_whitespace().next().unwrap_or(place);
            let hit = self
                .gazetteer
                .resolve(place)
                .or_else(|| self.gazetteer.resolve(first_word));
            if let Some(location) = hit {
                signal(intent, SignalKind::Geospatial, &caps[0], GEOSPATIAL_WEIGHT);
                log::trace!("Geospatial phrase resolved to {}", location.canonical_name);
                return GEOSPATIAL_WEIGHT;
            }
        }
        0.0
    }

    /// Every n-gram of the query the gazetteer resolves adds a location.
    fn resolve_locations(&self, lowered: &str, intent: &mut QueryIntent) -> f32 {
        let tokens = tokenize(lowered);
        let mut score = 0.0;
        for start in 0..tokens.len() {
            for len in 1..=self.gazetteer.max_words() {
                if start + len > tokens.len() {
                    break;
                }
                let phrase = tokens[start..start + len].join(" ");
                let Some(location) = self.gazetteer.resolve(&phrase) else {
                    continue;
                };
                if intent.locations.contains(&location.canonical_name) {
                    continue;
                }
                intent.locations.push(location.canonical_name.clone());
                intent.spatial_scope = Some(SpatialScope::from(location));
                signal(intent, SignalKind::Location, &location.canonical_name, LOCATION_WEIGHT);
                score += LOCATION_WEIGHT;
            }
        }
        score
    }

    fn temporal_pass(&self, lowered: &str, today: NaiveDate, intent: &mut QueryIntent) -> f32 {
        let timeframe = if let Some(caps) = self.past_period.captures(lowered) {
            let n: u32 = caps["n"].parse().unwrap_or(1);
            let unit = &caps["unit"];
            let start = if unit.starts_with("year") {
                today.checked_sub_months(Months::new(n.saturating_mul(12)))
            } else if unit.starts_with("month") {
                today.checked_sub_months(Months::new(n))
            } else {
                today.checked_sub_days(Days::new(u64::from(n)))
            };
            start.map(|start| Timeframe::Range { start, end: today })
        } else if let Some(caps) = self.year_range.captures(lowered) {
            year_span(&caps["from"], &caps["to"])
        } else if let Some(caps) = self.year.captures(lowered) {
            year_span(&caps["y"], &caps["y"])
        } else if self.recency.is_match(lowered) {
            Some(Timeframe::Recent)
        } else {
            None
        };

        match timeframe {
            Some(timeframe) => {
                let detail = match &timeframe {
                    Timeframe::Recent => "recent".to_string(),
                    Timeframe::Range { start, end } => format!("{}..{}", start, end),
                };
                signal(intent, SignalKind::Temporal, &detail, TEMPORAL_WEIGHT);
                intent.timeframe = Some(timeframe);
                TEMPORAL_WEIGHT
            }
            None => 0.0,
        }
    }

    fn relationship_pass(&self, lowered: &str, intent: &mut QueryIntent) -> f32 {
        for (verb, pattern) in &self.relation_verbs {
            if pattern.is_match(lowered) {
                intent.relationship_verbs.push(verb.to_string());
            }
        }
        if intent.relationship_verbs.is_empty() {
            return 0.0;
        }
        let detail = intent.relationship_verbs.join(",");
        signal(intent, SignalKind::Relationship, &detail, RELATIONSHIP_WEIGHT);
        RELATIONSHIP_WEIGHT
    }

    fn data_type_pass(&self, lowered: &str, intent: &mut QueryIntent) -> f32 {
        let mut score = 0.0;
        for (name, pattern) in &self.data_types {
            if pattern.is_match(lowered) {
                intent.data_types.push(name.to_string());
                signal(intent, SignalKind::DataType, name, DATA_TYPE_WEIGHT);
                score += DATA_TYPE_WEIGHT;
            }
        }
        score
    }

    fn entity_pass(&self, lowered: &str, known: &[Entity], intent: &mut QueryIntent) -> f32 {
        let words: Vec<String> = tokenize(lowered)
            .into_iter()
            .filter(|w| w.chars().count() > 2)
            .collect();

        for entity in known {
            let name = entity.name.to_lowercase();
            let referenced = lowered.contains(&name)
                || words
                    .iter()
                    .any(|w| name.contains(w.as_str()) || w.contains(name.as_str()));
            if referenced && !intent.entities.contains(&entity.name) {
                intent.entities.push(entity.name.clone());
            }
        }
        let matched = intent.entities.len();
        if matched > 0 {
            let detail = intent.entities.join(",");
            signal(intent, SignalKind::Entity, &detail, ENTITY_WEIGHT * matched.min(3) as f32);
        }
        ENTITY_WEIGHT * matched.min(3) as f32
    }
}

fn signal(intent: &mut QueryIntent, kind: SignalKind, detail: &str, weight: f32) {
    intent.signals.push(IntentSignal {
        kind,
        detail: detail.to_string(),
        weight,
    });
}

fn year_span(from: &str, to: &str) -> Option<Timeframe> {
    let from: i32 = from.parse().ok()?;
    let to: i32 = to.parse().ok()?;
    let (from, to) = if from <= to { (from, to) } else { (to, from) };
    Some(Timeframe::Range {
        start: NaiveDate::from_ymd_opt(from, 1, 1)?,
        end: NaiveDate::from_ymd_opt(to, 12, 31)?,
    })
}

fn select_type(intent: &QueryIntent) -> IntentType {
    if intent.fired(SignalKind::Relationship) {
        IntentType::Relationship
    } else if intent.fired(SignalKind::Temporal) {
        if intent.fired(SignalKind::Geospatial) {
            IntentType::TemporalGeospatial
        } else {
            IntentType::Temporal
        }
    } else if intent.fired(SignalKind::Geospatial) {
        IntentType::Geospatial
    } else if intent.fired(SignalKind::Comparison) {
        IntentType::Comparison
    } else if intent.fired(SignalKind::Filter) {
        IntentType::Filter
    } else {
        IntentType::Search
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intent::ScopeKind;
    use crate::knowledge::EntityType;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 15).unwrap()
    }

    fn known() -> Vec<Entity> {
        vec![
            Entity::new("INSAT-3D", EntityType::Satellite),
            Entity::new("Imager", EntityType::Sensor),
            Entity::new("DEM", EntityType::DataProduct),
        ]
    }

    #[test]
    fn test_dem_for_kerala() {
        let parser = IntentParser::default();
        let intent = parser.parse_at("Show me DEM data for Kerala", &known(), today());
        assert!(intent.intent_type.is_geospatial());
        assert_eq!(intent.locations, vec!["Kerala".to_string()]);
        assert!(intent.data_types.contains(&"dem".to_string()));
        assert!(intent.confidence >= 0.7);
        assert_eq!(intent.spatial_scope.as_ref().unwrap().kind, ScopeKind::Region);
        assert_eq!(intent.entities, vec!["DEM".to_string()]);
    }

    #[test]
    fn test_relationship_overrides_other_signals() {
        let parser = IntentParser::default();
        let intent = parser.parse_at("What sensors does INSAT-3D carry?", &known(), today());
        assert_eq!(intent.intent_type, IntentType::Relationship);
        assert_eq!(intent.relationship_verbs, vec!["carries".to_string()]);
        assert_eq!(intent.entities, vec!["INSAT-3D".to_string()]);
        assert!((intent.confidence - 0.5).abs() < 1e-6);

        let intent = parser.parse_at("Which satellites provide rainfall over Mumbai?", &[], today());
        assert_eq!(intent.intent_type, IntentType::Relationship);
        assert!(intent.fired(SignalKind::Geospatial));
        assert_eq!(intent.spatial_scope.unwrap().kind, ScopeKind::Point);
    }

    #[test]
    fn test_common_words_still_reference_entities() {
        let parser = IntentParser::default();
        let known = vec![Entity::new("Data Centre", EntityType::Organization)];
        let intent = parser.parse_at("show data", &known, today());
        assert_eq!(intent.entities, vec!["Data Centre".to_string()]);
        assert!((intent.confidence - 0.2).abs() < 1e-6);
    }

    #[test]
    fn test_temporal_and_hybrid() {
        let parser = IntentParser::default();
        let intent = parser.parse_at("latest cloud imagery", &[], today());
        assert_eq!(intent.intent_type, IntentType::Temporal);
        assert_eq!(intent.timeframe, Some(Timeframe::Recent));

        let intent = parser.parse_at("recent rainfall in Chennai", &[], today());
        assert_eq!(intent.intent_type, IntentType::TemporalGeospatial);
        assert!(intent.intent_type.is_temporal() && intent.intent_type.is_geospatial());
    }

    #[test]
    fn test_explicit_ranges() {
        let parser = IntentParser::default();
        let intent = parser.parse_at("SST between 2015 and 2018", &[], today());
        assert_eq!(
            intent.timeframe,
            Some(Timeframe::Range {
                start: NaiveDate::from_ymd_opt(2015, 1, 1).unwrap(),
                end: NaiveDate::from_ymd_opt(2018, 12, 31).unwrap(),
            })
        );

        let intent = parser.parse_at("rainfall for the past 2 years", &[], today());
        assert_eq!(
            intent.timeframe,
            Some(Timeframe::Range {
                start: NaiveDate::from_ymd_opt(2022, 6, 15).unwrap(),
                end: today(),
            })
        );
    }

    #[test]
    fn test_multiple_locations_accumulate() {
        let parser = IntentParser::default();
        let intent = parser.parse_at("compare Bombay and Calcutta", &[], today());
        assert_eq!(intent.locations, vec!["Mumbai".to_string(), "Kolkata".to_string()]);
        assert_eq!(intent.spatial_scope.unwrap().name, "Kolkata");
        assert_eq!(intent.intent_type, IntentType::Comparison);
        assert!((intent.confidence - 0.8).abs() < 1e-6);
    }

    #[test]
    fn test_plain_search() {
        let parser = IntentParser::default();
        let intent = parser.parse_at("tell me something", &[], today());
        assert_eq!(intent.intent_type, IntentType::Search);
        assert_eq!(intent.confidence, 0.0);
        assert!(intent.signals.is_empty());
    }
}
