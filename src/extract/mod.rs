//! Pattern-driven entity, relationship and attribute extraction.
//!
//! Extraction runs in two steps. [`Extractor::extract`] is pure: it scans a
//! document sentence by sentence and returns the candidate mentions, attribute
//! values and relation phrases it found. [`Extractor::merge`] then folds those
//! candidates into a [`KnowledgeSet`], resolving relation phrases against the
//! entities known at that point. [`Extractor::process`] runs both with the merge
//! inside a single store write.

pub mod patterns;

pub use patterns::{PatternTable, PatternTableSpec};

use std::collections::BTreeMap;

use serde::Serialize;

use crate::config::ExtractionConfig;
use crate::error::Result;
use crate::knowledge::{
    normalize_name, AttributeValue, Entity, EntityMention, EntityType, KnowledgeSet,
    KnowledgeStore, Relationship,
};
use crate::text::{mention_context, sentences};

/// A mention found in a document, not yet merged.
#[derive(Debug, Clone)]
pub struct PendingMention {
    /// Canonical entity name the mention resolves to.
    pub name: String,
    pub entity_type: EntityType,
    pub mention: EntityMention,
    pub attributes: BTreeMap<String, AttributeValue>,
}

/// Attribute value captured by a sentence-level rule.
#[derive(Debug, Clone)]
pub struct PendingAttribute {
    pub entity_name: String,
    pub key: String,
    pub value: AttributeValue,
}

/// `<source-phrase> <verb> <target-phrase>` match awaiting resolution.
#[derive(Debug, Clone)]
pub struct RelationCandidate {
    pub source_phrase: String,
    pub target_phrase: String,
    pub predicate: String,
    pub confidence: f32,
    pub evidence: String,
}

/// Everything found in one document.
#[derive(Debug, Clone, Default)]
pub struct DocumentExtraction {
    pub source_id: String,
    pub mentions: Vec<PendingMention>,
    pub attributes: Vec<PendingAttribute>,
    pub relations: Vec<RelationCandidate>,
}

/// Counts reported after merging one document.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ExtractionReport {
    pub mentions: usize,
    pub new_entities: usize,
    pub attributes: usize,
    pub relationships: usize,
    pub unresolved_relations: usize,
}

pub struct Extractor {
    patterns: PatternTable,
    context_radius: usize,
}

impl Default for Extractor {
    fn default() -> Self {
        Self::new(PatternTable::builtin(), 100)
    }
}

impl Extractor {
    pub fn new(patterns: PatternTable, context_radius: usize) -> Self {
        Self {
            patterns,
            context_radius,
        }
    }

    /// Built-in patterns unless `patterns_path` names a pattern table file.
    pub fn from_config(config: &ExtractionConfig) -> Result<Self> {
        let patterns = match &config.patterns_path {
            Some(path) => PatternTable::from_path(path)?,
            None => PatternTable::builtin(),
        };
        Ok(Self::new(patterns, config.context_radius))
    }

    pub fn patterns(&self) -> &PatternTable {
        &self.patterns
    }

    /// Extract a document and merge it into the store atomically.
    pub fn process(&self, store: &KnowledgeStore, text: &str, source_id: &str) -> ExtractionReport {
        let start = std::time::Instant::now();
        let extraction = self.extract(text, source_id);
        let report = store.write(|set| Self::merge(set, extraction));
        log::debug!(
            "Processed {}: {} mentions ({} new entities), {} relationships, {} unresolved in {:?}",
            source_id,
            report.mentions,
            report.new_entities,
            report.relationships,
            report.unresolved_relations,
            start.elapsed()
        );
        report
    }

    /// Scan `text` for mentions, attribute values and relation phrases.
    pub fn extract(&self, text: &str, source_id: &str) -> DocumentExtraction {
        let mut out = DocumentExtraction {
            source_id: source_id.to_string(),
            ..Default::default()
        };

        for sentence in sentences(text) {
            let mut sentence_entities: Vec<(usize, String, EntityType)> = Vec::new();

            for pattern in &self.patterns.entities {
                for caps in pattern.regex.captures_iter(sentence) {
                    let matched = match &pattern.spec.group {
                        Some(group) => caps.name(group),
                        None => caps.get(0),
                    };
                    let Some(matched) = matched else {
                        continue;
                    };
                    let surface = matched.as_str().trim();
                    if surface.is_empty()
                        || pattern
                            .spec
                            .exclude
                            .iter()
                            .any(|word| word.eq_ignore_ascii_case(surface))
                    {
                        continue;
                    }

                    let name = pattern
                        .spec
                        .canonical
                        .clone()
                        .unwrap_or_else(|| surface.to_string());
                    let attributes = pattern
                        .spec
                        .attributes
                        .iter()
                        .map(|(k, v)| (k.clone(), AttributeValue::Text(v.clone())))
                        .collect();

                    sentence_entities.push((matched.start(), name.clone(), pattern.spec.entity_type));
                    out.mentions.push(PendingMention {
                        name,
                        entity_type: pattern.spec.entity_type,
                        mention: EntityMention {
                            text: surface.to_string(),
                            context: mention_context(text, surface, self.context_radius),
                            confidence: pattern.spec.confidence,
                            source_identifier: source_id.to_string(),
                        },
                        attributes,
                    });
                }
            }

            // Attribute rules attach to the earliest matching entity in the sentence
            sentence_entities.sort_by_key(|(pos, _, _)| *pos);
            for rule in &self.patterns.attributes {
                for caps in rule.regex.captures_iter(sentence) {
                    let Some(raw) = caps.name("value") else {
                        continue;
                    };
                    let Some(value) = rule.parse_value(raw.as_str()) else {
                        log::debug!(
                            "Ignoring unparseable {} value {:?} in {}",
                            rule.spec.attribute,
                            raw.as_str(),
                            source_id
                        );
                        continue;
                    };
                    let owner = sentence_entities.iter().find(|(_, _, ty)| {
                        rule.spec.applies_to.map_or(*ty != EntityType::Location, |t| t == *ty)
                    });
                    if let Some((_, name, _)) = owner {
                        out.attributes.push(PendingAttribute {
                            entity_name: name.clone(),
                            key: rule.spec.attribute.clone(),
                            value,
                        });
                    }
                }
            }

            for rule in &self.patterns.relationships {
                for caps in rule.regex.captures_iter(sentence) {
                    let (Some(source), Some(target)) = (caps.name("source"), caps.name("target"))
                    else {
                        continue;
                    };
                    out.relations.push(RelationCandidate {
                        source_phrase: source.as_str().to_string(),
                        target_phrase: target.as_str().to_string(),
                        predicate: rule.spec.predicate.clone(),
                        confidence: rule.spec.confidence,
                        evidence: caps[0].trim().to_string(),
                    });
                }
            }
        }

        out
    }

    /// Fold one document's candidates into `set`.
    pub fn merge(set: &mut KnowledgeSet, extraction: DocumentExtraction) -> ExtractionReport {
        let mut report = ExtractionReport::default();

        for pending in extraction.mentions {
            let existed = set.entity_by_name(&pending.name).is_some();
            set.add_mention(
                &pending.name,
                pending.entity_type,
                pending.mention,
                pending.attributes,
            );
            report.mentions += 1;
            if !existed {
                report.new_entities += 1;
            }
        }

        for attribute in extraction.attributes {
            let Some(id) = set.entity_by_name(&attribute.entity_name).map(|e| e.id.clone()) else {
                continue;
            };
            if set.set_attribute(&id, &attribute.key, attribute.value) {
                report.attributes += 1;
            }
        }

        for candidate in extraction.relations {
            let source = resolve_phrase(set, &candidate.source_phrase).map(|e| e.id.clone());
            let target = resolve_phrase(set, &candidate.target_phrase).map(|e| e.id.clone());
            match (source, target) {
                (Some(source), Some(target)) if source != target => {
                    set.add_relationship(Relationship::new(
                        &source,
                        &target,
                        &candidate.predicate,
                        candidate.confidence,
                        vec![candidate.evidence],
                        vec![extraction.source_id.clone()],
                    ));
                    report.relationships += 1;
                }
                _ => {
                    log::trace!(
                        "Dropped {} relation {:?} -> {:?}",
                        candidate.predicate,
                        candidate.source_phrase,
                        candidate.target_phrase
                    );
                    report.unresolved_relations += 1;
                }
            }
        }

        report
    }
}

/// Canonical name plus every distinct surface form the entity was seen as.
fn surface_forms(entity: &Entity) -> Vec<String> {
    let mut forms = vec![entity.normalized_name()];
    for mention in &entity.mentions {
        let form = normalize_name(&mention.text);
        if !forms.contains(&form) {
            forms.push(form);
        }
    }
    forms
}

/// Resolve a free-text phrase to a known entity.
///
/// Exact name or surface form first, then the entity with the longest form
/// contained in the phrase, then the first entity whose name contains the
/// phrase.
pub fn resolve_phrase<'a>(set: &'a KnowledgeSet, phrase: &str) -> Option<&'a Entity> {
    let phrase = normalize_name(phrase);
    if phrase.is_empty() {
        return None;
    }
    if let Some(entity) = set.entity_by_name(&phrase) {
        return Some(entity);
    }

    let mut best: Option<(&Entity, usize)> = None;
    for entity in set.entities() {
        for form in surface_forms(entity) {
            if form == phrase {
                return Some(entity);
            }
            let len = form.chars().count();
            if len >= 2
                && phrase.contains(&form)
                && best.map_or(true, |(_, best_len)| len > best_len)
            {
                best = Some((entity, len));
            }
        }
    }
    if let Some((entity, _)) = best {
        return Some(entity);
    }

    if phrase.chars().count() < 3 {
        return None;
    }
    set.entities()
        .iter()
        .find(|e| e.normalized_name().contains(&phrase))
}

#[cfg(test)]
mod tests {
    use super::*;

    const WEATHER: &str = "INSAT-3D carries an Imager for weather monitoring.";

    fn processed(text: &str) -> KnowledgeStore {
        let store = KnowledgeStore::new();
        Extractor::default().process(&store, text, "doc-1");
        store
    }

    #[test]
    fn test_extracts_entities_and_carries_relationship() {
        let store = processed(WEATHER);
        let set = store.snapshot();

        let insat = set.entity_by_name("INSAT-3D").unwrap();
        let imager = set.entity_by_name("imager").unwrap();
        assert_eq!(insat.entity_type, EntityType::Satellite);
        assert_eq!(imager.entity_type, EntityType::Sensor);
        assert_eq!(insat.source_documents, vec!["doc-1".to_string()]);
        assert_eq!(imager.mentions[0].context, WEATHER);

        assert_eq!(set.relationships().len(), 1);
        let rel = &set.relationships()[0];
        assert_eq!(rel.source_entity_id, insat.id);
        assert_eq!(rel.target_entity_id, imager.id);
        assert_eq!(rel.relationship_type, "carries");
        assert_eq!(rel.evidence, vec!["INSAT-3D carries an Imager for weather".to_string()]);
    }

    #[test]
    fn test_reprocessing_is_idempotent_except_mentions() {
        let store = KnowledgeStore::new();
        let extractor = Extractor::default();
        extractor.process(&store, WEATHER, "doc-1");
        let once = store.snapshot();
        extractor.process(&store, WEATHER, "doc-1");
        let twice = store.snapshot();

        assert_eq!(once.entities().len(), twice.entities().len());
        assert_eq!(once.relationships().len(), twice.relationships().len());
        for (a, b) in once.entities().iter().zip(twice.entities()) {
            assert_eq!(a.id, b.id);
            assert!((a.confidence - b.confidence).abs() < 1e-6);
            assert_eq!(b.mentions.len(), a.mentions.len() * 2);
            assert_eq!(a.source_documents, b.source_documents);
        }
        assert_eq!(twice.relationships()[0].evidence.len(), 1);
    }

    #[test]
    fn test_unresolved_relation_is_dropped() {
        let store = KnowledgeStore::new();
        let report = Extractor::default().process(
            &store,
            "The ground station provides daily bulletins.",
            "doc-2",
        );
        assert_eq!(report.relationships, 0);
        assert_eq!(report.unresolved_relations, 1);
        assert!(store.snapshot().relationships().is_empty());
    }

    #[test]
    fn test_zero_matches_is_not_an_error() {
        let store = processed("nothing of interest here");
        assert_eq!(store.snapshot().entities().len(), 0);
    }

    #[test]
    fn test_canonical_names_and_static_attributes() {
        let store = processed(
            "OCEANSAT-2 carries the Ocean Colour Monitor. SST maps of the Arabian Sea are updated daily.",
        );
        let set = store.snapshot();
        let ocm = set.entity_by_name("OCM").unwrap();
        assert_eq!(ocm.entity_type, EntityType::Sensor);
        assert_eq!(ocm.mentions[0].text, "Ocean Colour Monitor");

        let sst = set.entity_by_name("SST").unwrap();
        assert_eq!(
            sst.attribute("product_type"),
            Some(&AttributeValue::Text("Sea Surface Temperature".into()))
        );

        let oceansat = set.entity_by_name("OCEANSAT-2").unwrap();
        assert!(set
            .relationships()
            .iter()
            .any(|r| r.source_entity_id == oceansat.id && r.target_entity_id == ocm.id));
    }

    #[test]
    fn test_sentence_attribute_rules() {
        let store = processed(
            "INSAT-3DR was launched in 2016. The Imager has a resolution of 1 km. \
             SST scenes acquired on 2024-06-01 show coverage over Indian Ocean.",
        );
        let set = store.snapshot();
        let sat = set.entity_by_name("INSAT-3DR").unwrap();
        assert_eq!(sat.attribute("launch_year"), Some(&AttributeValue::Number(2016.0)));
        let imager = set.entity_by_name("Imager").unwrap();
        assert_eq!(imager.attribute_text("resolution").as_deref(), Some("1 km"));
        let sst = set.entity_by_name("SST").unwrap();
        assert_eq!(
            sst.attribute("acquisition_date").and_then(|v| v.as_date()),
            chrono::NaiveDate::from_ymd_opt(2024, 6, 1)
        );
        assert_eq!(sst.attribute_text("coverage").as_deref(), Some("Indian Ocean"));
    }

    #[test]
    fn test_place_detector_skips_months() {
        let store = processed("Heavy rainfall was observed over Kerala in July.");
        let set = store.snapshot();
        assert_eq!(set.entity_by_name("Kerala").unwrap().entity_type, EntityType::Location);
        assert!(set.entity_by_name("July").is_none());
    }

    #[test]
    fn test_resolve_phrase_prefers_longest_contained_name() {
        let store = processed("INSAT-3D and INSAT-3DR are in service. The Imager works.");
        let set = store.snapshot();
        assert_eq!(resolve_phrase(&set, "the INSAT-3DR imager").unwrap().name, "INSAT-3DR");
        assert_eq!(resolve_phrase(&set, "imag").unwrap().name, "Imager");
        assert!(resolve_phrase(&set, "xy").is_none());
    }

    #[test]
    fn test_resolve_phrase_matches_inside_longer_words() {
        let store = processed("INSAT-3D carries an Imager for weather monitoring.");
        let set = store.snapshot();
        assert_eq!(resolve_phrase(&set, "two Imagers").unwrap().name, "Imager");
        assert_eq!(resolve_phrase(&set, "the INSAT-3D's payload").unwrap().name, "INSAT-3D");
    }
}
