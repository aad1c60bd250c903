//! Knowledge model: entities, mentions, relationships and FAQs, plus the
//! versioned store the extractor writes to and queries read from.

pub mod snapshot;
pub mod store;

pub use snapshot::{
    JsonFileSnapshotStore, KnowledgeSnapshot, SnapshotMetadata, SnapshotStore, SqliteSnapshotStore,
};
pub use store::{KnowledgeSet, KnowledgeStore};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fmt;

/// Kind of thing an entity names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    Satellite,
    Sensor,
    DataProduct,
    Location,
    Organization,
    Mission,
}

impl EntityType {
    pub const ALL: [EntityType; 6] = [
        EntityType::Satellite,
        EntityType::Sensor,
        EntityType::DataProduct,
        EntityType::Location,
        EntityType::Organization,
        EntityType::Mission,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EntityType::Satellite => "satellite",
            EntityType::Sensor => "sensor",
            EntityType::DataProduct => "data_product",
            EntityType::Location => "location",
            EntityType::Organization => "organization",
            EntityType::Mission => "mission",
        }
    }

    /// Human-readable plural, used in response text.
    pub fn plural_label(&self) -> &'static str {
        match self {
            EntityType::Satellite => "satellites",
            EntityType::Sensor => "sensors",
            EntityType::DataProduct => "data products",
            EntityType::Location => "locations",
            EntityType::Organization => "organizations",
            EntityType::Mission => "missions",
        }
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for EntityType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        EntityType::ALL
            .iter()
            .copied()
            .find(|t| t.as_str() == s.trim().to_lowercase())
            .ok_or_else(|| format!("unknown entity type: {}", s))
    }
}

/// Scalar attribute value attached to an entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum AttributeValue {
    Text(String),
    Number(f64),
    Date(NaiveDate),
    Bool(bool),
}

impl AttributeValue {
    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            AttributeValue::Date(d) => Some(*d),
            _ => None,
        }
    }
}

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttributeValue::Text(s) => f.write_str(s),
            AttributeValue::Number(n) => write!(f, "{}", n),
            AttributeValue::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            AttributeValue::Bool(b) => write!(f, "{}", b),
        }
    }
}

/// One occurrence of an entity in one source document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityMention {
    /// Matched surface form.
    pub text: String,
    /// Window of source text around the first occurrence of `text`.
    pub context: String,
    pub confidence: f32,
    pub source_identifier: String,
}

/// A named, typed thing recognised in source text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub id: String,
    #[serde(rename = "type")]
    pub entity_type: EntityType,
    pub name: String,
    /// Mean of all mention confidences.
    pub confidence: f32,
    #[serde(default)]
    pub attributes: BTreeMap<String, AttributeValue>,
    #[serde(default)]
    pub source_documents: Vec<String>,
    #[serde(default)]
    pub mentions: Vec<EntityMention>,
}

impl Entity {
    /// Create an entity with no mentions yet.
    pub fn new(name: &str, entity_type: EntityType) -> Self {
        Self {
            id: entity_id(name),
            entity_type,
            name: name.trim().to_string(),
            confidence: 0.0,
            attributes: BTreeMap::new(),
            source_documents: Vec::new(),
            mentions: Vec::new(),
        }
    }

    /// Case-insensitive key entities are unique by.
    pub fn normalized_name(&self) -> String {
        normalize_name(&self.name)
    }

    /// Append a mention, recompute the mean confidence and record its source.
    pub fn add_mention(&mut self, mention: EntityMention) {
        if !self.source_documents.contains(&mention.source_identifier) {
            self.source_documents.push(mention.source_identifier.clone());
        }
        self.mentions.push(mention);
        let total: f32 = self.mentions.iter().map(|m| m.confidence).sum();
        self.confidence = total / self.mentions.len() as f32;
    }

    pub fn attribute(&self, key: &str) -> Option<&AttributeValue> {
        self.attributes.get(key)
    }

    /// Attribute rendered as text, if present.
    pub fn attribute_text(&self, key: &str) -> Option<String> {
        self.attributes.get(key).map(|v| v.to_string())
    }
}

/// A typed, evidenced, directed link between two entities.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Relationship {
    pub id: String,
    pub source_entity_id: String,
    pub target_entity_id: String,
    #[serde(rename = "type")]
    pub relationship_type: String,
    pub confidence: f32,
    #[serde(default)]
    pub evidence: Vec<String>,
    #[serde(default)]
    pub source_identifiers: Vec<String>,
}

impl Relationship {
    pub fn new(
        source_entity_id: &str,
        target_entity_id: &str,
        relationship_type: &str,
        confidence: f32,
        evidence: Vec<String>,
        source_identifiers: Vec<String>,
    ) -> Self {
        Self {
            id: relationship_id(source_entity_id, target_entity_id, relationship_type),
            source_entity_id: source_entity_id.to_string(),
            target_entity_id: target_entity_id.to_string(),
            relationship_type: relationship_type.to_string(),
            confidence,
            evidence,
            source_identifiers,
        }
    }

    /// Merge a duplicate: union evidence and sources, keep the higher confidence.
    pub fn merge(&mut self, other: Relationship) {
        for e in other.evidence {
            if !self.evidence.contains(&e) {
                self.evidence.push(e);
            }
        }
        for s in other.source_identifiers {
            if !self.source_identifiers.contains(&s) {
                self.source_identifiers.push(s);
            }
        }
        self.confidence = self.confidence.max(other.confidence);
    }

    pub fn key(&self) -> (String, String, String) {
        (
            self.source_entity_id.clone(),
            self.target_entity_id.clone(),
            self.relationship_type.clone(),
        )
    }
}

/// Curated question/answer pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FaqItem {
    #[serde(default)]
    pub id: String,
    pub question: String,
    pub answer: String,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub source: Option<String>,
}

impl FaqItem {
    pub fn new(question: &str, answer: &str) -> Self {
        Self {
            id: faq_id(question),
            question: question.to_string(),
            answer: answer.to_string(),
            category: None,
            keywords: Vec::new(),
            source: None,
        }
    }
}

/// Lowercase, trim and collapse internal whitespace.
pub fn normalize_name(name: &str) -> String {
    name.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

fn short_hash(input: &str) -> String {
    let hash = Sha256::digest(input.as_bytes());
    format!("{:x}", hash)[..16].to_string()
}

/// Stable, content-derived entity id.
pub fn entity_id(name: &str) -> String {
    format!("ent_{}", short_hash(&normalize_name(name)))
}

/// Stable relationship id derived from its uniqueness key.
pub fn relationship_id(source: &str, target: &str, relationship_type: &str) -> String {
    format!("rel_{}", short_hash(&format!("{}|{}|{}", source, target, relationship_type)))
}

pub fn faq_id(question: &str) -> String {
    format!("faq_{}", short_hash(&normalize_name(question)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mention(conf: f32, source: &str) -> EntityMention {
        EntityMention {
            text: "INSAT-3D".to_string(),
            context: String::new(),
            confidence: conf,
            source_identifier: source.to_string(),
        }
    }

    #[test]
    fn test_entity_id_is_case_insensitive() {
        assert_eq!(entity_id("INSAT-3D"), entity_id("insat-3d"));
        assert_eq!(entity_id("Ocean  Colour Monitor"), entity_id("ocean colour monitor"));
        assert_ne!(entity_id("INSAT-3D"), entity_id("INSAT-3DR"));
        assert!(entity_id("x").starts_with("ent_"));
    }

    #[test]
    fn test_confidence_is_mean_of_mentions() {
        let mut entity = Entity::new("INSAT-3D", EntityType::Satellite);
        entity.add_mention(mention(0.9, "a"));
        entity.add_mention(mention(0.9, "a"));
        entity.add_mention(mention(0.7, "b"));
        assert!((entity.confidence - (0.9 + 0.9 + 0.7) / 3.0).abs() < 1e-5);
        assert_eq!(entity.source_documents, vec!["a".to_string(), "b".to_string()]);
        assert_eq!(entity.mentions.len(), 3);
    }

    #[test]
    fn test_relationship_merge_keeps_max_confidence() {
        let mut rel = Relationship::new("a", "b", "carries", 0.6, vec!["x".into()], vec!["s1".into()]);
        let dup = Relationship::new("a", "b", "carries", 0.8, vec!["y".into(), "x".into()], vec!["s2".into()]);
        assert_eq!(rel.id, dup.id);
        rel.merge(dup);
        assert!((rel.confidence - 0.8).abs() < 1e-6);
        assert_eq!(rel.evidence, vec!["x".to_string(), "y".to_string()]);
        assert_eq!(rel.source_identifiers.len(), 2);
    }

    #[test]
    fn test_attribute_value_serialization_is_tagged() {
        let date = AttributeValue::Date(NaiveDate::from_ymd_opt(2024, 3, 1).unwrap());
        let json = serde_json::to_value(&date).unwrap();
        assert_eq!(json["type"], "date");
        assert_eq!(json["value"], "2024-03-01");
        let back: AttributeValue = serde_json::from_value(json).unwrap();
        assert_eq!(back, date);
    }

    #[test]
    fn test_entity_type_parse() {
        assert_eq!("data_product".parse::<EntityType>().unwrap(), EntityType::DataProduct);
        assert!("planet".parse::<EntityType>().is_err());
    }
}
