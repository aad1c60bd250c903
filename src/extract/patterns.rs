//! Extraction pattern tables.
//!
//! Tables are plain records (`{pattern, entity_type}`, `{pattern, predicate}`,
//! `{pattern, attribute}`) so they can be loaded from TOML/YAML/JSON and
//! extended without touching the extraction code. `PatternTable::builtin()`
//! carries the satellite/sensor/product vocabulary of the archive.

use std::collections::BTreeMap;
use std::path::Path;

use chrono::NaiveDate;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{AssistError, Result};
use crate::knowledge::{AttributeValue, EntityType};

fn default_entity_confidence() -> f32 {
    0.8
}

fn default_relation_confidence() -> f32 {
    0.75
}

/// Typed entity pattern record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityPatternSpec {
    pub pattern: String,
    pub entity_type: EntityType,
    #[serde(default = "default_entity_confidence")]
    pub confidence: f32,
    /// Named capture group holding the entity text; whole match when absent.
    #[serde(default)]
    pub group: Option<String>,
    /// Display name used instead of the matched surface form.
    #[serde(default)]
    pub canonical: Option<String>,
    /// Static attributes attached to every match.
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
    /// Lowercase matches to discard.
    #[serde(default)]
    pub exclude: Vec<String>,
}

/// `<source-phrase> <verb-phrase> <target-phrase>` rule. The regex must define
/// `source` and `target` named groups.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelationPatternSpec {
    pub pattern: String,
    pub predicate: String,
    #[serde(default = "default_relation_confidence")]
    pub confidence: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttributeKind {
    Text,
    Number,
    Date,
    Bool,
}

/// Sentence-level attribute rule. The regex must define a `value` group; the
/// value attaches to the first entity (of `applies_to`, when given) mentioned
/// in the same sentence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttributeRuleSpec {
    pub pattern: String,
    pub attribute: String,
    pub kind: AttributeKind,
    #[serde(default)]
    pub applies_to: Option<EntityType>,
}

/// Serializable form of a full pattern table.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PatternTableSpec {
    #[serde(default)]
    pub entities: Vec<EntityPatternSpec>,
    #[serde(default)]
    pub relationships: Vec<RelationPatternSpec>,
    #[serde(default)]
    pub attributes: Vec<AttributeRuleSpec>,
}

#[derive(Debug, Clone)]
pub struct EntityPattern {
    pub regex: Regex,
    pub spec: EntityPatternSpec,
}

#[derive(Debug, Clone)]
pub struct RelationPattern {
    pub regex: Regex,
    pub spec: RelationPatternSpec,
}

#[derive(Debug, Clone)]
pub struct AttributeRule {
    pub regex: Regex,
    pub spec: AttributeRuleSpec,
}

impl AttributeRule {
    /// Convert a captured string into a typed value.
    pub fn parse_value(&self, raw: &str) -> Option<AttributeValue> {
        let raw = raw.trim();
        match self.spec.kind {
            AttributeKind::Text => Some(AttributeValue::Text(raw.to_string())),
            AttributeKind::Number => raw.parse::<f64>().ok().map(AttributeValue::Number),
            AttributeKind::Date => NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .ok()
                .map(AttributeValue::Date),
            AttributeKind::Bool => match raw.to_lowercase().as_str() {
                "true" | "yes" => Some(AttributeValue::Bool(true)),
                "false" | "no" => Some(AttributeValue::Bool(false)),
                _ => None,
            },
        }
    }
}

/// Compiled, ordered pattern table.
#[derive(Debug, Clone)]
pub struct PatternTable {
    pub entities: Vec<EntityPattern>,
    pub relationships: Vec<RelationPattern>,
    pub attributes: Vec<AttributeRule>,
}

fn compile(pattern: &str) -> Result<Regex> {
    Regex::new(pattern).map_err(|e| AssistError::Pattern(format!("{}: {}", pattern, e)))
}

impl PatternTable {
    /// Compile and validate a table spec.
    pub fn compile(spec: PatternTableSpec) -> Result<Self> {
        let mut entities = Vec::with_capacity(spec.entities.len());
        for p in spec.entities {
            let regex = compile(&p.pattern)?;
            if let Some(group) = &p.group {
                if !regex.capture_names().flatten().any(|n| n == group) {
                    return Err(AssistError::Pattern(format!(
                        "entity pattern {} has no group named {}",
                        p.pattern, group
                    )));
                }
            }
            if !(0.0..=1.0).contains(&p.confidence) {
                return Err(AssistError::Pattern(format!(
                    "entity pattern {} confidence {} outside [0, 1]",
                    p.pattern, p.confidence
                )));
            }
            entities.push(EntityPattern { regex, spec: p });
        }

        let mut relationships = Vec::with_capacity(spec.relationships.len());
        for p in spec.relationships {
            let regex = compile(&p.pattern)?;
            let names: Vec<&str> = regex.capture_names().flatten().collect();
            if !names.contains(&"source") || !names.contains(&"target") {
                return Err(AssistError::Pattern(format!(
                    "relationship pattern for {} needs `source` and `target` groups",
                    p.predicate
                )));
            }
            relationships.push(RelationPattern { regex, spec: p });
        }

        let mut attributes = Vec::with_capacity(spec.attributes.len());
        for p in spec.attributes {
            let regex = compile(&p.pattern)?;
            if !regex.capture_names().flatten().any(|n| n == "value") {
                return Err(AssistError::Pattern(format!(
                    "attribute rule for {} needs a `value` group",
                    p.attribute
                )));
            }
            attributes.push(AttributeRule { regex, spec: p });
        }

        Ok(Self {
            entities,
            relationships,
            attributes,
        })
    }

    /// Load a table from `.toml`, `.yaml`/`.yml` or `.json`.
    pub fn from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_lowercase();
        let spec: PatternTableSpec = match extension.as_str() {
            "toml" => toml::from_str(&content)
                .map_err(|e| AssistError::Pattern(format!("{}: {}", path.display(), e)))?,
            "yaml" | "yml" => serde_yaml_ng::from_str(&content)
                .map_err(|e| AssistError::Pattern(format!("{}: {}", path.display(), e)))?,
            "json" => serde_json::from_str(&content)
                .map_err(|e| AssistError::Pattern(format!("{}: {}", path.display(), e)))?,
            other => {
                return Err(AssistError::Pattern(format!(
                    "unsupported pattern table format: .{}",
                    other
                )))
            }
        };
        log::info!(
            "Loaded pattern table {} ({} entity, {} relationship, {} attribute patterns)",
            path.display(),
            spec.entities.len(),
            spec.relationships.len(),
            spec.attributes.len()
        );
        Self::compile(spec)
    }

    /// The built-in table.
    pub fn builtin() -> Self {
        Self::compile(PatternTableSpec::builtin()).expect("built-in pattern table must compile")
    }
}

fn entity(pattern: &str, entity_type: EntityType, confidence: f32) -> EntityPatternSpec {
    EntityPatternSpec {
        pattern: pattern.to_string(),
        entity_type,
        confidence,
        group: None,
        canonical: None,
        attributes: BTreeMap::new(),
        exclude: Vec::new(),
    }
}

fn product(pattern: &str, canonical: &str, product_type: &str) -> EntityPatternSpec {
    let mut spec = entity(pattern, EntityType::DataProduct, 0.8);
    spec.canonical = Some(canonical.to_string());
    spec.attributes
        .insert("product_type".to_string(), product_type.to_string());
    spec
}

fn relation(pattern: &str, predicate: &str, confidence: f32) -> RelationPatternSpec {
    RelationPatternSpec {
        pattern: pattern.to_string(),
        predicate: predicate.to_string(),
        confidence,
    }
}

fn attribute(
    pattern: &str,
    attribute: &str,
    kind: AttributeKind,
    applies_to: Option<EntityType>,
) -> AttributeRuleSpec {
    AttributeRuleSpec {
        pattern: pattern.to_string(),
        attribute: attribute.to_string(),
        kind,
        applies_to,
    }
}

/// Up to three words on either side of a verb phrase.
const PHRASE: &str = r"[\w-]+(?:\s+[\w-]+){0,2}";

fn verb_rule(verbs: &str) -> String {
    format!(
        r"(?i)(?P<source>{p})\s+(?:{v})\s+(?:(?:an?|the)\s+)?(?P<target>{p})",
        p = PHRASE,
        v = verbs
    )
}

impl PatternTableSpec {
    pub fn builtin() -> Self {
        use EntityType::*;

        let mut ocm = entity(r"(?i)\bOcean Colou?r Monitor\b", Sensor, 0.85);
        ocm.canonical = Some("OCM".to_string());
        let mut isro = entity(r"(?i)\bIndian Space Research Organi[sz]ation\b", Organization, 0.85);
        isro.canonical = Some("ISRO".to_string());
        let mut sac = entity(r"(?i)\bSpace Applications Centre\b", Organization, 0.85);
        sac.canonical = Some("SAC".to_string());

        let mut place = entity(
            r"\b(?:over|in|across|covering|around|near)\s+(?P<name>[A-Z][a-z]+(?:\s+[A-Z][a-z]+)?)(?:[\s,.;:!?)]|$)",
            Location,
            0.7,
        );
        place.group = Some("name".to_string());
        place.exclude = [
            "january", "february", "march", "april", "may", "june", "july", "august",
            "september", "october", "november", "december", "monday", "tuesday",
            "wednesday", "thursday", "friday", "saturday", "sunday", "the", "this",
            "these", "addition", "general", "particular", "order",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();

        Self {
            entities: vec![
                entity(
                    r"(?i)\b(?:INSAT-3D[RS]?|INSAT-3[A-C]|KALPANA-1|OCEANSAT-[1-3]|SCATSAT-1|MEGHA-TROPIQUES|SARAL|CARTOSAT-[1-3][A-C]?|RESOURCESAT-[12]A?|RISAT-[12][AB]?|EOS-0[1-9])\b",
                    Satellite,
                    0.9,
                ),
                entity(
                    r"(?i)\b(?:Imager|Sounder|VHRR|OCM(?:-[23])?|OSCAT|Scatterometer|SAPHIR|MADRAS|ScaRaB|AltiKa|LISS-(?:III|IV)|AWiFS)\b",
                    Sensor,
                    0.85,
                ),
                ocm,
                product(r"(?i)\b(?:Sea Surface Temperature|SST)\b", "SST", "Sea Surface Temperature"),
                product(r"(?i)\b(?:Outgoing Longwave Radiation|OLR)\b", "OLR", "Outgoing Longwave Radiation"),
                product(r"(?i)\b(?:Cloud Motion Vectors?|CMV)\b", "Cloud Motion Vectors", "Atmospheric Winds"),
                product(r"(?i)\bChlorophyll(?:-a)?\b", "Chlorophyll", "Ocean Colour"),
                product(r"(?i)\b(?:Ocean Surface Winds?|Wind Vectors?)\b", "Ocean Surface Winds", "Ocean Winds"),
                product(r"(?i)\b(?:Digital Elevation Model|DEM)\b", "DEM", "Digital Elevation Model"),
                product(r"(?i)\b(?:Land Use Land Cover|LULC)\b", "LULC", "Land Use Land Cover"),
                product(r"(?i)\b(?:Normalized Difference Vegetation Index|NDVI)\b", "NDVI", "Vegetation Index"),
                product(r"(?i)\b(?:Aerosol Optical Depth|AOD)\b", "AOD", "Aerosol Optical Depth"),
                product(r"(?i)\bSoil Moisture\b", "Soil Moisture", "Soil Moisture"),
                product(r"(?i)\bRainfall\b", "Rainfall", "Precipitation"),
                product(r"(?i)\bSnow Cover\b", "Snow Cover", "Cryosphere"),
                entity(r"\b(?:ISRO|MOSDAC|SAC|NRSC|IMD|INCOIS|NASA|NOAA|EUMETSAT|CNES)\b", Organization, 0.85),
                isro,
                sac,
                entity(r"(?i)\b(?:Chandrayaan-[1-3]|Mangalyaan|Gaganyaan|Aditya-L1|NISAR)\b", Mission, 0.9),
                place,
            ],
            relationships: vec![
                relation(
                    &verb_rule(r"carries|carry|carried|hosts|(?:is|are)\s+equipped\s+with|has\s+on\s*board"),
                    "carries",
                    0.85,
                ),
                relation(
                    &verb_rule(r"provides|provide|provided|generates|produces|delivers|offers"),
                    "provides",
                    0.8,
                ),
                relation(&verb_rule(r"(?:is\s+|are\s+)?used\s+for"), "used_for", 0.75),
                relation(&verb_rule(r"measures|measure|retrieves"), "measures", 0.75),
                relation(&verb_rule(r"covers|observes|monitors"), "covers", 0.7),
                relation(
                    &verb_rule(r"(?:is\s+|was\s+)?(?:operated|developed|built|managed)\s+by"),
                    "operated_by",
                    0.8,
                ),
                relation(
                    &format!(
                        r"(?i)(?P<source>{})\s+(?:was\s+)?launched\s+(?:in|on)\s+(?P<target>\d{{4}})",
                        PHRASE
                    ),
                    "launched_in",
                    0.9,
                ),
            ],
            attributes: vec![
                attribute(
                    r"(?i)launched\s+(?:in|on)\s+(?P<value>\d{4})",
                    "launch_year",
                    AttributeKind::Number,
                    Some(Satellite),
                ),
                attribute(
                    r"(?i)(?:acquired|captured|observed)\s+on\s+(?P<value>\d{4}-\d{2}-\d{2})",
                    "acquisition_date",
                    AttributeKind::Date,
                    None,
                ),
                attribute(
                    r"(?i)acquisition\s+date[:\s]+(?P<value>\d{4}-\d{2}-\d{2})",
                    "acquisition_date",
                    AttributeKind::Date,
                    None,
                ),
                attribute(
                    r"(?i)resolution\s+of\s+(?P<value>\d+(?:\.\d+)?\s*(?:km|m|metres|meters))\b",
                    "resolution",
                    AttributeKind::Text,
                    None,
                ),
                attribute(
                    r"(?i)\b(?P<value>\d+(?:\.\d+)?\s*(?:km|m))\s+(?:spatial\s+)?resolution",
                    "resolution",
                    AttributeKind::Text,
                    None,
                ),
                attribute(
                    r"(?:[Cc]overage\s+(?:over|of)|[Cc]overs|[Cc]overing)\s+(?:the\s+)?(?P<value>[A-Z][A-Za-z]+(?:\s+[A-Z][A-Za-z]+)*)",
                    "coverage",
                    AttributeKind::Text,
                    None,
                ),
            ],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_builtin_table_compiles() {
        let table = PatternTable::builtin();
        assert!(table.entities.len() >= 10);
        assert_eq!(table.relationships.len(), 7);
        assert!(!table.attributes.is_empty());
    }

    #[test]
    fn test_carries_rule_captures_phrases() {
        let table = PatternTable::builtin();
        let rule = table
            .relationships
            .iter()
            .find(|r| r.spec.predicate == "carries")
            .unwrap();
        let caps = rule
            .regex
            .captures("INSAT-3D carries an Imager for weather monitoring.")
            .unwrap();
        assert_eq!(&caps["source"], "INSAT-3D");
        assert_eq!(&caps["target"], "Imager for weather");
    }

    #[test]
    fn test_relation_pattern_requires_groups() {
        let spec = PatternTableSpec {
            relationships: vec![relation(r"(\w+) carries (\w+)", "carries", 0.8)],
            ..Default::default()
        };
        let err = PatternTable::compile(spec).unwrap_err();
        assert!(matches!(err, AssistError::Pattern(_)));
    }

    #[test]
    fn test_invalid_regex_is_pattern_error() {
        let spec = PatternTableSpec {
            entities: vec![entity(r"(unclosed", EntityType::Sensor, 0.8)],
            ..Default::default()
        };
        assert!(matches!(PatternTable::compile(spec), Err(AssistError::Pattern(_))));
    }

    #[test]
    fn test_attribute_value_parsing() {
        let table = PatternTable::builtin();
        let launch = table
            .attributes
            .iter()
            .find(|a| a.spec.attribute == "launch_year")
            .unwrap();
        assert_eq!(launch.parse_value("2013"), Some(AttributeValue::Number(2013.0)));
        let date = table
            .attributes
            .iter()
            .find(|a| a.spec.attribute == "acquisition_date")
            .unwrap();
        assert_eq!(
            date.parse_value("2024-02-29"),
            Some(AttributeValue::Date(NaiveDate::from_ymd_opt(2024, 2, 29).unwrap()))
        );
        assert_eq!(date.parse_value("2023-02-30"), None);
    }

    #[test]
    fn test_load_yaml_and_toml_tables() {
        let temp = TempDir::new().unwrap();
        let yaml = temp.path().join("patterns.yaml");
        std::fs::write(
            &yaml,
            r#"
entities:
  - pattern: '(?i)\bHRSAT\b'
    entity_type: satellite
    confidence: 0.9
relationships:
  - pattern: '(?i)(?P<source>\w+)\s+feeds\s+(?P<target>\w+)'
    predicate: feeds
"#,
        )
        .unwrap();
        let table = PatternTable::from_path(&yaml).unwrap();
        assert_eq!(table.entities.len(), 1);
        assert_eq!(table.relationships[0].spec.predicate, "feeds");
        assert!((table.relationships[0].spec.confidence - 0.75).abs() < 1e-6);

        let toml_path = temp.path().join("patterns.toml");
        std::fs::write(
            &toml_path,
            r#"
[[entities]]
pattern = '(?i)\bHRSAT\b'
entity_type = "satellite"
canonical = "HRSAT"
"#,
        )
        .unwrap();
        let table = PatternTable::from_path(&toml_path).unwrap();
        assert_eq!(table.entities[0].spec.canonical.as_deref(), Some("HRSAT"));

        let bad = temp.path().join("patterns.ini");
        std::fs::write(&bad, "").unwrap();
        assert!(PatternTable::from_path(&bad).is_err());
    }
}
