//! Query intent model.

mod parser;

pub use parser::IntentParser;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::gazetteer::{BoundingBox, GeoPoint, SpatialLocation};

/// Primary purpose of a query. One winner per query; see [`QueryIntent::signals`]
/// for everything that fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntentType {
    Search,
    Filter,
    Relationship,
    Geospatial,
    Temporal,
    /// Temporal signal on a query that also fired the geospatial pass.
    TemporalGeospatial,
    Comparison,
}

impl IntentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            IntentType::Search => "search",
            IntentType::Filter => "filter",
            IntentType::Relationship => "relationship",
            IntentType::Geospatial => "geospatial",
            IntentType::Temporal => "temporal",
            IntentType::TemporalGeospatial => "temporal_geospatial",
            IntentType::Comparison => "comparison",
        }
    }

    pub fn is_geospatial(&self) -> bool {
        matches!(self, IntentType::Geospatial | IntentType::TemporalGeospatial)
    }

    pub fn is_temporal(&self) -> bool {
        matches!(self, IntentType::Temporal | IntentType::TemporalGeospatial)
    }
}

impl std::fmt::Display for IntentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Timeframe {
    /// "recent", "latest", "current" and similar.
    Recent,
    /// Inclusive date range from explicit years or "past N months".
    Range { start: NaiveDate, end: NaiveDate },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScopeKind {
    Point,
    Region,
}

/// Resolved gazetteer hit a query is scoped to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpatialScope {
    pub name: String,
    pub kind: ScopeKind,
    pub centroid: GeoPoint,
    pub bounding_box: BoundingBox,
}

impl From<&SpatialLocation> for SpatialScope {
    fn from(location: &SpatialLocation) -> Self {
        Self {
            name: location.canonical_name.clone(),
            kind: if location.is_point() {
                ScopeKind::Point
            } else {
                ScopeKind::Region
            },
            centroid: location.centroid,
            bounding_box: location.bounding_box,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalKind {
    Geospatial,
    Temporal,
    Relationship,
    Comparison,
    Filter,
    Location,
    DataType,
    Entity,
}

/// One classifier hit, kept for debugging and logging.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntentSignal {
    pub kind: SignalKind,
    pub detail: String,
    pub weight: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryIntent {
    #[serde(rename = "type")]
    pub intent_type: IntentType,
    /// Names of known entities the query references.
    pub entities: Vec<String>,
    /// Canonical gazetteer names, in order of first appearance.
    pub locations: Vec<String>,
    pub timeframe: Option<Timeframe>,
    pub spatial_scope: Option<SpatialScope>,
    pub data_types: Vec<String>,
    /// Normalised relation verbs: `carries`, `provides`, `used_for`.
    pub relationship_verbs: Vec<String>,
    pub confidence: f32,
    pub signals: Vec<IntentSignal>,
}

impl Default for QueryIntent {
    fn default() -> Self {
        Self {
            intent_type: IntentType::Search,
            entities: Vec::new(),
            locations: Vec::new(),
            timeframe: None,
            spatial_scope: None,
            data_types: Vec::new(),
            relationship_verbs: Vec::new(),
            confidence: 0.0,
            signals: Vec::new(),
        }
    }
}

impl QueryIntent {
    pub fn fired(&self, kind: SignalKind) -> bool {
        self.signals.iter().any(|s| s.kind == kind)
    }
}
