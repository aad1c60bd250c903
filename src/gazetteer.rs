//! Static place-name lookup: canonical names and aliases to coordinates.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Administrative kind of a gazetteer entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LocationKind {
    City,
    State,
    Region,
    District,
}

/// Longitude/latitude pair in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lon: f64,
    pub lat: f64,
}

/// Axis-aligned box given by its south-west and north-east corners.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub south_west: GeoPoint,
    pub north_east: GeoPoint,
}

impl BoundingBox {
    pub fn contains(&self, point: &GeoPoint) -> bool {
        point.lon >= self.south_west.lon
            && point.lon <= self.north_east.lon
            && point.lat >= self.south_west.lat
            && point.lat <= self.north_east.lat
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpatialLocation {
    pub canonical_name: String,
    pub kind: LocationKind,
    pub centroid: GeoPoint,
    pub bounding_box: BoundingBox,
    /// Lowercase alternative names.
    pub aliases: Vec<String>,
}

impl SpatialLocation {
    fn new(
        canonical_name: &str,
        kind: LocationKind,
        centroid: (f64, f64),
        south_west: (f64, f64),
        north_east: (f64, f64),
        aliases: &[&str],
    ) -> Self {
        Self {
            canonical_name: canonical_name.to_string(),
            kind,
            centroid: GeoPoint { lon: centroid.0, lat: centroid.1 },
            bounding_box: BoundingBox {
                south_west: GeoPoint { lon: south_west.0, lat: south_west.1 },
                north_east: GeoPoint { lon: north_east.0, lat: north_east.1 },
            },
            aliases: aliases.iter().map(|a| a.to_lowercase()).collect(),
        }
    }

    /// Cities resolve to a point scope, everything else to a region.
    pub fn is_point(&self) -> bool {
        self.kind == LocationKind::City
    }
}

/// Exact, case-insensitive lookup over canonical names and aliases.
#[derive(Debug, Clone)]
pub struct Gazetteer {
    entries: Vec<SpatialLocation>,
    lookup: HashMap<String, usize>,
    /// Longest key in words, bounds n-gram scanning of queries.
    max_words: usize,
}

impl Gazetteer {
    pub fn with_entries(entries: Vec<SpatialLocation>) -> Self {
        let mut lookup = HashMap::new();
        for (idx, entry) in entries.iter().enumerate() {
            lookup.insert(entry.canonical_name.to_lowercase(), idx);
            for alias in &entry.aliases {
                lookup.insert(alias.to_lowercase(), idx);
            }
        }
        let max_words = lookup
            .keys()
            .map(|k| k.split_whitespace().count())
            .max()
            .unwrap_or(1);
        Self {
            entries,
            lookup,
            max_words,
        }
    }

    pub fn resolve(&self, token: &str) -> Option<&SpatialLocation> {
        let key = token.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase();
        self.lookup.get(&key).map(|&idx| &self.entries[idx])
    }

    pub fn entries(&self) -> &[SpatialLocation] {
        &self.entries
    }

    pub fn max_words(&self) -> usize {
        self.max_words
    }
}

impl Default for Gazetteer {
    /// Indian states and cities covered by the archive.
    fn default() -> Self {
        use LocationKind::*;
        Self::with_entries(vec![
            SpatialLocation::new("Kerala", State, (76.27, 10.85), (74.85, 8.18), (77.42, 12.79), &["keralam"]),
            SpatialLocation::new("Tamil Nadu", State, (78.66, 11.13), (76.23, 8.07), (80.35, 13.56), &["tamilnadu", "tn"]),
            SpatialLocation::new("Gujarat", State, (71.19, 22.26), (68.16, 20.12), (74.48, 24.71), &[]),
            SpatialLocation::new("Mumbai", City, (72.88, 19.08), (72.77, 18.89), (72.99, 19.27), &["bombay"]),
            SpatialLocation::new("Delhi", City, (77.10, 28.70), (76.84, 28.40), (77.35, 28.88), &["new delhi", "ncr"]),
            SpatialLocation::new("Chennai", City, (80.27, 13.08), (80.17, 12.90), (80.32, 13.23), &[]),
            SpatialLocation::new("Kolkata", City, (88.36, 22.57), (88.23, 22.45), (88.47, 22.65), &["calcutta"]),
            SpatialLocation::new("Bengaluru", City, (77.59, 12.97), (77.46, 12.83), (77.78, 13.14), &["bangalore"]),
        ])
    }
}
