//! Knowledge graph projection: nodes and edges derived from the entity and
//! relationship set, structural metrics, export and traversal.
//!
//! The graph is rebuilt wholesale from its inputs; nothing here mutates an
//! existing graph.

pub mod export;
mod traversal;

pub use export::{export, ExportFormat};
pub use traversal::{related_entities, RelatedEntity};

use std::collections::{BTreeSet, HashMap};

use serde::{Deserialize, Serialize};

use crate::knowledge::{Entity, EntityType, Relationship};

/// Projection of an [`Entity`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphNode {
    pub id: String,
    pub label: String,
    #[serde(rename = "type")]
    pub node_type: EntityType,
    /// Display size from confidence and mention count.
    pub size: f32,
    pub confidence: f32,
    pub mention_count: usize,
}

/// Projection of a [`Relationship`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphEdge {
    pub id: String,
    pub source: String,
    pub target: String,
    pub relation: String,
    /// Confidence times evidence count.
    pub weight: f32,
    pub confidence: f32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphData {
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<GraphEdge>,
}

impl GraphData {
    pub fn node(&self, id: &str) -> Option<&GraphNode> {
        self.nodes.iter().find(|n| n.id == id)
    }

    /// Undirected degree per node id; every edge counts for both endpoints.
    pub fn degrees(&self) -> HashMap<&str, usize> {
        let mut degrees: HashMap<&str, usize> =
            self.nodes.iter().map(|n| (n.id.as_str(), 0)).collect();
        for edge in &self.edges {
            *degrees.entry(edge.source.as_str()).or_default() += 1;
            *degrees.entry(edge.target.as_str()).or_default() += 1;
        }
        degrees
    }
}

/// Node size grows with confidence and, up to a cap, with mentions.
fn node_size(confidence: f32, mention_count: usize) -> f32 {
    10.0 + confidence * 20.0 + mention_count.min(20) as f32
}

/// Project entities and relationships into a graph.
///
/// Edges whose endpoints are not among `entities` are left out.
pub fn build(entities: &[Entity], relationships: &[Relationship]) -> GraphData {
    let nodes: Vec<GraphNode> = entities
        .iter()
        .map(|e| GraphNode {
            id: e.id.clone(),
            label: e.name.clone(),
            node_type: e.entity_type,
            size: node_size(e.confidence, e.mentions.len()),
            confidence: e.confidence,
            mention_count: e.mentions.len(),
        })
        .collect();

    let known: BTreeSet<&str> = nodes.iter().map(|n| n.id.as_str()).collect();
    let edges = relationships
        .iter()
        .filter(|r| {
            known.contains(r.source_entity_id.as_str()) && known.contains(r.target_entity_id.as_str())
        })
        .map(|r| GraphEdge {
            id: r.id.clone(),
            source: r.source_entity_id.clone(),
            target: r.target_entity_id.clone(),
            relation: r.relationship_type.clone(),
            weight: r.confidence * r.evidence.len().max(1) as f32,
            confidence: r.confidence,
        })
        .collect();

    GraphData { nodes, edges }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CentralNode {
    pub id: String,
    pub label: String,
    pub degree: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GraphMetrics {
    pub node_count: usize,
    pub edge_count: usize,
    pub density: f64,
    pub avg_degree: f64,
    /// Number of distinct entity types present. A coarse grouping proxy, not
    /// a community detection result.
    pub clusters: usize,
    pub central_nodes: Vec<CentralNode>,
}

/// Structural metrics; `top_k` bounds the central node list.
pub fn metrics(graph: &GraphData, top_k: usize) -> GraphMetrics {
    let n = graph.nodes.len();
    let e = graph.edges.len();
    let density = if n < 2 {
        0.0
    } else {
        e as f64 / (n as f64 * (n as f64 - 1.0) / 2.0)
    };

    let degrees = graph.degrees();
    let avg_degree = if n == 0 {
        0.0
    } else {
        graph
            .nodes
            .iter()
            .map(|node| degrees.get(node.id.as_str()).copied().unwrap_or(0))
            .sum::<usize>() as f64
            / n as f64
    };

    let clusters = graph
        .nodes
        .iter()
        .map(|node| node.node_type)
        .collect::<BTreeSet<_>>()
        .len();

    // Stable sort keeps input order among equal degrees
    let mut central: Vec<CentralNode> = graph
        .nodes
        .iter()
        .map(|node| CentralNode {
            id: node.id.clone(),
            label: node.label.clone(),
            degree: degrees.get(node.id.as_str()).copied().unwrap_or(0),
        })
        .collect();
    central.sort_by(|a, b| b.degree.cmp(&a.degree));
    central.truncate(top_k);

    GraphMetrics {
        node_count: n,
        edge_count: e,
        density,
        avg_degree,
        clusters,
        central_nodes: central,
    }
}
