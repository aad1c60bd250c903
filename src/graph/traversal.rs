//! BFS traversal over the in-memory knowledge graph.

use std::collections::{HashSet, VecDeque};

use serde::Serialize;

use super::{GraphData, GraphEdge, GraphNode};

/// An entity reached from the start node, and the edge that reached it.
#[derive(Debug, Clone, Serialize)]
pub struct RelatedEntity {
    pub node: GraphNode,
    pub via: GraphEdge,
    pub depth: usize,
}

/// Breadth-first walk from `start_id`, following edges in either direction.
///
/// Returns every node discovered within `max_depth` hops, nearest first. When
/// `relation_types` is given only edges of those types are followed.
pub fn related_entities(
    graph: &GraphData,
    start_id: &str,
    relation_types: Option<&[String]>,
    max_depth: usize,
) -> Vec<RelatedEntity> {
    let mut visited = HashSet::new();
    let mut queue = VecDeque::new();
    let mut result = Vec::new();

    if graph.node(start_id).is_none() {
        return result;
    }
    queue.push_back((start_id.to_string(), 0));
    visited.insert(start_id.to_string());

    while let Some((node_id, depth)) = queue.pop_front() {
        if depth >= max_depth {
            continue;
        }

        let edges = graph.edges.iter().filter(|e| {
            (e.source == node_id || e.target == node_id)
                && relation_types.map_or(true, |types| types.iter().any(|t| *t == e.relation))
        });
        for edge in edges {
            let other = if edge.source == node_id {
                &edge.target
            } else {
                &edge.source
            };
            if visited.contains(other) {
                continue;
            }
            let Some(node) = graph.node(other) else {
                continue;
            };
            visited.insert(other.clone());
            queue.push_back((other.clone(), depth + 1));
            result.push(RelatedEntity {
                node: node.clone(),
                via: edge.clone(),
                depth: depth + 1,
            });
        }
    }

    result
}
