//! Bounded neighborhood exploration.
//!
//! Multi-source breadth-first traversal. All qualifying start nodes enter the
//! queue at depth 0 in the order given (or in stored order when no start set
//! is supplied); incident edges of a popped node are visited in stored order
//! regardless of direction. When `limit` cuts the traversal short, the nodes
//! returned are therefore the first `limit` nodes of that FIFO order, not a
//! ranked "best" subset.

use serde::{Deserialize, Serialize};
use std::collections::{HashSet, VecDeque};
use tracing::debug;

use super::Subgraph;
use crate::config::QueryConfig;
use crate::graph::{EdgeId, EdgeLabel, KnowledgeEdge, KnowledgeNode, LoadedGraph, NodeId, NodeType};

/// Options for a neighborhood query
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct NeighborhoodSpec {
    /// Traversal seeds; empty means every node in the graph
    pub start_node_ids: Vec<NodeId>,
    /// Restricts the seeds only, never the expansion
    pub node_types: Vec<NodeType>,
    /// Edges eligible for traversal; empty means all
    pub edge_labels: Vec<EdgeLabel>,
    pub max_depth: usize,
    pub limit: usize,
}

impl Default for NeighborhoodSpec {
    fn default() -> Self {
        Self::from_config(&QueryConfig::default())
    }
}

impl NeighborhoodSpec {
    pub fn from_config(config: &QueryConfig) -> Self {
        Self {
            start_node_ids: Vec::new(),
            node_types: Vec::new(),
            edge_labels: Vec::new(),
            max_depth: config.default_max_depth,
            limit: config.default_limit,
        }
    }

    pub fn starting_at(ids: &[&str]) -> Self {
        Self {
            start_node_ids: ids.iter().map(|id| NodeId::new(id)).collect(),
            ..Self::default()
        }
    }
}

fn seeds<'g>(graph: &'g LoadedGraph, spec: &NeighborhoodSpec) -> Vec<&'g KnowledgeNode> {
    let candidates: Vec<&KnowledgeNode> = if spec.start_node_ids.is_empty() {
        graph.nodes().iter().collect()
    } else {
        spec.start_node_ids
            .iter()
            .filter_map(|id| {
                let node = graph.node(id);
                if node.is_none() {
                    debug!(node_id = %id, "Ignoring unknown start node");
                }
                node
            })
            .collect()
    };

    if spec.node_types.is_empty() {
        return candidates;
    }
    candidates
        .into_iter()
        .filter(|node| spec.node_types.contains(&node.node_type))
        .collect()
}

/// Return the subgraph reachable from the seeds within `max_depth` hops,
/// capped at `limit` nodes. Only edges whose endpoints are both returned are
/// included.
pub fn neighborhood(graph: &LoadedGraph, spec: &NeighborhoodSpec) -> Subgraph {
    let mut result = Subgraph::default();
    if spec.limit == 0 {
        return result;
    }

    let label_filter: HashSet<&EdgeLabel> = spec.edge_labels.iter().collect();
    let mut visited: HashSet<&NodeId> = HashSet::new();
    let mut seen_edges: HashSet<&EdgeId> = HashSet::new();
    let mut traversed: Vec<&KnowledgeEdge> = Vec::new();

    let mut queue: VecDeque<(&KnowledgeNode, usize)> =
        seeds(graph, spec).into_iter().map(|node| (node, 0)).collect();

    while let Some((node, depth)) = queue.pop_front() {
        if !visited.insert(&node.id) {
            continue;
        }
        result.nodes.push(node.clone());
        if result.nodes.len() >= spec.limit {
            break;
        }
        if depth >= spec.max_depth {
            continue;
        }

        for edge in graph.incident_edges(&node.id) {
            if !label_filter.is_empty() && !label_filter.contains(&edge.label) {
                continue;
            }
            if seen_edges.insert(&edge.id) {
                traversed.push(edge);
            }
            let Some(neighbor_id) = edge.other_end(&node.id) else {
                continue;
            };
            if !visited.contains(neighbor_id) {
                if let Some(neighbor) = graph.node(neighbor_id) {
                    queue.push_back((neighbor, depth + 1));
                }
            }
        }
    }

    result.edges = traversed
        .into_iter()
        .filter(|edge| visited.contains(&edge.source_id) && visited.contains(&edge.target_id))
        .cloned()
        .collect();
    result
}
