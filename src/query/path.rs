//! Minimum-cost path between two nodes.
//!
//! Edge cost is the inverse of edge weight, so strongly related nodes are
//! close. The search is Dijkstra's algorithm, run as A* with a zero estimate
//! over the graph's undirected index.

use petgraph::algo::astar;

use super::Subgraph;
use crate::error::{GraphError, Result};
use crate::graph::{KnowledgeEdge, LoadedGraph, NodeId};

/// Weights at or below this are treated as this value when computing cost
pub const MIN_PATH_WEIGHT: f64 = 1e-6;

/// Traversal cost of an edge with the given weight
pub fn edge_cost(weight: f64) -> f64 {
    if weight.is_finite() && weight > MIN_PATH_WEIGHT {
        1.0 / weight
    } else {
        1.0 / MIN_PATH_WEIGHT
    }
}

/// Sum of edge costs along a path
pub fn path_cost(path: &Subgraph) -> f64 {
    path.edges.iter().map(|e| edge_cost(e.weight)).sum()
}

/// Find the cheapest path from `source` to `target`.
///
/// Returns an empty subgraph when the nodes are not connected and
/// `NotFound` when either node is not part of the graph.
pub fn shortest_path(graph: &LoadedGraph, source: &NodeId, target: &NodeId) -> Result<Subgraph> {
    let from = graph
        .node_index(source)
        .ok_or_else(|| GraphError::node_not_found(source.as_str()))?;
    let to = graph
        .node_index(target)
        .ok_or_else(|| GraphError::node_not_found(target.as_str()))?;

    let found = astar(
        graph.index(),
        from,
        |n| n == to,
        |e| edge_cost(graph.edge_at(*e.weight()).weight),
        |_| 0.0,
    );

    let Some((_cost, path)) = found else {
        tracing::debug!(%source, %target, "No path between nodes");
        return Ok(Subgraph::default());
    };

    let nodes: Vec<_> = path.iter().map(|idx| graph.node_at(*idx).clone()).collect();
    let mut edges = Vec::with_capacity(nodes.len().saturating_sub(1));
    for pair in nodes.windows(2) {
        if let Some(edge) = cheapest_edge_between(graph, &pair[0].id, &pair[1].id) {
            edges.push(edge.clone());
        }
    }

    Ok(Subgraph { nodes, edges })
}

/// The lowest-cost edge joining `a` and `b` in either direction; the first
/// stored edge wins ties
fn cheapest_edge_between<'g>(
    graph: &'g LoadedGraph,
    a: &NodeId,
    b: &NodeId,
) -> Option<&'g KnowledgeEdge> {
    graph
        .incident_edges(a)
        .into_iter()
        .filter(|edge| edge.connects(a, b))
        .fold(None, |best: Option<&KnowledgeEdge>, edge| match best {
            Some(current) if edge_cost(current.weight) <= edge_cost(edge.weight) => Some(current),
            _ => Some(edge),
        })
}
