use chrono::{DateTime, Utc};
use petgraph::graph::{NodeIndex, UnGraph};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap, HashSet};

use super::edge::KnowledgeEdge;
use super::node::{KnowledgeNode, NodeId, NodeType};
use crate::error::{GraphError, Result};

/// Counts recorded on a graph at the end of each build
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct GraphMetadata {
    #[serde(default)]
    pub node_count: usize,
    #[serde(default)]
    pub edge_count: usize,
    #[serde(default)]
    pub entity_count: usize,
    #[serde(default)]
    pub concept_count: usize,
    #[serde(default)]
    pub document_count: usize,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl GraphMetadata {
    /// Compute counts from a node/edge set, keeping any extra keys from `previous`
    pub fn from_contents(
        nodes: &[KnowledgeNode],
        edges: &[KnowledgeEdge],
        previous: &GraphMetadata,
    ) -> Self {
        let count_of = |node_type: NodeType| nodes.iter().filter(|n| n.node_type == node_type).count();

        Self {
            node_count: nodes.len(),
            edge_count: edges.len(),
            entity_count: count_of(NodeType::Entity),
            concept_count: count_of(NodeType::Concept),
            document_count: count_of(NodeType::Document),
            extra: previous.extra.clone(),
        }
    }
}

/// Graph metadata record: identifies a graph instance
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct KnowledgeGraph {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub knowledge_base_id: Option<String>,
    #[serde(default)]
    pub metadata: GraphMetadata,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl KnowledgeGraph {
    /// Create an empty graph record with a fresh id
    pub fn new(name: &str, description: Option<String>, knowledge_base_id: Option<String>) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.to_string(),
            description,
            knowledge_base_id,
            metadata: GraphMetadata::default(),
            created_at: now,
            updated_at: now,
        }
    }
}

/// In-memory snapshot of a graph, ready for querying.
///
/// Nodes and edges keep the order they were stored in; the undirected
/// `petgraph` index mirrors that order (node `i` and edge weight `i` both
/// refer to position `i` in the vectors).
#[derive(Debug, Clone)]
pub struct LoadedGraph {
    pub graph: KnowledgeGraph,
    nodes: Vec<KnowledgeNode>,
    edges: Vec<KnowledgeEdge>,
    positions: HashMap<NodeId, NodeIndex>,
    index: UnGraph<(), usize>,
}

impl LoadedGraph {
    /// Assemble a snapshot, rejecting duplicate ids and dangling edges
    pub fn new(
        graph: KnowledgeGraph,
        nodes: Vec<KnowledgeNode>,
        edges: Vec<KnowledgeEdge>,
    ) -> Result<Self> {
        let mut index = UnGraph::with_capacity(nodes.len(), edges.len());
        let mut positions = HashMap::with_capacity(nodes.len());

        for node in &nodes {
            let idx = index.add_node(());
            if positions.insert(node.id.clone(), idx).is_some() {
                return Err(GraphError::InvalidInput(format!(
                    "duplicate node id '{}' in graph {}",
                    node.id, graph.id
                )));
            }
        }

        let mut edge_ids = HashSet::with_capacity(edges.len());
        for (position, edge) in edges.iter().enumerate() {
            if !edge_ids.insert(&edge.id) {
                return Err(GraphError::InvalidInput(format!(
                    "duplicate edge id '{}' in graph {}",
                    edge.id, graph.id
                )));
            }
            let endpoint = |id: &NodeId| {
                positions.get(id).copied().ok_or_else(|| {
                    GraphError::InvalidInput(format!(
                        "edge '{}' references unknown node '{}'",
                        edge.id, id
                    ))
                })
            };
            let source = endpoint(&edge.source_id)?;
            let target = endpoint(&edge.target_id)?;
            index.add_edge(source, target, position);
        }

        Ok(Self {
            graph,
            nodes,
            edges,
            positions,
            index,
        })
    }

    pub fn nodes(&self) -> &[KnowledgeNode] {
        &self.nodes
    }

    pub fn edges(&self) -> &[KnowledgeEdge] {
        &self.edges
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn node(&self, id: &NodeId) -> Option<&KnowledgeNode> {
        self.positions.get(id).map(|idx| &self.nodes[idx.index()])
    }

    pub(crate) fn node_index(&self, id: &NodeId) -> Option<NodeIndex> {
        self.positions.get(id).copied()
    }

    pub(crate) fn node_at(&self, idx: NodeIndex) -> &KnowledgeNode {
        &self.nodes[idx.index()]
    }

    pub(crate) fn edge_at(&self, position: usize) -> &KnowledgeEdge {
        &self.edges[position]
    }

    pub(crate) fn index(&self) -> &UnGraph<(), usize> {
        &self.index
    }

    /// Edges touching `id` by either endpoint, in stored order
    pub fn incident_edges(&self, id: &NodeId) -> Vec<&KnowledgeEdge> {
        let Some(idx) = self.node_index(id) else {
            return Vec::new();
        };

        let mut positions: Vec<usize> = self.index.edges(idx).map(|e| *e.weight()).collect();
        positions.sort_unstable();
        positions.dedup();
        positions.into_iter().map(|p| &self.edges[p]).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::edge::EdgeLabel;
    use crate::graph::node::NodeProperties;

    fn node(id: &str, node_type: NodeType) -> KnowledgeNode {
        KnowledgeNode::new(NodeId::new(id), id.to_uppercase(), node_type, NodeProperties::default())
    }

    fn edge(from: &str, to: &str) -> KnowledgeEdge {
        KnowledgeEdge::new(NodeId::new(from), NodeId::new(to), EdgeLabel::RelatedTo, 1.0)
    }

    #[test]
    fn test_new_graph_record() {
        let kg = KnowledgeGraph::new("papers", None, Some("kb-1".to_string()));
        assert!(!kg.id.is_empty());
        assert_eq!(kg.metadata, GraphMetadata::default());
        assert_eq!(kg.created_at, kg.updated_at);
    }

    #[test]
    fn test_metadata_counts_follow_contents() {
        let nodes = vec![
            node("d1", NodeType::Document),
            node("d2", NodeType::Document),
            node("e1", NodeType::Entity),
            node("c1", NodeType::Concept),
        ];
        let edges = vec![edge("e1", "d1"), edge("c1", "d2")];
        let mut previous = GraphMetadata::default();
        previous.extra.insert("source".to_string(), Value::from("import"));

        let metadata = GraphMetadata::from_contents(&nodes, &edges, &previous);
        assert_eq!(metadata.node_count, 4);
        assert_eq!(metadata.edge_count, 2);
        assert_eq!(metadata.document_count, 2);
        assert_eq!(metadata.entity_count, 1);
        assert_eq!(metadata.concept_count, 1);
        assert_eq!(metadata.extra.get("source"), Some(&Value::from("import")));
    }

    #[test]
    fn test_loaded_graph_rejects_dangling_edge() {
        let kg = KnowledgeGraph::new("g", None, None);
        let result = LoadedGraph::new(kg, vec![node("a", NodeType::Entity)], vec![edge("a", "b")]);
        assert!(matches!(result, Err(GraphError::InvalidInput(_))));
    }

    #[test]
    fn test_loaded_graph_rejects_duplicate_node() {
        let kg = KnowledgeGraph::new("g", None, None);
        let nodes = vec![node("a", NodeType::Entity), node("a", NodeType::Concept)];
        assert!(LoadedGraph::new(kg, nodes, vec![]).is_err());
    }

    #[test]
    fn test_incident_edges_cover_both_directions_in_stored_order() {
        let kg = KnowledgeGraph::new("g", None, None);
        let nodes = vec![
            node("a", NodeType::Entity),
            node("b", NodeType::Entity),
            node("c", NodeType::Entity),
        ];
        let edges = vec![edge("a", "b"), edge("c", "b"), edge("a", "c")];
        let loaded = LoadedGraph::new(kg, nodes, edges).unwrap();

        let around_b: Vec<&str> = loaded
            .incident_edges(&NodeId::new("b"))
            .iter()
            .map(|e| e.id.as_str())
            .collect();
        assert_eq!(around_b, vec!["a->b::RELATED_TO", "c->b::RELATED_TO"]);
        assert!(loaded.incident_edges(&NodeId::new("missing")).is_empty());
    }
}
