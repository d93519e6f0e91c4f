pub mod edge;
pub mod knowledge_graph;
pub mod node;

// Re-export the core model for convenience
pub use crate::graph::edge::{EdgeId, EdgeLabel, KnowledgeEdge};
pub use crate::graph::knowledge_graph::{GraphMetadata, KnowledgeGraph, LoadedGraph};
pub use crate::graph::node::{KnowledgeNode, NodeId, NodeProperties, NodeType, PropertyMap};
