pub mod formatter;
pub mod neighborhood;
pub mod path;

pub use formatter::{OutputFormat, ResultFormatter};
pub use neighborhood::{neighborhood, NeighborhoodSpec};
pub use path::{edge_cost, path_cost, shortest_path, MIN_PATH_WEIGHT};

use serde::{Deserialize, Serialize};

use crate::graph::{KnowledgeEdge, KnowledgeNode};

/// Nodes and edges returned by a query.
///
/// Every edge references nodes present in `nodes`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Subgraph {
    pub nodes: Vec<KnowledgeNode>,
    pub edges: Vec<KnowledgeEdge>,
}

impl Subgraph {
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}
