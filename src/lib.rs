// Expose modules as public for use by other crates
pub mod builder;
pub mod cache;
pub mod config;
pub mod corpus;
pub mod db;
pub mod error;
pub mod extract;
pub mod graph;
pub mod query;
pub mod service;

// Re-export core types for convenience
pub use builder::{BuildOutcome, GraphBuilder};
pub use config::Config;
pub use db::{Database, GraphStore};
pub use error::{GraphError, Result};
pub use graph::{KnowledgeEdge, KnowledgeGraph, KnowledgeNode, LoadedGraph};
pub use query::{NeighborhoodSpec, Subgraph};
pub use service::GraphService;
