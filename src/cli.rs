use clap::{Parser, Subcommand};
use std::path::PathBuf;

use kbgraph::graph::NodeType;
use kbgraph::query::OutputFormat;

/// kbgraph: builds knowledge graphs from knowledge bases and queries them
#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Builds knowledge graphs from knowledge bases and queries them"
)]
pub struct Cli {
    /// Configuration file (defaults apply when it does not exist)
    #[arg(long, short, global = true, default_value = "kbgraph.toml")]
    pub config: PathBuf,

    /// SQLite database path, overrides the configuration file and KBGRAPH_DB
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,

    /// JSON corpus providing documents and extracted mentions
    #[arg(long, global = true)]
    pub corpus: Option<PathBuf>,

    /// Output format
    #[arg(long, short, global = true, value_enum, default_value = "text")]
    pub format: OutputFormat,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create a graph for a knowledge base and build it
    Create {
        /// Knowledge base to build from
        knowledge_base_id: String,

        /// Display name of the graph
        #[arg(long, short)]
        name: String,

        #[arg(long, short)]
        description: Option<String>,
    },

    /// Show one graph's metadata
    Get { graph_id: String },

    /// List all graphs
    List,

    /// Rebuild a graph from the current state of its knowledge base
    Rebuild { graph_id: String },

    /// Delete a graph with all of its nodes and edges
    Delete { graph_id: String },

    /// Explore the neighborhood of one or more nodes
    Neighborhood {
        graph_id: String,

        /// Start node id (repeatable); all nodes when omitted
        #[arg(long = "start", short)]
        start: Vec<String>,

        /// Keep only start nodes of this type (repeatable)
        #[arg(long = "type", short = 't')]
        node_types: Vec<NodeType>,

        /// Follow only edges with this label (repeatable)
        #[arg(long = "label", short)]
        labels: Vec<String>,

        /// Maximum hops from a start node
        #[arg(long)]
        max_depth: Option<usize>,

        /// Maximum number of nodes to return
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Find the strongest connection between two nodes
    Path {
        graph_id: String,
        source: String,
        target: String,
    },
}
