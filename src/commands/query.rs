use anyhow::{Context as _, Result};

use kbgraph::graph::{EdgeLabel, NodeId, NodeType};
use kbgraph::NeighborhoodSpec;

use super::Context;

/// Neighborhood options as given on the command line
#[derive(Debug, Default)]
pub struct NeighborhoodOptions {
    pub start: Vec<String>,
    pub node_types: Vec<NodeType>,
    pub labels: Vec<String>,
    pub max_depth: Option<usize>,
    pub limit: Option<usize>,
}

impl NeighborhoodOptions {
    /// Fill unset options from the configured query defaults
    fn into_spec(self, ctx: &Context) -> NeighborhoodSpec {
        let defaults = NeighborhoodSpec::from_config(ctx.service.query_config());
        NeighborhoodSpec {
            start_node_ids: self.start.iter().map(|id| NodeId::new(id)).collect(),
            node_types: self.node_types,
            edge_labels: self.labels.into_iter().map(EdgeLabel::from).collect(),
            max_depth: self.max_depth.unwrap_or(defaults.max_depth),
            limit: self.limit.unwrap_or(defaults.limit),
        }
    }
}

/// Runs a neighborhood query and prints the resulting subgraph
pub fn run(ctx: &Context, graph_id: &str, options: NeighborhoodOptions) -> Result<()> {
    let spec = options.into_spec(ctx);
    tracing::info!(
        graph_id,
        start = spec.start_node_ids.len(),
        max_depth = spec.max_depth,
        limit = spec.limit,
        "Querying neighborhood"
    );

    let subgraph = ctx
        .service
        .query_neighborhood(graph_id, &spec)
        .with_context(|| format!("Neighborhood query on graph {} failed", graph_id))?;

    println!("{}", ctx.formatter.format_subgraph(&subgraph)?);
    if subgraph.is_empty() {
        eprintln!("\nNo nodes found. Here are some tips:");
        eprintln!(" - Check the start node ids, e.g. node_doc_<documentId>");
        eprintln!(" - Drop --type or --label filters to widen the search");
        eprintln!(" - Rebuild the graph if its knowledge base has changed");
    }
    Ok(())
}
