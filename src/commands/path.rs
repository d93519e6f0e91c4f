use anyhow::{Context as _, Result};

use kbgraph::graph::NodeId;

use super::Context;

/// Finds and prints the lowest-cost path between two nodes
pub fn run(ctx: &Context, graph_id: &str, source: &str, target: &str) -> Result<()> {
    let path = ctx
        .service
        .find_shortest_path(graph_id, &NodeId::new(source), &NodeId::new(target))
        .with_context(|| format!("Path search from {} to {} failed", source, target))?;

    println!("{}", ctx.formatter.format_path(&path)?);
    Ok(())
}
