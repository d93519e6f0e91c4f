use anyhow::{Context as _, Result};

use super::Context;

/// Print one graph's metadata
pub fn run(ctx: &Context, graph_id: &str) -> Result<()> {
    let graph = ctx
        .service
        .get_graph(graph_id)
        .with_context(|| format!("Failed to read graph {}", graph_id))?;
    println!("{}", ctx.formatter.format_graph(&graph)?);
    Ok(())
}

/// Print every stored graph
pub fn list(ctx: &Context) -> Result<()> {
    let graphs = ctx.service.list_graphs().context("Failed to list graphs")?;
    println!("{}", ctx.formatter.format_graphs(&graphs)?);
    Ok(())
}
