use anyhow::{Context as _, Result};

use super::Context;

pub async fn run(ctx: &Context, graph_id: &str) -> Result<()> {
    ctx.warn_without_corpus();

    let outcome = ctx
        .service
        .rebuild_graph(graph_id)
        .await
        .with_context(|| format!("Failed to rebuild graph {}", graph_id))?;

    let graph = ctx.service.get_graph(&outcome.graph_id)?;
    println!("{}", ctx.formatter.format_graph(&graph)?);
    Ok(())
}
