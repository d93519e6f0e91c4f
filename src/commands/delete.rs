use anyhow::{Context as _, Result};

use super::Context;

pub async fn run(ctx: &Context, graph_id: &str) -> Result<()> {
    ctx.service
        .delete_graph(graph_id)
        .await
        .with_context(|| format!("Failed to delete graph {}", graph_id))?;
    eprintln!("Deleted graph {}", graph_id);
    Ok(())
}
