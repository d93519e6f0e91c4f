use anyhow::{Context as _, Result};
use std::time::Instant;

use super::Context;

/// Create a graph for a knowledge base and build it
pub async fn run(
    ctx: &Context,
    knowledge_base_id: &str,
    name: &str,
    description: Option<String>,
) -> Result<()> {
    ctx.warn_without_corpus();
    let start_time = Instant::now();

    let graph = ctx
        .service
        .create_graph(knowledge_base_id, name, description)
        .await
        .with_context(|| format!("Failed to create graph for knowledge base {}", knowledge_base_id))?;

    println!("{}", ctx.formatter.format_graph(&graph)?);
    eprintln!("Graph built in {:.2?}", start_time.elapsed());
    Ok(())
}
