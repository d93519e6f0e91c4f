mod cli;
mod commands;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr so --format json output on stdout stays parseable
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = cli::Cli::parse();
    let ctx = commands::Context::open(&cli)?;

    match cli.command {
        cli::Commands::Create {
            knowledge_base_id,
            name,
            description,
        } => commands::create::run(&ctx, &knowledge_base_id, &name, description).await?,
        cli::Commands::Get { graph_id } => commands::show::run(&ctx, &graph_id)?,
        cli::Commands::List => commands::show::list(&ctx)?,
        cli::Commands::Rebuild { graph_id } => commands::rebuild::run(&ctx, &graph_id).await?,
        cli::Commands::Delete { graph_id } => commands::delete::run(&ctx, &graph_id).await?,
        cli::Commands::Neighborhood {
            graph_id,
            start,
            node_types,
            labels,
            max_depth,
            limit,
        } => {
            let options = commands::query::NeighborhoodOptions {
                start,
                node_types,
                labels,
                max_depth,
                limit,
            };
            commands::query::run(&ctx, &graph_id, options)?
        }
        cli::Commands::Path {
            graph_id,
            source,
            target,
        } => commands::path::run(&ctx, &graph_id, &source, &target)?,
    }

    Ok(())
}
