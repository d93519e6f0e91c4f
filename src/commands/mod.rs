pub mod create;
pub mod delete;
pub mod path;
pub mod query;
pub mod rebuild;
pub mod show;

use anyhow::{Context as _, Result};
use std::sync::Arc;

use kbgraph::corpus::MemoryCorpus;
use kbgraph::query::ResultFormatter;
use kbgraph::{Config, Database, GraphService};

use crate::cli::Cli;

/// Everything a command needs: the service wired to the configured store
/// and corpus, plus the output formatter
pub struct Context {
    pub service: GraphService,
    pub formatter: ResultFormatter,
    pub has_corpus: bool,
}

impl Context {
    pub fn open(cli: &Cli) -> Result<Self> {
        let mut config = Config::load(&cli.config)
            .with_context(|| format!("Failed to load configuration from {}", cli.config.display()))?;
        if let Some(db) = &cli.db {
            config.service.database_path = db.clone();
        }

        let db_path = &config.service.database_path;
        let store = Database::new(db_path)
            .with_context(|| format!("Failed to open database {}", db_path.display()))?;
        tracing::debug!("Opened graph database at {}", store.path());

        let corpus = match &cli.corpus {
            Some(path) => MemoryCorpus::from_file(path)
                .with_context(|| format!("Failed to load corpus {}", path.display()))?,
            None => MemoryCorpus::new(),
        };
        let corpus = Arc::new(corpus);

        Ok(Self {
            service: GraphService::new(corpus.clone(), corpus, Arc::new(store), &config),
            formatter: ResultFormatter::new(cli.format),
            has_corpus: cli.corpus.is_some(),
        })
    }

    /// Warn when a build is about to run without any documents available
    pub fn warn_without_corpus(&self) {
        if !self.has_corpus {
            eprintln!("No --corpus given; the graph will be built from an empty knowledge base.");
        }
    }
}
