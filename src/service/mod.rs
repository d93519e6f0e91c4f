//! Caller-facing graph operations.
//!
//! `GraphService` owns the builder, the store and the optional snapshot
//! cache. Builds of the same graph are serialized; queries run against an
//! immutable snapshot and never wait on a build.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::info;

use crate::builder::{BuildOutcome, GraphBuilder};
use crate::cache::GraphCache;
use crate::config::{Config, QueryConfig};
use crate::db::GraphStore;
use crate::error::{GraphError, Result};
use crate::extract::{DocumentSource, Extractor};
use crate::graph::{KnowledgeGraph, LoadedGraph, NodeId};
use crate::query::{self, NeighborhoodSpec, Subgraph};

#[cfg(test)]
mod tests;

pub struct GraphService {
    store: Arc<dyn GraphStore>,
    builder: GraphBuilder,
    cache: Option<GraphCache>,
    query_config: QueryConfig,
    build_locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl GraphService {
    pub fn new(
        source: Arc<dyn DocumentSource>,
        extractor: Arc<dyn Extractor>,
        store: Arc<dyn GraphStore>,
        config: &Config,
    ) -> Self {
        let builder = GraphBuilder::new(source, extractor, store.clone(), config.graph.clone())
            .with_extraction_timeout(config.service.extraction_timeout());

        Self {
            store,
            builder,
            cache: config.service.cache_enabled.then(GraphCache::new),
            query_config: config.query.clone(),
            build_locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn query_config(&self) -> &QueryConfig {
        &self.query_config
    }

    pub fn cache(&self) -> Option<&GraphCache> {
        self.cache.as_ref()
    }

    /// Create a graph for a knowledge base and build it before returning.
    ///
    /// If the build fails the empty graph record is kept, so it can be
    /// rebuilt later, and the build error is returned.
    pub async fn create_graph(
        &self,
        knowledge_base_id: &str,
        name: &str,
        description: Option<String>,
    ) -> Result<KnowledgeGraph> {
        if knowledge_base_id.trim().is_empty() {
            return Err(GraphError::InvalidInput(
                "knowledge base id must not be empty".to_string(),
            ));
        }
        if name.trim().is_empty() {
            return Err(GraphError::InvalidInput("graph name must not be empty".to_string()));
        }

        let graph = KnowledgeGraph::new(name, description, Some(knowledge_base_id.to_string()));
        self.store.insert_graph(&graph)?;
        info!(graph_id = %graph.id, knowledge_base_id, "Created graph");

        self.build_serialized(knowledge_base_id, &graph.id).await?;
        self.get_graph(&graph.id)
    }

    pub fn get_graph(&self, graph_id: &str) -> Result<KnowledgeGraph> {
        self.store
            .get_graph(graph_id)?
            .ok_or_else(|| GraphError::graph_not_found(graph_id))
    }

    pub fn list_graphs(&self) -> Result<Vec<KnowledgeGraph>> {
        self.store.list_graphs()
    }

    /// Rebuild a graph from the current state of its knowledge base
    pub async fn rebuild_graph(&self, graph_id: &str) -> Result<BuildOutcome> {
        let graph = self.get_graph(graph_id)?;
        let knowledge_base_id = graph.knowledge_base_id.ok_or_else(|| {
            GraphError::InvalidInput(format!("graph {} has no knowledge base", graph_id))
        })?;
        self.build_serialized(&knowledge_base_id, graph_id).await
    }

    /// Remove a graph with all its nodes and edges
    pub async fn delete_graph(&self, graph_id: &str) -> Result<()> {
        let lock = self.build_lock(graph_id);
        let deleted = {
            let _guard = lock.lock().await;
            let deleted = self.store.delete_graph(graph_id);
            self.invalidate(graph_id);
            deleted
        };
        self.release_build_lock(graph_id, lock);

        if !deleted? {
            return Err(GraphError::graph_not_found(graph_id));
        }
        info!(graph_id, "Deleted graph");
        Ok(())
    }

    pub fn query_neighborhood(&self, graph_id: &str, spec: &NeighborhoodSpec) -> Result<Subgraph> {
        let graph = self.load(graph_id)?;
        Ok(query::neighborhood(&graph, spec))
    }

    pub fn find_shortest_path(
        &self,
        graph_id: &str,
        source: &NodeId,
        target: &NodeId,
    ) -> Result<Subgraph> {
        let graph = self.load(graph_id)?;
        query::shortest_path(&graph, source, target)
    }

    /// Snapshot of a graph, from the cache when enabled
    pub fn load(&self, graph_id: &str) -> Result<Arc<LoadedGraph>> {
        match &self.cache {
            Some(cache) => cache.get_or_load(self.store.as_ref(), graph_id),
            None => Ok(Arc::new(self.store.load_graph(graph_id)?)),
        }
    }

    async fn build_serialized(&self, knowledge_base_id: &str, graph_id: &str) -> Result<BuildOutcome> {
        let lock = self.build_lock(graph_id);
        let outcome = {
            let _guard = lock.lock().await;
            let outcome = self.builder.build(knowledge_base_id, graph_id).await;
            if outcome.is_ok() {
                self.invalidate(graph_id);
            }
            outcome
        };
        self.release_build_lock(graph_id, lock);
        outcome
    }

    fn lock_table(&self) -> MutexGuard<'_, HashMap<String, Arc<tokio::sync::Mutex<()>>>> {
        self.build_locks
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn build_lock(&self, graph_id: &str) -> Arc<tokio::sync::Mutex<()>> {
        self.lock_table()
            .entry(graph_id.to_string())
            .or_default()
            .clone()
    }

    /// Forget the lock of `graph_id` once no other caller holds or awaits it.
    ///
    /// Clones are only handed out under the map mutex, so a count of two
    /// (the map and `lock`) cannot grow while it is held.
    fn release_build_lock(&self, graph_id: &str, lock: Arc<tokio::sync::Mutex<()>>) {
        let mut locks = self.lock_table();
        let tracked = locks
            .get(graph_id)
            .is_some_and(|held| Arc::ptr_eq(held, &lock));
        if tracked && Arc::strong_count(&lock) == 2 {
            locks.remove(graph_id);
        }
    }

    #[cfg(test)]
    fn tracked_build_locks(&self) -> usize {
        self.lock_table().len()
    }

    fn invalidate(&self, graph_id: &str) {
        if let Some(cache) = &self.cache {
            cache.invalidate(graph_id);
        }
    }
}
