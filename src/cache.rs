//! Read-through cache of loaded graph snapshots.
//!
//! Entries are whole snapshots, so a reader never sees a mix of two builds.
//! Anything that writes a graph must call [`GraphCache::invalidate`] once the
//! write has committed. A snapshot whose load overlapped an invalidation is
//! returned to its reader but never cached.

use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::debug;

use crate::db::GraphStore;
use crate::error::Result;
use crate::graph::LoadedGraph;

#[derive(Debug, Default)]
struct CacheState {
    entries: HashMap<String, Arc<LoadedGraph>>,
    /// Bumped by every invalidation
    generation: u64,
}

#[derive(Debug, Default)]
pub struct GraphCache {
    state: RwLock<CacheState>,
}

impl GraphCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, CacheState> {
        self.state.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, CacheState> {
        self.state.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn get(&self, graph_id: &str) -> Option<Arc<LoadedGraph>> {
        self.read().entries.get(graph_id).cloned()
    }

    /// Drop the snapshot of `graph_id`, if any, and refuse snapshots
    /// loaded before this call
    pub fn invalidate(&self, graph_id: &str) {
        let mut state = self.write();
        state.generation += 1;
        if state.entries.remove(graph_id).is_some() {
            debug!(graph_id, "Invalidated cached graph");
        }
    }

    pub fn len(&self) -> usize {
        self.read().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Return the cached snapshot or load it from `store` and remember it
    pub fn get_or_load(&self, store: &dyn GraphStore, graph_id: &str) -> Result<Arc<LoadedGraph>> {
        let generation = {
            let state = self.read();
            if let Some(graph) = state.entries.get(graph_id) {
                return Ok(graph.clone());
            }
            state.generation
        };

        let graph = Arc::new(store.load_graph(graph_id)?);

        let mut state = self.write();
        if state.generation == generation {
            debug!(graph_id, nodes = graph.node_count(), "Cached graph snapshot");
            state.entries.insert(graph_id.to_string(), graph.clone());
        } else {
            debug!(graph_id, "Graph changed while loading, snapshot not cached");
        }
        Ok(graph)
    }
}
