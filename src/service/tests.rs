use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::mpsc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::*;
use crate::corpus::MemoryCorpus;
use crate::db::Database;
use crate::extract::{ConceptMention, Document, EntityMention};
use crate::graph::{EdgeLabel, GraphMetadata, KnowledgeEdge, KnowledgeNode};
use crate::query::path_cost;

fn entity(id: &str, frequency: f64, docs: &[&str]) -> EntityMention {
    EntityMention {
        id: id.to_string(),
        name: format!("Entity {}", id),
        entity_type: None,
        frequency,
        document_ids: docs.iter().map(|s| s.to_string()).collect(),
        related_entity_ids: vec![],
    }
}

fn concept(id: &str, relevance: f64, docs: &[&str]) -> ConceptMention {
    ConceptMention {
        id: id.to_string(),
        name: format!("Concept {}", id),
        relevance,
        document_ids: docs.iter().map(|s| s.to_string()).collect(),
        related_concept_ids: vec![],
    }
}

/// Three documents; E1 appears in 1 and 2, C1 relates to all three
fn three_document_corpus() -> Arc<MemoryCorpus> {
    let corpus = MemoryCorpus::new();
    for id in ["1", "2", "3"] {
        corpus.upsert_document("kb", Document::new(id, &format!("Document {}", id)));
    }
    corpus.set_entities("kb", vec![entity("E1", 0.8, &["1", "2"])]);
    corpus.set_concepts("kb", vec![concept("C1", 0.9, &["1", "2", "3"])]);
    Arc::new(corpus)
}

fn service_with(corpus: Arc<MemoryCorpus>, config: &Config) -> GraphService {
    let store = Arc::new(Database::in_memory().unwrap());
    GraphService::new(corpus.clone(), corpus, store, config)
}

fn service(corpus: Arc<MemoryCorpus>) -> GraphService {
    service_with(corpus, &Config::default())
}

fn ids(subgraph: &Subgraph) -> Vec<&str> {
    subgraph.nodes.iter().map(|n| n.id.as_str()).collect()
}

#[tokio::test]
async fn test_three_document_scenario_end_to_end() {
    let service = service(three_document_corpus());
    let graph = service
        .create_graph("kb", "Research", Some("three papers".to_string()))
        .await
        .unwrap();

    assert_eq!(graph.metadata.node_count, 5);
    assert_eq!(graph.metadata.edge_count, 5);
    assert_eq!(graph.metadata.document_count, 3);
    assert_eq!(graph.metadata.entity_count, 1);
    assert_eq!(graph.metadata.concept_count, 1);
    assert_eq!(graph.knowledge_base_id.as_deref(), Some("kb"));

    let path = service
        .find_shortest_path(&graph.id, &NodeId::for_document("1"), &NodeId::for_document("3"))
        .unwrap();
    assert_eq!(ids(&path), vec!["node_doc_1", "node_concept_C1", "node_doc_3"]);
    assert!(path.edges.iter().all(|e| e.label == EdgeLabel::RelatedTo));
    assert!((path_cost(&path) - 2.0 / 0.9).abs() < 1e-9);

    let around_entity = service
        .query_neighborhood(&graph.id, &NeighborhoodSpec::starting_at(&["node_entity_E1"]))
        .unwrap();
    assert_eq!(
        ids(&around_entity),
        vec!["node_entity_E1", "node_doc_1", "node_doc_2", "node_concept_C1"]
    );
    assert_eq!(around_entity.edges.len(), 4);
}

#[tokio::test]
async fn test_rebuild_is_idempotent() {
    let service = service(three_document_corpus());
    let graph = service.create_graph("kb", "Research", None).await.unwrap();
    let first = service.load(&graph.id).unwrap();

    let outcome = service.rebuild_graph(&graph.id).await.unwrap();
    let second = service.load(&graph.id).unwrap();

    assert_eq!(outcome.metadata, first.graph.metadata);
    assert_eq!(first.nodes(), second.nodes());
    assert_eq!(first.edges(), second.edges());
}

#[tokio::test]
async fn test_rebuild_replaces_previous_contents() {
    let corpus = three_document_corpus();
    let service = service(corpus.clone());
    let graph = service.create_graph("kb", "Research", None).await.unwrap();

    // Warm the cache so the rebuild has something to invalidate
    let before = service
        .query_neighborhood(&graph.id, &NeighborhoodSpec::default())
        .unwrap();
    assert_eq!(before.nodes.len(), 5);

    assert!(corpus.remove_document("kb", "3"));
    let outcome = service.rebuild_graph(&graph.id).await.unwrap();
    assert_eq!(outcome.metadata.document_count, 2);
    assert_eq!(outcome.metadata.edge_count, 4);

    let after = service
        .query_neighborhood(&graph.id, &NeighborhoodSpec::default())
        .unwrap();
    assert_eq!(after.nodes.len(), 4);
    assert!(!ids(&after).contains(&"node_doc_3"));
    assert_eq!(service.get_graph(&graph.id).unwrap().metadata.node_count, 4);
}

#[tokio::test]
async fn test_service_without_cache() {
    let mut config = Config::default();
    config.service.cache_enabled = false;
    let service = service_with(three_document_corpus(), &config);
    assert!(service.cache().is_none());

    let graph = service.create_graph("kb", "Research", None).await.unwrap();
    let result = service
        .query_neighborhood(&graph.id, &NeighborhoodSpec::starting_at(&["node_doc_3"]))
        .unwrap();
    assert_eq!(ids(&result)[0], "node_doc_3");
}

#[tokio::test]
async fn test_unknown_graph_is_not_found() {
    let service = service(three_document_corpus());
    assert!(service.get_graph("nope").unwrap_err().is_not_found());
    assert!(service.rebuild_graph("nope").await.unwrap_err().is_not_found());
    assert!(service
        .query_neighborhood("nope", &NeighborhoodSpec::default())
        .unwrap_err()
        .is_not_found());
    assert!(service
        .find_shortest_path("nope", &NodeId::new("a"), &NodeId::new("b"))
        .unwrap_err()
        .is_not_found());
}

#[tokio::test]
async fn test_unknown_path_endpoint_is_not_found() {
    let service = service(three_document_corpus());
    let graph = service.create_graph("kb", "Research", None).await.unwrap();
    let err = service
        .find_shortest_path(&graph.id, &NodeId::for_document("1"), &NodeId::new("missing"))
        .unwrap_err();
    assert!(matches!(err, GraphError::NotFound { kind: "Node", .. }));
}

#[tokio::test]
async fn test_create_rejects_blank_input() {
    let service = service(three_document_corpus());
    let err = service.create_graph("kb", "  ", None).await.unwrap_err();
    assert!(matches!(err, GraphError::InvalidInput(_)));
    let err = service.create_graph("", "Name", None).await.unwrap_err();
    assert!(matches!(err, GraphError::InvalidInput(_)));
    assert!(service.list_graphs().unwrap().is_empty());
}

#[tokio::test]
async fn test_failed_creation_keeps_empty_graph_for_rebuild() {
    let corpus = three_document_corpus();
    let service = service(corpus.clone());

    corpus.set_extraction_failure(true);
    let err = service.create_graph("kb", "Research", None).await.unwrap_err();
    assert!(matches!(err, GraphError::ExtractionFailure(_)));

    let graphs = service.list_graphs().unwrap();
    assert_eq!(graphs.len(), 1);
    assert_eq!(graphs[0].metadata.node_count, 0);

    corpus.set_extraction_failure(false);
    let outcome = service.rebuild_graph(&graphs[0].id).await.unwrap();
    assert_eq!(outcome.metadata.node_count, 5);
}

#[tokio::test]
async fn test_delete_graph() {
    let service = service(three_document_corpus());
    let graph = service.create_graph("kb", "Research", None).await.unwrap();
    service.load(&graph.id).unwrap();

    service.delete_graph(&graph.id).await.unwrap();
    assert!(service.get_graph(&graph.id).unwrap_err().is_not_found());
    assert!(service.load(&graph.id).unwrap_err().is_not_found());
    assert!(service.delete_graph(&graph.id).await.unwrap_err().is_not_found());
}

#[tokio::test]
async fn test_build_locks_are_released() {
    let service = service(three_document_corpus());
    let graph = service.create_graph("kb", "Research", None).await.unwrap();
    assert_eq!(service.tracked_build_locks(), 0);

    service.rebuild_graph(&graph.id).await.unwrap();
    service.delete_graph(&graph.id).await.unwrap();
    assert!(service.delete_graph(&graph.id).await.is_err());
    assert!(service.rebuild_graph(&graph.id).await.is_err());
    assert_eq!(service.tracked_build_locks(), 0);
}

#[tokio::test]
async fn test_graph_uses_only_its_knowledge_base() {
    let corpus = MemoryCorpus::new();
    corpus.upsert_document("kb-a", Document::new("d1", "Shared id in A"));
    corpus.upsert_document("kb-b", Document::new("d1", "Shared id in B"));
    corpus.set_entities("kb-b", vec![entity("ONLY_IN_B", 0.7, &["d1"])]);
    corpus.set_concepts("kb-b", vec![concept("C_B", 0.6, &["d1"])]);
    let service = service(Arc::new(corpus));

    let graph = service.create_graph("kb-a", "A", None).await.unwrap();
    assert_eq!(graph.metadata.node_count, 1);
    assert_eq!(graph.metadata.entity_count, 0);
    assert_eq!(graph.metadata.concept_count, 0);

    let all = service
        .query_neighborhood(&graph.id, &NeighborhoodSpec::default())
        .unwrap();
    assert_eq!(ids(&all), vec!["node_doc_d1"]);
    assert!(all.edges.is_empty());
}

#[tokio::test]
async fn test_non_finite_scores_are_queryable() {
    let corpus = MemoryCorpus::new();
    for id in ["1", "2"] {
        corpus.upsert_document("kb", Document::new(id, &format!("Document {}", id)));
    }
    corpus.set_entities("kb", vec![entity("E1", f64::NAN, &["1", "2"])]);
    corpus.set_concepts("kb", vec![concept("C1", f64::NEG_INFINITY, &["2"])]);
    let service = service(Arc::new(corpus));

    let graph = service.create_graph("kb", "Research", None).await.unwrap();
    assert_eq!(graph.metadata.node_count, 4);

    let around = service
        .query_neighborhood(&graph.id, &NeighborhoodSpec::starting_at(&["node_entity_E1"]))
        .unwrap();
    assert_eq!(around.nodes[0].id.as_str(), "node_entity_E1");
    assert!(around.edges.iter().all(|e| e.weight.is_finite() && e.weight > 0.0));

    let path = service
        .find_shortest_path(&graph.id, &NodeId::for_document("1"), &NodeId::new("node_concept_C1"))
        .unwrap();
    assert_eq!(ids(&path), vec!["node_doc_1", "node_entity_E1", "node_doc_2", "node_concept_C1"]);
}

#[tokio::test]
async fn test_list_graphs() {
    let service = service(three_document_corpus());
    let a = service.create_graph("kb", "First", None).await.unwrap();
    let b = service.create_graph("kb", "Second", None).await.unwrap();

    let mut listed: Vec<String> = service.list_graphs().unwrap().into_iter().map(|g| g.id).collect();
    listed.sort();
    let mut expected = vec![a.id, b.id];
    expected.sort();
    assert_eq!(listed, expected);
}

/// Extractor that records how many extraction calls overlap
struct SlowExtractor {
    inner: Arc<MemoryCorpus>,
    delay: Duration,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl SlowExtractor {
    fn new(inner: Arc<MemoryCorpus>, delay: Duration) -> Self {
        Self {
            inner,
            delay,
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    async fn track<T>(&self, work: impl std::future::Future<Output = T>) -> T {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        let result = work.await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }
}

#[async_trait]
impl Extractor for SlowExtractor {
    async fn extract_entities(
        &self,
        knowledge_base_id: &str,
        documents: &[Document],
    ) -> crate::Result<Vec<EntityMention>> {
        self.track(self.inner.extract_entities(knowledge_base_id, documents))
            .await
    }

    async fn extract_concepts(
        &self,
        knowledge_base_id: &str,
        documents: &[Document],
    ) -> crate::Result<Vec<ConceptMention>> {
        self.track(self.inner.extract_concepts(knowledge_base_id, documents))
            .await
    }
}

fn slow_service(delay: Duration, config: &Config) -> (GraphService, Arc<SlowExtractor>) {
    let corpus = three_document_corpus();
    let extractor = Arc::new(SlowExtractor::new(corpus.clone(), delay));
    let store = Arc::new(Database::in_memory().unwrap());
    let service = GraphService::new(corpus, extractor.clone(), store, config);
    (service, extractor)
}

#[tokio::test]
async fn test_builds_of_same_graph_are_serialized() {
    let (service, extractor) = slow_service(Duration::from_millis(20), &Config::default());
    let graph = service.create_graph("kb", "Research", None).await.unwrap();
    extractor.max_in_flight.store(0, Ordering::SeqCst);

    let (first, second) = tokio::join!(
        service.rebuild_graph(&graph.id),
        service.rebuild_graph(&graph.id)
    );
    assert_eq!(first.unwrap().metadata, second.unwrap().metadata);
    assert_eq!(extractor.max_in_flight.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_builds_of_different_graphs_overlap() {
    let (service, extractor) = slow_service(Duration::from_millis(20), &Config::default());
    let a = service.create_graph("kb", "A", None).await.unwrap();
    let b = service.create_graph("kb", "B", None).await.unwrap();
    extractor.max_in_flight.store(0, Ordering::SeqCst);

    let (first, second) = tokio::join!(service.rebuild_graph(&a.id), service.rebuild_graph(&b.id));
    first.unwrap();
    second.unwrap();
    assert_eq!(extractor.max_in_flight.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_extraction_timeout_fails_build() {
    let mut config = Config::default();
    config.service.extraction_timeout_secs = 1;
    let (service, _extractor) = slow_service(Duration::from_secs(5), &config);

    let err = service.create_graph("kb", "Research", None).await.unwrap_err();
    assert!(matches!(err, GraphError::ExtractionFailure(_)));
    assert_eq!(service.list_graphs().unwrap()[0].metadata.edge_count, 0);
}

/// Store whose next `load_graph` pauses after reading its snapshot until
/// the test lets it continue
struct PausingStore {
    inner: Database,
    armed: AtomicBool,
    loaded: Mutex<mpsc::Sender<()>>,
    resume: Mutex<mpsc::Receiver<()>>,
}

impl GraphStore for PausingStore {
    fn insert_graph(&self, graph: &KnowledgeGraph) -> crate::Result<()> {
        self.inner.insert_graph(graph)
    }

    fn get_graph(&self, graph_id: &str) -> crate::Result<Option<KnowledgeGraph>> {
        self.inner.get_graph(graph_id)
    }

    fn list_graphs(&self) -> crate::Result<Vec<KnowledgeGraph>> {
        self.inner.list_graphs()
    }

    fn replace_contents(
        &self,
        graph_id: &str,
        nodes: &[KnowledgeNode],
        edges: &[KnowledgeEdge],
        metadata: &GraphMetadata,
        updated_at: DateTime<Utc>,
    ) -> crate::Result<()> {
        self.inner
            .replace_contents(graph_id, nodes, edges, metadata, updated_at)
    }

    fn load_graph(&self, graph_id: &str) -> crate::Result<LoadedGraph> {
        let snapshot = self.inner.load_graph(graph_id)?;
        if self.armed.swap(false, Ordering::SeqCst) {
            self.loaded.lock().unwrap().send(()).unwrap();
            self.resume.lock().unwrap().recv().unwrap();
        }
        Ok(snapshot)
    }

    fn delete_graph(&self, graph_id: &str) -> crate::Result<bool> {
        self.inner.delete_graph(graph_id)
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_query_during_rebuild_does_not_cache_old_snapshot() {
    let corpus = three_document_corpus();
    let (loaded_tx, loaded_rx) = mpsc::channel();
    let (resume_tx, resume_rx) = mpsc::channel();
    let store = Arc::new(PausingStore {
        inner: Database::in_memory().unwrap(),
        armed: AtomicBool::new(false),
        loaded: Mutex::new(loaded_tx),
        resume: Mutex::new(resume_rx),
    });
    let service = Arc::new(GraphService::new(
        corpus.clone(),
        corpus.clone(),
        store.clone(),
        &Config::default(),
    ));
    let graph = service.create_graph("kb", "Research", None).await.unwrap();

    store.armed.store(true, Ordering::SeqCst);
    let reader = {
        let service = service.clone();
        let graph_id = graph.id.clone();
        tokio::task::spawn_blocking(move || {
            service.query_neighborhood(&graph_id, &NeighborhoodSpec::default())
        })
    };
    loaded_rx.recv_timeout(Duration::from_secs(5)).unwrap();

    // The rebuild commits while the reader still holds the old snapshot
    assert!(corpus.remove_document("kb", "3"));
    service.rebuild_graph(&graph.id).await.unwrap();
    resume_tx.send(()).unwrap();

    let stale = reader.await.unwrap().unwrap();
    assert_eq!(stale.nodes.len(), 5);

    let fresh = service
        .query_neighborhood(&graph.id, &NeighborhoodSpec::default())
        .unwrap();
    assert_eq!(fresh.nodes.len(), 4);
    assert!(!ids(&fresh).contains(&"node_doc_3"));
}
