//! Assembles a knowledge graph from a knowledge base's documents and the
//! extractor's entity/concept mentions, then persists it as one write.

use chrono::Utc;
use serde_json::Value;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::config::BuildConfig;
use crate::db::GraphStore;
use crate::error::{GraphError, Result};
use crate::extract::{ConceptMention, Document, DocumentSource, EntityMention, Extractor};
use crate::graph::{
    EdgeLabel, GraphMetadata, KnowledgeEdge, KnowledgeNode, NodeId, NodeProperties, NodeType,
    PropertyMap,
};

/// Node and edge set produced by one build pass
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GraphContents {
    pub nodes: Vec<KnowledgeNode>,
    pub edges: Vec<KnowledgeEdge>,
}

/// Result of a successful build
#[derive(Debug, Clone, PartialEq)]
pub struct BuildOutcome {
    pub graph_id: String,
    pub metadata: GraphMetadata,
}

pub struct GraphBuilder {
    source: Arc<dyn DocumentSource>,
    extractor: Arc<dyn Extractor>,
    store: Arc<dyn GraphStore>,
    config: BuildConfig,
    extraction_timeout: Option<Duration>,
}

impl GraphBuilder {
    pub fn new(
        source: Arc<dyn DocumentSource>,
        extractor: Arc<dyn Extractor>,
        store: Arc<dyn GraphStore>,
        config: BuildConfig,
    ) -> Self {
        Self {
            source,
            extractor,
            store,
            config,
            extraction_timeout: None,
        }
    }

    /// Bound document fetch plus extraction; exceeding it fails the build
    pub fn with_extraction_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.extraction_timeout = timeout;
        self
    }

    /// Build `graph_id` from the documents of `knowledge_base_id`, replacing
    /// whatever the graph held before.
    pub async fn build(&self, knowledge_base_id: &str, graph_id: &str) -> Result<BuildOutcome> {
        let start_time = Instant::now();
        info!(knowledge_base_id, graph_id, "Building knowledge graph");

        let graph = self
            .store
            .get_graph(graph_id)?
            .ok_or_else(|| GraphError::graph_not_found(graph_id))?;

        let (documents, entities, concepts) = self.collect(knowledge_base_id).await?;
        let contents = self.assemble(&documents, &entities, &concepts);
        let metadata = GraphMetadata::from_contents(&contents.nodes, &contents.edges, &graph.metadata);

        self.store.replace_contents(
            graph_id,
            &contents.nodes,
            &contents.edges,
            &metadata,
            Utc::now(),
        )?;

        info!(
            graph_id,
            nodes = metadata.node_count,
            edges = metadata.edge_count,
            documents = metadata.document_count,
            entities = metadata.entity_count,
            concepts = metadata.concept_count,
            "Build complete in {:.2?}",
            start_time.elapsed()
        );

        Ok(BuildOutcome {
            graph_id: graph_id.to_string(),
            metadata,
        })
    }

    async fn collect(
        &self,
        knowledge_base_id: &str,
    ) -> Result<(Vec<Document>, Vec<EntityMention>, Vec<ConceptMention>)> {
        let fetch = async {
            let documents = self.source.list_documents(knowledge_base_id).await?;
            if documents.is_empty() {
                info!(knowledge_base_id, "Knowledge base is empty or unknown, building empty graph");
                return Ok((documents, Vec::new(), Vec::new()));
            }
            let entities = self.extractor.extract_entities(knowledge_base_id, &documents).await?;
            let concepts = self.extractor.extract_concepts(knowledge_base_id, &documents).await?;
            Ok::<_, GraphError>((documents, entities, concepts))
        };

        match self.extraction_timeout {
            Some(limit) => tokio::time::timeout(limit, fetch).await.map_err(|_| {
                GraphError::ExtractionFailure(format!("extraction timed out after {:?}", limit))
            })?,
            None => fetch.await,
        }
    }

    /// Materialize nodes and edges. Pure: the same input always yields the
    /// same contents in the same order (documents, entities, concepts).
    pub fn assemble(
        &self,
        documents: &[Document],
        entities: &[EntityMention],
        concepts: &[ConceptMention],
    ) -> GraphContents {
        let mut contents = GraphContents::default();
        let mut node_ids: HashSet<NodeId> = HashSet::new();

        for document in documents {
            let node = document_node(document);
            if node_ids.insert(node.id.clone()) {
                contents.nodes.push(node);
            }
        }

        let mut kept_entities = Vec::new();
        for entity in entities {
            let id = NodeId::for_entity(&entity.id);
            if !node_ids.insert(id.clone()) {
                debug!(entity_id = %entity.id, "Duplicate entity mention ignored");
                continue;
            }
            contents.nodes.push(KnowledgeNode::new(
                id,
                entity.name.clone(),
                NodeType::Entity,
                NodeProperties::Entity {
                    frequency: self.finite_score(entity.frequency, &entity.id),
                    entity_type: entity.entity_type.clone(),
                    extra: PropertyMap::new(),
                },
            ));
            kept_entities.push(entity);
        }

        let mut kept_concepts = Vec::new();
        for concept in concepts {
            let id = NodeId::for_concept(&concept.id);
            if !node_ids.insert(id.clone()) {
                debug!(concept_id = %concept.id, "Duplicate concept mention ignored");
                continue;
            }
            contents.nodes.push(KnowledgeNode::new(
                id,
                concept.name.clone(),
                NodeType::Concept,
                NodeProperties::Concept {
                    relevance: self.finite_score(concept.relevance, &concept.id),
                    extra: PropertyMap::new(),
                },
            ));
            kept_concepts.push(concept);
        }

        for entity in &kept_entities {
            let weight = self.edge_weight(entity.frequency, &entity.id);
            self.link_to_documents(
                &mut contents.edges,
                &node_ids,
                NodeId::for_entity(&entity.id),
                &entity.document_ids,
                EdgeLabel::AppearsIn,
                weight,
            );
        }

        for concept in &kept_concepts {
            let weight = self.edge_weight(concept.relevance, &concept.id);
            self.link_to_documents(
                &mut contents.edges,
                &node_ids,
                NodeId::for_concept(&concept.id),
                &concept.document_ids,
                EdgeLabel::RelatedTo,
                weight,
            );
        }

        let entity_pairs = kept_entities
            .iter()
            .map(|e| (e.id.as_str(), e.related_entity_ids.as_slice()));
        self.link_related(&mut contents.edges, &node_ids, entity_pairs, NodeId::for_entity);

        let concept_pairs = kept_concepts
            .iter()
            .map(|c| (c.id.as_str(), c.related_concept_ids.as_slice()));
        self.link_related(&mut contents.edges, &node_ids, concept_pairs, NodeId::for_concept);

        contents
    }

    /// Scores are stored on nodes as JSON, which has no NaN or infinity
    fn finite_score(&self, score: f64, mention_id: &str) -> f64 {
        if score.is_finite() {
            score
        } else {
            warn!(
                mention_id,
                score,
                floor = self.config.min_edge_weight,
                "Non-finite score replaced by minimum edge weight"
            );
            self.config.min_edge_weight
        }
    }

    fn edge_weight(&self, score: f64, mention_id: &str) -> f64 {
        if score.is_finite() && score > 0.0 {
            score
        } else {
            warn!(
                mention_id,
                score,
                floor = self.config.min_edge_weight,
                "Non-positive score clamped to minimum edge weight"
            );
            self.config.min_edge_weight
        }
    }

    fn link_to_documents(
        &self,
        edges: &mut Vec<KnowledgeEdge>,
        node_ids: &HashSet<NodeId>,
        source: NodeId,
        document_ids: &[String],
        label: EdgeLabel,
        weight: f64,
    ) {
        let mut linked = HashSet::new();
        for document_id in document_ids {
            let target = NodeId::for_document(document_id);
            if !node_ids.contains(&target) {
                debug!(%source, document_id = %document_id, "Mention refers to unknown document");
                continue;
            }
            if linked.insert(target.clone()) {
                edges.push(KnowledgeEdge::new(source.clone(), target, label.clone(), weight));
            }
        }
    }

    /// One RELATED_TO edge per unordered pair; traversal treats it as symmetric
    fn link_related<'a>(
        &self,
        edges: &mut Vec<KnowledgeEdge>,
        node_ids: &HashSet<NodeId>,
        mentions: impl Iterator<Item = (&'a str, &'a [String])>,
        to_node: fn(&str) -> NodeId,
    ) {
        let mut seen: HashSet<(NodeId, NodeId)> = HashSet::new();

        for (mention_id, related_ids) in mentions {
            let source = to_node(mention_id);
            for related_id in related_ids {
                let target = to_node(related_id);
                if target == source {
                    continue;
                }
                if !node_ids.contains(&target) {
                    debug!(%source, related_id = %related_id, "Related mention not extracted");
                    continue;
                }
                let key = if source < target {
                    (source.clone(), target.clone())
                } else {
                    (target.clone(), source.clone())
                };
                if seen.insert(key) {
                    edges.push(KnowledgeEdge::new(
                        source.clone(),
                        target,
                        EdgeLabel::RelatedTo,
                        self.config.related_weight,
                    ));
                }
            }
        }
    }
}

fn document_node(document: &Document) -> KnowledgeNode {
    let mut metadata = document.metadata.extra.clone();
    if let Some(title) = &document.metadata.title {
        metadata.insert("title".to_string(), Value::from(title.as_str()));
    }
    if let Some(content_type) = &document.metadata.content_type {
        metadata.insert("contentType".to_string(), Value::from(content_type.as_str()));
    }

    let mut node = KnowledgeNode::new(
        NodeId::for_document(&document.id),
        document.display_name().to_string(),
        NodeType::Document,
        NodeProperties::Document {
            title: document.metadata.title.clone(),
            content_type: document.metadata.content_type.clone(),
            extra: PropertyMap::new(),
        },
    );
    node.metadata = (!metadata.is_empty()).then_some(metadata);
    node
}
