//! Collaborators consumed by the graph builder: the document source that lists
//! a knowledge base's documents and the extractor that yields entity and
//! concept mentions for them.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::graph::PropertyMap;

/// Source-side metadata of a document
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DocumentMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    #[serde(flatten)]
    pub extra: PropertyMap,
}

/// A document belonging to a knowledge base
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Document {
    pub id: String,
    #[serde(default)]
    pub metadata: DocumentMetadata,
}

impl Document {
    pub fn new(id: &str, title: &str) -> Self {
        Self {
            id: id.to_string(),
            metadata: DocumentMetadata {
                title: Some(title.to_string()),
                ..Default::default()
            },
        }
    }

    /// Title if present, otherwise the id
    pub fn display_name(&self) -> &str {
        self.metadata.title.as_deref().unwrap_or(&self.id)
    }
}

/// A named real-world mention found in one or more documents
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EntityMention {
    pub id: String,
    pub name: String,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub entity_type: Option<String>,
    pub frequency: f64,
    #[serde(default)]
    pub document_ids: Vec<String>,
    #[serde(default)]
    pub related_entity_ids: Vec<String>,
}

/// A thematic mention found in one or more documents
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ConceptMention {
    pub id: String,
    pub name: String,
    pub relevance: f64,
    #[serde(default)]
    pub document_ids: Vec<String>,
    #[serde(default)]
    pub related_concept_ids: Vec<String>,
}

/// Lists the documents of a knowledge base
#[async_trait]
pub trait DocumentSource: Send + Sync {
    /// Documents of `knowledge_base_id`; an unknown knowledge base yields an empty list
    async fn list_documents(&self, knowledge_base_id: &str) -> Result<Vec<Document>>;
}

/// Extracts entity and concept mentions from documents.
///
/// `knowledge_base_id` names the knowledge base the documents were listed
/// from; document ids are only unique within it.
#[async_trait]
pub trait Extractor: Send + Sync {
    async fn extract_entities(
        &self,
        knowledge_base_id: &str,
        documents: &[Document],
    ) -> Result<Vec<EntityMention>>;

    async fn extract_concepts(
        &self,
        knowledge_base_id: &str,
        documents: &[Document],
    ) -> Result<Vec<ConceptMention>>;
}
