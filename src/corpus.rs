//! In-memory knowledge bases with pre-extracted mentions.
//!
//! `MemoryCorpus` implements both [`DocumentSource`] and [`Extractor`], so a
//! JSON corpus file is enough to drive the builder from the command line.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::RwLock;

use crate::error::{GraphError, Result};
use crate::extract::{ConceptMention, Document, DocumentSource, EntityMention, Extractor};

/// Documents of one knowledge base together with their extracted mentions
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct KnowledgeBase {
    #[serde(default)]
    pub documents: Vec<Document>,
    #[serde(default)]
    pub entities: Vec<EntityMention>,
    #[serde(default)]
    pub concepts: Vec<ConceptMention>,
}

/// On-disk layout of a corpus file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CorpusFile {
    #[serde(default)]
    pub knowledge_bases: BTreeMap<String, KnowledgeBase>,
}

#[derive(Debug, Default)]
pub struct MemoryCorpus {
    knowledge_bases: RwLock<BTreeMap<String, KnowledgeBase>>,
    fail_extraction: AtomicBool,
}

impl MemoryCorpus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_corpus_file(file: CorpusFile) -> Self {
        Self {
            knowledge_bases: RwLock::new(file.knowledge_bases),
            fail_extraction: AtomicBool::new(false),
        }
    }

    /// Load a corpus from a JSON file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            GraphError::InvalidInput(format!("cannot read corpus {}: {}", path.display(), e))
        })?;
        let file: CorpusFile = serde_json::from_str(&content).map_err(|e| {
            GraphError::InvalidInput(format!("malformed corpus {}: {}", path.display(), e))
        })?;
        Ok(Self::from_corpus_file(file))
    }

    pub fn insert_knowledge_base(&self, id: &str, knowledge_base: KnowledgeBase) {
        self.write().insert(id.to_string(), knowledge_base);
    }

    /// Add a document, replacing any document with the same id
    pub fn upsert_document(&self, knowledge_base_id: &str, document: Document) {
        let mut kbs = self.write();
        let kb = kbs.entry(knowledge_base_id.to_string()).or_default();
        match kb.documents.iter_mut().find(|d| d.id == document.id) {
            Some(existing) => *existing = document,
            None => kb.documents.push(document),
        }
    }

    /// Remove a document; returns false if it was not present
    pub fn remove_document(&self, knowledge_base_id: &str, document_id: &str) -> bool {
        let mut kbs = self.write();
        let Some(kb) = kbs.get_mut(knowledge_base_id) else {
            return false;
        };
        let before = kb.documents.len();
        kb.documents.retain(|d| d.id != document_id);
        kb.documents.len() != before
    }

    pub fn set_entities(&self, knowledge_base_id: &str, entities: Vec<EntityMention>) {
        self.write()
            .entry(knowledge_base_id.to_string())
            .or_default()
            .entities = entities;
    }

    pub fn set_concepts(&self, knowledge_base_id: &str, concepts: Vec<ConceptMention>) {
        self.write()
            .entry(knowledge_base_id.to_string())
            .or_default()
            .concepts = concepts;
    }

    /// Make subsequent extraction calls fail, simulating an unavailable extractor
    pub fn set_extraction_failure(&self, fail: bool) {
        self.fail_extraction.store(fail, Ordering::SeqCst);
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, BTreeMap<String, KnowledgeBase>> {
        self.knowledge_bases
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, BTreeMap<String, KnowledgeBase>> {
        self.knowledge_bases
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn check_available(&self) -> Result<()> {
        if self.fail_extraction.load(Ordering::SeqCst) {
            return Err(GraphError::ExtractionFailure(
                "extractor unavailable".to_string(),
            ));
        }
        Ok(())
    }
}

/// Restrict `document_ids` to the requested documents; `None` if nothing remains
fn restrict(document_ids: &[String], requested: &HashSet<&str>) -> Option<Vec<String>> {
    let kept: Vec<String> = document_ids
        .iter()
        .filter(|id| requested.contains(id.as_str()))
        .cloned()
        .collect();
    (!kept.is_empty()).then_some(kept)
}

#[async_trait]
impl DocumentSource for MemoryCorpus {
    async fn list_documents(&self, knowledge_base_id: &str) -> Result<Vec<Document>> {
        Ok(self
            .read()
            .get(knowledge_base_id)
            .map(|kb| kb.documents.clone())
            .unwrap_or_default())
    }
}

#[async_trait]
impl Extractor for MemoryCorpus {
    async fn extract_entities(
        &self,
        knowledge_base_id: &str,
        documents: &[Document],
    ) -> Result<Vec<EntityMention>> {
        self.check_available()?;
        let requested: HashSet<&str> = documents.iter().map(|d| d.id.as_str()).collect();

        let kbs = self.read();
        let Some(kb) = kbs.get(knowledge_base_id) else {
            return Ok(Vec::new());
        };
        let mentions = kb
            .entities
            .iter()
            .filter_map(|entity| {
                restrict(&entity.document_ids, &requested).map(|document_ids| EntityMention {
                    document_ids,
                    ..entity.clone()
                })
            })
            .collect();
        Ok(mentions)
    }

    async fn extract_concepts(
        &self,
        knowledge_base_id: &str,
        documents: &[Document],
    ) -> Result<Vec<ConceptMention>> {
        self.check_available()?;
        let requested: HashSet<&str> = documents.iter().map(|d| d.id.as_str()).collect();

        let kbs = self.read();
        let Some(kb) = kbs.get(knowledge_base_id) else {
            return Ok(Vec::new());
        };
        let mentions = kb
            .concepts
            .iter()
            .filter_map(|concept| {
                restrict(&concept.document_ids, &requested).map(|document_ids| ConceptMention {
                    document_ids,
                    ..concept.clone()
                })
            })
            .collect();
        Ok(mentions)
    }
}
