use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Open-ended key/value bag carried alongside typed fields
pub type PropertyMap = BTreeMap<String, Value>;

/// Unique identifier for a node within a graph
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub String);

impl NodeId {
    pub fn new(id: &str) -> Self {
        NodeId(id.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn for_document(document_id: &str) -> Self {
        NodeId(format!("node_doc_{}", document_id))
    }

    pub fn for_entity(entity_id: &str) -> Self {
        NodeId(format!("node_entity_{}", entity_id))
    }

    pub fn for_concept(concept_id: &str) -> Self {
        NodeId(format!("node_concept_{}", concept_id))
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Closed set of node kinds
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum NodeType {
    Entity,
    Concept,
    Document,
    Chunk,
    Topic,
}

impl NodeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeType::Entity => "entity",
            NodeType::Concept => "concept",
            NodeType::Document => "document",
            NodeType::Chunk => "chunk",
            NodeType::Topic => "topic",
        }
    }
}

impl fmt::Display for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NodeType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "entity" => Ok(NodeType::Entity),
            "concept" => Ok(NodeType::Concept),
            "document" => Ok(NodeType::Document),
            "chunk" => Ok(NodeType::Chunk),
            "topic" => Ok(NodeType::Topic),
            other => Err(format!("unknown node type '{}'", other)),
        }
    }
}

/// Type-specific node properties.
///
/// Well-known fields are typed per node kind; anything else the source record
/// carried lands in `extra` so it survives a store round-trip.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum NodeProperties {
    Entity {
        frequency: f64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        entity_type: Option<String>,
        #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
        extra: PropertyMap,
    },
    Concept {
        relevance: f64,
        #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
        extra: PropertyMap,
    },
    Document {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        title: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        content_type: Option<String>,
        #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
        extra: PropertyMap,
    },
    Generic {
        #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
        extra: PropertyMap,
    },
}

impl Default for NodeProperties {
    fn default() -> Self {
        NodeProperties::Generic {
            extra: PropertyMap::new(),
        }
    }
}

impl NodeProperties {
    pub fn frequency(&self) -> Option<f64> {
        match self {
            NodeProperties::Entity { frequency, .. } => Some(*frequency),
            _ => None,
        }
    }

    pub fn relevance(&self) -> Option<f64> {
        match self {
            NodeProperties::Concept { relevance, .. } => Some(*relevance),
            _ => None,
        }
    }

    pub fn content_type(&self) -> Option<&str> {
        match self {
            NodeProperties::Document { content_type, .. } => content_type.as_deref(),
            _ => None,
        }
    }

    pub fn extra(&self) -> &PropertyMap {
        match self {
            NodeProperties::Entity { extra, .. }
            | NodeProperties::Concept { extra, .. }
            | NodeProperties::Document { extra, .. }
            | NodeProperties::Generic { extra } => extra,
        }
    }
}

/// A vertex in a knowledge graph
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct KnowledgeNode {
    pub id: NodeId,
    pub label: String,
    pub node_type: NodeType,
    #[serde(default)]
    pub properties: NodeProperties,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<PropertyMap>,
}

impl KnowledgeNode {
    pub fn new(id: NodeId, label: String, node_type: NodeType, properties: NodeProperties) -> Self {
        Self {
            id,
            label,
            node_type,
            properties,
            metadata: None,
        }
    }
}
