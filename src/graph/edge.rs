use serde::{Deserialize, Serialize};
use std::fmt;

use super::node::{NodeId, PropertyMap};

/// Unique identifier for an edge within a graph
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EdgeId(pub String);

impl EdgeId {
    pub fn new(id: &str) -> Self {
        EdgeId(id.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EdgeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Edge label from an open vocabulary
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(from = "String", into = "String")]
pub enum EdgeLabel {
    AppearsIn, // entity occurs in a document
    RelatedTo, // concept-to-document, or between related mentions
    Other(String),
}

impl EdgeLabel {
    pub fn as_str(&self) -> &str {
        match self {
            EdgeLabel::AppearsIn => "APPEARS_IN",
            EdgeLabel::RelatedTo => "RELATED_TO",
            EdgeLabel::Other(name) => name,
        }
    }
}

impl fmt::Display for EdgeLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&str> for EdgeLabel {
    fn from(label: &str) -> Self {
        match label {
            "APPEARS_IN" => EdgeLabel::AppearsIn,
            "RELATED_TO" => EdgeLabel::RelatedTo,
            other => EdgeLabel::Other(other.to_string()),
        }
    }
}

impl From<String> for EdgeLabel {
    fn from(label: String) -> Self {
        EdgeLabel::from(label.as_str())
    }
}

impl From<EdgeLabel> for String {
    fn from(label: EdgeLabel) -> Self {
        label.as_str().to_string()
    }
}

/// Directed, weighted, labeled relationship between two nodes.
///
/// Stored as a source/target pair but navigable from either endpoint by the
/// query engines.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct KnowledgeEdge {
    pub id: EdgeId,
    pub source_id: NodeId,
    pub target_id: NodeId,
    pub label: EdgeLabel,
    pub weight: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub properties: Option<PropertyMap>,
}

impl KnowledgeEdge {
    pub fn new(source_id: NodeId, target_id: NodeId, label: EdgeLabel, weight: f64) -> Self {
        Self {
            id: Self::generate_id(&source_id, &target_id, &label),
            source_id,
            target_id,
            label,
            weight,
            properties: None,
        }
    }

    /// Generate a deterministic edge ID from source, target, and label
    pub fn generate_id(source_id: &NodeId, target_id: &NodeId, label: &EdgeLabel) -> EdgeId {
        EdgeId(format!(
            "{}->{}::{}",
            source_id.as_str(),
            target_id.as_str(),
            label.as_str()
        ))
    }

    /// The endpoint opposite `node`, if the edge touches it
    pub fn other_end(&self, node: &NodeId) -> Option<&NodeId> {
        if &self.source_id == node {
            Some(&self.target_id)
        } else if &self.target_id == node {
            Some(&self.source_id)
        } else {
            None
        }
    }

    pub fn connects(&self, a: &NodeId, b: &NodeId) -> bool {
        (&self.source_id == a && &self.target_id == b)
            || (&self.source_id == b && &self.target_id == a)
    }
}
