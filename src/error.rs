use thiserror::Error;

/// Result alias used across the library
pub type Result<T> = std::result::Result<T, GraphError>;

/// Errors surfaced by graph construction, loading and querying
#[derive(Debug, Error)]
pub enum GraphError {
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    #[error("Extraction failed: {0}")]
    ExtractionFailure(String),

    #[error("Persistence failed: {0}")]
    PersistenceFailure(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl GraphError {
    pub fn graph_not_found(id: &str) -> Self {
        GraphError::NotFound {
            kind: "Graph",
            id: id.to_string(),
        }
    }

    pub fn node_not_found(id: &str) -> Self {
        GraphError::NotFound {
            kind: "Node",
            id: id.to_string(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, GraphError::NotFound { .. })
    }
}

impl From<rusqlite::Error> for GraphError {
    fn from(err: rusqlite::Error) -> Self {
        GraphError::PersistenceFailure(err.to_string())
    }
}

impl From<serde_json::Error> for GraphError {
    fn from(err: serde_json::Error) -> Self {
        GraphError::PersistenceFailure(format!("Record encoding: {}", err))
    }
}
