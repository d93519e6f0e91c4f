use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::error::{GraphError, Result};
use crate::graph::{
    EdgeId, EdgeLabel, GraphMetadata, KnowledgeEdge, KnowledgeGraph, KnowledgeNode, LoadedGraph,
    NodeId, NodeType, PropertyMap,
};

/// Database schema version - increment when schema changes
const CURRENT_SCHEMA_VERSION: i32 = 1;

/// Persistence for graph metadata, nodes and edges, keyed by graph id
pub trait GraphStore: Send + Sync {
    fn insert_graph(&self, graph: &KnowledgeGraph) -> Result<()>;

    fn get_graph(&self, graph_id: &str) -> Result<Option<KnowledgeGraph>>;

    fn list_graphs(&self) -> Result<Vec<KnowledgeGraph>>;

    /// Replace every node and edge of a graph and record its new metadata.
    ///
    /// All-or-nothing: on error the previous contents and metadata remain.
    fn replace_contents(
        &self,
        graph_id: &str,
        nodes: &[KnowledgeNode],
        edges: &[KnowledgeEdge],
        metadata: &GraphMetadata,
        updated_at: DateTime<Utc>,
    ) -> Result<()>;

    /// Read metadata, nodes and edges of a graph as one consistent snapshot
    fn load_graph(&self, graph_id: &str) -> Result<LoadedGraph>;

    /// Remove metadata, nodes and edges; returns false if the graph did not exist
    fn delete_graph(&self, graph_id: &str) -> Result<bool>;
}

/// SQLite-backed graph store
pub struct Database {
    conn: Arc<Mutex<Connection>>,
    db_path: String,
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("conn", &"SQLite Connection")
            .field("db_path", &self.db_path)
            .finish()
    }
}

impl Clone for Database {
    fn clone(&self) -> Self {
        Self {
            conn: self.conn.clone(),
            db_path: self.db_path.clone(),
        }
    }
}

impl Database {
    /// Open (or create) a database file, initializing the schema if needed
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(&path)?;
        let db_path = path.as_ref().to_string_lossy().to_string();
        Self::with_connection(conn, db_path)
    }

    /// Open a private in-memory database
    pub fn in_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?, ":memory:".to_string())
    }

    fn with_connection(conn: Connection, db_path: String) -> Result<Self> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
            db_path,
        };
        db.initialize_schema()?;
        Ok(db)
    }

    pub fn path(&self) -> &str {
        &self.db_path
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| GraphError::PersistenceFailure("connection lock poisoned".to_string()))
    }

    /// Initialize the database schema if needed
    fn initialize_schema(&self) -> Result<()> {
        let conn = self.conn()?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS schema_version (
                version INTEGER PRIMARY KEY
            )",
            [],
        )?;
        conn.execute(
            "INSERT INTO schema_version (version)
             SELECT 0 WHERE NOT EXISTS (SELECT 1 FROM schema_version)",
            [],
        )?;

        apply_migrations(&conn)
    }
}

/// Apply schema migrations as needed
fn apply_migrations(conn: &Connection) -> Result<()> {
    let version: i32 = conn.query_row("SELECT version FROM schema_version", [], |row| row.get(0))?;

    if version < 1 {
        conn.execute_batch(
            "CREATE TABLE knowledge_graphs (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                description TEXT,
                knowledge_base_id TEXT,
                metadata TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE TABLE knowledge_nodes (
                seq INTEGER PRIMARY KEY AUTOINCREMENT,
                graph_id TEXT NOT NULL,
                id TEXT NOT NULL,
                label TEXT NOT NULL,
                node_type TEXT NOT NULL,
                properties TEXT NOT NULL,
                metadata TEXT,
                UNIQUE(graph_id, id),
                FOREIGN KEY(graph_id) REFERENCES knowledge_graphs(id)
            );

            CREATE TABLE knowledge_edges (
                seq INTEGER PRIMARY KEY AUTOINCREMENT,
                graph_id TEXT NOT NULL,
                id TEXT NOT NULL,
                source_id TEXT NOT NULL,
                target_id TEXT NOT NULL,
                label TEXT NOT NULL,
                weight REAL NOT NULL CHECK (weight > 0),
                properties TEXT,
                UNIQUE(graph_id, id),
                FOREIGN KEY(graph_id, source_id) REFERENCES knowledge_nodes(graph_id, id),
                FOREIGN KEY(graph_id, target_id) REFERENCES knowledge_nodes(graph_id, id)
            );

            CREATE INDEX idx_node_graph ON knowledge_nodes(graph_id);
            CREATE INDEX idx_node_type ON knowledge_nodes(graph_id, node_type);
            CREATE INDEX idx_edge_graph ON knowledge_edges(graph_id);
            CREATE INDEX idx_edge_source ON knowledge_edges(graph_id, source_id);
            CREATE INDEX idx_edge_target ON knowledge_edges(graph_id, target_id);",
        )?;

        conn.execute(
            "UPDATE schema_version SET version = ?",
            params![CURRENT_SCHEMA_VERSION],
        )?;
    }

    Ok(())
}

fn parse_timestamp(value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| GraphError::PersistenceFailure(format!("bad timestamp '{}': {}", value, e)))
}

fn encode_map(map: Option<&PropertyMap>) -> Result<Option<String>> {
    match map {
        Some(map) => Ok(Some(serde_json::to_string(map)?)),
        None => Ok(None),
    }
}

fn decode_map(json: Option<String>) -> Result<Option<PropertyMap>> {
    match json {
        Some(text) => Ok(Some(serde_json::from_str(&text)?)),
        None => Ok(None),
    }
}

const GRAPH_COLUMNS: &str =
    "id, name, description, knowledge_base_id, metadata, created_at, updated_at";

type GraphRow = (
    String,
    String,
    Option<String>,
    Option<String>,
    String,
    String,
    String,
);

fn read_graph_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<GraphRow> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
        row.get(6)?,
    ))
}

fn graph_from_row(row: GraphRow) -> Result<KnowledgeGraph> {
    let (id, name, description, knowledge_base_id, metadata, created_at, updated_at) = row;
    Ok(KnowledgeGraph {
        id,
        name,
        description,
        knowledge_base_id,
        metadata: serde_json::from_str(&metadata)?,
        created_at: parse_timestamp(&created_at)?,
        updated_at: parse_timestamp(&updated_at)?,
    })
}

fn select_graph(conn: &Connection, graph_id: &str) -> Result<Option<KnowledgeGraph>> {
    let row = conn
        .query_row(
            &format!("SELECT {} FROM knowledge_graphs WHERE id = ?", GRAPH_COLUMNS),
            params![graph_id],
            read_graph_row,
        )
        .optional()?;
    row.map(graph_from_row).transpose()
}

fn select_nodes(conn: &Connection, graph_id: &str) -> Result<Vec<KnowledgeNode>> {
    let mut stmt = conn.prepare(
        "SELECT id, label, node_type, properties, metadata
         FROM knowledge_nodes WHERE graph_id = ? ORDER BY seq",
    )?;

    let rows = stmt.query_map(params![graph_id], |row| {
        let id: String = row.get(0)?;
        let label: String = row.get(1)?;
        let node_type: String = row.get(2)?;
        let properties: String = row.get(3)?;
        let metadata: Option<String> = row.get(4)?;
        Ok((id, label, node_type, properties, metadata))
    })?;

    let mut nodes = Vec::new();
    for row_result in rows {
        let (id, label, node_type, properties, metadata) = row_result?;
        let node_type: NodeType = node_type
            .parse()
            .map_err(GraphError::PersistenceFailure)?;

        nodes.push(KnowledgeNode {
            id: NodeId(id),
            label,
            node_type,
            properties: serde_json::from_str(&properties)?,
            metadata: decode_map(metadata)?,
        });
    }
    Ok(nodes)
}

fn select_edges(conn: &Connection, graph_id: &str) -> Result<Vec<KnowledgeEdge>> {
    let mut stmt = conn.prepare(
        "SELECT id, source_id, target_id, label, weight, properties
         FROM knowledge_edges WHERE graph_id = ? ORDER BY seq",
    )?;

    let rows = stmt.query_map(params![graph_id], |row| {
        let id: String = row.get(0)?;
        let source_id: String = row.get(1)?;
        let target_id: String = row.get(2)?;
        let label: String = row.get(3)?;
        let weight: f64 = row.get(4)?;
        let properties: Option<String> = row.get(5)?;
        Ok((id, source_id, target_id, label, weight, properties))
    })?;

    let mut edges = Vec::new();
    for row_result in rows {
        let (id, source_id, target_id, label, weight, properties) = row_result?;
        edges.push(KnowledgeEdge {
            id: EdgeId(id),
            source_id: NodeId(source_id),
            target_id: NodeId(target_id),
            label: EdgeLabel::from(label),
            weight,
            properties: decode_map(properties)?,
        });
    }
    Ok(edges)
}

impl GraphStore for Database {
    fn insert_graph(&self, graph: &KnowledgeGraph) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            &format!(
                "INSERT INTO knowledge_graphs ({}) VALUES (?, ?, ?, ?, ?, ?, ?)",
                GRAPH_COLUMNS
            ),
            params![
                graph.id,
                graph.name,
                graph.description,
                graph.knowledge_base_id,
                serde_json::to_string(&graph.metadata)?,
                graph.created_at.to_rfc3339(),
                graph.updated_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    fn get_graph(&self, graph_id: &str) -> Result<Option<KnowledgeGraph>> {
        let conn = self.conn()?;
        select_graph(&conn, graph_id)
    }

    fn list_graphs(&self) -> Result<Vec<KnowledgeGraph>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM knowledge_graphs ORDER BY created_at, id",
            GRAPH_COLUMNS
        ))?;
        let rows = stmt.query_map([], read_graph_row)?;

        let mut graphs = Vec::new();
        for row_result in rows {
            graphs.push(graph_from_row(row_result?)?);
        }
        Ok(graphs)
    }

    fn replace_contents(
        &self,
        graph_id: &str,
        nodes: &[KnowledgeNode],
        edges: &[KnowledgeEdge],
        metadata: &GraphMetadata,
        updated_at: DateTime<Utc>,
    ) -> Result<()> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        if select_graph(&tx, graph_id)?.is_none() {
            return Err(GraphError::graph_not_found(graph_id));
        }

        tx.execute("DELETE FROM knowledge_edges WHERE graph_id = ?", params![graph_id])?;
        tx.execute("DELETE FROM knowledge_nodes WHERE graph_id = ?", params![graph_id])?;

        {
            let mut insert_node = tx.prepare(
                "INSERT INTO knowledge_nodes (graph_id, id, label, node_type, properties, metadata)
                 VALUES (?, ?, ?, ?, ?, ?)",
            )?;
            for node in nodes {
                insert_node.execute(params![
                    graph_id,
                    node.id.as_str(),
                    node.label,
                    node.node_type.as_str(),
                    serde_json::to_string(&node.properties)?,
                    encode_map(node.metadata.as_ref())?,
                ])?;
            }

            let mut insert_edge = tx.prepare(
                "INSERT INTO knowledge_edges (graph_id, id, source_id, target_id, label, weight, properties)
                 VALUES (?, ?, ?, ?, ?, ?, ?)",
            )?;
            for edge in edges {
                insert_edge.execute(params![
                    graph_id,
                    edge.id.as_str(),
                    edge.source_id.as_str(),
                    edge.target_id.as_str(),
                    edge.label.as_str(),
                    edge.weight,
                    encode_map(edge.properties.as_ref())?,
                ])?;
            }
        }

        // Metadata goes last so it only changes together with the contents
        tx.execute(
            "UPDATE knowledge_graphs SET metadata = ?, updated_at = ? WHERE id = ?",
            params![
                serde_json::to_string(metadata)?,
                updated_at.to_rfc3339(),
                graph_id
            ],
        )?;

        tx.commit()?;
        Ok(())
    }

    fn load_graph(&self, graph_id: &str) -> Result<LoadedGraph> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        let graph = select_graph(&tx, graph_id)?.ok_or_else(|| GraphError::graph_not_found(graph_id))?;
        let nodes = select_nodes(&tx, graph_id)?;
        let edges = select_edges(&tx, graph_id)?;
        tx.commit()?;

        LoadedGraph::new(graph, nodes, edges)
    }

    fn delete_graph(&self, graph_id: &str) -> Result<bool> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        tx.execute("DELETE FROM knowledge_edges WHERE graph_id = ?", params![graph_id])?;
        tx.execute("DELETE FROM knowledge_nodes WHERE graph_id = ?", params![graph_id])?;
        let removed = tx.execute("DELETE FROM knowledge_graphs WHERE id = ?", params![graph_id])?;

        tx.commit()?;
        Ok(removed > 0)
    }
}
