use anyhow::Result;
use serde_json::{json, Value};

use super::path::{edge_cost, path_cost};
use super::Subgraph;
use crate::graph::{KnowledgeGraph, KnowledgeNode};

/// Supported output formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
    Csv,
}

/// Renders graph records and query results for the command line
pub struct ResultFormatter {
    format: OutputFormat,
}

impl ResultFormatter {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Format a single graph record
    pub fn format_graph(&self, graph: &KnowledgeGraph) -> Result<String> {
        match self.format {
            OutputFormat::Json => Ok(serde_json::to_string_pretty(graph)?),
            OutputFormat::Csv => self.format_graphs(std::slice::from_ref(graph)),
            OutputFormat::Text => {
                let m = &graph.metadata;
                let mut result = format!("{} ({})\n", graph.name, graph.id);
                if let Some(description) = &graph.description {
                    result.push_str(&format!("  {}\n", description));
                }
                if let Some(kb) = &graph.knowledge_base_id {
                    result.push_str(&format!("  knowledge base: {}\n", kb));
                }
                result.push_str(&format!(
                    "  nodes: {} (documents {}, entities {}, concepts {})\n",
                    m.node_count, m.document_count, m.entity_count, m.concept_count
                ));
                result.push_str(&format!("  edges: {}\n", m.edge_count));
                result.push_str(&format!("  updated: {}\n", graph.updated_at.to_rfc3339()));
                Ok(result)
            }
        }
    }

    /// Format a list of graph records
    pub fn format_graphs(&self, graphs: &[KnowledgeGraph]) -> Result<String> {
        match self.format {
            OutputFormat::Json => Ok(serde_json::to_string_pretty(graphs)?),
            OutputFormat::Text => {
                if graphs.is_empty() {
                    return Ok("No graphs found".to_string());
                }
                let mut result = String::new();
                for graph in graphs {
                    result.push_str(&format!(
                        "{} ({}) nodes={} edges={}\n",
                        graph.name, graph.id, graph.metadata.node_count, graph.metadata.edge_count
                    ));
                }
                Ok(result)
            }
            OutputFormat::Csv => {
                let mut result = "id,name,knowledge_base_id,node_count,edge_count\n".to_string();
                for graph in graphs {
                    let row = [
                        graph.id.clone(),
                        escape_csv_value(&graph.name),
                        graph.knowledge_base_id.clone().unwrap_or_default(),
                        graph.metadata.node_count.to_string(),
                        graph.metadata.edge_count.to_string(),
                    ];
                    result.push_str(&row.join(","));
                    result.push('\n');
                }
                Ok(result)
            }
        }
    }

    /// Format a neighborhood result
    pub fn format_subgraph(&self, subgraph: &Subgraph) -> Result<String> {
        match self.format {
            OutputFormat::Json => Ok(serde_json::to_string_pretty(subgraph)?),
            OutputFormat::Csv => Ok(nodes_csv(&subgraph.nodes)),
            OutputFormat::Text => {
                if subgraph.is_empty() {
                    return Ok("No nodes found".to_string());
                }
                let mut result = String::new();
                for node in &subgraph.nodes {
                    result.push_str(&format!("{} [{}] ({})\n", node.label, node.node_type, node.id));
                }
                if !subgraph.edges.is_empty() {
                    result.push('\n');
                }
                for edge in &subgraph.edges {
                    result.push_str(&format!(
                        "{} -[{} {:.3}]-> {}\n",
                        edge.source_id, edge.label, edge.weight, edge.target_id
                    ));
                }
                Ok(result)
            }
        }
    }

    /// Format a shortest-path result, including its total cost
    pub fn format_path(&self, path: &Subgraph) -> Result<String> {
        match self.format {
            OutputFormat::Json => {
                let value: Value = json!({
                    "nodes": path.nodes,
                    "edges": path.edges,
                    "cost": path_cost(path),
                });
                Ok(serde_json::to_string_pretty(&value)?)
            }
            OutputFormat::Csv => Ok(nodes_csv(&path.nodes)),
            OutputFormat::Text => {
                if path.is_empty() {
                    return Ok("No path found".to_string());
                }
                let mut result = String::new();
                for (i, node) in path.nodes.iter().enumerate() {
                    if let Some(edge) = i.checked_sub(1).and_then(|prev| path.edges.get(prev)) {
                        result.push_str(&format!(
                            "  └─ {} (cost {:.3})\n",
                            edge.label,
                            edge_cost(edge.weight)
                        ));
                    }
                    result.push_str(&format!("{} [{}] ({})\n", node.label, node.node_type, node.id));
                }
                result.push_str(&format!("total cost: {:.3}\n", path_cost(path)));
                Ok(result)
            }
        }
    }
}

fn nodes_csv(nodes: &[KnowledgeNode]) -> String {
    let mut result = "id,label,type\n".to_string();
    for node in nodes {
        result.push_str(&format!(
            "{},{},{}\n",
            escape_csv_value(node.id.as_str()),
            escape_csv_value(&node.label),
            node.node_type
        ));
    }
    result
}

/// Escape a CSV value
fn escape_csv_value(value: &str) -> String {
    if value.contains(',') || value.contains('"') || value.contains('\n') {
        let escaped = value.replace('"', "\"\"");
        format!("\"{}\"", escaped)
    } else {
        value.to_string()
    }
}
