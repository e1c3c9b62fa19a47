// ConceptGraph - documents and concepts joined by weighted edges.
//
// The graph is normally produced by a separate graph-construction step and
// handed to the similarity engine read-only. Only `mentions` edges from a
// document node to a concept node matter for conceptual overlap; every other
// edge type is carried through untouched.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::concepts::ExtractionResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeType {
    Document,
    Concept,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeType {
    Mentions,
    LinksTo,
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphNode {
    pub id: String,
    #[serde(rename = "type")]
    pub node_type: NodeType,
    #[serde(default, alias = "filePath", skip_serializing_if = "Option::is_none")]
    pub file_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphEdge {
    pub source: String,
    pub target: String,
    #[serde(rename = "type")]
    pub edge_type: EdgeType,
    #[serde(default = "default_edge_weight")]
    pub weight: f64,
}

fn default_edge_weight() -> f64 {
    1.0
}

/// Wire form of the graph; the lookup index is rebuilt on load.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct GraphData {
    #[serde(default)]
    nodes: Vec<GraphNode>,
    #[serde(default)]
    edges: Vec<GraphEdge>,
}

/// Document/concept graph with a precomputed `document -> concept weights` index.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(from = "GraphData", into = "GraphData")]
pub struct ConceptGraph {
    nodes: Vec<GraphNode>,
    edges: Vec<GraphEdge>,
    mentions: HashMap<String, HashMap<String, f64>>,
}

impl From<GraphData> for ConceptGraph {
    fn from(data: GraphData) -> Self {
        ConceptGraph::new(data.nodes, data.edges)
    }
}

impl From<ConceptGraph> for GraphData {
    fn from(graph: ConceptGraph) -> Self {
        GraphData {
            nodes: graph.nodes,
            edges: graph.edges,
        }
    }
}

impl ConceptGraph {
    pub fn new(nodes: Vec<GraphNode>, edges: Vec<GraphEdge>) -> Self {
        let by_id: HashMap<&str, &GraphNode> = nodes.iter().map(|n| (n.id.as_str(), n)).collect();

        let mut mentions: HashMap<String, HashMap<String, f64>> = HashMap::new();
        for edge in edges.iter().filter(|e| e.edge_type == EdgeType::Mentions) {
            let (Some(source), Some(target)) =
                (by_id.get(edge.source.as_str()), by_id.get(edge.target.as_str()))
            else {
                continue;
            };
            if source.node_type != NodeType::Document || target.node_type != NodeType::Concept {
                continue;
            }
            let doc = source.file_path.clone().unwrap_or_else(|| source.id.clone());
            let concept = target.label.clone().unwrap_or_else(|| target.id.clone());
            *mentions.entry(doc).or_default().entry(concept).or_insert(0.0) += edge.weight.max(0.0);
        }

        Self {
            nodes,
            edges,
            mentions,
        }
    }

    /// Build the graph from an extraction pass: one node per document and per
    /// surviving concept, and a `mentions` edge weighted by the concept's
    /// weight inside that document.
    pub fn from_extraction(result: &ExtractionResult) -> Self {
        let mut nodes = Vec::new();
        let mut edges = Vec::new();

        let mut concept_keys: Vec<&String> = result.concepts.keys().collect();
        concept_keys.sort();
        for key in concept_keys {
            nodes.push(GraphNode {
                id: concept_node_id(key),
                node_type: NodeType::Concept,
                file_path: None,
                label: Some(key.clone()),
            });
        }

        let mut paths: Vec<&String> = result.document_concepts.keys().collect();
        paths.sort();
        for path in paths {
            let doc_id = document_node_id(path);
            nodes.push(GraphNode {
                id: doc_id.clone(),
                node_type: NodeType::Document,
                file_path: Some(path.clone()),
                label: None,
            });
            for assigned in &result.document_concepts[path] {
                if !result.concepts.contains_key(&assigned.concept) {
                    continue;
                }
                edges.push(GraphEdge {
                    source: doc_id.clone(),
                    target: concept_node_id(&assigned.concept),
                    edge_type: EdgeType::Mentions,
                    weight: assigned.weight,
                });
            }
        }

        Self::new(nodes, edges)
    }

    /// Concept weights mentioned by a document, or `None` when the document
    /// has no `mentions` edges.
    pub fn document_concepts(&self, path: &str) -> Option<&HashMap<String, f64>> {
        self.mentions.get(path).filter(|m| !m.is_empty())
    }

    pub fn nodes(&self) -> &[GraphNode] {
        &self.nodes
    }

    pub fn edges(&self) -> &[GraphEdge] {
        &self.edges
    }
}

fn document_node_id(path: &str) -> String {
    format!("doc:{path}")
}

fn concept_node_id(key: &str) -> String {
    format!("concept:{key}")
}
