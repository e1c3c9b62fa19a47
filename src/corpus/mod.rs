// Corpus input types: parsed documents, the document/concept graph, and the
// JSON loader used by the CLI.

pub mod document;
pub mod graph;
pub mod loader;

pub use document::{Document, Heading};
pub use graph::{ConceptGraph, EdgeType, GraphEdge, GraphNode, NodeType};

use std::collections::BTreeMap;

/// The full corpus keyed by document path. Ordered so that corpus walks are
/// deterministic.
pub type Corpus = BTreeMap<String, Document>;
