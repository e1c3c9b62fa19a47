// Pairwise document similarity: exact text, conceptual overlap and TF-IDF
// semantics, blended into one score, plus duplicate clustering.

pub mod engine;
pub mod text;
pub mod tfidf;

pub use engine::{
    ConceptualSimilarity, DuplicateCluster, ExactSimilarity, Recommendation, SemanticSimilarity,
    SharedConcept, SimilarDocument, SimilarityEngine, SimilarityResult, SimilarityThresholds,
};
pub use text::SegmentMatch;
pub use tfidf::TfIdfIndex;
