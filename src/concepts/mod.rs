// Concept extraction: turn a corpus into a deduplicated concept vocabulary
// with frequencies, weights and a symmetric co-occurrence table.

pub mod extractor;
pub mod merge;
pub mod normalize;
pub mod patterns;
pub mod vocabulary;

pub use extractor::{
    ConceptExtractor, DocumentConcept, ExtractionConfig, ExtractionResult, TopConcept,
    COOCCURRENCE_TOP_N,
};
pub use merge::MergeReport;
pub use normalize::{normalize_term, StopWords};
pub use patterns::ConceptType;
pub use vocabulary::{Concept, CooccurrencePair, CooccurrenceTable, TextSource, Vocabulary};
