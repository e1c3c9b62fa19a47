// SimilarityEngine - three independent similarity signals and their blend.
//
// The engine holds a read-only snapshot of the corpus, the concept graph and
// the TF-IDF index. `update_data` replaces all three at once; there is no
// incremental path. Every method is side-effect free, so callers are free to
// memoize results (see `crate::analysis`).

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::text::{
    duplicated_segments, jaccard, jaro_winkler, normalize_text, shingles, SegmentMatch,
};
use super::tfidf::{TfIdfIndex, DEFAULT_TOP_TERMS};
use crate::concepts::StopWords;
use crate::corpus::{ConceptGraph, Corpus, Document};

/// Shingle width for exact matching.
const SHINGLE_SIZE: usize = 3;

const MAX_DUPLICATED_SEGMENTS: usize = 5;

const MAX_SHARED_CONCEPTS: usize = 20;

/// Cap on the similar set gathered per cluster seed.
pub const CLUSTER_SEED_LIMIT: usize = 50;

/// Jaro-Winkler is quadratic in the worst case; compare at most this many
/// characters of each document. Text past the cap does not move the
/// Jaro-Winkler component, only the shingle Jaccard.
const MAX_JARO_CHARS: usize = 20_000;

const EXACT_JACCARD_WEIGHT: f64 = 0.7;
const EXACT_JARO_WEIGHT: f64 = 0.3;

const OVERALL_EXACT_WEIGHT: f64 = 0.4;
const OVERALL_CONCEPTUAL_WEIGHT: f64 = 0.35;
const OVERALL_SEMANTIC_WEIGHT: f64 = 0.25;

/// Duplicate thresholds for each signal and for the blended score.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SimilarityThresholds {
    pub exact: f64,
    pub conceptual: f64,
    pub semantic: f64,
    pub overall: f64,
}

impl Default for SimilarityThresholds {
    fn default() -> Self {
        Self {
            exact: 0.85,
            conceptual: 0.70,
            semantic: 0.75,
            overall: 0.70,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExactSimilarity {
    /// 0.7 x trigram Jaccard + 0.3 x Jaro-Winkler
    pub score: f64,
    pub jaccard: f64,
    pub jaro_winkler: f64,
    pub is_duplicate: bool,
    pub duplicated_segments: Vec<SegmentMatch>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SharedConcept {
    pub concept: String,
    /// Mean of the two documents' weights for this concept
    pub weight: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConceptualSimilarity {
    pub score: f64,
    pub is_duplicate: bool,
    /// Strongest shared concepts, at most 20
    pub shared_concepts: Vec<SharedConcept>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SemanticSimilarity {
    pub score: f64,
    pub is_duplicate: bool,
}

/// What to do about a pair, from strongest to weakest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Recommendation {
    HighlyDuplicate,
    Duplicate,
    Similar,
    ExactTextMatch,
    ConceptualOverlap,
    Related,
}

impl Recommendation {
    pub fn from_scores(overall: f64, exact: f64, conceptual: f64) -> Self {
        match overall {
            s if s >= 0.9 => Recommendation::HighlyDuplicate,
            s if s >= 0.8 => Recommendation::Duplicate,
            s if s >= 0.7 => Recommendation::Similar,
            _ if exact >= 0.85 => Recommendation::ExactTextMatch,
            _ if conceptual >= 0.75 => Recommendation::ConceptualOverlap,
            _ => Recommendation::Related,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Recommendation::HighlyDuplicate => "highly duplicate",
            Recommendation::Duplicate => "duplicate",
            Recommendation::Similar => "similar",
            Recommendation::ExactTextMatch => "exact text match",
            Recommendation::ConceptualOverlap => "conceptual overlap",
            Recommendation::Related => "related",
        }
    }
}

impl std::fmt::Display for Recommendation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Full comparison of two documents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimilarityResult {
    pub document_a: String,
    pub document_b: String,
    pub overall_score: f64,
    pub is_duplicate: bool,
    pub recommendation: Recommendation,
    pub exact: ExactSimilarity,
    pub conceptual: ConceptualSimilarity,
    pub semantic: SemanticSimilarity,
}

impl SimilarityResult {
    /// The same comparison seen from the other document.
    pub fn swapped(mut self) -> Self {
        std::mem::swap(&mut self.document_a, &mut self.document_b);
        for segment in &mut self.exact.duplicated_segments {
            std::mem::swap(&mut segment.source, &mut segment.target);
        }
        self
    }

    /// Orient the result so `document_a` is `path`.
    pub fn oriented_to(self, path: &str) -> Self {
        if self.document_a != path && self.document_b == path {
            self.swapped()
        } else {
            self
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimilarDocument {
    pub path: String,
    pub similarity: SimilarityResult,
}

/// Documents grouped around a seed by a single-link walk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DuplicateCluster {
    /// Seed first, then its similar documents in descending score order
    pub documents: Vec<String>,
    /// Mean overall score between the seed and each member
    pub avg_similarity: f64,
}

pub struct SimilarityEngine {
    corpus: Corpus,
    graph: ConceptGraph,
    tfidf: TfIdfIndex,
    thresholds: SimilarityThresholds,
    stop_words: StopWords,
}

impl SimilarityEngine {
    pub fn new(thresholds: SimilarityThresholds, stop_words: StopWords) -> Self {
        Self {
            corpus: Corpus::new(),
            graph: ConceptGraph::default(),
            tfidf: TfIdfIndex::default(),
            thresholds,
            stop_words,
        }
    }

    /// Replace the corpus and graph and rebuild the TF-IDF index.
    pub fn update_data(&mut self, corpus: Corpus, graph: ConceptGraph) {
        self.tfidf = TfIdfIndex::build(&corpus, &self.stop_words, DEFAULT_TOP_TERMS);
        self.corpus = corpus;
        self.graph = graph;
        info!(
            documents = self.corpus.len(),
            graph_nodes = self.graph.nodes().len(),
            "Similarity engine data updated"
        );
    }

    pub fn corpus(&self) -> &Corpus {
        &self.corpus
    }

    pub fn graph(&self) -> &ConceptGraph {
        &self.graph
    }

    pub fn thresholds(&self) -> &SimilarityThresholds {
        &self.thresholds
    }

    pub fn tfidf(&self) -> &TfIdfIndex {
        &self.tfidf
    }

    pub fn contains(&self, path: &str) -> bool {
        self.corpus.contains_key(path)
    }

    /// Trigram Jaccard blended with whole-text Jaro-Winkler, plus up to five
    /// near-identical sentence pairs.
    pub fn calculate_exact_similarity(&self, a: &Document, b: &Document) -> ExactSimilarity {
        let norm_a = normalize_text(&a.content);
        let norm_b = normalize_text(&b.content);

        if norm_a.is_empty() || norm_b.is_empty() {
            return ExactSimilarity {
                score: 0.0,
                jaccard: 0.0,
                jaro_winkler: 0.0,
                is_duplicate: false,
                duplicated_segments: Vec::new(),
            };
        }

        let jaccard_score = jaccard(
            &shingles(&norm_a, SHINGLE_SIZE),
            &shingles(&norm_b, SHINGLE_SIZE),
        );
        let jw = jaro_winkler(truncate(&norm_a), truncate(&norm_b));
        let score = (EXACT_JACCARD_WEIGHT * jaccard_score + EXACT_JARO_WEIGHT * jw).clamp(0.0, 1.0);

        ExactSimilarity {
            score,
            jaccard: jaccard_score,
            jaro_winkler: jw,
            is_duplicate: score >= self.thresholds.exact,
            duplicated_segments: duplicated_segments(
                &a.content,
                &b.content,
                MAX_DUPLICATED_SEGMENTS,
            ),
        }
    }

    /// Weighted concept overlap from the graph's `mentions` edges.
    ///
    /// Score = sum of the mean weight of each shared concept, divided by the
    /// mean of the two documents' total concept weight.
    pub fn calculate_conceptual_overlap(&self, a: &str, b: &str) -> ConceptualSimilarity {
        let empty = ConceptualSimilarity {
            score: 0.0,
            is_duplicate: false,
            shared_concepts: Vec::new(),
        };

        let (Some(concepts_a), Some(concepts_b)) =
            (self.graph.document_concepts(a), self.graph.document_concepts(b))
        else {
            return empty;
        };

        let total_a: f64 = concepts_a.values().sum();
        let total_b: f64 = concepts_b.values().sum();
        let denominator = (total_a + total_b) / 2.0;
        if denominator <= 0.0 {
            return empty;
        }

        let mut shared: Vec<SharedConcept> = concepts_a
            .iter()
            .filter_map(|(concept, wa)| {
                concepts_b.get(concept).map(|wb| SharedConcept {
                    concept: concept.clone(),
                    weight: (wa + wb) / 2.0,
                })
            })
            .collect();

        let shared_weight: f64 = shared.iter().map(|s| s.weight).sum();
        let score = (shared_weight / denominator).clamp(0.0, 1.0);

        shared.sort_by(|x, y| {
            y.weight
                .partial_cmp(&x.weight)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| x.concept.cmp(&y.concept))
        });
        shared.truncate(MAX_SHARED_CONCEPTS);

        ConceptualSimilarity {
            score,
            is_duplicate: score >= self.thresholds.conceptual,
            shared_concepts: shared,
        }
    }

    /// TF-IDF cosine similarity; 0.0 when either document is unindexed.
    pub fn calculate_semantic_similarity(&self, a: &str, b: &str) -> SemanticSimilarity {
        let score = self.tfidf.cosine(a, b);
        SemanticSimilarity {
            score,
            is_duplicate: score >= self.thresholds.semantic,
        }
    }

    /// All three signals and their weighted blend. Unknown paths compare as
    /// empty documents.
    pub fn calculate_comprehensive_similarity(&self, a: &str, b: &str) -> SimilarityResult {
        let empty = Document::default();
        let doc_a = self.corpus.get(a).unwrap_or(&empty);
        let doc_b = self.corpus.get(b).unwrap_or(&empty);

        let exact = self.calculate_exact_similarity(doc_a, doc_b);
        let conceptual = self.calculate_conceptual_overlap(a, b);
        let semantic = self.calculate_semantic_similarity(a, b);

        let overall_score = (OVERALL_EXACT_WEIGHT * exact.score
            + OVERALL_CONCEPTUAL_WEIGHT * conceptual.score
            + OVERALL_SEMANTIC_WEIGHT * semantic.score)
            .clamp(0.0, 1.0);

        SimilarityResult {
            document_a: a.to_string(),
            document_b: b.to_string(),
            overall_score,
            is_duplicate: overall_score >= self.thresholds.overall,
            recommendation: Recommendation::from_scores(
                overall_score,
                exact.score,
                conceptual.score,
            ),
            exact,
            conceptual,
            semantic,
        }
    }

    /// Documents scoring at least `min_similarity` against `path`, best first.
    pub fn find_similar_documents(
        &self,
        path: &str,
        min_similarity: f64,
        limit: usize,
    ) -> Vec<SimilarDocument> {
        self.find_similar_documents_with(path, min_similarity, limit, |a, b| {
            self.calculate_comprehensive_similarity(a, b)
        })
    }

    /// Same scan as `find_similar_documents` with a caller-supplied scorer,
    /// so results can be served from a cache.
    pub fn find_similar_documents_with<F>(
        &self,
        path: &str,
        min_similarity: f64,
        limit: usize,
        score: F,
    ) -> Vec<SimilarDocument>
    where
        F: FnMut(&str, &str) -> SimilarityResult,
    {
        let candidates = self.corpus.keys().filter(|p| p.as_str() != path);
        rank_candidates(path, candidates, min_similarity, limit, score)
    }

    /// Greedy duplicate clustering.
    ///
    /// Walks documents in path order. Each unvisited document seeds a cluster
    /// with every unvisited document scoring at least `min_similarity`
    /// against it (at most `CLUSTER_SEED_LIMIT`). Members are not expanded
    /// further, so this is a single-link approximation rather than a
    /// transitive closure. No document lands in two clusters.
    pub fn find_duplicate_clusters(&self, min_similarity: f64) -> Vec<DuplicateCluster> {
        self.find_duplicate_clusters_with(min_similarity, |a, b| {
            self.calculate_comprehensive_similarity(a, b)
        })
    }

    pub fn find_duplicate_clusters_with<F>(
        &self,
        min_similarity: f64,
        mut score: F,
    ) -> Vec<DuplicateCluster>
    where
        F: FnMut(&str, &str) -> SimilarityResult,
    {
        let mut visited: HashSet<&str> = HashSet::new();
        let mut clusters = Vec::new();

        for seed in self.corpus.keys() {
            if !visited.insert(seed.as_str()) {
                continue;
            }

            let candidates = self
                .corpus
                .keys()
                .filter(|p| !visited.contains(p.as_str()));
            let found = rank_candidates(
                seed,
                candidates,
                min_similarity,
                CLUSTER_SEED_LIMIT,
                &mut score,
            );
            if found.is_empty() {
                continue;
            }

            let avg_similarity =
                found.iter().map(|d| d.similarity.overall_score).sum::<f64>() / found.len() as f64;

            let mut documents = Vec::with_capacity(found.len() + 1);
            documents.push(seed.clone());
            for doc in found {
                if let Some((key, _)) = self.corpus.get_key_value(&doc.path) {
                    visited.insert(key.as_str());
                }
                documents.push(doc.path);
            }

            debug!(
                seed = seed.as_str(),
                members = documents.len(),
                avg_similarity,
                "Formed duplicate cluster"
            );
            clusters.push(DuplicateCluster {
                documents,
                avg_similarity,
            });
        }

        clusters.sort_by(|a, b| {
            b.avg_similarity
                .partial_cmp(&a.avg_similarity)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        clusters
    }
}

fn rank_candidates<'a, I, F>(
    seed: &str,
    candidates: I,
    min_similarity: f64,
    limit: usize,
    mut score: F,
) -> Vec<SimilarDocument>
where
    I: Iterator<Item = &'a String>,
    F: FnMut(&str, &str) -> SimilarityResult,
{
    let mut found: Vec<SimilarDocument> = candidates
        .map(|other| SimilarDocument {
            path: other.clone(),
            similarity: score(seed, other),
        })
        .filter(|d| d.similarity.overall_score >= min_similarity)
        .collect();

    found.sort_by(|a, b| {
        b.similarity
            .overall_score
            .partial_cmp(&a.similarity.overall_score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.path.cmp(&b.path))
    });
    found.truncate(limit);
    found
}

fn truncate(text: &str) -> &str {
    match text.char_indices().nth(MAX_JARO_CHARS) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recommendation_thresholds() {
        assert_eq!(Recommendation::from_scores(0.95, 0.0, 0.0), Recommendation::HighlyDuplicate);
        assert_eq!(Recommendation::from_scores(0.85, 0.0, 0.0), Recommendation::Duplicate);
        assert_eq!(Recommendation::from_scores(0.7, 0.0, 0.0), Recommendation::Similar);
        assert_eq!(Recommendation::from_scores(0.5, 0.9, 0.0), Recommendation::ExactTextMatch);
        assert_eq!(Recommendation::from_scores(0.5, 0.2, 0.8), Recommendation::ConceptualOverlap);
        assert_eq!(Recommendation::from_scores(0.1, 0.1, 0.1), Recommendation::Related);
    }

    #[test]
    fn test_truncate_respects_char_boundaries() {
        let text = "é".repeat(MAX_JARO_CHARS + 5);
        assert_eq!(truncate(&text).chars().count(), MAX_JARO_CHARS);
        assert_eq!(truncate("short"), "short");
    }

    #[test]
    fn test_empty_documents_score_zero() {
        let engine =
            SimilarityEngine::new(SimilarityThresholds::default(), StopWords::from_words(["the"]));
        let result = engine.calculate_comprehensive_similarity("missing-a.md", "missing-b.md");
        assert_eq!(result.overall_score, 0.0);
        assert_eq!(result.recommendation, Recommendation::Related);
        assert!(!result.is_duplicate);
    }
}
