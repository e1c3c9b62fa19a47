// Unit tests for the similarity engine and its text helpers.
//
// Every comparison here goes through the public engine API on a corpus
// whose graph was derived from a real extraction pass.

use dupescope::concepts::{ConceptExtractor, ExtractionConfig, StopWords};
use dupescope::corpus::{ConceptGraph, Corpus, Document, GraphEdge, GraphNode, EdgeType, NodeType};
use dupescope::similarity::text::{jaccard, jaro_winkler, normalize_text, shingles};
use dupescope::similarity::{Recommendation, SimilarityEngine, SimilarityThresholds};

const ROLLUP: &str = "Rollups batch transactions off chain and post compressed data to the base layer. \
    Validators verify the state root before finalizing the batch.";

fn corpus_of(docs: &[(&str, &str)]) -> Corpus {
    docs.iter()
        .map(|(path, content)| (path.to_string(), Document::new(*path, *content)))
        .collect()
}

fn engine_for(corpus: Corpus) -> SimilarityEngine {
    let extractor = ConceptExtractor::new(ExtractionConfig::default()).unwrap();
    let mut extraction = extractor.extract_from_documents(&corpus);
    extractor.normalize_concepts(&mut extraction);
    let graph = ConceptGraph::from_extraction(&extraction);

    let mut engine = SimilarityEngine::new(SimilarityThresholds::default(), StopWords::english());
    engine.update_data(corpus, graph);
    engine
}

fn sample_corpus() -> Corpus {
    corpus_of(&[
        ("rollup.md", ROLLUP),
        ("rollup-copy.md", ROLLUP),
        (
            "rollup-notes.md",
            "Notes on rollups: transactions are batched and validators check each state root.",
        ),
        (
            "wallet.md",
            "Create a wallet, back up the seed phrase, and never share the private key.",
        ),
        ("empty.md", ""),
    ])
}

// ============================================================
// Text helpers
// ============================================================

#[test]
fn jaccard_of_empty_sets_is_zero() {
    let empty = std::collections::HashSet::<String>::new();
    assert_eq!(jaccard(&empty, &empty), 0.0);
}

#[test]
fn shingles_of_identical_text_match_fully() {
    let a = shingles(&normalize_text(ROLLUP), 3);
    let b = shingles(&normalize_text(ROLLUP), 3);
    assert_eq!(jaccard(&a, &b), 1.0);
}

#[test]
fn jaro_winkler_symmetric() {
    let x = jaro_winkler("deployment guide", "deploy guide");
    let y = jaro_winkler("deploy guide", "deployment guide");
    assert!((x - y).abs() < 1e-12);
}

// ============================================================
// Engine scores
// ============================================================

#[test]
fn identical_documents_are_highly_duplicate() {
    let engine = engine_for(sample_corpus());
    let result = engine.calculate_comprehensive_similarity("rollup.md", "rollup-copy.md");

    assert!((result.exact.score - 1.0).abs() < 1e-9);
    assert!(result.exact.is_duplicate);
    assert!(result.is_duplicate);
    assert_eq!(result.recommendation, Recommendation::HighlyDuplicate);
}

#[test]
fn all_scores_within_unit_interval() {
    let engine = engine_for(sample_corpus());
    let paths: Vec<String> = engine.corpus().keys().cloned().collect();
    for a in &paths {
        for b in &paths {
            let r = engine.calculate_comprehensive_similarity(a, b);
            for score in [r.overall_score, r.exact.score, r.conceptual.score, r.semantic.score] {
                assert!((0.0..=1.0).contains(&score), "{a} vs {b}: {score}");
            }
        }
    }
}

#[test]
fn comprehensive_similarity_is_symmetric() {
    let engine = engine_for(sample_corpus());
    let paths: Vec<String> = engine.corpus().keys().cloned().collect();
    for a in &paths {
        for b in &paths {
            let ab = engine.calculate_comprehensive_similarity(a, b);
            let ba = engine.calculate_comprehensive_similarity(b, a);
            assert!(
                (ab.overall_score - ba.overall_score).abs() < 1e-9,
                "{a} vs {b}: {} != {}",
                ab.overall_score,
                ba.overall_score
            );
        }
    }
}

#[test]
fn unrelated_documents_score_low() {
    let engine = engine_for(sample_corpus());
    let result = engine.calculate_comprehensive_similarity("rollup.md", "wallet.md");
    assert!(!result.is_duplicate);
    assert!(result.overall_score < 0.5);
}

#[test]
fn unknown_and_empty_documents_score_zero() {
    let engine = engine_for(sample_corpus());
    let missing = engine.calculate_comprehensive_similarity("rollup.md", "missing.md");
    assert_eq!(missing.conceptual.score, 0.0);
    assert_eq!(missing.semantic.score, 0.0);

    let empty = engine.calculate_comprehensive_similarity("rollup.md", "empty.md");
    assert_eq!(empty.exact.jaccard, 0.0);
    assert_eq!(empty.semantic.score, 0.0);
}

#[test]
fn conceptual_overlap_uses_external_graph() {
    let corpus = corpus_of(&[("a.md", "alpha"), ("b.md", "beta")]);
    let nodes = vec![
        GraphNode {
            id: "doc:a".to_string(),
            node_type: NodeType::Document,
            file_path: Some("a.md".to_string()),
            label: None,
        },
        GraphNode {
            id: "doc:b".to_string(),
            node_type: NodeType::Document,
            file_path: Some("b.md".to_string()),
            label: None,
        },
        GraphNode {
            id: "concept:bridge".to_string(),
            node_type: NodeType::Concept,
            file_path: None,
            label: Some("bridge".to_string()),
        },
    ];
    let edges = vec![
        GraphEdge {
            source: "doc:a".to_string(),
            target: "concept:bridge".to_string(),
            edge_type: EdgeType::Mentions,
            weight: 2.0,
        },
        GraphEdge {
            source: "doc:b".to_string(),
            target: "concept:bridge".to_string(),
            edge_type: EdgeType::Mentions,
            weight: 2.0,
        },
    ];
    let mut engine = SimilarityEngine::new(SimilarityThresholds::default(), StopWords::english());
    engine.update_data(corpus, ConceptGraph::new(nodes, edges));

    let overlap = engine.calculate_conceptual_overlap("a.md", "b.md");
    assert!((overlap.score - 1.0).abs() < 1e-9);
    assert!(overlap.is_duplicate);
    assert_eq!(overlap.shared_concepts.len(), 1);
}

// ============================================================
// Similar documents and clusters
// ============================================================

#[test]
fn similar_documents_exclude_self_and_sort_descending() {
    let engine = engine_for(sample_corpus());
    let similar = engine.find_similar_documents("rollup.md", 0.0, 10);
    assert!(similar.iter().all(|d| d.path != "rollup.md"));
    assert_eq!(similar[0].path, "rollup-copy.md");
    for pair in similar.windows(2) {
        assert!(pair[0].similarity.overall_score >= pair[1].similarity.overall_score);
    }
}

#[test]
fn clusters_are_disjoint() {
    let engine = engine_for(sample_corpus());
    let clusters = engine.find_duplicate_clusters(0.7);
    assert!(!clusters.is_empty());

    let mut seen = std::collections::HashSet::new();
    for cluster in &clusters {
        assert!(cluster.documents.len() >= 2);
        for doc in &cluster.documents {
            assert!(seen.insert(doc.clone()), "{doc} appears in two clusters");
        }
    }
    assert!(clusters[0].documents.contains(&"rollup.md".to_string()));
    assert!(clusters[0].documents.contains(&"rollup-copy.md".to_string()));
}
