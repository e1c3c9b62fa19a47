// Composition tests: verifying that the subsystems chain together correctly.
//
// These tests exercise the data flow between modules:
//   corpus file -> extraction -> merge -> graph -> engine -> cached analyzer
// with no network access. Corpus files are written to temporary directories.

use std::io::Write;

use dupescope::analysis::{CorpusAnalyzer, COMPREHENSIVE};
use dupescope::cache::similarity_key;
use dupescope::config::Config;
use dupescope::corpus::loader::{load_corpus, load_graph};
use dupescope::corpus::Corpus;
use dupescope::output::truncate_chars;
use dupescope::similarity::Recommendation;

const CORPUS_JSON: &str = r#"{
  "guides/deploy.md": {
    "content": "Deployment starts with a validator key. Configure the wallet before deployment. Gas optimization keeps each transaction cheap.",
    "headings": [{"level": 1, "text": "Deployment Guide"}],
    "frontmatter": {"title": "Deploying validators", "tags": ["deployment", "validator"]}
  },
  "guides/deploy-copy.md": {
    "content": "Deployment starts with a validator key. Configure the wallet before deployment. Gas optimization keeps each transaction cheap.",
    "headings": [{"level": 1, "text": "Deployment Guide"}],
    "frontmatter": {"title": "Deploying validators", "tags": ["deployment", "validator"]}
  },
  "reference/schema.md": {
    "content": "The database schema stores every migration. Run a migration after each schema change.",
    "headings": [{"level": 2, "text": "Schema Reference"}]
  }
}"#;

fn write_temp(contents: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

fn loaded_analyzer() -> CorpusAnalyzer {
    let file = write_temp(CORPUS_JSON);
    let corpus = load_corpus(file.path()).unwrap();
    let mut analyzer = CorpusAnalyzer::new(Config::default()).unwrap();
    analyzer.update_data(corpus);
    analyzer
}

// ============================================================
// Chain: file -> extraction -> graph
// ============================================================

#[test]
fn loaded_corpus_feeds_extraction_and_graph() {
    let analyzer = loaded_analyzer();
    assert_eq!(analyzer.engine().corpus().len(), 3);
    assert_eq!(analyzer.extraction().documents_processed, 3);

    let top = analyzer.top_concepts(10);
    assert!(top.iter().any(|c| c.concept == "deployment"));

    let graph = analyzer.engine().graph();
    let concepts = graph
        .document_concepts("guides/deploy.md")
        .expect("document has mentions");
    assert!(concepts.contains_key("deployment"));
    for key in concepts.keys() {
        assert!(analyzer.extraction().concepts.contains_key(key));
    }
}

#[test]
fn graph_file_round_trips_into_analyzer() {
    let analyzer = loaded_analyzer();
    let json = serde_json::to_string(analyzer.engine().graph()).unwrap();
    let graph_file = write_temp(&json);
    let graph = load_graph(graph_file.path()).unwrap();

    let corpus: Corpus = analyzer.engine().corpus().clone();
    let mut external = CorpusAnalyzer::new(Config::default()).unwrap();
    external.update_data_with_graph(corpus, graph);

    let ours = analyzer
        .engine()
        .calculate_conceptual_overlap("guides/deploy.md", "reference/schema.md");
    let theirs = external
        .engine()
        .calculate_conceptual_overlap("guides/deploy.md", "reference/schema.md");
    assert!((ours.score - theirs.score).abs() < 1e-9);
}

// ============================================================
// Chain: engine -> cache -> analyzer
// ============================================================

#[tokio::test]
async fn duplicate_pair_is_found_and_cached() {
    let analyzer = loaded_analyzer();

    let result = analyzer
        .compare("guides/deploy.md", "guides/deploy-copy.md")
        .await
        .unwrap();
    assert_eq!(result.recommendation, Recommendation::HighlyDuplicate);

    let key = similarity_key(COMPREHENSIVE, "guides/deploy-copy.md", "guides/deploy.md");
    assert!(analyzer.cache().has(&key));

    let clusters = analyzer.find_duplicate_clusters(0.7);
    assert_eq!(clusters.len(), 1);
    assert_eq!(
        clusters[0].documents,
        vec!["guides/deploy-copy.md".to_string(), "guides/deploy.md".to_string()]
    );
    assert!(analyzer.cache_stats().hits >= 1);
}

#[tokio::test]
async fn cached_and_direct_results_agree() {
    let analyzer = loaded_analyzer();
    let direct = analyzer
        .engine()
        .calculate_comprehensive_similarity("reference/schema.md", "guides/deploy.md");
    let first = analyzer.compare("reference/schema.md", "guides/deploy.md").await.unwrap();
    let second = analyzer.compare("guides/deploy.md", "reference/schema.md").await.unwrap();

    assert!((first.overall_score - direct.overall_score).abs() < 1e-9);
    assert!((second.overall_score - direct.overall_score).abs() < 1e-9);
    assert_eq!(first.document_a, "reference/schema.md");
    assert_eq!(second.document_a, "guides/deploy.md");
}

#[tokio::test]
async fn update_data_invalidates_cached_results() {
    let mut analyzer = loaded_analyzer();
    let before = analyzer
        .compare("guides/deploy.md", "guides/deploy-copy.md")
        .await
        .unwrap();
    assert!(before.is_duplicate);

    let mut corpus = analyzer.engine().corpus().clone();
    if let Some(doc) = corpus.get_mut("guides/deploy-copy.md") {
        doc.content = "Completely different text about baking sourdough bread at home.".to_string();
        doc.headings.clear();
        doc.frontmatter.clear();
    }
    analyzer.update_data(corpus);
    assert!(analyzer.cache().is_empty());

    let after = analyzer
        .compare("guides/deploy.md", "guides/deploy-copy.md")
        .await
        .unwrap();
    assert!(!after.is_duplicate);
    assert!(after.overall_score < before.overall_score);
}

#[test]
fn similar_listing_uses_loaded_corpus() {
    let analyzer = loaded_analyzer();
    let similar = analyzer.find_similar("guides/deploy.md", 0.0, 5);
    assert_eq!(similar.len(), 2);
    assert_eq!(similar[0].path, "guides/deploy-copy.md");
    assert_eq!(truncate_chars(&similar[0].path, 6), "guides...");
}
