// Corpus analysis service: extraction, similarity and caching wired together.
//
// `update_data` is the only way corpus state changes. It re-extracts the
// vocabulary, rebuilds the concept graph and the similarity engine, and
// empties the result cache so no stale comparison is ever served.

use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tracing::{debug, info};

use crate::cache::{
    parse_similarity_key, similarity_key, similarity_params, AdaptiveCache, CacheStats,
    PrefetchLoader, QueryPlan,
};
use crate::concepts::{ConceptExtractor, ExtractionResult, MergeReport, StopWords, TopConcept};
use crate::config::Config;
use crate::corpus::{ConceptGraph, Corpus};
use crate::similarity::{DuplicateCluster, SimilarDocument, SimilarityEngine, SimilarityResult};

/// Cache namespace for full pairwise comparisons.
pub const COMPREHENSIVE: &str = "comprehensive";

#[async_trait]
impl PrefetchLoader<SimilarityResult> for SimilarityEngine {
    async fn load(&self, key: &str) -> Result<SimilarityResult> {
        let (measure, a, b) = parse_similarity_key(key, |p| self.contains(p))
            .with_context(|| format!("Not a similarity key for this corpus: {key}"))?;
        anyhow::ensure!(measure == COMPREHENSIVE, "Unsupported measure in key: {key}");
        Ok(self.calculate_comprehensive_similarity(a, b))
    }
}

pub struct CorpusAnalyzer {
    extractor: ConceptExtractor,
    config: Config,
    engine: Arc<SimilarityEngine>,
    extraction: ExtractionResult,
    merge_report: MergeReport,
    cache: AdaptiveCache<SimilarityResult>,
}

impl CorpusAnalyzer {
    /// Build an analyzer with no corpus loaded.
    pub fn new(config: Config) -> Result<Self> {
        let extractor = ConceptExtractor::new(config.extraction.clone())?;
        let engine = SimilarityEngine::new(config.thresholds, stop_words(&config));
        let cache = AdaptiveCache::new(config.cache.clone());
        Ok(Self {
            extractor,
            config,
            engine: Arc::new(engine),
            extraction: ExtractionResult::default(),
            merge_report: MergeReport::default(),
            cache,
        })
    }

    /// Load a corpus, deriving the concept graph from the extraction.
    pub fn update_data(&mut self, corpus: Corpus) {
        let extraction = self.extract(&corpus);
        let graph = ConceptGraph::from_extraction(&extraction);
        self.install(corpus, graph, extraction);
    }

    /// Load a corpus with an externally built concept graph.
    pub fn update_data_with_graph(&mut self, corpus: Corpus, graph: ConceptGraph) {
        let extraction = self.extract(&corpus);
        self.install(corpus, graph, extraction);
    }

    fn extract(&mut self, corpus: &Corpus) -> ExtractionResult {
        let mut extraction = self.extractor.extract_from_documents(corpus);
        self.merge_report = self.extractor.normalize_concepts(&mut extraction);
        extraction
    }

    fn install(&mut self, corpus: Corpus, graph: ConceptGraph, extraction: ExtractionResult) {
        let mut engine = SimilarityEngine::new(self.config.thresholds, stop_words(&self.config));
        engine.update_data(corpus, graph);
        self.engine = Arc::new(engine);
        self.extraction = extraction;
        self.cache.clear();

        info!(
            documents = self.engine.corpus().len(),
            concepts = self.extraction.concepts.len(),
            merged = self.merge_report.merged,
            "Corpus analysis data updated"
        );
    }

    pub fn engine(&self) -> &SimilarityEngine {
        &self.engine
    }

    pub fn extraction(&self) -> &ExtractionResult {
        &self.extraction
    }

    pub fn merge_report(&self) -> &MergeReport {
        &self.merge_report
    }

    pub fn cache(&self) -> &AdaptiveCache<SimilarityResult> {
        &self.cache
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    pub fn top_concepts(&self, limit: usize) -> Vec<TopConcept> {
        self.extractor.get_top_concepts(&self.extraction, limit)
    }

    /// Strategy and latency estimate for comparing `a` and `b`.
    pub fn plan_comparison(&self, a: &str, b: &str) -> QueryPlan {
        self.cache.plan_query(COMPREHENSIVE, &similarity_params(a, b))
    }

    /// Comprehensive similarity of two documents, memoized.
    ///
    /// The comparison is computed once per unordered pair and oriented so
    /// `document_a` is `a`. The access also feeds pattern learning and
    /// prefetches whatever comparison usually comes next.
    pub async fn compare(&self, a: &str, b: &str) -> Result<SimilarityResult> {
        let key = similarity_key(COMPREHENSIVE, a, b);
        let params = similarity_params(a, b);
        let plan = self.cache.plan_query(COMPREHENSIVE, &params);
        debug!(
            key = key.as_str(),
            strategy = %plan.strategy,
            estimated_ms = plan.estimated_latency_ms,
            "Planned comparison"
        );

        let started = Instant::now();
        let (first, second) = if a <= b { (a, b) } else { (b, a) };
        let engine = Arc::clone(&self.engine);
        let (first, second) = (first.to_string(), second.to_string());
        let result = self
            .cache
            .load(&key, move || async move {
                Ok(engine.calculate_comprehensive_similarity(&first, &second))
            })
            .await?;
        self.cache.record_timing(COMPREHENSIVE, started.elapsed());

        self.cache.record_access(COMPREHENSIVE, &params);
        let prefetched = self.cache.trigger_prefetch(&key, self.engine.as_ref()).await;
        if prefetched > 0 {
            debug!(trigger = key.as_str(), prefetched, "Prefetched comparisons");
        }

        Ok(result.oriented_to(a))
    }

    /// Synchronous memoized comparison used by the corpus-wide scans.
    fn cached_similarity(&self, a: &str, b: &str) -> SimilarityResult {
        let key = similarity_key(COMPREHENSIVE, a, b);
        if let Some(hit) = self.cache.get(&key) {
            return hit.oriented_to(a);
        }
        let (first, second) = if a <= b { (a, b) } else { (b, a) };
        let result = self.engine.calculate_comprehensive_similarity(first, second);
        self.cache.set(&key, result.clone());
        result.oriented_to(a)
    }

    pub fn find_similar(
        &self,
        path: &str,
        min_similarity: f64,
        limit: usize,
    ) -> Vec<SimilarDocument> {
        self.engine
            .find_similar_documents_with(path, min_similarity, limit, |a, b| {
                self.cached_similarity(a, b)
            })
    }

    pub fn find_duplicate_clusters(&self, min_similarity: f64) -> Vec<DuplicateCluster> {
        self.engine
            .find_duplicate_clusters_with(min_similarity, |a, b| self.cached_similarity(a, b))
    }
}

fn stop_words(config: &Config) -> StopWords {
    StopWords::resolve(config.extraction.stop_words.as_deref())
}
