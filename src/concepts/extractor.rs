// ConceptExtractor - batch extraction of a concept vocabulary from a corpus.
//
// Each document contributes three weighted text sources (body, headings,
// frontmatter). Every source runs through the seven pattern channels, the
// matches are normalized and filtered, and the strongest concepts per
// document feed the shared vocabulary and the co-occurrence table.

use std::collections::{BTreeSet, HashMap};

use anyhow::Result;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::merge::{self, MergeReport};
use super::normalize::{
    is_valid_concept, is_valid_domain_term, normalize_domain_term, normalize_term, StopWords,
};
use super::patterns::{ConceptType, PatternSet};
use super::vocabulary::{
    Concept, Contribution, CooccurrencePair, CooccurrenceTable, TextSource, Vocabulary,
};
use crate::corpus::{Corpus, Document};

/// Documents processed between two checks of the concept ceiling.
pub const BATCH_SIZE: usize = 20;

/// How many of a document's strongest concepts take part in co-occurrence.
pub const COOCCURRENCE_TOP_N: usize = 60;

/// Gazetteer used when none is configured.
pub const DEFAULT_DOMAIN_TERMS: &[&str] = &[
    "api",
    "sdk",
    "cli",
    "smart contract",
    "gas optimization",
    "gas",
    "transaction",
    "consensus",
    "validator",
    "wallet",
    "token",
    "endpoint",
    "webhook",
    "authentication",
    "authorization",
    "deployment",
    "configuration",
    "database",
    "schema",
    "migration",
];

/// Ceilings and vocabularies for an extraction pass.
#[derive(Debug, Clone)]
pub struct ExtractionConfig {
    pub min_length: usize,
    pub max_length: usize,
    /// Concepts below this frequency are left out of reports
    pub min_frequency: u64,
    /// Distinct concepts the vocabulary will hold
    pub max_concepts: usize,
    pub max_concepts_per_document: usize,
    pub max_cooccurrence_records: usize,
    /// How many of the most frequent concepts the merge pass considers
    pub merge_window: usize,
    /// Replaces the default English stop list when set
    pub stop_words: Option<Vec<String>>,
    pub domain_terms: Vec<String>,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            min_length: 3,
            max_length: 50,
            min_frequency: 1,
            max_concepts: 10_000,
            max_concepts_per_document: 200,
            max_cooccurrence_records: 50_000,
            merge_window: 2_000,
            stop_words: None,
            domain_terms: DEFAULT_DOMAIN_TERMS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

/// A concept kept for one document, with its weight inside that document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentConcept {
    pub concept: String,
    pub weight: f64,
}

/// Output of an extraction pass.
#[derive(Debug, Clone, Default)]
pub struct ExtractionResult {
    pub concepts: HashMap<String, Concept>,
    pub cooccurrence: HashMap<String, CooccurrencePair>,
    /// Concepts kept per document path, strongest first
    pub document_concepts: HashMap<String, Vec<DocumentConcept>>,
    pub documents_processed: usize,
    /// True when the concept ceiling cut the pass short
    pub stopped_early: bool,
}

impl ExtractionResult {
    /// Concept key -> cumulative frequency.
    pub fn frequency_table(&self) -> HashMap<String, u64> {
        self.concepts
            .iter()
            .map(|(k, c)| (k.clone(), c.frequency))
            .collect()
    }

    pub fn total_frequency(&self) -> u64 {
        self.concepts.values().map(|c| c.frequency).sum()
    }
}

/// A reporting row for the most frequent concepts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopConcept {
    pub concept: String,
    pub text: String,
    pub concept_type: ConceptType,
    pub category: String,
    pub frequency: u64,
    pub file_count: usize,
    pub total_weight: f64,
}

/// Per-document accumulator before the top-N cut.
struct LocalConcept {
    contribution: Contribution,
}

pub struct ConceptExtractor {
    config: ExtractionConfig,
    patterns: PatternSet,
    stop_words: StopWords,
}

impl ConceptExtractor {
    pub fn new(config: ExtractionConfig) -> Result<Self> {
        let patterns = PatternSet::new(&config.domain_terms)?;
        let stop_words = StopWords::resolve(config.stop_words.as_deref());
        debug!(
            stop_words = stop_words.len(),
            domain_terms = patterns.gazetteer_len(),
            "Concept extractor ready"
        );
        Ok(Self {
            config,
            patterns,
            stop_words,
        })
    }

    pub fn config(&self) -> &ExtractionConfig {
        &self.config
    }

    /// Extract the vocabulary from the whole corpus.
    ///
    /// Documents are processed in batches of `BATCH_SIZE`; after each batch
    /// the vocabulary size is checked against `max_concepts` and the pass
    /// stops early when it has been reached. The corpus is never modified.
    pub fn extract_from_documents(&self, corpus: &Corpus) -> ExtractionResult {
        let mut vocabulary = Vocabulary::new(self.config.max_concepts);
        let mut cooccurrence = CooccurrenceTable::new(self.config.max_cooccurrence_records);
        let mut document_concepts = HashMap::new();
        let mut processed = 0usize;
        let mut stopped_early = false;

        let documents: Vec<&Document> = corpus.values().collect();
        for (batch_index, batch) in documents.chunks(BATCH_SIZE).enumerate() {
            for doc in batch {
                let kept = self.process_document(doc, &mut vocabulary, &mut cooccurrence);
                document_concepts.insert(doc.path.clone(), kept);
                processed += 1;
            }

            debug!(
                batch = batch_index,
                processed,
                concepts = vocabulary.len(),
                "Processed extraction batch"
            );

            if vocabulary.is_full() {
                if processed < documents.len() {
                    stopped_early = true;
                    warn!(
                        max_concepts = self.config.max_concepts,
                        processed,
                        remaining = documents.len() - processed,
                        "Concept ceiling reached, stopping extraction early"
                    );
                }
                break;
            }
        }

        let result = ExtractionResult {
            concepts: vocabulary.into_concepts(),
            cooccurrence: cooccurrence.into_pairs(),
            document_concepts,
            documents_processed: processed,
            stopped_early,
        };

        info!(
            documents = processed,
            concepts = result.concepts.len(),
            pairs = result.cooccurrence.len(),
            "Extracted concepts"
        );

        result
    }

    /// Normalized key for a candidate, or `None` when it fails the validity
    /// filter. Gazetteer hits keep their symbols.
    fn candidate_key(&self, text: &str, concept_type: ConceptType) -> Option<String> {
        if concept_type == ConceptType::Domain {
            let key = normalize_domain_term(text);
            return is_valid_domain_term(&key, self.config.max_length).then_some(key);
        }
        let key = normalize_term(text);
        is_valid_concept(
            &key,
            self.config.min_length,
            self.config.max_length,
            &self.stop_words,
        )
        .then_some(key)
    }

    /// Run one document through every source and channel, then fold its
    /// strongest concepts into the shared state. Returns what was kept.
    fn process_document(
        &self,
        doc: &Document,
        vocabulary: &mut Vocabulary,
        cooccurrence: &mut CooccurrenceTable,
    ) -> Vec<DocumentConcept> {
        let mut local: HashMap<String, LocalConcept> = HashMap::new();

        let sources = [
            (TextSource::Body, doc.content.clone()),
            (TextSource::Headings, doc.heading_text()),
            (TextSource::Frontmatter, doc.frontmatter_text()),
        ];

        for (source, text) in &sources {
            for candidate in self.patterns.extract(text, &self.stop_words) {
                let Some(key) = self.candidate_key(&candidate.text, candidate.concept_type)
                else {
                    continue;
                };

                let weight = source.weight() * candidate.concept_type.multiplier();
                let entry = local.entry(key).or_insert_with(|| LocalConcept {
                    contribution: Contribution {
                        text: candidate.text.clone(),
                        concept_type: candidate.concept_type,
                        category: candidate.category.clone(),
                        sources: BTreeSet::new(),
                        weight: 0.0,
                        count: 0,
                    },
                });
                entry.contribution.weight += weight;
                entry.contribution.count += 1;
                entry.contribution.sources.insert(*source);
            }
        }

        let mut ranked: Vec<(String, LocalConcept)> = local.into_iter().collect();
        ranked.sort_by(|a, b| {
            b.1.contribution
                .weight
                .partial_cmp(&a.1.contribution.weight)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.0.cmp(&b.0))
        });
        ranked.truncate(self.config.max_concepts_per_document);

        let mut kept = Vec::with_capacity(ranked.len());
        for (key, concept) in ranked {
            let weight = concept.contribution.weight;
            if vocabulary.upsert(&key, &doc.path, concept.contribution) {
                kept.push(DocumentConcept {
                    concept: key,
                    weight,
                });
            }
        }

        let top: Vec<&str> = kept
            .iter()
            .take(COOCCURRENCE_TOP_N)
            .map(|c| c.concept.as_str())
            .collect();
        for (i, a) in top.iter().enumerate() {
            for b in &top[i + 1..] {
                cooccurrence.record(a, b);
            }
        }

        kept
    }

    /// Merge near-duplicate concepts (plurals, spelling variants) among the
    /// `merge_window` most frequent concepts.
    pub fn normalize_concepts(&self, result: &mut ExtractionResult) -> MergeReport {
        merge::normalize_concepts(result, self.config.merge_window)
    }

    /// Most frequent concepts first, skipping those below `min_frequency`.
    pub fn get_top_concepts(&self, result: &ExtractionResult, limit: usize) -> Vec<TopConcept> {
        let mut concepts: Vec<&Concept> = result
            .concepts
            .values()
            .filter(|c| c.frequency >= self.config.min_frequency)
            .collect();
        concepts.sort_by(|a, b| b.frequency.cmp(&a.frequency).then_with(|| a.key.cmp(&b.key)));

        concepts
            .into_iter()
            .take(limit)
            .map(|c| TopConcept {
                concept: c.key.clone(),
                text: c.text.clone(),
                concept_type: c.concept_type,
                category: c.category.clone(),
                frequency: c.frequency,
                file_count: c.files.len(),
                total_weight: c.weight,
            })
            .collect()
    }
}
