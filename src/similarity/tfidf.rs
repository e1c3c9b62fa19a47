// Corpus-wide TF-IDF index for semantic similarity.
//
// Each document keeps only its strongest terms. Two documents are compared by
// the cosine of their weight vectors over the union of those term lists.

use std::collections::{BTreeSet, HashMap};

use tracing::info;

use super::text::normalize_text;
use crate::concepts::StopWords;
use crate::corpus::Corpus;

/// Terms kept per document.
pub const DEFAULT_TOP_TERMS: usize = 50;

#[derive(Debug, Clone, Default)]
pub struct TfIdfIndex {
    vectors: HashMap<String, HashMap<String, f64>>,
    idf: HashMap<String, f64>,
    document_count: usize,
}

impl TfIdfIndex {
    /// Build the index over every document in the corpus.
    ///
    /// IDF is smoothed (`ln((1 + N) / (1 + df)) + 1`) so a term present in
    /// every document still carries weight. Documents without any usable term
    /// are left unindexed.
    pub fn build(corpus: &Corpus, stop_words: &StopWords, top_terms: usize) -> Self {
        let mut term_counts: HashMap<&str, HashMap<String, usize>> = HashMap::new();
        let mut document_frequency: HashMap<String, usize> = HashMap::new();

        for (path, doc) in corpus {
            let counts = term_frequencies(&doc.content, stop_words);
            if counts.is_empty() {
                continue;
            }
            for term in counts.keys() {
                *document_frequency.entry(term.clone()).or_insert(0) += 1;
            }
            term_counts.insert(path.as_str(), counts);
        }

        let n = corpus.len() as f64;
        let idf: HashMap<String, f64> = document_frequency
            .into_iter()
            .map(|(term, df)| {
                let weight = ((1.0 + n) / (1.0 + df as f64)).ln() + 1.0;
                (term, weight)
            })
            .collect();

        let mut vectors = HashMap::with_capacity(term_counts.len());
        for (path, counts) in term_counts {
            let total: usize = counts.values().sum();
            let mut weighted: Vec<(String, f64)> = counts
                .into_iter()
                .map(|(term, count)| {
                    let tf = count as f64 / total as f64;
                    let weight = tf * idf.get(&term).copied().unwrap_or(0.0);
                    (term, weight)
                })
                .collect();
            weighted.sort_by(|a, b| {
                b.1.partial_cmp(&a.1)
                    .unwrap_or(std::cmp::Ordering::Equal)
                    .then_with(|| a.0.cmp(&b.0))
            });
            weighted.truncate(top_terms);
            vectors.insert(path.to_string(), weighted.into_iter().collect());
        }

        info!(
            documents = vectors.len(),
            vocabulary = idf.len(),
            "Built TF-IDF index"
        );

        Self {
            vectors,
            idf,
            document_count: corpus.len(),
        }
    }

    pub fn is_indexed(&self, path: &str) -> bool {
        self.vectors.contains_key(path)
    }

    /// A document's strongest terms, highest weight first.
    pub fn top_terms(&self, path: &str) -> Vec<(String, f64)> {
        let Some(vector) = self.vectors.get(path) else {
            return Vec::new();
        };
        let mut terms: Vec<(String, f64)> = vector.iter().map(|(t, w)| (t.clone(), *w)).collect();
        terms.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.0.cmp(&b.0))
        });
        terms
    }

    /// Cosine similarity over the union of both documents' top terms.
    /// Returns 0.0 when either document is unindexed.
    pub fn cosine(&self, a: &str, b: &str) -> f64 {
        let (Some(va), Some(vb)) = (self.vectors.get(a), self.vectors.get(b)) else {
            return 0.0;
        };

        let vocabulary: BTreeSet<&String> = va.keys().chain(vb.keys()).collect();
        let xs: Vec<f64> = vocabulary.iter().map(|t| va.get(*t).copied().unwrap_or(0.0)).collect();
        let ys: Vec<f64> = vocabulary.iter().map(|t| vb.get(*t).copied().unwrap_or(0.0)).collect();

        cosine_similarity(&xs, &ys)
    }

    pub fn document_count(&self) -> usize {
        self.document_count
    }

    pub fn vocabulary_size(&self) -> usize {
        self.idf.len()
    }
}

/// Cosine similarity of two equal-length vectors, clamped to [0, 1].
pub fn cosine_similarity(a: &[f64], b: &[f64]) -> f64 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot: f64 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let mag_a: f64 = a.iter().map(|x| x * x).sum::<f64>().sqrt();
    let mag_b: f64 = b.iter().map(|x| x * x).sum::<f64>().sqrt();

    let denom = mag_a * mag_b;
    if denom < f64::EPSILON {
        0.0
    } else {
        (dot / denom).clamp(0.0, 1.0)
    }
}

fn term_frequencies(content: &str, stop_words: &StopWords) -> HashMap<String, usize> {
    let mut counts = HashMap::new();
    for token in normalize_text(content).split_whitespace() {
        if token.chars().count() < 2
            || !token.chars().any(|c| c.is_alphabetic())
            || stop_words.contains(token)
        {
            continue;
        }
        *counts.entry(token.to_string()).or_insert(0) += 1;
    }
    counts
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::corpus::Document;

    fn corpus(docs: &[(&str, &str)]) -> Corpus {
        docs.iter()
            .map(|(p, c)| (p.to_string(), Document::new(*p, *c)))
            .collect()
    }

    fn stop() -> StopWords {
        StopWords::from_words(["the", "a", "of"])
    }

    #[test]
    fn test_identical_documents_have_cosine_one() {
        let c = corpus(&[("a.md", "validators sign blocks"), ("b.md", "validators sign blocks")]);
        let index = TfIdfIndex::build(&c, &stop(), DEFAULT_TOP_TERMS);
        assert!((index.cosine("a.md", "b.md") - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_disjoint_documents_have_cosine_zero() {
        let c = corpus(&[("a.md", "validators sign blocks"), ("b.md", "wallets hold keys")]);
        let index = TfIdfIndex::build(&c, &stop(), DEFAULT_TOP_TERMS);
        assert_eq!(index.cosine("a.md", "b.md"), 0.0);
    }

    #[test]
    fn test_unindexed_documents_score_zero() {
        let c = corpus(&[("a.md", "validators"), ("b.md", "the a of")]);
        let index = TfIdfIndex::build(&c, &stop(), DEFAULT_TOP_TERMS);
        assert!(index.is_indexed("a.md"));
        assert!(!index.is_indexed("b.md"));
        assert_eq!(index.cosine("a.md", "b.md"), 0.0);
        assert_eq!(index.cosine("a.md", "missing.md"), 0.0);
    }

    #[test]
    fn test_top_terms_truncated() {
        let c = corpus(&[("a.md", "alpha beta gamma delta alpha")]);
        let index = TfIdfIndex::build(&c, &stop(), 2);
        let terms = index.top_terms("a.md");
        assert_eq!(terms.len(), 2);
        assert_eq!(terms[0].0, "alpha");
    }
}
