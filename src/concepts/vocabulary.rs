// Vocabulary - the bounded concept accumulator owned by one extraction pass,
// plus the symmetric co-occurrence table.
//
// Both structures enforce soft ceilings: once full they stop accepting new
// keys and log the fact once. Nothing here ever fails.

use std::collections::{BTreeSet, HashMap};

use serde::{Deserialize, Serialize};
use tracing::warn;

use super::patterns::ConceptType;

/// Which part of a document a concept was pulled from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TextSource {
    Body,
    Headings,
    Frontmatter,
}

impl TextSource {
    /// Weight applied to every match from this source.
    pub fn weight(self) -> f64 {
        match self {
            TextSource::Body => 1.0,
            TextSource::Headings => 2.0,
            TextSource::Frontmatter => 1.5,
        }
    }
}

/// A canonical concept and everything folded into it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Concept {
    /// Normalized term, unique across the vocabulary
    pub key: String,
    /// Display text as first seen
    pub text: String,
    pub concept_type: ConceptType,
    pub category: String,
    /// Paths of documents the concept was kept for
    pub files: BTreeSet<String>,
    /// Text sources it was extracted from
    pub sources: BTreeSet<TextSource>,
    pub weight: f64,
    pub frequency: u64,
}

impl Concept {
    /// Fold another concept's files, sources, weight and frequency into this one.
    pub fn absorb(&mut self, other: Concept) {
        self.files.extend(other.files);
        self.sources.extend(other.sources);
        self.weight += other.weight;
        self.frequency += other.frequency;
    }
}

/// Concept contribution from a single document, before it is accumulated.
#[derive(Debug, Clone)]
pub struct Contribution {
    pub text: String,
    pub concept_type: ConceptType,
    pub category: String,
    pub sources: BTreeSet<TextSource>,
    pub weight: f64,
    pub count: u64,
}

/// Concept map with a hard cap on distinct keys.
#[derive(Debug, Clone, Default)]
pub struct Vocabulary {
    concepts: HashMap<String, Concept>,
    max_concepts: usize,
    rejected: u64,
}

impl Vocabulary {
    pub fn new(max_concepts: usize) -> Self {
        Self {
            concepts: HashMap::new(),
            max_concepts,
            rejected: 0,
        }
    }

    /// Accumulate a document's contribution under `key`.
    ///
    /// Display text, type and category are fixed by the first insertion.
    /// Returns false when the key is new and the vocabulary is already full.
    pub fn upsert(&mut self, key: &str, path: &str, contribution: Contribution) -> bool {
        if let Some(existing) = self.concepts.get_mut(key) {
            existing.frequency += contribution.count;
            existing.weight += contribution.weight;
            existing.files.insert(path.to_string());
            existing.sources.extend(contribution.sources);
            return true;
        }

        if self.concepts.len() >= self.max_concepts {
            self.rejected += 1;
            return false;
        }

        self.concepts.insert(
            key.to_string(),
            Concept {
                key: key.to_string(),
                text: contribution.text,
                concept_type: contribution.concept_type,
                category: contribution.category,
                files: BTreeSet::from([path.to_string()]),
                sources: contribution.sources,
                weight: contribution.weight,
                frequency: contribution.count,
            },
        );
        true
    }

    pub fn len(&self) -> usize {
        self.concepts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.concepts.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.concepts.len() >= self.max_concepts
    }

    /// New keys turned away because the vocabulary was full.
    pub fn rejected(&self) -> u64 {
        self.rejected
    }

    pub fn into_concepts(self) -> HashMap<String, Concept> {
        self.concepts
    }
}

/// An unordered concept pair and how many documents had both in their top set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CooccurrencePair {
    pub concept_a: String,
    pub concept_b: String,
    pub count: u64,
}

/// Symmetric key for a concept pair: the two terms sorted and joined.
pub fn pair_key(a: &str, b: &str) -> String {
    if a <= b {
        format!("{a}|{b}")
    } else {
        format!("{b}|{a}")
    }
}

/// Co-occurrence counts with a ceiling on distinct pairs.
///
/// Once the ceiling is reached, recording stops for good, including
/// increments of pairs already present.
#[derive(Debug, Clone, Default)]
pub struct CooccurrenceTable {
    pairs: HashMap<String, CooccurrencePair>,
    max_records: usize,
    saturated: bool,
}

impl CooccurrenceTable {
    pub fn new(max_records: usize) -> Self {
        Self {
            pairs: HashMap::new(),
            max_records,
            saturated: false,
        }
    }

    pub fn record(&mut self, a: &str, b: &str) {
        if self.saturated || a == b {
            return;
        }
        if self.pairs.len() >= self.max_records {
            self.saturated = true;
            warn!(
                max_records = self.max_records,
                "Co-occurrence ceiling reached, no further pairs will be recorded"
            );
            return;
        }

        let (first, second) = if a <= b { (a, b) } else { (b, a) };
        self.pairs
            .entry(pair_key(a, b))
            .or_insert_with(|| CooccurrencePair {
                concept_a: first.to_string(),
                concept_b: second.to_string(),
                count: 0,
            })
            .count += 1;
    }

    pub fn is_saturated(&self) -> bool {
        self.saturated
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn into_pairs(self) -> HashMap<String, CooccurrencePair> {
        self.pairs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn contribution(text: &str, weight: f64, count: u64) -> Contribution {
        Contribution {
            text: text.to_string(),
            concept_type: ConceptType::Noun,
            category: "noun".to_string(),
            sources: BTreeSet::from([TextSource::Body]),
            weight,
            count,
        }
    }

    #[test]
    fn test_pair_key_is_order_independent() {
        assert_eq!(pair_key("gas", "evm"), pair_key("evm", "gas"));
        assert_eq!(pair_key("gas", "evm"), "evm|gas");
    }

    #[test]
    fn test_cooccurrence_counts_both_orders_once() {
        let mut table = CooccurrenceTable::new(10);
        table.record("gas", "evm");
        table.record("evm", "gas");
        table.record("gas", "gas");
        let pairs = table.into_pairs();
        assert_eq!(pairs.len(), 1);
        assert_eq!(pairs["evm|gas"].count, 2);
        assert_eq!(pairs["evm|gas"].concept_a, "evm");
    }

    #[test]
    fn test_cooccurrence_stops_permanently_at_ceiling() {
        let mut table = CooccurrenceTable::new(1);
        table.record("a1", "b1");
        table.record("a2", "b2");
        table.record("a1", "b1");
        assert!(table.is_saturated());
        let pairs = table.into_pairs();
        assert_eq!(pairs.len(), 1);
        assert_eq!(pairs["a1|b1"].count, 1);
    }

    #[test]
    fn test_vocabulary_first_insert_fixes_display_text() {
        let mut vocab = Vocabulary::new(10);
        vocab.upsert("gas", "a.md", contribution("Gas", 2.0, 2));
        vocab.upsert("gas", "b.md", contribution("GAS", 1.0, 1));
        let concepts = vocab.into_concepts();
        let gas = &concepts["gas"];
        assert_eq!(gas.text, "Gas");
        assert_eq!(gas.frequency, 3);
        assert!((gas.weight - 3.0).abs() < 1e-9);
        assert_eq!(gas.files.len(), 2);
    }

    #[test]
    fn test_vocabulary_rejects_new_keys_when_full() {
        let mut vocab = Vocabulary::new(1);
        assert!(vocab.upsert("gas", "a.md", contribution("gas", 1.0, 1)));
        assert!(!vocab.upsert("evm", "a.md", contribution("evm", 1.0, 1)));
        assert!(vocab.upsert("gas", "b.md", contribution("gas", 1.0, 1)));
        assert_eq!(vocab.rejected(), 1);
        assert_eq!(vocab.len(), 1);
    }
}
