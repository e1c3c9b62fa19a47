// Term normalization and the concept validity filter.

use std::collections::HashSet;

use stop_words::{get, LANGUAGE};

/// Canonical form of a term: lowercase, only word characters, hyphens and
/// single spaces, trimmed.
///
/// Idempotent: `normalize_term(&normalize_term(x)) == normalize_term(x)`.
pub fn normalize_term(text: &str) -> String {
    let lowered = text.to_lowercase();
    let stripped: String = lowered
        .chars()
        .filter(|c| c.is_alphanumeric() || *c == '_' || *c == '-' || c.is_whitespace())
        .collect();
    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Canonical form of a configured gazetteer term: lowercase with single
/// spaces. Symbols are kept so that `c++` and `c` stay distinct concepts.
pub fn normalize_domain_term(text: &str) -> String {
    text.to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Stop-word list used by the validity filter and phrase chunking.
///
/// A custom list replaces the default English list entirely.
#[derive(Debug, Clone)]
pub struct StopWords {
    words: HashSet<String>,
}

impl StopWords {
    pub fn english() -> Self {
        let words: Vec<String> = get(LANGUAGE::English);
        Self::from_words(words)
    }

    pub fn from_words<I, S>(words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            words: words
                .into_iter()
                .map(|w| normalize_term(w.as_ref()))
                .filter(|w| !w.is_empty())
                .collect(),
        }
    }

    /// Custom list when given, the English list otherwise.
    pub fn resolve(custom: Option<&[String]>) -> Self {
        match custom {
            Some(words) => Self::from_words(words),
            None => Self::english(),
        }
    }

    pub fn contains(&self, normalized: &str) -> bool {
        self.words.contains(normalized)
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }
}

/// Check a normalized term against the length bounds and stop list.
///
/// Rejects terms that are purely numeric or symbolic, terms with no word of
/// at least two letters (runs of single letters), and multi-word terms that
/// start or end on a stop word.
pub fn is_valid_concept(
    normalized: &str,
    min_length: usize,
    max_length: usize,
    stop_words: &StopWords,
) -> bool {
    let len = normalized.chars().count();
    if len < min_length || len > max_length {
        return false;
    }
    if !normalized.chars().any(|c| c.is_alphabetic()) {
        return false;
    }
    if stop_words.contains(normalized) {
        return false;
    }

    let words: Vec<&str> = normalized.split(' ').collect();
    if !words
        .iter()
        .any(|w| w.chars().filter(|c| c.is_alphabetic()).count() >= 2)
    {
        return false;
    }
    if words.len() > 1 {
        let first = words[0];
        let last = words[words.len() - 1];
        if stop_words.contains(first) || stop_words.contains(last) {
            return false;
        }
    }

    true
}

/// Validity filter for gazetteer hits. The terms were declared explicitly, so
/// only the length ceiling and the need for a letter apply.
pub fn is_valid_domain_term(normalized: &str, max_length: usize) -> bool {
    normalized.chars().count() <= max_length && normalized.chars().any(|c| c.is_alphabetic())
}
