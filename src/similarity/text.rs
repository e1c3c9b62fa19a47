// Text helpers for exact-match similarity.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

/// Sentences shorter than this are ignored when looking for duplicated segments.
pub const MIN_SEGMENT_CHARS: usize = 50;

/// Jaro-Winkler similarity a sentence pair needs to count as duplicated.
pub const SEGMENT_SIMILARITY: f64 = 0.9;

/// Lowercase, drop punctuation, collapse whitespace.
pub fn normalize_text(text: &str) -> String {
    text.to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() || c.is_whitespace() { c } else { ' ' })
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Word n-gram shingles of normalized text.
///
/// Texts with fewer than `n` words produce a single shingle holding the whole
/// text, so two identical short texts still compare equal.
pub fn shingles(normalized: &str, n: usize) -> HashSet<String> {
    let words: Vec<&str> = normalized.split_whitespace().collect();
    if words.is_empty() {
        return HashSet::new();
    }
    if words.len() < n {
        return HashSet::from([words.join(" ")]);
    }
    words.windows(n).map(|w| w.join(" ")).collect()
}

/// |A ∩ B| / |A ∪ B|, or 0.0 when both sets are empty.
pub fn jaccard<T: Eq + std::hash::Hash>(a: &HashSet<T>, b: &HashSet<T>) -> f64 {
    let union = a.union(b).count();
    if union == 0 {
        return 0.0;
    }
    a.intersection(b).count() as f64 / union as f64
}

/// Jaro-Winkler similarity evaluated in a fixed argument order, so the result
/// does not depend on which document is passed first.
pub fn jaro_winkler(a: &str, b: &str) -> f64 {
    if a <= b {
        strsim::jaro_winkler(a, b)
    } else {
        strsim::jaro_winkler(b, a)
    }
}

/// Split on `.`, `!` and `?`, keeping trimmed sentences of at least
/// `MIN_SEGMENT_CHARS` characters.
pub fn long_sentences(text: &str) -> Vec<&str> {
    text.split(['.', '!', '?'])
        .map(str::trim)
        .filter(|s| s.chars().count() >= MIN_SEGMENT_CHARS)
        .collect()
}

/// A sentence of one document that nearly repeats a sentence of another.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentMatch {
    pub source: String,
    pub target: String,
    pub similarity: f64,
}

/// Up to `limit` sentence pairs whose Jaro-Winkler similarity exceeds
/// `SEGMENT_SIMILARITY`, in document order.
pub fn duplicated_segments(a: &str, b: &str, limit: usize) -> Vec<SegmentMatch> {
    let sentences_b: Vec<(&str, String)> = long_sentences(b)
        .into_iter()
        .map(|s| (s, s.to_lowercase()))
        .collect();

    let mut matches = Vec::new();
    for sa in long_sentences(a) {
        let lower_a = sa.to_lowercase();
        for (sb, lower_b) in &sentences_b {
            let similarity = jaro_winkler(&lower_a, lower_b);
            if similarity > SEGMENT_SIMILARITY {
                matches.push(SegmentMatch {
                    source: sa.to_string(),
                    target: sb.to_string(),
                    similarity,
                });
                if matches.len() >= limit {
                    return matches;
                }
            }
        }
    }
    matches
}
