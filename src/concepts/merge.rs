// Near-duplicate merging over the concept vocabulary.
//
// Only the `window` most frequent concepts take part; the tail is left as is.
// Candidates are compared with a cheap gate (length ratio, containment,
// character-set Jaccard) before the edit-distance check. Every concept
// reachable from a seed through similar pairs joins the seed's group, and the
// group collapses onto its most frequent member.

use std::collections::{HashMap, HashSet};

use tracing::{debug, info};

use super::extractor::{DocumentConcept, ExtractionResult};
use super::vocabulary::{pair_key, CooccurrencePair};

/// Seeds examined per chunk of the merge walk.
const MERGE_CHUNK_SIZE: usize = 100;

/// Maximum length difference, as a fraction of the longer term.
const MAX_LENGTH_DELTA: f64 = 0.3;

const MIN_CHARSET_JACCARD: f64 = 0.6;

const MIN_EDIT_SIMILARITY: f64 = 0.85;

/// Summary of a merge pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MergeReport {
    /// Concepts inside the merge window
    pub examined: usize,
    /// Groups with more than one member
    pub groups: usize,
    /// Concepts folded into a canonical form and removed
    pub merged: usize,
}

/// Merge near-duplicates among the `window` most frequent concepts.
pub fn normalize_concepts(result: &mut ExtractionResult, window: usize) -> MergeReport {
    let mut ordered: Vec<String> = result.concepts.keys().cloned().collect();
    ordered.sort_by(|a, b| {
        let ca = &result.concepts[a];
        let cb = &result.concepts[b];
        cb.frequency
            .cmp(&ca.frequency)
            .then_with(|| {
                cb.weight
                    .partial_cmp(&ca.weight)
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
            .then_with(|| a.cmp(b))
    });
    ordered.truncate(window);

    let n = ordered.len();
    let mut processed = vec![false; n];
    let mut renames: HashMap<String, String> = HashMap::new();
    let mut report = MergeReport {
        examined: n,
        ..Default::default()
    };

    let indices: Vec<usize> = (0..n).collect();
    for (chunk_index, chunk) in indices.chunks(MERGE_CHUNK_SIZE).enumerate() {
        for &seed in chunk {
            if processed[seed] {
                continue;
            }
            processed[seed] = true;

            let mut group = vec![seed];
            let mut queue = vec![seed];
            while let Some(current) = queue.pop() {
                for other in (seed + 1)..n {
                    if processed[other] {
                        continue;
                    }
                    if are_similar(&ordered[current], &ordered[other]) {
                        processed[other] = true;
                        group.push(other);
                        queue.push(other);
                    }
                }
            }

            if group.len() > 1 {
                // `ordered` is sorted by frequency, so the seed is the canonical form.
                let canonical = ordered[seed].clone();
                for &member in &group[1..] {
                    let variant = &ordered[member];
                    if let Some(folded) = result.concepts.remove(variant) {
                        if let Some(target) = result.concepts.get_mut(&canonical) {
                            target.absorb(folded);
                        }
                    }
                    renames.insert(variant.clone(), canonical.clone());
                    report.merged += 1;
                }
                report.groups += 1;
            }
        }
        debug!(chunk = chunk_index, merged = report.merged, "Merge chunk done");
    }

    if !renames.is_empty() {
        rekey_documents(&mut result.document_concepts, &renames);
        rekey_cooccurrence(&mut result.cooccurrence, &renames);
    }

    info!(
        examined = report.examined,
        groups = report.groups,
        merged = report.merged,
        remaining = result.concepts.len(),
        "Normalized concepts"
    );

    report
}

/// Cheap gate followed by the edit-distance check.
pub fn are_similar(a: &str, b: &str) -> bool {
    let len_a = a.chars().count();
    let len_b = b.chars().count();
    let longer = len_a.max(len_b);
    if longer == 0 {
        return false;
    }
    if (len_a as f64 - len_b as f64).abs() > MAX_LENGTH_DELTA * longer as f64 {
        return false;
    }
    if a.contains(b) || b.contains(a) {
        return true;
    }
    if charset_jaccard(a, b) <= MIN_CHARSET_JACCARD {
        return false;
    }
    strsim::normalized_levenshtein(a, b) > MIN_EDIT_SIMILARITY
}

/// Jaccard similarity of the two terms' character sets.
pub fn charset_jaccard(a: &str, b: &str) -> f64 {
    let set_a: HashSet<char> = a.chars().collect();
    let set_b: HashSet<char> = b.chars().collect();
    let union = set_a.union(&set_b).count();
    if union == 0 {
        return 0.0;
    }
    set_a.intersection(&set_b).count() as f64 / union as f64
}

fn rekey_documents(
    documents: &mut HashMap<String, Vec<DocumentConcept>>,
    renames: &HashMap<String, String>,
) {
    for concepts in documents.values_mut() {
        if !concepts.iter().any(|c| renames.contains_key(&c.concept)) {
            continue;
        }
        let mut merged: Vec<DocumentConcept> = Vec::with_capacity(concepts.len());
        for concept in concepts.drain(..) {
            let key = renames
                .get(&concept.concept)
                .cloned()
                .unwrap_or(concept.concept);
            match merged.iter_mut().find(|c| c.concept == key) {
                Some(existing) => existing.weight += concept.weight,
                None => merged.push(DocumentConcept {
                    concept: key,
                    weight: concept.weight,
                }),
            }
        }
        merged.sort_by(|a, b| {
            b.weight
                .partial_cmp(&a.weight)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.concept.cmp(&b.concept))
        });
        *concepts = merged;
    }
}

fn rekey_cooccurrence(
    pairs: &mut HashMap<String, CooccurrencePair>,
    renames: &HashMap<String, String>,
) {
    let old = std::mem::take(pairs);
    for (_, pair) in old {
        let a = renames.get(&pair.concept_a).unwrap_or(&pair.concept_a);
        let b = renames.get(&pair.concept_b).unwrap_or(&pair.concept_b);
        if a == b {
            continue;
        }
        let (first, second) = if a <= b { (a, b) } else { (b, a) };
        pairs
            .entry(pair_key(first, second))
            .or_insert_with(|| CooccurrencePair {
                concept_a: first.clone(),
                concept_b: second.clone(),
                count: 0,
            })
            .count += pair.count;
    }
}
