// Prefetch pattern learning.
//
// Recent accesses are kept in a bounded window. Adjacent pairs that keep
// recurring (A then B) become patterns; in learning mode a pattern is
// promoted into a `trigger -> prefetch keys` entry with the pattern's
// confidence as its probability. Prefetching is best-effort throughout.

use std::collections::{BTreeMap, HashMap, VecDeque};

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use super::key::query_key;

/// Learned entries kept at most; new promotions are skipped beyond this.
const MAX_LEARNED_PATTERNS: usize = 1_000;

/// One `(tool, params)` access.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccessEvent {
    pub tool: String,
    pub params: Value,
}

impl AccessEvent {
    pub fn new(tool: impl Into<String>, params: Value) -> Self {
        Self {
            tool: tool.into(),
            params,
        }
    }

    /// Cache key this access resolves to.
    pub fn key(&self) -> String {
        query_key(&self.tool, &self.params)
    }
}

/// A recurring access sequence observed in the window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pattern {
    pub sequence: Vec<String>,
    pub count: u32,
    /// count / (window length - 1)
    pub confidence: f64,
}

/// A pattern promoted into the prefetch table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LearnedPattern {
    pub id: String,
    pub trigger: String,
    pub prefetch_keys: Vec<String>,
    pub probability: f64,
    pub learned_at: DateTime<Utc>,
}

/// Serialized form of both record kinds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PrefetchRecord {
    Pattern(Pattern),
    Learned(LearnedPattern),
}

/// Source of values for prefetched keys.
#[async_trait]
pub trait PrefetchLoader<V>: Send + Sync {
    async fn load(&self, key: &str) -> Result<V>;
}

#[derive(Debug, Clone)]
pub struct PatternTracker {
    window: VecDeque<String>,
    capacity: usize,
    threshold: u32,
    learned: BTreeMap<String, LearnedPattern>,
}

impl PatternTracker {
    pub fn new(capacity: usize, threshold: u32) -> Self {
        Self {
            window: VecDeque::with_capacity(capacity),
            capacity: capacity.max(2),
            threshold: threshold.max(1),
            learned: BTreeMap::new(),
        }
    }

    pub fn record(&mut self, key: String) {
        if self.window.len() >= self.capacity {
            self.window.pop_front();
        }
        self.window.push_back(key);
    }

    pub fn window_len(&self) -> usize {
        self.window.len()
    }

    /// Adjacent pairs seen at least `threshold` times, most frequent first.
    /// Immediate repeats of the same key are ignored.
    pub fn detect(&self) -> Vec<Pattern> {
        if self.window.len() < 2 {
            return Vec::new();
        }

        let mut counts: HashMap<(&str, &str), u32> = HashMap::new();
        for (a, b) in self.window.iter().zip(self.window.iter().skip(1)) {
            if a != b {
                *counts.entry((a.as_str(), b.as_str())).or_insert(0) += 1;
            }
        }

        let transitions = (self.window.len() - 1) as f64;
        let mut patterns: Vec<Pattern> = counts
            .into_iter()
            .filter(|(_, count)| *count >= self.threshold)
            .map(|((a, b), count)| Pattern {
                sequence: vec![a.to_string(), b.to_string()],
                count,
                confidence: count as f64 / transitions,
            })
            .collect();

        patterns.sort_by(|x, y| {
            y.count
                .cmp(&x.count)
                .then_with(|| x.sequence.cmp(&y.sequence))
        });
        patterns
    }

    /// Promote every detected pattern into the learned table. Returns how
    /// many new entries were created.
    pub fn learn(&mut self) -> usize {
        let mut promoted = 0;
        for pattern in self.detect() {
            let [trigger, target] = [&pattern.sequence[0], &pattern.sequence[1]];
            let id = format!("{trigger}->{target}");

            if let Some(existing) = self.learned.get_mut(&id) {
                existing.probability = pattern.confidence;
                continue;
            }
            if self.learned.len() >= MAX_LEARNED_PATTERNS {
                continue;
            }

            debug!(
                trigger = trigger.as_str(),
                target = target.as_str(),
                probability = pattern.confidence,
                "Learned prefetch pattern"
            );
            self.learned.insert(
                id.clone(),
                LearnedPattern {
                    id,
                    trigger: trigger.clone(),
                    prefetch_keys: vec![target.clone()],
                    probability: pattern.confidence,
                    learned_at: Utc::now(),
                },
            );
            promoted += 1;
        }
        promoted
    }

    /// Learned patterns, highest probability first.
    pub fn learned(&self) -> Vec<LearnedPattern> {
        let mut patterns: Vec<LearnedPattern> = self.learned.values().cloned().collect();
        sort_by_probability(&mut patterns);
        patterns
    }

    /// Keys to prefetch after `trigger`, ordered by pattern probability,
    /// without duplicates and at most `limit`.
    pub fn prefetch_keys(&self, trigger: &str, limit: usize) -> Vec<String> {
        let mut matching: Vec<&LearnedPattern> =
            self.learned.values().filter(|p| p.trigger == trigger).collect();
        matching.sort_by(|a, b| {
            b.probability
                .partial_cmp(&a.probability)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.id.cmp(&b.id))
        });

        let mut keys: Vec<String> = Vec::new();
        for pattern in matching {
            for key in &pattern.prefetch_keys {
                if key != trigger && !keys.contains(key) {
                    keys.push(key.clone());
                }
            }
        }
        keys.truncate(limit);
        keys
    }

    pub fn clear(&mut self) {
        self.window.clear();
        self.learned.clear();
    }

    /// Detected patterns and learned entries as a JSON array of tagged records.
    pub fn export(&self) -> Result<String> {
        let records: Vec<PrefetchRecord> = self
            .detect()
            .into_iter()
            .map(PrefetchRecord::Pattern)
            .chain(self.learned().into_iter().map(PrefetchRecord::Learned))
            .collect();
        serde_json::to_string_pretty(&records).context("Failed to serialize prefetch records")
    }

    /// Load learned entries from exported JSON. Pattern records describe a
    /// past window and are skipped. Returns how many entries were imported.
    pub fn import(&mut self, json: &str) -> Result<usize> {
        let records: Vec<PrefetchRecord> =
            serde_json::from_str(json).context("Invalid prefetch records")?;
        let mut imported = 0;
        for record in records {
            if let PrefetchRecord::Learned(pattern) = record {
                if self.learned.len() >= MAX_LEARNED_PATTERNS
                    && !self.learned.contains_key(&pattern.id)
                {
                    continue;
                }
                self.learned.insert(pattern.id.clone(), pattern);
                imported += 1;
            }
        }
        Ok(imported)
    }
}

fn sort_by_probability(patterns: &mut [LearnedPattern]) {
    patterns.sort_by(|a, b| {
        b.probability
            .partial_cmp(&a.probability)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.id.cmp(&b.id))
    });
}
