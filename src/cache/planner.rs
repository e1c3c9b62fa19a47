// Query planning - heuristic strategy and latency estimate per tool

use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Latency samples kept per tool.
const MAX_SAMPLES: usize = 10;

/// Estimate reported for answers already resident in the cache.
const CACHED_LATENCY_MS: u64 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QueryStrategy {
    MetadataOnly,
    Cached,
    FullLoad,
}

impl QueryStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueryStrategy::MetadataOnly => "METADATA_ONLY",
            QueryStrategy::Cached => "CACHED",
            QueryStrategy::FullLoad => "FULL_LOAD",
        }
    }
}

impl fmt::Display for QueryStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryPlan {
    pub tool: String,
    pub strategy: QueryStrategy,
    pub estimated_latency_ms: u64,
    /// Number of timings behind the estimate (0 means the default was used).
    pub samples: usize,
}

#[derive(Debug, Clone)]
pub struct QueryPlanner {
    default_latency_ms: u64,
    metadata_tools: HashSet<String>,
    timings: HashMap<String, VecDeque<u64>>,
}

impl QueryPlanner {
    pub fn new(default_latency_ms: u64, metadata_tools: impl IntoIterator<Item = String>) -> Self {
        Self {
            default_latency_ms,
            metadata_tools: metadata_tools.into_iter().collect(),
            timings: HashMap::new(),
        }
    }

    /// Cached answers win, then metadata-only tools, else a full load.
    pub fn plan(&self, tool: &str, cached: bool) -> QueryPlan {
        if cached {
            return QueryPlan {
                tool: tool.to_string(),
                strategy: QueryStrategy::Cached,
                estimated_latency_ms: CACHED_LATENCY_MS,
                samples: 0,
            };
        }
        let strategy = if self.metadata_tools.contains(tool) {
            QueryStrategy::MetadataOnly
        } else {
            QueryStrategy::FullLoad
        };
        let (estimated_latency_ms, samples) = self.estimate(tool);
        QueryPlan {
            tool: tool.to_string(),
            strategy,
            estimated_latency_ms,
            samples,
        }
    }

    /// Plan used when planning is switched off.
    pub fn default_plan(&self, tool: &str) -> QueryPlan {
        QueryPlan {
            tool: tool.to_string(),
            strategy: QueryStrategy::FullLoad,
            estimated_latency_ms: self.default_latency_ms,
            samples: 0,
        }
    }

    /// Average of the most recent samples, or the default for unseen tools.
    pub fn estimate(&self, tool: &str) -> (u64, usize) {
        match self.timings.get(tool) {
            Some(samples) if !samples.is_empty() => {
                let total: u64 = samples.iter().sum();
                (total / samples.len() as u64, samples.len())
            }
            _ => (self.default_latency_ms, 0),
        }
    }

    pub fn record_timing(&mut self, tool: &str, elapsed: Duration) {
        let samples = self.timings.entry(tool.to_string()).or_default();
        if samples.len() >= MAX_SAMPLES {
            samples.pop_front();
        }
        samples.push_back(elapsed.as_millis() as u64);
    }
}
