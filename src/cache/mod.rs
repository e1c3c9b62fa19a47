// Adaptive memoization cache: byte-budgeted LRU with TTL expiry, coalesced
// loads, learned prefetch patterns and heuristic query planning.

pub mod key;
pub mod planner;
pub mod prefetch;
pub mod store;

pub use key::{parse_similarity_key, query_key, similarity_key, similarity_params};
pub use planner::{QueryPlan, QueryPlanner, QueryStrategy};
pub use prefetch::{
    AccessEvent, LearnedPattern, Pattern, PatternTracker, PrefetchLoader, PrefetchRecord,
};
pub use store::{AdaptiveCache, CacheConfig, CacheEntry, CacheStats};
