// Adaptive cache - byte-budgeted LRU store with TTL expiry
//
// Two clocks per entry: insertion time for TTL and a logical access tick
// for LRU. An expired entry is always a miss even if it was read a moment
// ago. Concurrent `load` calls for one key share a single loader run.

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use anyhow::{anyhow, Result};
use futures::future::{BoxFuture, FutureExt, Shared};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use super::key::query_key;
use super::planner::{QueryPlan, QueryPlanner};
use super::prefetch::{AccessEvent, PatternTracker, PrefetchLoader, PrefetchRecord};

/// Cache behaviour knobs.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    pub enabled: bool,
    /// Byte budget; sizes are the serialized JSON length of each value.
    pub max_size_bytes: usize,
    pub ttl: Duration,
    pub enable_prefetch: bool,
    pub enable_learning: bool,
    pub enable_query_planning: bool,
    pub enable_deduplication: bool,
    pub pattern_threshold: u32,
    pub pattern_window: usize,
    pub max_prefetch_size: usize,
    pub default_latency_ms: u64,
    /// Tools answerable from graph metadata alone.
    pub metadata_tools: Vec<String>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_size_bytes: 50 * 1024 * 1024,
            ttl: Duration::from_secs(300),
            enable_prefetch: true,
            enable_learning: true,
            enable_query_planning: true,
            enable_deduplication: true,
            pattern_threshold: 3,
            pattern_window: 100,
            max_prefetch_size: 10,
            default_latency_ms: 100,
            metadata_tools: vec![
                "top_concepts".to_string(),
                "document_concepts".to_string(),
                "stats".to_string(),
            ],
        }
    }
}

/// A resident value with its size and both clocks.
#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
    pub value: V,
    pub size_bytes: usize,
    pub inserted_at: Instant,
    pub access_seq: u64,
    pub hit_count: u64,
}

impl<V> CacheEntry<V> {
    fn new(value: V, size_bytes: usize, access_seq: u64) -> Self {
        Self {
            value,
            size_bytes,
            inserted_at: Instant::now(),
            access_seq,
            hit_count: 0,
        }
    }

    pub fn is_expired(&self, ttl: Duration) -> bool {
        self.inserted_at.elapsed() > ttl
    }

    pub fn age(&self) -> Duration {
        self.inserted_at.elapsed()
    }
}

/// Point-in-time counters.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub sets: u64,
    pub evictions: u64,
    pub expirations: u64,
    pub prefetch_successes: u64,
    pub prefetch_failures: u64,
    pub coalesced: u64,
    pub entries: usize,
    pub resident_bytes: usize,
    pub hit_rate: f64,
}

#[derive(Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
    sets: AtomicU64,
    evictions: AtomicU64,
    expirations: AtomicU64,
    prefetch_successes: AtomicU64,
    prefetch_failures: AtomicU64,
    coalesced: AtomicU64,
}

impl Counters {
    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn reset(&self) {
        for counter in [
            &self.hits,
            &self.misses,
            &self.sets,
            &self.evictions,
            &self.expirations,
            &self.prefetch_successes,
            &self.prefetch_failures,
            &self.coalesced,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
    }
}

struct CacheState<V> {
    entries: HashMap<String, CacheEntry<V>>,
    resident_bytes: usize,
    tick: u64,
    /// Bumped by `clear`; loads started under an older generation don't
    /// write back.
    generation: u64,
}

impl<V> CacheState<V> {
    fn next_tick(&mut self) -> u64 {
        self.tick += 1;
        self.tick
    }

    fn remove(&mut self, key: &str) -> Option<CacheEntry<V>> {
        let entry = self.entries.remove(key)?;
        self.resident_bytes -= entry.size_bytes;
        Some(entry)
    }

    fn least_recent_key(&self) -> Option<String> {
        self.entries
            .iter()
            .min_by_key(|(_, entry)| entry.access_seq)
            .map(|(key, _)| key.clone())
    }
}

type SharedLoad<V> = Shared<BoxFuture<'static, Result<V, Arc<anyhow::Error>>>>;

struct CacheShared<V> {
    config: CacheConfig,
    state: Mutex<CacheState<V>>,
    in_flight: Mutex<HashMap<String, (u64, SharedLoad<V>)>>,
    next_flight: AtomicU64,
    patterns: Mutex<PatternTracker>,
    planner: Mutex<QueryPlanner>,
    counters: Counters,
}

/// Memoization cache shared between callers. Cloning is cheap and every
/// clone sees the same entries.
pub struct AdaptiveCache<V> {
    shared: Arc<CacheShared<V>>,
}

impl<V> Clone for AdaptiveCache<V> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl<V> AdaptiveCache<V>
where
    V: Clone + Serialize + Send + Sync + 'static,
{
    pub fn new(config: CacheConfig) -> Self {
        let patterns = PatternTracker::new(config.pattern_window, config.pattern_threshold);
        let planner = QueryPlanner::new(config.default_latency_ms, config.metadata_tools.clone());
        Self {
            shared: Arc::new(CacheShared {
                config,
                state: Mutex::new(CacheState {
                    entries: HashMap::new(),
                    resident_bytes: 0,
                    tick: 0,
                    generation: 0,
                }),
                in_flight: Mutex::new(HashMap::new()),
                next_flight: AtomicU64::new(0),
                patterns: Mutex::new(patterns),
                planner: Mutex::new(planner),
                counters: Counters::default(),
            }),
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.shared.config
    }

    pub fn is_enabled(&self) -> bool {
        self.shared.config.enabled
    }

    /// Look up a live entry. A hit refreshes recency; an expired entry is
    /// purged and reported as a miss.
    pub fn get(&self, key: &str) -> Option<V> {
        if !self.is_enabled() {
            return None;
        }
        let counters = &self.shared.counters;
        let mut state = lock(&self.shared.state);

        let expired = match state.entries.get(key) {
            None => {
                Counters::bump(&counters.misses);
                return None;
            }
            Some(entry) => entry.is_expired(self.shared.config.ttl),
        };

        if expired {
            state.remove(key);
            Counters::bump(&counters.expirations);
            Counters::bump(&counters.misses);
            return None;
        }

        let tick = state.next_tick();
        let entry = state.entries.get_mut(key)?;
        entry.access_seq = tick;
        entry.hit_count += 1;
        Counters::bump(&counters.hits);
        Some(entry.value.clone())
    }

    /// Whether a live entry exists. Does not touch recency or stats.
    pub fn has(&self, key: &str) -> bool {
        if !self.is_enabled() {
            return false;
        }
        let state = lock(&self.shared.state);
        state
            .entries
            .get(key)
            .is_some_and(|entry| !entry.is_expired(self.shared.config.ttl))
    }

    /// Insert or replace a value. Least-recently-accessed entries are
    /// evicted first until the new value fits; a value larger than the
    /// whole budget is not stored. Returns whether the value was stored.
    pub fn set(&self, key: &str, value: V) -> bool {
        if !self.is_enabled() {
            return false;
        }
        let size = match serde_json::to_vec(&value) {
            Ok(bytes) => bytes.len(),
            Err(e) => {
                warn!(key, error = %e, "Cache value not serializable, skipping");
                return false;
            }
        };
        let max = self.shared.config.max_size_bytes;
        let mut state = lock(&self.shared.state);
        // Any previous value under this key is replaced, never evicted.
        state.remove(key);

        if size > max {
            debug!(key, size, max, "Value exceeds cache budget, not stored");
            return false;
        }

        while state.resident_bytes + size > max {
            let Some(victim) = state.least_recent_key() else {
                break;
            };
            if let Some(evicted) = state.remove(&victim) {
                debug!(key = victim.as_str(), bytes = evicted.size_bytes, "Evicted cache entry");
                Counters::bump(&self.shared.counters.evictions);
            }
        }

        let tick = state.next_tick();
        state.resident_bytes += size;
        state
            .entries
            .insert(key.to_string(), CacheEntry::new(value, size, tick));
        Counters::bump(&self.shared.counters.sets);
        true
    }

    pub fn delete(&self, key: &str) -> bool {
        if !self.is_enabled() {
            return false;
        }
        lock(&self.shared.state).remove(key).is_some()
    }

    /// Drop every entry. Loads still running when this is called will not
    /// write their results back.
    pub fn clear(&self) {
        if !self.is_enabled() {
            return;
        }
        let mut state = lock(&self.shared.state);
        state.entries.clear();
        state.resident_bytes = 0;
        state.generation += 1;
        drop(state);
        lock(&self.shared.in_flight).clear();
    }

    /// Eagerly purge expired entries. Returns how many were removed.
    pub fn cleanup_expired(&self) -> usize {
        if !self.is_enabled() {
            return 0;
        }
        let ttl = self.shared.config.ttl;
        let mut state = lock(&self.shared.state);
        let expired: Vec<String> = state
            .entries
            .iter()
            .filter(|(_, entry)| entry.is_expired(ttl))
            .map(|(key, _)| key.clone())
            .collect();
        for key in &expired {
            state.remove(key);
        }
        self.shared
            .counters
            .expirations
            .fetch_add(expired.len() as u64, Ordering::Relaxed);
        expired.len()
    }

    pub fn len(&self) -> usize {
        lock(&self.shared.state).entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn resident_bytes(&self) -> usize {
        lock(&self.shared.state).resident_bytes
    }

    /// Return the cached value for `key`, or run `loader` and cache its
    /// result. With deduplication on, concurrent callers for the same key
    /// share one loader run and all receive its outcome, error included.
    ///
    /// Inside a Tokio runtime the loader runs on its own task, so a caller
    /// that stops waiting does not cancel it. Outside one, the callers that
    /// await the shared load drive it themselves.
    pub async fn load<F, Fut>(&self, key: &str, loader: F) -> Result<V>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V>> + Send + 'static,
    {
        if !self.is_enabled() {
            return loader().await;
        }
        if let Some(value) = self.get(key) {
            return Ok(value);
        }
        if !self.shared.config.enable_deduplication {
            let value = loader().await?;
            self.set(key, value.clone());
            return Ok(value);
        }

        let pending = {
            let mut in_flight = lock(&self.shared.in_flight);
            match in_flight.get(key) {
                Some((_, pending)) => {
                    Counters::bump(&self.shared.counters.coalesced);
                    pending.clone()
                }
                None => {
                    let flight_id = self.shared.next_flight.fetch_add(1, Ordering::Relaxed);
                    let pending = self.spawn_load(key.to_string(), flight_id, loader());
                    in_flight.insert(key.to_string(), (flight_id, pending.clone()));
                    pending
                }
            }
        };

        pending.await.map_err(|e| anyhow!("{e:#}"))
    }

    fn spawn_load<Fut>(&self, key: String, flight_id: u64, work: Fut) -> SharedLoad<V>
    where
        Fut: Future<Output = Result<V>> + Send + 'static,
    {
        let cache = self.clone();
        let generation = lock(&self.shared.state).generation;

        let pending = async move {
            let outcome = work.await.map_err(Arc::new);
            if let Ok(value) = &outcome {
                if lock(&cache.shared.state).generation == generation {
                    cache.set(&key, value.clone());
                }
            }
            let mut in_flight = lock(&cache.shared.in_flight);
            if in_flight.get(&key).is_some_and(|(id, _)| *id == flight_id) {
                in_flight.remove(&key);
            }
            outcome
        }
        .boxed()
        .shared();

        if tokio::runtime::Handle::try_current().is_ok() {
            tokio::spawn(pending.clone());
        }
        pending
    }

    /// Record a `(tool, params)` access for pattern learning. In learning
    /// mode detected patterns are promoted immediately.
    pub fn record_access(&self, tool: &str, params: &Value) {
        if !self.is_enabled() || !self.shared.config.enable_prefetch {
            return;
        }
        let event = AccessEvent::new(tool, params.clone());
        let mut patterns = lock(&self.shared.patterns);
        patterns.record(event.key());
        if self.shared.config.enable_learning {
            patterns.learn();
        }
    }

    /// Load the keys learned to follow `trigger`, most probable first.
    /// Failures are counted and logged, never returned. Returns how many
    /// keys were newly cached.
    pub async fn trigger_prefetch(&self, trigger: &str, loader: &dyn PrefetchLoader<V>) -> usize {
        if !self.is_enabled() || !self.shared.config.enable_prefetch {
            return 0;
        }
        let keys = lock(&self.shared.patterns)
            .prefetch_keys(trigger, self.shared.config.max_prefetch_size);

        let mut loaded = 0;
        for key in keys {
            if self.has(&key) {
                continue;
            }
            match loader.load(&key).await {
                Ok(value) => {
                    if self.set(&key, value) {
                        loaded += 1;
                    }
                    Counters::bump(&self.shared.counters.prefetch_successes);
                }
                Err(e) => {
                    warn!(key = key.as_str(), error = %e, "Prefetch failed");
                    Counters::bump(&self.shared.counters.prefetch_failures);
                }
            }
        }
        loaded
    }

    /// Classify a query and estimate its latency.
    pub fn plan_query(&self, tool: &str, params: &Value) -> QueryPlan {
        let cached = self.has(&query_key(tool, params));
        let planner = lock(&self.shared.planner);
        if !self.is_enabled() || !self.shared.config.enable_query_planning {
            return planner.default_plan(tool);
        }
        planner.plan(tool, cached)
    }

    pub fn record_timing(&self, tool: &str, elapsed: Duration) {
        if !self.is_enabled() || !self.shared.config.enable_query_planning {
            return;
        }
        lock(&self.shared.planner).record_timing(tool, elapsed);
    }

    pub fn detected_patterns(&self) -> Vec<super::prefetch::Pattern> {
        lock(&self.shared.patterns).detect()
    }

    pub fn learned_patterns(&self) -> Vec<super::prefetch::LearnedPattern> {
        lock(&self.shared.patterns).learned()
    }

    pub fn export_patterns(&self) -> Result<String> {
        lock(&self.shared.patterns).export()
    }

    pub fn import_patterns(&self, json: &str) -> Result<usize> {
        lock(&self.shared.patterns).import(json)
    }

    /// Records currently held by the pattern tracker.
    pub fn pattern_records(&self) -> Vec<PrefetchRecord> {
        let patterns = lock(&self.shared.patterns);
        patterns
            .detect()
            .into_iter()
            .map(PrefetchRecord::Pattern)
            .chain(patterns.learned().into_iter().map(PrefetchRecord::Learned))
            .collect()
    }

    pub fn stats(&self) -> CacheStats {
        let c = &self.shared.counters;
        let (entries, resident_bytes) = {
            let state = lock(&self.shared.state);
            (state.entries.len(), state.resident_bytes)
        };
        let hits = c.hits.load(Ordering::Relaxed);
        let misses = c.misses.load(Ordering::Relaxed);
        let total = hits + misses;
        CacheStats {
            hits,
            misses,
            sets: c.sets.load(Ordering::Relaxed),
            evictions: c.evictions.load(Ordering::Relaxed),
            expirations: c.expirations.load(Ordering::Relaxed),
            prefetch_successes: c.prefetch_successes.load(Ordering::Relaxed),
            prefetch_failures: c.prefetch_failures.load(Ordering::Relaxed),
            coalesced: c.coalesced.load(Ordering::Relaxed),
            entries,
            resident_bytes,
            hit_rate: if total > 0 { hits as f64 / total as f64 } else { 0.0 },
        }
    }

    pub fn reset_stats(&self) {
        self.shared.counters.reset();
    }

    /// One-line human-readable summary.
    pub fn summary(&self) -> String {
        let stats = self.stats();
        format!(
            "Cache: {} entries, {:.1} KiB / {:.1} KiB, {:.1}% hit rate ({} hits, {} misses, {} evictions, {} expired)",
            stats.entries,
            stats.resident_bytes as f64 / 1024.0,
            self.shared.config.max_size_bytes as f64 / 1024.0,
            stats.hit_rate * 100.0,
            stats.hits,
            stats.misses,
            stats.evictions,
            stats.expirations,
        )
    }
}
