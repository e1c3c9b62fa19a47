// Unit tests for the adaptive cache.
//
// Covers the byte budget and LRU order, TTL expiry, the disabled mode,
// coalesced loads, prefetch learning and query planning.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use futures::future::join_all;
use serde_json::json;

use dupescope::cache::{
    query_key, similarity_key, AdaptiveCache, CacheConfig, PrefetchLoader, PrefetchRecord,
    QueryStrategy,
};

fn cache_with(max_size_bytes: usize) -> AdaptiveCache<String> {
    AdaptiveCache::new(CacheConfig {
        max_size_bytes,
        ..CacheConfig::default()
    })
}

/// A string whose JSON encoding (quotes included) is exactly `bytes` long.
fn value_of_size(bytes: usize) -> String {
    "x".repeat(bytes - 2)
}

// ============================================================
// Capacity and LRU
// ============================================================

#[test]
fn touched_entry_survives_eviction() {
    let cache = cache_with(800);
    cache.set("first", value_of_size(250));
    cache.set("second", value_of_size(250));
    cache.set("third", value_of_size(250));
    assert_eq!(cache.resident_bytes(), 750);

    assert!(cache.get("first").is_some());
    cache.set("fourth", value_of_size(250));

    assert!(cache.has("first"));
    assert!(!cache.has("second"));
    assert!(cache.has("third"));
    assert!(cache.has("fourth"));
    assert_eq!(cache.stats().evictions, 1);
    assert!(cache.resident_bytes() <= 800);
}

#[test]
fn resident_bytes_never_exceed_budget() {
    let cache = cache_with(1_000);
    for i in 0..200usize {
        let size = 10 + (i * 37) % 300;
        cache.set(&format!("k{}", i % 17), value_of_size(size));
        assert!(cache.resident_bytes() <= 1_000, "over budget after set {i}");
    }
}

#[test]
fn inserting_key_never_evicts_itself() {
    let cache = cache_with(300);
    cache.set("a", value_of_size(150));
    cache.set("b", value_of_size(100));
    cache.set("a", value_of_size(200));
    assert!(cache.has("a"));
    assert!(cache.has("b"));
    assert_eq!(cache.resident_bytes(), 300);
}

// ============================================================
// TTL
// ============================================================

#[test]
fn expired_entry_misses_despite_recent_access() {
    let cache: AdaptiveCache<String> = AdaptiveCache::new(CacheConfig {
        ttl: Duration::from_millis(60),
        ..CacheConfig::default()
    });
    cache.set("k", "v".to_string());
    for _ in 0..3 {
        assert!(cache.get("k").is_some());
        std::thread::sleep(Duration::from_millis(15));
    }
    std::thread::sleep(Duration::from_millis(60));

    assert_eq!(cache.get("k"), None);
    assert!(cache.is_empty());
    assert_eq!(cache.stats().expirations, 1);
}

#[test]
fn cleanup_expired_sweeps_everything_stale() {
    let cache: AdaptiveCache<String> = AdaptiveCache::new(CacheConfig {
        ttl: Duration::from_millis(20),
        ..CacheConfig::default()
    });
    cache.set("a", "1".to_string());
    cache.set("b", "2".to_string());
    std::thread::sleep(Duration::from_millis(40));
    assert_eq!(cache.cleanup_expired(), 2);
    assert_eq!(cache.resident_bytes(), 0);
}

// ============================================================
// Disabled mode
// ============================================================

#[tokio::test]
async fn disabled_cache_is_a_no_op() {
    let cache: AdaptiveCache<String> = AdaptiveCache::new(CacheConfig {
        enabled: false,
        ..CacheConfig::default()
    });
    assert!(!cache.set("k", "v".to_string()));
    assert_eq!(cache.get("k"), None);
    assert!(!cache.has("k"));

    let calls = Arc::new(AtomicUsize::new(0));
    for _ in 0..2 {
        let calls = Arc::clone(&calls);
        let value = cache
            .load("k", move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok("loaded".to_string())
            })
            .await
            .unwrap();
        assert_eq!(value, "loaded");
    }
    assert_eq!(calls.load(Ordering::SeqCst), 2);

    cache.record_access("compare", &json!("a"));
    assert!(cache.detected_patterns().is_empty());
    assert_eq!(cache.stats(), Default::default());
}

// ============================================================
// Coalesced loads
// ============================================================

#[tokio::test]
async fn concurrent_loads_invoke_loader_once() {
    let cache = cache_with(1024 * 1024);
    let calls = Arc::new(AtomicUsize::new(0));

    let loads = (0..10).map(|_| {
        let calls = Arc::clone(&calls);
        cache.load("k", move || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(30)).await;
            Ok("shared".to_string())
        })
    });
    let results = join_all(loads).await;

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(results.iter().all(|r| r.as_deref().ok() == Some("shared")));
    assert_eq!(cache.get("k").as_deref(), Some("shared"));
    assert_eq!(cache.stats().coalesced, 9);
}

#[tokio::test]
async fn load_error_reaches_every_waiter_and_clears() {
    let cache = cache_with(1024);
    let calls = Arc::new(AtomicUsize::new(0));

    let loads = (0..3).map(|_| {
        let calls = Arc::clone(&calls);
        cache.load("k", move || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(10)).await;
            Err::<String, _>(anyhow!("backend unavailable"))
        })
    });
    let results = join_all(loads).await;
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    for result in &results {
        let err = result.as_ref().unwrap_err();
        assert!(err.to_string().contains("backend unavailable"));
    }
    assert!(!cache.has("k"));

    let retry = cache
        .load("k", || async { Ok("recovered".to_string()) })
        .await
        .unwrap();
    assert_eq!(retry, "recovered");
}

#[tokio::test]
async fn abandoned_load_still_populates() {
    let cache = cache_with(1024);
    let waiter = cache.load("k", || async {
        tokio::time::sleep(Duration::from_millis(20)).await;
        Ok("late".to_string())
    });
    let timed_out = tokio::time::timeout(Duration::from_millis(1), waiter).await;
    assert!(timed_out.is_err());

    tokio::time::sleep(Duration::from_millis(60)).await;
    assert_eq!(cache.get("k").as_deref(), Some("late"));
}

#[tokio::test]
async fn clear_discards_in_flight_result() {
    let cache = cache_with(1024);
    let background = cache.clone();
    let handle = tokio::spawn(async move {
        background
            .load("k", || async {
                tokio::time::sleep(Duration::from_millis(40)).await;
                Ok("stale".to_string())
            })
            .await
    });

    tokio::time::sleep(Duration::from_millis(10)).await;
    cache.clear();
    let value = handle.await.unwrap().unwrap();
    assert_eq!(value, "stale");
    assert!(!cache.has("k"));
}

#[test]
fn load_works_without_a_runtime() {
    let cache = cache_with(1024);
    let calls = Arc::new(AtomicUsize::new(0));

    let results = futures::executor::block_on(join_all((0..3).map(|_| {
        let calls = Arc::clone(&calls);
        cache.load("k", move || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok("inline".to_string())
        })
    })));

    assert!(results.iter().all(|r| r.as_deref().ok() == Some("inline")));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(cache.get("k").as_deref(), Some("inline"));
}

// ============================================================
// Prefetch
// ============================================================

struct FixedLoader;

#[async_trait]
impl PrefetchLoader<String> for FixedLoader {
    async fn load(&self, key: &str) -> Result<String> {
        Ok(format!("value for {key}"))
    }
}

struct FailingLoader;

#[async_trait]
impl PrefetchLoader<String> for FailingLoader {
    async fn load(&self, _key: &str) -> Result<String> {
        Err(anyhow!("disk on fire"))
    }
}

fn learning_cache() -> AdaptiveCache<String> {
    let cache: AdaptiveCache<String> = AdaptiveCache::new(CacheConfig {
        pattern_threshold: 2,
        ..CacheConfig::default()
    });
    for _ in 0..3 {
        cache.record_access("compare", &json!("a"));
        cache.record_access("compare", &json!("b"));
    }
    cache
}

#[test]
fn recurring_sequence_is_detected_and_learned() {
    let cache = learning_cache();
    let patterns = cache.detected_patterns();
    let ab = patterns
        .iter()
        .find(|p| p.sequence == vec!["compare:a".to_string(), "compare:b".to_string()])
        .expect("a -> b detected");
    assert_eq!(ab.count, 3);
    assert!((ab.confidence - 3.0 / 5.0).abs() < 1e-9);

    let learned = cache.learned_patterns();
    assert!(learned
        .iter()
        .any(|p| p.trigger == "compare:a" && p.prefetch_keys == vec!["compare:b".to_string()]));
}

#[test]
fn below_threshold_nothing_learned() {
    let cache: AdaptiveCache<String> = AdaptiveCache::new(CacheConfig::default());
    cache.record_access("compare", &json!("a"));
    cache.record_access("compare", &json!("b"));
    assert!(cache.detected_patterns().is_empty());
    assert!(cache.learned_patterns().is_empty());
}

#[tokio::test]
async fn prefetch_failure_is_counted_not_raised() {
    let cache = learning_cache();
    let loaded = cache.trigger_prefetch("compare:a", &FailingLoader).await;
    assert_eq!(loaded, 0);
    assert_eq!(cache.stats().prefetch_failures, 1);
    assert!(!cache.has("compare:b"));
}

#[tokio::test]
async fn prefetch_loads_learned_followers() {
    let cache = learning_cache();
    let loaded = cache.trigger_prefetch("compare:a", &FixedLoader).await;
    assert_eq!(loaded, 1);
    assert_eq!(cache.get("compare:b").as_deref(), Some("value for compare:b"));

    // Already resident, nothing to do.
    assert_eq!(cache.trigger_prefetch("compare:a", &FixedLoader).await, 0);
}

#[test]
fn pattern_records_roundtrip_through_json() {
    let cache = learning_cache();
    let exported = cache.export_patterns().unwrap();
    let records: Vec<PrefetchRecord> = serde_json::from_str(&exported).unwrap();
    assert!(records.iter().any(|r| matches!(r, PrefetchRecord::Learned(_))));

    let fresh: AdaptiveCache<String> = AdaptiveCache::new(CacheConfig::default());
    assert_eq!(fresh.import_patterns(&exported).unwrap(), cache.learned_patterns().len());
    assert_eq!(fresh.learned_patterns().len(), cache.learned_patterns().len());
}

// ============================================================
// Keys and planning
// ============================================================

#[test]
fn similarity_keys_ignore_argument_order() {
    assert_eq!(
        similarity_key("comprehensive", "b.md", "a.md"),
        similarity_key("comprehensive", "a.md", "b.md")
    );
    assert_eq!(query_key("stats", &serde_json::Value::Null), "stats");
}

#[test]
fn planner_tracks_cached_and_timed_queries() {
    let cache = cache_with(1024);
    let fresh = cache.plan_query("compare", &json!("a:b"));
    assert_eq!(fresh.strategy, QueryStrategy::FullLoad);
    assert_eq!(fresh.estimated_latency_ms, 100);

    cache.record_timing("compare", Duration::from_millis(40));
    cache.record_timing("compare", Duration::from_millis(60));
    let timed = cache.plan_query("compare", &json!("a:b"));
    assert_eq!(timed.estimated_latency_ms, 50);
    assert_eq!(timed.samples, 2);

    cache.set(&query_key("compare", &json!("a:b")), "cached".to_string());
    assert_eq!(cache.plan_query("compare", &json!("a:b")).strategy, QueryStrategy::Cached);
    assert_eq!(
        cache.plan_query("top_concepts", &json!(25)).strategy,
        QueryStrategy::MetadataOnly
    );
}

#[test]
fn planning_disabled_falls_back_to_full_load() {
    let cache: AdaptiveCache<String> = AdaptiveCache::new(CacheConfig {
        enable_query_planning: false,
        ..CacheConfig::default()
    });
    cache.set("compare:a:b", "cached".to_string());
    let plan = cache.plan_query("compare", &json!("a:b"));
    assert_eq!(plan.strategy, QueryStrategy::FullLoad);
}
