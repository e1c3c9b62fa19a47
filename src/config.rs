use std::env;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{bail, Context, Result};

use crate::cache::CacheConfig;
use crate::concepts::ExtractionConfig;
use crate::similarity::SimilarityThresholds;

/// Central configuration loaded from environment variables.
///
/// Every variable is optional. The .env file is loaded at startup via
/// dotenvy, so values can live there instead of the shell.
#[derive(Debug, Clone, Default)]
pub struct Config {
    pub extraction: ExtractionConfig,
    pub thresholds: SimilarityThresholds,
    pub cache: CacheConfig,
}

impl Config {
    /// Load configuration from the process environment.
    pub fn load() -> Result<Self> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Build a config from any variable source. Unset or blank variables
    /// keep their defaults; a value that doesn't parse is an error naming
    /// the variable.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        let mut config = Config::default();

        let ex = &mut config.extraction;
        ex.min_length = parse_or(&get, "DUPESCOPE_MIN_LENGTH", ex.min_length)?;
        ex.max_length = parse_or(&get, "DUPESCOPE_MAX_LENGTH", ex.max_length)?;
        ex.min_frequency = parse_or(&get, "DUPESCOPE_MIN_FREQUENCY", ex.min_frequency)?;
        ex.max_concepts = parse_or(&get, "DUPESCOPE_MAX_CONCEPTS", ex.max_concepts)?;
        ex.max_concepts_per_document = parse_or(
            &get,
            "DUPESCOPE_MAX_CONCEPTS_PER_DOCUMENT",
            ex.max_concepts_per_document,
        )?;
        ex.max_cooccurrence_records = parse_or(
            &get,
            "DUPESCOPE_MAX_COOCCURRENCE_RECORDS",
            ex.max_cooccurrence_records,
        )?;
        ex.merge_window = parse_or(&get, "DUPESCOPE_MERGE_WINDOW", ex.merge_window)?;
        if let Some(words) = get("DUPESCOPE_STOP_WORDS") {
            ex.stop_words = Some(split_list(&words));
        }
        if let Some(terms) = get("DUPESCOPE_DOMAIN_TERMS") {
            ex.domain_terms = split_list(&terms);
        }
        if ex.min_length > ex.max_length {
            bail!(
                "DUPESCOPE_MIN_LENGTH ({}) is greater than DUPESCOPE_MAX_LENGTH ({})",
                ex.min_length,
                ex.max_length
            );
        }

        let th = &mut config.thresholds;
        th.exact = parse_score(&get, "DUPESCOPE_EXACT_THRESHOLD", th.exact)?;
        th.conceptual = parse_score(&get, "DUPESCOPE_CONCEPTUAL_THRESHOLD", th.conceptual)?;
        th.semantic = parse_score(&get, "DUPESCOPE_SEMANTIC_THRESHOLD", th.semantic)?;
        th.overall = parse_score(&get, "DUPESCOPE_OVERALL_THRESHOLD", th.overall)?;

        let cache = &mut config.cache;
        cache.max_size_bytes = parse_or(&get, "DUPESCOPE_CACHE_MAX_BYTES", cache.max_size_bytes)?;
        cache.ttl = Duration::from_secs(parse_or(
            &get,
            "DUPESCOPE_CACHE_TTL_SECS",
            cache.ttl.as_secs(),
        )?);
        cache.enabled = parse_flag(&get, "DUPESCOPE_CACHE_ENABLED", cache.enabled)?;
        cache.enable_prefetch =
            parse_flag(&get, "DUPESCOPE_ENABLE_PREFETCH", cache.enable_prefetch)?;
        cache.enable_query_planning = parse_flag(
            &get,
            "DUPESCOPE_ENABLE_QUERY_PLANNING",
            cache.enable_query_planning,
        )?;
        cache.pattern_threshold =
            parse_or(&get, "DUPESCOPE_PATTERN_THRESHOLD", cache.pattern_threshold)?;
        cache.max_prefetch_size =
            parse_or(&get, "DUPESCOPE_MAX_PREFETCH_SIZE", cache.max_prefetch_size)?;

        Ok(config)
    }
}

fn parse_or<G, T>(get: &G, name: &str, default: T) -> Result<T>
where
    G: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match get(name) {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("{name} has an invalid value: {raw:?}")),
        None => Ok(default),
    }
}

/// Thresholds must be scores in [0, 1].
fn parse_score<G>(get: &G, name: &str, default: f64) -> Result<f64>
where
    G: Fn(&str) -> Option<String>,
{
    let value: f64 = parse_or(get, name, default)?;
    if !(0.0..=1.0).contains(&value) {
        bail!("{name} must be between 0 and 1, got {value}");
    }
    Ok(value)
}

fn parse_flag<G>(get: &G, name: &str, default: bool) -> Result<bool>
where
    G: Fn(&str) -> Option<String>,
{
    let Some(raw) = get(name) else {
        return Ok(default);
    };
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => bail!("{name} must be true or false, got {other:?}"),
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
