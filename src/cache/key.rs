// Cache key construction.
//
// Similarity is symmetric, so the two document paths are sorted before a key
// is built; (A, B) and (B, A) share one entry.

use serde_json::Value;

/// Key for a `(tool, params)` query. String params are used verbatim, any
/// other value by its JSON form (object keys are sorted by serde_json).
pub fn query_key(tool: &str, params: &Value) -> String {
    match params {
        Value::String(s) => format!("{tool}:{s}"),
        Value::Null => tool.to_string(),
        other => format!("{tool}:{other}"),
    }
}

/// Params value for a pairwise measure, paths in canonical order.
pub fn similarity_params(a: &str, b: &str) -> Value {
    let (first, second) = if a <= b { (a, b) } else { (b, a) };
    Value::String(format!("{first}:{second}"))
}

/// `"<measure>:<pathA>:<pathB>"` with the paths sorted.
pub fn similarity_key(measure: &str, a: &str, b: &str) -> String {
    query_key(measure, &similarity_params(a, b))
}

/// Split a similarity key back into `(measure, pathA, pathB)`.
///
/// Paths may themselves contain `:`, so every split point is tried and the
/// first one where `is_known` accepts both halves wins.
pub fn parse_similarity_key<'k, F>(key: &'k str, is_known: F) -> Option<(&'k str, &'k str, &'k str)>
where
    F: Fn(&str) -> bool,
{
    let (measure, rest) = key.split_once(':')?;
    rest.match_indices(':').find_map(|(idx, _)| {
        let (a, b) = (&rest[..idx], &rest[idx + 1..]);
        (is_known(a) && is_known(b)).then_some((measure, a, b))
    })
}
