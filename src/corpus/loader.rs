// JSON corpus and graph loading for the CLI.
//
// A corpus file is either an object mapping path -> document or an array of
// documents carrying their own identifier. Each record is decoded on its own,
// so one malformed document never takes the rest of the corpus down with it.

use std::fs;
use std::path::Path;

use anyhow::{bail, Context, Result};
use serde_json::{Map, Value};
use tracing::{info, warn};

use super::{ConceptGraph, Corpus, Document};

/// Identifier fields in precedence order. The map key is the last resort.
const PATH_FIELDS: [&str; 3] = ["path", "filePath", "id"];

/// Load a corpus from a JSON file.
pub fn load_corpus(path: &Path) -> Result<Corpus> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("Failed to read corpus file {}", path.display()))?;
    let corpus = parse_corpus(&raw)
        .with_context(|| format!("Failed to parse corpus file {}", path.display()))?;
    info!(documents = corpus.len(), path = %path.display(), "Loaded corpus");
    Ok(corpus)
}

/// Parse corpus JSON, normalizing paths and word counts.
///
/// Only a top-level value that is neither an object nor an array is an error.
/// Records that are not objects, or that carry no usable identifier, are
/// skipped with a warning.
pub fn parse_corpus(raw: &str) -> Result<Corpus> {
    let file: Value = serde_json::from_str(raw).context("Invalid corpus JSON")?;

    let records: Vec<(Option<String>, Value)> = match file {
        Value::Object(map) => map.into_iter().map(|(k, v)| (Some(k), v)).collect(),
        Value::Array(list) => list.into_iter().map(|v| (None, v)).collect(),
        other => bail!("Corpus must be an object or an array, got {}", kind(&other)),
    };

    let mut corpus = Corpus::new();
    for (key, record) in records {
        let Some(doc) = document_from_record(key.as_deref(), record) else {
            continue;
        };
        if corpus.contains_key(&doc.path) {
            warn!(path = doc.path.as_str(), "Duplicate document path, keeping the last one");
        }
        corpus.insert(doc.path.clone(), doc);
    }

    Ok(corpus)
}

fn document_from_record(key: Option<&str>, record: Value) -> Option<Document> {
    let fields = match record {
        Value::Object(fields) => fields,
        other => {
            warn!(key = key.unwrap_or(""), kind = kind(&other), "Skipping non-object document");
            return None;
        }
    };

    let Some(path) = resolve_path(&fields).or_else(|| non_empty(key)) else {
        warn!("Skipping document without a path");
        return None;
    };
    let declared_words = fields
        .get("word_count")
        .or_else(|| fields.get("wordCount"))
        .and_then(Value::as_u64);

    let mut doc = match serde_json::from_value::<Document>(Value::Object(fields)) {
        Ok(doc) => doc,
        Err(e) => {
            warn!(
                path = path.as_str(),
                error = %e,
                "Unreadable document fields, using defaults"
            );
            Document::default()
        }
    };
    doc.path = path;
    doc.word_count = match declared_words {
        Some(n) if n > 0 => n as usize,
        _ => doc.content.split_whitespace().count(),
    };
    Some(doc)
}

fn resolve_path(fields: &Map<String, Value>) -> Option<String> {
    PATH_FIELDS
        .iter()
        .find_map(|name| non_empty(fields.get(*name).and_then(Value::as_str)))
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Load an externally built concept graph from a JSON file.
pub fn load_graph(path: &Path) -> Result<ConceptGraph> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("Failed to read graph file {}", path.display()))?;
    serde_json::from_str(&raw)
        .with_context(|| format!("Failed to parse graph file {}", path.display()))
}
