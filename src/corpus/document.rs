// Document - an already-parsed page of the documentation corpus.
//
// Parsing markdown, frontmatter and headings happens upstream. This crate
// only consumes the resulting records, so every field is optional on the wire
// and a missing, null or wrong-typed field degrades to an empty contribution.

use std::collections::BTreeMap;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// A single heading in document order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Heading {
    #[serde(default, deserialize_with = "lenient")]
    pub level: u8,
    #[serde(default, deserialize_with = "lenient")]
    pub text: String,
}

/// An immutable, parsed document.
///
/// Alternate identifiers (`filePath`, `id`) are resolved by the corpus loader,
/// not here, so a record carrying several of them still parses.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Document {
    /// Identifier of the document, usually its file path.
    #[serde(default, deserialize_with = "lenient")]
    pub path: String,
    #[serde(default, deserialize_with = "lenient")]
    pub content: String,
    #[serde(default, deserialize_with = "lenient")]
    pub frontmatter: BTreeMap<String, Value>,
    #[serde(default, deserialize_with = "lenient_headings")]
    pub headings: Vec<Heading>,
    #[serde(default, deserialize_with = "lenient")]
    pub word_count: usize,
}

/// Accept any JSON value, falling back to the default when it has the wrong
/// shape.
fn lenient<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + Default,
{
    let value = Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).unwrap_or_default())
}

/// Keep every well-formed heading and drop the rest.
fn lenient_headings<'de, D>(deserializer: D) -> Result<Vec<Heading>, D::Error>
where
    D: Deserializer<'de>,
{
    let headings = match Value::deserialize(deserializer)? {
        Value::Array(items) => items
            .into_iter()
            .filter_map(|item| match item {
                Value::Object(_) => serde_json::from_value::<Heading>(item).ok(),
                Value::String(text) => Some(Heading { level: 0, text }),
                _ => None,
            })
            .filter(|h| !h.text.trim().is_empty())
            .collect(),
        _ => Vec::new(),
    };
    Ok(headings)
}

impl Document {
    /// Build a document from raw content, counting words.
    pub fn new(path: impl Into<String>, content: impl Into<String>) -> Self {
        let content = content.into();
        let word_count = content.split_whitespace().count();
        Self {
            path: path.into(),
            content,
            frontmatter: BTreeMap::new(),
            headings: Vec::new(),
            word_count,
        }
    }

    pub fn with_headings(mut self, headings: Vec<Heading>) -> Self {
        self.headings = headings;
        self
    }

    pub fn with_frontmatter(mut self, frontmatter: BTreeMap<String, Value>) -> Self {
        self.frontmatter = frontmatter;
        self
    }

    /// All heading texts joined into one sentence-separated string.
    pub fn heading_text(&self) -> String {
        self.headings
            .iter()
            .map(|h| h.text.trim())
            .filter(|t| !t.is_empty())
            .collect::<Vec<_>>()
            .join(". ")
    }

    /// Frontmatter flattened into `key: value` lines.
    ///
    /// Nested arrays are joined with commas; nested objects fall back to their
    /// JSON form. Null values are skipped.
    pub fn frontmatter_text(&self) -> String {
        let mut lines = Vec::with_capacity(self.frontmatter.len());
        for (key, value) in &self.frontmatter {
            let rendered = render_value(value);
            if !rendered.is_empty() {
                lines.push(format!("{key}: {rendered}"));
            }
        }
        lines.join("\n")
    }
}

fn render_value(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::Array(items) => items
            .iter()
            .map(render_value)
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(", "),
        Value::Object(_) => value.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_new_counts_words() {
        let doc = Document::new("a.md", "one two  three\nfour");
        assert_eq!(doc.word_count, 4);
    }

    #[test]
    fn test_heading_text_skips_blank_headings() {
        let doc = Document::new("a.md", "").with_headings(vec![
            Heading { level: 1, text: "Intro".to_string() },
            Heading { level: 2, text: "  ".to_string() },
            Heading { level: 2, text: "Setup".to_string() },
        ]);
        assert_eq!(doc.heading_text(), "Intro. Setup");
    }

    #[test]
    fn test_frontmatter_text_flattens_arrays() {
        let mut fm = BTreeMap::new();
        fm.insert("tags".to_string(), json!(["gas", "evm"]));
        fm.insert("title".to_string(), json!("Gas Guide"));
        fm.insert("draft".to_string(), Value::Null);
        let doc = Document::new("a.md", "").with_frontmatter(fm);
        assert_eq!(doc.frontmatter_text(), "tags: gas, evm\ntitle: Gas Guide");
    }

    #[test]
    fn test_missing_fields_deserialize_to_defaults() {
        let doc: Document = serde_json::from_str(r#"{"path": "x.md"}"#).unwrap();
        assert_eq!(doc.path, "x.md");
        assert!(doc.content.is_empty());
        assert!(doc.headings.is_empty());
    }

    #[test]
    fn test_null_and_mistyped_fields_fall_back_to_defaults() {
        let doc: Document = serde_json::from_str(
            r#"{"path": "x.md", "content": null, "frontmatter": "oops", "word_count": -3}"#,
        )
        .unwrap();
        assert!(doc.content.is_empty());
        assert!(doc.frontmatter.is_empty());
        assert_eq!(doc.word_count, 0);
    }

    #[test]
    fn test_heading_without_level_is_kept() {
        let raw = r#"{"headings": [
            {"text": "Intro"}, {"level": "two"}, 7, {"level": 2, "text": "Setup"}
        ]}"#;
        let doc: Document = serde_json::from_str(raw).unwrap();
        assert_eq!(doc.headings.len(), 2);
        assert_eq!(doc.headings[0], Heading { level: 0, text: "Intro".to_string() });
        assert_eq!(doc.heading_text(), "Intro. Setup");
    }
}
