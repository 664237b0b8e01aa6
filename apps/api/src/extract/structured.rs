//! Structured-report recovery: best-effort JSON extraction from cleaned text.
//!
//! Two strategies run in order: every fenced ```json block in document order,
//! then the whole text as a bare JSON document. A candidate counts as a weekly
//! report only if it is a JSON object carrying at least one recognized section
//! key. Parse failures are swallowed and nothing is logged here; a `None`
//! simply means the text is a plain-text report.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Section keys an object must carry (at least one) to count as a weekly
/// report. Exact literals, matched by key presence.
pub const SECTION_KEYS: [&str; 4] = [
    "last_week_plan_table",
    "last_week_actual_table",
    "next_week_plan_table",
    "summary",
];

static JSON_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)```json\s*(.*?)```").expect("valid regex"));

/// Which extraction strategy produced a structured report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JsonSource {
    Markdown,
    Direct,
}

/// A parsed weekly-report object. Wraps the raw JSON map so validity is a
/// key-presence test: `{"summary": null}` is a valid report shape even though
/// the section itself is empty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StructuredReport(Map<String, Value>);

impl StructuredReport {
    /// Accepts `value` iff it is a JSON object with at least one recognized
    /// section key present. Arrays, primitives, null, and unrelated objects
    /// are rejected.
    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Object(map) if SECTION_KEYS.iter().any(|key| map.contains_key(*key)) => {
                Some(StructuredReport(map))
            }
            _ => None,
        }
    }

    pub fn section(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }
}

/// A successful extraction: the report, which strategy found it, and the exact
/// candidate string that parsed (surfaced as metadata).
#[derive(Debug, Clone)]
pub struct Extraction {
    pub report: StructuredReport,
    pub source: JsonSource,
    pub extracted_content: String,
}

/// Tries every fenced ```json block in document order, then the whole text as
/// a bare document. Returns `None` when no candidate parses and validates.
pub fn extract_structured(text: &str) -> Option<Extraction> {
    if text.is_empty() {
        return None;
    }

    for caps in JSON_BLOCK.captures_iter(text) {
        let candidate = caps[1].trim();
        if candidate.is_empty() {
            continue;
        }
        if let Ok(value) = serde_json::from_str::<Value>(candidate) {
            if let Some(report) = StructuredReport::from_value(value) {
                return Some(Extraction {
                    report,
                    source: JsonSource::Markdown,
                    extracted_content: candidate.to_string(),
                });
            }
        }
    }

    if let Ok(value) = serde_json::from_str::<Value>(text) {
        if let Some(report) = StructuredReport::from_value(value) {
            return Some(Extraction {
                report,
                source: JsonSource::Direct,
                extracted_content: text.to_string(),
            });
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_markdown_block_extracts_summary() {
        let text = "Report below:\n```json\n{\"summary\": \"did work\"}\n```\nthanks";
        let extraction = extract_structured(text).unwrap();
        assert_eq!(extraction.source, JsonSource::Markdown);
        assert_eq!(extraction.report.section("summary"), Some(&json!("did work")));
    }

    #[test]
    fn test_extracted_content_is_block_inner() {
        let text = "```json\n{\"summary\": \"x\"}\n```";
        let extraction = extract_structured(text).unwrap();
        assert_eq!(extraction.extracted_content, "{\"summary\": \"x\"}");
    }

    #[test]
    fn test_unparseable_first_block_tries_next() {
        let text = "```json\n{broken\n```\n```json\n{\"summary\": \"ok\"}\n```";
        let extraction = extract_structured(text).unwrap();
        assert_eq!(extraction.source, JsonSource::Markdown);
        assert_eq!(extraction.report.section("summary"), Some(&json!("ok")));
    }

    #[test]
    fn test_unrecognized_first_block_tries_next() {
        // First block is valid JSON but not a report shape; the second block
        // must still be attempted.
        let text = "```json\n{\"foo\": 1}\n```\n```json\n{\"summary\": \"ok\"}\n```";
        let extraction = extract_structured(text).unwrap();
        assert_eq!(extraction.source, JsonSource::Markdown);
        assert_eq!(extraction.report.section("summary"), Some(&json!("ok")));
    }

    #[test]
    fn test_direct_parse_fallback() {
        let text = "{\"next_week_plan_table\": [\"ship it\"]}";
        let extraction = extract_structured(text).unwrap();
        assert_eq!(extraction.source, JsonSource::Direct);
        assert_eq!(extraction.extracted_content, text);
    }

    #[test]
    fn test_array_rejected() {
        assert!(extract_structured("[1, 2, 3]").is_none());
    }

    #[test]
    fn test_primitive_rejected() {
        assert!(extract_structured("42").is_none());
        assert!(extract_structured("\"summary\"").is_none());
    }

    #[test]
    fn test_object_without_section_keys_rejected() {
        assert!(extract_structured("{\"a\": 1, \"b\": 2}").is_none());
    }

    #[test]
    fn test_null_section_value_still_valid() {
        // Key presence is the test, not the value.
        let extraction = extract_structured("{\"summary\": null}").unwrap();
        assert_eq!(extraction.report.section("summary"), Some(&Value::Null));
    }

    #[test]
    fn test_plain_text_returns_none() {
        assert!(extract_structured("not json at all").is_none());
    }

    #[test]
    fn test_empty_input_returns_none() {
        assert!(extract_structured("").is_none());
    }

    #[test]
    fn test_unclosed_fence_falls_through() {
        // No closing fence means no markdown candidate, and the whole text is
        // not valid JSON either.
        assert!(extract_structured("```json\n{\"summary\": \"x\"}").is_none());
    }

    #[test]
    fn test_from_value_rejects_non_objects() {
        assert!(StructuredReport::from_value(json!(null)).is_none());
        assert!(StructuredReport::from_value(json!([{"summary": "x"}])).is_none());
        assert!(StructuredReport::from_value(json!({"summary": "x"})).is_some());
    }
}
