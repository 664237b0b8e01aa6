//! The full content pipeline: strip reasoning, recover structure, render.
//!
//! `process` is total: every input string yields a renderable result. The
//! cleaned text (never the raw text) feeds structured recovery, so reasoning
//! traces cannot corrupt a JSON candidate.

use serde::{Deserialize, Serialize};

use crate::extract::format::{format_report, format_text};
use crate::extract::reasoning::strip_reasoning;
use crate::extract::structured::{extract_structured, JsonSource, StructuredReport};

/// Which strategy produced the final renderable content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExtractionPath {
    Markdown,
    Direct,
    Text,
    None,
}

impl From<JsonSource> for ExtractionPath {
    fn from(source: JsonSource) -> Self {
        match source {
            JsonSource::Markdown => ExtractionPath::Markdown,
            JsonSource::Direct => ExtractionPath::Direct,
        }
    }
}

/// How the input was interpreted, carried alongside every result.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractionMetadata {
    pub think_content_removed: bool,
    pub original_length: usize,
    pub cleaned_length: usize,
    pub parsing_method: ExtractionPath,
    pub parsing_success: bool,
    /// The exact candidate string that parsed, when structured recovery won.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extracted_content: Option<String>,
}

/// Output contract of the pipeline. `is_json` is true exactly when
/// `json_data` is present; `formatted` is only empty when `cleaned` is empty.
/// Serializes with the wire field names consumers expect (`isJson`,
/// `jsonData`, `formatted`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractionResult {
    pub original: String,
    pub cleaned: String,
    pub is_json: bool,
    pub json_data: Option<StructuredReport>,
    pub formatted: String,
    pub metadata: ExtractionMetadata,
}

/// Runs the pipeline on raw model output. Structured interpretation is
/// best-effort; plain-text rendering is the terminal fallback.
pub fn process(raw: &str) -> ExtractionResult {
    let cleaned = strip_reasoning(raw);

    let mut metadata = ExtractionMetadata {
        think_content_removed: raw != cleaned,
        original_length: raw.len(),
        cleaned_length: cleaned.len(),
        parsing_method: ExtractionPath::None,
        parsing_success: false,
        extracted_content: None,
    };

    if let Some(extraction) = extract_structured(&cleaned) {
        metadata.parsing_method = extraction.source.into();
        metadata.parsing_success = true;
        metadata.extracted_content = Some(extraction.extracted_content);
        let formatted = format_report(&extraction.report);

        return ExtractionResult {
            original: raw.to_string(),
            cleaned,
            is_json: true,
            json_data: Some(extraction.report),
            formatted,
            metadata,
        };
    }

    metadata.parsing_method = ExtractionPath::Text;
    let formatted = format_text(&cleaned);

    ExtractionResult {
        original: raw.to_string(),
        cleaned,
        is_json: false,
        json_data: None,
        formatted,
        metadata,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_markdown_wrapped_report_takes_markdown_path() {
        let raw = "Here is the report:\n```json\n{\"summary\": \"did work\"}\n```";
        let result = process(raw);
        assert!(result.is_json);
        assert_eq!(result.metadata.parsing_method, ExtractionPath::Markdown);
        assert!(result.metadata.parsing_success);
        let report = result.json_data.unwrap();
        assert_eq!(report.section("summary"), Some(&json!("did work")));
    }

    #[test]
    fn test_bare_json_takes_direct_path() {
        let result = process("{\"summary\": \"did work\"}");
        assert!(result.is_json);
        assert_eq!(result.metadata.parsing_method, ExtractionPath::Direct);
        assert!(result.formatted.contains("did work"));
    }

    #[test]
    fn test_plain_text_takes_text_path() {
        let result = process("not json at all");
        assert!(!result.is_json);
        assert!(result.json_data.is_none());
        assert_eq!(result.metadata.parsing_method, ExtractionPath::Text);
        assert!(!result.metadata.parsing_success);
        assert!(result.formatted.contains("not json at all"));
    }

    #[test]
    fn test_plain_text_newlines_become_breaks() {
        let result = process("line one\nline two");
        assert!(result.formatted.contains("line one<br>line two"));
    }

    #[test]
    fn test_reasoning_stripped_before_extraction() {
        // The think block hides a JSON fence; after stripping, only plain
        // text remains, so no structured report may surface.
        let raw = "<think>```json\n{\"summary\": \"draft\"}\n```</think>not json at all";
        let result = process(raw);
        assert_eq!(result.cleaned, "not json at all");
        assert!(!result.is_json);
    }

    #[test]
    fn test_reasoning_plus_report_both_handled() {
        let raw = "<think>let me draft this</think>{\"summary\": \"shipped v2\"}";
        let result = process(raw);
        assert!(result.metadata.think_content_removed);
        assert!(result.is_json);
        assert_eq!(result.metadata.parsing_method, ExtractionPath::Direct);
    }

    #[test]
    fn test_is_json_iff_json_data_present() {
        for raw in ["{\"summary\": \"x\"}", "plain", "", "[1,2]"] {
            let result = process(raw);
            assert_eq!(result.is_json, result.json_data.is_some());
        }
    }

    #[test]
    fn test_empty_input_yields_empty_renderable() {
        let result = process("");
        assert_eq!(result.cleaned, "");
        assert_eq!(result.formatted, "");
        assert!(!result.is_json);
        assert_eq!(result.metadata.parsing_method, ExtractionPath::Text);
    }

    #[test]
    fn test_metadata_lengths_track_stripping() {
        let raw = "<think>secret</think>Hello";
        let result = process(raw);
        assert!(result.metadata.think_content_removed);
        assert_eq!(result.metadata.original_length, raw.len());
        assert_eq!(result.metadata.cleaned_length, "Hello".len());
    }

    #[test]
    fn test_untouched_input_not_marked_stripped() {
        let result = process("Hello");
        assert!(!result.metadata.think_content_removed);
    }

    #[test]
    fn test_structured_report_roundtrip_through_fenced_block() {
        let report = StructuredReport::from_value(json!({
            "summary": "done",
            "next_week_plan_table": [{"task": "ship", "owner": "sam"}]
        }))
        .unwrap();
        let fenced = format!(
            "```json\n{}\n```",
            serde_json::to_string(&report).unwrap()
        );
        let extraction = extract_structured(&fenced).unwrap();
        assert!(extraction.report.section("summary").is_some());
        assert!(extraction.report.section("next_week_plan_table").is_some());
    }

    #[test]
    fn test_result_serializes_with_wire_field_names() {
        let value = serde_json::to_value(process("{\"summary\": \"did work\"}")).unwrap();
        assert!(value.get("isJson").is_some());
        assert!(value.get("jsonData").is_some());
        assert!(value.get("formatted").is_some());
        assert_eq!(value["metadata"]["parsingMethod"], "direct");
        assert_eq!(value["metadata"]["parsingSuccess"], true);
    }

    #[test]
    fn test_text_result_omits_extracted_content() {
        let value = serde_json::to_value(process("plain")).unwrap();
        assert!(value["metadata"].get("extractedContent").is_none());
    }
}
