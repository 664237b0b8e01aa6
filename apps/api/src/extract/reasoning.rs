//! Reasoning-block stripping: removes a model's "think" traces from raw output.
//!
//! Providers and prompt templates wrap internal reasoning in different delimiter
//! conventions. Every recognized convention is removed before any further
//! processing, then leftover blank-line runs are collapsed and the text trimmed.

use std::sync::LazyLock;

use regex::Regex;

/// Reasoning delimiter conventions, applied in fixed order. Matching is
/// case-insensitive and spans newlines; bodies are non-greedy so adjacent
/// blocks are removed independently.
static THINK_PATTERNS: LazyLock<[Regex; 5]> = LazyLock::new(|| {
    [
        // XML-style tags: <think>...</think>
        Regex::new(r"(?is)<think>.*?</think>").expect("valid regex"),
        // Double-brace tags: {{think}}...{{/think}}
        Regex::new(r"(?is)\{\{think\}\}.*?\{\{/think\}\}").expect("valid regex"),
        // Square-bracket tags: [think]...[/think]
        Regex::new(r"(?is)\[think\].*?\[/think\]").expect("valid regex"),
        // Fenced code block tagged think: ```think ... ```
        Regex::new(r"(?is)```think.*?```").expect("valid regex"),
        // Uppercase tag variant (already covered by (?i) on the first pattern)
        Regex::new(r"(?is)<THINK>.*?</THINK>").expect("valid regex"),
    ]
});

/// Three or more newlines, possibly separated by other whitespace, collapse
/// to a single blank line.
static BLANK_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n\s*\n\s*\n").expect("valid regex"));

/// Removes all reasoning blocks from `text`, collapses blank-line runs left
/// behind, and trims the whole result. Empty input yields an empty string.
///
/// Idempotent: stripping already-stripped text changes nothing.
pub fn strip_reasoning(text: &str) -> String {
    let mut cleaned = text.to_string();
    for pattern in THINK_PATTERNS.iter() {
        cleaned = pattern.replace_all(&cleaned, "").into_owned();
    }
    let cleaned = BLANK_RUN.replace_all(&cleaned, "\n\n");
    cleaned.trim().to_string()
}
