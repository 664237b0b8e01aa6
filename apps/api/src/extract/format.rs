//! Report rendering: turns a structured report or plain text into HTML
//! fragments.
//!
//! The report path passes content through unescaped so the table markup built
//! here survives rendering; verbatim display of raw model output goes through
//! `escape_html` instead.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

use crate::extract::structured::StructuredReport;

/// Table sections in display order, with their headings. `summary` renders as
/// paragraphs and is handled after these three.
const TABLE_SECTIONS: [(&str, &str); 3] = [
    ("last_week_plan_table", "📋 Last Week Plan"),
    ("last_week_actual_table", "✅ Last Week Work"),
    ("next_week_plan_table", "🚀 Next Week Plan"),
];

const SUMMARY_KEY: &str = "summary";
const SUMMARY_HEADING: &str = "📝 Summary";

/// Literal `<br>` runs of three or more collapse to exactly two.
static BR_RUN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(<br>){3,}").expect("valid regex"));

/// Renders a structured report as HTML. Sections appear in fixed order, each
/// under its heading; absent keys produce no placeholder, and present keys
/// whose value is null, false, zero, or an empty string are skipped too
/// (empty arrays and objects still display).
pub fn format_report(report: &StructuredReport) -> String {
    let mut sections = String::new();

    for (key, heading) in TABLE_SECTIONS {
        if let Some(value) = report.section(key) {
            if is_displayable(value) {
                push_section(&mut sections, heading, &format_table_or_text(value, false));
            }
        }
    }

    if let Some(value) = report.section(SUMMARY_KEY) {
        if is_displayable(value) {
            push_section(&mut sections, SUMMARY_HEADING, &format_table_or_text(value, true));
        }
    }

    format!("<div class=\"json-report\">{sections}</div>")
}

/// Renders plain text: literal `\n` escapes and CR variants normalize to
/// newlines, blank lines drop, remaining lines join with `<br>`, and runs of
/// three or more `<br>` collapse to two. Empty input stays empty.
pub fn format_text(text: &str) -> String {
    if text.is_empty() {
        return String::new();
    }

    let normalized = text
        .replace("\\n", "\n")
        .replace("\r\n", "\n")
        .replace('\r', "\n");

    let joined = normalized
        .split('\n')
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("<br>");

    let collapsed = BR_RUN.replace_all(&joined, "<br><br>");

    format!("<div style=\"line-height: 1.6; white-space: pre-wrap;\">{collapsed}</div>")
}

/// HTML-escapes text for verbatim display of raw model output.
pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            other => escaped.push(other),
        }
    }
    escaped
}

fn push_section(out: &mut String, heading: &str, body: &str) {
    out.push_str("<div class=\"report-section\"><h3>");
    out.push_str(heading);
    out.push_str("</h3>");
    out.push_str(body);
    out.push_str("</div>");
}

/// A present section is skipped when its value is null, false, zero, or an
/// empty string.
fn is_displayable(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(true),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// Renders one section value by shape: a string becomes a paragraph, an array
/// of objects a table (columns from the first row), an array of primitives a
/// bulleted list, anything else a pretty-printed code block. With
/// `prefer_paragraph` array items render as paragraphs instead (summary).
fn format_table_or_text(value: &Value, prefer_paragraph: bool) -> String {
    if let Value::String(text) = value {
        return format!("<p>{}</p>", text.replace('\n', "<br>"));
    }

    if let Value::Array(items) = value {
        if prefer_paragraph {
            return items
                .iter()
                .map(|item| format!("<p>{}</p>", cell_text(item)))
                .collect();
        }

        if let Some(Value::Object(first)) = items.first() {
            let columns: Vec<&str> = first.keys().map(String::as_str).collect();
            return render_table(&columns, items);
        }

        if !items.is_empty() {
            let list_items: String = items
                .iter()
                .map(|item| format!("<li>{}</li>", cell_text(item)))
                .collect();
            return format!("<ul>{list_items}</ul>");
        }
    }

    // Irregular shapes (nested objects, empty arrays) show as raw JSON.
    format!(
        "<pre class=\"code-block\">{}</pre>",
        serde_json::to_string_pretty(value).unwrap_or_default()
    )
}

/// Column set comes from the first row only; rows missing a column render an
/// empty cell, and extra keys on later rows are ignored.
fn render_table(columns: &[&str], rows: &[Value]) -> String {
    let header_cells: String = columns.iter().map(|c| format!("<th>{c}</th>")).collect();

    let body_rows: String = rows
        .iter()
        .map(|row| {
            let cells: String = columns
                .iter()
                .map(|column| {
                    let text = row.get(column).map(cell_text).unwrap_or_default();
                    format!("<td>{text}</td>")
                })
                .collect();
            format!("<tr>{cells}</tr>")
        })
        .collect();

    format!(
        "<table class=\"report-table\"><thead><tr>{header_cells}</tr></thead><tbody>{body_rows}</tbody></table>"
    )
}

/// Strings pass through as-is; any other value serializes as JSON text.
fn cell_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
