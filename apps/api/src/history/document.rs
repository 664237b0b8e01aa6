//! Standalone HTML document for a stored report, suitable for downloading or
//! printing without the app's stylesheet.

use crate::extract::escape_html;
use crate::models::report::HistoryRecordRow;

/// Renders a self-contained HTML page: the formatted report followed by the
/// raw model output behind a disclosure widget. The formatted HTML is trusted
/// (we built it); the raw output is not and gets escaped.
pub fn render_document(record: &HistoryRecordRow) -> String {
    let generated = record.created_at.format("%Y-%m-%d %H:%M:%S UTC");

    format!(
        r#"<!DOCTYPE html>
<html>
<head>
<meta charset="utf-8">
<title>Weekly Report</title>
<style>
    body {{ font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif; line-height: 1.6; margin: 40px; }}
    h1, h2, h3 {{ color: #2c3e50; }}
    table {{ border-collapse: collapse; width: 100%; margin: 15px 0; }}
    th, td {{ border: 1px solid #ddd; padding: 12px; text-align: left; }}
    th {{ background-color: #f8f9fa; }}
    pre.code-block {{ background-color: #f8f9fa; padding: 12px; overflow-x: auto; }}
    details {{ margin-top: 30px; }}
    @media print {{ body {{ margin: 20px; }} details {{ display: none; }} }}
</style>
</head>
<body>
<h1>Weekly Report</h1>
<p>Generated: {generated}</p>
<hr>
{formatted}
<details>
<summary>Raw model output</summary>
<pre>{raw}</pre>
</details>
</body>
</html>
"#,
        formatted = record.formatted_html,
        raw = escape_html(&record.raw_output),
    )
}
