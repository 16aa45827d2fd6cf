//! Markdown-KV rendering: one fenced `key: value` block per record.

use super::cell_text;
use crate::query::{ExecutionResult, Payload, Row};

const FENCE: &str = "```";

/// Renders `result` as hierarchical Markdown with key/value blocks.
pub fn render_markdown_kv(result: &ExecutionResult) -> String {
    match result {
        ExecutionResult::Success(Payload::Rows(rows)) => render_rows(rows),
        ExecutionResult::Success(Payload::Statement {
            message,
            rows_affected,
        }) => {
            let mut out = String::from("# Statement Result\n\n");
            out.push_str(FENCE);
            out.push('\n');
            out.push_str(&format!("message: {message}\n"));
            out.push_str(&format!("rowsaffected: {rows_affected}\n"));
            out.push_str(FENCE);
            out.push('\n');
            out
        }
        ExecutionResult::Error(error) => {
            let mut out = String::from("# Query Results\n\n## Error\n\n");
            out.push_str(FENCE);
            out.push('\n');
            out.push_str(&format!("error: {}\n", error.message));
            out.push_str(&format!("category: {}\n", error.category));
            out.push_str(FENCE);
            out.push('\n');
            out
        }
    }
}

fn render_rows(rows: &[Row]) -> String {
    let mut out = String::from("# Query Results\n\n");
    if rows.is_empty() {
        out.push_str("No records found\n");
        return out;
    }

    for (i, row) in rows.iter().enumerate() {
        if i > 0 {
            out.push('\n');
        }
        out.push_str(&format!("## Record {}\n\n", i + 1));
        out.push_str(FENCE);
        out.push('\n');
        for (key, value) in row {
            out.push_str(&format!("{key}: {}\n", cell_text(Some(value), "null")));
        }
        out.push_str(FENCE);
        out.push('\n');
    }
    out
}
