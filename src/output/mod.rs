//! Output normalization.
//!
//! Every output format is rendered from one canonical row representation.
//! Backends only ever produce JSON rows; CSV, tables, Markdown-KV and
//! columnar frames are derived here.

mod delimited;
mod frame;
mod markdown;
mod table;

pub use delimited::{decode_csv, encode_csv, CsvOptions};
pub use frame::DataFrame;
pub use markdown::render_markdown_kv;
pub use table::render_table;

use crate::config::OutputFormat;
use crate::error::Result;
use crate::query::{ExecutionResult, Payload, Row};
use serde_json::{json, Value as JsonValue};
use std::fmt;

/// A normalized result in the caller's requested format.
#[derive(Debug, Clone, PartialEq)]
pub enum Rendered {
    /// `dict`: sequence of records.
    Records(Vec<Row>),
    /// `csv`, `table`, `markdownkv`.
    Text(String),
    /// `pandas`: columnar frame.
    Frame(DataFrame),
}

impl Rendered {
    /// Returns the records of a `dict` rendering.
    pub fn as_records(&self) -> Option<&[Row]> {
        match self {
            Self::Records(rows) => Some(rows),
            _ => None,
        }
    }

    /// Returns the text of a textual rendering.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            _ => None,
        }
    }

    /// Returns the frame of a `pandas` rendering.
    pub fn as_frame(&self) -> Option<&DataFrame> {
        match self {
            Self::Frame(frame) => Some(frame),
            _ => None,
        }
    }
}

impl fmt::Display for Rendered {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Records(rows) => {
                let text = serde_json::to_string_pretty(rows).map_err(|_| fmt::Error)?;
                writeln!(f, "{text}")
            }
            Self::Text(text) => f.write_str(text),
            Self::Frame(frame) => f.write_str(&render_table(&frame.to_rows())),
        }
    }
}

/// Converts `result` into the requested format.
///
/// Error results become a single row exposing `error` and `category`;
/// statement results a single row with `message` and `rowsaffected`.
/// Deterministic: the same input always renders byte-identically.
pub fn normalize(
    result: &ExecutionResult,
    format: OutputFormat,
    csv: &CsvOptions,
) -> Result<Rendered> {
    let rows = canonical_rows(result);
    match format {
        OutputFormat::Dict => Ok(Rendered::Records(rows)),
        OutputFormat::Csv => Ok(Rendered::Text(encode_csv(&rows, csv)?)),
        OutputFormat::Table => Ok(Rendered::Text(render_table(&rows))),
        OutputFormat::MarkdownKv => Ok(Rendered::Text(render_markdown_kv(result))),
        OutputFormat::Pandas => Ok(Rendered::Frame(DataFrame::from_rows(&rows))),
    }
}

/// Concatenates several results, in order, into one rendering.
///
/// Each error result contributes its single error row.
pub fn combine(
    results: &[ExecutionResult],
    format: OutputFormat,
    csv: &CsvOptions,
) -> Result<Rendered> {
    let rows: Vec<Row> = results.iter().flat_map(canonical_rows).collect();
    normalize(&ExecutionResult::rows(rows), format, csv)
}

/// The canonical rows for any result variant.
pub fn canonical_rows(result: &ExecutionResult) -> Vec<Row> {
    match result {
        ExecutionResult::Success(Payload::Rows(rows)) => rows.clone(),
        ExecutionResult::Success(Payload::Statement {
            message,
            rows_affected,
        }) => vec![object(json!({
            "message": message,
            "rowsaffected": rows_affected,
        }))],
        ExecutionResult::Error(error) => vec![object(json!({
            "error": error.message,
            "category": error.category,
        }))],
    }
}

fn object(value: JsonValue) -> Row {
    match value {
        JsonValue::Object(map) => map,
        _ => Row::new(),
    }
}

/// Column names across `rows`, in first-seen order.
pub fn columns(rows: &[Row]) -> Vec<String> {
    let mut columns: Vec<String> = Vec::new();
    for row in rows {
        for key in row.keys() {
            if !columns.iter().any(|c| c == key) {
                columns.push(key.clone());
            }
        }
    }
    columns
}

/// Renders a scalar as text; `null` becomes `null_text`, nested values
/// their compact JSON.
pub(crate) fn cell_text(value: Option<&JsonValue>, null_text: &str) -> String {
    match value {
        None | Some(JsonValue::Null) => null_text.to_string(),
        Some(JsonValue::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

/// Decodes engine stdout (a JSON array of objects, or a single object) into
/// rows. Non-object array items become `{"value": item}`.
pub fn decode_json_rows(text: &str) -> std::result::Result<Vec<Row>, String> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Ok(Vec::new());
    }

    let value: JsonValue = serde_json::from_str(trimmed).map_err(|e| e.to_string())?;
    match value {
        JsonValue::Null => Ok(Vec::new()),
        JsonValue::Object(map) => Ok(vec![map]),
        JsonValue::Array(items) => Ok(items
            .into_iter()
            .map(|item| match item {
                JsonValue::Object(map) => map,
                other => {
                    let mut row = Row::new();
                    row.insert("value".to_string(), other);
                    row
                }
            })
            .collect()),
        _ => Err("expected a JSON array or object".to_string()),
    }
}
