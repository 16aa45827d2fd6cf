//! Delimited text encoding (the `csv` format) and its inverse.

use super::{cell_text, columns};
use crate::config::ExecutionConfig;
use crate::error::{ExecError, Result};
use crate::query::Row;
use serde_json::Value as JsonValue;

/// Separator and header settings for CSV rendering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CsvOptions {
    /// Single ASCII field separator.
    pub sep: char,
    pub header: bool,
}

impl Default for CsvOptions {
    fn default() -> Self {
        Self {
            sep: ',',
            header: false,
        }
    }
}

impl From<&ExecutionConfig> for CsvOptions {
    fn from(config: &ExecutionConfig) -> Self {
        Self {
            sep: config.sep,
            header: config.header,
        }
    }
}

fn delimiter(sep: char) -> Result<u8> {
    u8::try_from(sep)
        .ok()
        .filter(u8::is_ascii)
        .ok_or_else(|| ExecError::config(format!("CSV separator must be ASCII, got {sep:?}")))
}

/// Encodes rows as delimited text. Nulls and missing cells are empty fields.
pub fn encode_csv(rows: &[Row], options: &CsvOptions) -> Result<String> {
    let columns = columns(rows);
    let mut writer = csv::WriterBuilder::new()
        .delimiter(delimiter(options.sep)?)
        .from_writer(Vec::new());

    let write_err = |e: csv::Error| ExecError::internal(format!("CSV encoding failed: {e}"));

    if options.header && !columns.is_empty() {
        writer.write_record(&columns).map_err(write_err)?;
    }
    for row in rows {
        let record: Vec<String> = columns.iter().map(|c| cell_text(row.get(c), "")).collect();
        writer.write_record(&record).map_err(write_err)?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| ExecError::internal(format!("CSV encoding failed: {e}")))?;
    String::from_utf8(bytes).map_err(|e| ExecError::internal(format!("CSV encoding failed: {e}")))
}

/// Decodes delimited text back into rows with string values.
///
/// Without a header row, columns are named by position (`"0"`, `"1"`, ...).
pub fn decode_csv(text: &str, options: &CsvOptions) -> Result<Vec<Row>> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter(options.sep)?)
        .has_headers(options.header)
        .flexible(true)
        .from_reader(text.as_bytes());

    let read_err = |e: csv::Error| ExecError::config(format!("Invalid CSV input: {e}"));

    let headers: Option<Vec<String>> = if options.header {
        Some(
            reader
                .headers()
                .map_err(read_err)?
                .iter()
                .map(String::from)
                .collect(),
        )
    } else {
        None
    };

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(read_err)?;
        let mut row = Row::new();
        for (i, field) in record.iter().enumerate() {
            let name = headers
                .as_ref()
                .and_then(|h| h.get(i).cloned())
                .unwrap_or_else(|| i.to_string());
            row.insert(name, JsonValue::String(field.to_string()));
        }
        rows.push(row);
    }
    Ok(rows)
}
