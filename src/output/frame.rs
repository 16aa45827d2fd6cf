//! Column-major tabular frames (the `pandas` format).

use super::columns;
use crate::query::Row;
use serde::Serialize;
use serde_json::Value as JsonValue;

/// A column-oriented table. Every column holds exactly `height()` values;
/// cells missing from a source row are `null`.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct DataFrame {
    columns: Vec<String>,
    data: Vec<Vec<JsonValue>>,
    height: usize,
}

impl DataFrame {
    /// Builds a frame from rows, with columns in first-seen order.
    pub fn from_rows(rows: &[Row]) -> Self {
        let columns = columns(rows);
        let data = columns
            .iter()
            .map(|c| {
                rows.iter()
                    .map(|row| row.get(c).cloned().unwrap_or(JsonValue::Null))
                    .collect()
            })
            .collect();
        Self {
            columns,
            data,
            height: rows.len(),
        }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Values of the named column, top to bottom.
    pub fn column(&self, name: &str) -> Option<&[JsonValue]> {
        self.columns
            .iter()
            .position(|c| c == name)
            .map(|i| self.data[i].as_slice())
    }

    /// Number of rows.
    pub fn height(&self) -> usize {
        self.height
    }

    /// Number of columns.
    pub fn width(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.height() == 0
    }

    /// Converts back to row-major form. Every row carries every column.
    pub fn to_rows(&self) -> Vec<Row> {
        (0..self.height())
            .map(|r| {
                self.columns
                    .iter()
                    .zip(&self.data)
                    .map(|(name, values)| (name.clone(), values[r].clone()))
                    .collect()
            })
            .collect()
    }

    /// Appends `other` below `self`, unioning the column sets.
    pub fn concat(&self, other: &DataFrame) -> DataFrame {
        let mut rows = self.to_rows();
        rows.extend(other.to_rows());
        DataFrame::from_rows(&rows)
    }
}
