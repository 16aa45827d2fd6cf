//! Fixed-width text tables.
//!
//! Renders rows with column headers, auto-sized columns and NULL markers.

use super::{cell_text, columns};
use crate::query::Row;

/// Maximum width for any column.
const MAX_COLUMN_WIDTH: usize = 40;

/// Minimum width for any column.
const MIN_COLUMN_WIDTH: usize = 4;

/// Renders `rows` as a boxed text table followed by a row count footer.
pub fn render_table(rows: &[Row]) -> String {
    let columns = columns(rows);
    if columns.is_empty() {
        return "(empty result)\n".to_string();
    }

    let cells: Vec<Vec<String>> = rows
        .iter()
        .map(|row| columns.iter().map(|c| display(row, c)).collect())
        .collect();
    let widths = column_widths(&columns, &cells);

    let mut out = String::new();
    push_border(&mut out, &widths, '┌', '┬', '┐');
    push_row(&mut out, &columns, &widths);
    push_border(&mut out, &widths, '├', '┼', '┤');
    for row in &cells {
        push_row(&mut out, row, &widths);
    }
    push_border(&mut out, &widths, '└', '┴', '┘');

    let count = rows.len();
    out.push_str(&format!(
        "{} row{}\n",
        count,
        if count == 1 { "" } else { "s" }
    ));
    out
}

fn display(row: &Row, column: &str) -> String {
    cell_text(row.get(column), "NULL")
        .chars()
        .map(|c| if c.is_control() { ' ' } else { c })
        .collect()
}

/// Calculates the width of each column, capped at `MAX_COLUMN_WIDTH`.
fn column_widths(columns: &[String], cells: &[Vec<String>]) -> Vec<usize> {
    let mut widths: Vec<usize> = columns
        .iter()
        .map(|name| name.chars().count().max(MIN_COLUMN_WIDTH))
        .collect();

    for row in cells {
        for (i, value) in row.iter().enumerate() {
            widths[i] = widths[i].max(value.chars().count());
        }
    }

    widths.iter().map(|&w| w.min(MAX_COLUMN_WIDTH)).collect()
}

/// Truncates a string to fit within the given width, adding ellipsis if needed.
fn truncate(s: &str, max_width: usize) -> String {
    if s.chars().count() <= max_width {
        s.to_string()
    } else if max_width <= 3 {
        s.chars().take(max_width).collect()
    } else {
        let kept: String = s.chars().take(max_width - 3).collect();
        format!("{kept}...")
    }
}

fn push_border(out: &mut String, widths: &[usize], left: char, mid: char, right: char) {
    out.push(left);
    for (i, &width) in widths.iter().enumerate() {
        out.push_str(&"─".repeat(width + 2));
        if i < widths.len() - 1 {
            out.push(mid);
        }
    }
    out.push(right);
    out.push('\n');
}

fn push_row(out: &mut String, values: &[String], widths: &[usize]) {
    out.push('│');
    for (value, &width) in values.iter().zip(widths) {
        let truncated = truncate(value, width);
        out.push_str(&format!(" {truncated:width$} "));
        out.push('│');
    }
    out.push('\n');
}
