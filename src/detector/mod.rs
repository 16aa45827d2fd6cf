//! Embedded error detection.
//!
//! The engine frequently exits successfully while its output describes a
//! provider failure (an HTTP 403 in the stderr log, an error string inside a
//! JSON document). This module reclassifies such output as an error before
//! it reaches callers.

mod patterns;

pub use patterns::{
    init_patterns, patterns, ErrorPattern, PatternKind, PatternSet, DEFAULT_FUZZY_THRESHOLD,
};

use crate::output::decode_json_rows;
use crate::query::{ErrorPayload, ExecutionResult, ExitIndicator, RawOutput, RequestKind};
use serde_json::Value as JsonValue;

/// Category labels produced by the detector itself.
pub mod categories {
    /// Backend reported failure and no pattern matched.
    pub const UNCLASSIFIED: &str = "unclassified";
    /// Backend reported success but stdout was not a JSON document.
    pub const INVALID_OUTPUT: &str = "invalid_output";
}

/// Classifies `raw` using the process-wide pattern set.
pub fn detect(raw: &RawOutput) -> ExecutionResult {
    detect_with(raw, patterns())
}

/// Classifies `raw` against `set`.
///
/// Patterns are evaluated exact, then regex, then fuzzy; the first match
/// decides the category. For each pattern stdout is checked before stderr.
/// Never fails: every outcome is an `ExecutionResult`.
pub fn detect_with(raw: &RawOutput, set: &PatternSet) -> ExecutionResult {
    if let Some(error) = classify(raw, set) {
        return ExecutionResult::Error(error);
    }

    if let ExitIndicator::Failure { code } = raw.exit {
        let message = if !raw.stderr.trim().is_empty() {
            raw.stderr.clone()
        } else if !raw.stdout.trim().is_empty() {
            raw.stdout.clone()
        } else {
            match code {
                Some(code) => format!("backend exited with status {code}"),
                None => "backend terminated by signal".to_string(),
            }
        };
        return ExecutionResult::error(message, categories::UNCLASSIFIED);
    }

    match raw.kind {
        RequestKind::Statement => {
            // The engine reports statement outcomes on the diagnostic channel,
            // one line per affected item.
            let rows_affected = raw
                .rows_affected
                .unwrap_or_else(|| raw.stderr.matches('\n').count() as u64);
            ExecutionResult::statement(raw.stderr.trim_end(), rows_affected)
        }
        RequestKind::Query => match decode_json_rows(&raw.stdout) {
            Ok(rows) => ExecutionResult::rows(rows),
            Err(reason) => ExecutionResult::error(
                format!("Invalid JSON output: {reason}: {}", raw.stdout.trim()),
                categories::INVALID_OUTPUT,
            ),
        },
    }
}

/// Returns the first pattern match in `raw`, if any.
pub fn classify(raw: &RawOutput, set: &PatternSet) -> Option<ErrorPayload> {
    let stdout_json: Option<JsonValue> = serde_json::from_str(raw.stdout.trim()).ok();

    for pattern in set.iter() {
        if !raw.stdout.is_empty() && pattern.matches(&raw.stdout) {
            let message = stdout_json
                .as_ref()
                .and_then(|doc| first_matching_leaf(doc, pattern))
                .unwrap_or_else(|| raw.stdout.trim().to_string());
            return Some(ErrorPayload {
                message,
                category: pattern.category().to_string(),
            });
        }
        if !raw.stderr.is_empty() && pattern.matches(&raw.stderr) {
            return Some(ErrorPayload {
                message: raw.stderr.trim().to_string(),
                category: pattern.category().to_string(),
            });
        }
    }

    None
}

/// Depth-first, document-order search for a string leaf matching `pattern`.
fn first_matching_leaf(value: &JsonValue, pattern: &ErrorPattern) -> Option<String> {
    match value {
        JsonValue::String(s) if pattern.matches(s) => Some(s.clone()),
        JsonValue::Array(items) => items
            .iter()
            .find_map(|item| first_matching_leaf(item, pattern)),
        JsonValue::Object(map) => map
            .values()
            .find_map(|item| first_matching_leaf(item, pattern)),
        _ => None,
    }
}
