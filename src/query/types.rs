//! Request and result types shared by the backends, the error detector and
//! the output normalizer.

use crate::config::ConfigOverrides;
use crate::error::ExecError;
use serde::Serialize;

/// One result row: column name to value, in column order.
pub type Row = serde_json::Map<String, serde_json::Value>;

/// Whether a request mutates (statement) or reads (query).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestKind {
    /// Returns a row set.
    #[default]
    Query,
    /// Returns an affected-row summary.
    Statement,
}

/// A single query to run, with optional per-call overrides.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct QueryRequest {
    pub text: String,
    pub kind: RequestKind,
    pub overrides: Option<ConfigOverrides>,
}

impl QueryRequest {
    /// Creates a row-returning query request.
    pub fn query(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            kind: RequestKind::Query,
            overrides: None,
        }
    }

    /// Creates a statement request.
    pub fn statement(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            kind: RequestKind::Statement,
            overrides: None,
        }
    }

    /// Attaches per-call overrides.
    pub fn with_overrides(mut self, overrides: ConfigOverrides) -> Self {
        self.overrides = Some(overrides);
        self
    }

    pub fn is_statement(&self) -> bool {
        self.kind == RequestKind::Statement
    }
}

/// How the backend itself reported the call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitIndicator {
    Success,
    /// Non-zero exit (local) or protocol-level failure (server).
    /// `code` is `None` when the process was killed by a signal.
    Failure { code: Option<i32> },
}

impl ExitIndicator {
    pub fn from_code(code: Option<i32>) -> Self {
        match code {
            Some(0) => Self::Success,
            code => Self::Failure { code },
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }
}

/// Backend output before error detection and normalization.
#[derive(Debug, Clone, PartialEq)]
pub struct RawOutput {
    pub kind: RequestKind,
    /// Result payload text (JSON for both backends).
    pub stdout: String,
    /// Diagnostic channel.
    pub stderr: String,
    pub exit: ExitIndicator,
    /// Affected-row count when the protocol reports one.
    pub rows_affected: Option<u64>,
}

impl RawOutput {
    /// Successful output with the given stdout and stderr.
    pub fn success(kind: RequestKind, stdout: impl Into<String>, stderr: impl Into<String>) -> Self {
        Self {
            kind,
            stdout: stdout.into(),
            stderr: stderr.into(),
            exit: ExitIndicator::Success,
            rows_affected: None,
        }
    }

    /// Failed output with the given exit code and diagnostics.
    pub fn failure(kind: RequestKind, code: Option<i32>, stderr: impl Into<String>) -> Self {
        Self {
            kind,
            stdout: String::new(),
            stderr: stderr.into(),
            exit: ExitIndicator::Failure { code },
            rows_affected: None,
        }
    }
}

/// Successful payload.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Payload {
    Rows(Vec<Row>),
    Statement { message: String, rows_affected: u64 },
}

/// Error payload: a message and the category that classified it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorPayload {
    pub message: String,
    pub category: String,
}

/// Outcome of one query. Always exactly one of the two variants.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", content = "result", rename_all = "lowercase")]
pub enum ExecutionResult {
    Success(Payload),
    Error(ErrorPayload),
}

impl ExecutionResult {
    /// Successful row set.
    pub fn rows(rows: Vec<Row>) -> Self {
        Self::Success(Payload::Rows(rows))
    }

    /// Successful statement summary.
    pub fn statement(message: impl Into<String>, rows_affected: u64) -> Self {
        Self::Success(Payload::Statement {
            message: message.into(),
            rows_affected,
        })
    }

    /// Error with the given message and category.
    pub fn error(message: impl Into<String>, category: impl Into<String>) -> Self {
        Self::Error(ErrorPayload {
            message: message.into(),
            category: category.into(),
        })
    }

    /// Folds an execution failure into an error result.
    pub fn from_error(err: &ExecError) -> Self {
        Self::error(err.message(), err.label())
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error(_))
    }

    /// Returns the error payload, if any.
    pub fn as_error(&self) -> Option<&ErrorPayload> {
        match self {
            Self::Error(e) => Some(e),
            Self::Success(_) => None,
        }
    }

    /// Returns the rows of a successful query.
    pub fn as_rows(&self) -> Option<&[Row]> {
        match self {
            Self::Success(Payload::Rows(rows)) => Some(rows),
            _ => None,
        }
    }
}

/// Position-aligned results of a batch: `results[i]` belongs to request `i`.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(transparent)]
pub struct BatchResult {
    results: Vec<ExecutionResult>,
}

impl BatchResult {
    pub fn new(results: Vec<ExecutionResult>) -> Self {
        Self { results }
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&ExecutionResult> {
        self.results.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ExecutionResult> {
        self.results.iter()
    }

    pub fn into_results(self) -> Vec<ExecutionResult> {
        self.results
    }

    pub fn error_count(&self) -> usize {
        self.results.iter().filter(|r| r.is_error()).count()
    }
}

impl<'a> IntoIterator for &'a BatchResult {
    type Item = &'a ExecutionResult;
    type IntoIter = std::slice::Iter<'a, ExecutionResult>;

    fn into_iter(self) -> Self::IntoIter {
        self.results.iter()
    }
}
