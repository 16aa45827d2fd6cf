//! Query execution for stackql-exec.
//!
//! This module holds the request/result model and the executor that drives
//! a request through backend, detection and rendering.

pub mod executor;
mod types;

pub use executor::QueryExecutor;
pub use types::{
    BatchResult, ErrorPayload, ExecutionResult, ExitIndicator, Payload, QueryRequest, RawOutput,
    RequestKind, Row,
};
