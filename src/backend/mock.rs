//! Mock backend for testing.
//!
//! Returns scripted outputs per query text, optionally after a delay, and
//! records how many calls were in flight at once.

use super::QueryBackend;
use crate::config::ExecutionConfig;
use crate::error::Result;
use crate::query::{QueryRequest, RawOutput};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// A scripted backend. Unscripted queries echo themselves back as a
/// one-row result: `[{"query": "<text>"}]`.
#[derive(Debug, Default)]
pub struct MockBackend {
    responses: HashMap<String, Result<RawOutput>>,
    delays: HashMap<String, Duration>,
    default_delay: Duration,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    calls: Mutex<Vec<(String, ExecutionConfig)>>,
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Scripts the output for `query`.
    pub fn with_output(mut self, query: impl Into<String>, output: RawOutput) -> Self {
        self.responses.insert(query.into(), Ok(output));
        self
    }

    /// Scripts a backend failure for `query`.
    pub fn with_error(mut self, query: impl Into<String>, error: crate::error::ExecError) -> Self {
        self.responses.insert(query.into(), Err(error));
        self
    }

    /// Delays `query` by `delay` before answering.
    pub fn with_delay(mut self, query: impl Into<String>, delay: Duration) -> Self {
        self.delays.insert(query.into(), delay);
        self
    }

    /// Delays every query without its own delay.
    pub fn with_default_delay(mut self, delay: Duration) -> Self {
        self.default_delay = delay;
        self
    }

    /// Highest number of calls observed running at once.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    /// Query texts received, in arrival order.
    pub fn calls(&self) -> Vec<String> {
        self.recorded().into_iter().map(|(query, _)| query).collect()
    }

    /// Resolved configuration each call ran with, in arrival order.
    pub fn configs(&self) -> Vec<ExecutionConfig> {
        self.recorded().into_iter().map(|(_, config)| config).collect()
    }

    fn recorded(&self) -> Vec<(String, ExecutionConfig)> {
        match self.calls.lock() {
            Ok(calls) => calls.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

#[async_trait]
impl QueryBackend for MockBackend {
    async fn run(&self, request: &QueryRequest, config: &ExecutionConfig) -> Result<RawOutput> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        match self.calls.lock() {
            Ok(mut calls) => calls.push((request.text.clone(), config.clone())),
            Err(poisoned) => poisoned
                .into_inner()
                .push((request.text.clone(), config.clone())),
        }

        let delay = self
            .delays
            .get(&request.text)
            .copied()
            .unwrap_or(self.default_delay);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let result = match self.responses.get(&request.text) {
            Some(Ok(output)) => Ok(RawOutput {
                kind: request.kind,
                ..output.clone()
            }),
            Some(Err(e)) => Err(e.clone()),
            None => Ok(RawOutput::success(
                request.kind,
                serde_json::json!([{ "query": request.text }]).to_string(),
                "",
            )),
        };

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}
