//! Query execution.
//!
//! Resolves the per-call configuration, dispatches to the selected backend,
//! classifies the raw output and renders it. Batches fan out over the same
//! single-query path behind a semaphore.

use std::sync::Arc;

use futures::future::join_all;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use super::{BatchResult, ExecutionResult, QueryRequest};
use crate::backend::{LocalBackend, QueryBackend};
use crate::config::{resolve, BackendMode, ConfigOverrides, ExecutionConfig};
use crate::detector::{detect_with, patterns, PatternSet};
use crate::error::{ExecError, Result};
use crate::output::{combine, normalize, CsvOptions, Rendered};

/// Executes queries against the configured backend.
///
/// Holds the session defaults; every call resolves its own configuration
/// from them and never mutates them.
pub struct QueryExecutor {
    base: ExecutionConfig,
    local: Arc<dyn QueryBackend>,
    server: Option<Arc<dyn QueryBackend>>,
    patterns: Option<Arc<PatternSet>>,
}

impl QueryExecutor {
    /// Creates an executor that runs the engine binary locally.
    pub fn new(base: ExecutionConfig) -> Self {
        Self {
            base,
            local: Arc::new(LocalBackend::new()),
            server: None,
            patterns: None,
        }
    }

    /// Replaces the backend used in local mode.
    pub fn with_local_backend(mut self, backend: Arc<dyn QueryBackend>) -> Self {
        self.local = backend;
        self
    }

    /// Sets the backend used in server mode.
    pub fn with_server_backend(mut self, backend: Arc<dyn QueryBackend>) -> Self {
        self.server = Some(backend);
        self
    }

    /// Uses `set` instead of the process-wide pattern set.
    pub fn with_patterns(mut self, set: Arc<PatternSet>) -> Self {
        self.patterns = Some(set);
        self
    }

    /// The session defaults every call starts from.
    pub fn properties(&self) -> &ExecutionConfig {
        &self.base
    }

    fn pattern_set(&self) -> &PatternSet {
        match &self.patterns {
            Some(set) => set,
            None => patterns(),
        }
    }

    fn backend_for(&self, mode: BackendMode) -> Result<&Arc<dyn QueryBackend>> {
        match mode {
            BackendMode::Local => Ok(&self.local),
            BackendMode::Server => self.server.as_ref().ok_or_else(|| {
                ExecError::connection("Server mode selected but no server connection is configured")
            }),
        }
    }

    /// Resolves the configuration for one call.
    fn resolve_call(&self, overrides: Option<&ConfigOverrides>) -> Result<ExecutionConfig> {
        match overrides {
            Some(overrides) if !overrides.is_empty() => resolve(&self.base, overrides),
            _ => Ok(self.base.clone()),
        }
    }

    /// Runs one request through backend, detection and classification.
    ///
    /// Backend failures are returned as `Err` unless suppress-errors is in
    /// effect for the call, in which case they become an error result.
    pub async fn run(&self, request: &QueryRequest) -> Result<ExecutionResult> {
        let config = match self.resolve_call(request.overrides.as_ref()) {
            Ok(config) => config,
            Err(e) => return self.fold(e, self.base.effective_suppress_errors()),
        };
        self.run_with(request, &config).await
    }

    async fn run_with(
        &self,
        request: &QueryRequest,
        config: &ExecutionConfig,
    ) -> Result<ExecutionResult> {
        let suppress = config.effective_suppress_errors();
        let backend = match self.backend_for(config.mode) {
            Ok(backend) => backend,
            Err(e) => return self.fold(e, suppress),
        };

        debug!("Dispatching to {} backend: {}", backend.name(), request.text);
        match backend.run(request, config).await {
            Ok(raw) => Ok(detect_with(&raw, self.pattern_set())),
            Err(e) => self.fold(e, suppress),
        }
    }

    fn fold(&self, error: ExecError, suppress: bool) -> Result<ExecutionResult> {
        if suppress {
            warn!("Suppressed {}: {}", error.category(), error.message());
            Ok(ExecutionResult::from_error(&error))
        } else {
            Err(error)
        }
    }

    /// Invalid per-call overrides follow the session's suppress policy; a
    /// suppressed failure is rendered in the session's output format.
    fn render_resolve_failure(&self, error: ExecError) -> Result<Rendered> {
        let result = self.fold(error, self.base.effective_suppress_errors())?;
        normalize(&result, self.base.output, &CsvOptions::from(&self.base))
    }

    /// Runs `query` and renders it in the call's output format.
    pub async fn execute(&self, query: &str, overrides: &ConfigOverrides) -> Result<Rendered> {
        self.execute_request(QueryRequest::query(query), overrides)
            .await
    }

    /// Runs a statement and renders its summary in the call's output format.
    pub async fn execute_statement(
        &self,
        statement: &str,
        overrides: &ConfigOverrides,
    ) -> Result<Rendered> {
        self.execute_request(QueryRequest::statement(statement), overrides)
            .await
    }

    async fn execute_request(
        &self,
        request: QueryRequest,
        overrides: &ConfigOverrides,
    ) -> Result<Rendered> {
        let config = match self.resolve_call(Some(overrides)) {
            Ok(config) => config,
            Err(e) => return self.render_resolve_failure(e),
        };
        let result = self.run_with(&request, &config).await?;
        normalize(&result, config.output, &CsvOptions::from(&config))
    }

    /// Runs `requests` with at most `limit` in flight.
    ///
    /// Results are position-aligned with `requests`. A failing request never
    /// affects its siblings: its error is captured at its index. A zero
    /// limit is rejected before anything is dispatched.
    pub async fn run_batch(&self, requests: &[QueryRequest], limit: usize) -> Result<BatchResult> {
        if limit == 0 {
            return Err(ExecError::config(
                "Concurrency limit must be at least 1",
            ));
        }

        info!(
            "Dispatching batch of {} requests (concurrency limit {})",
            requests.len(),
            limit
        );

        let semaphore = Semaphore::new(limit);
        let tasks = requests.iter().map(|request| {
            let semaphore = &semaphore;
            async move {
                let _permit = match semaphore.acquire().await {
                    Ok(permit) => permit,
                    Err(e) => {
                        return ExecutionResult::from_error(&ExecError::internal(format!(
                            "Batch admission failed: {e}"
                        )))
                    }
                };
                self.run(request)
                    .await
                    .unwrap_or_else(|e| ExecutionResult::from_error(&e))
            }
        });

        let batch = BatchResult::new(join_all(tasks).await);
        debug!(
            "Batch finished: {} results, {} errors",
            batch.len(),
            batch.error_count()
        );
        Ok(batch)
    }

    /// Runs `queries` concurrently and renders the combined result.
    ///
    /// The concurrency limit and output format come from the resolved
    /// configuration; rows are concatenated in query order.
    pub async fn execute_batch(
        &self,
        queries: &[String],
        overrides: &ConfigOverrides,
    ) -> Result<Rendered> {
        let config = match self.resolve_call(Some(overrides)) {
            Ok(config) => config,
            Err(e) => return self.render_resolve_failure(e),
        };
        let requests: Vec<QueryRequest> = queries
            .iter()
            .map(|q| QueryRequest::query(q.as_str()).with_overrides(overrides.clone()))
            .collect();

        let batch = self.run_batch(&requests, config.concurrency_limit).await?;
        combine(
            &batch.into_results(),
            config.output,
            &CsvOptions::from(&config),
        )
    }
}
