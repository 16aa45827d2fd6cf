//! Execution backends for stackql-exec.
//!
//! Provides a trait-based interface over the two ways of reaching the
//! engine: a per-call subprocess and a pooled server connection. Both
//! produce the same `RawOutput` so detection and normalization are
//! backend-agnostic.

mod args;
mod local;
mod mock;
mod server;

pub use args::build_args;
pub use local::{run_local, LocalBackend};
pub use mock::MockBackend;
pub use server::ServerBackend;

use crate::config::ExecutionConfig;
use crate::error::Result;
use crate::query::{QueryRequest, RawOutput};
use async_trait::async_trait;

/// Trait defining the interface for execution backends.
///
/// Implementations must be safe to call concurrently; the batch executor
/// shares one backend across all in-flight requests.
#[async_trait]
pub trait QueryBackend: Send + Sync {
    /// Runs one request with its fully resolved configuration.
    async fn run(&self, request: &QueryRequest, config: &ExecutionConfig) -> Result<RawOutput>;

    /// Short name used in logs.
    fn name(&self) -> &'static str;
}
