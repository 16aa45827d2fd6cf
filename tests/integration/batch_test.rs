//! Batch execution integration tests.

use pretty_assertions::assert_eq;
use serde_json::json;
use stackql_exec::backend::MockBackend;
use stackql_exec::config::{ConfigOverrides, ExecutionConfig};
use stackql_exec::error::ExecError;
use stackql_exec::query::{QueryExecutor, QueryRequest};
use std::sync::Arc;
use std::time::Duration;

fn mock_executor(mock: MockBackend) -> (QueryExecutor, Arc<MockBackend>) {
    let mock = Arc::new(mock);
    let executor = QueryExecutor::new(ExecutionConfig::default()).with_local_backend(mock.clone());
    (executor, mock)
}

#[tokio::test]
async fn test_results_follow_request_order_not_completion_order() {
    // Earlier requests finish later.
    let mut mock = MockBackend::new();
    for i in 0..5u64 {
        mock = mock.with_delay(format!("q{i}"), Duration::from_millis(100 - i * 20));
    }
    let (executor, _) = mock_executor(mock);
    let requests: Vec<QueryRequest> = (0..5).map(|i| QueryRequest::query(format!("q{i}"))).collect();

    let batch = executor.run_batch(&requests, 5).await.unwrap();

    let order: Vec<_> = batch
        .iter()
        .map(|r| r.as_rows().unwrap()[0]["query"].clone())
        .collect();
    assert_eq!(
        order,
        vec![json!("q0"), json!("q1"), json!("q2"), json!("q3"), json!("q4")]
    );
}

#[tokio::test]
async fn test_failures_are_captured_at_their_index() {
    let mock = MockBackend::new()
        .with_error("bad-launch", ExecError::launch("stackql not found"))
        .with_error("bad-timeout", ExecError::timeout("too slow", "[{"));
    let (executor, _) = mock_executor(mock);
    let requests: Vec<QueryRequest> = ["ok-1", "bad-launch", "ok-2", "bad-timeout"]
        .into_iter()
        .map(QueryRequest::query)
        .collect();

    let batch = executor.run_batch(&requests, 2).await.unwrap();

    assert_eq!(batch.len(), requests.len());
    assert_eq!(batch.error_count(), 2);
    assert!(batch.get(0).unwrap().is_success());
    assert_eq!(batch.get(1).unwrap().as_error().unwrap().category, "launch_error");
    assert!(batch.get(2).unwrap().is_success());
    assert_eq!(batch.get(3).unwrap().as_error().unwrap().category, "timeout");
}

#[tokio::test]
async fn test_limit_one_serializes_execution() {
    let (executor, mock) =
        mock_executor(MockBackend::new().with_default_delay(Duration::from_millis(15)));
    let requests: Vec<QueryRequest> = (0..4).map(|i| QueryRequest::query(format!("q{i}"))).collect();

    executor.run_batch(&requests, 1).await.unwrap();

    assert_eq!(mock.max_in_flight(), 1);
}

#[tokio::test]
async fn test_limit_at_least_batch_size_runs_everything_at_once() {
    let (executor, mock) =
        mock_executor(MockBackend::new().with_default_delay(Duration::from_millis(50)));
    let requests: Vec<QueryRequest> = (0..4).map(|i| QueryRequest::query(format!("q{i}"))).collect();

    executor.run_batch(&requests, 4).await.unwrap();

    assert_eq!(mock.max_in_flight(), 4);
}

#[tokio::test]
async fn test_zero_limit_rejected_before_dispatch() {
    let (executor, mock) = mock_executor(MockBackend::new());
    let requests = vec![QueryRequest::query("q0"), QueryRequest::query("q1")];

    let err = executor.run_batch(&requests, 0).await.unwrap_err();

    assert!(matches!(err, ExecError::Config(_)));
    assert!(mock.calls().is_empty());
}

#[tokio::test]
async fn test_empty_batch() {
    let (executor, _) = mock_executor(MockBackend::new());
    let batch = executor.run_batch(&[], 3).await.unwrap();
    assert!(batch.is_empty());
}

#[tokio::test]
async fn test_per_request_overrides_are_independent() {
    let (executor, mock) = mock_executor(MockBackend::new());
    let requests = vec![
        QueryRequest::query("a").with_overrides(ConfigOverrides {
            max_depth: Some(1),
            ..ConfigOverrides::none()
        }),
        QueryRequest::query("b"),
    ];

    executor.run_batch(&requests, 1).await.unwrap();

    let configs = mock.configs();
    assert_eq!(configs[0].max_depth, 1);
    assert_eq!(configs[1].max_depth, ExecutionConfig::default().max_depth);
}

#[tokio::test]
async fn test_execute_batch_renders_combined_csv() {
    let (executor, _) = mock_executor(MockBackend::new());
    let overrides = ConfigOverrides {
        header: Some(true),
        concurrency_limit: Some(2),
        ..ConfigOverrides::output("csv")
    };
    let queries = vec!["x".to_string(), "y".to_string(), "z".to_string()];

    let rendered = executor.execute_batch(&queries, &overrides).await.unwrap();

    assert_eq!(rendered.as_text().unwrap(), "query\nx\ny\nz\n");
}

#[cfg(unix)]
#[tokio::test]
async fn test_local_timeout_does_not_abort_siblings() {
    use super::common::FakeEngine;

    let engine = FakeEngine::install();
    let config = ExecutionConfig {
        timeout: Duration::from_millis(500),
        ..engine.config()
    };
    let executor = QueryExecutor::new(config);
    let requests: Vec<QueryRequest> = ["SHOW PROVIDERS", "SLOW", "PULL"]
        .into_iter()
        .map(|q| {
            if q == "PULL" {
                QueryRequest::statement(q)
            } else {
                QueryRequest::query(q)
            }
        })
        .collect();

    let batch = executor.run_batch(&requests, 3).await.unwrap();

    assert_eq!(batch.len(), 3);
    assert_eq!(batch.get(0).unwrap().as_rows().unwrap().len(), 2);
    assert_eq!(batch.get(1).unwrap().as_error().unwrap().category, "timeout");
    assert!(batch.get(2).unwrap().is_success());
}
