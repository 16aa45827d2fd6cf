//! Local backend integration tests.
//!
//! Runs the executor end to end against the fake engine script.

#![cfg(unix)]

use super::common::FakeEngine;
use pretty_assertions::assert_eq;
use serde_json::json;
use stackql_exec::config::{ConfigOverrides, ExecutionConfig};
use stackql_exec::error::ExecError;
use stackql_exec::query::{QueryExecutor, QueryRequest};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::{Duration, Instant};

#[tokio::test]
async fn test_query_returns_rows() {
    let engine = FakeEngine::install();
    let executor = QueryExecutor::new(engine.config());

    let rendered = executor
        .execute("SHOW PROVIDERS", &ConfigOverrides::none())
        .await
        .unwrap();

    let rows = rendered.as_records().unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0]["name"], json!("aws"));
    assert_eq!(rows[1]["version"], json!("v24.04.00"));
}

#[tokio::test]
async fn test_csv_rendered_client_side() {
    let engine = FakeEngine::install();
    let executor = QueryExecutor::new(engine.config());
    let overrides = ConfigOverrides {
        sep: Some("|".into()),
        header: Some(true),
        ..ConfigOverrides::output("csv")
    };

    let rendered = executor.execute("SHOW PROVIDERS", &overrides).await.unwrap();
    assert_eq!(
        rendered.as_text().unwrap(),
        "name|version\naws|v24.07.00\ngithub|v24.04.00\n"
    );
}

#[tokio::test]
async fn test_zero_timeout_is_timeout_error() {
    let engine = FakeEngine::install();
    let executor = QueryExecutor::new(engine.config());
    let overrides = ConfigOverrides {
        timeout_secs: Some(0.0),
        ..ConfigOverrides::none()
    };

    let err = executor
        .execute("SHOW PROVIDERS", &overrides)
        .await
        .unwrap_err();
    assert!(matches!(err, ExecError::Timeout { .. }));
}

#[tokio::test]
async fn test_zero_timeout_suppressed_is_error_result() {
    let engine = FakeEngine::install();
    let executor = QueryExecutor::new(engine.config());
    let overrides = ConfigOverrides {
        timeout_secs: Some(0.0),
        suppress_errors: Some(true),
        ..ConfigOverrides::none()
    };

    let rendered = executor
        .execute("SHOW PROVIDERS", &overrides)
        .await
        .unwrap();
    assert_eq!(rendered.as_records().unwrap()[0]["category"], json!("timeout"));
}

#[tokio::test]
async fn test_slow_query_times_out_with_partial_output() {
    let engine = FakeEngine::install();
    let executor = QueryExecutor::new(engine.config());
    let overrides = ConfigOverrides {
        timeout_secs: Some(0.5),
        ..ConfigOverrides::none()
    };

    let started = Instant::now();
    let err = executor.execute("SLOW", &overrides).await.unwrap_err();
    assert!(started.elapsed() < Duration::from_secs(4));
    match err {
        ExecError::Timeout { partial_stdout, .. } => {
            assert_eq!(partial_stdout, r#"[{"partial":"#)
        }
        other => panic!("expected timeout, got {other:?}"),
    }
}

#[tokio::test]
async fn test_missing_binary_is_launch_error() {
    let config = ExecutionConfig {
        binary_path: PathBuf::from("/nonexistent/dir/stackql"),
        ..ExecutionConfig::default()
    };
    let executor = QueryExecutor::new(config);

    let err = executor
        .execute("SHOW PROVIDERS", &ConfigOverrides::none())
        .await
        .unwrap_err();
    assert!(matches!(err, ExecError::Launch(_)));
}

#[tokio::test]
async fn test_embedded_error_with_exit_zero() {
    let engine = FakeEngine::install();
    let executor = QueryExecutor::new(engine.config());

    let result = executor.run(&QueryRequest::query("AUTH")).await.unwrap();
    let error = result.as_error().unwrap();
    assert_eq!(error.message, "cannot compose signing credentials");
    assert_eq!(error.category, "provider_error");
}

#[tokio::test]
async fn test_http_error_on_stderr() {
    let engine = FakeEngine::install();
    let executor = QueryExecutor::new(engine.config());

    let result = executor.run(&QueryRequest::query("HTTP404")).await.unwrap();
    assert_eq!(result.as_error().unwrap().category, "http_4xx");
}

#[tokio::test]
async fn test_nonzero_exit_is_unclassified() {
    let engine = FakeEngine::install();
    let executor = QueryExecutor::new(engine.config());

    let result = executor.run(&QueryRequest::query("FAIL")).await.unwrap();
    let error = result.as_error().unwrap();
    assert_eq!(error.category, "unclassified");
    assert_eq!(error.message, "unexpected engine failure\n");
}

#[tokio::test]
async fn test_non_json_output_is_invalid_output() {
    let engine = FakeEngine::install();
    let executor = QueryExecutor::new(engine.config());

    let result = executor.run(&QueryRequest::query("GARBAGE")).await.unwrap();
    assert_eq!(result.as_error().unwrap().category, "invalid_output");
}

#[tokio::test]
async fn test_statement_summary() {
    let engine = FakeEngine::install();
    let executor = QueryExecutor::new(engine.config());

    let rendered = executor
        .execute_statement("PULL", &ConfigOverrides::none())
        .await
        .unwrap();
    let rows = rendered.as_records().unwrap();
    assert_eq!(
        rows[0]["message"],
        json!("github provider, version 'v24.04.00' successfully installed")
    );
    assert_eq!(rows[0]["rowsaffected"], json!(1));
}

#[tokio::test]
async fn test_env_vars_and_argument_vector() {
    let engine = FakeEngine::install();
    let executor = QueryExecutor::new(engine.config());
    let mut env = BTreeMap::new();
    env.insert("STACKQL_TEST_TOKEN".to_string(), "ghp_abc".to_string());
    env.insert(
        "ARGS_FILE".to_string(),
        engine.args_file().display().to_string(),
    );
    let overrides = ConfigOverrides {
        env_vars: Some(env),
        page_limit: Some(7),
        ..ConfigOverrides::none()
    };

    let rendered = executor.execute("ENV", &overrides).await.unwrap();
    assert_eq!(rendered.as_records().unwrap()[0]["token"], json!("ghp_abc"));

    let args = std::fs::read_to_string(engine.args_file()).unwrap();
    let args: Vec<&str> = args.lines().collect();
    assert_eq!(&args[..4], &["exec", "ENV", "--output", "json"]);
    let i = args
        .iter()
        .position(|a| *a == "--http.response.pageLimit")
        .unwrap();
    assert_eq!(args[i + 1], "7");
}

#[tokio::test]
async fn test_markdown_rendering_end_to_end() {
    let engine = FakeEngine::install();
    let executor = QueryExecutor::new(engine.config());

    let rendered = executor
        .execute("SHOW PROVIDERS", &ConfigOverrides::output("markdownkv"))
        .await
        .unwrap();
    let text = rendered.as_text().unwrap();
    assert!(text.starts_with("# Query Results"));
    assert!(text.contains("## Record 2"));
    assert!(text.contains("name: github"));
}
