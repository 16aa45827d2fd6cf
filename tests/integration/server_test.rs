//! Server backend integration tests.
//!
//! These run against any PostgreSQL wire-compatible server and are skipped
//! unless DATABASE_URL is set.

use serde_json::json;
use stackql_exec::backend::ServerBackend;
use stackql_exec::config::{BackendMode, ConfigOverrides, ExecutionConfig, ServerSettings};
use stackql_exec::error::ExecError;
use stackql_exec::query::QueryExecutor;
use std::sync::Arc;

/// Helper to get test database URL from environment.
fn get_test_database_url() -> Option<String> {
    std::env::var("DATABASE_URL").ok()
}

/// Helper to connect a server backend.
async fn get_test_backend() -> Option<Arc<ServerBackend>> {
    let url = get_test_database_url()?;
    let settings = ServerSettings::from_connection_string(&url).ok()?;
    ServerBackend::connect(&settings).await.ok().map(Arc::new)
}

fn server_executor(backend: Arc<ServerBackend>) -> QueryExecutor {
    let config = ExecutionConfig {
        mode: BackendMode::Server,
        ..ExecutionConfig::default()
    };
    QueryExecutor::new(config).with_server_backend(backend)
}

#[tokio::test]
async fn test_connection_check() {
    let Some(backend) = get_test_backend().await else {
        eprintln!("Skipping test: DATABASE_URL not set");
        return;
    };

    backend.test_connection().await.unwrap();
    backend.close().await;
}

#[tokio::test]
async fn test_query_rows_over_server() {
    let Some(backend) = get_test_backend().await else {
        eprintln!("Skipping test: DATABASE_URL not set");
        return;
    };
    let executor = server_executor(backend.clone());

    let rendered = executor
        .execute(
            "SELECT 1 AS num, 'hello' AS greeting",
            &ConfigOverrides::none(),
        )
        .await
        .unwrap();

    let rows = rendered.as_records().unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["num"], json!(1));
    assert_eq!(rows[0]["greeting"], json!("hello"));
    let columns: Vec<&String> = rows[0].keys().collect();
    assert_eq!(columns, vec!["num", "greeting"]);

    backend.close().await;
}

#[tokio::test]
async fn test_statement_over_server() {
    let Some(backend) = get_test_backend().await else {
        eprintln!("Skipping test: DATABASE_URL not set");
        return;
    };
    let executor = server_executor(backend.clone());

    let rendered = executor
        .execute_statement("SET application_name = 'stackql-exec'", &ConfigOverrides::none())
        .await
        .unwrap();

    let rows = rendered.as_records().unwrap();
    assert_eq!(rows[0]["rowsaffected"], json!(0));

    backend.close().await;
}

#[tokio::test]
async fn test_sql_fault_is_protocol_error() {
    let Some(backend) = get_test_backend().await else {
        eprintln!("Skipping test: DATABASE_URL not set");
        return;
    };
    let executor = server_executor(backend.clone());

    let err = executor
        .execute("SELECT * FROM nonexistent_table_xyz", &ConfigOverrides::none())
        .await
        .unwrap_err();
    assert!(matches!(err, ExecError::Protocol(_)));
    assert!(err.to_string().contains("nonexistent_table_xyz"));

    backend.close().await;
}

#[tokio::test]
async fn test_closed_pool_is_connection_error() {
    let Some(backend) = get_test_backend().await else {
        eprintln!("Skipping test: DATABASE_URL not set");
        return;
    };
    let executor = server_executor(backend.clone());
    backend.close().await;

    let err = executor
        .execute("SELECT 1", &ConfigOverrides::none())
        .await
        .unwrap_err();
    assert!(matches!(err, ExecError::Connection(_)));
}

#[tokio::test]
async fn test_unreachable_server() {
    let settings = ServerSettings {
        host: "127.0.0.1".to_string(),
        port: 1,
        acquire_timeout_secs: 1,
        ..ServerSettings::default()
    };

    let result = ServerBackend::connect(&settings).await;
    assert!(matches!(result, Err(ExecError::Connection(_))));
}
