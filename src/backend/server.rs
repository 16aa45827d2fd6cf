//! Server connection backend.
//!
//! Talks to a running `stackql srv` over the PostgreSQL wire protocol using
//! a sqlx connection pool. Row sets are re-encoded as JSON text so the
//! detector sees the same shape the local backend produces.

use super::QueryBackend;
use crate::config::{ExecutionConfig, ServerSettings};
use crate::error::{ExecError, Result};
use crate::query::{ExitIndicator, QueryRequest, RawOutput, RequestKind, Row};
use async_trait::async_trait;
use serde_json::Value as JsonValue;
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::{Column as SqlxColumn, Row as SqlxRow, TypeInfo};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Maximum number of connection retry attempts.
const MAX_RETRY_ATTEMPTS: u32 = 3;

/// Base delay between retry attempts (doubles each retry).
const RETRY_BASE_DELAY_MS: u64 = 500;

/// Backend that borrows a pooled server connection per call.
#[derive(Debug, Clone)]
pub struct ServerBackend {
    pool: PgPool,
}

impl ServerBackend {
    /// Creates a backend from an existing connection pool.
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connects to the server, retrying transient failures with backoff.
    pub async fn connect(settings: &ServerSettings) -> Result<Self> {
        let conn_str = settings.to_connection_string();

        let mut last_error = None;
        let mut delay = Duration::from_millis(RETRY_BASE_DELAY_MS);

        for attempt in 1..=MAX_RETRY_ATTEMPTS {
            debug!("Connection attempt {} of {}", attempt, MAX_RETRY_ATTEMPTS);

            let result = PgPoolOptions::new()
                .max_connections(settings.max_connections)
                .acquire_timeout(Duration::from_secs(settings.acquire_timeout_secs))
                .connect(&conn_str)
                .await;

            match result {
                Ok(pool) => {
                    info!("Connected to server at {}", settings.display_string());
                    return Ok(Self { pool });
                }
                Err(e) => {
                    let is_transient = is_transient_error(&e);
                    last_error = Some(e);

                    if attempt < MAX_RETRY_ATTEMPTS && is_transient {
                        warn!(
                            "Connection attempt {} failed (transient error), retrying in {:?}",
                            attempt, delay
                        );
                        tokio::time::sleep(delay).await;
                        delay *= 2;
                    } else {
                        break;
                    }
                }
            }
        }

        Err(match last_error {
            Some(e) => map_connection_error(e, settings),
            None => ExecError::connection("No connection attempt was made"),
        })
    }

    /// Verifies the server answers a trivial query.
    pub async fn test_connection(&self) -> Result<()> {
        sqlx::raw_sql("SELECT 'test' AS test_value")
            .fetch_one(&self.pool)
            .await
            .map_err(map_query_error)?;
        Ok(())
    }

    /// Closes the pool. In-flight calls finish first.
    pub async fn close(&self) {
        self.pool.close().await;
    }

    async fn run_statement(&self, sql: &str) -> Result<RawOutput> {
        let done = sqlx::raw_sql(sql)
            .execute(&self.pool)
            .await
            .map_err(map_query_error)?;
        let rows_affected = done.rows_affected();
        debug!("Statement affected {} rows", rows_affected);

        Ok(RawOutput {
            kind: RequestKind::Statement,
            stdout: String::new(),
            stderr: format!("{rows_affected} rows affected"),
            exit: ExitIndicator::Success,
            rows_affected: Some(rows_affected),
        })
    }

    async fn run_query(&self, sql: &str) -> Result<RawOutput> {
        let rows = sqlx::raw_sql(sql)
            .fetch_all(&self.pool)
            .await
            .map_err(map_query_error)?;
        debug!("Query returned {} rows", rows.len());

        let rows: Vec<JsonValue> = rows
            .iter()
            .map(|row| JsonValue::Object(convert_row(row)))
            .collect();
        let stdout = serde_json::to_string(&rows)
            .map_err(|e| ExecError::internal(format!("Failed to encode rows: {e}")))?;

        Ok(RawOutput::success(RequestKind::Query, stdout, ""))
    }
}

#[async_trait]
impl QueryBackend for ServerBackend {
    async fn run(&self, request: &QueryRequest, config: &ExecutionConfig) -> Result<RawOutput> {
        let call = async {
            match request.kind {
                RequestKind::Statement => self.run_statement(&request.text).await,
                RequestKind::Query => self.run_query(&request.text).await,
            }
        };

        tokio::time::timeout(config.timeout, call)
            .await
            .map_err(|_| {
                ExecError::timeout(
                    format!(
                        "Query timed out after {:.3} seconds",
                        config.timeout.as_secs_f64()
                    ),
                    "",
                )
            })?
    }

    fn name(&self) -> &'static str {
        "server"
    }
}

/// Converts a sqlx PgRow to a JSON row, preserving column order.
fn convert_row(row: &PgRow) -> Row {
    row.columns()
        .iter()
        .enumerate()
        .map(|(i, col)| {
            (
                col.name().to_string(),
                convert_value(row, i, col.type_info().name()),
            )
        })
        .collect()
}

/// Converts a single column value from a PgRow to a JSON value.
fn convert_value(row: &PgRow, index: usize, type_name: &str) -> JsonValue {
    match type_name.to_uppercase().as_str() {
        "BOOL" | "BOOLEAN" => row
            .try_get::<Option<bool>, _>(index)
            .ok()
            .flatten()
            .map(JsonValue::Bool)
            .unwrap_or(JsonValue::Null),

        "INT2" | "SMALLINT" => row
            .try_get::<Option<i16>, _>(index)
            .ok()
            .flatten()
            .map(JsonValue::from)
            .unwrap_or(JsonValue::Null),

        "INT4" | "INT" | "INTEGER" => row
            .try_get::<Option<i32>, _>(index)
            .ok()
            .flatten()
            .map(JsonValue::from)
            .unwrap_or(JsonValue::Null),

        "INT8" | "BIGINT" => row
            .try_get::<Option<i64>, _>(index)
            .ok()
            .flatten()
            .map(JsonValue::from)
            .unwrap_or(JsonValue::Null),

        "FLOAT4" | "REAL" => row
            .try_get::<Option<f32>, _>(index)
            .ok()
            .flatten()
            .map(|v| JsonValue::from(v as f64))
            .unwrap_or(JsonValue::Null),

        "FLOAT8" | "DOUBLE PRECISION" => row
            .try_get::<Option<f64>, _>(index)
            .ok()
            .flatten()
            .map(JsonValue::from)
            .unwrap_or(JsonValue::Null),

        "JSON" | "JSONB" => row
            .try_get::<Option<JsonValue>, _>(index)
            .ok()
            .flatten()
            .unwrap_or(JsonValue::Null),

        // Everything else, including the engine's text columns.
        _ => row
            .try_get::<Option<String>, _>(index)
            .ok()
            .flatten()
            .map(JsonValue::String)
            .unwrap_or(JsonValue::Null),
    }
}

/// Determines if an error is transient and worth retrying.
fn is_transient_error(error: &sqlx::Error) -> bool {
    let error_str = error.to_string().to_lowercase();

    if error_str.contains("password authentication failed")
        || error_str.contains("authentication failed")
        || error_str.contains("does not exist")
    {
        return false;
    }

    error_str.contains("connection refused")
        || error_str.contains("timed out")
        || error_str.contains("timeout")
        || error_str.contains("temporarily unavailable")
        || error_str.contains("connection reset")
        || error_str.contains("broken pipe")
}

/// Maps sqlx connection errors to user-facing messages.
fn map_connection_error(error: sqlx::Error, settings: &ServerSettings) -> ExecError {
    let host = &settings.host;
    let port = settings.port;
    let error_str = error.to_string().to_lowercase();

    if error_str.contains("connection refused") || error_str.contains("could not connect") {
        ExecError::connection(format!(
            "Cannot connect to {host}:{port}. Check that the StackQL server is running."
        ))
    } else if error_str.contains("authentication failed") {
        ExecError::connection(format!(
            "Authentication failed for user '{}'. Check your credentials.",
            settings.user
        ))
    } else if error_str.contains("timed out") || error_str.contains("timeout") {
        ExecError::connection(format!(
            "Connection to {host}:{port} timed out. The server may be overloaded or unreachable."
        ))
    } else {
        ExecError::connection(error.to_string())
    }
}

/// Maps errors raised while running a statement or query.
///
/// Faults reported by the server are protocol errors; failures to obtain or
/// keep a connection are connection errors.
fn map_query_error(error: sqlx::Error) -> ExecError {
    match error {
        sqlx::Error::Database(db_error) => ExecError::protocol(db_error.message().to_string()),
        sqlx::Error::PoolTimedOut => {
            ExecError::connection("Timed out waiting for a pooled server connection")
        }
        sqlx::Error::PoolClosed => ExecError::connection("Server connection pool is closed"),
        sqlx::Error::Io(e) => ExecError::connection(format!("Server connection failed: {e}")),
        sqlx::Error::Tls(e) => ExecError::connection(format!("Server TLS failure: {e}")),
        other => ExecError::protocol(other.to_string()),
    }
}
