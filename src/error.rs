//! Error types for stackql-exec.
//!
//! Defines the main error enum used throughout the crate.

use thiserror::Error;

/// Main error type for query execution.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExecError {
    /// Invalid configuration value, detected before anything is dispatched.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The backend could not be started (binary missing, not executable, etc.)
    #[error("Launch error: {0}")]
    Launch(String),

    /// The backend exceeded its allotted time.
    #[error("Timeout error: {message}")]
    Timeout {
        message: String,
        /// Whatever stdout the child process produced before it was killed.
        partial_stdout: String,
    },

    /// No server connection could be acquired.
    #[error("Connection error: {0}")]
    Connection(String),

    /// The server reported a SQL-level fault.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Internal errors (unexpected states, panicked tasks, etc.)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ExecError {
    /// Creates a configuration error with the given message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Creates a launch error with the given message.
    pub fn launch(msg: impl Into<String>) -> Self {
        Self::Launch(msg.into())
    }

    /// Creates a timeout error carrying the partial stdout captured so far.
    pub fn timeout(msg: impl Into<String>, partial_stdout: impl Into<String>) -> Self {
        Self::Timeout {
            message: msg.into(),
            partial_stdout: partial_stdout.into(),
        }
    }

    /// Creates a connection error with the given message.
    pub fn connection(msg: impl Into<String>) -> Self {
        Self::Connection(msg.into())
    }

    /// Creates a protocol error with the given message.
    pub fn protocol(msg: impl Into<String>) -> Self {
        Self::Protocol(msg.into())
    }

    /// Creates an internal error with the given message.
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Returns the error category as a string for display purposes.
    pub fn category(&self) -> &'static str {
        match self {
            Self::Config(_) => "Configuration Error",
            Self::Launch(_) => "Launch Error",
            Self::Timeout { .. } => "Timeout Error",
            Self::Connection(_) => "Connection Error",
            Self::Protocol(_) => "Protocol Error",
            Self::Internal(_) => "Internal Error",
        }
    }

    /// Returns the machine-readable label used when the error is folded
    /// into an error-variant `ExecutionResult`.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Config(_) => "config_error",
            Self::Launch(_) => "launch_error",
            Self::Timeout { .. } => "timeout",
            Self::Connection(_) => "connection_error",
            Self::Protocol(_) => "protocol_error",
            Self::Internal(_) => "internal_error",
        }
    }

    /// Returns the bare message without the category prefix.
    pub fn message(&self) -> &str {
        match self {
            Self::Config(m)
            | Self::Launch(m)
            | Self::Connection(m)
            | Self::Protocol(m)
            | Self::Internal(m) => m,
            Self::Timeout { message, .. } => message,
        }
    }
}

/// Result type alias using ExecError.
pub type Result<T> = std::result::Result<T, ExecError>;
