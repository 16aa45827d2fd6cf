//! stackql-exec - run StackQL queries through a local engine binary or a
//! StackQL server.
//!
//! This library exposes the execution core: configuration resolution, the
//! two backends, embedded error detection, output normalization and the
//! bounded batch executor.

pub mod backend;
pub mod config;
pub mod detector;
pub mod error;
pub mod logging;
pub mod output;
pub mod query;
