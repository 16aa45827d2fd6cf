//! Integration tests for stackql-exec.

pub mod batch_test;
pub mod common;
pub mod local_test;
pub mod server_test;
