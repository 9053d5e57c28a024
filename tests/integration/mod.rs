//! Integration tests over a real SQLite store
//!
//! Each test builds its own engine in a temporary directory.

pub mod gateway_test;
pub mod http_remote_test;
pub mod sync_processor_test;
