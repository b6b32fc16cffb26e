//! Integration tests for sql-query-hub.

pub mod connection_test;
pub mod orchestrator_test;
pub mod splitter_test;
