//! SQL Query Hub - runs SQL batches against a set of databases.
//!
//! This library exposes the core modules for use in integration tests.

pub mod app;
pub mod cli;
pub mod config;
pub mod db;
pub mod error;
pub mod export;
pub mod logging;
pub mod query;
pub mod session;
