//! Statement splitting and multi-backend execution.

pub mod orchestrator;
pub mod request;
pub mod splitter;
pub mod types;

pub use orchestrator::QueryOrchestrator;
pub use request::RunRequest;
pub use splitter::{split_statements, HeuristicSplitter, StatementSplitter};
pub use types::{
    build_query_mapping, statement_label, BackendResult, ExecutionResult, QueryMapping, RowCounts,
    RunReport, RunResult, Statement,
};
