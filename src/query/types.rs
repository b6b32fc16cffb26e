//! Result types produced by an orchestration run.

use crate::db::Row;
use indexmap::IndexMap;
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;

/// One self-contained executable SQL statement.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct Statement(String);

impl Statement {
    pub fn new(sql: impl Into<String>) -> Self {
        Self(sql.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Statement {
    fn from(sql: &str) -> Self {
        Self::new(sql)
    }
}

impl From<String> for Statement {
    fn from(sql: String) -> Self {
        Self::new(sql)
    }
}

/// Statement label (`query_1`, `query_2`, ...) to statement text.
pub type QueryMapping = IndexMap<String, String>;

/// Statement label to backend name to row count.
pub type RowCounts = IndexMap<String, IndexMap<String, usize>>;

/// Returns the label for the statement at `index` (zero based).
pub fn statement_label(index: usize) -> String {
    format!("query_{}", index + 1)
}

/// Builds the label mapping for statements in input order.
pub fn build_query_mapping(statements: &[Statement]) -> QueryMapping {
    statements
        .iter()
        .enumerate()
        .map(|(index, statement)| (statement_label(index), statement.as_str().to_string()))
        .collect()
}

/// Outcome of one statement on one backend.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(untagged)]
pub enum ExecutionResult {
    #[serde(rename_all = "camelCase")]
    Success {
        label: String,
        statement: String,
        rows: Vec<Row>,
        row_count: usize,
        #[serde(skip_serializing_if = "Option::is_none")]
        export_path: Option<PathBuf>,
    },
    #[serde(rename_all = "camelCase")]
    Failure {
        label: String,
        statement: String,
        error: String,
        row_count: usize,
    },
}

impl ExecutionResult {
    /// A successful execution; the row count is taken from `rows`.
    pub fn success(label: impl Into<String>, statement: &Statement, rows: Vec<Row>) -> Self {
        Self::Success {
            label: label.into(),
            statement: statement.as_str().to_string(),
            row_count: rows.len(),
            rows,
            export_path: None,
        }
    }

    /// A failed execution. Never carries rows; the row count is always zero.
    pub fn failure(
        label: impl Into<String>,
        statement: &Statement,
        error: impl Into<String>,
    ) -> Self {
        Self::Failure {
            label: label.into(),
            statement: statement.as_str().to_string(),
            error: error.into(),
            row_count: 0,
        }
    }

    /// Attaches an exported spreadsheet path. Ignored for failures.
    pub fn with_export_path(mut self, path: PathBuf) -> Self {
        if let Self::Success { export_path, .. } = &mut self {
            *export_path = Some(path);
        }
        self
    }

    pub fn label(&self) -> &str {
        match self {
            Self::Success { label, .. } | Self::Failure { label, .. } => label,
        }
    }

    pub fn statement(&self) -> &str {
        match self {
            Self::Success { statement, .. } | Self::Failure { statement, .. } => statement,
        }
    }

    pub fn row_count(&self) -> usize {
        match self {
            Self::Success { row_count, .. } | Self::Failure { row_count, .. } => *row_count,
        }
    }

    pub fn rows(&self) -> &[Row] {
        match self {
            Self::Success { rows, .. } => rows,
            Self::Failure { .. } => &[],
        }
    }

    pub fn export_path(&self) -> Option<&PathBuf> {
        match self {
            Self::Success { export_path, .. } => export_path.as_ref(),
            Self::Failure { .. } => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            Self::Success { .. } => None,
            Self::Failure { error, .. } => Some(error),
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failure { .. })
    }
}

/// Everything recorded for one backend.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(untagged)]
pub enum BackendResult {
    /// The backend was reached; one entry per statement, in input order.
    Statements(Vec<ExecutionResult>),
    /// The backend could not be reached; no statement ran.
    #[serde(rename_all = "camelCase")]
    Failed { error: String, row_count: usize },
}

impl BackendResult {
    pub fn failed(error: impl Into<String>) -> Self {
        Self::Failed {
            error: error.into(),
            row_count: 0,
        }
    }

    /// Per-statement results, or `None` for a backend-level failure.
    pub fn statements(&self) -> Option<&[ExecutionResult]> {
        match self {
            Self::Statements(results) => Some(results),
            Self::Failed { .. } => None,
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }
}

/// The complete report of one orchestration run.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RunResult {
    pub results_by_backend: IndexMap<String, BackendResult>,
    pub counts_by_statement: RowCounts,
    pub query_mapping: QueryMapping,
    pub session_folder: PathBuf,
}

/// A run result plus the archive the caller built from its session folder.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunReport {
    #[serde(flatten)]
    pub run: RunResult,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub archive_path: Option<PathBuf>,
}
