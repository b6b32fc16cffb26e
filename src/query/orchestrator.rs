//! Runs a statement list against every backend of a configuration set.
//!
//! Backends are processed one at a time in configuration order and each gets
//! its own connection, which is always released before the next backend is
//! contacted. A failure on one statement or one backend never stops the rest
//! of the run; it is recorded in the result instead.

use super::types::{
    build_query_mapping, statement_label, BackendResult, ExecutionResult, QueryMapping, RowCounts,
    RunResult, Statement,
};
use crate::config::{ConnectionConfig, DbConfigSet};
use crate::db::{adapter_for, BackendAdapter, BackendConnection, EngineType, Row};
use crate::error::{HubError, Result};
use crate::export::{ResultExporter, XlsxExporter};
use crate::session::ExecutionSession;
use indexmap::IndexMap;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Drives one engine's adapter over a set of backends.
pub struct QueryOrchestrator {
    adapter: Arc<dyn BackendAdapter>,
    exporter: Arc<dyn ResultExporter>,
    session_root: PathBuf,
}

impl QueryOrchestrator {
    /// Creates an orchestrator with the built-in adapter for `engine` and the
    /// spreadsheet exporter.
    pub fn for_engine(engine: EngineType, session_root: impl Into<PathBuf>) -> Self {
        Self::new(adapter_for(engine), Arc::new(XlsxExporter::new()), session_root)
    }

    pub fn new(
        adapter: Arc<dyn BackendAdapter>,
        exporter: Arc<dyn ResultExporter>,
        session_root: impl Into<PathBuf>,
    ) -> Self {
        Self {
            adapter,
            exporter,
            session_root: session_root.into(),
        }
    }

    /// Executes `statements` on every backend in `config_set`.
    ///
    /// Only an invalid configuration set is an error. Unreachable backends and
    /// failing statements are reported inside the returned [`RunResult`].
    pub async fn run(
        &self,
        config_set: &DbConfigSet,
        statements: &[Statement],
        export_requested: bool,
    ) -> Result<RunResult> {
        config_set.validate()?;
        if config_set.engine != self.adapter.engine() {
            return Err(HubError::config(format!(
                "Configuration is for {} but the adapter speaks {}",
                config_set.engine,
                self.adapter.engine()
            )));
        }

        info!(
            engine = %config_set.engine,
            backends = config_set.configs.len(),
            statements = statements.len(),
            export = export_requested,
            "starting run"
        );

        let mut run = RunState::new(ExecutionSession::new(&self.session_root), statements);
        for config in &config_set.configs {
            self.run_backend(&mut run, config, statements, export_requested)
                .await;
        }

        Ok(run.finish().await)
    }

    async fn run_backend(
        &self,
        run: &mut RunState,
        config: &ConnectionConfig,
        statements: &[Statement],
        export_requested: bool,
    ) {
        let name = &config.name;

        let mut conn = match self.adapter.connect(config).await {
            Ok(conn) => conn,
            Err(e) => {
                warn!(backend = %name, error = %e, "backend unreachable");
                run.log(format!("Error processing database {name}: {}", e.message()));
                run.results
                    .insert(name.clone(), BackendResult::failed(e.message()));
                return;
            }
        };
        info!(backend = %name, "connected");
        run.log(format!("Connected to database: {name}"));

        let mut results = Vec::with_capacity(statements.len());
        for (index, statement) in statements.iter().enumerate() {
            let result = self
                .run_statement(run, conn.as_mut(), name, index, statement, export_requested)
                .await;
            results.push(result);
        }
        run.results
            .insert(name.clone(), BackendResult::Statements(results));

        match conn.disconnect().await {
            Ok(()) => run.log(format!("Disconnected from database: {name}")),
            Err(e) => {
                warn!(backend = %name, error = %e, "disconnect failed");
                run.log(format!(
                    "Error disconnecting from database {name}: {}",
                    e.message()
                ));
            }
        }
    }

    async fn run_statement(
        &self,
        run: &mut RunState,
        conn: &mut dyn BackendConnection,
        backend: &str,
        index: usize,
        statement: &Statement,
        export_requested: bool,
    ) -> ExecutionResult {
        let label = statement_label(index);

        let rows = match conn.execute_statement(statement.as_str()).await {
            Ok(rows) => rows,
            Err(e) => {
                warn!(backend, statement = %label, error = %e, "statement failed");
                run.log(format!(
                    "Error executing {label} on {backend}: {}",
                    e.message()
                ));
                run.record_count(&label, backend, 0);
                return ExecutionResult::failure(label, statement, e.message());
            }
        };

        run.record_count(&label, backend, rows.len());

        let mut export_path = None;
        if export_requested && !rows.is_empty() {
            match self.export(run, &rows, index, backend).await {
                Ok(path) => {
                    run.log(format!(
                        "Exported results for \"{label}\" from {backend} to {}",
                        path.display()
                    ));
                    export_path = Some(path);
                }
                Err(e) => {
                    warn!(backend, statement = %label, error = %e, "export failed");
                    run.log(format!(
                        "Error exporting {label} from {backend}: {}",
                        e.message()
                    ));
                }
            }
        }

        info!(backend, statement = %label, rows = rows.len(), "statement executed");
        run.log(format!("Successfully executed {label} on {backend}"));

        let result = ExecutionResult::success(label, statement, rows);
        match export_path {
            Some(path) => result.with_export_path(path),
            None => result,
        }
    }

    async fn export(
        &self,
        run: &mut RunState,
        rows: &[Row],
        index: usize,
        backend: &str,
    ) -> Result<PathBuf> {
        let folder = run.session.create_folder().await?;
        self.exporter.export(rows, index, backend, &folder).await
    }
}

/// Everything accumulated while a run is in progress.
struct RunState {
    session: ExecutionSession,
    results: IndexMap<String, BackendResult>,
    counts: RowCounts,
    mapping: QueryMapping,
}

impl RunState {
    fn new(session: ExecutionSession, statements: &[Statement]) -> Self {
        Self {
            session,
            results: IndexMap::new(),
            counts: RowCounts::new(),
            mapping: build_query_mapping(statements),
        }
    }

    fn log(&mut self, line: String) {
        self.session.append_log(line);
    }

    fn record_count(&mut self, label: &str, backend: &str, rows: usize) {
        self.counts
            .entry(label.to_string())
            .or_default()
            .insert(backend.to_string(), rows);
    }

    /// Persists the log and count summary. Write failures are logged and do
    /// not discard the in-memory result.
    async fn finish(mut self) -> RunResult {
        if let Err(e) = self.session.flush_logs().await {
            error!(error = %e, "failed to write session log");
        }
        if let Err(e) = self
            .session
            .write_count_summary(&self.counts, &self.mapping)
            .await
        {
            error!(error = %e, "failed to write count summary");
        }

        let session_folder = self.session.folder_path();
        info!(folder = %session_folder.display(), "run finished");

        RunResult {
            results_by_backend: self.results,
            counts_by_statement: self.counts,
            query_mapping: self.mapping,
            session_folder,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{row_from_pairs, MockAdapter, MockBackend, MockEvent, Value};
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use std::path::Path;
    use tempfile::TempDir;

    fn config_set(names: &[&str]) -> DbConfigSet {
        DbConfigSet::new(
            EngineType::MySql,
            names.iter().map(|n| ConnectionConfig::named(*n)).collect(),
        )
    }

    fn statements(sql: &[&str]) -> Vec<Statement> {
        sql.iter().map(|s| Statement::new(*s)).collect()
    }

    fn orchestrator(adapter: &MockAdapter, root: &Path) -> QueryOrchestrator {
        QueryOrchestrator::new(
            Arc::new(adapter.clone()),
            Arc::new(XlsxExporter::new()),
            root,
        )
    }

    /// Exporter that always fails, to check export errors stay local.
    struct FailingExporter;

    #[async_trait]
    impl ResultExporter for FailingExporter {
        async fn export(&self, _: &[Row], _: usize, _: &str, _: &Path) -> Result<PathBuf> {
            Err(HubError::export("disk full"))
        }
    }

    #[tokio::test]
    async fn test_run_two_backends_in_order() {
        let root = TempDir::new().unwrap();
        let adapter = MockAdapter::new(EngineType::MySql);
        let stmts = statements(&["SELECT 1;", "UPDATE t SET a = 1;"]);

        let result = orchestrator(&adapter, root.path())
            .run(&config_set(&["a", "b"]), &stmts, false)
            .await
            .unwrap();

        let backends: Vec<&String> = result.results_by_backend.keys().collect();
        assert_eq!(backends, vec!["a", "b"]);

        let a = result.results_by_backend["a"].statements().unwrap();
        assert_eq!(a.len(), 2);
        assert_eq!(a[0].label(), "query_1");
        assert_eq!(a[0].row_count(), 1);
        assert_eq!(a[1].label(), "query_2");
        assert_eq!(a[1].row_count(), 0);

        assert_eq!(
            adapter.events(),
            vec![
                MockEvent::Connect("a".to_string()),
                MockEvent::Execute { backend: "a".to_string(), sql: "SELECT 1;".to_string() },
                MockEvent::Execute { backend: "a".to_string(), sql: "UPDATE t SET a = 1;".to_string() },
                MockEvent::Disconnect("a".to_string()),
                MockEvent::Connect("b".to_string()),
                MockEvent::Execute { backend: "b".to_string(), sql: "SELECT 1;".to_string() },
                MockEvent::Execute { backend: "b".to_string(), sql: "UPDATE t SET a = 1;".to_string() },
                MockEvent::Disconnect("b".to_string()),
            ]
        );
        assert_eq!(adapter.max_open_connections(), 1);
    }

    #[tokio::test]
    async fn test_statement_failure_does_not_stop_backend() {
        let root = TempDir::new().unwrap();
        let adapter = MockAdapter::new(EngineType::MySql).with_backend(
            "a",
            MockBackend::new().with_error("SELECT * FROM missing", "Table 'missing' doesn't exist"),
        );
        let stmts = statements(&["SELECT * FROM missing;", "SELECT 2;"]);

        let result = orchestrator(&adapter, root.path())
            .run(&config_set(&["a"]), &stmts, false)
            .await
            .unwrap();

        let a = result.results_by_backend["a"].statements().unwrap();
        assert!(a[0].is_failure());
        assert_eq!(a[0].error(), Some("Table 'missing' doesn't exist"));
        assert!(a[0].rows().is_empty());
        assert!(!a[1].is_failure());

        assert_eq!(result.counts_by_statement["query_1"]["a"], 0);
        assert_eq!(result.counts_by_statement["query_2"]["a"], 1);
    }

    #[tokio::test]
    async fn test_unreachable_backend_is_isolated() {
        let root = TempDir::new().unwrap();
        let adapter = MockAdapter::new(EngineType::MySql)
            .with_backend("down", MockBackend::unreachable());
        let stmts = statements(&["SELECT 1;"]);

        let result = orchestrator(&adapter, root.path())
            .run(&config_set(&["down", "up"]), &stmts, false)
            .await
            .unwrap();

        assert!(result.results_by_backend["down"].is_failed());
        assert!(!result.results_by_backend["up"].is_failed());
        assert!(!result.counts_by_statement["query_1"].contains_key("down"));
        assert_eq!(result.counts_by_statement["query_1"]["up"], 1);

        let logs = std::fs::read_to_string(result.session_folder.join("logs.txt")).unwrap();
        assert!(logs.contains("Error processing database down: connect ECONNREFUSED"));
        assert!(logs.contains("Connected to database: up"));
    }

    #[tokio::test]
    async fn test_export_skips_empty_results() {
        let root = TempDir::new().unwrap();
        let adapter = MockAdapter::new(EngineType::MySql).with_backend(
            "a",
            MockBackend::new()
                .with_rows("SELECT id FROM users", vec![row_from_pairs([("id", 1i64)])])
                .with_rows("SELECT id FROM empty", Vec::new()),
        );
        let stmts = statements(&["SELECT id FROM users;", "SELECT id FROM empty;"]);

        let result = orchestrator(&adapter, root.path())
            .run(&config_set(&["a"]), &stmts, true)
            .await
            .unwrap();

        let a = result.results_by_backend["a"].statements().unwrap();
        let exported = a[0].export_path().unwrap();
        assert_eq!(
            exported,
            &result.session_folder.join("exports").join("a_query_1.xlsx")
        );
        assert!(exported.is_file());
        assert!(a[1].export_path().is_none());
        assert!(!result
            .session_folder
            .join("exports")
            .join("a_query_2.xlsx")
            .exists());
    }

    #[tokio::test]
    async fn test_export_failure_keeps_statement_success() {
        let root = TempDir::new().unwrap();
        let adapter = MockAdapter::new(EngineType::MySql);
        let orchestrator = QueryOrchestrator::new(
            Arc::new(adapter.clone()),
            Arc::new(FailingExporter),
            root.path(),
        );

        let result = orchestrator
            .run(&config_set(&["a"]), &statements(&["SELECT 1;"]), true)
            .await
            .unwrap();

        let a = result.results_by_backend["a"].statements().unwrap();
        assert!(!a[0].is_failure());
        assert!(a[0].export_path().is_none());
        let logs = std::fs::read_to_string(result.session_folder.join("logs.txt")).unwrap();
        assert!(logs.contains("Error exporting query_1 from a: disk full"));
    }

    #[tokio::test]
    async fn test_disconnect_failure_is_logged_only() {
        let root = TempDir::new().unwrap();
        let adapter = MockAdapter::new(EngineType::MySql)
            .with_backend("a", MockBackend::new().with_failing_disconnect());

        let result = orchestrator(&adapter, root.path())
            .run(&config_set(&["a", "b"]), &statements(&["SELECT 1;"]), false)
            .await
            .unwrap();

        assert!(!result.results_by_backend["a"].is_failed());
        assert!(!result.results_by_backend["b"].is_failed());
        let logs = std::fs::read_to_string(result.session_folder.join("logs.txt")).unwrap();
        assert!(logs.contains("Error disconnecting from database a"));
        assert!(logs.contains("Disconnected from database: b"));
    }

    #[tokio::test]
    async fn test_count_summary_written() {
        let root = TempDir::new().unwrap();
        let adapter = MockAdapter::new(EngineType::MySql);

        let result = orchestrator(&adapter, root.path())
            .run(&config_set(&["a"]), &statements(&["SELECT 1;"]), false)
            .await
            .unwrap();

        let summary = std::fs::read_to_string(result.session_folder.join("COUNT.txt")).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&summary).unwrap();
        assert_eq!(parsed["counts"]["query_1"]["a"], 1);
        assert_eq!(parsed["queryMapping"]["query_1"], "SELECT 1;");
    }

    #[tokio::test]
    async fn test_rows_are_returned_with_results() {
        let root = TempDir::new().unwrap();
        let adapter = MockAdapter::new(EngineType::MySql).with_backend(
            "a",
            MockBackend::new().with_rows(
                "SELECT name FROM users",
                vec![row_from_pairs([("name", "Ada")]), row_from_pairs([("name", "Bob")])],
            ),
        );

        let result = orchestrator(&adapter, root.path())
            .run(&config_set(&["a"]), &statements(&["SELECT name FROM users;"]), false)
            .await
            .unwrap();

        let a = result.results_by_backend["a"].statements().unwrap();
        assert_eq!(a[0].row_count(), 2);
        assert_eq!(a[0].rows()[1]["name"], Value::String("Bob".to_string()));
    }

    #[tokio::test]
    async fn test_invalid_config_is_rejected_before_connecting() {
        let root = TempDir::new().unwrap();
        let adapter = MockAdapter::new(EngineType::MySql);

        let err = orchestrator(&adapter, root.path())
            .run(&config_set(&[]), &statements(&["SELECT 1;"]), false)
            .await
            .unwrap_err();
        assert!(matches!(err, HubError::Config(_)));

        let mismatched = DbConfigSet::new(EngineType::Postgres, vec![ConnectionConfig::named("a")]);
        let err = orchestrator(&adapter, root.path())
            .run(&mismatched, &statements(&["SELECT 1;"]), false)
            .await
            .unwrap_err();
        assert!(matches!(err, HubError::Config(_)));

        assert!(adapter.events().is_empty());
    }

    #[tokio::test]
    async fn test_empty_statement_list_still_opens_sessions() {
        let root = TempDir::new().unwrap();
        let adapter = MockAdapter::new(EngineType::MySql);

        let result = orchestrator(&adapter, root.path())
            .run(&config_set(&["a"]), &[], false)
            .await
            .unwrap();

        assert_eq!(result.results_by_backend["a"].statements().unwrap().len(), 0);
        assert!(result.counts_by_statement.is_empty());
        assert_eq!(
            adapter.events(),
            vec![
                MockEvent::Connect("a".to_string()),
                MockEvent::Disconnect("a".to_string()),
            ]
        );
    }
}
