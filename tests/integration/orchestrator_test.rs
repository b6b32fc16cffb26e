//! End-to-end orchestration against the mock adapter.

use pretty_assertions::assert_eq;
use sql_query_hub::config::{ConnectionConfig, DbConfigSet};
use sql_query_hub::db::{row_from_pairs, EngineType, MockAdapter, MockBackend, Value};
use sql_query_hub::export::{create_zip_from_folder, XlsxExporter};
use sql_query_hub::query::{split_statements, QueryOrchestrator};
use std::fs::File;
use std::sync::Arc;
use tempfile::TempDir;
use zip::ZipArchive;

fn fleet() -> DbConfigSet {
    DbConfigSet::new(
        EngineType::MySql,
        vec![
            ConnectionConfig::named("eu"),
            ConnectionConfig::named("us"),
            ConnectionConfig::named("apac"),
        ],
    )
}

fn adapter() -> MockAdapter {
    MockAdapter::new(EngineType::MySql)
        .with_backend(
            "eu",
            MockBackend::new().with_rows(
                "SELECT id, email FROM users",
                vec![
                    row_from_pairs([("id", Value::Int(1)), ("email", Value::from("a@eu.example"))]),
                    row_from_pairs([("id", Value::Int(2)), ("email", Value::Null)]),
                ],
            ),
        )
        .with_backend(
            "us",
            MockBackend::new().with_error("SELECT id, email FROM users", "Unknown column 'email'"),
        )
        .with_backend("apac", MockBackend::unreachable())
}

#[tokio::test]
async fn test_partial_failures_are_reported_per_backend() {
    let root = TempDir::new().unwrap();
    let adapter = adapter();
    let orchestrator = QueryOrchestrator::new(
        Arc::new(adapter.clone()),
        Arc::new(XlsxExporter::new()),
        root.path(),
    );
    let statements = split_statements("SELECT id, email FROM users;\nUPDATE users SET seen = 1;");

    let result = orchestrator.run(&fleet(), &statements, false).await.unwrap();

    let eu = result.results_by_backend["eu"].statements().unwrap();
    assert_eq!(eu[0].row_count(), 2);
    assert_eq!(eu[1].row_count(), 0);

    let us = result.results_by_backend["us"].statements().unwrap();
    assert_eq!(us[0].error(), Some("Unknown column 'email'"));
    assert!(!us[1].is_failure());

    assert!(result.results_by_backend["apac"].is_failed());

    let query_1: Vec<(&str, usize)> = result.counts_by_statement["query_1"]
        .iter()
        .map(|(k, v)| (k.as_str(), *v))
        .collect();
    assert_eq!(query_1, vec![("eu", 2), ("us", 0)]);

    assert_eq!(adapter.max_open_connections(), 1);
}

#[tokio::test]
async fn test_log_lines_follow_execution_order() {
    let root = TempDir::new().unwrap();
    let orchestrator = QueryOrchestrator::new(
        Arc::new(adapter()),
        Arc::new(XlsxExporter::new()),
        root.path(),
    );
    let statements = split_statements("SELECT id, email FROM users;");

    let result = orchestrator.run(&fleet(), &statements, false).await.unwrap();
    let logs = std::fs::read_to_string(result.session_folder.join("logs.txt")).unwrap();
    let lines: Vec<&str> = logs.lines().collect();

    assert_eq!(lines[0], "Connected to database: eu");
    assert_eq!(lines[1], "Successfully executed query_1 on eu");
    assert_eq!(lines[2], "Disconnected from database: eu");
    assert_eq!(lines[3], "Connected to database: us");
    assert_eq!(lines[4], "Error executing query_1 on us: Unknown column 'email'");
    assert_eq!(lines[5], "Disconnected from database: us");
    assert!(lines[6].starts_with("Error processing database apac: "));
    assert_eq!(lines.len(), 7);
}

#[tokio::test]
async fn test_export_run_produces_archive_with_artifacts() {
    let root = TempDir::new().unwrap();
    let orchestrator = QueryOrchestrator::new(
        Arc::new(adapter()),
        Arc::new(XlsxExporter::new()),
        root.path(),
    );
    let statements = split_statements("SELECT id, email FROM users;");

    let result = orchestrator.run(&fleet(), &statements, true).await.unwrap();
    let eu = result.results_by_backend["eu"].statements().unwrap();
    assert!(eu[0].export_path().is_some());

    let archive_path = create_zip_from_folder(&result.session_folder).await.unwrap();
    let mut archive = ZipArchive::new(File::open(&archive_path).unwrap()).unwrap();
    let mut names: Vec<String> = archive.file_names().map(str::to_string).collect();
    names.sort();

    assert_eq!(
        names,
        vec!["COUNT.txt", "exports/", "exports/eu_query_1.xlsx", "logs.txt"]
    );
    assert!(archive.by_name("exports/eu_query_1.xlsx").unwrap().size() > 0);
}

#[tokio::test]
async fn test_repeated_runs_get_separate_folders() {
    let root = TempDir::new().unwrap();
    let orchestrator = QueryOrchestrator::new(
        Arc::new(MockAdapter::new(EngineType::MySql)),
        Arc::new(XlsxExporter::new()),
        root.path(),
    );
    let set = DbConfigSet::new(EngineType::MySql, vec![ConnectionConfig::named("a")]);
    let statements = split_statements("SELECT 1;");

    let first = orchestrator.run(&set, &statements, false).await.unwrap();
    let second = orchestrator.run(&set, &statements, false).await.unwrap();

    assert_ne!(first.session_folder, second.session_folder);
    assert_eq!(first.counts_by_statement, second.counts_by_statement);
    assert_eq!(first.results_by_backend, second.results_by_backend);
    assert!(first.session_folder.join("COUNT.txt").is_file());
    assert!(second.session_folder.join("COUNT.txt").is_file());
}
