//! Orchestration through the real database adapters.
//!
//! Unreachable-server tests always run. Tests against a live PostgreSQL
//! server are skipped unless DATABASE_URL is set.

use sql_query_hub::config::{ConnectionConfig, DbConfigSet};
use sql_query_hub::db::{EngineType, Value};
use sql_query_hub::query::{split_statements, QueryOrchestrator};
use tempfile::TempDir;

fn refused(name: &str) -> ConnectionConfig {
    ConnectionConfig {
        name: name.to_string(),
        host: Some("127.0.0.1".to_string()),
        port: Some(1),
        user: Some("test".to_string()),
        password: Some("test".to_string()),
        database: Some("test".to_string()),
    }
}

#[tokio::test]
async fn test_unreachable_servers_are_recorded_per_engine() {
    for engine in [EngineType::MySql, EngineType::Postgres, EngineType::MsSql] {
        let root = TempDir::new().unwrap();
        let orchestrator = QueryOrchestrator::for_engine(engine, root.path());
        let set = DbConfigSet::new(engine, vec![refused("first"), refused("second")]);

        let result = orchestrator
            .run(&set, &split_statements("SELECT 1;"), false)
            .await
            .unwrap();

        assert!(result.results_by_backend["first"].is_failed(), "{engine}");
        assert!(result.results_by_backend["second"].is_failed(), "{engine}");
        assert!(result.counts_by_statement.is_empty());

        let logs = std::fs::read_to_string(result.session_folder.join("logs.txt")).unwrap();
        assert!(logs.contains("Error processing database first"));
        assert!(logs.contains("Error processing database second"));
    }
}

#[tokio::test]
async fn test_postgres_batch_live() {
    let Some(url) = std::env::var("DATABASE_URL").ok() else {
        eprintln!("Skipping test: DATABASE_URL not set");
        return;
    };
    let (engine, config) = ConnectionConfig::from_url("live", &url).unwrap();
    let root = TempDir::new().unwrap();

    let sql = "
        CREATE TEMP TABLE hub_items (id INT, label TEXT);
        INSERT INTO hub_items VALUES (1, 'a'), (2, 'b');
        SELECT id, label FROM hub_items ORDER BY id;
        SELECT * FROM hub_missing_table;
    ";
    let result = QueryOrchestrator::for_engine(engine, root.path())
        .run(
            &DbConfigSet::new(engine, vec![config]),
            &split_statements(sql),
            true,
        )
        .await
        .unwrap();

    let live = result.results_by_backend["live"].statements().unwrap();
    assert_eq!(live.len(), 4);
    assert!(!live[0].is_failure());
    assert_eq!(live[2].row_count(), 2);
    assert_eq!(live[2].rows()[1]["label"], Value::String("b".to_string()));
    assert!(live[2].export_path().is_some());
    assert!(live[3].is_failure());
    assert_eq!(result.counts_by_statement["query_4"]["live"], 0);
}
