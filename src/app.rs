//! Command handlers behind the sqlhub subcommands.

use crate::cli::RunArgs;
use crate::config::{Config, DbConfigSet};
use crate::db::{adapter_for, BackendAdapter, MockAdapter};
use crate::error::{HubError, Result};
use crate::export::{create_zip_from_folder, XlsxExporter};
use crate::query::{
    split_statements, HeuristicSplitter, QueryOrchestrator, RunReport, RunRequest, Statement,
};
use crate::session::remove_folder;
use chrono::Utc;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info};

/// What a `run` invocation resolved to.
#[derive(Debug)]
struct RunPlan {
    config_set: DbConfigSet,
    statements: Vec<Statement>,
    export: bool,
}

/// Executes a run and, when exporting, zips the session folder.
pub async fn run(config: &Config, args: &RunArgs) -> Result<RunReport> {
    let mut plan = plan(config, args).await?;
    plan.config_set.apply_env_defaults();
    plan.config_set.validate()?;

    let engine = plan.config_set.engine;
    for connection in &plan.config_set.configs {
        info!("Target: {}", connection.display_string(engine));
    }

    let adapter: Arc<dyn BackendAdapter> = if args.mock_db {
        Arc::new(MockAdapter::new(engine))
    } else {
        adapter_for(engine)
    };
    let orchestrator = QueryOrchestrator::new(
        adapter,
        Arc::new(XlsxExporter::new()),
        config.storage.executions_dir(),
    );

    let run = orchestrator
        .run(&plan.config_set, &plan.statements, plan.export)
        .await?;

    let archive_path = if plan.export {
        Some(archive_session(&run.session_folder, args.keep_folder).await?)
    } else {
        None
    };

    Ok(RunReport { run, archive_path })
}

async fn plan(config: &Config, args: &RunArgs) -> Result<RunPlan> {
    if let Some(path) = &args.request {
        let request = RunRequest::from_json(&read_text(path).await?)?;
        let statements = request.statements(&HeuristicSplitter::new())?;
        return Ok(RunPlan {
            export: request.should_export || args.export,
            config_set: request.db_config,
            statements,
        });
    }

    let statements = if let Some(path) = &args.file {
        split_statements(&read_text(path).await?)
    } else if !args.queries.is_empty() {
        args.queries.iter().map(Statement::new).collect()
    } else {
        return Err(HubError::config(
            "Queries must be provided: use --file, --query or --request",
        ));
    };

    let config_set = match args.connection_set()? {
        Some(set) => set,
        None => config.database.clone().ok_or_else(|| {
            HubError::config(
                "Invalid database configuration: pass --connection or add [database] to the config file",
            )
        })?,
    };

    Ok(RunPlan {
        config_set,
        statements,
        export: args.export,
    })
}

/// Zips the session folder and removes it unless `keep_folder` is set.
async fn archive_session(folder: &Path, keep_folder: bool) -> Result<PathBuf> {
    let archive = create_zip_from_folder(folder).await.inspect_err(|e| {
        error!(folder = %folder.display(), error = %e, "failed to archive session folder");
    })?;

    if !keep_folder {
        remove_folder(folder).await?;
    }
    Ok(archive)
}

/// Reads and splits a SQL file.
pub async fn split_file(path: &Path) -> Result<Vec<Statement>> {
    Ok(split_statements(&read_text(path).await?))
}

/// Saves SQL text as `queries_<unix millis>.sql` under `queries_dir`.
pub async fn save_query(queries_dir: &Path, content: &str) -> Result<PathBuf> {
    if content.trim().is_empty() {
        return Err(HubError::config("Query content must be provided"));
    }

    tokio::fs::create_dir_all(queries_dir).await.map_err(|e| {
        HubError::session(format!(
            "Failed to create {}: {e}",
            queries_dir.display()
        ))
    })?;

    let path = queries_dir.join(format!("queries_{}.sql", Utc::now().timestamp_millis()));
    tokio::fs::write(&path, content)
        .await
        .map_err(|e| HubError::session(format!("Failed to save query: {e}")))?;

    info!(path = %path.display(), "saved query file");
    Ok(path)
}

/// Writes the report as pretty JSON to `output`, or to stdout.
pub async fn write_report(report: &RunReport, output: Option<&Path>) -> Result<()> {
    let json = serde_json::to_string_pretty(report)
        .map_err(|e| HubError::internal(format!("Failed to encode report: {e}")))?;

    match output {
        Some(path) => tokio::fs::write(path, json + "\n").await.map_err(|e| {
            HubError::session(format!("Failed to write {}: {e}", path.display()))
        }),
        None => {
            println!("{json}");
            Ok(())
        }
    }
}

async fn read_text(path: &Path) -> Result<String> {
    tokio::fs::read_to_string(path)
        .await
        .map_err(|e| HubError::config(format!("Failed to read {}: {e}", path.display())))
}
