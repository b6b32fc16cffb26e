//! Per-run output folder.
//!
//! Each orchestration run owns one folder named after its start time. The
//! folder holds the accumulated log (`logs.txt`), the row-count summary
//! (`COUNT.txt`) and, when exporting, an `exports/` subfolder of spreadsheets.

use crate::error::{HubError, Result};
use crate::query::{QueryMapping, RowCounts};
use chrono::{DateTime, Local};
use serde::Serialize;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::debug;

pub const LOG_FILE: &str = "logs.txt";
pub const COUNT_FILE: &str = "COUNT.txt";
pub const EXPORTS_DIR: &str = "exports";

/// Gives up on suffixing after this many same-second collisions.
const MAX_FOLDER_ATTEMPTS: usize = 1000;

/// Output folder and log buffer for a single run.
#[derive(Debug)]
pub struct ExecutionSession {
    root: PathBuf,
    base_name: String,
    folder: Option<PathBuf>,
    logs: Vec<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CountSummary<'a> {
    counts: &'a RowCounts,
    query_mapping: &'a QueryMapping,
}

impl ExecutionSession {
    /// Starts a session under `root`, stamped with the current local time.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self::started_at(root, Local::now())
    }

    /// Starts a session with an explicit start time.
    pub fn started_at(root: impl Into<PathBuf>, started: DateTime<Local>) -> Self {
        Self {
            root: root.into(),
            base_name: folder_name(&started),
            folder: None,
            logs: Vec::new(),
        }
    }

    /// The session folder. Before [`create_folder`](Self::create_folder) this
    /// is the unsuffixed path the folder will most likely get.
    pub fn folder_path(&self) -> PathBuf {
        self.folder
            .clone()
            .unwrap_or_else(|| self.root.join(&self.base_name))
    }

    /// Whether the folder exists on disk yet.
    pub fn is_created(&self) -> bool {
        self.folder.is_some()
    }

    /// Creates the session folder on first call and returns it on every call.
    ///
    /// Two sessions started in the same second get distinct folders: the
    /// second one is suffixed ` (2)`, then ` (3)`, and so on.
    pub async fn create_folder(&mut self) -> Result<PathBuf> {
        if let Some(folder) = &self.folder {
            return Ok(folder.clone());
        }

        tokio::fs::create_dir_all(&self.root).await.map_err(|e| {
            HubError::session(format!(
                "Failed to create executions directory {}: {e}",
                self.root.display()
            ))
        })?;

        for attempt in 1..=MAX_FOLDER_ATTEMPTS {
            let name = if attempt == 1 {
                self.base_name.clone()
            } else {
                format!("{} ({attempt})", self.base_name)
            };
            let candidate = self.root.join(name);

            match tokio::fs::create_dir(&candidate).await {
                Ok(()) => {
                    debug!(folder = %candidate.display(), "created session folder");
                    self.folder = Some(candidate.clone());
                    return Ok(candidate);
                }
                Err(e) if e.kind() == ErrorKind::AlreadyExists => continue,
                Err(e) => {
                    return Err(HubError::session(format!(
                        "Failed to create session folder {}: {e}",
                        candidate.display()
                    )))
                }
            }
        }

        Err(HubError::session(format!(
            "No free session folder name for '{}'",
            self.base_name
        )))
    }

    /// Appends one line to the in-memory log.
    pub fn append_log(&mut self, line: impl Into<String>) {
        self.logs.push(line.into());
    }

    /// Writes every buffered log line to `logs.txt`, one per line.
    pub async fn flush_logs(&mut self) -> Result<PathBuf> {
        let folder = self.create_folder().await?;
        let path = folder.join(LOG_FILE);

        let mut contents = self.logs.join("\n");
        if !contents.is_empty() {
            contents.push('\n');
        }

        tokio::fs::write(&path, contents).await.map_err(|e| {
            HubError::session(format!("Failed to write {}: {e}", path.display()))
        })?;
        Ok(path)
    }

    /// Writes `COUNT.txt`: the row counts and label mapping as JSON indented
    /// with four spaces.
    pub async fn write_count_summary(
        &mut self,
        counts: &RowCounts,
        query_mapping: &QueryMapping,
    ) -> Result<PathBuf> {
        let folder = self.create_folder().await?;
        let path = folder.join(COUNT_FILE);

        let summary = CountSummary {
            counts,
            query_mapping,
        };
        let mut buffer = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
        let mut serializer = serde_json::Serializer::with_formatter(&mut buffer, formatter);
        summary
            .serialize(&mut serializer)
            .map_err(|e| HubError::internal(format!("Failed to encode count summary: {e}")))?;

        tokio::fs::write(&path, buffer).await.map_err(|e| {
            HubError::session(format!("Failed to write {}: {e}", path.display()))
        })?;
        Ok(path)
    }

    /// Deletes the session folder and everything in it.
    pub async fn remove(self) -> Result<()> {
        match self.folder {
            Some(folder) => remove_folder(&folder).await,
            None => Ok(()),
        }
    }
}

/// Folder name for a run started at `started`,
/// e.g. `execution on 2026-10-18 (02_05_09 PM)`.
pub fn folder_name(started: &DateTime<Local>) -> String {
    format!(
        "execution on {} ({})",
        started.format("%Y-%m-%d"),
        started.format("%I_%M_%S %p")
    )
}

/// Deletes a session folder. A folder that is already gone is not an error.
pub async fn remove_folder(folder: &Path) -> Result<()> {
    match tokio::fs::remove_dir_all(folder).await {
        Ok(()) => {
            debug!(folder = %folder.display(), "removed session folder");
            Ok(())
        }
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(HubError::session(format!(
            "Failed to remove {}: {e}",
            folder.display()
        ))),
    }
}
