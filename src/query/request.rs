//! JSON run request: a configuration set plus either a statement list or a
//! SQL script to split.

use super::splitter::StatementSplitter;
use super::types::Statement;
use crate::config::DbConfigSet;
use crate::error::{HubError, Result};
use serde::{Deserialize, Deserializer};

/// A complete run request, e.g.
///
/// ```json
/// { "dbConfig": { "type": "mysql", "configs": [{ "name": "local" }] },
///   "sql": "SELECT 1; SELECT 2;",
///   "shouldExport": "true" }
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunRequest {
    pub db_config: DbConfigSet,
    #[serde(default)]
    pub queries: Option<Vec<String>>,
    #[serde(default)]
    pub sql: Option<String>,
    #[serde(default, deserialize_with = "deserialize_flag")]
    pub should_export: bool,
}

impl RunRequest {
    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text)
            .map_err(|e| HubError::config(format!("Invalid run request: {e}")))
    }

    /// Resolves the statements to run. Explicit `queries` are used verbatim;
    /// a `sql` script goes through `splitter`.
    pub fn statements(&self, splitter: &dyn StatementSplitter) -> Result<Vec<Statement>> {
        match (&self.queries, &self.sql) {
            (Some(_), Some(_)) => Err(HubError::config(
                "Provide either queries or sql, not both",
            )),
            (Some(queries), None) => Ok(queries.iter().map(Statement::new).collect()),
            (None, Some(sql)) => Ok(splitter.split(sql)),
            (None, None) => Err(HubError::config("Queries must be provided")),
        }
    }
}

/// Accepts `true`/`false` as booleans or as strings, as form posts send them.
fn deserialize_flag<'de, D>(deserializer: D) -> std::result::Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Flag {
        Bool(bool),
        Text(String),
    }

    match Flag::deserialize(deserializer)? {
        Flag::Bool(value) => Ok(value),
        Flag::Text(text) => Ok(text.trim().eq_ignore_ascii_case("true")),
    }
}
