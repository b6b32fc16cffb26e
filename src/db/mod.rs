//! Database abstraction layer.
//!
//! Provides a trait-based interface for the three engine families, allowing
//! the orchestrator to drive any of them through the same calls.

mod mock;
mod mssql;
mod mysql;
mod postgres;
mod types;

pub use mock::{MockAdapter, MockBackend, MockEvent};
pub use mssql::MsSqlAdapter;
pub use mysql::MySqlAdapter;
pub use postgres::PostgresAdapter;
pub use types::{row_from_pairs, Row, Value};

pub(crate) use types::text_or_bytes;

use crate::config::ConnectionConfig;
use crate::error::{HubError, Result};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

/// Upper bound on establishing one backend connection.
pub(crate) const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Supported engine families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineType {
    MySql,
    Postgres,
    MsSql,
}

impl EngineType {
    /// Returns the engine as a string for logs and persistence.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MySql => "mysql",
            Self::Postgres => "postgres",
            Self::MsSql => "mssql",
        }
    }

    /// Parses an engine from a string.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "mysql" | "mariadb" => Some(Self::MySql),
            "postgres" | "postgresql" => Some(Self::Postgres),
            "mssql" | "sqlserver" => Some(Self::MsSql),
            _ => None,
        }
    }

    /// Maps a connection URL scheme to its engine.
    pub fn from_url_scheme(scheme: &str) -> Option<Self> {
        Self::parse(scheme)
    }

    /// Returns the default port for this engine.
    pub fn default_port(&self) -> u16 {
        match self {
            Self::MySql => 3306,
            Self::Postgres => 5432,
            Self::MsSql => 1433,
        }
    }
}

impl std::fmt::Display for EngineType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Creates the adapter for an engine family.
///
/// The engine is resolved once here; connections produced by the adapter
/// never re-dispatch on engine type.
pub fn adapter_for(engine: EngineType) -> Arc<dyn BackendAdapter> {
    match engine {
        EngineType::MySql => Arc::new(MySqlAdapter::new()),
        EngineType::Postgres => Arc::new(PostgresAdapter::new()),
        EngineType::MsSql => Arc::new(MsSqlAdapter::new()),
    }
}

/// Maps a driver connection error to `HubError::Connection`.
///
/// The driver's message is always kept verbatim; a short hint is appended
/// for the common failure shapes.
pub(crate) fn connection_failure(
    config: &ConnectionConfig,
    engine: EngineType,
    error: impl std::fmt::Display,
) -> HubError {
    let raw = error.to_string();
    let lower = raw.to_lowercase();
    let host = config.host_or_default();
    let port = config.port_or_default(engine);

    let hint = if lower.contains("connection refused") || lower.contains("could not connect") {
        Some(format!("check that the server at {host}:{port} is running"))
    } else if lower.contains("authentication failed") || lower.contains("access denied") {
        Some(format!(
            "check the credentials for user '{}'",
            config.user.as_deref().unwrap_or("unknown")
        ))
    } else if lower.contains("timed out") || lower.contains("timeout") {
        Some(format!("{host}:{port} may be overloaded or unreachable"))
    } else {
        None
    };

    match hint {
        Some(hint) => HubError::connection(&config.name, format!("{raw} ({hint})")),
        None => HubError::connection(&config.name, raw),
    }
}

/// Opens connections for one engine family.
#[async_trait]
pub trait BackendAdapter: Send + Sync {
    /// The engine family this adapter speaks.
    fn engine(&self) -> EngineType;

    /// Connects to the backend described by `config`.
    ///
    /// Fails with `HubError::Connection` naming the config and carrying the
    /// driver's message.
    async fn connect(&self, config: &ConnectionConfig) -> Result<Box<dyn BackendConnection>>;
}

/// One live connection, exclusively owned by the caller.
#[async_trait]
pub trait BackendConnection: Send {
    /// Executes one statement and returns every row it produced.
    ///
    /// All-or-nothing: on error no rows are returned.
    async fn execute_statement(&mut self, sql: &str) -> Result<Vec<Row>>;

    /// Closes the connection. Calling it again is a no-op.
    async fn disconnect(&mut self) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_parse() {
        assert_eq!(EngineType::parse("MySQL"), Some(EngineType::MySql));
        assert_eq!(EngineType::parse("postgresql"), Some(EngineType::Postgres));
        assert_eq!(EngineType::parse("sqlserver"), Some(EngineType::MsSql));
        assert_eq!(EngineType::parse("oracle"), None);
    }

    #[test]
    fn test_engine_serde_matches_request_type_field() {
        let engine: EngineType = serde_json::from_str("\"mssql\"").unwrap();
        assert_eq!(engine, EngineType::MsSql);
        assert_eq!(serde_json::to_string(&EngineType::MySql).unwrap(), "\"mysql\"");
    }

    #[test]
    fn test_connection_failure_keeps_raw_message() {
        let config = ConnectionConfig {
            name: "replica".to_string(),
            host: Some("db.internal".to_string()),
            ..Default::default()
        };

        let err = connection_failure(
            &config,
            EngineType::MySql,
            "error communicating with database: Connection refused (os error 111)",
        );
        match err {
            HubError::Connection { backend, message } => {
                assert_eq!(backend, "replica");
                assert!(message.starts_with("error communicating with database"));
                assert!(message.contains("db.internal:3306"));
            }
            other => panic!("Expected Connection error, got {other:?}"),
        }

        let plain = connection_failure(&config, EngineType::MySql, "something odd");
        assert_eq!(plain.message(), "something odd");
    }

    #[test]
    fn test_adapter_for_selects_engine() {
        for engine in [EngineType::MySql, EngineType::Postgres, EngineType::MsSql] {
            assert_eq!(adapter_for(engine).engine(), engine);
        }
    }
}
