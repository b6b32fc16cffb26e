//! Configuration management for the query hub.
//!
//! Handles loading configuration from TOML files and environment variables,
//! with support for a set of database connections sharing one engine family
//! and the directories run artifacts are written to.

use crate::db::EngineType;
use crate::error::{HubError, Result};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

use url::Url;

/// Main configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Where run artifacts and saved query files live.
    #[serde(default)]
    pub storage: StorageConfig,

    /// The database set statements are executed against.
    #[serde(default)]
    pub database: Option<DbConfigSet>,
}

/// Artifact directory configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct StorageConfig {
    /// Root directory for per-run session folders.
    pub executions: Option<PathBuf>,

    /// Directory for saved query files.
    pub queries: Option<PathBuf>,
}

impl StorageConfig {
    /// Returns the session root, falling back to the platform data directory.
    pub fn executions_dir(&self) -> PathBuf {
        self.executions
            .clone()
            .unwrap_or_else(|| data_dir().join("queries-execution"))
    }

    /// Returns the saved-queries directory, falling back to the platform data directory.
    pub fn queries_dir(&self) -> PathBuf {
        self.queries
            .clone()
            .unwrap_or_else(|| data_dir().join("queries"))
    }
}

fn data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("sql-query-hub")
}

/// A set of database connections that all speak the same engine.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DbConfigSet {
    /// Engine family shared by every config in the set.
    #[serde(rename = "type")]
    pub engine: EngineType,

    /// Connections, processed in this order.
    pub configs: Vec<ConnectionConfig>,
}

impl DbConfigSet {
    /// Creates a config set for the given engine.
    pub fn new(engine: EngineType, configs: Vec<ConnectionConfig>) -> Self {
        Self { engine, configs }
    }

    /// Checks that the set is non-empty and that every connection has a unique name.
    pub fn validate(&self) -> Result<()> {
        if self.configs.is_empty() {
            return Err(HubError::config("database configs must not be empty"));
        }

        let mut seen = HashSet::new();
        for config in &self.configs {
            if config.name.trim().is_empty() {
                return Err(HubError::config("every database config needs a name"));
            }
            if !seen.insert(config.name.as_str()) {
                return Err(HubError::config(format!(
                    "duplicate database config name '{}'",
                    config.name
                )));
            }
        }

        Ok(())
    }

    /// Applies environment defaults to every connection in the set.
    pub fn apply_env_defaults(&mut self) {
        for config in &mut self.configs {
            config.apply_env_defaults();
        }
    }
}

/// Database connection configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct ConnectionConfig {
    /// Unique name of this connection within its set.
    pub name: String,

    /// Database host.
    pub host: Option<String>,

    /// Database port. Accepts a number or a numeric string.
    #[serde(default, deserialize_with = "deserialize_port")]
    pub port: Option<u16>,

    /// Database user.
    pub user: Option<String>,

    /// Database password (not recommended to store in config).
    pub password: Option<String>,

    /// Database name.
    pub database: Option<String>,
}

fn deserialize_port<'de, D>(deserializer: D) -> std::result::Result<Option<u16>, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error;

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum PortRepr {
        Number(u16),
        Text(String),
    }

    match Option::<PortRepr>::deserialize(deserializer)? {
        None => Ok(None),
        Some(PortRepr::Number(port)) => Ok(Some(port)),
        Some(PortRepr::Text(text)) if text.trim().is_empty() => Ok(None),
        Some(PortRepr::Text(text)) => text
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| D::Error::custom(format!("invalid port '{text}'"))),
    }
}

impl ConnectionConfig {
    /// Creates a named connection config with everything else unset.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Parses a connection URL into its engine and a named connection config.
    ///
    /// Accepted schemes: `mysql`, `postgres`, `postgresql`, `mssql`, `sqlserver`.
    pub fn from_url(name: impl Into<String>, conn_str: &str) -> Result<(EngineType, Self)> {
        let url = Url::parse(conn_str)
            .map_err(|e| HubError::config(format!("Invalid connection string: {e}")))?;

        let engine = EngineType::from_url_scheme(url.scheme()).ok_or_else(|| {
            HubError::config(format!(
                "Invalid scheme '{}'. Expected one of mysql, postgres, mssql",
                url.scheme()
            ))
        })?;

        let database = url
            .path()
            .strip_prefix('/')
            .filter(|db| !db.is_empty())
            .map(String::from);
        let user = if url.username().is_empty() {
            None
        } else {
            Some(url.username().to_string())
        };

        Ok((
            engine,
            Self {
                name: name.into(),
                host: url.host_str().map(String::from),
                port: url.port(),
                user,
                password: url.password().map(String::from),
                database,
            },
        ))
    }

    /// Returns the host, defaulting to localhost.
    pub fn host_or_default(&self) -> &str {
        self.host.as_deref().unwrap_or("localhost")
    }

    /// Returns the port, defaulting to the engine's standard port.
    pub fn port_or_default(&self, engine: EngineType) -> u16 {
        self.port.unwrap_or_else(|| engine.default_port())
    }

    /// Applies environment variables (DB_HOST, DB_PORT, etc.) as defaults.
    pub fn apply_env_defaults(&mut self) {
        if self.host.is_none() {
            self.host = std::env::var("DB_HOST").ok();
        }
        if self.port.is_none() {
            self.port = std::env::var("DB_PORT")
                .ok()
                .and_then(|port| port.trim().parse().ok());
        }
        if self.user.is_none() {
            self.user = std::env::var("DB_USER").ok();
        }
        if self.password.is_none() {
            self.password = std::env::var("DB_PASSWORD").ok();
        }
        if self.database.is_none() {
            self.database = std::env::var("DB_NAME").ok();
        }
    }

    /// Returns a display-safe string (no password) for logs.
    pub fn display_string(&self, engine: EngineType) -> String {
        let database = self.database.as_deref().unwrap_or("default");
        format!(
            "{} ({database} @ {}:{})",
            self.name,
            self.host_or_default(),
            self.port_or_default(engine)
        )
    }
}

impl Config {
    /// Returns the default config file path for the current platform.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("sql-query-hub")
            .join("config.toml")
    }

    /// Loads configuration from a TOML file. A missing file yields the defaults.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .map_err(|e| HubError::config(format!("Failed to read config file: {e}")))?;

        Self::parse_toml(&content, path)
    }

    /// Parses configuration from a TOML string.
    fn parse_toml(content: &str, path: &Path) -> Result<Self> {
        toml::from_str(content).map_err(|e| {
            HubError::config(format!(
                "Configuration error in {}:\n  {}",
                path.display(),
                e
            ))
        })
    }
}
