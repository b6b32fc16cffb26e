//! MySQL backend adapter.
//!
//! Uses a dedicated sqlx connection per backend. Statements go over the text
//! protocol so `CREATE TRIGGER` / `CREATE PROCEDURE` bodies, which the
//! prepared-statement protocol rejects, run as written.

use super::{
    connection_failure, text_or_bytes, BackendAdapter, BackendConnection, EngineType, Row, Value,
};
use super::CONNECT_TIMEOUT;
use crate::config::ConnectionConfig;
use crate::error::{HubError, Result};
use async_trait::async_trait;
use sqlx::mysql::{MySql, MySqlConnectOptions, MySqlConnection, MySqlRow};
use sqlx::{Column as SqlxColumn, Connection, Executor, Row as SqlxRow, TypeInfo};
use std::future::Future;
use std::pin::Pin;
use tracing::debug;

/// Adapter for MySQL and MariaDB backends.
#[derive(Debug, Default, Clone, Copy)]
pub struct MySqlAdapter;

impl MySqlAdapter {
    pub fn new() -> Self {
        Self
    }

    fn connect_options(config: &ConnectionConfig) -> MySqlConnectOptions {
        let mut options = MySqlConnectOptions::new()
            .host(config.host_or_default())
            .port(config.port_or_default(EngineType::MySql));

        if let Some(user) = &config.user {
            options = options.username(user);
        }
        if let Some(password) = &config.password {
            options = options.password(password);
        }
        if let Some(database) = &config.database {
            options = options.database(database);
        }

        options
    }
}

#[async_trait]
impl BackendAdapter for MySqlAdapter {
    fn engine(&self) -> EngineType {
        EngineType::MySql
    }

    async fn connect(&self, config: &ConnectionConfig) -> Result<Box<dyn BackendConnection>> {
        let options = Self::connect_options(config);

        let conn = tokio::time::timeout(CONNECT_TIMEOUT, MySqlConnection::connect_with(&options))
            .await
            .map_err(|_| {
                HubError::connection(
                    &config.name,
                    format!(
                        "Connection timed out after {} seconds",
                        CONNECT_TIMEOUT.as_secs()
                    ),
                )
            })?
            .map_err(|e| connection_failure(config, EngineType::MySql, e))?;

        debug!(backend = %config.name, "mysql connection established");
        Ok(Box::new(MySqlBackendConnection { conn: Some(conn) }))
    }
}

/// A live MySQL connection.
pub struct MySqlBackendConnection {
    conn: Option<MySqlConnection>,
}

#[async_trait]
impl BackendConnection for MySqlBackendConnection {
    async fn execute_statement(&mut self, sql: &str) -> Result<Vec<Row>> {
        let conn = self
            .conn
            .as_mut()
            .ok_or_else(|| HubError::statement("connection is already closed"))?;

        let rows = fetch_rows(conn, sql)
            .await
            .map_err(|e| HubError::statement(format_query_error(e)))?;

        Ok(rows.iter().map(convert_row).collect())
    }

    async fn disconnect(&mut self) -> Result<()> {
        match self.conn.take() {
            Some(conn) => conn
                .close()
                .await
                .map_err(|e| HubError::disconnect(e.to_string())),
            None => Ok(()),
        }
    }
}

/// Runs `sql` over the text protocol and collects every returned row.
fn fetch_rows<'c>(
    conn: &'c mut MySqlConnection,
    sql: &'c str,
) -> Pin<Box<dyn Future<Output = sqlx::Result<Vec<MySqlRow>>> + Send + 'c>> {
    Executor::fetch_all(conn, sqlx::raw_sql(sql))
}

fn convert_row(row: &MySqlRow) -> Row {
    row.columns()
        .iter()
        .enumerate()
        .map(|(i, col)| {
            (
                col.name().to_string(),
                convert_value(row, i, col.type_info().name()),
            )
        })
        .collect()
}

fn convert_value(row: &MySqlRow, index: usize, type_name: &str) -> Value {
    let type_name = type_name.to_uppercase();

    if type_name.ends_with("UNSIGNED") {
        return typed::<u64>(row, index, Value::from);
    }

    match type_name.as_str() {
        "BOOLEAN" => typed::<bool>(row, index, Value::Bool),
        "TINYINT" | "SMALLINT" | "MEDIUMINT" | "INT" | "BIGINT" => {
            typed::<i64>(row, index, Value::Int)
        }
        "FLOAT" | "DOUBLE" => typed::<f64>(row, index, Value::Float),
        "BINARY" | "VARBINARY" | "TINYBLOB" | "BLOB" | "MEDIUMBLOB" | "LONGBLOB" => {
            typed::<Vec<u8>>(row, index, Value::Bytes)
        }
        // Decimals, temporals, json and enums keep their literal text.
        _ => text(row, index),
    }
}

/// Decodes a column as `T`, falling back to its text when the driver refuses.
fn typed<'r, T>(row: &'r MySqlRow, index: usize, into: impl FnOnce(T) -> Value) -> Value
where
    T: sqlx::Decode<'r, MySql> + sqlx::Type<MySql>,
{
    match row.try_get::<Option<T>, _>(index) {
        Ok(Some(value)) => into(value),
        Ok(None) => Value::Null,
        Err(_) => text(row, index),
    }
}

/// Reads the raw text-protocol value of a column.
fn text(row: &MySqlRow, index: usize) -> Value {
    text_or_bytes(row.try_get_unchecked::<Option<String>, _>(index), || {
        row.try_get_unchecked::<Option<Vec<u8>>, _>(index)
            .ok()
            .flatten()
    })
}

fn format_query_error(error: sqlx::Error) -> String {
    match error.as_database_error() {
        Some(db_error) => match db_error.code() {
            Some(code) => format!("{} (SQLSTATE {code})", db_error.message()),
            None => db_error.message().to_string(),
        },
        None => error.to_string(),
    }
}
