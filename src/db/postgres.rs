//! PostgreSQL backend adapter.
//!
//! Opens one dedicated sqlx connection per backend and runs statements over
//! the simple-query protocol, so DDL, `DO` blocks and function bodies go
//! through unchanged.

use super::{
    connection_failure, text_or_bytes, BackendAdapter, BackendConnection, EngineType, Row, Value,
};
use super::CONNECT_TIMEOUT;
use crate::config::ConnectionConfig;
use crate::error::{HubError, Result};
use async_trait::async_trait;
use sqlx::postgres::{PgConnectOptions, PgConnection, PgRow, Postgres};
use sqlx::{Column as SqlxColumn, Connection, Executor, Row as SqlxRow, TypeInfo};
use std::future::Future;
use std::pin::Pin;
use tracing::debug;

/// Adapter for PostgreSQL backends.
#[derive(Debug, Default, Clone, Copy)]
pub struct PostgresAdapter;

impl PostgresAdapter {
    pub fn new() -> Self {
        Self
    }

    fn connect_options(config: &ConnectionConfig) -> PgConnectOptions {
        let mut options = PgConnectOptions::new()
            .host(config.host_or_default())
            .port(config.port_or_default(EngineType::Postgres));

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
impl BackendAdapter for PostgresAdapter {
    fn engine(&self) -> EngineType {
        EngineType::Postgres
    }

    async fn connect(&self, config: &ConnectionConfig) -> Result<Box<dyn BackendConnection>> {
        let options = Self::connect_options(config);

        let conn = tokio::time::timeout(CONNECT_TIMEOUT, PgConnection::connect_with(&options))
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
            .map_err(|e| connection_failure(config, EngineType::Postgres, e))?;

        debug!(backend = %config.name, "postgres connection established");
        Ok(Box::new(PostgresConnection { conn: Some(conn) }))
    }
}

/// A live PostgreSQL connection.
pub struct PostgresConnection {
    conn: Option<PgConnection>,
}

#[async_trait]
impl BackendConnection for PostgresConnection {
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

/// Converts a sqlx PgRow to our Row type.
/// Runs `sql` over the text protocol and collects every returned row.
fn fetch_rows<'c>(
    conn: &'c mut PgConnection,
    sql: &'c str,
) -> Pin<Box<dyn Future<Output = sqlx::Result<Vec<PgRow>>> + Send + 'c>> {
    Executor::fetch_all(conn, sqlx::raw_sql(sql))
}

fn convert_row(row: &PgRow) -> Row {
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

/// Converts a single column value from a PgRow to our Value type.
fn convert_value(row: &PgRow, index: usize, type_name: &str) -> Value {
    match type_name.to_uppercase().as_str() {
        "BOOL" | "BOOLEAN" => typed::<bool>(row, index, Value::Bool),
        "INT2" | "SMALLINT" => typed::<i16>(row, index, |v| Value::Int(v as i64)),
        "INT4" | "INT" | "INTEGER" => typed::<i32>(row, index, |v| Value::Int(v as i64)),
        "INT8" | "BIGINT" => typed::<i64>(row, index, Value::Int),
        "FLOAT4" | "REAL" => typed::<f32>(row, index, |v| Value::Float(v as f64)),
        "FLOAT8" | "DOUBLE PRECISION" => typed::<f64>(row, index, Value::Float),
        "BYTEA" => typed::<Vec<u8>>(row, index, Value::Bytes),
        // Simple-query results arrive in text format, so every other type
        // (numeric, dates, json, uuid, arrays) reads back as its literal text.
        _ => text(row, index),
    }
}

/// Decodes a column as `T`, falling back to its text when the driver refuses.
fn typed<'r, T>(row: &'r PgRow, index: usize, into: impl FnOnce(T) -> Value) -> Value
where
    T: sqlx::Decode<'r, Postgres> + sqlx::Type<Postgres>,
{
    match row.try_get::<Option<T>, _>(index) {
        Ok(Some(value)) => into(value),
        Ok(None) => Value::Null,
        Err(_) => text(row, index),
    }
}

fn text(row: &PgRow, index: usize) -> Value {
    text_or_bytes(row.try_get_unchecked::<Option<String>, _>(index), || {
        row.try_get_unchecked::<Option<Vec<u8>>, _>(index)
            .ok()
            .flatten()
    })
}

/// Formats a query error, keeping the server message and any detail or hint.
fn format_query_error(error: sqlx::Error) -> String {
    let Some(db_error) = error.as_database_error() else {
        return error.to_string();
    };

    let mut result = String::from("ERROR: ");
    result.push_str(db_error.message());

    if let Some(pg_error) = db_error.try_downcast_ref::<sqlx::postgres::PgDatabaseError>() {
        if let Some(detail) = pg_error.detail() {
            result.push_str("\n  DETAIL: ");
            result.push_str(detail);
        }

        if let Some(hint) = pg_error.hint() {
            result.push_str("\n  HINT: ");
            result.push_str(hint);
        }
    }

    result
}
