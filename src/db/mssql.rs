//! SQL Server backend adapter.
//!
//! Talks TDS through tiberius over a tokio TCP stream. Only the first result
//! set of a statement is kept.

use super::{connection_failure, BackendAdapter, BackendConnection, EngineType, Row, Value};
use super::CONNECT_TIMEOUT;
use crate::config::ConnectionConfig;
use crate::error::{HubError, Result};
use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime};
use tiberius::{AuthMethod, Client, ColumnData, Config, FromSql};
use tokio::net::TcpStream;
use tokio_util::compat::{Compat, TokioAsyncWriteCompatExt};
use tracing::debug;

type TdsClient = Client<Compat<TcpStream>>;

/// Adapter for Microsoft SQL Server backends.
#[derive(Debug, Default, Clone, Copy)]
pub struct MsSqlAdapter;

impl MsSqlAdapter {
    pub fn new() -> Self {
        Self
    }

    fn tds_config(config: &ConnectionConfig) -> Config {
        let mut tds = Config::new();
        tds.host(config.host_or_default());
        tds.port(config.port_or_default(EngineType::MsSql));
        tds.authentication(AuthMethod::sql_server(
            config.user.as_deref().unwrap_or("sa"),
            config.password.as_deref().unwrap_or_default(),
        ));
        if let Some(database) = &config.database {
            tds.database(database);
        }
        // Self-signed server certificates are the norm for internal instances.
        tds.trust_cert();
        tds
    }

    async fn open(tds: Config) -> tiberius::Result<TdsClient> {
        let tcp = TcpStream::connect(tds.get_addr()).await?;
        tcp.set_nodelay(true)?;
        Client::connect(tds, tcp.compat_write()).await
    }
}

#[async_trait]
impl BackendAdapter for MsSqlAdapter {
    fn engine(&self) -> EngineType {
        EngineType::MsSql
    }

    async fn connect(&self, config: &ConnectionConfig) -> Result<Box<dyn BackendConnection>> {
        let tds = Self::tds_config(config);

        let client = tokio::time::timeout(CONNECT_TIMEOUT, Self::open(tds))
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
            .map_err(|e| connection_failure(config, EngineType::MsSql, e))?;

        debug!(backend = %config.name, "mssql connection established");
        Ok(Box::new(MsSqlConnection {
            client: Some(client),
        }))
    }
}

/// A live SQL Server connection.
pub struct MsSqlConnection {
    client: Option<TdsClient>,
}

#[async_trait]
impl BackendConnection for MsSqlConnection {
    async fn execute_statement(&mut self, sql: &str) -> Result<Vec<Row>> {
        let client = self
            .client
            .as_mut()
            .ok_or_else(|| HubError::statement("connection is already closed"))?;

        let stream = client
            .simple_query(sql)
            .await
            .map_err(|e| HubError::statement(e.to_string()))?;
        let rows = stream
            .into_first_result()
            .await
            .map_err(|e| HubError::statement(e.to_string()))?;

        Ok(rows.iter().map(convert_row).collect())
    }

    async fn disconnect(&mut self) -> Result<()> {
        match self.client.take() {
            Some(client) => client
                .close()
                .await
                .map_err(|e| HubError::disconnect(e.to_string())),
            None => Ok(()),
        }
    }
}

fn convert_row(row: &tiberius::Row) -> Row {
    row.cells()
        .map(|(column, data)| (column.name().to_string(), convert_value(data)))
        .collect()
}

fn convert_value(data: &ColumnData<'static>) -> Value {
    let value = match data {
        ColumnData::U8(v) => v.map(|v| Value::Int(v as i64)),
        ColumnData::I16(v) => v.map(|v| Value::Int(v as i64)),
        ColumnData::I32(v) => v.map(|v| Value::Int(v as i64)),
        ColumnData::I64(v) => v.map(Value::Int),
        ColumnData::F32(v) => v.map(|v| Value::Float(v as f64)),
        ColumnData::F64(v) => v.map(Value::Float),
        ColumnData::Bit(v) => v.map(Value::Bool),
        ColumnData::String(v) => v.as_ref().map(|s| Value::String(s.to_string())),
        ColumnData::Guid(v) => v.as_ref().map(|g| Value::String(g.to_string())),
        ColumnData::Binary(v) => v.as_ref().map(|b| Value::Bytes(b.to_vec())),
        ColumnData::Numeric(v) => v.as_ref().map(|n| Value::String(n.to_string())),
        ColumnData::Xml(v) => v
            .as_ref()
            .map(|xml| Value::String(xml.clone().into_owned().into_string())),
        temporal => temporal_text(temporal),
    };

    value.unwrap_or(Value::Null)
}

/// Renders date and time columns as ISO-like text.
fn temporal_text(data: &ColumnData<'static>) -> Option<Value> {
    if let Ok(value) = NaiveDateTime::from_sql(data) {
        return value.map(|v| Value::String(v.to_string()));
    }
    if let Ok(value) = NaiveDate::from_sql(data) {
        return value.map(|v| Value::String(v.to_string()));
    }
    if let Ok(value) = NaiveTime::from_sql(data) {
        return value.map(|v| Value::String(v.to_string()));
    }
    if let Ok(value) = DateTime::<FixedOffset>::from_sql(data) {
        return value.map(|v| Value::String(v.to_rfc3339()));
    }
    None
}
