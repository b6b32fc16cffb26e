//! Mock backend adapter for testing.
//!
//! Provides an in-memory adapter whose backends can be scripted to be
//! unreachable, to fail specific statements, or to fail on disconnect. Every
//! call is recorded so tests can assert on ordering.

use super::{BackendAdapter, BackendConnection, EngineType, Row, Value};
use crate::config::ConnectionConfig;
use crate::error::{HubError, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// One call observed by the mock, in the order it happened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockEvent {
    Connect(String),
    Execute { backend: String, sql: String },
    Disconnect(String),
}

/// Scripted behavior for one named backend.
#[derive(Debug, Clone, Default)]
pub struct MockBackend {
    unreachable: bool,
    fail_disconnect: bool,
    results: HashMap<String, std::result::Result<Vec<Row>, String>>,
}

impl MockBackend {
    /// A reachable backend with no scripted statements.
    pub fn new() -> Self {
        Self::default()
    }

    /// A backend whose connect always fails.
    pub fn unreachable() -> Self {
        Self {
            unreachable: true,
            ..Self::default()
        }
    }

    /// Scripts the rows returned for a statement.
    pub fn with_rows(mut self, sql: &str, rows: Vec<Row>) -> Self {
        self.results.insert(statement_key(sql), Ok(rows));
        self
    }

    /// Scripts a statement to fail with the given message.
    pub fn with_error(mut self, sql: &str, message: impl Into<String>) -> Self {
        self.results.insert(statement_key(sql), Err(message.into()));
        self
    }

    /// Makes disconnect report an error.
    pub fn with_failing_disconnect(mut self) -> Self {
        self.fail_disconnect = true;
        self
    }
}

/// Statements match regardless of surrounding whitespace and the trailing terminator.
fn statement_key(sql: &str) -> String {
    sql.trim().trim_end_matches(';').trim().to_string()
}

#[derive(Debug, Default)]
struct MockState {
    events: Mutex<Vec<MockEvent>>,
    open: AtomicUsize,
    max_open: AtomicUsize,
}

impl MockState {
    fn record(&self, event: MockEvent) {
        let mut events = self.events.lock().unwrap_or_else(|e| e.into_inner());
        events.push(event);
    }
}

/// A mock adapter over a set of named backends.
///
/// Backends that were never registered behave like `MockBackend::new()`.
#[derive(Debug, Clone)]
pub struct MockAdapter {
    engine: EngineType,
    backends: HashMap<String, MockBackend>,
    state: Arc<MockState>,
}

impl MockAdapter {
    /// Creates a mock adapter claiming to speak `engine`.
    pub fn new(engine: EngineType) -> Self {
        Self {
            engine,
            backends: HashMap::new(),
            state: Arc::new(MockState::default()),
        }
    }

    /// Registers scripted behavior for a backend name.
    pub fn with_backend(mut self, name: impl Into<String>, backend: MockBackend) -> Self {
        self.backends.insert(name.into(), backend);
        self
    }

    /// Returns every call observed so far.
    pub fn events(&self) -> Vec<MockEvent> {
        self.state
            .events
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Returns the highest number of simultaneously open connections seen.
    pub fn max_open_connections(&self) -> usize {
        self.state.max_open.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BackendAdapter for MockAdapter {
    fn engine(&self) -> EngineType {
        self.engine
    }

    async fn connect(&self, config: &ConnectionConfig) -> Result<Box<dyn BackendConnection>> {
        self.state.record(MockEvent::Connect(config.name.clone()));

        let backend = self.backends.get(&config.name).cloned().unwrap_or_default();
        if backend.unreachable {
            return Err(HubError::connection(
                &config.name,
                format!(
                    "connect ECONNREFUSED {}:{}",
                    config.host_or_default(),
                    config.port_or_default(self.engine)
                ),
            ));
        }

        let open = self.state.open.fetch_add(1, Ordering::SeqCst) + 1;
        self.state.max_open.fetch_max(open, Ordering::SeqCst);

        Ok(Box::new(MockConnection {
            name: config.name.clone(),
            backend,
            state: Arc::clone(&self.state),
            open: true,
        }))
    }
}

struct MockConnection {
    name: String,
    backend: MockBackend,
    state: Arc<MockState>,
    open: bool,
}

#[async_trait]
impl BackendConnection for MockConnection {
    async fn execute_statement(&mut self, sql: &str) -> Result<Vec<Row>> {
        if !self.open {
            return Err(HubError::statement("connection is already closed"));
        }

        self.state.record(MockEvent::Execute {
            backend: self.name.clone(),
            sql: sql.to_string(),
        });

        match self.backend.results.get(&statement_key(sql)) {
            Some(Ok(rows)) => Ok(rows.clone()),
            Some(Err(message)) => Err(HubError::statement(message.clone())),
            None if sql.trim_start().to_uppercase().starts_with("SELECT") => {
                let mut row = Row::new();
                row.insert(
                    "result".to_string(),
                    Value::String(format!("Mock result for: {sql}")),
                );
                Ok(vec![row])
            }
            None => Ok(Vec::new()),
        }
    }

    async fn disconnect(&mut self) -> Result<()> {
        if !self.open {
            return Ok(());
        }
        self.open = false;
        self.state.open.fetch_sub(1, Ordering::SeqCst);
        self.state.record(MockEvent::Disconnect(self.name.clone()));

        if self.backend.fail_disconnect {
            return Err(HubError::disconnect(format!(
                "mock failure closing {}",
                self.name
            )));
        }
        Ok(())
    }
}
