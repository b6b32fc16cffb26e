//! Error types for the query hub.
//!
//! Defines the main error enum used throughout the crate. Only configuration
//! errors escape an orchestration run; every other kind is captured and
//! attributed to the backend and statement it happened on.

use thiserror::Error;

/// Main error type for query hub operations.
#[derive(Error, Debug)]
pub enum HubError {
    /// Malformed or empty database configuration or request input.
    #[error("Configuration error: {0}")]
    Config(String),

    /// A backend could not be reached (host unreachable, auth failed, etc.)
    #[error("Connection error on '{backend}': {message}")]
    Connection { backend: String, message: String },

    /// A statement failed on a reachable backend.
    #[error("Statement error: {0}")]
    Statement(String),

    /// Spreadsheet or archive materialization failed.
    #[error("Export error: {0}")]
    Export(String),

    /// Best-effort connection cleanup failed.
    #[error("Disconnect error: {0}")]
    Disconnect(String),

    /// Session folder, log, or count summary could not be written.
    #[error("Session error: {0}")]
    Session(String),

    /// Internal application errors (unexpected states, bugs, etc.)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl HubError {
    /// Creates a configuration error with the given message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Creates a connection error for the named backend.
    pub fn connection(backend: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Connection {
            backend: backend.into(),
            message: msg.into(),
        }
    }

    /// Creates a statement error with the given message.
    pub fn statement(msg: impl Into<String>) -> Self {
        Self::Statement(msg.into())
    }

    /// Creates an export error with the given message.
    pub fn export(msg: impl Into<String>) -> Self {
        Self::Export(msg.into())
    }

    /// Creates a disconnect error with the given message.
    pub fn disconnect(msg: impl Into<String>) -> Self {
        Self::Disconnect(msg.into())
    }

    /// Creates a session error with the given message.
    pub fn session(msg: impl Into<String>) -> Self {
        Self::Session(msg.into())
    }

    /// Creates an internal error with the given message.
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Returns the driver-level message without the category prefix.
    ///
    /// This is what ends up in run results and execution logs.
    pub fn message(&self) -> &str {
        match self {
            Self::Config(m)
            | Self::Statement(m)
            | Self::Export(m)
            | Self::Disconnect(m)
            | Self::Session(m)
            | Self::Internal(m) => m,
            Self::Connection { message, .. } => message,
        }
    }

    /// Returns the error category as a string for display purposes.
    pub fn category(&self) -> &'static str {
        match self {
            Self::Config(_) => "Configuration Error",
            Self::Connection { .. } => "Connection Error",
            Self::Statement(_) => "Statement Error",
            Self::Export(_) => "Export Error",
            Self::Disconnect(_) => "Disconnect Error",
            Self::Session(_) => "Session Error",
            Self::Internal(_) => "Internal Error",
        }
    }
}

/// Result type alias using HubError.
pub type Result<T> = std::result::Result<T, HubError>;
