//! Error types for the tablegate gateway

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, GatewayError>;

/// Coarse error category carried by every failed outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorKind {
    /// Malformed or incomplete request
    ValidationError,
    /// Session acquisition or context application failed
    ConnectionError,
    /// A statement was rejected by the warehouse
    ExecutionError,
    /// Ordinal row reference exceeds the current row count
    RowIndexOutOfRange,
    /// Per-request deadline expired
    Timeout,
    /// Startup configuration is incomplete or invalid
    ConfigError,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ValidationError => "ValidationError",
            Self::ConnectionError => "ConnectionError",
            Self::ExecutionError => "ExecutionError",
            Self::RowIndexOutOfRange => "RowIndexOutOfRange",
            Self::Timeout => "Timeout",
            Self::ConfigError => "ConfigError",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("{0}")]
    Validation(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Execution error: {0}")]
    Execution(String),

    #[error("row index out of range")]
    RowIndexOutOfRange { index: u64, row_count: usize },

    /// Insert aborted after `inserted` of `total` rows were committed
    #[error("{source} ({inserted} of {total} rows inserted before the failure)")]
    PartialInsert {
        inserted: usize,
        total: usize,
        #[source]
        source: Box<GatewayError>,
    },

    #[error("request exceeded its deadline of {0:?}")]
    Timeout(std::time::Duration),

    #[error("Missing required configuration: {}", .0.join(", "))]
    MissingConfig(Vec<String>),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // Embedded warehouse errors
    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Type error: {0}")]
    TypeError(String),

    #[error("Table not found: {0}")]
    TableNotFound(String),

    #[error("Column not found: {0}")]
    ColumnNotFound(String),
}

impl GatewayError {
    /// Category reported to the caller.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) => ErrorKind::ValidationError,
            Self::Connection(_) => ErrorKind::ConnectionError,
            Self::RowIndexOutOfRange { .. } => ErrorKind::RowIndexOutOfRange,
            Self::Timeout(_) => ErrorKind::Timeout,
            Self::PartialInsert { source, .. } => source.kind(),
            Self::MissingConfig(_) | Self::InvalidConfig(_) => ErrorKind::ConfigError,
            Self::Execution(_)
            | Self::ParseError(_)
            | Self::TypeError(_)
            | Self::TableNotFound(_)
            | Self::ColumnNotFound(_) => ErrorKind::ExecutionError,
        }
    }

    /// Rows committed before an insert failure, if any were attempted.
    pub fn inserted_rows(&self) -> Option<usize> {
        match self {
            Self::PartialInsert { inserted, .. } => Some(*inserted),
            _ => None,
        }
    }

    /// Re-tag any error raised while opening or configuring a session.
    pub(crate) fn into_connection(self) -> Self {
        match self {
            Self::Connection(_) | Self::Timeout(_) => self,
            other => Self::Connection(other.to_string()),
        }
    }
}

impl From<serde_json::Error> for GatewayError {
    fn from(err: serde_json::Error) -> Self {
        GatewayError::Validation(format!("malformed payload: {}", err))
    }
}

impl From<reqwest::Error> for GatewayError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            GatewayError::Execution(format!("undecodable warehouse response: {}", err))
        } else {
            GatewayError::Connection(err.to_string())
        }
    }
}
