//! Uniform request results and their JSON rendering

use crate::error::{ErrorKind, GatewayError};
use crate::types::{RowValues, TableName};
use serde_json::{json, Map, Value as JsonValue};

/// Verb-specific success data.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Created { table: TableName },
    Rows(Vec<RowValues>),
    /// Column metadata exactly as the warehouse described it
    Structure(Vec<RowValues>),
    Inserted { count: usize },
    Updated,
    Deleted,
}

impl Payload {
    pub fn message(&self) -> Option<String> {
        match self {
            Payload::Created { table } => Some(format!("Table {} created successfully", table)),
            Payload::Inserted { count } => Some(format!("{} rows inserted successfully", count)),
            Payload::Updated => Some("Row updated successfully".to_string()),
            Payload::Deleted => Some("Row deleted successfully".to_string()),
            Payload::Rows(_) | Payload::Structure(_) => None,
        }
    }
}

/// Result of one gateway request. Never an `Err`: every failure is folded
/// into `Failure` at the gateway boundary.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Success {
        payload: Payload,
    },
    Failure {
        kind: ErrorKind,
        message: String,
        /// Rows committed before an insert failed
        inserted: Option<usize>,
    },
}

impl Outcome {
    pub fn success(payload: Payload) -> Self {
        Outcome::Success { payload }
    }

    pub fn from_error(err: &GatewayError) -> Self {
        Outcome::Failure {
            kind: err.kind(),
            message: err.to_string(),
            inserted: err.inserted_rows(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success { .. })
    }

    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            Outcome::Success { .. } => None,
            Outcome::Failure { kind, .. } => Some(*kind),
        }
    }

    pub fn payload(&self) -> Option<&Payload> {
        match self {
            Outcome::Success { payload } => Some(payload),
            Outcome::Failure { .. } => None,
        }
    }

    /// Render the response body handed back to the caller.
    pub fn to_json(&self) -> JsonValue {
        match self {
            Outcome::Success { payload } => {
                let mut body = Map::new();
                body.insert("success".into(), JsonValue::Bool(true));
                match payload {
                    Payload::Rows(rows) => {
                        body.insert("rows".into(), json!(rows));
                    }
                    Payload::Structure(columns) => {
                        body.insert("structure".into(), json!(columns));
                    }
                    Payload::Inserted { count } => {
                        body.insert("count".into(), json!(count));
                    }
                    Payload::Created { .. } | Payload::Updated | Payload::Deleted => {}
                }
                if let Some(message) = payload.message() {
                    body.insert("message".into(), JsonValue::String(message));
                }
                JsonValue::Object(body)
            }
            Outcome::Failure { kind, message, inserted } => {
                let mut body = Map::new();
                body.insert("error".into(), JsonValue::String(message.clone()));
                body.insert("kind".into(), JsonValue::String(kind.as_str().to_string()));
                if let Some(n) = inserted {
                    body.insert("inserted".into(), json!(n));
                }
                JsonValue::Object(body)
            }
        }
    }
}

impl From<GatewayError> for Outcome {
    fn from(err: GatewayError) -> Self {
        Outcome::from_error(&err)
    }
}
