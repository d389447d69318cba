//! Warehouse connector seam
//!
//! The session manager only ever talks to a warehouse through these two
//! traits. `Connector` performs the handshake; the returned
//! `WarehouseSession` executes statements sequentially and is closed exactly
//! once by its owner.
//!
//! - `snowflake`: the remote warehouse over its HTTPS session API
//! - `local`: the embedded in-process warehouse (see [`crate::sql`])

pub mod local;
pub mod snowflake;

pub use local::LocalWarehouse;
pub use snowflake::SnowflakeConnector;

use crate::error::Result;
use crate::statement::Statement;
use crate::types::{RowValues, Value};
use async_trait::async_trait;

/// Query result
#[derive(Debug, Clone, PartialEq)]
pub enum QueryResult {
    /// Row-returning result (SELECT, DESCRIBE, and DML summaries on warehouses that report them as rows)
    Select {
        columns: Vec<String>,
        rows: Vec<Vec<Value>>,
    },

    /// INSERT/UPDATE/DELETE result
    Modification {
        affected_rows: usize,
    },

    /// CREATE/USE result
    Definition {
        message: String,
    },
}

impl QueryResult {
    pub fn affected_rows(&self) -> usize {
        match self {
            QueryResult::Modification { affected_rows } => *affected_rows,
            _ => 0,
        }
    }

    /// Rows as ordered column -> value maps, in the order the warehouse returned them.
    /// Empty for non-row results.
    pub fn into_records(self) -> Vec<RowValues> {
        match self {
            QueryResult::Select { columns, rows } => rows
                .into_iter()
                .map(|row| columns.iter().cloned().zip(row).collect())
                .collect(),
            _ => Vec::new(),
        }
    }

    pub fn row_count(&self) -> usize {
        match self {
            QueryResult::Select { rows, .. } => rows.len(),
            QueryResult::Modification { affected_rows } => *affected_rows,
            _ => 0,
        }
    }
}

/// Opens warehouse sessions.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Perform the authentication handshake and return an open session.
    async fn connect(&self) -> Result<Box<dyn WarehouseSession>>;

    /// Short backend name for logs.
    fn name(&self) -> &'static str;
}

/// One open connection. Statements are issued strictly one at a time.
#[async_trait]
pub trait WarehouseSession: Send {
    async fn execute(&mut self, statement: &Statement) -> Result<QueryResult>;

    /// Tear the session down. Called exactly once by the owner.
    async fn close(&mut self) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_into_records_keeps_column_order() {
        let result = QueryResult::Select {
            columns: vec!["B".into(), "A".into()],
            rows: vec![vec![Value::Integer(2), Value::Null]],
        };
        let records = result.into_records();
        assert_eq!(records.len(), 1);
        let keys: Vec<_> = records[0].keys().cloned().collect();
        assert_eq!(keys, vec!["B", "A"]);
        assert_eq!(records[0]["A"], Value::Null);
    }

    #[test]
    fn test_non_row_results() {
        assert!(QueryResult::Modification { affected_rows: 2 }.into_records().is_empty());
        assert_eq!(QueryResult::Modification { affected_rows: 2 }.row_count(), 2);
        assert_eq!(QueryResult::Definition { message: "ok".into() }.affected_rows(), 0);
    }
}
