//! Row identity resolution
//!
//! Tables handled by the gateway have no declared key, so "row N" is turned
//! into a predicate that matches every column of that row by value. Rows are
//! numbered in the order an unordered `SELECT *` returns them.
//!
//! Two rows with identical values are indistinguishable: a mutation aimed at
//! one of them hits all of them. The snapshot and the mutating statement are
//! separate round-trips, so a concurrent writer can shift the numbering
//! between them.

use crate::error::{GatewayError, Result};
use crate::session::Session;
use crate::statement::{self, normalize, Predicate, StatementBuilder};
use crate::types::{RowValues, TableName};
use tracing::debug;

/// Read every row of `table` in warehouse order.
pub async fn snapshot(session: &mut Session, table: &TableName) -> Result<Vec<RowValues>> {
    let result = session.execute(&statement::select_all(table)).await?;
    Ok(result.into_records())
}

/// Pick the row at `row_index`, or fail with `RowIndexOutOfRange`.
pub fn select_target(rows: Vec<RowValues>, row_index: u64) -> Result<RowValues> {
    let row_count = rows.len();
    usize::try_from(row_index)
        .ok()
        .and_then(|i| rows.into_iter().nth(i))
        .ok_or(GatewayError::RowIndexOutOfRange { index: row_index, row_count })
}

/// Build the value-equality predicate for one row.
///
/// NULL cells become `<COL> IS NULL` with no bind, since `= NULL` never
/// matches; every other cell becomes `<COL> = ?` with its value bound.
pub fn derive_predicate(row: &RowValues) -> Result<Predicate> {
    if row.is_empty() {
        return Err(GatewayError::Execution(
            "target row has no columns and cannot be identified".to_string(),
        ));
    }

    let mut b = StatementBuilder::new();
    b.list(row, " AND ", |b, (column, value)| {
        b.ident(&normalize(column));
        if value.is_null() {
            b.text(" IS NULL");
        } else {
            b.text(" = ").bind(value.clone());
        }
    });
    Ok(b.into_predicate())
}

/// Snapshot the table and derive the predicate for row `row_index`.
///
/// Fails before any mutating statement is built when the index is out of range.
pub async fn resolve(session: &mut Session, table: &TableName, row_index: u64) -> Result<Predicate> {
    let rows = snapshot(session, table).await?;
    debug!(table = %table, row_index, row_count = rows.len(), "resolving row identity");
    let target = select_target(rows, row_index)?;
    derive_predicate(&target)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Value;

    fn row(pairs: &[(&str, Value)]) -> RowValues {
        pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
    }

    #[test]
    fn test_predicate_with_null_column() {
        let predicate = derive_predicate(&row(&[("ID", Value::Integer(3)), ("NAME", Value::Null)])).unwrap();
        assert_eq!(predicate.sql, "ID = ? AND NAME IS NULL");
        assert_eq!(predicate.binds, vec![Value::Integer(3)]);
    }

    #[test]
    fn test_predicate_binds_follow_fragment_order() {
        let predicate = derive_predicate(&row(&[
            ("b", Value::from("x")),
            ("a", Value::Null),
            ("c", Value::Float(1.5)),
        ]))
        .unwrap();
        assert_eq!(predicate.sql, "B = ? AND A IS NULL AND C = ?");
        assert_eq!(predicate.binds, vec![Value::from("x"), Value::Float(1.5)]);
    }

    #[test]
    fn test_all_null_row_has_no_binds() {
        let predicate = derive_predicate(&row(&[("A", Value::Null), ("B", Value::Null)])).unwrap();
        assert_eq!(predicate.sql, "A IS NULL AND B IS NULL");
        assert!(predicate.binds.is_empty());
    }

    #[test]
    fn test_empty_row_cannot_be_identified() {
        let err = derive_predicate(&RowValues::new()).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::ExecutionError);
    }

    #[test]
    fn test_select_target_bounds() {
        let rows = vec![row(&[("A", Value::Integer(1))]), row(&[("A", Value::Integer(2))])];
        assert_eq!(select_target(rows.clone(), 1).unwrap()["A"], Value::Integer(2));
        match select_target(rows.clone(), 2) {
            Err(GatewayError::RowIndexOutOfRange { index, row_count }) => {
                assert_eq!(index, 2);
                assert_eq!(row_count, 2);
            }
            other => panic!("unexpected: {:?}", other),
        }
        assert!(select_target(Vec::new(), 0).is_err());
        assert!(select_target(rows, u64::MAX).is_err());
    }
}
