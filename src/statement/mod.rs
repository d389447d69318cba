//! Typed SQL statement construction
//!
//! Identifiers are interpolated into the text after normalization; data
//! values only ever travel as `?` binds. The builder has no method that
//! accepts a value as text, so a renderer cannot mix the two up.

mod ident;

pub use ident::{normalize, Ident};

use crate::types::{ColumnSpec, RowValues, TableName, Value};
use std::fmt;

/// SQL text plus its ordered bind values.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub sql: String,
    pub binds: Vec<Value>,
}

impl Statement {
    /// Statement with no binds.
    pub fn text(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            binds: Vec::new(),
        }
    }

    /// Number of `?` placeholders the statement expects to be bound.
    pub fn placeholder_count(&self) -> usize {
        self.binds.len()
    }
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.sql)
    }
}

/// WHERE-clause condition plus its ordered binds.
#[derive(Debug, Clone, PartialEq)]
pub struct Predicate {
    pub sql: String,
    pub binds: Vec<Value>,
}

/// Accumulates SQL text and binds side by side.
#[derive(Debug, Default)]
pub struct StatementBuilder {
    sql: String,
    binds: Vec<Value>,
}

impl StatementBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append fixed SQL text (keywords, punctuation).
    pub fn text(&mut self, fragment: &'static str) -> &mut Self {
        self.sql.push_str(fragment);
        self
    }

    /// Append a normalized identifier.
    pub fn ident(&mut self, ident: &Ident) -> &mut Self {
        self.sql.push_str(ident.as_str());
        self
    }

    /// Append a placeholder and record its value.
    pub fn bind(&mut self, value: Value) -> &mut Self {
        self.sql.push('?');
        self.binds.push(value);
        self
    }

    /// Append a predicate, carrying its binds in order.
    pub fn predicate(&mut self, predicate: &Predicate) -> &mut Self {
        self.sql.push_str(&predicate.sql);
        self.binds.extend(predicate.binds.iter().cloned());
        self
    }

    /// Append `items` rendered by `each`, separated by `sep`.
    pub fn list<T>(
        &mut self,
        items: impl IntoIterator<Item = T>,
        sep: &'static str,
        mut each: impl FnMut(&mut Self, T),
    ) -> &mut Self {
        for (i, item) in items.into_iter().enumerate() {
            if i > 0 {
                self.sql.push_str(sep);
            }
            each(self, item);
        }
        self
    }

    pub fn is_empty(&self) -> bool {
        self.sql.is_empty()
    }

    pub fn finish(self) -> Statement {
        Statement {
            sql: self.sql,
            binds: self.binds,
        }
    }

    pub fn into_predicate(self) -> Predicate {
        Predicate {
            sql: self.sql,
            binds: self.binds,
        }
    }
}

// ============================================================================
// Renderers
// ============================================================================

/// `CREATE OR REPLACE TABLE <T> (<C1> <TYPE1>, ...)`
pub fn create_table(table: &TableName, columns: &[ColumnSpec]) -> Statement {
    let mut b = StatementBuilder::new();
    b.text("CREATE OR REPLACE TABLE ")
        .ident(&normalize(table.as_str()))
        .text(" (")
        .list(columns, ", ", |b, col| {
            b.ident(&normalize(&col.name))
                .text(" ")
                .ident(&normalize(&col.data_type));
        })
        .text(")");
    b.finish()
}

/// `SELECT * FROM <T>`
pub fn select_all(table: &TableName) -> Statement {
    let mut b = StatementBuilder::new();
    b.text("SELECT * FROM ").ident(&normalize(table.as_str()));
    b.finish()
}

/// `DESCRIBE TABLE <T>`
pub fn describe_table(table: &TableName) -> Statement {
    let mut b = StatementBuilder::new();
    b.text("DESCRIBE TABLE ").ident(&normalize(table.as_str()));
    b.finish()
}

/// `INSERT INTO <T> (<C1>, ...) VALUES (?, ...)` built from this row's own keys.
pub fn insert_row(table: &TableName, row: &RowValues) -> Statement {
    let mut b = StatementBuilder::new();
    b.text("INSERT INTO ")
        .ident(&normalize(table.as_str()))
        .text(" (")
        .list(row.keys(), ", ", |b, col| {
            b.ident(&normalize(col));
        })
        .text(") VALUES (")
        .list(row.values(), ", ", |b, value| {
            b.bind(value.clone());
        })
        .text(")");
    b.finish()
}

/// `UPDATE <T> SET <C> = ?, ... WHERE <predicate>`; SET binds come first.
pub fn update_row(table: &TableName, patch: &RowValues, predicate: &Predicate) -> Statement {
    let mut b = StatementBuilder::new();
    b.text("UPDATE ")
        .ident(&normalize(table.as_str()))
        .text(" SET ")
        .list(patch, ", ", |b, (col, value)| {
            b.ident(&normalize(col)).text(" = ").bind(value.clone());
        })
        .text(" WHERE ")
        .predicate(predicate);
    b.finish()
}

/// `DELETE FROM <T> WHERE <predicate>`
pub fn delete_row(table: &TableName, predicate: &Predicate) -> Statement {
    let mut b = StatementBuilder::new();
    b.text("DELETE FROM ")
        .ident(&normalize(table.as_str()))
        .text(" WHERE ")
        .predicate(predicate);
    b.finish()
}

pub fn use_database(name: &str) -> Statement {
    let mut b = StatementBuilder::new();
    b.text("USE DATABASE ").ident(&normalize(name));
    b.finish()
}

pub fn use_schema(name: &str) -> Statement {
    let mut b = StatementBuilder::new();
    b.text("USE SCHEMA ").ident(&normalize(name));
    b.finish()
}

pub fn use_warehouse(name: &str) -> Statement {
    let mut b = StatementBuilder::new();
    b.text("USE WAREHOUSE ").ident(&normalize(name));
    b.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(name: &str) -> TableName {
        TableName::new(name).unwrap()
    }

    fn row(pairs: &[(&str, Value)]) -> RowValues {
        pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
    }

    #[test]
    fn test_create_table_keeps_column_order() {
        let stmt = create_table(
            &table("people"),
            &[
                ColumnSpec::new("id", "integer"),
                ColumnSpec::new("name", "varchar(255)"),
                ColumnSpec::new("active", "boolean"),
            ],
        );
        assert_eq!(
            stmt.sql,
            "CREATE OR REPLACE TABLE PEOPLE (ID INTEGER, NAME VARCHAR(255), ACTIVE BOOLEAN)"
        );
        assert!(stmt.binds.is_empty());
    }

    #[test]
    fn test_read_and_describe() {
        assert_eq!(select_all(&table("t")).sql, "SELECT * FROM T");
        assert_eq!(describe_table(&table("t")).sql, "DESCRIBE TABLE T");
    }

    #[test]
    fn test_insert_binds_values_in_column_order() {
        let stmt = insert_row(
            &table("t"),
            &row(&[("b", Value::Text("x".into())), ("a", Value::Integer(1))]),
        );
        assert_eq!(stmt.sql, "INSERT INTO T (B, A) VALUES (?, ?)");
        assert_eq!(stmt.binds, vec![Value::Text("x".into()), Value::Integer(1)]);
    }

    #[test]
    fn test_value_text_never_reaches_sql() {
        let stmt = insert_row(&table("t"), &row(&[("a", Value::Text("'; DROP TABLE T; --".into()))]));
        assert!(!stmt.sql.contains("DROP"));
        assert_eq!(stmt.placeholder_count(), 1);
    }

    #[test]
    fn test_update_orders_set_binds_before_predicate_binds() {
        let predicate = Predicate {
            sql: "ID = ? AND NAME IS NULL".into(),
            binds: vec![Value::Integer(3)],
        };
        let stmt = update_row(&table("t"), &row(&[("name", Value::Text("Ann".into()))]), &predicate);
        assert_eq!(stmt.sql, "UPDATE T SET NAME = ? WHERE ID = ? AND NAME IS NULL");
        assert_eq!(stmt.binds, vec![Value::Text("Ann".into()), Value::Integer(3)]);
    }

    #[test]
    fn test_delete_with_predicate() {
        let predicate = Predicate {
            sql: "A = ?".into(),
            binds: vec![Value::Integer(1)],
        };
        let stmt = delete_row(&table("t"), &predicate);
        assert_eq!(stmt.sql, "DELETE FROM T WHERE A = ?");
        assert_eq!(stmt.binds, vec![Value::Integer(1)]);
    }

    #[test]
    fn test_context_statements() {
        assert_eq!(use_database("analytics").sql, "USE DATABASE ANALYTICS");
        assert_eq!(use_schema("public").sql, "USE SCHEMA PUBLIC");
        assert_eq!(use_warehouse("compute_wh").sql, "USE WAREHOUSE COMPUTE_WH");
    }
}
