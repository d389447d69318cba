//! Operation requests and their JSON decoding
//!
//! Payloads arrive as loosely-typed JSON objects. Field names are matched
//! case-insensitively, and the legacy names `tableName`, `data` and
//! `row_index` are accepted for `table`, `patch` and `rowIndex`.

use crate::error::{GatewayError, Result};
use crate::types::{ColumnSpec, RowValues, TableName, Value};
use serde::{Deserialize, Serialize};
use serde_json::Map;
use std::fmt;
use std::str::FromStr;

/// Operation selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verb {
    Create,
    Read,
    Describe,
    Insert,
    Update,
    Delete,
}

impl Verb {
    pub const ALL: [Verb; 6] = [
        Verb::Create,
        Verb::Read,
        Verb::Describe,
        Verb::Insert,
        Verb::Update,
        Verb::Delete,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Verb::Create => "create",
            Verb::Read => "read",
            Verb::Describe => "describe",
            Verb::Insert => "insert",
            Verb::Update => "update",
            Verb::Delete => "delete",
        }
    }
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Verb {
    type Err = GatewayError;

    fn from_str(s: &str) -> Result<Self> {
        let lowered = s.trim().to_ascii_lowercase();
        Verb::ALL
            .into_iter()
            .find(|v| v.as_str() == lowered)
            .ok_or_else(|| {
                GatewayError::Validation(format!(
                    "unknown operation '{}' (expected one of: create, read, describe, insert, update, delete)",
                    s
                ))
            })
    }
}

/// One declarative table operation.
#[derive(Debug, Clone, PartialEq)]
pub enum OperationRequest {
    CreateTable {
        table: TableName,
        columns: Vec<ColumnSpec>,
    },
    ReadTable {
        table: TableName,
    },
    DescribeTable {
        table: TableName,
    },
    InsertRows {
        table: TableName,
        rows: Vec<RowValues>,
    },
    UpdateRow {
        table: TableName,
        row_index: u64,
        patch: RowValues,
    },
    DeleteRow {
        table: TableName,
        row_index: u64,
    },
}

impl OperationRequest {
    pub fn verb(&self) -> Verb {
        match self {
            Self::CreateTable { .. } => Verb::Create,
            Self::ReadTable { .. } => Verb::Read,
            Self::DescribeTable { .. } => Verb::Describe,
            Self::InsertRows { .. } => Verb::Insert,
            Self::UpdateRow { .. } => Verb::Update,
            Self::DeleteRow { .. } => Verb::Delete,
        }
    }

    pub fn table(&self) -> &TableName {
        match self {
            Self::CreateTable { table, .. }
            | Self::ReadTable { table }
            | Self::DescribeTable { table }
            | Self::InsertRows { table, .. }
            | Self::UpdateRow { table, .. }
            | Self::DeleteRow { table, .. } => table,
        }
    }

    /// Check the request shape. Runs before any session is opened.
    pub fn validate(&self) -> Result<()> {
        match self {
            Self::CreateTable { columns, .. } => {
                if columns.is_empty() {
                    return Err(GatewayError::Validation("Table name and columns are required".to_string()));
                }
                if let Some(pos) = columns.iter().position(|c| !c.is_complete()) {
                    return Err(GatewayError::Validation(format!(
                        "column {} needs both a name and a type",
                        pos + 1
                    )));
                }
            }
            Self::InsertRows { rows, .. } => {
                if rows.is_empty() {
                    return Err(GatewayError::Validation("Rows data is required".to_string()));
                }
                if let Some(pos) = rows.iter().position(|r| r.is_empty()) {
                    return Err(GatewayError::Validation(format!("row {} has no columns", pos + 1)));
                }
            }
            Self::UpdateRow { patch, .. } => {
                if patch.is_empty() {
                    return Err(GatewayError::Validation("Update data is required".to_string()));
                }
            }
            Self::ReadTable { .. } | Self::DescribeTable { .. } | Self::DeleteRow { .. } => {}
        }
        Ok(())
    }

    /// Decode a payload for a known verb.
    pub fn from_json(verb: Verb, payload: &serde_json::Value) -> Result<Self> {
        let fields = Fields::new(payload)?;
        let table = fields.table()?;

        let request = match verb {
            Verb::Create => Self::CreateTable {
                table,
                columns: fields.columns()?,
            },
            Verb::Read => Self::ReadTable { table },
            Verb::Describe => Self::DescribeTable { table },
            Verb::Insert => Self::InsertRows {
                table,
                rows: fields.rows()?,
            },
            Verb::Update => Self::UpdateRow {
                table,
                row_index: fields.row_index()?,
                patch: fields.patch()?,
            },
            Verb::Delete => Self::DeleteRow {
                table,
                row_index: fields.row_index()?,
            },
        };
        request.validate()?;
        Ok(request)
    }

    /// Decode `{"op": "<verb>", ...fields}` (`operation` is accepted too).
    pub fn from_envelope(payload: &serde_json::Value) -> Result<Self> {
        let fields = Fields::new(payload)?;
        let verb = fields
            .get(&["op", "operation"])
            .and_then(|v| v.as_str())
            .ok_or_else(|| GatewayError::Validation("operation is required".to_string()))?
            .parse::<Verb>()?;
        Self::from_json(verb, payload)
    }
}

/// Case-insensitive view over a JSON object
struct Fields<'a> {
    object: &'a Map<String, serde_json::Value>,
}

impl<'a> Fields<'a> {
    fn new(payload: &'a serde_json::Value) -> Result<Self> {
        payload
            .as_object()
            .map(|object| Self { object })
            .ok_or_else(|| GatewayError::Validation("request payload must be a JSON object".to_string()))
    }

    /// First present, non-null field among `names`
    fn get(&self, names: &[&str]) -> Option<&'a serde_json::Value> {
        names.iter().find_map(|name| {
            self.object
                .iter()
                .find(|(key, value)| key.eq_ignore_ascii_case(name) && !value.is_null())
                .map(|(_, value)| value)
        })
    }

    fn table(&self) -> Result<TableName> {
        self.get(&["table", "tableName", "table_name"])
            .and_then(|v| v.as_str())
            .and_then(TableName::new)
            .ok_or_else(|| GatewayError::Validation("Table name is required".to_string()))
    }

    fn columns(&self) -> Result<Vec<ColumnSpec>> {
        let list = self
            .get(&["columns"])
            .and_then(|v| v.as_array())
            .ok_or_else(|| GatewayError::Validation("Table name and columns are required".to_string()))?;

        list.iter()
            .enumerate()
            .map(|(i, column)| {
                let column = Fields::new(column)
                    .map_err(|_| GatewayError::Validation(format!("column {} must be an object", i + 1)))?;
                let text = |names: &[&str]| {
                    column
                        .get(names)
                        .and_then(|v| v.as_str())
                        .unwrap_or_default()
                        .to_string()
                };
                Ok(ColumnSpec::new(text(&["name"]), text(&["type", "dataType", "data_type"])))
            })
            .collect()
    }

    fn rows(&self) -> Result<Vec<RowValues>> {
        let list = self
            .get(&["rows"])
            .and_then(|v| v.as_array())
            .ok_or_else(|| GatewayError::Validation("Rows data is required".to_string()))?;

        list.iter()
            .enumerate()
            .map(|(i, row)| row_values(row).map_err(|e| prefix(e, &format!("row {}", i + 1))))
            .collect()
    }

    fn patch(&self) -> Result<RowValues> {
        let patch = self
            .get(&["patch", "data"])
            .ok_or_else(|| GatewayError::Validation("Update data is required".to_string()))?;
        row_values(patch).map_err(|e| prefix(e, "patch"))
    }

    fn row_index(&self) -> Result<u64> {
        let invalid = || GatewayError::Validation("rowIndex must be a non-negative integer".to_string());
        match self.get(&["rowIndex", "row_index"]) {
            Some(serde_json::Value::Number(n)) => n.as_u64().ok_or_else(invalid),
            Some(serde_json::Value::String(s)) => s.trim().parse::<u64>().map_err(|_| invalid()),
            Some(_) => Err(invalid()),
            None => Err(GatewayError::Validation("rowIndex is required".to_string())),
        }
    }
}

/// Decode one `{column: scalar}` object, keeping key order.
fn row_values(value: &serde_json::Value) -> Result<RowValues> {
    let object = value
        .as_object()
        .ok_or_else(|| GatewayError::Validation("must be an object of column values".to_string()))?;

    object
        .iter()
        .map(|(column, cell)| {
            Value::from_json(cell)
                .map(|v| (column.clone(), v))
                .ok_or_else(|| GatewayError::Validation(format!("column '{}' must hold a scalar value", column)))
        })
        .collect()
}

fn prefix(err: GatewayError, what: &str) -> GatewayError {
    match err {
        GatewayError::Validation(msg) => GatewayError::Validation(format!("{} {}", what, msg)),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_verb_parsing() {
        assert_eq!("Insert".parse::<Verb>().unwrap(), Verb::Insert);
        assert_eq!(" describe ".parse::<Verb>().unwrap(), Verb::Describe);
        assert!("drop".parse::<Verb>().is_err());
    }

    #[test]
    fn test_create_with_legacy_names() {
        let request = OperationRequest::from_json(
            Verb::Create,
            &json!({"tableName": "people", "columns": [{"name": "id", "type": "integer"}]}),
        )
        .unwrap();
        match request {
            OperationRequest::CreateTable { table, columns } => {
                assert_eq!(table.as_str(), "people");
                assert_eq!(columns, vec![ColumnSpec::new("id", "integer")]);
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_field_names_are_case_insensitive() {
        let request = OperationRequest::from_json(
            Verb::Update,
            &json!({"TABLE": "t", "RowIndex": 2, "Data": {"name": "x"}}),
        )
        .unwrap();
        assert_eq!(request.verb(), Verb::Update);
        match request {
            OperationRequest::UpdateRow { row_index, patch, .. } => {
                assert_eq!(row_index, 2);
                assert_eq!(patch["name"], Value::from("x"));
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_row_key_order_preserved() {
        let request = OperationRequest::from_json(
            Verb::Insert,
            &json!({"table": "t", "rows": [{"b": 1, "a": null}, {"c": "x"}]}),
        )
        .unwrap();
        match request {
            OperationRequest::InsertRows { rows, .. } => {
                let keys: Vec<_> = rows[0].keys().cloned().collect();
                assert_eq!(keys, vec!["b", "a"]);
                assert_eq!(rows[0]["a"], Value::Null);
                assert_eq!(rows[1].len(), 1);
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_validation_failures() {
        let cases = [
            (Verb::Read, json!({})),
            (Verb::Read, json!({"table": "  "})),
            (Verb::Create, json!({"table": "t", "columns": []})),
            (Verb::Create, json!({"table": "t", "columns": [{"name": "a"}]})),
            (Verb::Insert, json!({"table": "t", "rows": []})),
            (Verb::Insert, json!({"table": "t"})),
            (Verb::Insert, json!({"table": "t", "rows": [{}]})),
            (Verb::Insert, json!({"table": "t", "rows": [{"a": [1, 2]}]})),
            (Verb::Update, json!({"table": "t", "rowIndex": 0, "patch": {}})),
            (Verb::Update, json!({"table": "t", "rowIndex": -1, "patch": {"a": 1}})),
            (Verb::Delete, json!({"table": "t", "rowIndex": 1.5})),
            (Verb::Delete, json!({"table": "t"})),
            (Verb::Read, json!("not an object")),
        ];
        for (verb, payload) in cases {
            let err = OperationRequest::from_json(verb, &payload).unwrap_err();
            assert_eq!(err.kind(), crate::error::ErrorKind::ValidationError, "{} {}", verb, payload);
        }
    }

    #[test]
    fn test_row_index_accepts_numeric_string() {
        let request = OperationRequest::from_json(Verb::Delete, &json!({"table": "t", "row_index": "3"})).unwrap();
        assert_eq!(request, OperationRequest::DeleteRow { table: TableName::new("t").unwrap(), row_index: 3 });
    }

    #[test]
    fn test_envelope() {
        let request = OperationRequest::from_envelope(&json!({"op": "read", "table": "t"})).unwrap();
        assert_eq!(request.verb(), Verb::Read);
        let request = OperationRequest::from_envelope(&json!({"operation": "DESCRIBE", "table": "t"})).unwrap();
        assert_eq!(request.verb(), Verb::Describe);
        assert!(OperationRequest::from_envelope(&json!({"table": "t"})).is_err());
    }
}
