/// Table-level request shapes: table names, column specs and rows
use super::Value;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Ordered column name -> value mapping.
///
/// Key order is the order the caller supplied (or the warehouse returned);
/// statement builders walk it once so column lists and bind lists agree.
pub type RowValues = IndexMap<String, Value>;

/// User-supplied table name, guaranteed non-empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TableName(String);

impl TableName {
    pub fn new(name: impl Into<String>) -> Option<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            None
        } else {
            Some(Self(name))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for TableName {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        TableName::new(value).ok_or_else(|| "table name must not be empty".to_string())
    }
}

impl From<TableName> for String {
    fn from(value: TableName) -> Self {
        value.0
    }
}

impl fmt::Display for TableName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Column to create: name plus a warehouse type expression.
///
/// The type is not validated here; the warehouse rejects unknown types at
/// execution time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnSpec {
    pub name: String,
    #[serde(rename = "type")]
    pub data_type: String,
}

impl ColumnSpec {
    pub fn new(name: impl Into<String>, data_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into(),
        }
    }

    pub fn is_complete(&self) -> bool {
        !self.name.trim().is_empty() && !self.data_type.trim().is_empty()
    }
}
