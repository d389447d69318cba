//! Scalar values and row shapes shared by the gateway and the warehouses

mod table;

pub use table::{ColumnSpec, RowValues, TableName};

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// Scalar cell value.
///
/// Serialized as a bare JSON scalar so rows round-trip through the
/// presentation layer unchanged.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum Value {
    /// Null value
    Null,

    /// Boolean value
    Bool(bool),

    /// Integer value
    Integer(i64),

    /// Floating point value
    Float(f64),

    /// Text string
    Text(String),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Convert a decoded JSON value, rejecting arrays and objects.
    pub fn from_json(value: &serde_json::Value) -> Option<Self> {
        match value {
            serde_json::Value::Null => Some(Value::Null),
            serde_json::Value::Bool(b) => Some(Value::Bool(*b)),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Some(Value::Integer(i)),
                None => n.as_f64().map(Value::Float),
            },
            serde_json::Value::String(s) => Some(Value::Text(s.clone())),
            serde_json::Value::Array(_) | serde_json::Value::Object(_) => None,
        }
    }

    /// Name of the variant, used in type errors.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "NULL",
            Value::Bool(_) => "BOOLEAN",
            Value::Integer(_) => "INTEGER",
            Value::Float(_) => "FLOAT",
            Value::Text(_) => "TEXT",
        }
    }
}

impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Value::Integer(a), Value::Integer(b)) => a.partial_cmp(b),
            (Value::Float(a), Value::Float(b)) => a.partial_cmp(b),
            (Value::Text(a), Value::Text(b)) => a.partial_cmp(b),
            (Value::Bool(a), Value::Bool(b)) => a.partial_cmp(b),
            (Value::Integer(a), Value::Float(b)) => (*a as f64).partial_cmp(b),
            (Value::Float(a), Value::Integer(b)) => a.partial_cmp(&(*b as f64)),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("NULL"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Integer(i) => write!(f, "{}", i),
            Value::Float(x) => write!(f, "{}", x),
            Value::Text(s) => f.write_str(s),
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Integer(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_value_from_json() {
        assert_eq!(Value::from_json(&json!(3)), Some(Value::Integer(3)));
        assert_eq!(Value::from_json(&json!(2.5)), Some(Value::Float(2.5)));
        assert_eq!(Value::from_json(&json!("x")), Some(Value::Text("x".into())));
        assert_eq!(Value::from_json(&json!(null)), Some(Value::Null));
        assert_eq!(Value::from_json(&json!([1])), None);
    }

    #[test]
    fn test_value_serializes_as_scalar() {
        let values = vec![Value::Integer(1), Value::Text("x".into()), Value::Null, Value::Bool(true)];
        assert_eq!(serde_json::to_string(&values).unwrap(), r#"[1,"x",null,true]"#);
    }

    #[test]
    fn test_mixed_numeric_ordering() {
        assert!(Value::Integer(1) < Value::Float(1.5));
        assert_eq!(Value::Text("a".into()).partial_cmp(&Value::Integer(1)), None);
    }
}
