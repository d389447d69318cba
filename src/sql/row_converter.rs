/// Conversion of evaluated values into stored column values
use super::ast::{ColumnDef, TypeKind};
use super::evaluator::parse_bool;
use crate::error::{GatewayError, Result};
use crate::types::Value;

/// Coerce a value to the storage class of `column`.
///
/// Numbers stored into text columns keep their decimal rendering; text is
/// parsed when stored into numeric or boolean columns.
pub fn coerce_value(value: Value, column: &ColumnDef) -> Result<Value> {
    if value.is_null() {
        if !column.nullable {
            return Err(GatewayError::Execution(format!(
                "NULL result in a non-nullable column {}", column.name
            )));
        }
        return Ok(Value::Null);
    }

    let mismatch = |value: &Value| {
        GatewayError::TypeError(format!(
            "{} value '{}' is not recognized for column {} of type {}",
            value.type_name(), value, column.name, column.data_type
        ))
    };

    match column.data_type.kind {
        TypeKind::Integer => match value {
            Value::Integer(_) => Ok(value),
            Value::Float(f) if f.fract() == 0.0 && f.abs() < i64::MAX as f64 => Ok(Value::Integer(f as i64)),
            Value::Text(ref s) => s.trim().parse::<i64>().map(Value::Integer).map_err(|_| mismatch(&value)),
            Value::Bool(b) => Ok(Value::Integer(i64::from(b))),
            _ => Err(mismatch(&value)),
        },
        TypeKind::Float => match value {
            Value::Float(_) => Ok(value),
            Value::Integer(i) => Ok(Value::Float(i as f64)),
            Value::Text(ref s) => s.trim().parse::<f64>().map(Value::Float).map_err(|_| mismatch(&value)),
            _ => Err(mismatch(&value)),
        },
        TypeKind::Boolean => match value {
            Value::Bool(_) => Ok(value),
            Value::Integer(i) => Ok(Value::Bool(i != 0)),
            Value::Text(ref s) => parse_bool(s).map(Value::Bool).ok_or_else(|| mismatch(&value)),
            _ => Err(mismatch(&value)),
        },
        TypeKind::Text => {
            let text = match value {
                Value::Text(s) => s,
                other => other.to_string(),
            };
            if let Some(limit) = column.data_type.length {
                if text.chars().count() as u64 > limit {
                    return Err(GatewayError::Execution(format!(
                        "String '{}' is too long and would be truncated", text
                    )));
                }
            }
            Ok(Value::Text(text))
        }
        // Temporal values are kept in their literal text form
        TypeKind::Date | TypeKind::Timestamp => match value {
            Value::Text(_) => Ok(value),
            _ => Err(mismatch(&value)),
        },
    }
}

/// Build a full stored row from `(column index, value)` assignments;
/// unassigned columns are NULL.
pub fn build_row(columns: &[ColumnDef], assignments: Vec<(usize, Value)>) -> Result<Vec<Value>> {
    let mut row = vec![Value::Null; columns.len()];
    let mut assigned = vec![false; columns.len()];
    for (index, value) in assignments {
        row[index] = coerce_value(value, &columns[index])?;
        assigned[index] = true;
    }
    for (index, column) in columns.iter().enumerate() {
        if !assigned[index] && !column.nullable {
            return Err(GatewayError::Execution(format!(
                "NULL result in a non-nullable column {}", column.name
            )));
        }
    }
    Ok(row)
}
