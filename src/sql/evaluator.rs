/// Expression evaluator - evaluates expressions against rows
///
/// Comparisons follow SQL three-valued logic: anything compared with NULL is
/// NULL, and a WHERE clause keeps a row only when it evaluates to TRUE.
use super::ast::{BinaryOperator, ColumnDef, Expr, UnaryOperator};
use crate::error::{GatewayError, Result};
use crate::types::Value;
use std::cmp::Ordering;

/// One stored row viewed through its table's column list
#[derive(Debug, Clone, Copy)]
pub struct RowContext<'a> {
    pub columns: &'a [ColumnDef],
    pub values: &'a [Value],
}

impl<'a> RowContext<'a> {
    pub fn new(columns: &'a [ColumnDef], values: &'a [Value]) -> Self {
        Self { columns, values }
    }

    fn get(&self, name: &str) -> Option<&'a Value> {
        self.columns
            .iter()
            .position(|c| c.name == name)
            .and_then(|i| self.values.get(i))
    }
}

pub struct ExprEvaluator<'a> {
    binds: &'a [Value],
}

impl<'a> ExprEvaluator<'a> {
    pub fn new(binds: &'a [Value]) -> Self {
        Self { binds }
    }

    /// Evaluate an expression against a row
    pub fn eval(&self, expr: &Expr, row: &RowContext<'_>) -> Result<Value> {
        match expr {
            Expr::Column(name) => row
                .get(name)
                .cloned()
                .ok_or_else(|| GatewayError::ColumnNotFound(name.clone())),

            Expr::Literal(val) => Ok(val.clone()),

            Expr::Placeholder(index) => self.binds.get(*index).cloned().ok_or_else(|| {
                GatewayError::Execution(format!("no value bound for placeholder {}", index + 1))
            }),

            Expr::BinaryOp { left, op, right } => {
                let left_val = self.eval(left, row)?;
                let right_val = self.eval(right, row)?;
                self.eval_binary_op(op, left_val, right_val)
            }

            Expr::UnaryOp { op, expr } => {
                let val = self.eval(expr, row)?;
                self.eval_unary_op(op, val)
            }

            Expr::IsNull { expr, negated } => {
                let val = self.eval(expr, row)?;
                let is_null = val.is_null();
                Ok(Value::Bool(if *negated { !is_null } else { is_null }))
            }
        }
    }

    /// Evaluate an expression with no row in scope (INSERT values)
    pub fn eval_constant(&self, expr: &Expr) -> Result<Value> {
        self.eval(expr, &RowContext::new(&[], &[]))
    }

    /// WHERE semantics: only TRUE keeps the row
    pub fn matches(&self, predicate: Option<&Expr>, row: &RowContext<'_>) -> Result<bool> {
        match predicate {
            None => Ok(true),
            Some(expr) => Ok(matches!(self.to_truth(&self.eval(expr, row)?)?, Some(true))),
        }
    }

    fn eval_binary_op(&self, op: &BinaryOperator, left: Value, right: Value) -> Result<Value> {
        match op {
            BinaryOperator::And => {
                let l = self.to_truth(&left)?;
                let r = self.to_truth(&right)?;
                Ok(match (l, r) {
                    (Some(false), _) | (_, Some(false)) => Value::Bool(false),
                    (Some(true), Some(true)) => Value::Bool(true),
                    _ => Value::Null,
                })
            }

            BinaryOperator::Or => {
                let l = self.to_truth(&left)?;
                let r = self.to_truth(&right)?;
                Ok(match (l, r) {
                    (Some(true), _) | (_, Some(true)) => Value::Bool(true),
                    (Some(false), Some(false)) => Value::Bool(false),
                    _ => Value::Null,
                })
            }

            _ if left.is_null() || right.is_null() => Ok(Value::Null),

            BinaryOperator::Eq => Ok(Value::Bool(compare(&left, &right)? == Some(Ordering::Equal))),
            BinaryOperator::Ne => Ok(Value::Bool(compare(&left, &right)? != Some(Ordering::Equal))),
            BinaryOperator::Lt => Ok(Value::Bool(compare(&left, &right)? == Some(Ordering::Less))),
            BinaryOperator::Gt => Ok(Value::Bool(compare(&left, &right)? == Some(Ordering::Greater))),
            BinaryOperator::Le => Ok(Value::Bool(matches!(
                compare(&left, &right)?,
                Some(Ordering::Less | Ordering::Equal)
            ))),
            BinaryOperator::Ge => Ok(Value::Bool(matches!(
                compare(&left, &right)?,
                Some(Ordering::Greater | Ordering::Equal)
            ))),

            BinaryOperator::Add => self.arithmetic(left, right, "add", i64::checked_add, |l, r| l + r),
            BinaryOperator::Sub => self.arithmetic(left, right, "subtract", i64::checked_sub, |l, r| l - r),
            BinaryOperator::Mul => self.arithmetic(left, right, "multiply", i64::checked_mul, |l, r| l * r),
            BinaryOperator::Div => self.div_values(left, right),
        }
    }

    fn eval_unary_op(&self, op: &UnaryOperator, val: Value) -> Result<Value> {
        match op {
            UnaryOperator::Not => Ok(match self.to_truth(&val)? {
                Some(b) => Value::Bool(!b),
                None => Value::Null,
            }),
            UnaryOperator::Minus => match val {
                Value::Null => Ok(Value::Null),
                Value::Integer(i) => Ok(Value::Integer(-i)),
                Value::Float(f) => Ok(Value::Float(-f)),
                other => Err(GatewayError::TypeError(format!(
                    "Cannot negate {} value", other.type_name()
                ))),
            },
            UnaryOperator::Plus => Ok(val),
        }
    }

    // Helper functions

    /// Boolean with NULL as unknown
    fn to_truth(&self, val: &Value) -> Result<Option<bool>> {
        match val {
            Value::Null => Ok(None),
            Value::Bool(b) => Ok(Some(*b)),
            other => Err(GatewayError::TypeError(format!(
                "Boolean expected, got {}", other.type_name()
            ))),
        }
    }

    fn arithmetic(
        &self,
        left: Value,
        right: Value,
        verb: &str,
        int_op: fn(i64, i64) -> Option<i64>,
        float_op: fn(f64, f64) -> f64,
    ) -> Result<Value> {
        match (left, right) {
            (Value::Integer(l), Value::Integer(r)) => int_op(l, r)
                .map(Value::Integer)
                .ok_or_else(|| GatewayError::Execution("Numeric value out of range".to_string())),
            (l, r) => match (to_f64(&l), to_f64(&r)) {
                (Some(l), Some(r)) => Ok(Value::Float(float_op(l, r))),
                _ => Err(GatewayError::TypeError(format!(
                    "Cannot {} {} and {}", verb, l.type_name(), r.type_name()
                ))),
            },
        }
    }

    fn div_values(&self, left: Value, right: Value) -> Result<Value> {
        match (to_f64(&left), to_f64(&right)) {
            (Some(_), Some(r)) if r == 0.0 => Err(GatewayError::Execution("Division by zero".to_string())),
            (Some(l), Some(r)) => Ok(Value::Float(l / r)),
            _ => Err(GatewayError::TypeError(format!(
                "Cannot divide {} by {}", left.type_name(), right.type_name()
            ))),
        }
    }
}

fn to_f64(val: &Value) -> Option<f64> {
    match val {
        Value::Integer(i) => Some(*i as f64),
        Value::Float(f) => Some(*f),
        _ => None,
    }
}

/// Order two non-null values, coercing text to the other side's type when the
/// types differ. `None` means incomparable within a type (NaN).
fn compare(left: &Value, right: &Value) -> Result<Option<Ordering>> {
    if let Some(ordering) = left.partial_cmp(right) {
        return Ok(Some(ordering));
    }
    let coerced = match (left, right) {
        (Value::Text(s), other) | (other, Value::Text(s)) => {
            let parsed = match other {
                Value::Integer(_) | Value::Float(_) => s.trim().parse::<f64>().ok().map(Value::Float),
                Value::Bool(_) => parse_bool(s).map(Value::Bool),
                _ => None,
            };
            parsed.map(|p| if matches!(left, Value::Text(_)) { (p, right.clone()) } else { (left.clone(), p) })
        }
        _ => None,
    };
    match coerced {
        Some((l, r)) => Ok(l.partial_cmp(&r)),
        None if same_type(left, right) => Ok(None),
        None => Err(GatewayError::TypeError(format!(
            "Cannot compare {} with {}", left.type_name(), right.type_name()
        ))),
    }
}

fn same_type(left: &Value, right: &Value) -> bool {
    std::mem::discriminant(left) == std::mem::discriminant(right)
        || (to_f64(left).is_some() && to_f64(right).is_some())
}

pub(crate) fn parse_bool(s: &str) -> Option<bool> {
    match s.trim().to_ascii_lowercase().as_str() {
        "true" | "t" | "yes" | "y" | "on" | "1" => Some(true),
        "false" | "f" | "no" | "n" | "off" | "0" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sql::ast::{DataType, TypeKind};
    use crate::sql::lexer::Lexer;
    use crate::sql::parser::Parser;
    use crate::sql::ast::Statement;

    fn columns() -> Vec<ColumnDef> {
        vec![
            ColumnDef { name: "ID".into(), data_type: DataType::new(TypeKind::Integer), nullable: true },
            ColumnDef { name: "NAME".into(), data_type: DataType::new(TypeKind::Text), nullable: true },
        ]
    }

    fn where_clause(predicate: &str) -> Expr {
        let sql = format!("SELECT * FROM t WHERE {}", predicate);
        let tokens = Lexer::new(&sql).tokenize().unwrap();
        match Parser::new(tokens).parse().unwrap() {
            Statement::Select(select) => select.where_clause.unwrap(),
            _ => unreachable!(),
        }
    }

    fn keeps(predicate: &str, binds: &[Value], values: &[Value]) -> bool {
        let cols = columns();
        let expr = where_clause(predicate);
        ExprEvaluator::new(binds)
            .matches(Some(&expr), &RowContext::new(&cols, values))
            .unwrap()
    }

    #[test]
    fn test_equality_with_binds() {
        let row = [Value::Integer(3), Value::Text("Ann".into())];
        assert!(keeps("ID = ? AND NAME = ?", &[Value::Integer(3), "Ann".into()], &row));
        assert!(!keeps("ID = ?", &[Value::Integer(4)], &row));
        // numeric equality across integer and float
        assert!(keeps("ID = ?", &[Value::Float(3.0)], &row));
    }

    #[test]
    fn test_null_comparisons_are_unknown() {
        let row = [Value::Integer(3), Value::Null];
        assert!(!keeps("NAME = ?", &[Value::Null], &row));
        assert!(!keeps("NOT (NAME = 'x')", &[], &row));
        assert!(keeps("NAME IS NULL", &[], &row));
        assert!(keeps("ID = 3 AND NAME IS NULL", &[], &row));
        assert!(!keeps("NAME IS NOT NULL", &[], &row));
    }

    #[test]
    fn test_three_valued_or() {
        let row = [Value::Integer(3), Value::Null];
        assert!(keeps("NAME = 'x' OR ID = 3", &[], &row));
        assert!(!keeps("NAME = 'x' OR ID = 4", &[], &row));
    }

    #[test]
    fn test_text_coerces_against_numbers() {
        let row = [Value::Integer(10), Value::Text("a".into())];
        assert!(keeps("ID = '10'", &[], &row));
        assert!(keeps("ID > 9.5", &[], &row));
    }

    #[test]
    fn test_missing_bind_is_error() {
        let cols = columns();
        let expr = where_clause("ID = ?");
        let row = [Value::Integer(1), Value::Null];
        assert!(ExprEvaluator::new(&[]).matches(Some(&expr), &RowContext::new(&cols, &row)).is_err());
    }

    #[test]
    fn test_unknown_column() {
        let cols = columns();
        let expr = where_clause("AGE = 1");
        let row = [Value::Integer(1), Value::Null];
        let err = ExprEvaluator::new(&[]).matches(Some(&expr), &RowContext::new(&cols, &row)).unwrap_err();
        assert!(matches!(err, GatewayError::ColumnNotFound(ref c) if c == "AGE"));
    }

    #[test]
    fn test_arithmetic() {
        let eval = ExprEvaluator::new(&[]);
        let expr = where_clause("1 + 2 * 3");
        assert_eq!(eval.eval_constant(&expr).unwrap(), Value::Integer(7));
        let expr = where_clause("1 / 0");
        assert!(eval.eval_constant(&expr).is_err());
    }
}
