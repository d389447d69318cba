/// Abstract Syntax Tree for the embedded warehouse dialect
use crate::types::Value;
use std::fmt;

/// Top-level SQL statement
#[derive(Debug, Clone)]
pub enum Statement {
    Select(SelectStmt),
    Insert(InsertStmt),
    Update(UpdateStmt),
    Delete(DeleteStmt),
    CreateTable(CreateTableStmt),
    DescribeTable(String),  // table name
    Use(UseStmt),
}

/// SELECT statement
#[derive(Debug, Clone)]
pub struct SelectStmt {
    pub columns: Vec<SelectColumn>,
    pub from: String,
    pub where_clause: Option<Expr>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SelectColumn {
    Star,           // *
    Column(String), // column_name
}

/// INSERT statement
#[derive(Debug, Clone)]
pub struct InsertStmt {
    pub table: String,
    pub columns: Option<Vec<String>>,  // None means all columns
    pub values: Vec<Vec<Expr>>,        // Multiple rows
}

/// UPDATE statement
#[derive(Debug, Clone)]
pub struct UpdateStmt {
    pub table: String,
    pub assignments: Vec<(String, Expr)>,  // column = expr
    pub where_clause: Option<Expr>,
}

/// DELETE statement
#[derive(Debug, Clone)]
pub struct DeleteStmt {
    pub table: String,
    pub where_clause: Option<Expr>,
}

/// CREATE TABLE statement
#[derive(Debug, Clone)]
pub struct CreateTableStmt {
    pub table: String,
    pub columns: Vec<ColumnDef>,
    pub or_replace: bool,
    pub if_not_exists: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ColumnDef {
    pub name: String,
    pub data_type: DataType,
    pub nullable: bool,
}

/// Storage class of a column
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeKind {
    Integer,
    Float,
    Text,
    Boolean,
    Date,
    Timestamp,
}

/// Declared column type
#[derive(Debug, Clone, PartialEq)]
pub struct DataType {
    pub kind: TypeKind,
    /// Declared length for character types
    pub length: Option<u64>,
    /// Declared scale for fixed-point types
    pub scale: Option<u64>,
}

impl DataType {
    pub fn new(kind: TypeKind) -> Self {
        Self { kind, length: None, scale: None }
    }

    /// Resolve a type name and its parenthesized arguments.
    pub fn from_name(name: &str, args: &[u64]) -> Option<Self> {
        let upper = name.to_uppercase();
        let kind = match upper.as_str() {
            "INT" | "INTEGER" | "BIGINT" | "SMALLINT" | "TINYINT" | "BYTEINT" => TypeKind::Integer,
            "NUMBER" | "NUMERIC" | "DECIMAL" => {
                // NUMBER(p, s) with s > 0 holds fractional values
                let scale = args.get(1).copied().unwrap_or(0);
                return Some(if scale > 0 {
                    Self { kind: TypeKind::Float, length: None, scale: Some(scale) }
                } else {
                    Self::new(TypeKind::Integer)
                });
            }
            "FLOAT" | "FLOAT4" | "FLOAT8" | "DOUBLE" | "REAL" => TypeKind::Float,
            "VARCHAR" | "CHAR" | "CHARACTER" | "STRING" | "TEXT" => {
                return Some(Self { kind: TypeKind::Text, length: args.first().copied(), scale: None });
            }
            "BOOLEAN" | "BOOL" => TypeKind::Boolean,
            "DATE" => TypeKind::Date,
            "TIMESTAMP" | "DATETIME" | "TIMESTAMP_NTZ" | "TIMESTAMP_LTZ" | "TIMESTAMP_TZ" => TypeKind::Timestamp,
            _ => return None,
        };
        Some(Self::new(kind))
    }
}

impl fmt::Display for DataType {
    /// Canonical warehouse rendering, as reported by DESCRIBE
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            TypeKind::Integer => f.write_str("NUMBER(38,0)"),
            TypeKind::Float => match self.scale {
                Some(scale) => write!(f, "NUMBER(38,{})", scale),
                None => f.write_str("FLOAT"),
            },
            TypeKind::Text => write!(f, "VARCHAR({})", self.length.unwrap_or(16_777_216)),
            TypeKind::Boolean => f.write_str("BOOLEAN"),
            TypeKind::Date => f.write_str("DATE"),
            TypeKind::Timestamp => f.write_str("TIMESTAMP_NTZ(9)"),
        }
    }
}

/// USE statement target
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectKind {
    Database,
    Schema,
    Warehouse,
}

#[derive(Debug, Clone)]
pub struct UseStmt {
    pub kind: ObjectKind,
    pub name: String,
}

/// Expression
#[derive(Debug, Clone)]
pub enum Expr {
    /// Column reference
    Column(String),

    /// Literal value
    Literal(Value),

    /// `?` bind marker, numbered from 0 in order of appearance
    Placeholder(usize),

    /// Binary operation
    BinaryOp {
        left: Box<Expr>,
        op: BinaryOperator,
        right: Box<Expr>,
    },

    /// Unary operation
    UnaryOp {
        op: UnaryOperator,
        expr: Box<Expr>,
    },

    /// IS [NOT] NULL expression
    IsNull {
        expr: Box<Expr>,
        negated: bool,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum BinaryOperator {
    // Comparison
    Eq,   // =
    Ne,   // !=
    Lt,   // <
    Gt,   // >
    Le,   // <=
    Ge,   // >=

    // Logical
    And,
    Or,

    // Arithmetic
    Add,  // +
    Sub,  // -
    Mul,  // *
    Div,  // /
}

#[derive(Debug, Clone, PartialEq)]
pub enum UnaryOperator {
    Not,
    Minus,
    Plus,
}

impl BinaryOperator {
    /// Get operator precedence (higher = tighter binding)
    pub fn precedence(&self) -> u8 {
        match self {
            BinaryOperator::Or => 1,
            BinaryOperator::And => 2,
            BinaryOperator::Eq | BinaryOperator::Ne |
            BinaryOperator::Lt | BinaryOperator::Gt |
            BinaryOperator::Le | BinaryOperator::Ge => 3,
            BinaryOperator::Add | BinaryOperator::Sub => 4,
            BinaryOperator::Mul | BinaryOperator::Div => 5,
        }
    }
}
