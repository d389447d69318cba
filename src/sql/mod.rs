/// Embedded SQL engine
///
/// A small warehouse dialect executed in-process against the in-memory
/// catalog. It understands exactly what the gateway emits: USE, CREATE [OR
/// REPLACE] TABLE, SELECT, INSERT, UPDATE, DELETE and DESCRIBE, with `?`
/// binds.
///
/// Architecture:
/// - Lexer: Tokenizes SQL strings
/// - Parser: Builds AST from tokens and numbers the placeholders
/// - Executor: Executes statements against the catalog

pub mod token;
pub mod lexer;
pub mod ast;
pub mod parser;
pub mod executor;
pub mod evaluator;
pub mod row_converter;

pub use token::{Token, TokenType};
pub use lexer::Lexer;
pub use ast::{Statement, Expr, BinaryOperator, DataType, TypeKind};
pub use parser::Parser;
pub use executor::{QueryExecutor, SessionState};
pub use evaluator::ExprEvaluator;

use crate::catalog::TableRegistry;
use crate::error::{GatewayError, Result};
use crate::types::Value;
use crate::warehouse::QueryResult;

/// Parse and execute one SQL statement with its positional binds
pub fn execute_sql(
    registry: &TableRegistry,
    state: &mut SessionState,
    sql: &str,
    binds: &[Value],
) -> Result<QueryResult> {
    let mut lexer = Lexer::new(sql);
    let tokens = lexer.tokenize()?;
    let mut parser = Parser::new(tokens);
    let statement = parser.parse()?;

    if parser.placeholder_count() != binds.len() {
        return Err(GatewayError::Execution(format!(
            "Bind variable count mismatch: statement has {} placeholders but {} values were bound",
            parser.placeholder_count(),
            binds.len()
        )));
    }

    let mut executor = QueryExecutor::new(registry, state, binds);
    executor.execute(statement)
}
