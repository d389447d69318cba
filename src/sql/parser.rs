/// SQL Parser - converts tokens into AST
use super::token::{Token, TokenType};
use super::ast::*;
use crate::error::{Result, GatewayError};
use crate::types::Value;

/// IS [NOT] NULL binds like a comparison
const IS_NULL_PRECEDENCE: u8 = 3;

pub struct Parser {
    tokens: Vec<Token>,
    position: usize,
    placeholders: usize,
}

impl Parser {
    pub fn new(tokens: Vec<Token>) -> Self {
        Self { tokens, position: 0, placeholders: 0 }
    }

    /// Number of `?` markers seen so far
    pub fn placeholder_count(&self) -> usize {
        self.placeholders
    }

    /// Parse exactly one SQL statement
    pub fn parse(&mut self) -> Result<Statement> {
        let stmt = match &self.current().token_type {
            TokenType::Select => Statement::Select(self.parse_select()?),
            TokenType::Insert => Statement::Insert(self.parse_insert()?),
            TokenType::Update => Statement::Update(self.parse_update()?),
            TokenType::Delete => Statement::Delete(self.parse_delete()?),
            TokenType::Create => Statement::CreateTable(self.parse_create_table()?),
            TokenType::Describe => self.parse_describe()?,
            TokenType::Use => Statement::Use(self.parse_use()?),
            _ => return Err(self.error("Expected SELECT, INSERT, UPDATE, DELETE, CREATE, DESCRIBE, or USE")),
        };

        // Optionally consume semicolon
        self.match_token(TokenType::Semicolon);

        if !matches!(self.current().token_type, TokenType::Eof) {
            return Err(self.error("Unexpected trailing input"));
        }

        Ok(stmt)
    }

    /// Parse SELECT statement
    fn parse_select(&mut self) -> Result<SelectStmt> {
        self.expect(TokenType::Select)?;

        let columns = self.parse_select_columns()?;

        self.expect(TokenType::From)?;
        let from = self.parse_identifier()?;

        let where_clause = self.parse_where()?;

        Ok(SelectStmt { columns, from, where_clause })
    }

    fn parse_select_columns(&mut self) -> Result<Vec<SelectColumn>> {
        let mut columns = Vec::new();
        loop {
            if self.match_token(TokenType::Star) {
                columns.push(SelectColumn::Star);
            } else {
                columns.push(SelectColumn::Column(self.parse_identifier()?));
            }
            if !self.match_token(TokenType::Comma) {
                break;
            }
        }
        Ok(columns)
    }

    fn parse_where(&mut self) -> Result<Option<Expr>> {
        if self.match_token(TokenType::Where) {
            Ok(Some(self.parse_expr(0)?))
        } else {
            Ok(None)
        }
    }

    /// Parse INSERT statement
    fn parse_insert(&mut self) -> Result<InsertStmt> {
        self.expect(TokenType::Insert)?;
        self.expect(TokenType::Into)?;

        let table = self.parse_identifier()?;

        // Optional column list
        let columns = if self.match_token(TokenType::LParen) {
            let cols = self.parse_identifier_list()?;
            self.expect(TokenType::RParen)?;
            Some(cols)
        } else {
            None
        };

        self.expect(TokenType::Values)?;

        let mut values = Vec::new();
        loop {
            self.expect(TokenType::LParen)?;
            let row = self.parse_expr_list()?;
            self.expect(TokenType::RParen)?;
            values.push(row);

            if !self.match_token(TokenType::Comma) {
                break;
            }
        }

        Ok(InsertStmt { table, columns, values })
    }

    /// Parse UPDATE statement
    fn parse_update(&mut self) -> Result<UpdateStmt> {
        self.expect(TokenType::Update)?;
        let table = self.parse_identifier()?;
        self.expect(TokenType::Set)?;

        let mut assignments = Vec::new();
        loop {
            let column = self.parse_identifier()?;
            self.expect(TokenType::Eq)?;
            let expr = self.parse_expr(0)?;
            assignments.push((column, expr));

            if !self.match_token(TokenType::Comma) {
                break;
            }
        }

        let where_clause = self.parse_where()?;

        Ok(UpdateStmt { table, assignments, where_clause })
    }

    /// Parse DELETE statement
    fn parse_delete(&mut self) -> Result<DeleteStmt> {
        self.expect(TokenType::Delete)?;
        self.expect(TokenType::From)?;
        let table = self.parse_identifier()?;
        let where_clause = self.parse_where()?;

        Ok(DeleteStmt { table, where_clause })
    }

    /// CREATE [OR REPLACE] TABLE [IF NOT EXISTS] name (col type, ...)
    fn parse_create_table(&mut self) -> Result<CreateTableStmt> {
        self.expect(TokenType::Create)?;

        let or_replace = if self.match_token(TokenType::Or) {
            if !self.match_keyword("REPLACE") {
                return Err(self.error("Expected REPLACE after OR"));
            }
            true
        } else {
            false
        };

        self.expect(TokenType::Table)?;

        let if_not_exists = if self.match_token(TokenType::If) {
            self.expect(TokenType::Not)?;
            self.expect(TokenType::Exists)?;
            true
        } else {
            false
        };

        if or_replace && if_not_exists {
            return Err(self.error("OR REPLACE and IF NOT EXISTS cannot be combined"));
        }

        let table = self.parse_identifier()?;

        self.expect(TokenType::LParen)?;
        let columns = self.parse_column_defs()?;
        self.expect(TokenType::RParen)?;

        Ok(CreateTableStmt { table, columns, or_replace, if_not_exists })
    }

    fn parse_column_defs(&mut self) -> Result<Vec<ColumnDef>> {
        let mut columns = Vec::new();

        loop {
            let name = self.parse_identifier()?;
            let data_type = self.parse_data_type()?;

            // NOT NULL
            let mut nullable = true;
            if self.match_token(TokenType::Not) {
                self.expect(TokenType::Null)?;
                nullable = false;
            }

            if columns.iter().any(|c: &ColumnDef| c.name == name) {
                return Err(GatewayError::ParseError(format!("duplicate column name '{}'", name)));
            }
            columns.push(ColumnDef { name, data_type, nullable });

            if !self.match_token(TokenType::Comma) {
                break;
            }
        }

        Ok(columns)
    }

    /// Type name with optional `(n)` or `(p, s)` arguments
    fn parse_data_type(&mut self) -> Result<DataType> {
        let name = match &self.current().token_type {
            TokenType::Identifier(id) => id.clone(),
            _ => return Err(self.error("Expected data type")),
        };
        self.advance();

        let mut args = Vec::new();
        if self.match_token(TokenType::LParen) {
            loop {
                args.push(self.parse_u64()?);
                if !self.match_token(TokenType::Comma) {
                    break;
                }
            }
            self.expect(TokenType::RParen)?;
        }

        DataType::from_name(&name, &args).ok_or_else(|| {
            GatewayError::ParseError(format!("unsupported data type '{}'", name.to_uppercase()))
        })
    }

    /// DESCRIBE [TABLE] name
    fn parse_describe(&mut self) -> Result<Statement> {
        self.expect(TokenType::Describe)?;
        self.match_token(TokenType::Table);

        let table_name = self.parse_identifier()?;
        Ok(Statement::DescribeTable(table_name))
    }

    /// USE [DATABASE | SCHEMA | WAREHOUSE] name; a bare USE selects a database
    fn parse_use(&mut self) -> Result<UseStmt> {
        self.expect(TokenType::Use)?;

        let kind = if self.match_keyword("DATABASE") {
            ObjectKind::Database
        } else if self.match_keyword("SCHEMA") {
            ObjectKind::Schema
        } else if self.match_keyword("WAREHOUSE") {
            ObjectKind::Warehouse
        } else {
            ObjectKind::Database
        };

        let name = self.parse_identifier()?;
        Ok(UseStmt { kind, name })
    }

    /// Pratt parsing over binary operators, with IS [NOT] NULL folded in at
    /// comparison precedence
    fn parse_expr(&mut self, min_precedence: u8) -> Result<Expr> {
        let mut left = self.parse_prefix_expr()?;

        loop {
            if matches!(self.current().token_type, TokenType::Is) {
                if IS_NULL_PRECEDENCE < min_precedence {
                    break;
                }
                self.advance();
                let negated = self.match_token(TokenType::Not);
                self.expect(TokenType::Null)?;
                left = Expr::IsNull {
                    expr: Box::new(left),
                    negated,
                };
                continue;
            }

            let Some(op) = self.try_parse_binary_op() else {
                break;
            };
            let precedence = op.precedence();
            if precedence < min_precedence {
                break;
            }

            self.advance(); // consume operator
            let right = self.parse_expr(precedence + 1)?;

            left = Expr::BinaryOp {
                left: Box::new(left),
                op,
                right: Box::new(right),
            };
        }

        Ok(left)
    }

    fn parse_prefix_expr(&mut self) -> Result<Expr> {
        let token_type = self.current().token_type.clone();
        match token_type {
            TokenType::Not => {
                self.advance();
                // NOT binds looser than comparisons, tighter than AND
                let expr = self.parse_expr(IS_NULL_PRECEDENCE)?;
                Ok(Expr::UnaryOp {
                    op: UnaryOperator::Not,
                    expr: Box::new(expr),
                })
            }
            TokenType::Minus => {
                self.advance();
                let expr = self.parse_expr(10)?;
                Ok(Expr::UnaryOp {
                    op: UnaryOperator::Minus,
                    expr: Box::new(expr),
                })
            }
            TokenType::Plus => {
                self.advance();
                let expr = self.parse_expr(10)?;
                Ok(Expr::UnaryOp {
                    op: UnaryOperator::Plus,
                    expr: Box::new(expr),
                })
            }
            TokenType::LParen => {
                self.advance();
                let expr = self.parse_expr(0)?;
                self.expect(TokenType::RParen)?;
                Ok(expr)
            }

            // Literals
            TokenType::Integer(i) => {
                self.advance();
                Ok(Expr::Literal(Value::Integer(i)))
            }
            TokenType::Float(f) => {
                self.advance();
                Ok(Expr::Literal(Value::Float(f)))
            }
            TokenType::String(s) => {
                self.advance();
                Ok(Expr::Literal(Value::Text(s)))
            }
            TokenType::True => {
                self.advance();
                Ok(Expr::Literal(Value::Bool(true)))
            }
            TokenType::False => {
                self.advance();
                Ok(Expr::Literal(Value::Bool(false)))
            }
            TokenType::Null => {
                self.advance();
                Ok(Expr::Literal(Value::Null))
            }
            TokenType::Placeholder => {
                self.advance();
                let index = self.placeholders;
                self.placeholders += 1;
                Ok(Expr::Placeholder(index))
            }

            TokenType::Identifier(_) | TokenType::QuotedIdentifier(_) => {
                Ok(Expr::Column(self.parse_identifier()?))
            }

            _ => Err(self.error("Expected expression")),
        }
    }

    fn try_parse_binary_op(&self) -> Option<BinaryOperator> {
        match &self.current().token_type {
            TokenType::Eq => Some(BinaryOperator::Eq),
            TokenType::Ne => Some(BinaryOperator::Ne),
            TokenType::Lt => Some(BinaryOperator::Lt),
            TokenType::Gt => Some(BinaryOperator::Gt),
            TokenType::Le => Some(BinaryOperator::Le),
            TokenType::Ge => Some(BinaryOperator::Ge),
            TokenType::And => Some(BinaryOperator::And),
            TokenType::Or => Some(BinaryOperator::Or),
            TokenType::Plus => Some(BinaryOperator::Add),
            TokenType::Minus => Some(BinaryOperator::Sub),
            TokenType::Star => Some(BinaryOperator::Mul),
            TokenType::Slash => Some(BinaryOperator::Div),
            _ => None,
        }
    }

    // Helper methods

    /// Unquoted identifiers fold to upper case; quoted ones keep their case
    fn parse_identifier(&mut self) -> Result<String> {
        let name = match &self.current().token_type {
            TokenType::Identifier(name) => name.to_uppercase(),
            TokenType::QuotedIdentifier(name) => name.clone(),
            _ => return Err(self.error("Expected identifier")),
        };
        self.advance();
        Ok(name)
    }

    fn parse_identifier_list(&mut self) -> Result<Vec<String>> {
        let mut list = Vec::new();
        loop {
            list.push(self.parse_identifier()?);
            if !self.match_token(TokenType::Comma) {
                break;
            }
        }
        Ok(list)
    }

    fn parse_expr_list(&mut self) -> Result<Vec<Expr>> {
        let mut list = Vec::new();
        loop {
            list.push(self.parse_expr(0)?);
            if !self.match_token(TokenType::Comma) {
                break;
            }
        }
        Ok(list)
    }

    fn parse_u64(&mut self) -> Result<u64> {
        if let TokenType::Integer(n) = self.current().token_type {
            if n < 0 {
                return Err(self.error("Expected non-negative integer"));
            }
            self.advance();
            Ok(n as u64)
        } else {
            Err(self.error("Expected number"))
        }
    }

    fn current(&self) -> &Token {
        &self.tokens[self.position]
    }

    fn advance(&mut self) {
        if self.position < self.tokens.len() - 1 {
            self.position += 1;
        }
    }

    fn match_token(&mut self, token_type: TokenType) -> bool {
        if std::mem::discriminant(&self.current().token_type) == std::mem::discriminant(&token_type) {
            self.advance();
            true
        } else {
            false
        }
    }

    /// Contextual keyword that the lexer leaves as an identifier
    fn match_keyword(&mut self, keyword: &str) -> bool {
        if let TokenType::Identifier(ref id) = self.current().token_type {
            if id.eq_ignore_ascii_case(keyword) {
                self.advance();
                return true;
            }
        }
        false
    }

    fn expect(&mut self, token_type: TokenType) -> Result<()> {
        if std::mem::discriminant(&self.current().token_type) == std::mem::discriminant(&token_type) {
            self.advance();
            Ok(())
        } else {
            Err(self.error(&format!("Expected {:?}", token_type)))
        }
    }

    fn error(&self, msg: &str) -> GatewayError {
        let token = self.current();
        GatewayError::ParseError(format!(
            "{} at line {} column {}",
            msg, token.line, token.column
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sql::lexer::Lexer;

    fn parse_sql(sql: &str) -> Result<Statement> {
        let tokens = Lexer::new(sql).tokenize()?;
        Parser::new(tokens).parse()
    }

    #[test]
    fn test_parse_simple_select() {
        let stmt = parse_sql("SELECT * FROM users").unwrap();
        match stmt {
            Statement::Select(select) => {
                assert_eq!(select.columns, vec![SelectColumn::Star]);
                assert_eq!(select.from, "USERS");
                assert!(select.where_clause.is_none());
            }
            _ => panic!("Expected SELECT statement"),
        }
    }

    #[test]
    fn test_parse_predicate_with_is_null_first() {
        let stmt = parse_sql("DELETE FROM t WHERE name IS NULL AND id = ?").unwrap();
        match stmt {
            Statement::Delete(delete) => match delete.where_clause {
                Some(Expr::BinaryOp { left, op: BinaryOperator::And, right }) => {
                    assert!(matches!(*left, Expr::IsNull { negated: false, .. }));
                    assert!(matches!(*right, Expr::BinaryOp { op: BinaryOperator::Eq, .. }));
                }
                other => panic!("unexpected predicate: {:?}", other),
            },
            _ => panic!("Expected DELETE statement"),
        }
    }

    #[test]
    fn test_parse_insert_numbers_placeholders() {
        let tokens = Lexer::new("INSERT INTO t (a, b) VALUES (?, ?)").tokenize().unwrap();
        let mut parser = Parser::new(tokens);
        let stmt = parser.parse().unwrap();
        assert_eq!(parser.placeholder_count(), 2);
        match stmt {
            Statement::Insert(insert) => {
                assert_eq!(insert.table, "T");
                assert_eq!(insert.columns, Some(vec!["A".to_string(), "B".to_string()]));
                assert!(matches!(insert.values[0][1], Expr::Placeholder(1)));
            }
            _ => panic!("Expected INSERT statement"),
        }
    }

    #[test]
    fn test_parse_update() {
        let stmt = parse_sql("UPDATE users SET age = ? WHERE id = 1").unwrap();
        match stmt {
            Statement::Update(update) => {
                assert_eq!(update.table, "USERS");
                assert_eq!(update.assignments.len(), 1);
                assert_eq!(update.assignments[0].0, "AGE");
                assert!(update.where_clause.is_some());
            }
            _ => panic!("Expected UPDATE statement"),
        }
    }

    #[test]
    fn test_parse_create_or_replace_table() {
        let stmt = parse_sql("CREATE OR REPLACE TABLE people (ID INTEGER, NAME VARCHAR(255) NOT NULL)").unwrap();
        match stmt {
            Statement::CreateTable(create) => {
                assert!(create.or_replace);
                assert_eq!(create.table, "PEOPLE");
                assert_eq!(create.columns.len(), 2);
                assert_eq!(create.columns[1].data_type.length, Some(255));
                assert!(!create.columns[1].nullable);
            }
            _ => panic!("Expected CREATE TABLE statement"),
        }
    }

    #[test]
    fn test_parse_create_rejects_unknown_type() {
        let err = parse_sql("CREATE TABLE t (a WIDGET)").unwrap_err();
        assert!(err.to_string().contains("WIDGET"));
    }

    #[test]
    fn test_parse_describe_and_use() {
        assert!(matches!(parse_sql("DESCRIBE TABLE t").unwrap(), Statement::DescribeTable(ref t) if t == "T"));
        assert!(matches!(parse_sql("desc t;").unwrap(), Statement::DescribeTable(_)));
        match parse_sql("USE WAREHOUSE compute_wh").unwrap() {
            Statement::Use(u) => {
                assert_eq!(u.kind, ObjectKind::Warehouse);
                assert_eq!(u.name, "COMPUTE_WH");
            }
            _ => panic!("Expected USE statement"),
        }
    }

    #[test]
    fn test_quoted_identifier_keeps_case() {
        match parse_sql(r#"SELECT * FROM "MixedCase""#).unwrap() {
            Statement::Select(select) => assert_eq!(select.from, "MixedCase"),
            _ => panic!("Expected SELECT statement"),
        }
    }

    #[test]
    fn test_trailing_garbage_rejected() {
        assert!(parse_sql("SELECT * FROM t extra").is_err());
        assert!(parse_sql("SELECT * FROM ORDER ITEMS").is_err());
    }
}
