/// Query executor - executes SQL statements against the catalog
use super::ast::*;
use super::evaluator::{ExprEvaluator, RowContext};
use super::row_converter::{build_row, coerce_value};
use crate::catalog::{CreateMode, QualifiedName, TableRegistry, TableSchema};
use crate::error::{GatewayError, Result};
use crate::types::Value;
use crate::warehouse::QueryResult;

/// Objects selected by USE statements; one per session
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionState {
    pub database: Option<String>,
    pub schema: Option<String>,
    pub warehouse: Option<String>,
}

/// Executes one parsed statement with its binds
pub struct QueryExecutor<'a> {
    registry: &'a TableRegistry,
    state: &'a mut SessionState,
    evaluator: ExprEvaluator<'a>,
}

impl<'a> QueryExecutor<'a> {
    pub fn new(registry: &'a TableRegistry, state: &'a mut SessionState, binds: &'a [Value]) -> Self {
        Self {
            registry,
            state,
            evaluator: ExprEvaluator::new(binds),
        }
    }

    pub fn execute(&mut self, stmt: Statement) -> Result<QueryResult> {
        match stmt {
            Statement::Select(select) => self.execute_select(select),
            Statement::Insert(insert) => self.execute_insert(insert),
            Statement::Update(update) => self.execute_update(update),
            Statement::Delete(delete) => self.execute_delete(delete),
            Statement::CreateTable(create) => self.execute_create_table(create),
            Statement::DescribeTable(table) => self.execute_describe_table(table),
            Statement::Use(use_stmt) => self.execute_use(use_stmt),
        }
    }

    /// Execute USE DATABASE / SCHEMA / WAREHOUSE
    fn execute_use(&mut self, stmt: UseStmt) -> Result<QueryResult> {
        match stmt.kind {
            ObjectKind::Database => {
                if !self.registry.has_database(&stmt.name) {
                    return Err(does_not_exist("Database", &stmt.name));
                }
                // Switching databases resets the schema to PUBLIC when present
                self.state.schema = self
                    .registry
                    .has_schema(&stmt.name, crate::catalog::registry::PUBLIC_SCHEMA)
                    .then(|| crate::catalog::registry::PUBLIC_SCHEMA.to_string());
                self.state.database = Some(stmt.name);
            }
            ObjectKind::Schema => {
                let database = self.state.database.as_deref().ok_or_else(no_database)?;
                if !self.registry.has_schema(database, &stmt.name) {
                    return Err(does_not_exist("Schema", &stmt.name));
                }
                self.state.schema = Some(stmt.name);
            }
            ObjectKind::Warehouse => {
                if !self.registry.has_warehouse(&stmt.name) {
                    return Err(does_not_exist("Warehouse", &stmt.name));
                }
                self.state.warehouse = Some(stmt.name);
            }
        }
        Ok(QueryResult::Definition {
            message: "Statement executed successfully.".to_string(),
        })
    }

    /// Execute SELECT statement; rows come back in insertion order
    fn execute_select(&mut self, stmt: SelectStmt) -> Result<QueryResult> {
        self.require_warehouse()?;
        let name = self.qualify(&stmt.from)?;
        let evaluator = &self.evaluator;

        self.registry.read_table(&name, |table| {
            let projection = build_select_columns(&stmt.columns, &table.schema)?;

            let mut rows = Vec::new();
            for stored in &table.rows {
                let ctx = RowContext::new(&table.schema.columns, stored);
                if evaluator.matches(stmt.where_clause.as_ref(), &ctx)? {
                    rows.push(projection.iter().map(|&i| stored[i].clone()).collect());
                }
            }

            let columns = projection
                .iter()
                .map(|&i| table.schema.columns[i].name.clone())
                .collect();
            Ok(QueryResult::Select { columns, rows })
        })
    }

    /// Execute INSERT statement; all rows are converted before any is stored
    fn execute_insert(&mut self, stmt: InsertStmt) -> Result<QueryResult> {
        self.require_warehouse()?;
        let name = self.qualify(&stmt.table)?;
        let evaluator = &self.evaluator;

        self.registry.write_table(&name, |table| {
            let targets: Vec<usize> = match &stmt.columns {
                Some(cols) => {
                    let mut targets = Vec::with_capacity(cols.len());
                    for col in cols {
                        let index = table
                            .schema
                            .column_index(col)
                            .ok_or_else(|| GatewayError::ColumnNotFound(col.clone()))?;
                        if targets.contains(&index) {
                            return Err(GatewayError::Execution(format!("duplicate column name '{}'", col)));
                        }
                        targets.push(index);
                    }
                    targets
                }
                None => (0..table.schema.columns.len()).collect(),
            };

            let mut prepared = Vec::with_capacity(stmt.values.len());
            for value_row in &stmt.values {
                if value_row.len() != targets.len() {
                    return Err(GatewayError::Execution(format!(
                        "Insert value list does not match column list expecting {} but got {}",
                        targets.len(),
                        value_row.len()
                    )));
                }
                let mut assignments = Vec::with_capacity(targets.len());
                for (&index, expr) in targets.iter().zip(value_row) {
                    assignments.push((index, evaluator.eval_constant(expr)?));
                }
                prepared.push(build_row(&table.schema.columns, assignments)?);
            }

            let affected_rows = prepared.len();
            table.rows.extend(prepared);
            Ok(QueryResult::Modification { affected_rows })
        })
    }

    /// Execute UPDATE statement; new rows are computed from the old ones
    /// before any is replaced
    fn execute_update(&mut self, stmt: UpdateStmt) -> Result<QueryResult> {
        self.require_warehouse()?;
        let name = self.qualify(&stmt.table)?;
        let evaluator = &self.evaluator;

        self.registry.write_table(&name, |table| {
            let mut assignments = Vec::with_capacity(stmt.assignments.len());
            for (col, expr) in &stmt.assignments {
                let index = table
                    .schema
                    .column_index(col)
                    .ok_or_else(|| GatewayError::ColumnNotFound(col.clone()))?;
                assignments.push((index, expr));
            }

            let mut updates = Vec::new();
            for (pos, stored) in table.rows.iter().enumerate() {
                let ctx = RowContext::new(&table.schema.columns, stored);
                if !evaluator.matches(stmt.where_clause.as_ref(), &ctx)? {
                    continue;
                }
                let mut new_row = stored.clone();
                for &(index, expr) in &assignments {
                    let value = evaluator.eval(expr, &ctx)?;
                    new_row[index] = coerce_value(value, &table.schema.columns[index])?;
                }
                updates.push((pos, new_row));
            }

            let affected_rows = updates.len();
            for (pos, new_row) in updates {
                table.rows[pos] = new_row;
            }
            Ok(QueryResult::Modification { affected_rows })
        })
    }

    /// Execute DELETE statement
    fn execute_delete(&mut self, stmt: DeleteStmt) -> Result<QueryResult> {
        self.require_warehouse()?;
        let name = self.qualify(&stmt.table)?;
        let evaluator = &self.evaluator;

        self.registry.write_table(&name, |table| {
            let mut keep = Vec::with_capacity(table.rows.len());
            for stored in &table.rows {
                let ctx = RowContext::new(&table.schema.columns, stored);
                keep.push(!evaluator.matches(stmt.where_clause.as_ref(), &ctx)?);
            }

            let before = table.rows.len();
            let mut flags = keep.into_iter();
            table.rows.retain(|_| flags.next().unwrap_or(true));
            Ok(QueryResult::Modification {
                affected_rows: before - table.rows.len(),
            })
        })
    }

    /// Execute CREATE TABLE statement
    fn execute_create_table(&mut self, stmt: CreateTableStmt) -> Result<QueryResult> {
        let name = self.qualify(&stmt.table)?;
        let mode = if stmt.or_replace {
            CreateMode::Replace
        } else if stmt.if_not_exists {
            CreateMode::IfNotExists
        } else {
            CreateMode::Fail
        };

        let schema = TableSchema::new(stmt.table.clone(), stmt.columns);
        let created = self.registry.create_table(name, schema, mode)?;

        let message = if created {
            format!("Table {} successfully created.", stmt.table)
        } else {
            format!("{} already exists, statement succeeded.", stmt.table)
        };
        Ok(QueryResult::Definition { message })
    }

    /// Execute DESCRIBE TABLE; one row per column in declaration order
    fn execute_describe_table(&mut self, table_name: String) -> Result<QueryResult> {
        let name = self.qualify(&table_name)?;

        self.registry.read_table(&name, |table| {
            let columns = ["name", "type", "kind", "null?", "default", "primary key", "unique key"]
                .iter()
                .map(|c| c.to_string())
                .collect();

            let rows = table
                .schema
                .columns
                .iter()
                .map(|col| {
                    vec![
                        Value::Text(col.name.clone()),
                        Value::Text(col.data_type.to_string()),
                        Value::Text("COLUMN".into()),
                        Value::Text(if col.nullable { "Y" } else { "N" }.into()),
                        Value::Null,
                        Value::Text("N".into()),
                        Value::Text("N".into()),
                    ]
                })
                .collect();

            Ok(QueryResult::Select { columns, rows })
        })
    }

    // Helper methods

    /// Resolve a bare table name against the current database and schema
    fn qualify(&self, table: &str) -> Result<QualifiedName> {
        let database = self.state.database.as_deref().ok_or_else(no_database)?;
        let schema = self.state.schema.as_deref().ok_or_else(|| {
            GatewayError::Execution(
                "Cannot perform operation. This session does not have a current schema. Call 'USE SCHEMA', or use a qualified name."
                    .to_string(),
            )
        })?;
        Ok(QualifiedName::new(database, schema, table))
    }

    fn require_warehouse(&self) -> Result<()> {
        if self.state.warehouse.is_none() {
            return Err(GatewayError::Execution(
                "No active warehouse selected in the current session. Select an active warehouse with the 'use warehouse' command."
                    .to_string(),
            ));
        }
        Ok(())
    }
}

fn build_select_columns(select_cols: &[SelectColumn], schema: &TableSchema) -> Result<Vec<usize>> {
    let mut projection = Vec::new();
    for col in select_cols {
        match col {
            SelectColumn::Star => projection.extend(0..schema.columns.len()),
            SelectColumn::Column(name) => projection.push(
                schema
                    .column_index(name)
                    .ok_or_else(|| GatewayError::ColumnNotFound(name.clone()))?,
            ),
        }
    }
    Ok(projection)
}

fn no_database() -> GatewayError {
    GatewayError::Execution(
        "Cannot perform operation. This session does not have a current database. Call 'USE DATABASE', or use a qualified name."
            .to_string(),
    )
}

fn does_not_exist(kind: &str, name: &str) -> GatewayError {
    GatewayError::Execution(format!("Object does not exist, or operation cannot be performed: {} '{}'", kind, name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sql::execute_sql;

    struct Fixture {
        registry: TableRegistry,
        state: SessionState,
    }

    impl Fixture {
        fn new() -> Self {
            let registry = TableRegistry::new();
            registry.create_database("DB");
            registry.create_warehouse("WH");
            let mut fixture = Self { registry, state: SessionState::default() };
            fixture.run("USE DATABASE DB", &[]).unwrap();
            fixture.run("USE WAREHOUSE WH", &[]).unwrap();
            fixture
        }

        fn run(&mut self, sql: &str, binds: &[Value]) -> Result<QueryResult> {
            execute_sql(&self.registry, &mut self.state, sql, binds)
        }

        fn rows(&mut self, table: &str) -> Vec<Vec<Value>> {
            match self.run(&format!("SELECT * FROM {}", table), &[]).unwrap() {
                QueryResult::Select { rows, .. } => rows,
                other => panic!("unexpected result: {:?}", other),
            }
        }
    }

    fn people() -> Fixture {
        let mut fx = Fixture::new();
        fx.run("CREATE OR REPLACE TABLE PEOPLE (ID INTEGER, NAME VARCHAR(255))", &[]).unwrap();
        for (id, name) in [(1, Value::from("Ann")), (2, Value::Null), (3, Value::from("Cy"))] {
            fx.run("INSERT INTO PEOPLE (ID, NAME) VALUES (?, ?)", &[Value::Integer(id), name]).unwrap();
        }
        fx
    }

    #[test]
    fn test_use_database_sets_public_schema() {
        let fx = Fixture::new();
        assert_eq!(fx.state.database.as_deref(), Some("DB"));
        assert_eq!(fx.state.schema.as_deref(), Some("PUBLIC"));
        assert_eq!(fx.state.warehouse.as_deref(), Some("WH"));
    }

    #[test]
    fn test_use_unknown_objects_fail() {
        let mut fx = Fixture::new();
        assert!(fx.run("USE DATABASE NOPE", &[]).is_err());
        assert!(fx.run("USE SCHEMA NOPE", &[]).is_err());
        assert!(fx.run("USE WAREHOUSE NOPE", &[]).is_err());
        assert_eq!(fx.state.database.as_deref(), Some("DB"));
    }

    #[test]
    fn test_table_ops_need_database_and_warehouse() {
        let registry = TableRegistry::new();
        let mut state = SessionState::default();
        let err = execute_sql(&registry, &mut state, "CREATE TABLE T (A INT)", &[]).unwrap_err();
        assert!(err.to_string().contains("current database"));

        registry.create_database("DB");
        execute_sql(&registry, &mut state, "USE DATABASE DB", &[]).unwrap();
        execute_sql(&registry, &mut state, "CREATE TABLE T (A INT)", &[]).unwrap();
        let err = execute_sql(&registry, &mut state, "SELECT * FROM T", &[]).unwrap_err();
        assert!(err.to_string().contains("warehouse"));
    }

    #[test]
    fn test_select_keeps_insertion_order() {
        let mut fx = people();
        let rows = fx.rows("PEOPLE");
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0], vec![Value::Integer(1), Value::from("Ann")]);
        assert_eq!(rows[1], vec![Value::Integer(2), Value::Null]);
    }

    #[test]
    fn test_update_with_null_predicate() {
        let mut fx = people();
        let result = fx
            .run(
                "UPDATE PEOPLE SET NAME = ? WHERE ID = ? AND NAME IS NULL",
                &[Value::from("Bo"), Value::Integer(2)],
            )
            .unwrap();
        assert_eq!(result.affected_rows(), 1);
        assert_eq!(fx.rows("PEOPLE")[1], vec![Value::Integer(2), Value::from("Bo")]);
    }

    #[test]
    fn test_equality_against_null_bind_matches_nothing() {
        let mut fx = people();
        let result = fx
            .run("DELETE FROM PEOPLE WHERE ID = ? AND NAME = ?", &[Value::Integer(2), Value::Null])
            .unwrap();
        assert_eq!(result.affected_rows(), 0);
        assert_eq!(fx.rows("PEOPLE").len(), 3);
    }

    #[test]
    fn test_delete_removes_all_duplicates() {
        let mut fx = people();
        fx.run("INSERT INTO PEOPLE (ID, NAME) VALUES (1, 'Ann')", &[]).unwrap();
        let result = fx.run("DELETE FROM PEOPLE WHERE ID = ? AND NAME = ?", &[Value::Integer(1), Value::from("Ann")]).unwrap();
        assert_eq!(result.affected_rows(), 2);
        assert_eq!(fx.rows("PEOPLE").len(), 2);
    }

    #[test]
    fn test_bind_count_mismatch() {
        let mut fx = people();
        let err = fx.run("DELETE FROM PEOPLE WHERE ID = ?", &[]).unwrap_err();
        assert!(err.to_string().contains("Bind"));
        assert!(fx.run("SELECT * FROM PEOPLE", &[Value::Integer(1)]).is_err());
    }

    #[test]
    fn test_insert_failure_stores_nothing() {
        let mut fx = people();
        let err = fx.run("INSERT INTO PEOPLE (ID, NAME) VALUES (4, 'Di'), ('x', 'Ed')", &[]);
        assert!(err.is_err());
        assert_eq!(fx.rows("PEOPLE").len(), 3);
    }

    #[test]
    fn test_describe_reports_declared_columns() {
        let mut fx = people();
        match fx.run("DESCRIBE TABLE PEOPLE", &[]).unwrap() {
            QueryResult::Select { columns, rows } => {
                assert_eq!(columns[0], "name");
                assert_eq!(columns[1], "type");
                assert_eq!(rows.len(), 2);
                assert_eq!(rows[0][0], Value::from("ID"));
                assert_eq!(rows[0][1], Value::from("NUMBER(38,0)"));
                assert_eq!(rows[1][1], Value::from("VARCHAR(255)"));
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_create_or_replace_drops_rows() {
        let mut fx = people();
        fx.run("CREATE OR REPLACE TABLE PEOPLE (ID INTEGER)", &[]).unwrap();
        assert!(fx.rows("PEOPLE").is_empty());
        assert!(fx.run("CREATE TABLE PEOPLE (ID INTEGER)", &[]).is_err());
    }

    #[test]
    fn test_missing_table() {
        let mut fx = Fixture::new();
        let err = fx.run("SELECT * FROM GHOST", &[]).unwrap_err();
        assert!(matches!(err, GatewayError::TableNotFound(_)));
    }
}
