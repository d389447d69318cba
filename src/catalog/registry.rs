/// Table registry for managing warehouse objects and table data
use crate::error::{GatewayError, Result};
use crate::sql::ast::ColumnDef;
use crate::types::Value;
use ahash::{AHashMap, AHashSet};
use parking_lot::RwLock;
use std::fmt;

/// Schema created alongside every database
pub const PUBLIC_SCHEMA: &str = "PUBLIC";

/// `DATABASE.SCHEMA.TABLE`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QualifiedName {
    pub database: String,
    pub schema: String,
    pub table: String,
}

impl QualifiedName {
    pub fn new(database: impl Into<String>, schema: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            database: database.into(),
            schema: schema.into(),
            table: table.into(),
        }
    }
}

impl fmt::Display for QualifiedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.database, self.schema, self.table)
    }
}

/// Column layout of one table
#[derive(Debug, Clone, PartialEq)]
pub struct TableSchema {
    pub name: String,
    pub columns: Vec<ColumnDef>,
}

impl TableSchema {
    pub fn new(name: impl Into<String>, columns: Vec<ColumnDef>) -> Self {
        Self { name: name.into(), columns }
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }
}

/// Schema plus rows in insertion order
#[derive(Debug, Clone)]
pub struct TableData {
    pub schema: TableSchema,
    pub rows: Vec<Vec<Value>>,
}

/// What CREATE TABLE does when the name is taken
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreateMode {
    /// Fail with "already exists"
    Fail,
    /// Drop the old table, rows included
    Replace,
    /// Keep the old table untouched
    IfNotExists,
}

#[derive(Debug, Default)]
struct RegistryState {
    /// Database name -> schema names
    databases: AHashMap<String, AHashSet<String>>,
    warehouses: AHashSet<String>,
    tables: AHashMap<QualifiedName, TableData>,
}

/// Shared catalog; every session of one embedded warehouse sees the same
/// objects. Each statement holds the lock for its whole duration, so a
/// statement is applied completely or not at all.
#[derive(Debug, Default)]
pub struct TableRegistry {
    state: RwLock<RegistryState>,
}

impl TableRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a database with its PUBLIC schema. Existing databases are kept.
    pub fn create_database(&self, name: &str) {
        let mut state = self.state.write();
        state
            .databases
            .entry(name.to_string())
            .or_default()
            .insert(PUBLIC_SCHEMA.to_string());
    }

    pub fn create_schema(&self, database: &str, schema: &str) -> Result<()> {
        let mut state = self.state.write();
        let schemas = state.databases.get_mut(database).ok_or_else(|| {
            GatewayError::Execution(format!("Database '{}' does not exist or not authorized.", database))
        })?;
        schemas.insert(schema.to_string());
        Ok(())
    }

    pub fn create_warehouse(&self, name: &str) {
        self.state.write().warehouses.insert(name.to_string());
    }

    pub fn has_database(&self, name: &str) -> bool {
        self.state.read().databases.contains_key(name)
    }

    pub fn has_schema(&self, database: &str, schema: &str) -> bool {
        self.state
            .read()
            .databases
            .get(database)
            .map_or(false, |schemas| schemas.contains(schema))
    }

    pub fn has_warehouse(&self, name: &str) -> bool {
        self.state.read().warehouses.contains(name)
    }

    /// Register a table. Returns false when `IfNotExists` kept an existing one.
    pub fn create_table(&self, name: QualifiedName, schema: TableSchema, mode: CreateMode) -> Result<bool> {
        let mut state = self.state.write();

        let schema_exists = state
            .databases
            .get(&name.database)
            .map_or(false, |schemas| schemas.contains(&name.schema));
        if !schema_exists {
            return Err(GatewayError::Execution(format!(
                "Schema '{}.{}' does not exist or not authorized.",
                name.database, name.schema
            )));
        }

        if state.tables.contains_key(&name) {
            match mode {
                CreateMode::Fail => {
                    return Err(GatewayError::Execution(format!("Object '{}' already exists.", name.table)));
                }
                CreateMode::IfNotExists => return Ok(false),
                CreateMode::Replace => {}
            }
        }

        state.tables.insert(name, TableData { schema, rows: Vec::new() });
        Ok(true)
    }

    /// Run `f` against a table under the shared lock
    pub fn read_table<R>(&self, name: &QualifiedName, f: impl FnOnce(&TableData) -> Result<R>) -> Result<R> {
        let state = self.state.read();
        let table = state
            .tables
            .get(name)
            .ok_or_else(|| GatewayError::TableNotFound(name.to_string()))?;
        f(table)
    }

    /// Run `f` against a table under the exclusive lock
    pub fn write_table<R>(&self, name: &QualifiedName, f: impl FnOnce(&mut TableData) -> Result<R>) -> Result<R> {
        let mut state = self.state.write();
        let table = state
            .tables
            .get_mut(name)
            .ok_or_else(|| GatewayError::TableNotFound(name.to_string()))?;
        f(table)
    }

    /// Table names in one schema, sorted
    pub fn list_tables(&self, database: &str, schema: &str) -> Vec<String> {
        let state = self.state.read();
        let mut names: Vec<String> = state
            .tables
            .keys()
            .filter(|k| k.database == database && k.schema == schema)
            .map(|k| k.table.clone())
            .collect();
        names.sort();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sql::ast::{DataType, TypeKind};

    fn schema(name: &str) -> TableSchema {
        TableSchema::new(
            name,
            vec![ColumnDef { name: "ID".into(), data_type: DataType::new(TypeKind::Integer), nullable: true }],
        )
    }

    fn registry() -> TableRegistry {
        let registry = TableRegistry::new();
        registry.create_database("DB");
        registry
    }

    #[test]
    fn test_database_gets_public_schema() {
        let registry = registry();
        assert!(registry.has_database("DB"));
        assert!(registry.has_schema("DB", PUBLIC_SCHEMA));
        assert!(!registry.has_schema("DB", "STAGING"));
        registry.create_schema("DB", "STAGING").unwrap();
        assert!(registry.has_schema("DB", "STAGING"));
        assert!(registry.create_schema("NOPE", "X").is_err());
    }

    #[test]
    fn test_create_modes() {
        let registry = registry();
        let name = QualifiedName::new("DB", PUBLIC_SCHEMA, "T");

        assert!(registry.create_table(name.clone(), schema("T"), CreateMode::Fail).unwrap());
        registry
            .write_table(&name, |t| {
                t.rows.push(vec![Value::Integer(1)]);
                Ok(())
            })
            .unwrap();

        assert!(registry.create_table(name.clone(), schema("T"), CreateMode::Fail).is_err());
        assert!(!registry.create_table(name.clone(), schema("T"), CreateMode::IfNotExists).unwrap());
        assert_eq!(registry.read_table(&name, |t| Ok(t.rows.len())).unwrap(), 1);

        registry.create_table(name.clone(), schema("T"), CreateMode::Replace).unwrap();
        assert_eq!(registry.read_table(&name, |t| Ok(t.rows.len())).unwrap(), 0);
    }

    #[test]
    fn test_missing_table_and_schema() {
        let registry = registry();
        let name = QualifiedName::new("DB", PUBLIC_SCHEMA, "MISSING");
        assert!(matches!(
            registry.read_table(&name, |_| Ok(())),
            Err(GatewayError::TableNotFound(_))
        ));
        let orphan = QualifiedName::new("DB", "NOPE", "T");
        assert!(registry.create_table(orphan, schema("T"), CreateMode::Fail).is_err());
    }

    #[test]
    fn test_tables_are_scoped_by_schema() {
        let registry = registry();
        registry.create_schema("DB", "OTHER").unwrap();
        registry
            .create_table(QualifiedName::new("DB", PUBLIC_SCHEMA, "B"), schema("B"), CreateMode::Fail)
            .unwrap();
        registry
            .create_table(QualifiedName::new("DB", PUBLIC_SCHEMA, "A"), schema("A"), CreateMode::Fail)
            .unwrap();
        registry
            .create_table(QualifiedName::new("DB", "OTHER", "C"), schema("C"), CreateMode::Fail)
            .unwrap();
        assert_eq!(registry.list_tables("DB", PUBLIC_SCHEMA), vec!["A", "B"]);
        assert_eq!(registry.list_tables("DB", "OTHER"), vec!["C"]);
    }
}
