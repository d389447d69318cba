//! Embedded warehouse
//!
//! Runs the gateway against an in-process catalog instead of a remote
//! account. Sessions share one [`TableRegistry`] but each keeps its own USE
//! context, exactly like remote sessions do.

use super::{Connector, QueryResult, WarehouseSession};
use crate::catalog::TableRegistry;
use crate::config::GatewayConfig;
use crate::error::{GatewayError, Result};
use crate::sql::{execute_sql, SessionState};
use crate::statement::{normalize, Statement};
use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::debug;

/// Connector for the embedded warehouse.
#[derive(Debug, Clone, Default)]
pub struct LocalWarehouse {
    registry: Arc<TableRegistry>,
    next_session_id: Arc<AtomicU64>,
}

impl LocalWarehouse {
    /// Empty warehouse with no databases or compute warehouses.
    pub fn new() -> Self {
        Self::default()
    }

    /// Provision the database, schema and warehouse a configuration selects.
    pub fn for_config(config: &GatewayConfig) -> Result<Self> {
        let database = normalize(&config.context.database);
        let warehouse = Self::new()
            .with_database(database.as_str())
            .with_warehouse(normalize(&config.context.warehouse).as_str());
        warehouse
            .registry
            .create_schema(database.as_str(), normalize(config.context.schema_or_default()).as_str())?;
        Ok(warehouse)
    }

    /// Add a database (with its PUBLIC schema).
    pub fn with_database(self, name: &str) -> Self {
        self.registry.create_database(name);
        self
    }

    /// Add a schema to an existing database.
    pub fn with_schema(self, database: &str, schema: &str) -> Result<Self> {
        self.registry.create_schema(database, schema)?;
        Ok(self)
    }

    /// Add a compute warehouse name.
    pub fn with_warehouse(self, name: &str) -> Self {
        self.registry.create_warehouse(name);
        self
    }

    /// Shared catalog, for inspection.
    pub fn registry(&self) -> &Arc<TableRegistry> {
        &self.registry
    }
}

#[async_trait]
impl Connector for LocalWarehouse {
    async fn connect(&self) -> Result<Box<dyn WarehouseSession>> {
        let id = self.next_session_id.fetch_add(1, Ordering::Relaxed) + 1;
        debug!(session_id = id, "local session opened");
        Ok(Box::new(LocalSession {
            id,
            registry: Arc::clone(&self.registry),
            state: SessionState::default(),
            closed: false,
        }))
    }

    fn name(&self) -> &'static str {
        "local"
    }
}

/// One open embedded session.
struct LocalSession {
    id: u64,
    registry: Arc<TableRegistry>,
    state: SessionState,
    closed: bool,
}

#[async_trait]
impl WarehouseSession for LocalSession {
    async fn execute(&mut self, statement: &Statement) -> Result<QueryResult> {
        if self.closed {
            return Err(GatewayError::Connection(format!("session {} is closed", self.id)));
        }
        debug!(session_id = self.id, sql = %statement.sql, binds = statement.binds.len(), "local execute");
        execute_sql(&self.registry, &mut self.state, &statement.sql, &statement.binds)
    }

    async fn close(&mut self) -> Result<()> {
        if self.closed {
            return Err(GatewayError::Connection(format!("session {} is already closed", self.id)));
        }
        self.closed = true;
        debug!(session_id = self.id, "local session closed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::statement;
    use crate::types::{TableName, Value};

    #[tokio::test]
    async fn test_sessions_share_tables_but_not_context() {
        let warehouse = LocalWarehouse::for_config(&GatewayConfig::for_local()).unwrap();
        let table = TableName::new("t").unwrap();

        let mut first = warehouse.connect().await.unwrap();
        first.execute(&statement::use_database("local")).await.unwrap();
        first.execute(&statement::use_warehouse("local_wh")).await.unwrap();
        first
            .execute(&Statement::text("CREATE TABLE T (ID INTEGER)"))
            .await
            .unwrap();

        // A fresh session starts without a database
        let mut second = warehouse.connect().await.unwrap();
        assert!(second.execute(&statement::select_all(&table)).await.is_err());
        second.execute(&statement::use_database("local")).await.unwrap();
        second.execute(&statement::use_warehouse("local_wh")).await.unwrap();
        let rows = second.execute(&statement::select_all(&table)).await.unwrap();
        assert_eq!(rows.row_count(), 0);
    }

    #[tokio::test]
    async fn test_binds_flow_through() {
        let warehouse = LocalWarehouse::new().with_database("DB").with_warehouse("WH");
        let mut session = warehouse.connect().await.unwrap();
        session.execute(&statement::use_database("db")).await.unwrap();
        session.execute(&statement::use_warehouse("wh")).await.unwrap();
        session
            .execute(&Statement::text("CREATE TABLE T (ID INTEGER, NAME STRING)"))
            .await
            .unwrap();

        let row = [("id".to_string(), Value::Integer(1)), ("name".to_string(), Value::from("Ann"))]
            .into_iter()
            .collect();
        let result = session
            .execute(&statement::insert_row(&TableName::new("t").unwrap(), &row))
            .await
            .unwrap();
        assert_eq!(result.affected_rows(), 1);
    }

    #[tokio::test]
    async fn test_closed_session_rejects_work() {
        let warehouse = LocalWarehouse::new();
        let mut session = warehouse.connect().await.unwrap();
        session.close().await.unwrap();
        assert!(matches!(
            session.execute(&Statement::text("USE DATABASE X")).await,
            Err(GatewayError::Connection(_))
        ));
        assert!(session.close().await.is_err());
    }

    #[test]
    fn test_for_config_provisions_schema() {
        let mut config = GatewayConfig::for_local();
        config.context.schema = Some("staging".into());
        let warehouse = LocalWarehouse::for_config(&config).unwrap();
        assert!(warehouse.registry().has_schema("LOCAL", "STAGING"));
        assert!(warehouse.registry().has_warehouse("LOCAL_WH"));
    }
}
