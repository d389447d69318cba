//! Gateway facade
//!
//! Turns one [`OperationRequest`] into a sequence of statements on a fresh
//! warehouse session and folds the result into an [`Outcome`].
//!
//! # Flow
//!
//! ```text
//! Idle (validate) -> SessionAcquiring -> ContextApplying
//!     -> StatementExecuting[1..n] -> SessionReleasing -> Done
//! ```
//!
//! An invalid request stops in `Idle` and never opens a session. Every
//! acquired session is released exactly once on every exit path.

use crate::config::GatewayConfig;
use crate::error::{GatewayError, Result};
use crate::outcome::{Outcome, Payload};
use crate::request::OperationRequest;
use crate::resolver;
use crate::session::{RequestPhase, Session, SessionManager};
use crate::statement;
use crate::types::{ColumnSpec, RowValues, TableName};
use crate::warehouse::{Connector, LocalWarehouse, SnowflakeConnector};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

/// Schema-agnostic table gateway. Cheap to clone and safe to share.
#[derive(Clone)]
pub struct Gateway {
    manager: SessionManager,
    request_timeout: Option<Duration>,
}

impl Gateway {
    pub fn new(connector: Arc<dyn Connector>, config: &GatewayConfig) -> Self {
        Self {
            manager: SessionManager::new(connector, config.context.clone()),
            request_timeout: config.request_timeout,
        }
    }

    /// Gateway backed by the remote warehouse.
    pub fn snowflake(config: &GatewayConfig) -> Result<Self> {
        config.validate()?;
        let connector = SnowflakeConnector::new(config)?;
        Ok(Self::new(Arc::new(connector), config))
    }

    /// Gateway backed by a fresh embedded warehouse.
    pub fn local() -> Result<Self> {
        let config = GatewayConfig::for_local();
        let warehouse = LocalWarehouse::for_config(&config)?;
        Ok(Self::new(Arc::new(warehouse), &config))
    }

    pub fn backend(&self) -> &'static str {
        self.manager.backend()
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout
    }

    /// Decode a `{"op": ...}` envelope and execute it.
    pub async fn execute_json(&self, payload: &serde_json::Value) -> Outcome {
        match OperationRequest::from_envelope(payload) {
            Ok(request) => self.execute(request).await,
            Err(e) => {
                warn!(error = %e, "rejected malformed request");
                Outcome::from_error(&e)
            }
        }
    }

    /// Execute one request. Never fails: errors become `Outcome::Failure`.
    pub async fn execute(&self, request: OperationRequest) -> Outcome {
        let span = info_span!(
            "request",
            id = %Uuid::new_v4().simple(),
            verb = %request.verb(),
            table = %request.table(),
        );

        async move {
            let started = Instant::now();
            debug!(phase = %RequestPhase::Idle, "validating request");

            let result = match request.validate() {
                Ok(()) => self.run(request).await,
                Err(e) => Err(e),
            };

            let outcome = match result {
                Ok(payload) => {
                    info!(elapsed_ms = started.elapsed().as_millis() as u64, "request succeeded");
                    Outcome::success(payload)
                }
                Err(e) => {
                    warn!(kind = %e.kind(), error = %e, "request failed");
                    Outcome::from_error(&e)
                }
            };
            debug!(phase = %RequestPhase::Done, "request finished");
            outcome
        }
        .instrument(span)
        .await
    }

    async fn run(&self, request: OperationRequest) -> Result<Payload> {
        match self.request_timeout {
            Some(limit) => tokio::time::timeout(limit, self.dispatch(request))
                .await
                .map_err(|_| GatewayError::Timeout(limit))?,
            None => self.dispatch(request).await,
        }
    }

    async fn dispatch(&self, request: OperationRequest) -> Result<Payload> {
        match request {
            OperationRequest::CreateTable { table, columns } => self.create_table(table, columns).await,
            OperationRequest::ReadTable { table } => self.read_table(table).await,
            OperationRequest::DescribeTable { table } => self.describe_table(table).await,
            OperationRequest::InsertRows { table, rows } => self.insert_rows(table, rows).await,
            OperationRequest::UpdateRow { table, row_index, patch } => {
                self.update_row(table, row_index, patch).await
            }
            OperationRequest::DeleteRow { table, row_index } => self.delete_row(table, row_index).await,
        }
    }

    /// `CREATE OR REPLACE TABLE`: creating an existing table replaces it.
    pub async fn create_table(&self, table: TableName, columns: Vec<ColumnSpec>) -> Result<Payload> {
        let stmt = statement::create_table(&table, &columns);
        self.manager
            .with_session(move |session| {
                Box::pin(async move {
                    session.execute(&stmt).await?;
                    Ok(Payload::Created { table })
                })
            })
            .await
    }

    /// Every row in warehouse order.
    pub async fn read_table(&self, table: TableName) -> Result<Payload> {
        self.manager
            .with_session(move |session| {
                Box::pin(async move { resolver::snapshot(session, &table).await.map(Payload::Rows) })
            })
            .await
    }

    pub async fn describe_table(&self, table: TableName) -> Result<Payload> {
        let stmt = statement::describe_table(&table);
        self.manager
            .with_session(move |session| {
                Box::pin(async move {
                    let result = session.execute(&stmt).await?;
                    Ok(Payload::Structure(result.into_records()))
                })
            })
            .await
    }

    /// One statement per row, in order, stopping at the first failure.
    /// Rows before the failing one stay committed.
    pub async fn insert_rows(&self, table: TableName, rows: Vec<RowValues>) -> Result<Payload> {
        self.manager
            .with_session(move |session| Box::pin(insert_all(session, table, rows)))
            .await
    }

    pub async fn update_row(&self, table: TableName, row_index: u64, patch: RowValues) -> Result<Payload> {
        self.manager
            .with_session(move |session| Box::pin(update_target(session, table, row_index, patch)))
            .await
    }

    pub async fn delete_row(&self, table: TableName, row_index: u64) -> Result<Payload> {
        self.manager
            .with_session(move |session| Box::pin(delete_target(session, table, row_index)))
            .await
    }
}

async fn insert_all(session: &mut Session, table: TableName, rows: Vec<RowValues>) -> Result<Payload> {
    let total = rows.len();
    for (inserted, row) in rows.iter().enumerate() {
        if let Err(e) = session.execute(&statement::insert_row(&table, row)).await {
            return Err(GatewayError::PartialInsert {
                inserted,
                total,
                source: Box::new(e),
            });
        }
    }
    Ok(Payload::Inserted { count: total })
}

async fn update_target(session: &mut Session, table: TableName, row_index: u64, patch: RowValues) -> Result<Payload> {
    let predicate = resolver::resolve(session, &table, row_index).await?;
    let result = session.execute(&statement::update_row(&table, &patch, &predicate)).await?;
    debug!(affected = result.affected_rows(), "row updated");
    Ok(Payload::Updated)
}

async fn delete_target(session: &mut Session, table: TableName, row_index: u64) -> Result<Payload> {
    let predicate = resolver::resolve(session, &table, row_index).await?;
    let result = session.execute(&statement::delete_row(&table, &predicate)).await?;
    debug!(affected = result.affected_rows(), "row deleted");
    Ok(Payload::Deleted)
}
