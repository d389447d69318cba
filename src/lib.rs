//! tablegate: dynamic table gateway
//!
//! Generic, schema-agnostic table operations (create, read, insert, update,
//! delete, describe) over a remote SQL warehouse.
//!
//! ## Architecture
//! - Statement layer: identifier normalization + typed SQL builder (values are always bound)
//! - Session layer: one context-configured session per request, released exactly once
//! - Resolver: ordinal row reference -> full-row value-equality predicate
//! - Gateway: validates requests, runs the statements, folds everything into an `Outcome`
//! - Warehouses: remote (HTTPS session API) or embedded (in-process SQL engine)
//!
//! ```no_run
//! use tablegate::{Gateway, OperationRequest, Verb};
//! use serde_json::json;
//!
//! # async fn demo() -> tablegate::Result<()> {
//! let gateway = Gateway::local()?;
//! let request = OperationRequest::from_json(Verb::Read, &json!({"table": "people"}))?;
//! println!("{}", gateway.execute(request).await.to_json());
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod types;
pub mod statement;
pub mod warehouse;
pub mod catalog;
pub mod sql;
pub mod session;
pub mod resolver;
pub mod request;
pub mod outcome;
pub mod gateway;
pub mod logging;

mod error;

pub use config::{GatewayConfig, SessionContext};
pub use error::{ErrorKind, GatewayError, Result};

pub use gateway::Gateway;
pub use outcome::{Outcome, Payload};
pub use request::{OperationRequest, Verb};
pub use statement::{normalize, Predicate, Statement};
pub use types::{ColumnSpec, RowValues, TableName, Value};
pub use warehouse::{Connector, LocalWarehouse, QueryResult, SnowflakeConnector, WarehouseSession};
