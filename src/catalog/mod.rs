//! In-memory object catalog for the embedded warehouse
//!
//! Databases own schemas, schemas own tables. Warehouses are a flat
//! namespace: the embedded engine has no compute to size, so a warehouse is
//! only a name a session must select before it reads or writes table data.

pub mod registry;

pub use registry::{CreateMode, QualifiedName, TableData, TableRegistry, TableSchema};
