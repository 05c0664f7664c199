//! stmtx Core - data model and driver contracts for statement execution
//!
//! This crate provides the types every other stmtx crate depends on:
//!
//! - `BoundSql` - final SQL text paired with its ordered parameter mappings
//! - `MappedStatement` - per-statement configuration (kind, settings, result mapping)
//! - `Connection` / `DriverStatement` / `RowSource` - the driver-level traits
//! - `ExecutorConfig` - defaults and statement definitions loaded from TOML
//! - Common types like `Value`, `Row`, `SqlType`, and the error taxonomy

mod bound_sql;
pub mod config;
mod driver;
mod error;
mod statement;
mod types;

pub use bound_sql::*;
pub use config::ExecutorConfig;
pub use driver::*;
pub use error::*;
pub use statement::*;
pub use types::*;
