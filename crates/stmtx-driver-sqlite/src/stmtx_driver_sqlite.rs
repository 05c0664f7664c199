//! SQLite driver implementation
//!
//! SQLite has no stored procedures, so routine calls are emulated: the SQL of a
//! call is a single statement (typically `SELECT` or `... RETURNING`) whose
//! placeholders take the input slots and whose first result row supplies the
//! output slots, both in declaration order.

mod connection;
mod statement;
mod values;

pub use connection::{SqliteCancelHandle, SqliteConnection};
pub use statement::{SqliteRows, SqliteStatement};
