//! Driver-level traits: connections, statements and row sources
//!
//! A driver exposes three statement flavors through [`Connection`]: plain
//! statements, prepared statements and routine calls. All of them are handled
//! through the single [`DriverStatement`] trait; operations a flavor cannot
//! perform report [`DriverError::NotSupported`].

use std::collections::VecDeque;
use std::sync::Arc;

use crate::{
    ColumnMeta, DriverError, DriverResult, ParameterMode, ResultSetType, Row, SqlType, Value,
};

/// Handle for cancelling a running statement from any thread.
///
/// Calling it when nothing is running is a no-op.
pub trait QueryCancelHandle: Send + Sync {
    /// Cancel the statement currently running on the associated connection.
    fn cancel(&self);
}

/// Options applied when a driver statement is created
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StatementOptions {
    pub result_set_type: ResultSetType,
    pub stream_results: bool,
}

/// An open database connection.
///
/// Statements borrow the connection they were created from. The connection is
/// used by one logical execution flow at a time.
pub trait Connection {
    /// Get the driver name (e.g., "sqlite")
    fn driver_name(&self) -> &str;

    /// Create a plain statement that executes `sql` verbatim
    fn create_statement(
        &self,
        sql: &str,
        options: &StatementOptions,
    ) -> DriverResult<Box<dyn DriverStatement + '_>>;

    /// Prepare a statement with positional placeholders
    fn prepare_statement(
        &self,
        sql: &str,
        options: &StatementOptions,
    ) -> DriverResult<Box<dyn DriverStatement + '_>>;

    /// Prepare a call to a stored routine
    fn prepare_call(
        &self,
        sql: &str,
        options: &StatementOptions,
    ) -> DriverResult<Box<dyn DriverStatement + '_>>;

    /// Check if the connection is closed
    fn is_closed(&self) -> bool;

    /// Get a handle that can cancel running statements.
    ///
    /// Returns `None` if the driver does not support cancellation.
    fn cancel_handle(&self) -> Option<Arc<dyn QueryCancelHandle>> {
        None
    }
}

/// Counts of a batch run that stopped at a failing entry
#[derive(Debug, Clone, PartialEq)]
pub struct BatchFailure {
    /// Update counts of the entries that succeeded, in addition order
    pub update_counts: Vec<u64>,
    /// Index of the failing entry
    pub index: usize,
    pub error: DriverError,
}

/// A driver-level statement handle.
///
/// Parameter slots are 1-based and follow the declaration order of the
/// statement's parameter mappings. Releasing happens in [`DriverStatement::close`];
/// dropping the handle without closing it releases it as well.
pub trait DriverStatement {
    /// SQL text the statement was created with
    fn sql(&self) -> &str;

    fn set_query_timeout(&mut self, seconds: u32) -> DriverResult<()>;

    fn query_timeout(&self) -> Option<u32>;

    fn set_fetch_size(&mut self, rows: u32) -> DriverResult<()>;

    fn fetch_size(&self) -> Option<u32>;

    /// Number of parameter slots the statement expects
    fn parameter_count(&self) -> usize;

    /// Bind a value to a parameter slot
    fn bind(&mut self, index: usize, value: &Value) -> DriverResult<()>;

    /// Forget all bound values
    fn clear_parameters(&mut self);

    /// Declare an output slot of a routine call
    fn register_out_parameter(
        &mut self,
        index: usize,
        sql_type: SqlType,
        mode: ParameterMode,
    ) -> DriverResult<()> {
        let _ = (index, sql_type, mode);
        Err(DriverError::NotSupported(
            "output parameters require a routine call".into(),
        ))
    }

    /// Value of an output slot after the last execution
    fn out_parameter(&self, index: usize) -> DriverResult<Value> {
        let _ = index;
        Err(DriverError::NotSupported(
            "output parameters require a routine call".into(),
        ))
    }

    /// Execute as a mutation and return the affected-row count
    fn execute_update(&mut self) -> DriverResult<u64>;

    /// Execute as a query; rows are fetched as the source is advanced
    fn execute_query(&mut self) -> DriverResult<Box<dyn RowSource + '_>>;

    /// Run a routine call. Output parameters and produced rows become
    /// available afterwards; the return value is the affected-row count.
    fn execute_call(&mut self) -> DriverResult<u64> {
        Err(DriverError::NotSupported(
            "statement is not a routine call".into(),
        ))
    }

    /// Rows produced by the last [`DriverStatement::execute_call`]
    fn result_rows(&mut self) -> DriverResult<Box<dyn RowSource + '_>> {
        Err(DriverError::NotSupported(
            "statement is not a routine call".into(),
        ))
    }

    /// Keys generated by the last update, in generation order
    fn generated_keys(&self) -> DriverResult<Vec<Value>> {
        Ok(Vec::new())
    }

    /// Queue the currently bound values as one batch entry
    fn add_batch(&mut self) -> DriverResult<()>;

    /// Number of queued batch entries
    fn pending_batch(&self) -> usize;

    /// Execute every queued entry in addition order and clear the queue
    fn execute_batch(&mut self) -> std::result::Result<Vec<u64>, BatchFailure>;

    /// Release the statement and its server-side resources
    fn close(self: Box<Self>) -> DriverResult<()>;
}

/// Forward-only source of rows produced by a query.
///
/// Dropping the source releases the underlying driver cursor.
pub trait RowSource {
    fn columns(&self) -> &[ColumnMeta];

    /// Fetch the next row, `None` once the source is exhausted
    fn next_row(&mut self) -> DriverResult<Option<Row>>;
}

/// Row source over rows that were already fetched
#[derive(Debug, Clone, Default)]
pub struct BufferedRows {
    columns: Vec<ColumnMeta>,
    rows: VecDeque<Row>,
}

impl BufferedRows {
    pub fn new(columns: Vec<ColumnMeta>, rows: impl IntoIterator<Item = Row>) -> Self {
        Self {
            columns,
            rows: rows.into_iter().collect(),
        }
    }

    /// Rows not yet fetched
    pub fn remaining(&self) -> usize {
        self.rows.len()
    }
}

impl RowSource for BufferedRows {
    fn columns(&self) -> &[ColumnMeta] {
        &self.columns
    }

    fn next_row(&mut self) -> DriverResult<Option<Row>> {
        Ok(self.rows.pop_front())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::column_names;

    #[test]
    fn test_buffered_rows_drain_in_order() {
        let columns = vec![ColumnMeta::new("id", "INTEGER", 0)];
        let names = column_names(&columns);
        let rows = (1..=3).map(|i| Row::new(names.clone(), vec![Value::Int64(i)]));
        let mut source = BufferedRows::new(columns, rows);

        assert_eq!(source.columns()[0].name, "id");
        let mut seen = Vec::new();
        while let Some(row) = source.next_row().unwrap() {
            seen.push(row.get(0).and_then(Value::as_i64).unwrap());
        }
        assert_eq!(seen, vec![1, 2, 3]);
        assert_eq!(source.remaining(), 0);
        assert!(source.next_row().unwrap().is_none());
    }
}
