//! SQLite statements: plain, prepared and emulated routine calls

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use rusqlite::types::Value as SqliteValue;
use rusqlite::{Connection as RusqliteConnection, Statement};
use stmtx_core::{
    BatchFailure, BufferedRows, ColumnMeta, DriverError, DriverResult, DriverStatement, ParameterMode, Row,
    RowSource, SqlType, Value, column_names,
};

use crate::values::{column_meta, map_error, map_prepare_error, row_values, value_to_rusqlite};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum StatementMode {
    /// SQL executed verbatim
    Plain,
    /// Positional placeholders bound by slot
    Prepared,
    /// Input slots feed the placeholders, output slots read the first row
    Callable,
}

/// Restores the connection-wide busy timeout a statement overrode
struct BusyTimeoutGuard<'c> {
    conn: &'c RusqliteConnection,
    original: Option<Duration>,
}

impl BusyTimeoutGuard<'_> {
    fn set(&mut self, timeout: Duration) -> DriverResult<()> {
        if self.original.is_none() {
            let millis: i64 = self
                .conn
                .query_row("PRAGMA busy_timeout", [], |row| row.get(0))
                .map_err(map_error)?;
            self.original = Some(Duration::from_millis(millis.max(0) as u64));
        }
        self.conn.busy_timeout(timeout).map_err(map_error)
    }

    fn restore(&mut self) -> DriverResult<()> {
        match self.original.take() {
            Some(original) => self.conn.busy_timeout(original).map_err(map_error),
            None => Ok(()),
        }
    }
}

impl Drop for BusyTimeoutGuard<'_> {
    fn drop(&mut self) {
        if let Err(error) = self.restore() {
            tracing::warn!(%error, "failed to restore SQLite busy timeout");
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct OutSlot {
    sql_type: SqlType,
    mode: ParameterMode,
}

/// A statement prepared on a [`SqliteConnection`](crate::SqliteConnection).
///
/// Slots of a routine call are laid out in declaration order. `IN` and
/// `INOUT` slots take the statement's placeholders in order; `OUT` and `INOUT`
/// slots take the columns of the first result row in order.
pub struct SqliteStatement<'c> {
    conn: &'c RusqliteConnection,
    stmt: Statement<'c>,
    sql: String,
    mode: StatementMode,
    placeholders: usize,
    result_columns: usize,
    busy_timeout: BusyTimeoutGuard<'c>,
    bindings: Vec<Option<SqliteValue>>,
    out_slots: BTreeMap<usize, OutSlot>,
    out_values: BTreeMap<usize, Value>,
    call_rows: Option<BufferedRows>,
    batch: Vec<Vec<Option<SqliteValue>>>,
    query_timeout: Option<u32>,
    fetch_size: Option<u32>,
    last_insert_rowid: Option<i64>,
}

impl<'c> SqliteStatement<'c> {
    pub(crate) fn new(conn: &'c RusqliteConnection, sql: &str, mode: StatementMode) -> DriverResult<Self> {
        let stmt = conn.prepare(sql).map_err(map_prepare_error)?;
        let placeholders = stmt.parameter_count();
        if mode == StatementMode::Plain && placeholders > 0 {
            return Err(DriverError::InvalidSql(format!(
                "plain statement contains {} placeholders",
                placeholders
            )));
        }
        let result_columns = stmt.column_count();

        tracing::debug!(?mode, placeholders, result_columns, "SQLite statement prepared");
        Ok(Self {
            conn,
            stmt,
            sql: sql.to_string(),
            mode,
            placeholders,
            result_columns,
            busy_timeout: BusyTimeoutGuard { conn, original: None },
            bindings: Vec::new(),
            out_slots: BTreeMap::new(),
            out_values: BTreeMap::new(),
            call_rows: None,
            batch: Vec::new(),
            query_timeout: None,
            fetch_size: None,
            last_insert_rowid: None,
        })
    }

    fn is_out_only(&self, slot: usize) -> bool {
        matches!(
            self.out_slots.get(&slot),
            Some(OutSlot {
                mode: ParameterMode::Out,
                ..
            })
        )
    }

    fn bound(&self, slot: usize) -> DriverResult<SqliteValue> {
        self.bindings
            .get(slot - 1)
            .cloned()
            .flatten()
            .ok_or_else(|| DriverError::Parameter(format!("no value bound for parameter {}", slot)))
    }

    /// Values for the statement's placeholders, in placeholder order
    fn placeholder_values(&self) -> DriverResult<Vec<SqliteValue>> {
        match self.mode {
            StatementMode::Plain => Ok(Vec::new()),
            StatementMode::Prepared => (1..=self.placeholders).map(|slot| self.bound(slot)).collect(),
            StatementMode::Callable => {
                let inputs: Vec<usize> = (1..=self.parameter_count())
                    .filter(|slot| !self.is_out_only(*slot))
                    .collect();
                if inputs.len() != self.placeholders {
                    return Err(DriverError::Parameter(format!(
                        "call has {} placeholders but {} input parameters",
                        self.placeholders,
                        inputs.len()
                    )));
                }
                inputs.into_iter().map(|slot| self.bound(slot)).collect()
            }
        }
    }

    fn apply_bindings(&mut self) -> DriverResult<()> {
        let values = self.placeholder_values()?;
        for (i, value) in values.iter().enumerate() {
            self.stmt.raw_bind_parameter(i + 1, value).map_err(map_error)?;
        }
        Ok(())
    }

    /// Connection counters taken before an execution
    fn snapshot(&self) -> (u64, i64) {
        (self.conn.total_changes(), self.conn.last_insert_rowid())
    }

    /// A key is generated only when this execution moved the connection's last rowid
    fn record_changes(&mut self, changed: u64, rowid_before: i64) {
        let rowid = self.conn.last_insert_rowid();
        self.last_insert_rowid = (changed > 0 && rowid != rowid_before).then_some(rowid);
    }

    fn replay_batch(&mut self, entries: Vec<Vec<Option<SqliteValue>>>) -> Result<Vec<u64>, BatchFailure> {
        let mut update_counts = Vec::with_capacity(entries.len());

        for (index, entry) in entries.into_iter().enumerate() {
            self.bindings = entry;
            let outcome = self
                .apply_bindings()
                .and_then(|()| self.stmt.raw_execute().map_err(map_error));
            match outcome {
                Ok(changed) => update_counts.push(changed as u64),
                Err(error) => {
                    tracing::debug!(index, succeeded = update_counts.len(), "SQLite batch entry failed");
                    return Err(BatchFailure {
                        update_counts,
                        index,
                        error,
                    });
                }
            }
        }

        tracing::debug!(entries = update_counts.len(), "SQLite batch executed");
        Ok(update_counts)
    }

    fn require_callable(&self) -> DriverResult<()> {
        if self.mode == StatementMode::Callable {
            Ok(())
        } else {
            Err(DriverError::NotSupported(
                "output parameters require a routine call".into(),
            ))
        }
    }
}

impl DriverStatement for SqliteStatement<'_> {
    fn sql(&self) -> &str {
        &self.sql
    }

    /// Maps to the connection's busy timeout until the statement is closed.
    ///
    /// SQLite has no per-statement limit. Zero means no limit, so the
    /// connection keeps its own busy timeout.
    fn set_query_timeout(&mut self, seconds: u32) -> DriverResult<()> {
        if seconds == 0 {
            self.busy_timeout.restore()?;
        } else {
            self.busy_timeout.set(Duration::from_secs(u64::from(seconds)))?;
        }
        self.query_timeout = Some(seconds);
        Ok(())
    }

    fn query_timeout(&self) -> Option<u32> {
        self.query_timeout
    }

    /// Recorded only; SQLite always steps one row at a time
    fn set_fetch_size(&mut self, rows: u32) -> DriverResult<()> {
        self.fetch_size = Some(rows);
        Ok(())
    }

    fn fetch_size(&self) -> Option<u32> {
        self.fetch_size
    }

    fn parameter_count(&self) -> usize {
        match self.mode {
            StatementMode::Plain => 0,
            StatementMode::Prepared => self.placeholders,
            StatementMode::Callable => {
                let out_only = self
                    .out_slots
                    .values()
                    .filter(|slot| slot.mode == ParameterMode::Out)
                    .count();
                self.placeholders + out_only
            }
        }
    }

    fn bind(&mut self, index: usize, value: &Value) -> DriverResult<()> {
        if self.mode == StatementMode::Plain {
            return Err(DriverError::NotSupported(
                "plain statements take no parameters".into(),
            ));
        }
        let count = self.parameter_count();
        if index == 0 || index > count {
            return Err(DriverError::Parameter(format!(
                "parameter index {} is out of range 1..={}",
                index, count
            )));
        }
        if self.is_out_only(index) {
            return Err(DriverError::Parameter(format!(
                "parameter {} is an output parameter",
                index
            )));
        }
        if self.bindings.len() < count {
            self.bindings.resize(count, None);
        }
        self.bindings[index - 1] = Some(value_to_rusqlite(value));
        Ok(())
    }

    fn clear_parameters(&mut self) {
        self.bindings.clear();
    }

    fn register_out_parameter(&mut self, index: usize, sql_type: SqlType, mode: ParameterMode) -> DriverResult<()> {
        self.require_callable()?;
        if index == 0 {
            return Err(DriverError::Parameter("parameter indexes start at 1".into()));
        }
        if !mode.is_output() {
            return Err(DriverError::Parameter(format!(
                "parameter {} registered with {} mode",
                index, mode
            )));
        }
        self.out_slots.insert(index, OutSlot { sql_type, mode });
        Ok(())
    }

    fn out_parameter(&self, index: usize) -> DriverResult<Value> {
        self.require_callable()?;
        let Some(slot) = self.out_slots.get(&index) else {
            return Err(DriverError::Parameter(format!(
                "parameter {} was not registered as an output parameter",
                index
            )));
        };
        self.out_values.get(&index).cloned().ok_or_else(|| {
            DriverError::Other(format!(
                "{} parameter {} is not available before the call is executed",
                slot.sql_type, index
            ))
        })
    }

    fn execute_update(&mut self) -> DriverResult<u64> {
        self.apply_bindings()?;
        let (_, rowid_before) = self.snapshot();
        let changed = self.stmt.raw_execute().map_err(map_error)? as u64;
        self.record_changes(changed, rowid_before);
        tracing::debug!(affected_rows = changed, "SQLite statement executed");
        Ok(changed)
    }

    fn execute_query(&mut self) -> DriverResult<Box<dyn RowSource + '_>> {
        self.apply_bindings()?;
        let columns = column_meta(&self.stmt);
        let names = column_names(&columns);
        let rows = self.stmt.raw_query();
        Ok(Box::new(SqliteRows {
            rows,
            columns,
            names,
        }))
    }

    fn execute_call(&mut self) -> DriverResult<u64> {
        if self.mode != StatementMode::Callable {
            return Err(DriverError::NotSupported(
                "statement is not a routine call".into(),
            ));
        }
        let outputs: Vec<usize> = self.out_slots.keys().copied().collect();
        let count = self.parameter_count();
        if let Some(&last) = outputs.last()
            && last > count
        {
            return Err(DriverError::Parameter(format!(
                "output parameter {} is out of range 1..={}",
                last, count
            )));
        }
        if outputs.len() > self.result_columns {
            return Err(DriverError::Parameter(format!(
                "{} output parameters registered but the call returns {} columns",
                outputs.len(),
                self.result_columns
            )));
        }

        self.apply_bindings()?;
        let columns = column_meta(&self.stmt);
        let names = column_names(&columns);
        let width = columns.len();
        let (changes_before, rowid_before) = self.snapshot();

        let mut buffered = Vec::new();
        {
            let mut rows = self.stmt.raw_query();
            while let Some(row) = rows.next().map_err(map_error)? {
                buffered.push(Row::new(names.clone(), row_values(row, width)?));
            }
        }

        self.out_values.clear();
        if !outputs.is_empty() {
            let first = buffered.first().ok_or_else(|| {
                DriverError::Other("call returned no row to read output parameters from".into())
            })?;
            for (column, slot) in outputs.iter().enumerate() {
                let value = first.get(column).cloned().unwrap_or(Value::Null);
                self.out_values.insert(*slot, value);
            }
        }

        let changed = self.conn.total_changes().saturating_sub(changes_before);
        self.record_changes(changed, rowid_before);
        tracing::debug!(
            rows = buffered.len(),
            outputs = outputs.len(),
            affected_rows = changed,
            "SQLite call executed"
        );
        self.call_rows = Some(BufferedRows::new(columns, buffered));
        Ok(changed)
    }

    fn result_rows(&mut self) -> DriverResult<Box<dyn RowSource + '_>> {
        if self.mode != StatementMode::Callable {
            return Err(DriverError::NotSupported(
                "statement is not a routine call".into(),
            ));
        }
        match self.call_rows.take() {
            Some(rows) => Ok(Box::new(rows)),
            None => Err(DriverError::Other(
                "no rows available; the call has not been executed".into(),
            )),
        }
    }

    fn generated_keys(&self) -> DriverResult<Vec<Value>> {
        Ok(self.last_insert_rowid.map(Value::Int64).into_iter().collect())
    }

    fn add_batch(&mut self) -> DriverResult<()> {
        if self.mode == StatementMode::Callable {
            return Err(DriverError::NotSupported(
                "routine calls cannot be batched".into(),
            ));
        }
        self.batch.push(self.bindings.clone());
        Ok(())
    }

    fn pending_batch(&self) -> usize {
        self.batch.len()
    }

    /// Replays each entry's bindings, then puts the live bindings back
    fn execute_batch(&mut self) -> Result<Vec<u64>, BatchFailure> {
        let entries = std::mem::take(&mut self.batch);
        let live = std::mem::take(&mut self.bindings);
        let outcome = self.replay_batch(entries);
        self.bindings = live;
        outcome
    }

    fn close(self: Box<Self>) -> DriverResult<()> {
        let SqliteStatement {
            stmt,
            mut busy_timeout,
            ..
        } = *self;
        let finalized = stmt.finalize().map_err(map_error);
        finalized.and(busy_timeout.restore())
    }
}

/// Rows streamed from an executing SQLite statement
pub struct SqliteRows<'s> {
    rows: rusqlite::Rows<'s>,
    columns: Vec<ColumnMeta>,
    names: Arc<[String]>,
}

impl RowSource for SqliteRows<'_> {
    fn columns(&self) -> &[ColumnMeta] {
        &self.columns
    }

    fn next_row(&mut self) -> DriverResult<Option<Row>> {
        match self.rows.next().map_err(map_error)? {
            Some(row) => {
                let values = row_values(row, self.columns.len())?;
                Ok(Some(Row::new(self.names.clone(), values)))
            }
            None => Ok(None),
        }
    }
}
