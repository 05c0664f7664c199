//! The statement handler contract and the lifecycle every strategy shares
//!
//! A handler moves through three states:
//!
//! ```text
//! Unprepared --prepare--> Open --close--> Closed
//! ```
//!
//! Every operation other than `prepare` requires the `Open` state. Anything
//! called on a closed handler, including a second `close`, fails with
//! [`StatementError::AlreadyClosed`]. Dropping an open handler closes its
//! driver statement.

use std::sync::Arc;

use indexmap::IndexMap;
use stmtx_core::{
    BoundSql, Connection, DriverError, DriverResult, DriverStatement, ExecutionSettings, KeyGeneration, Phase,
    Result, ResultMapping, RowSource, StatementError, StatementKind, StatementOptions, Value,
};

use crate::cursor::Cursor;
use crate::parameter::ParameterBinder;
use crate::result::{ResultCallback, ResultMaterializer};

/// Generated key values by key property, in declaration order
pub type GeneratedKeys = IndexMap<String, Value>;

/// Output parameter values by property, in declaration order
pub type OutParameters = IndexMap<String, Value>;

/// Contract shared by the direct, parameterized and procedural strategies.
///
/// `'c` is the lifetime of the connection the statement is prepared on.
pub trait StatementHandler<'c> {
    fn kind(&self) -> StatementKind;

    /// Create the driver statement and apply timeout and fetch size.
    ///
    /// `transaction_timeout` caps the statement timeout when it is tighter.
    fn prepare(&mut self, connection: &'c dyn Connection, transaction_timeout: Option<u32>) -> Result<()>;

    /// Bind the parameters of the bound SQL onto the prepared statement
    fn parameterize(&mut self) -> Result<()>;

    /// Replace the bound SQL with one carrying new values and bind again.
    ///
    /// The SQL text must be identical to the prepared one; the driver statement
    /// is reused without being prepared again.
    fn rebind(&mut self, bound_sql: BoundSql) -> Result<()>;

    /// Execute as a mutation and return the affected-row count
    fn update(&mut self) -> Result<u64>;

    /// Execute as a query and map every row.
    ///
    /// With a callback, mapped rows are handed to it and the returned list is
    /// empty.
    fn query<M: ResultMaterializer>(
        &mut self,
        materializer: &M,
        callback: Option<&mut dyn ResultCallback<M::Output>>,
    ) -> Result<Vec<M::Output>>;

    /// Execute as a query and return a lazy cursor over the mapped rows
    fn query_cursor<'s, M: ResultMaterializer>(&'s mut self, materializer: M) -> Result<Cursor<'s, M>>;

    /// Queue the current parameter set as a batch entry
    fn batch(&mut self) -> Result<()>;

    /// Release the driver statement
    fn close(&mut self) -> Result<()>;

    fn bound_sql(&self) -> &BoundSql;

    fn parameter_binder(&self) -> &dyn ParameterBinder;

    /// Settings after config defaults were applied
    fn settings(&self) -> &ExecutionSettings;

    /// Keys generated by the last update
    fn generated_keys(&self) -> &GeneratedKeys;

    fn is_prepared(&self) -> bool;

    fn is_closed(&self) -> bool;

    /// Prepare, parameterize, run `f`, then close on every path.
    ///
    /// An error from `f` takes precedence over an error from closing.
    fn run<T, F>(mut self, connection: &'c dyn Connection, transaction_timeout: Option<u32>, f: F) -> Result<T>
    where
        Self: Sized,
        F: FnOnce(&mut Self) -> Result<T>,
    {
        self.prepare(connection, transaction_timeout)?;
        let outcome = self.parameterize().and_then(|()| f(&mut self));
        let closed = if self.is_closed() { Ok(()) } else { self.close() };

        match (outcome, closed) {
            (Ok(value), Ok(())) => Ok(value),
            (Ok(_), Err(close_error)) => Err(close_error),
            (Err(error), Ok(())) => Err(error),
            (Err(error), Err(close_error)) => {
                tracing::warn!(error = %close_error, "failed to close statement after error");
                Err(error)
            }
        }
    }
}

/// Resolve the timeout applied to a statement.
///
/// An unset or zero statement timeout defers to the transaction timeout; a
/// transaction timeout tighter than the statement timeout wins.
pub fn effective_timeout(statement_timeout: Option<u32>, transaction_timeout: Option<u32>) -> Option<u32> {
    match (statement_timeout.filter(|t| *t > 0), transaction_timeout) {
        (None, transaction) => transaction,
        (Some(statement), Some(transaction)) if transaction < statement => Some(transaction),
        (Some(statement), _) => Some(statement),
    }
}

/// Where rows of a query come from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RowOrigin {
    /// Execute the statement as a query
    Query,
    /// Rows produced by the last routine call
    CallResults,
}

enum Slot<'c> {
    Unprepared,
    Open(Box<dyn DriverStatement + 'c>),
    Closed,
}

/// Map driver errors of `phase` to execution errors
pub(crate) fn execution_error(kind: StatementKind, phase: Phase) -> impl Fn(DriverError) -> StatementError {
    move |source| StatementError::Execution { kind, phase, source }
}

fn open_statement<'a, 'c>(slot: &'a mut Slot<'c>, kind: StatementKind) -> Result<&'a mut (dyn DriverStatement + 'c)> {
    match slot {
        Slot::Open(statement) => Ok(statement.as_mut()),
        Slot::Unprepared => Err(StatementError::NotPrepared { kind }),
        Slot::Closed => Err(StatementError::AlreadyClosed { kind }),
    }
}

/// State and lifecycle shared by all strategies
pub(crate) struct StatementCore<'c> {
    kind: StatementKind,
    bound_sql: BoundSql,
    settings: ExecutionSettings,
    binder: Arc<dyn ParameterBinder>,
    slot: Slot<'c>,
    generated_keys: GeneratedKeys,
}

impl<'c> StatementCore<'c> {
    pub(crate) fn new(
        kind: StatementKind,
        bound_sql: BoundSql,
        settings: ExecutionSettings,
        binder: Arc<dyn ParameterBinder>,
    ) -> Self {
        Self {
            kind,
            bound_sql,
            settings,
            binder,
            slot: Slot::Unprepared,
            generated_keys: GeneratedKeys::new(),
        }
    }

    pub(crate) fn kind(&self) -> StatementKind {
        self.kind
    }

    pub(crate) fn bound_sql(&self) -> &BoundSql {
        &self.bound_sql
    }

    pub(crate) fn settings(&self) -> &ExecutionSettings {
        &self.settings
    }

    pub(crate) fn binder(&self) -> &dyn ParameterBinder {
        self.binder.as_ref()
    }

    pub(crate) fn generated_keys(&self) -> &GeneratedKeys {
        &self.generated_keys
    }

    pub(crate) fn is_prepared(&self) -> bool {
        matches!(self.slot, Slot::Open(_))
    }

    pub(crate) fn is_closed(&self) -> bool {
        matches!(self.slot, Slot::Closed)
    }

    /// Fail unless the handler is open
    pub(crate) fn ensure_open(&mut self) -> Result<()> {
        open_statement(&mut self.slot, self.kind).map(|_| ())
    }

    /// Open driver statement together with the bound SQL
    pub(crate) fn parts(&mut self) -> Result<(&mut (dyn DriverStatement + 'c), &BoundSql)> {
        let statement = open_statement(&mut self.slot, self.kind)?;
        Ok((statement, &self.bound_sql))
    }

    /// Create the driver statement with `create` and apply settings to it
    pub(crate) fn prepare<F>(
        &mut self,
        connection: &'c dyn Connection,
        transaction_timeout: Option<u32>,
        create: F,
    ) -> Result<()>
    where
        F: FnOnce(&'c dyn Connection, &str, &StatementOptions) -> DriverResult<Box<dyn DriverStatement + 'c>>,
    {
        let kind = self.kind;
        match self.slot {
            Slot::Unprepared => {}
            Slot::Open(_) => return Err(StatementError::AlreadyPrepared { kind }),
            Slot::Closed => return Err(StatementError::AlreadyClosed { kind }),
        }
        if connection.is_closed() {
            return Err(StatementError::Preparation {
                kind,
                source: DriverError::ConnectionClosed,
            });
        }
        self.settings.validate()?;

        let options = StatementOptions {
            result_set_type: self.settings.result_set_type,
            stream_results: self.settings.stream_results,
        };
        let mut statement = create(connection, self.bound_sql.sql(), &options)
            .map_err(|source| StatementError::Preparation { kind, source })?;

        if let Err(source) = self.apply_settings(statement.as_mut(), transaction_timeout) {
            if let Err(close_error) = statement.close() {
                tracing::warn!(error = %close_error, "failed to close statement after preparation error");
            }
            return Err(StatementError::Preparation { kind, source });
        }

        tracing::debug!(driver = connection.driver_name(), "statement prepared");
        self.slot = Slot::Open(statement);
        Ok(())
    }

    fn apply_settings(&self, statement: &mut dyn DriverStatement, transaction_timeout: Option<u32>) -> DriverResult<()> {
        if let Some(timeout) = effective_timeout(self.settings.timeout, transaction_timeout) {
            statement.set_query_timeout(timeout)?;
        }
        if let Some(rows) = self.settings.fetch_size {
            statement.set_fetch_size(rows)?;
        }
        Ok(())
    }

    /// Hand the statement and bound SQL to the parameter binder
    pub(crate) fn bind_parameters(&mut self) -> Result<()> {
        let statement = open_statement(&mut self.slot, self.kind)?;
        self.binder.set_parameters(statement, &self.bound_sql)
    }

    /// Swap in new bound SQL for the same statement text
    pub(crate) fn replace_bound_sql(&mut self, bound_sql: BoundSql) -> Result<()> {
        self.ensure_open()?;
        if bound_sql.sql() != self.bound_sql.sql() {
            return Err(StatementError::binding(
                self.kind,
                "rebinding requires the SQL text the statement was prepared with",
            ));
        }
        tracing::trace!(statement_id = %bound_sql.mapped_statement().id, "rebinding statement");
        self.bound_sql = bound_sql;
        Ok(())
    }

    pub(crate) fn update(&mut self) -> Result<u64> {
        let to_error = execution_error(self.kind, Phase::Update);
        let statement = open_statement(&mut self.slot, self.kind)?;
        let count = statement.execute_update().map_err(to_error)?;
        self.collect_generated_keys()?;
        Ok(count)
    }

    /// Read the keys generated by the last update into the key properties
    pub(crate) fn collect_generated_keys(&mut self) -> Result<()> {
        self.generated_keys.clear();
        let KeyGeneration::Generated { key_properties } = &self.bound_sql.mapped_statement().key_generation
        else {
            return Ok(());
        };

        let to_error = execution_error(self.kind, Phase::Update);
        let statement = open_statement(&mut self.slot, self.kind)?;
        let keys = statement.generated_keys().map_err(to_error)?;
        if keys.len() < key_properties.len() {
            tracing::debug!(
                expected = key_properties.len(),
                generated = keys.len(),
                "driver returned fewer generated keys than key properties"
            );
        }
        self.generated_keys = key_properties.iter().cloned().zip(keys).collect();
        Ok(())
    }

    fn open_rows<'s>(
        &'s mut self,
        phase: Phase,
        origin: RowOrigin,
    ) -> Result<(Box<dyn RowSource + 's>, &'s ResultMapping)> {
        let to_error = execution_error(self.kind, phase);
        let statement = open_statement(&mut self.slot, self.kind)?;
        let rows = match origin {
            RowOrigin::Query => statement.execute_query(),
            RowOrigin::CallResults => statement.result_rows(),
        }
        .map_err(to_error)?;
        Ok((rows, &self.bound_sql.mapped_statement().result_mapping))
    }

    pub(crate) fn query<M: ResultMaterializer>(
        &mut self,
        origin: RowOrigin,
        materializer: &M,
        callback: Option<&mut dyn ResultCallback<M::Output>>,
    ) -> Result<Vec<M::Output>> {
        let (mut rows, mapping) = self.open_rows(Phase::Query, origin)?;
        let results = materializer.materialize(rows.as_mut(), mapping, callback)?;
        tracing::debug!(rows = results.len(), "query materialized");
        Ok(results)
    }

    pub(crate) fn cursor<'s, M: ResultMaterializer>(
        &'s mut self,
        origin: RowOrigin,
        materializer: M,
    ) -> Result<Cursor<'s, M>> {
        let kind = self.kind;
        let (rows, mapping) = self.open_rows(Phase::Cursor, origin)?;
        Ok(Cursor::new(kind, rows, materializer, mapping.clone()))
    }

    pub(crate) fn add_batch(&mut self) -> Result<()> {
        let to_error = execution_error(self.kind, Phase::Batch);
        let statement = open_statement(&mut self.slot, self.kind)?;
        statement.add_batch().map_err(to_error)?;
        tracing::trace!(pending = statement.pending_batch(), "batch entry queued");
        Ok(())
    }

    /// Execute the queued batch entries
    pub(crate) fn flush_batch(&mut self) -> Result<Vec<u64>> {
        let kind = self.kind;
        let statement = open_statement(&mut self.slot, kind)?;
        if statement.pending_batch() == 0 {
            return Ok(Vec::new());
        }
        statement.execute_batch().map_err(|failure| StatementError::Batch {
            kind,
            index: failure.index,
            update_counts: failure.update_counts,
            source: failure.error,
        })
    }

    pub(crate) fn close(&mut self) -> Result<()> {
        let kind = self.kind;
        match std::mem::replace(&mut self.slot, Slot::Closed) {
            Slot::Open(statement) => {
                let pending = statement.pending_batch();
                if pending > 0 {
                    tracing::warn!(pending, "discarding unflushed batch entries on close");
                }
                statement.close().map_err(|source| StatementError::Execution {
                    kind,
                    phase: Phase::Close,
                    source,
                })?;
                tracing::debug!("statement closed");
                Ok(())
            }
            Slot::Unprepared => Ok(()),
            Slot::Closed => Err(StatementError::AlreadyClosed { kind }),
        }
    }
}

impl Drop for StatementCore<'_> {
    fn drop(&mut self) {
        if let Slot::Open(statement) = std::mem::replace(&mut self.slot, Slot::Closed) {
            tracing::debug!(kind = %self.kind, "closing statement dropped while open");
            if let Err(e) = statement.close() {
                tracing::warn!(error = %e, "failed to close dropped statement");
            }
        }
    }
}
