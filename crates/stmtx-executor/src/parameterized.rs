//! Parameterized strategy: prepared statements with positional placeholders

use std::sync::Arc;

use stmtx_core::{BoundSql, Connection, ExecutionSettings, Result, StatementKind};

use crate::cursor::Cursor;
use crate::handler::{GeneratedKeys, RowOrigin, StatementCore, StatementHandler};
use crate::parameter::ParameterBinder;
use crate::result::{ResultCallback, ResultMaterializer};

/// Prepares the SQL once and binds values through the [`ParameterBinder`].
///
/// The same prepared statement can be executed repeatedly with different
/// values through [`StatementHandler::rebind`].
pub struct ParameterizedStatement<'c> {
    core: StatementCore<'c>,
}

impl<'c> ParameterizedStatement<'c> {
    pub fn new(bound_sql: BoundSql, settings: ExecutionSettings, binder: Arc<dyn ParameterBinder>) -> Self {
        Self {
            core: StatementCore::new(StatementKind::Parameterized, bound_sql, settings, binder),
        }
    }

    pub(crate) fn core_mut(&mut self) -> &mut StatementCore<'c> {
        &mut self.core
    }
}

impl<'c> StatementHandler<'c> for ParameterizedStatement<'c> {
    fn kind(&self) -> StatementKind {
        StatementKind::Parameterized
    }

    #[tracing::instrument(skip_all, fields(kind = "parameterized", sql_preview = %self.core.bound_sql().sql_preview()))]
    fn prepare(&mut self, connection: &'c dyn Connection, transaction_timeout: Option<u32>) -> Result<()> {
        self.core.prepare(connection, transaction_timeout, |connection, sql, options| {
            connection.prepare_statement(sql, options)
        })
    }

    fn parameterize(&mut self) -> Result<()> {
        self.core.bind_parameters()
    }

    fn rebind(&mut self, bound_sql: BoundSql) -> Result<()> {
        self.core.replace_bound_sql(bound_sql)?;
        self.core.bind_parameters()
    }

    #[tracing::instrument(skip_all, fields(kind = "parameterized"))]
    fn update(&mut self) -> Result<u64> {
        self.core.update()
    }

    #[tracing::instrument(skip_all, fields(kind = "parameterized"))]
    fn query<M: ResultMaterializer>(
        &mut self,
        materializer: &M,
        callback: Option<&mut dyn ResultCallback<M::Output>>,
    ) -> Result<Vec<M::Output>> {
        self.core.query(RowOrigin::Query, materializer, callback)
    }

    fn query_cursor<'s, M: ResultMaterializer>(&'s mut self, materializer: M) -> Result<Cursor<'s, M>> {
        self.core.cursor(RowOrigin::Query, materializer)
    }

    fn batch(&mut self) -> Result<()> {
        self.core.add_batch()
    }

    fn close(&mut self) -> Result<()> {
        self.core.close()
    }

    fn bound_sql(&self) -> &BoundSql {
        self.core.bound_sql()
    }

    fn parameter_binder(&self) -> &dyn ParameterBinder {
        self.core.binder()
    }

    fn settings(&self) -> &ExecutionSettings {
        self.core.settings()
    }

    fn generated_keys(&self) -> &GeneratedKeys {
        self.core.generated_keys()
    }

    fn is_prepared(&self) -> bool {
        self.core.is_prepared()
    }

    fn is_closed(&self) -> bool {
        self.core.is_closed()
    }
}
