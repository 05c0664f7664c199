//! Procedural strategy: stored-routine calls with output parameters
//!
//! Output and in-out slots are registered with the driver before the input
//! values are bound. After every execution the output values are read back in
//! declaration order, coerced to their declared types and exposed through
//! [`ProceduralStatement::out_parameters`].

use std::sync::Arc;

use stmtx_core::{
    BoundSql, Connection, DriverStatement, ExecutionSettings, Phase, Result, StatementError, StatementKind,
};

use crate::cursor::Cursor;
use crate::handler::{GeneratedKeys, OutParameters, RowOrigin, StatementCore, StatementHandler, execution_error};
use crate::parameter::ParameterBinder;
use crate::result::{ResultCallback, ResultMaterializer};

pub struct ProceduralStatement<'c> {
    core: StatementCore<'c>,
    out_parameters: OutParameters,
}

impl<'c> ProceduralStatement<'c> {
    pub fn new(bound_sql: BoundSql, settings: ExecutionSettings, binder: Arc<dyn ParameterBinder>) -> Self {
        Self {
            core: StatementCore::new(StatementKind::Procedural, bound_sql, settings, binder),
            out_parameters: OutParameters::new(),
        }
    }

    /// Output values of the last execution, by property
    pub fn out_parameters(&self) -> &OutParameters {
        &self.out_parameters
    }

    pub(crate) fn core_mut(&mut self) -> &mut StatementCore<'c> {
        &mut self.core
    }

    fn register_out_parameters(&mut self) -> Result<()> {
        let kind = self.core.kind();
        let (statement, bound_sql) = self.core.parts()?;
        for (position, mapping) in bound_sql.parameter_mappings().iter().enumerate() {
            if !mapping.mode().is_output() {
                continue;
            }
            statement
                .register_out_parameter(position + 1, mapping.sql_type(), mapping.mode())
                .map_err(|source| StatementError::ParameterBinding {
                    kind,
                    message: format!(
                        "failed to register {} parameter '{}' at position {}",
                        mapping.mode(),
                        mapping.property(),
                        position + 1
                    ),
                    source: Some(source),
                })?;
        }
        Ok(())
    }

    /// Run the call and read its output parameters back
    fn call(&mut self, phase: Phase) -> Result<u64> {
        self.out_parameters.clear();
        let kind = self.core.kind();
        let (statement, bound_sql) = self.core.parts()?;
        let count = statement.execute_call().map_err(execution_error(kind, phase))?;
        let outputs = read_out_parameters(&*statement, bound_sql, kind, phase)?;
        tracing::debug!(outputs = outputs.len(), "routine call executed");
        self.out_parameters = outputs;
        Ok(count)
    }
}

fn read_out_parameters(
    statement: &dyn DriverStatement,
    bound_sql: &BoundSql,
    kind: StatementKind,
    phase: Phase,
) -> Result<OutParameters> {
    let mut outputs = OutParameters::new();
    for (position, mapping) in bound_sql.parameter_mappings().iter().enumerate() {
        if !mapping.mode().is_output() {
            continue;
        }
        let raw = statement
            .out_parameter(position + 1)
            .map_err(execution_error(kind, phase))?;
        let returned = raw.type_name();
        let value = mapping.sql_type().coerce(raw).ok_or_else(|| {
            StatementError::ResultProcessing(format!(
                "output parameter '{}' returned {} which is not {}",
                mapping.property(),
                returned,
                mapping.sql_type()
            ))
        })?;
        outputs.insert(mapping.property().to_string(), value);
    }
    Ok(outputs)
}

impl<'c> StatementHandler<'c> for ProceduralStatement<'c> {
    fn kind(&self) -> StatementKind {
        StatementKind::Procedural
    }

    #[tracing::instrument(skip_all, fields(kind = "procedural", sql_preview = %self.core.bound_sql().sql_preview()))]
    fn prepare(&mut self, connection: &'c dyn Connection, transaction_timeout: Option<u32>) -> Result<()> {
        self.core.prepare(connection, transaction_timeout, |connection, sql, options| {
            connection.prepare_call(sql, options)
        })
    }

    fn parameterize(&mut self) -> Result<()> {
        self.register_out_parameters()?;
        self.core.bind_parameters()
    }

    fn rebind(&mut self, bound_sql: BoundSql) -> Result<()> {
        self.core.replace_bound_sql(bound_sql)?;
        self.parameterize()
    }

    #[tracing::instrument(skip_all, fields(kind = "procedural"))]
    fn update(&mut self) -> Result<u64> {
        let count = self.call(Phase::Update)?;
        self.core.collect_generated_keys()?;
        Ok(count)
    }

    #[tracing::instrument(skip_all, fields(kind = "procedural"))]
    fn query<M: ResultMaterializer>(
        &mut self,
        materializer: &M,
        callback: Option<&mut dyn ResultCallback<M::Output>>,
    ) -> Result<Vec<M::Output>> {
        self.call(Phase::Query)?;
        self.core.query(RowOrigin::CallResults, materializer, callback)
    }

    fn query_cursor<'s, M: ResultMaterializer>(&'s mut self, materializer: M) -> Result<Cursor<'s, M>> {
        self.call(Phase::Cursor)?;
        self.core.cursor(RowOrigin::CallResults, materializer)
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
