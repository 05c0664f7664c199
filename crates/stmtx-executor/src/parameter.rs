//! Parameter binding
//!
//! Writes the values of a [`BoundSql`] onto a prepared driver statement, one
//! slot per parameter mapping, in declaration order.

use stmtx_core::{BoundSql, DriverStatement, Result, StatementError};

/// Binds parameter values onto a driver statement
pub trait ParameterBinder: Send + Sync {
    /// Bind every input parameter of `bound_sql` onto `statement`.
    ///
    /// Output-only parameters are skipped; their slots are registered by the
    /// procedural strategy before binding.
    fn set_parameters(&self, statement: &mut dyn DriverStatement, bound_sql: &BoundSql) -> Result<()>;
}

/// Binder that validates count and declared types before binding
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultParameterBinder;

impl ParameterBinder for DefaultParameterBinder {
    fn set_parameters(&self, statement: &mut dyn DriverStatement, bound_sql: &BoundSql) -> Result<()> {
        let kind = bound_sql.statement_kind();
        let mappings = bound_sql.parameter_mappings();

        let expected = statement.parameter_count();
        if mappings.len() != expected {
            return Err(StatementError::binding(
                kind,
                format!("expected {} parameters, got {}", expected, mappings.len()),
            ));
        }

        for (position, mapping) in mappings.iter().enumerate() {
            if !mapping.mode().is_input() {
                continue;
            }
            let index = position + 1;
            let property = mapping.property();

            let value = bound_sql.parameter(property).ok_or_else(|| {
                StatementError::binding(
                    kind,
                    format!("no value for parameter '{}' at position {}", property, index),
                )
            })?;

            if !mapping.sql_type().accepts(value) {
                return Err(StatementError::binding(
                    kind,
                    format!(
                        "parameter '{}' at position {} expects {} but got {}",
                        property,
                        index,
                        mapping.sql_type(),
                        value.type_name()
                    ),
                ));
            }

            statement
                .bind(index, value)
                .map_err(|source| StatementError::ParameterBinding {
                    kind,
                    message: format!("driver rejected parameter '{}' at position {}", property, index),
                    source: Some(source),
                })?;
        }

        tracing::debug!(parameter_count = mappings.len(), "parameters bound");
        Ok(())
    }
}
