//! Bound SQL: final statement text plus its ordered parameter mappings

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::{MappedStatement, SqlType, StatementKind, Value};

/// Direction of a statement parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParameterMode {
    #[default]
    In,
    Out,
    InOut,
}

impl ParameterMode {
    /// Whether a value is sent to the driver for this parameter
    pub fn is_input(&self) -> bool {
        matches!(self, ParameterMode::In | ParameterMode::InOut)
    }

    /// Whether a value is read back from the driver for this parameter
    pub fn is_output(&self) -> bool {
        matches!(self, ParameterMode::Out | ParameterMode::InOut)
    }
}

impl fmt::Display for ParameterMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ParameterMode::In => "IN",
            ParameterMode::Out => "OUT",
            ParameterMode::InOut => "INOUT",
        };
        f.write_str(name)
    }
}

/// Descriptor of one positional parameter
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ParameterMapping {
    property: String,
    sql_type: SqlType,
    mode: ParameterMode,
}

impl ParameterMapping {
    pub fn new(property: impl Into<String>, sql_type: SqlType, mode: ParameterMode) -> Self {
        Self {
            property: property.into(),
            sql_type,
            mode,
        }
    }

    pub fn input(property: impl Into<String>, sql_type: SqlType) -> Self {
        Self::new(property, sql_type, ParameterMode::In)
    }

    pub fn output(property: impl Into<String>, sql_type: SqlType) -> Self {
        Self::new(property, sql_type, ParameterMode::Out)
    }

    pub fn in_out(property: impl Into<String>, sql_type: SqlType) -> Self {
        Self::new(property, sql_type, ParameterMode::InOut)
    }

    pub fn property(&self) -> &str {
        &self.property
    }

    pub fn sql_type(&self) -> SqlType {
        self.sql_type
    }

    pub fn mode(&self) -> ParameterMode {
        self.mode
    }
}

/// SQL text ready for execution together with its parameters.
///
/// A `BoundSql` is immutable once built: executing the same text with other
/// values requires a new instance. Values are looked up by the property name
/// of each [`ParameterMapping`].
#[derive(Debug, Clone)]
pub struct BoundSql {
    sql: String,
    parameter_mappings: Vec<ParameterMapping>,
    parameters: HashMap<String, Value>,
    mapped_statement: Arc<MappedStatement>,
}

impl BoundSql {
    pub fn new(mapped_statement: Arc<MappedStatement>, sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            parameter_mappings: Vec::new(),
            parameters: HashMap::new(),
            mapped_statement,
        }
    }

    /// Append a parameter mapping (builder)
    pub fn with_mapping(mut self, mapping: ParameterMapping) -> Self {
        self.parameter_mappings.push(mapping);
        self
    }

    /// Set the value of a property (builder)
    pub fn with_parameter(mut self, property: impl Into<String>, value: impl Into<Value>) -> Self {
        self.parameters.insert(property.into(), value.into());
        self
    }

    /// Append an input mapping and its value in one step (builder)
    pub fn bind(self, property: impl Into<String>, sql_type: SqlType, value: impl Into<Value>) -> Self {
        let property = property.into();
        self.with_mapping(ParameterMapping::input(property.clone(), sql_type))
            .with_parameter(property, value)
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn parameter_mappings(&self) -> &[ParameterMapping] {
        &self.parameter_mappings
    }

    /// Value supplied for a property, if any
    pub fn parameter(&self, property: &str) -> Option<&Value> {
        self.parameters.get(property)
    }

    pub fn has_parameter(&self, property: &str) -> bool {
        self.parameters.contains_key(property)
    }

    pub fn mapped_statement(&self) -> &Arc<MappedStatement> {
        &self.mapped_statement
    }

    pub fn statement_kind(&self) -> StatementKind {
        self.mapped_statement.kind
    }

    /// Short prefix of the SQL text for log fields
    pub fn sql_preview(&self) -> String {
        self.sql.chars().take(100).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn insert_statement() -> Arc<MappedStatement> {
        Arc::new(MappedStatement::new("insertT", StatementKind::Parameterized))
    }

    #[test]
    fn test_builder_keeps_declaration_order() {
        let bound = BoundSql::new(insert_statement(), "INSERT INTO t(id, name) VALUES (?, ?)")
            .bind("id", SqlType::Integer, 7)
            .bind("name", SqlType::Varchar, "seven");

        let properties: Vec<&str> = bound
            .parameter_mappings()
            .iter()
            .map(|m| m.property())
            .collect();
        assert_eq!(properties, vec!["id", "name"]);
        assert_eq!(bound.parameter("id"), Some(&Value::Int32(7)));
        assert_eq!(bound.statement_kind(), StatementKind::Parameterized);
    }

    #[test]
    fn test_output_mapping_needs_no_value() {
        let bound = BoundSql::new(insert_statement(), "SELECT ? * 2")
            .bind("x", SqlType::Integer, 21)
            .with_mapping(ParameterMapping::output("doubled", SqlType::Integer));

        assert!(!bound.has_parameter("doubled"));
        assert!(bound.parameter_mappings()[1].mode().is_output());
        assert!(!bound.parameter_mappings()[1].mode().is_input());
    }

    #[test]
    fn test_in_out_mode_is_both_directions() {
        assert!(ParameterMode::InOut.is_input());
        assert!(ParameterMode::InOut.is_output());
        assert_eq!(ParameterMode::InOut.to_string(), "INOUT");
    }
}
