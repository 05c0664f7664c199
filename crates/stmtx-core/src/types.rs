//! Core value types for stmtx

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

/// A database value that can represent any SQL type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    /// NULL value
    Null,
    /// Boolean
    Bool(bool),
    /// 32-bit signed integer
    Int32(i32),
    /// 64-bit signed integer
    Int64(i64),
    /// 64-bit floating point
    Float64(f64),
    /// Decimal/Numeric (stored as string for precision)
    Decimal(String),
    /// UTF-8 string
    String(String),
    /// Binary data
    Bytes(Vec<u8>),
    /// UUID
    Uuid(Uuid),
    /// Date (year, month, day)
    Date(NaiveDate),
    /// Time (hour, minute, second, nanosecond)
    Time(NaiveTime),
    /// DateTime without timezone
    DateTime(NaiveDateTime),
    /// JSON value
    Json(serde_json::Value),
}

impl Value {
    /// Check if the value is NULL
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Try to get as a string
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Try to get as i64
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int32(v) => Some(*v as i64),
            Value::Int64(v) => Some(*v),
            Value::String(s) => s.parse::<i64>().ok(),
            _ => None,
        }
    }

    /// Try to get as f64
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float64(v) => Some(*v),
            Value::Int32(v) => Some(*v as f64),
            Value::Int64(v) => Some(*v as f64),
            Value::String(s) => s.parse::<f64>().ok(),
            _ => None,
        }
    }

    /// Try to get as bool
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(v) => Some(*v),
            _ => None,
        }
    }

    /// Name of the variant, used in diagnostics
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "Null",
            Value::Bool(_) => "Bool",
            Value::Int32(_) => "Int32",
            Value::Int64(_) => "Int64",
            Value::Float64(_) => "Float64",
            Value::Decimal(_) => "Decimal",
            Value::String(_) => "String",
            Value::Bytes(_) => "Bytes",
            Value::Uuid(_) => "Uuid",
            Value::Date(_) => "Date",
            Value::Time(_) => "Time",
            Value::DateTime(_) => "DateTime",
            Value::Json(_) => "Json",
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Bool(v) => write!(f, "{}", v),
            Value::Int32(v) => write!(f, "{}", v),
            Value::Int64(v) => write!(f, "{}", v),
            Value::Float64(v) => write!(f, "{}", v),
            Value::Decimal(v) => write!(f, "{}", v),
            Value::String(v) => write!(f, "{}", v),
            Value::Bytes(v) => write!(f, "<{} bytes>", v.len()),
            Value::Uuid(v) => write!(f, "{}", v),
            Value::Date(v) => write!(f, "{}", v),
            Value::Time(v) => write!(f, "{}", v),
            Value::DateTime(v) => write!(f, "{}", v),
            Value::Json(v) => write!(f, "{}", v),
        }
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int32(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int64(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float64(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}

/// Declared target type of a statement parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SqlType {
    Boolean,
    Integer,
    BigInt,
    Double,
    Decimal,
    Varchar,
    Blob,
    Uuid,
    Date,
    Time,
    Timestamp,
    Json,
    /// No declared type; any value is accepted as-is
    #[default]
    Other,
}

impl SqlType {
    /// Upper-case SQL name of the type
    pub fn name(&self) -> &'static str {
        match self {
            SqlType::Boolean => "BOOLEAN",
            SqlType::Integer => "INTEGER",
            SqlType::BigInt => "BIGINT",
            SqlType::Double => "DOUBLE",
            SqlType::Decimal => "DECIMAL",
            SqlType::Varchar => "VARCHAR",
            SqlType::Blob => "BLOB",
            SqlType::Uuid => "UUID",
            SqlType::Date => "DATE",
            SqlType::Time => "TIME",
            SqlType::Timestamp => "TIMESTAMP",
            SqlType::Json => "JSON",
            SqlType::Other => "OTHER",
        }
    }

    /// Whether a value may be bound to a parameter declared with this type.
    ///
    /// NULL is accepted by every type. Integers widen into `Double` and
    /// `Decimal`; `Other` accepts anything.
    pub fn accepts(&self, value: &Value) -> bool {
        if value.is_null() {
            return true;
        }
        match self {
            SqlType::Boolean => matches!(value, Value::Bool(_)),
            SqlType::Integer => match value {
                Value::Int32(_) => true,
                Value::Int64(v) => i32::try_from(*v).is_ok(),
                _ => false,
            },
            SqlType::BigInt => matches!(value, Value::Int32(_) | Value::Int64(_)),
            SqlType::Double => {
                matches!(value, Value::Float64(_) | Value::Int32(_) | Value::Int64(_))
            }
            SqlType::Decimal => matches!(
                value,
                Value::Decimal(_) | Value::Float64(_) | Value::Int32(_) | Value::Int64(_)
            ),
            SqlType::Varchar => matches!(value, Value::String(_)),
            SqlType::Blob => matches!(value, Value::Bytes(_)),
            SqlType::Uuid => matches!(value, Value::Uuid(_)),
            SqlType::Date => matches!(value, Value::Date(_)),
            SqlType::Time => matches!(value, Value::Time(_)),
            SqlType::Timestamp => matches!(value, Value::DateTime(_)),
            SqlType::Json => matches!(value, Value::Json(_) | Value::String(_)),
            SqlType::Other => true,
        }
    }

    /// Convert a value returned by a driver into this declared type.
    ///
    /// Returns `None` when no lossless conversion exists.
    pub fn coerce(&self, value: Value) -> Option<Value> {
        if value.is_null() || *self == SqlType::Other {
            return Some(value);
        }
        let coerced = match (self, value) {
            (SqlType::Boolean, Value::Int32(v)) => Value::Bool(v != 0),
            (SqlType::Boolean, Value::Int64(v)) => Value::Bool(v != 0),
            (SqlType::Integer, Value::Int64(v)) => Value::Int32(i32::try_from(v).ok()?),
            (SqlType::BigInt, Value::Int32(v)) => Value::Int64(v as i64),
            (SqlType::Double, Value::Int32(v)) => Value::Float64(v as f64),
            (SqlType::Double, Value::Int64(v)) => Value::Float64(v as f64),
            (SqlType::Decimal, Value::Int32(v)) => Value::Decimal(v.to_string()),
            (SqlType::Decimal, Value::Int64(v)) => Value::Decimal(v.to_string()),
            (SqlType::Decimal, Value::Float64(v)) => Value::Decimal(v.to_string()),
            (SqlType::Decimal, Value::String(v)) => Value::Decimal(v),
            (SqlType::Uuid, Value::String(v)) => Value::Uuid(v.parse().ok()?),
            (SqlType::Date, Value::String(v)) => Value::Date(v.parse().ok()?),
            (SqlType::Time, Value::String(v)) => Value::Time(v.parse().ok()?),
            (SqlType::Timestamp, Value::String(v)) => Value::DateTime(v.parse().ok()?),
            (SqlType::Json, Value::String(v)) => Value::Json(serde_json::from_str(&v).ok()?),
            (ty, v) if ty.accepts(&v) => v,
            _ => return None,
        };
        Some(coerced)
    }
}

impl fmt::Display for SqlType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A row from a query result
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    /// Column values
    pub values: Vec<Value>,
    /// Column names (shared by every row of one result)
    columns: Arc<[String]>,
}

impl Row {
    /// Create a new row
    pub fn new(columns: Arc<[String]>, values: Vec<Value>) -> Self {
        Self { values, columns }
    }

    /// Get a value by column index
    pub fn get(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }

    /// Get a value by column name
    pub fn get_by_name(&self, name: &str) -> Option<&Value> {
        self.columns
            .iter()
            .position(|c| c == name)
            .and_then(|idx| self.values.get(idx))
    }

    /// Get column names
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Number of values in the row
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Take ownership of the values
    pub fn into_values(self) -> Vec<Value> {
        self.values
    }

    /// Convert to a HashMap
    pub fn to_map(&self) -> HashMap<String, Value> {
        self.columns
            .iter()
            .zip(self.values.iter())
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }
}

/// Column metadata of a row source
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ColumnMeta {
    /// Column name
    #[serde(default)]
    pub name: String,
    /// Declared data type (database-specific string)
    #[serde(default)]
    pub data_type: String,
    /// Whether the column can be NULL
    #[serde(default)]
    pub nullable: bool,
    /// Column ordinal position (0-based)
    #[serde(default)]
    pub ordinal: usize,
}

impl ColumnMeta {
    pub fn new(name: impl Into<String>, data_type: impl Into<String>, ordinal: usize) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into(),
            nullable: true,
            ordinal,
        }
    }
}

/// Shared column-name list for rows built from the given column metadata
pub fn column_names(columns: &[ColumnMeta]) -> Arc<[String]> {
    columns.iter().map(|c| c.name.clone()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_null_is_accepted_by_every_type() {
        for ty in [SqlType::Boolean, SqlType::Integer, SqlType::Varchar, SqlType::Blob] {
            assert!(ty.accepts(&Value::Null), "{ty} should accept NULL");
        }
    }

    #[test]
    fn test_integer_rejects_out_of_range_int64() {
        assert!(SqlType::Integer.accepts(&Value::Int64(7)));
        assert!(!SqlType::Integer.accepts(&Value::Int64(i64::MAX)));
        assert!(SqlType::BigInt.accepts(&Value::Int64(i64::MAX)));
    }

    #[test]
    fn test_string_is_not_an_integer() {
        assert!(!SqlType::Integer.accepts(&Value::String("7".into())));
        assert!(!SqlType::Varchar.accepts(&Value::Int64(7)));
        assert!(SqlType::Other.accepts(&Value::Bytes(vec![1, 2])));
    }

    #[test]
    fn test_coerce_driver_values() {
        assert_eq!(SqlType::Boolean.coerce(Value::Int64(1)), Some(Value::Bool(true)));
        assert_eq!(SqlType::Integer.coerce(Value::Int64(42)), Some(Value::Int32(42)));
        assert_eq!(SqlType::Double.coerce(Value::Int64(2)), Some(Value::Float64(2.0)));
        assert_eq!(
            SqlType::Json.coerce(Value::String("{\"a\":1}".into())),
            Some(Value::Json(serde_json::json!({"a": 1})))
        );
        assert_eq!(SqlType::Integer.coerce(Value::String("x".into())), None);
        assert_eq!(SqlType::Varchar.coerce(Value::Null), Some(Value::Null));
    }

    #[test]
    fn test_row_lookup_by_name() {
        let columns: Arc<[String]> = vec!["id".to_string(), "name".to_string()].into();
        let row = Row::new(columns, vec![Value::Int64(1), Value::from("alice")]);

        assert_eq!(row.get_by_name("name"), Some(&Value::String("alice".into())));
        assert_eq!(row.get_by_name("missing"), None);
        assert_eq!(row.len(), 2);
    }
}
