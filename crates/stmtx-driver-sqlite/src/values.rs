//! Conversions between stmtx values and rusqlite values

use rusqlite::types::{Value as SqliteValue, ValueRef};
use rusqlite::{ErrorCode, Statement};
use stmtx_core::{ColumnMeta, DriverError, DriverResult, Value};

pub(crate) fn value_to_rusqlite(value: &Value) -> SqliteValue {
    match value {
        Value::Null => SqliteValue::Null,
        Value::Bool(b) => SqliteValue::Integer(if *b { 1 } else { 0 }),
        Value::Int32(i) => SqliteValue::Integer(*i as i64),
        Value::Int64(i) => SqliteValue::Integer(*i),
        Value::Float64(f) => SqliteValue::Real(*f),
        Value::Decimal(d) => SqliteValue::Text(d.clone()),
        Value::String(s) => SqliteValue::Text(s.clone()),
        Value::Bytes(b) => SqliteValue::Blob(b.clone()),
        Value::Uuid(u) => SqliteValue::Text(u.to_string()),
        Value::Date(d) => SqliteValue::Text(d.to_string()),
        Value::Time(t) => SqliteValue::Text(t.to_string()),
        Value::DateTime(dt) => SqliteValue::Text(dt.to_string()),
        Value::Json(j) => SqliteValue::Text(j.to_string()),
    }
}

/// Convert a rusqlite row value to our Value type
pub(crate) fn rusqlite_to_value(row: &rusqlite::Row<'_>, idx: usize) -> DriverResult<Value> {
    let value_ref = row.get_ref(idx).map_err(map_error)?;

    let value = match value_ref {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::Int64(i),
        ValueRef::Real(f) => Value::Float64(f),
        ValueRef::Text(s) => Value::String(String::from_utf8_lossy(s).to_string()),
        ValueRef::Blob(b) => Value::Bytes(b.to_vec()),
    };

    Ok(value)
}

/// Read every column of `row`
pub(crate) fn row_values(row: &rusqlite::Row<'_>, column_count: usize) -> DriverResult<Vec<Value>> {
    (0..column_count).map(|i| rusqlite_to_value(row, i)).collect()
}

/// Column metadata of a prepared statement, with declared types where known
pub(crate) fn column_meta(stmt: &Statement<'_>) -> Vec<ColumnMeta> {
    stmt.columns()
        .iter()
        .enumerate()
        .map(|(idx, col)| ColumnMeta::new(col.name(), col.decl_type().unwrap_or("DYNAMIC"), idx))
        .collect()
}

pub(crate) fn map_error(error: rusqlite::Error) -> DriverError {
    match &error {
        rusqlite::Error::SqliteFailure(failure, message) => {
            let message = message.clone().unwrap_or_else(|| error.to_string());
            match failure.code {
                ErrorCode::ConstraintViolation => DriverError::Constraint(message),
                ErrorCode::OperationInterrupted => DriverError::Interrupted,
                ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked => DriverError::Timeout(message),
                _ => DriverError::Other(message),
            }
        }
        rusqlite::Error::InvalidParameterCount(..) | rusqlite::Error::InvalidParameterName(_) => {
            DriverError::Parameter(error.to_string())
        }
        _ => DriverError::Other(error.to_string()),
    }
}

/// Errors raised while compiling SQL are reported as invalid SQL
pub(crate) fn map_prepare_error(error: rusqlite::Error) -> DriverError {
    match &error {
        rusqlite::Error::SqliteFailure(failure, message) if failure.code == ErrorCode::Unknown => {
            DriverError::InvalidSql(message.clone().unwrap_or_else(|| error.to_string()))
        }
        rusqlite::Error::SqlInputError { msg, .. } => DriverError::InvalidSql(msg.clone()),
        rusqlite::Error::MultipleStatement => DriverError::InvalidSql(error.to_string()),
        _ => map_error(error),
    }
}
