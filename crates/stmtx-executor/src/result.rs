//! Result materialization
//!
//! A [`ResultMaterializer`] turns driver rows into caller-facing values. The
//! statement strategies hand it the open row source together with the
//! statement's [`ResultMapping`] and an optional per-row [`ResultCallback`].

use indexmap::IndexMap;
use stmtx_core::{Result, ResultMapping, Row, RowSource, StatementError, Value};

/// Decision returned by a [`ResultCallback`] after each row
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowFlow {
    Continue,
    /// Stop consuming rows; the remaining rows are discarded
    Stop,
}

/// Caller-supplied per-row callback.
///
/// When a callback is passed to `query`, mapped rows go to the callback and
/// the returned list stays empty.
pub trait ResultCallback<T> {
    fn on_result(&mut self, index: usize, item: T) -> RowFlow;
}

impl<T, F> ResultCallback<T> for F
where
    F: FnMut(usize, T) -> RowFlow,
{
    fn on_result(&mut self, index: usize, item: T) -> RowFlow {
        self(index, item)
    }
}

/// Maps rows into result values
pub trait ResultMaterializer {
    type Output;

    /// Map one row
    fn map_row(&self, row: Row, mapping: &ResultMapping) -> Result<Self::Output>;

    /// Consume `rows` until it is exhausted or the callback stops it
    fn materialize(
        &self,
        rows: &mut dyn RowSource,
        mapping: &ResultMapping,
        mut callback: Option<&mut dyn ResultCallback<Self::Output>>,
    ) -> Result<Vec<Self::Output>> {
        let mut results = Vec::new();
        let mut index = 0;

        while let Some(row) = rows.next_row().map_err(|e| {
            StatementError::ResultProcessing(format!("failed to fetch row {}: {}", index, e))
        })? {
            let item = self.map_row(row, mapping)?;
            match callback.as_mut() {
                Some(callback) => {
                    if callback.on_result(index, item) == RowFlow::Stop {
                        tracing::debug!(rows = index + 1, "result callback stopped row consumption");
                        break;
                    }
                }
                None => results.push(item),
            }
            index += 1;
        }

        Ok(results)
    }
}

impl<M: ResultMaterializer + ?Sized> ResultMaterializer for &M {
    type Output = M::Output;

    fn map_row(&self, row: Row, mapping: &ResultMapping) -> Result<Self::Output> {
        (**self).map_row(row, mapping)
    }

    fn materialize(
        &self,
        rows: &mut dyn RowSource,
        mapping: &ResultMapping,
        callback: Option<&mut dyn ResultCallback<Self::Output>>,
    ) -> Result<Vec<Self::Output>> {
        (**self).materialize(rows, mapping, callback)
    }
}

/// Returns rows unchanged
#[derive(Debug, Clone, Copy, Default)]
pub struct RowMaterializer;

impl ResultMaterializer for RowMaterializer {
    type Output = Row;

    fn map_row(&self, row: Row, _mapping: &ResultMapping) -> Result<Row> {
        Ok(row)
    }
}

/// Returns the first column of every row
#[derive(Debug, Clone, Copy, Default)]
pub struct ScalarMaterializer;

impl ResultMaterializer for ScalarMaterializer {
    type Output = Value;

    fn map_row(&self, row: Row, _mapping: &ResultMapping) -> Result<Value> {
        row.into_values()
            .into_iter()
            .next()
            .ok_or_else(|| StatementError::ResultProcessing("row has no columns".into()))
    }
}

/// Property name to value, in column order
pub type PropertyMap = IndexMap<String, Value>;

/// Maps each row onto properties named by the [`ResultMapping`].
///
/// Columns without a property (explicit or auto-mapped) are dropped.
#[derive(Debug, Clone, Copy, Default)]
pub struct PropertyMapMaterializer;

impl ResultMaterializer for PropertyMapMaterializer {
    type Output = PropertyMap;

    fn map_row(&self, row: Row, mapping: &ResultMapping) -> Result<PropertyMap> {
        let columns = row.columns().to_vec();
        let mut properties = PropertyMap::with_capacity(columns.len());
        for (column, value) in columns.iter().zip(row.into_values()) {
            if let Some(property) = mapping.property_for(column) {
                properties.insert(property.to_string(), value);
            }
        }
        Ok(properties)
    }
}

/// Materializer backed by a closure
pub struct FnMaterializer<F>(pub F);

impl<T, F> ResultMaterializer for FnMaterializer<F>
where
    F: Fn(Row) -> Result<T>,
{
    type Output = T;

    fn map_row(&self, row: Row, _mapping: &ResultMapping) -> Result<T> {
        (self.0)(row)
    }
}
