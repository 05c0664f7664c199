//! Lazy cursors over query results

use std::iter::FusedIterator;

use stmtx_core::{ColumnMeta, Phase, Result, ResultMapping, RowSource, StatementError, StatementKind};

use crate::result::ResultMaterializer;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CursorState {
    Open,
    /// Every row was fetched
    Consumed,
    /// Closed by the caller or after a fetch error
    Closed,
}

/// Cursor that fetches and maps rows on demand.
///
/// The cursor borrows the statement that produced it, so the statement cannot
/// be closed while rows are still being read. The driver row source is
/// released on exhaustion, on a fetch error, on [`Cursor::close`] or on drop.
pub struct Cursor<'s, M: ResultMaterializer> {
    kind: StatementKind,
    rows: Option<Box<dyn RowSource + 's>>,
    materializer: M,
    mapping: ResultMapping,
    position: usize,
    state: CursorState,
}

impl<'s, M: ResultMaterializer> Cursor<'s, M> {
    pub(crate) fn new(
        kind: StatementKind,
        rows: Box<dyn RowSource + 's>,
        materializer: M,
        mapping: ResultMapping,
    ) -> Self {
        Self {
            kind,
            rows: Some(rows),
            materializer,
            mapping,
            position: 0,
            state: CursorState::Open,
        }
    }

    pub fn state(&self) -> CursorState {
        self.state
    }

    pub fn is_open(&self) -> bool {
        self.state == CursorState::Open
    }

    pub fn is_consumed(&self) -> bool {
        self.state == CursorState::Consumed
    }

    /// Number of rows fetched so far
    pub fn position(&self) -> usize {
        self.position
    }

    /// Column metadata, empty once the row source was released
    pub fn columns(&self) -> &[ColumnMeta] {
        self.rows.as_ref().map(|rows| rows.columns()).unwrap_or_default()
    }

    /// Release the row source without reading the remaining rows
    pub fn close(&mut self) {
        if self.rows.take().is_some() {
            tracing::debug!(rows = self.position, "cursor closed before exhaustion");
            self.state = CursorState::Closed;
        }
    }
}

impl<M: ResultMaterializer> Iterator for Cursor<'_, M> {
    type Item = Result<M::Output>;

    fn next(&mut self) -> Option<Self::Item> {
        let rows = self.rows.as_mut()?;
        match rows.next_row() {
            Ok(Some(row)) => {
                self.position += 1;
                Some(self.materializer.map_row(row, &self.mapping))
            }
            Ok(None) => {
                self.rows = None;
                self.state = CursorState::Consumed;
                tracing::debug!(rows = self.position, "cursor exhausted");
                None
            }
            Err(source) => {
                self.rows = None;
                self.state = CursorState::Closed;
                Some(Err(StatementError::Execution {
                    kind: self.kind,
                    phase: Phase::Cursor,
                    source,
                }))
            }
        }
    }
}

impl<M: ResultMaterializer> FusedIterator for Cursor<'_, M> {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::result::ScalarMaterializer;
    use stmtx_core::{BufferedRows, DriverError, DriverResult, Row, Value, column_names};

    fn source(count: i64) -> Box<dyn RowSource> {
        let columns = vec![ColumnMeta::new("id", "INTEGER", 0)];
        let names = column_names(&columns);
        let rows = (1..=count).map(|i| Row::new(names.clone(), vec![Value::Int64(i)]));
        Box::new(BufferedRows::new(columns, rows))
    }

    struct FailingRows {
        delivered: bool,
    }

    impl RowSource for FailingRows {
        fn columns(&self) -> &[ColumnMeta] {
            &[]
        }

        fn next_row(&mut self) -> DriverResult<Option<Row>> {
            if self.delivered {
                return Err(DriverError::Interrupted);
            }
            self.delivered = true;
            Ok(Some(Row::new(column_names(&[]), vec![Value::Int64(1)])))
        }
    }

    #[test]
    fn test_cursor_yields_in_order_then_ends() {
        let mut cursor = Cursor::new(
            StatementKind::Direct,
            source(3),
            ScalarMaterializer,
            ResultMapping::default(),
        );

        assert_eq!(cursor.columns().len(), 1);
        let values: Vec<_> = cursor.by_ref().map(|v| v.unwrap()).collect();
        assert_eq!(values, vec![Value::Int64(1), Value::Int64(2), Value::Int64(3)]);
        assert!(cursor.is_consumed());
        assert_eq!(cursor.position(), 3);
        assert!(cursor.next().is_none());
        assert!(cursor.columns().is_empty());
    }

    #[test]
    fn test_close_releases_rows() {
        let mut cursor = Cursor::new(
            StatementKind::Parameterized,
            source(3),
            ScalarMaterializer,
            ResultMapping::default(),
        );

        assert!(cursor.next().is_some());
        cursor.close();
        assert_eq!(cursor.state(), CursorState::Closed);
        assert!(cursor.next().is_none());
    }

    #[test]
    fn test_fetch_error_ends_cursor() {
        let mut cursor = Cursor::new(
            StatementKind::Direct,
            Box::new(FailingRows { delivered: false }),
            ScalarMaterializer,
            ResultMapping::default(),
        );

        assert!(cursor.next().unwrap().is_ok());
        let err = cursor.next().unwrap().unwrap_err();
        assert_eq!(err.phase(), Some(Phase::Cursor));
        assert!(cursor.next().is_none());
        assert_eq!(cursor.state(), CursorState::Closed);
    }
}
