//! Flushing queued batch entries
//!
//! Entries are queued with [`StatementHandler::batch`] and executed by
//! [`flush_batch`]. Entries still queued when the statement is closed are
//! discarded.

use stmtx_core::Result;

use crate::handler::StatementHandler;
use crate::router::RoutedStatement;

/// Update counts of a flushed batch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchOutcome {
    pub sql: String,
    /// One count per entry, in addition order
    pub update_counts: Vec<u64>,
}

impl BatchOutcome {
    pub fn len(&self) -> usize {
        self.update_counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.update_counts.is_empty()
    }

    /// Sum of all update counts
    pub fn total_rows(&self) -> u64 {
        self.update_counts.iter().sum()
    }
}

/// Execute every queued entry of `statement` in addition order.
///
/// A failing entry stops the flush; the resulting
/// [`StatementError::Batch`](stmtx_core::StatementError::Batch) carries the
/// counts of the entries before it. Flushing with nothing queued returns an
/// empty outcome.
#[tracing::instrument(skip_all, fields(kind = %statement.kind()))]
pub fn flush_batch(statement: &mut RoutedStatement<'_>) -> Result<BatchOutcome> {
    let sql = statement.bound_sql().sql().to_string();
    let update_counts = statement.core_mut().flush_batch()?;
    tracing::debug!(entries = update_counts.len(), "batch flushed");
    Ok(BatchOutcome { sql, update_counts })
}
