//! Statement execution for stmtx
//!
//! Turns a [`BoundSql`](stmtx_core::BoundSql) into a driver-level execution.
//! The [`StatementRouter`] is the entry point: it selects one of three
//! strategies from the mapped statement's kind, and every strategy follows the
//! same lifecycle:
//!
//! 1. `prepare` - obtain a driver statement and apply timeout / fetch size
//! 2. `parameterize` - bind parameters (a no-op for direct statements)
//! 3. `update`, `query`, `query_cursor` or `batch`
//! 4. `close` - release the driver statement
//!
//! ```no_run
//! # use std::sync::Arc;
//! # use stmtx_core::*;
//! # use stmtx_executor::*;
//! # fn example(connection: &dyn Connection) -> stmtx_core::Result<()> {
//! let statement = Arc::new(MappedStatement::new("insertT", StatementKind::Parameterized));
//! let bound = BoundSql::new(statement, "INSERT INTO t(id) VALUES (?)").bind("id", SqlType::Integer, 7);
//!
//! let router = StatementRouter::default();
//! let inserted = router
//!     .route(bound)?
//!     .run(connection, None, |handler| handler.update())?;
//! assert_eq!(inserted, 1);
//! # Ok(())
//! # }
//! ```

mod batch;
mod cursor;
mod direct;
mod handler;
mod parameter;
mod parameterized;
mod procedural;
mod result;
mod router;

pub use batch::{BatchOutcome, flush_batch};
pub use cursor::{Cursor, CursorState};
pub use direct::DirectStatement;
pub use handler::{GeneratedKeys, OutParameters, StatementHandler, effective_timeout};
pub use parameter::{DefaultParameterBinder, ParameterBinder};
pub use parameterized::ParameterizedStatement;
pub use procedural::ProceduralStatement;
pub use result::{
    FnMaterializer, PropertyMap, PropertyMapMaterializer, ResultCallback, ResultMaterializer,
    RowFlow, RowMaterializer, ScalarMaterializer,
};
pub use router::{RoutedStatement, StatementRouter};
