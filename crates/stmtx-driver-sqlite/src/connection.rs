//! SQLite connection implementation

use rusqlite::{Connection as RusqliteConnection, InterruptHandle, OpenFlags};
use std::sync::Arc;
use stmtx_core::{
    Connection, DriverError, DriverResult, DriverStatement, QueryCancelHandle, StatementOptions,
};

use crate::statement::{SqliteStatement, StatementMode};
use crate::values::map_error;

/// Cancel handle for SQLite statements.
///
/// This wraps the rusqlite `InterruptHandle` and can be called from any thread
/// to interrupt a running statement. The interrupted statement fails with
/// [`DriverError::Interrupted`].
pub struct SqliteCancelHandle {
    interrupt_handle: Arc<InterruptHandle>,
}

impl QueryCancelHandle for SqliteCancelHandle {
    fn cancel(&self) {
        tracing::debug!("Interrupting SQLite statement");
        self.interrupt_handle.interrupt();
    }
}

/// SQLite connection wrapper
pub struct SqliteConnection {
    conn: RusqliteConnection,
    interrupt_handle: Arc<InterruptHandle>,
}

impl SqliteConnection {
    /// Open a SQLite database
    pub fn open(path: &str) -> DriverResult<Self> {
        tracing::info!(path = %path, "opening SQLite database");
        let expanded_path = Self::expand_path(path)?;

        let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
            | OpenFlags::SQLITE_OPEN_CREATE
            | OpenFlags::SQLITE_OPEN_URI
            | OpenFlags::SQLITE_OPEN_NO_MUTEX;

        let conn = if path == ":memory:" {
            RusqliteConnection::open_in_memory().map_err(|e| {
                DriverError::Other(format!("Failed to open in-memory database: {}", e))
            })?
        } else {
            if !expanded_path.starts_with("file:") {
                let file_path = std::path::Path::new(&expanded_path);
                if let Some(parent) = file_path.parent()
                    && !parent.exists()
                {
                    return Err(DriverError::Other(format!(
                        "Parent directory does not exist: {}",
                        parent.display()
                    )));
                }
            }

            RusqliteConnection::open_with_flags(&expanded_path, flags).map_err(|e| {
                DriverError::Other(format!(
                    "Failed to open SQLite database at '{}': {}",
                    expanded_path, e
                ))
            })?
        };

        conn.pragma_update(None, "foreign_keys", "ON")
            .map_err(|e| DriverError::Other(format!("Failed to enable foreign keys: {}", e)))?;

        // Must be taken before any statement borrows the connection
        let interrupt_handle = Arc::new(conn.get_interrupt_handle());

        tracing::info!(path = %expanded_path, "SQLite database connection established");
        Ok(Self {
            conn,
            interrupt_handle,
        })
    }

    pub fn open_in_memory() -> DriverResult<Self> {
        Self::open(":memory:")
    }

    /// Expand path to handle ~ (home directory) and relative paths
    fn expand_path(path: &str) -> DriverResult<String> {
        if path == ":memory:" || path.starts_with("file:") {
            return Ok(path.to_string());
        }

        let expanded = if let Some(rest) = path.strip_prefix("~/") {
            match std::env::var_os("HOME") {
                Some(home) => std::path::PathBuf::from(home)
                    .join(rest)
                    .to_string_lossy()
                    .to_string(),
                None => {
                    return Err(DriverError::Other(
                        "Unable to determine HOME directory".into(),
                    ));
                }
            }
        } else if path.starts_with('~') {
            return Err(DriverError::NotSupported(
                "User-specific home directories (~user) are not supported".into(),
            ));
        } else {
            path.to_string()
        };

        let path_buf = std::path::PathBuf::from(&expanded);
        let result = if path_buf.is_relative() {
            std::env::current_dir()
                .map_err(|e| DriverError::Other(e.to_string()))?
                .join(path_buf)
                .to_string_lossy()
                .to_string()
        } else {
            expanded
        };

        Ok(result)
    }

    /// Execute a script of `;`-separated statements, e.g. schema setup
    pub fn execute_script(&self, sql: &str) -> DriverResult<()> {
        tracing::debug!("executing SQL script");
        self.conn.execute_batch(sql).map_err(map_error)
    }

    /// Close the connection, reporting errors that a drop would swallow
    pub fn close(self) -> DriverResult<()> {
        tracing::debug!("closing SQLite connection");
        self.conn.close().map_err(|(_, e)| map_error(e))
    }

    #[tracing::instrument(skip(self, sql, options), fields(sql_preview = %sql.chars().take(100).collect::<String>()))]
    fn open_statement(
        &self,
        sql: &str,
        mode: StatementMode,
        options: &StatementOptions,
    ) -> DriverResult<Box<dyn DriverStatement + '_>> {
        if options.result_set_type.is_scrollable() {
            return Err(DriverError::NotSupported(format!(
                "SQLite result sets are forward-only, {:?} requested",
                options.result_set_type
            )));
        }
        let statement = SqliteStatement::new(&self.conn, sql, mode)?;
        Ok(Box::new(statement))
    }
}

impl Connection for SqliteConnection {
    fn driver_name(&self) -> &str {
        "sqlite"
    }

    fn create_statement(
        &self,
        sql: &str,
        options: &StatementOptions,
    ) -> DriverResult<Box<dyn DriverStatement + '_>> {
        self.open_statement(sql, StatementMode::Plain, options)
    }

    fn prepare_statement(
        &self,
        sql: &str,
        options: &StatementOptions,
    ) -> DriverResult<Box<dyn DriverStatement + '_>> {
        self.open_statement(sql, StatementMode::Prepared, options)
    }

    fn prepare_call(
        &self,
        sql: &str,
        options: &StatementOptions,
    ) -> DriverResult<Box<dyn DriverStatement + '_>> {
        self.open_statement(sql, StatementMode::Callable, options)
    }

    fn is_closed(&self) -> bool {
        false
    }

    fn cancel_handle(&self) -> Option<Arc<dyn QueryCancelHandle>> {
        Some(Arc::new(SqliteCancelHandle {
            interrupt_handle: self.interrupt_handle.clone(),
        }))
    }
}
