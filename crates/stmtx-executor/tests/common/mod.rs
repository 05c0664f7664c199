//! Shared fixtures for executor integration tests

use std::sync::Arc;

use stmtx_core::{BoundSql, MappedStatement, StatementKind};
use stmtx_driver_sqlite::SqliteConnection;
use tracing_subscriber::EnvFilter;

/// Route test logs through the test harness; `RUST_LOG` selects the level
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// In-memory database with an empty `t(id)` table and a seeded `users` table
pub fn setup_test_database() -> SqliteConnection {
    init_tracing();
    let conn = SqliteConnection::open_in_memory().expect("Failed to open in-memory database");
    conn.execute_script(
        r#"CREATE TABLE t (id INTEGER PRIMARY KEY);
        CREATE TABLE users (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_name TEXT NOT NULL UNIQUE,
            balance REAL NOT NULL DEFAULT 0.0
        );
        INSERT INTO users (user_name, balance) VALUES ('alice', 10.5), ('bob', 3.0), ('carol', 0.0);"#,
    )
    .expect("Failed to setup schema");
    conn
}

pub fn mapped(id: &str, kind: StatementKind) -> Arc<MappedStatement> {
    Arc::new(MappedStatement::new(id, kind))
}

pub fn bound(id: &str, kind: StatementKind, sql: &str) -> BoundSql {
    BoundSql::new(mapped(id, kind), sql)
}
