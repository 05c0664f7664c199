/// Integration tests for the SQLite driver statements
use pretty_assertions::assert_eq;
use stmtx_core::{
    Connection, DriverError, ParameterMode, ResultSetType, RowSource, SqlType, StatementOptions, Value,
};
use stmtx_driver_sqlite::SqliteConnection;

/// Helper to create an in-memory database with a `users` table
fn setup_test_database() -> SqliteConnection {
    let conn = SqliteConnection::open_in_memory().expect("Failed to open in-memory database");
    conn.execute_script(
        r#"CREATE TABLE users (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            username TEXT NOT NULL UNIQUE,
            balance REAL DEFAULT 0.0
        );
        INSERT INTO users (username, balance) VALUES ('alice', 10.5), ('bob', 3.0);"#,
    )
    .expect("Failed to setup schema");
    conn
}

fn drain(rows: &mut dyn RowSource) -> Vec<Vec<Value>> {
    let mut out = Vec::new();
    while let Some(row) = rows.next_row().unwrap() {
        out.push(row.into_values());
    }
    out
}

#[test]
fn test_plain_statement_query() {
    let conn = setup_test_database();
    let mut stmt = conn
        .create_statement("SELECT username FROM users ORDER BY id", &StatementOptions::default())
        .unwrap();

    assert_eq!(stmt.parameter_count(), 0);
    let mut rows = stmt.execute_query().unwrap();
    assert_eq!(rows.columns()[0].name, "username");
    assert_eq!(rows.columns()[0].data_type, "TEXT");
    assert_eq!(
        drain(rows.as_mut()),
        vec![
            vec![Value::String("alice".into())],
            vec![Value::String("bob".into())]
        ]
    );
    drop(rows);
    stmt.close().unwrap();
}

#[test]
fn test_plain_statement_rejects_placeholders_and_binds() {
    let conn = setup_test_database();

    let err = conn
        .create_statement("SELECT * FROM users WHERE id = ?", &StatementOptions::default())
        .err()
        .unwrap();
    assert!(matches!(err, DriverError::InvalidSql(_)));

    let mut stmt = conn
        .create_statement("SELECT 1", &StatementOptions::default())
        .unwrap();
    assert!(matches!(
        stmt.bind(1, &Value::Int64(1)),
        Err(DriverError::NotSupported(_))
    ));
}

#[test]
fn test_prepared_statement_update_and_generated_key() {
    let conn = setup_test_database();
    let mut stmt = conn
        .prepare_statement(
            "INSERT INTO users (username, balance) VALUES (?, ?)",
            &StatementOptions::default(),
        )
        .unwrap();

    assert_eq!(stmt.parameter_count(), 2);
    stmt.bind(1, &Value::String("carol".into())).unwrap();
    stmt.bind(2, &Value::Float64(1.25)).unwrap();

    assert_eq!(stmt.execute_update().unwrap(), 1);
    assert_eq!(stmt.generated_keys().unwrap(), vec![Value::Int64(3)]);
}

#[test]
fn test_prepared_statement_requires_every_placeholder() {
    let conn = setup_test_database();
    let mut stmt = conn
        .prepare_statement(
            "UPDATE users SET balance = ? WHERE username = ?",
            &StatementOptions::default(),
        )
        .unwrap();

    stmt.bind(1, &Value::Float64(0.0)).unwrap();
    assert!(matches!(stmt.execute_update(), Err(DriverError::Parameter(_))));
    assert!(matches!(
        stmt.bind(3, &Value::Null),
        Err(DriverError::Parameter(_))
    ));
}

#[test]
fn test_invalid_sql_fails_at_prepare() {
    let conn = setup_test_database();
    let err = conn
        .prepare_statement("SELEC id FROM users", &StatementOptions::default())
        .err()
        .unwrap();
    assert!(matches!(err, DriverError::InvalidSql(_)));
}

#[test]
fn test_scrollable_result_sets_are_not_supported() {
    let conn = setup_test_database();
    let options = StatementOptions {
        result_set_type: ResultSetType::ScrollSensitive,
        stream_results: false,
    };
    let err = conn.prepare_statement("SELECT 1", &options).err().unwrap();
    assert!(matches!(err, DriverError::NotSupported(_)));
}

#[test]
fn test_batch_reports_counts_and_failure_index() {
    let conn = setup_test_database();
    let mut stmt = conn
        .prepare_statement("INSERT INTO users (username) VALUES (?)", &StatementOptions::default())
        .unwrap();

    for name in ["dave", "alice", "erin"] {
        stmt.bind(1, &Value::String(name.into())).unwrap();
        stmt.add_batch().unwrap();
    }
    assert_eq!(stmt.pending_batch(), 3);

    let failure = stmt.execute_batch().unwrap_err();
    assert_eq!(failure.index, 1);
    assert_eq!(failure.update_counts, vec![1]);
    assert!(matches!(failure.error, DriverError::Constraint(_)));
    assert_eq!(stmt.pending_batch(), 0);
}

#[test]
fn test_call_reads_outputs_from_first_row() {
    let conn = setup_test_database();
    let mut call = conn
        .prepare_call(
            "INSERT INTO users (username, balance) VALUES (?, ?) RETURNING id, balance",
            &StatementOptions::default(),
        )
        .unwrap();

    call.register_out_parameter(3, SqlType::BigInt, ParameterMode::Out).unwrap();
    call.register_out_parameter(4, SqlType::Double, ParameterMode::Out).unwrap();
    assert_eq!(call.parameter_count(), 4);

    call.bind(1, &Value::String("frank".into())).unwrap();
    call.bind(2, &Value::Float64(7.5)).unwrap();
    assert!(matches!(call.bind(3, &Value::Null), Err(DriverError::Parameter(_))));
    assert!(call.out_parameter(3).is_err());

    assert_eq!(call.execute_call().unwrap(), 1);
    assert_eq!(call.out_parameter(3).unwrap(), Value::Int64(3));
    assert_eq!(call.out_parameter(4).unwrap(), Value::Float64(7.5));

    let mut rows = call.result_rows().unwrap();
    assert_eq!(drain(rows.as_mut()), vec![vec![Value::Int64(3), Value::Float64(7.5)]]);
}

#[test]
fn test_call_in_out_parameter_shares_slot() {
    let conn = setup_test_database();
    let mut call = conn
        .prepare_call("SELECT ? * 2", &StatementOptions::default())
        .unwrap();

    call.register_out_parameter(1, SqlType::BigInt, ParameterMode::InOut).unwrap();
    assert_eq!(call.parameter_count(), 1);
    call.bind(1, &Value::Int64(21)).unwrap();

    assert_eq!(call.execute_call().unwrap(), 0);
    assert_eq!(call.out_parameter(1).unwrap(), Value::Int64(42));
}

#[test]
fn test_call_rejects_batch_and_plain_rejects_outputs() {
    let conn = setup_test_database();
    let mut call = conn
        .prepare_call("SELECT 1", &StatementOptions::default())
        .unwrap();
    assert!(matches!(call.add_batch(), Err(DriverError::NotSupported(_))));

    let mut prepared = conn
        .prepare_statement("SELECT 1", &StatementOptions::default())
        .unwrap();
    assert!(matches!(
        prepared.register_out_parameter(1, SqlType::Integer, ParameterMode::Out),
        Err(DriverError::NotSupported(_))
    ));
    assert!(matches!(prepared.execute_call(), Err(DriverError::NotSupported(_))));
}

#[test]
fn test_timeout_and_fetch_size_are_recorded() {
    let conn = setup_test_database();
    let mut stmt = conn
        .prepare_statement("SELECT 1", &StatementOptions::default())
        .unwrap();

    stmt.set_query_timeout(5).unwrap();
    stmt.set_fetch_size(100).unwrap();
    assert_eq!(stmt.query_timeout(), Some(5));
    assert_eq!(stmt.fetch_size(), Some(100));
}

#[test]
fn test_file_database_persists() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("stmtx.db");
    let path = path.to_str().unwrap();

    let conn = SqliteConnection::open(path).unwrap();
    conn.execute_script("CREATE TABLE t (id INTEGER); INSERT INTO t VALUES (1);")
        .unwrap();
    conn.close().unwrap();

    let conn = SqliteConnection::open(path).unwrap();
    let mut stmt = conn
        .create_statement("SELECT count(*) FROM t", &StatementOptions::default())
        .unwrap();
    let mut rows = stmt.execute_query().unwrap();
    assert_eq!(drain(rows.as_mut()), vec![vec![Value::Int64(1)]]);
}

#[test]
fn test_missing_parent_directory_fails() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("missing").join("stmtx.db");
    assert!(SqliteConnection::open(path.to_str().unwrap()).is_err());
}

#[test]
fn test_cancel_handle_is_available() {
    let conn = setup_test_database();
    assert_eq!(conn.driver_name(), "sqlite");
    assert!(!conn.is_closed());
    let handle = conn.cancel_handle().expect("SQLite supports cancellation");
    handle.cancel();
}

#[test]
fn test_generated_key_follows_last_insert_rowid() {
    let conn = setup_test_database();
    let options = StatementOptions::default();

    let mut with_insert = conn
        .prepare_statement(
            "WITH v(name) AS (SELECT ?) INSERT INTO users (username) SELECT name FROM v",
            &options,
        )
        .unwrap();
    with_insert.bind(1, &Value::String("carol".into())).unwrap();
    assert_eq!(with_insert.execute_update().unwrap(), 1);
    assert_eq!(with_insert.generated_keys().unwrap(), vec![Value::Int64(3)]);

    let mut commented = conn
        .prepare_statement("/* seed */ INSERT INTO users (username) VALUES (?)", &options)
        .unwrap();
    commented.bind(1, &Value::String("dave".into())).unwrap();
    commented.execute_update().unwrap();
    assert_eq!(commented.generated_keys().unwrap(), vec![Value::Int64(4)]);

    let mut update = conn
        .prepare_statement("UPDATE users SET balance = ? WHERE username = 'alice'", &options)
        .unwrap();
    update.bind(1, &Value::Float64(1.0)).unwrap();
    assert_eq!(update.execute_update().unwrap(), 1);
    assert!(update.generated_keys().unwrap().is_empty());
}

#[test]
fn test_call_without_row_changes_reports_zero() {
    let conn = setup_test_database();
    let mut insert = conn
        .prepare_statement("INSERT INTO users (username) VALUES ('gina')", &StatementOptions::default())
        .unwrap();
    assert_eq!(insert.execute_update().unwrap(), 1);

    let mut ddl = conn
        .prepare_call("CREATE TABLE audit (id INTEGER)", &StatementOptions::default())
        .unwrap();
    assert_eq!(ddl.execute_call().unwrap(), 0);
    assert!(ddl.generated_keys().unwrap().is_empty());
}

#[test]
fn test_busy_timeout_is_restored_when_statement_ends() {
    let conn = setup_test_database();
    let busy_timeout = |conn: &SqliteConnection| {
        let mut stmt = conn
            .create_statement("PRAGMA busy_timeout", &StatementOptions::default())
            .unwrap();
        let mut rows = stmt.execute_query().unwrap();
        drain(rows.as_mut()).remove(0).remove(0)
    };
    let default = busy_timeout(&conn);

    let mut closed = conn
        .prepare_statement("SELECT 1", &StatementOptions::default())
        .unwrap();
    closed.set_query_timeout(3).unwrap();
    assert_eq!(busy_timeout(&conn), Value::Int64(3000));
    closed.close().unwrap();
    assert_eq!(busy_timeout(&conn), default);

    {
        let mut dropped = conn
            .prepare_statement("SELECT 1", &StatementOptions::default())
            .unwrap();
        dropped.set_query_timeout(2).unwrap();
        assert_eq!(busy_timeout(&conn), Value::Int64(2000));
    }
    assert_eq!(busy_timeout(&conn), default);

    let mut unlimited = conn
        .prepare_statement("SELECT 1", &StatementOptions::default())
        .unwrap();
    unlimited.set_query_timeout(0).unwrap();
    assert_eq!(unlimited.query_timeout(), Some(0));
    assert_eq!(busy_timeout(&conn), default);
}
