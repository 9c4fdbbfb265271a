use std::ops::ControlFlow;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use sqlite_driver::prelude::*;
use tempfile::tempdir;

fn unique_db_path(prefix: &str) -> String {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join(format!("{prefix}.db"));
    // Leak the tempdir so the file persists for the duration of the test binary.
    std::mem::forget(dir);
    path.to_string_lossy().into_owned()
}

const COUNT_TO_A_MILLION: &str = "WITH RECURSIVE c(x) AS (SELECT 1 UNION ALL SELECT x + 1 FROM c LIMIT 1000000) \
     SELECT COUNT(*) FROM c";

#[test]
fn trace_sees_each_statement_with_its_context() -> Result<(), Box<dyn std::error::Error>> {
    let conn = Connection::open_in_memory()?;
    let seen: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
    conn.set_trace(Arc::clone(&seen), |seen, sql| {
        seen.lock().expect("trace log").push(sql.to_string());
    })?;

    conn.execute_batch("CREATE TABLE t (x INTEGER)")?;
    conn.execute("INSERT INTO t VALUES (?)", params![7])?;
    assert_eq!(conn.one_value::<i64, _>("SELECT x FROM t", ())?, 7);

    {
        let seen = seen.lock().expect("trace log");
        assert!(seen.iter().any(|s| s == "CREATE TABLE t (x INTEGER)"));
        assert!(seen.iter().any(|s| s.starts_with("INSERT INTO t VALUES")));
        assert!(seen.iter().any(|s| s == "SELECT x FROM t"));
    }

    conn.clear_trace()?;
    let before = seen.lock().expect("trace log").len();
    conn.execute_batch("SELECT 1")?;
    assert_eq!(seen.lock().expect("trace log").len(), before);
    Ok(())
}

#[test]
fn registering_again_replaces_the_handler() -> Result<(), Box<dyn std::error::Error>> {
    let conn = Connection::open_in_memory()?;
    let first = Arc::new(AtomicUsize::new(0));
    let second = Arc::new(AtomicUsize::new(0));
    conn.set_trace(Arc::clone(&first), |n, _| {
        n.fetch_add(1, Ordering::SeqCst);
    })?;
    conn.execute_batch("SELECT 1")?;
    conn.set_trace(Arc::clone(&second), |n, _| {
        n.fetch_add(1, Ordering::SeqCst);
    })?;
    conn.execute_batch("SELECT 2")?;

    assert_eq!(first.load(Ordering::SeqCst), 1);
    assert_eq!(second.load(Ordering::SeqCst), 1);
    Ok(())
}

#[test]
fn profile_reports_finished_statements() -> Result<(), Box<dyn std::error::Error>> {
    let conn = Connection::open_in_memory()?;
    let profiled: Arc<Mutex<Vec<(String, Duration)>>> = Arc::new(Mutex::new(Vec::new()));
    conn.set_profile(Arc::clone(&profiled), |log, sql, elapsed| {
        log.lock().expect("profile log").push((sql.to_string(), elapsed));
    })?;

    assert_eq!(conn.one_value::<i64, _>(COUNT_TO_A_MILLION, ())?, 1_000_000);

    let log = profiled.lock().expect("profile log");
    assert!(log.iter().any(|(sql, _)| sql == COUNT_TO_A_MILLION));
    Ok(())
}

#[test]
fn progress_handler_can_interrupt() -> Result<(), Box<dyn std::error::Error>> {
    let conn = Connection::open_in_memory()?;
    let calls = Arc::new(AtomicUsize::new(0));
    conn.set_progress_handler(Arc::clone(&calls), 1000, |calls| {
        if calls.fetch_add(1, Ordering::SeqCst) >= 2 {
            ControlFlow::Break(())
        } else {
            ControlFlow::Continue(())
        }
    })?;

    let err = conn.one_value::<i64, _>(COUNT_TO_A_MILLION, ()).unwrap_err();
    assert!(matches!(err, SqliteDriverError::InterruptedError), "{err:?}");
    assert_eq!(err.code(), rusqlite::ffi::SQLITE_INTERRUPT);
    assert_eq!(calls.load(Ordering::SeqCst), 3);

    conn.clear_progress_handler()?;
    assert_eq!(conn.one_value::<i64, _>(COUNT_TO_A_MILLION, ())?, 1_000_000);
    assert_eq!(calls.load(Ordering::SeqCst), 3);
    Ok(())
}

#[test]
fn progress_interval_must_be_positive() -> Result<(), Box<dyn std::error::Error>> {
    let conn = Connection::open_in_memory()?;
    let err = conn
        .set_progress_handler((), 0, |()| ControlFlow::Continue(()))
        .unwrap_err();
    assert!(matches!(err, SqliteDriverError::ConfigurationError(_)));
    Ok(())
}

#[test]
fn panicking_handler_does_not_lock_out_registration() -> Result<(), Box<dyn std::error::Error>> {
    let conn = Connection::open_in_memory()?;
    conn.set_progress_handler((), 1, |()| -> ControlFlow<()> {
        panic!("progress handler failed")
    })?;
    // the unwind is caught at the engine boundary and the statement keeps running
    let _ = conn.execute_batch("SELECT 1");

    conn.clear_progress_handler()?;
    conn.set_trace((), |(), _| {})?;
    conn.clear_trace()?;
    assert_eq!(conn.one_value::<i64, _>("SELECT 1", ())?, 1);
    Ok(())
}

#[test]
fn busy_handler_decides_how_long_to_retry() -> Result<(), Box<dyn std::error::Error>> {
    let path = unique_db_path("busy");
    let writer = Connection::open(&path, &[])?;
    writer.execute_batch("CREATE TABLE t (x INTEGER); INSERT INTO t VALUES (1);")?;

    let reader = Connection::open(&path, &[])?;
    let calls = Arc::new(AtomicUsize::new(0));
    reader.set_busy_handler(Arc::clone(&calls), |calls, count| {
        calls.fetch_add(1, Ordering::SeqCst);
        count < 3
    })?;
    let mut stmt = reader.prepare("SELECT COUNT(*) FROM t")?;

    writer.begin_with(TransactionBehavior::Exclusive)?;
    writer.execute("INSERT INTO t VALUES (?)", params![2])?;

    let err = stmt.query_all(()).unwrap_err();
    assert!(matches!(err, SqliteDriverError::BusyError(_)), "{err:?}");
    assert_eq!(calls.load(Ordering::SeqCst), 4);

    writer.commit()?;
    assert_eq!(stmt.query_all(())?.results[0].get_by_index(0), Some(&Value::Int(2)));

    // without a handler the reader gives up immediately
    reader.clear_busy_handler()?;
    writer.begin_with(TransactionBehavior::Exclusive)?;
    let err = stmt.query_all(()).unwrap_err();
    assert!(matches!(err, SqliteDriverError::BusyError(_)));
    assert_eq!(calls.load(Ordering::SeqCst), 4);
    writer.rollback()?;
    Ok(())
}

#[test]
fn authorizer_denies_with_a_descriptive_error() -> Result<(), Box<dyn std::error::Error>> {
    let conn = Connection::open_in_memory()?;
    conn.execute_batch("CREATE TABLE test (id INTEGER, secret TEXT); INSERT INTO test VALUES (1, 'pw');")?;

    let requests: Arc<Mutex<Vec<AuthRequest>>> = Arc::new(Mutex::new(Vec::new()));
    conn.set_authorizer(Arc::clone(&requests), |log, request| {
        log.lock().expect("auth log").push(request.clone());
        match &request.action {
            Action::Insert { table } if table == "test" => Authorization::Deny,
            Action::Read { column, .. } if column == "secret" => Authorization::Ignore,
            _ => Authorization::Allow,
        }
    })?;

    let err = conn.prepare("INSERT INTO test VALUES (2, 'x')").unwrap_err();
    match err {
        SqliteDriverError::AuthorizationError { action, operands } => {
            assert_eq!(action, "insert");
            assert_eq!(operands, vec!["test".to_string()]);
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(conn.one_value::<i64, _>("SELECT COUNT(*) FROM test", ())?, 1);
    assert_eq!(
        conn.prepare("INSERT INTO test VALUES (2, 'x')").unwrap_err().code(),
        rusqlite::ffi::SQLITE_AUTH
    );

    // ignored reads come back as NULL
    let rs = conn.select("SELECT id, secret FROM test", ())?;
    assert_eq!(rs.results[0].get("id"), Some(&Value::Int(1)));
    assert_eq!(rs.results[0].get("secret"), Some(&Value::Null));

    {
        let log = requests.lock().expect("auth log");
        assert!(log.iter().any(|r| r.action == Action::Select));
        assert!(log.iter().any(|r| {
            r.action
                == Action::Read {
                    table: "test".into(),
                    column: "id".into(),
                }
                && r.database.as_deref() == Some("main")
        }));
    }

    conn.clear_authorizer()?;
    assert_eq!(conn.execute("INSERT INTO test VALUES (2, 'x')", ())?, 1);
    Ok(())
}

#[test]
fn callbacks_are_per_connection() -> Result<(), Box<dyn std::error::Error>> {
    let traced = Connection::open_in_memory()?;
    let quiet = Connection::open_in_memory()?;
    let calls = Arc::new(AtomicUsize::new(0));
    traced.set_trace(Arc::clone(&calls), |n, _| {
        n.fetch_add(1, Ordering::SeqCst);
    })?;

    quiet.execute_batch("SELECT 1")?;
    assert_eq!(calls.load(Ordering::SeqCst), 0);
    traced.execute_batch("SELECT 1")?;
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    Ok(())
}

#[test]
fn registration_on_a_closed_connection_fails() -> Result<(), Box<dyn std::error::Error>> {
    let mut conn = Connection::open_in_memory()?;
    conn.close()?;
    assert!(matches!(
        conn.set_trace((), |(), _| {}),
        Err(SqliteDriverError::ConnectionClosedError)
    ));
    assert!(matches!(
        conn.set_busy_handler((), |(), _| false),
        Err(SqliteDriverError::ConnectionClosedError)
    ));
    Ok(())
}
