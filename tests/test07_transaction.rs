use sqlite_driver::prelude::*;

fn counter_table(conn: &Connection) -> Result<(), SqliteDriverError> {
    conn.execute_batch("CREATE TABLE counter (n INTEGER)")
}

fn count(conn: &Connection) -> Result<i64, SqliteDriverError> {
    conn.one_value("SELECT COUNT(*) FROM counter", ())
}

#[test]
fn commit_and_rollback() -> Result<(), Box<dyn std::error::Error>> {
    let conn = Connection::open_in_memory()?;
    counter_table(&conn)?;

    assert!(!conn.in_transaction());
    conn.begin()?;
    assert!(conn.in_transaction());
    assert!(!conn.is_autocommit()?);
    conn.execute("INSERT INTO counter VALUES (?)", params![1])?;
    conn.commit()?;
    assert!(!conn.in_transaction());
    assert!(conn.is_autocommit()?);
    assert_eq!(count(&conn)?, 1);

    conn.begin_with(TransactionBehavior::Immediate)?;
    conn.execute("INSERT INTO counter VALUES (?)", params![2])?;
    conn.rollback()?;
    assert_eq!(count(&conn)?, 1);
    Ok(())
}

#[test]
fn nesting_and_unmatched_finish_are_state_errors() -> Result<(), Box<dyn std::error::Error>> {
    let conn = Connection::open_in_memory()?;
    assert!(matches!(
        conn.commit(),
        Err(SqliteDriverError::TransactionStateError(_))
    ));
    assert!(matches!(
        conn.rollback(),
        Err(SqliteDriverError::TransactionStateError(_))
    ));

    conn.begin_with(TransactionBehavior::Exclusive)?;
    let err = conn.begin().unwrap_err();
    assert!(matches!(err, SqliteDriverError::TransactionStateError(_)));
    assert_eq!(err.code(), rusqlite::ffi::SQLITE_MISUSE);
    assert!(conn.in_transaction());
    conn.rollback()?;
    assert!(!conn.in_transaction());
    Ok(())
}

#[test]
fn with_transaction_commits_on_ok_and_rolls_back_on_err() -> Result<(), Box<dyn std::error::Error>> {
    let conn = Connection::open_in_memory()?;
    counter_table(&conn)?;

    let inserted = conn.with_transaction(|tx| {
        tx.execute("INSERT INTO counter VALUES (?)", params![1])?;
        tx.execute("INSERT INTO counter VALUES (?)", params![2])
    })?;
    assert_eq!(inserted, 1);
    assert_eq!(count(&conn)?, 2);

    let err = conn
        .with_transaction(|tx| {
            tx.execute("INSERT INTO counter VALUES (?)", params![3])?;
            tx.execute("INSERT INTO nowhere VALUES (?)", params![4])
        })
        .unwrap_err();
    assert!(matches!(err, SqliteDriverError::SqlError { .. }));
    assert!(!conn.in_transaction());
    assert_eq!(count(&conn)?, 2);
    Ok(())
}

#[test]
fn engine_ended_transaction_resyncs_the_tracker() -> Result<(), Box<dyn std::error::Error>> {
    let conn = Connection::open_in_memory()?;
    counter_table(&conn)?;
    conn.begin()?;
    // a raw COMMIT ends the transaction behind the tracker's back
    conn.execute_batch("COMMIT")?;
    assert!(!conn.in_transaction());
    let err = conn.commit().unwrap_err();
    assert!(matches!(err, SqliteDriverError::TransactionStateError(_)), "{err:?}");
    conn.begin()?;
    conn.rollback()?;

    // and a raw BEGIN is seen as well
    conn.execute_batch("BEGIN")?;
    assert!(conn.in_transaction());
    assert!(matches!(
        conn.begin(),
        Err(SqliteDriverError::TransactionStateError(_))
    ));
    conn.rollback()?;
    assert!(!conn.in_transaction());
    Ok(())
}

#[test]
fn conflict_rollback_ends_the_transaction() -> Result<(), Box<dyn std::error::Error>> {
    let conn = Connection::open_in_memory()?;
    conn.execute_batch("CREATE TABLE u (x INTEGER UNIQUE ON CONFLICT ROLLBACK)")?;
    conn.begin()?;
    conn.execute("INSERT INTO u VALUES (?)", params![1])?;
    let err = conn.execute("INSERT INTO u VALUES (?)", params![1]).unwrap_err();
    assert_eq!(err.code() & 0xff, rusqlite::ffi::SQLITE_CONSTRAINT);

    // the engine rolled back on its own; the connection follows
    assert!(!conn.in_transaction());
    assert_eq!(conn.one_value::<i64, _>("SELECT COUNT(*) FROM u", ())?, 0);
    conn.begin()?;
    conn.execute("INSERT INTO u VALUES (?)", params![1])?;
    conn.commit()?;
    assert_eq!(conn.one_value::<i64, _>("SELECT COUNT(*) FROM u", ())?, 1);
    Ok(())
}
