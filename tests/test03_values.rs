use chrono::NaiveDate;
use serde_json::json;
use sqlite_driver::prelude::*;

#[test]
fn scan_column_reports_nulls() -> Result<(), Box<dyn std::error::Error>> {
    let conn = Connection::open_in_memory()?;
    let mut stmt = conn.prepare("select 1, null, 0")?;
    let mut rows = stmt.query()?;
    let row = rows.step()?.expect("one row");

    let (value, is_null) = row.scan_column::<i64>(0)?;
    assert_eq!(value, 1);
    assert!(!is_null);

    let (value, is_null) = row.scan_column::<i64>(1)?;
    assert_eq!(value, 0);
    assert!(is_null);

    let (value, is_null) = row.scan_column::<bool>(2)?;
    assert!(!value);
    assert!(!is_null);

    assert_eq!(row.get::<Option<i64>>(1)?, None);
    assert_eq!(row.get::<Option<i64>>(0)?, Some(1));
    assert_eq!(row.get::<String>(1)?, "");
    assert_eq!(row.values()?, vec![Value::Int(1), Value::Null, Value::Int(0)]);
    Ok(())
}

#[test]
fn host_values_round_trip_through_a_table() -> Result<(), Box<dyn std::error::Error>> {
    let conn = Connection::open_in_memory()?;
    conn.execute_batch(
        "CREATE TABLE v (i INTEGER, f REAL, t TEXT, b BLOB, flag INTEGER, ts TEXT, doc TEXT)",
    )?;
    let ts = NaiveDate::from_ymd_opt(2024, 2, 29)
        .and_then(|d| d.and_hms_milli_opt(13, 45, 7, 250))
        .expect("valid timestamp");
    let doc = json!({"name": "widget", "tags": ["a", "b"], "count": 3});
    let blob: Vec<u8> = vec![0, 1, 2, 255];

    conn.execute(
        "INSERT INTO v VALUES (?, ?, ?, ?, ?, ?, ?)",
        params![-7_i64, 0.5_f64, "héllo", blob, true, ts, doc],
    )?;

    let mut stmt = conn.prepare("SELECT i, f, t, b, flag, ts, doc FROM v")?;
    let mut rows = stmt.query()?;
    let row = rows.step()?.expect("row");
    let (i, f, t, b, flag, read_ts, read_doc): (
        i64,
        f64,
        String,
        Vec<u8>,
        bool,
        chrono::NaiveDateTime,
        serde_json::Value,
    ) = row.scan()?;
    assert_eq!(i, -7);
    assert!((f - 0.5).abs() < f64::EPSILON);
    assert_eq!(t, "héllo");
    assert_eq!(b, blob);
    assert!(flag);
    assert_eq!(read_ts, ts);
    assert_eq!(read_doc, doc);

    // host conveniences are stored in engine storage classes
    assert_eq!(row.get::<Value>(4)?, Value::Int(1));
    assert_eq!(
        row.get::<Value>(5)?,
        Value::Text("2024-02-29 13:45:07.250".into())
    );
    assert!(matches!(row.get::<Value>(3)?, Value::Blob(_)));
    Ok(())
}

#[test]
fn options_bind_as_null() -> Result<(), Box<dyn std::error::Error>> {
    let conn = Connection::open_in_memory()?;
    let none: Option<i64> = None;
    let some: Option<&str> = Some("x");
    let rs = conn.select("SELECT ? IS NULL, ?", params![none, some])?;
    assert_eq!(rs.results[0].get_by_index(0), Some(&Value::Int(1)));
    assert_eq!(rs.results[0].get_by_index(1), Some(&Value::Text("x".into())));
    Ok(())
}

#[test]
fn narrowing_conversions_report_the_column() -> Result<(), Box<dyn std::error::Error>> {
    let conn = Connection::open_in_memory()?;
    let mut stmt = conn.prepare("SELECT 300 AS big, 'abc' AS word, 2.5 AS half, x'00ff' AS raw")?;
    let mut rows = stmt.query()?;
    let row = rows.step()?.expect("row");

    match row.get::<u8>(0).unwrap_err() {
        SqliteDriverError::ConversionError {
            column,
            name,
            from,
            to,
        } => {
            assert_eq!(column, 0);
            assert_eq!(name, "big");
            assert_eq!(from, "integer");
            assert_eq!(to, "u8");
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(row.get::<i16>(0)?, 300);

    let err = row.get_named::<i64>("word").unwrap_err();
    assert!(matches!(err, SqliteDriverError::ConversionError { column: 1, .. }));
    assert_eq!(err.code(), rusqlite::ffi::SQLITE_MISMATCH);

    // reals only narrow to integers when nothing is lost
    assert!(row.get::<i64>(2).is_err());
    assert!((row.get::<f32>(2)? - 2.5).abs() < f32::EPSILON);

    assert_eq!(row.get::<Vec<u8>>(3)?, vec![0x00, 0xff]);
    assert!(row.get::<String>(3).is_err());
    assert!(row.get::<f64>(3).is_err());

    assert!(matches!(
        row.get::<i64>(9),
        Err(SqliteDriverError::UnknownColumnError(_))
    ));
    assert!(matches!(
        row.get_named::<i64>("missing"),
        Err(SqliteDriverError::UnknownColumnError(_))
    ));
    Ok(())
}

#[test]
fn text_numbers_are_parsed_when_scanning() -> Result<(), Box<dyn std::error::Error>> {
    let conn = Connection::open_in_memory()?;
    let mut stmt = conn.prepare("SELECT '42', '1.25', 'true', 7")?;
    let mut rows = stmt.query()?;
    let row = rows.step()?.expect("row");
    let (n, f, b, s): (i32, f64, bool, String) = row.scan()?;
    assert_eq!(n, 42);
    assert!((f - 1.25).abs() < f64::EPSILON);
    assert!(b);
    assert_eq!(s, "7");
    Ok(())
}

#[test]
fn unsigned_values_above_i64_are_rejected() -> Result<(), Box<dyn std::error::Error>> {
    let conn = Connection::open_in_memory()?;
    let mut stmt = conn.prepare("SELECT :n")?;
    let err = stmt.bind_named(":n", &u64::MAX).unwrap_err();
    match err {
        SqliteDriverError::ConversionError {
            column, name, from, ..
        } => {
            assert_eq!(column, 1);
            assert_eq!(name, ":n");
            assert_eq!(from, "u64");
        }
        other => panic!("unexpected error: {other:?}"),
    }
    stmt.bind_named(":n", &(i64::MAX as u64))?;
    let rs = stmt.query_all(())?;
    assert_eq!(rs.results[0].get_by_index(0), Some(&Value::Int(i64::MAX)));
    Ok(())
}

#[test]
fn negative_zeroblob_is_rejected() -> Result<(), Box<dyn std::error::Error>> {
    let conn = Connection::open_in_memory()?;
    let mut stmt = conn.prepare("SELECT ?")?;
    let err = stmt.bind(1, &Value::ZeroBlob(-1)).unwrap_err();
    assert!(matches!(err, SqliteDriverError::ConversionError { column: 1, .. }));

    stmt.bind(1, &Value::ZeroBlob(4))?;
    let rs = stmt.query_all(())?;
    assert_eq!(rs.results[0].get_by_index(0), Some(&Value::Blob(vec![0; 4])));
    Ok(())
}

#[test]
fn value_params_bind_positionally() -> Result<(), Box<dyn std::error::Error>> {
    let conn = Connection::open_in_memory()?;
    let values = vec![Value::Int(2), Value::Float(0.25), Value::Null];
    let rs = conn.select("SELECT ?1 * 2, ?2, ?3", &values)?;
    let row = &rs.results[0];
    assert_eq!(row.values, vec![Value::Int(4), Value::Float(0.25), Value::Null]);
    assert_eq!(rs.results[0].get("?2").and_then(Value::as_float), Some(0.25));
    Ok(())
}
