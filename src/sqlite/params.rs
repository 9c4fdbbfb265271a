use rusqlite::ToSql;
use rusqlite::types::{ToSqlOutput, Value as SqlValue, ValueRef};

use crate::error::Result;
use crate::sqlite::prepared::Statement;
use crate::types::{ToValue, Value};

impl ToSql for Value {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            Value::Null => ToSqlOutput::Owned(SqlValue::Null),
            Value::Int(i) => ToSqlOutput::Owned(SqlValue::Integer(*i)),
            Value::Float(f) => ToSqlOutput::Owned(SqlValue::Real(*f)),
            Value::Text(s) => ToSqlOutput::Borrowed(ValueRef::Text(s.as_bytes())),
            Value::Blob(bytes) => ToSqlOutput::Borrowed(ValueRef::Blob(bytes)),
            Value::ZeroBlob(len) => ToSqlOutput::ZeroBlob(*len),
            Value::Bool(b) => ToSqlOutput::Owned(SqlValue::Integer(i64::from(*b))),
            Value::Timestamp(dt) => {
                ToSqlOutput::Owned(SqlValue::Text(dt.format("%F %T%.f").to_string()))
            }
            Value::Json(json) => ToSqlOutput::Owned(SqlValue::Text(json.to_string())),
        })
    }
}

/// Parameter lists accepted by statement execution.
///
/// Positional lists bind from index 1; named lists resolve each name through the statement's
/// parameter table. `()` keeps the current bindings.
pub trait BindParams {
    /// Bind every value to `stmt`.
    ///
    /// # Errors
    /// Returns `SqliteDriverError` if a value cannot be converted, a name is unknown or an
    /// index is out of range.
    fn bind_to(self, stmt: &mut Statement<'_>) -> Result<()>;
}

impl BindParams for () {
    fn bind_to(self, _stmt: &mut Statement<'_>) -> Result<()> {
        Ok(())
    }
}

impl BindParams for &[&dyn ToValue] {
    fn bind_to(self, stmt: &mut Statement<'_>) -> Result<()> {
        for (i, value) in self.iter().enumerate() {
            stmt.bind(i + 1, *value)?;
        }
        Ok(())
    }
}

impl<const N: usize> BindParams for &[&dyn ToValue; N] {
    fn bind_to(self, stmt: &mut Statement<'_>) -> Result<()> {
        self.as_slice().bind_to(stmt)
    }
}

impl BindParams for &[(&str, &dyn ToValue)] {
    fn bind_to(self, stmt: &mut Statement<'_>) -> Result<()> {
        for (name, value) in self {
            stmt.bind_named(name, *value)?;
        }
        Ok(())
    }
}

impl<const N: usize> BindParams for &[(&str, &dyn ToValue); N] {
    fn bind_to(self, stmt: &mut Statement<'_>) -> Result<()> {
        self.as_slice().bind_to(stmt)
    }
}

impl BindParams for &[Value] {
    fn bind_to(self, stmt: &mut Statement<'_>) -> Result<()> {
        for (i, value) in self.iter().enumerate() {
            stmt.bind(i + 1, value)?;
        }
        Ok(())
    }
}

impl BindParams for &Vec<Value> {
    fn bind_to(self, stmt: &mut Statement<'_>) -> Result<()> {
        self.as_slice().bind_to(stmt)
    }
}

impl BindParams for Vec<Value> {
    fn bind_to(self, stmt: &mut Statement<'_>) -> Result<()> {
        self.as_slice().bind_to(stmt)
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;

    #[test]
    fn timestamps_bind_as_text() {
        let at = |milli| {
            NaiveDate::from_ymd_opt(2024, 2, 29)
                .and_then(|d| d.and_hms_milli_opt(13, 45, 7, milli))
                .unwrap()
        };
        assert_eq!(
            Value::Timestamp(at(250)).to_sql().unwrap(),
            ToSqlOutput::Owned(SqlValue::Text("2024-02-29 13:45:07.250".into()))
        );
        assert_eq!(
            Value::Timestamp(at(0)).to_sql().unwrap(),
            ToSqlOutput::Owned(SqlValue::Text("2024-02-29 13:45:07".into()))
        );
    }
}
