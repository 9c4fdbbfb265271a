use chrono::NaiveDateTime;
use serde_json::Value as JsonValue;

use crate::error::{Result, SqliteDriverError};

/// Values that can be bound to a statement parameter or read back from a column.
///
/// The first five variants mirror the engine's storage classes. `ZeroBlob` is bind-only and
/// reserves a zero-filled blob that a [`BlobStream`](crate::sqlite::BlobStream) can later fill.
/// `Bool`, `Timestamp` and `Json` are host conveniences stored as integer or text.
/// ```rust
/// use sqlite_driver::prelude::*;
///
/// let params = vec![
///     Value::Int(1),
///     Value::Text("alice".into()),
///     Value::Bool(true),
/// ];
/// # let _ = params;
/// ```
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    /// NULL value
    #[default]
    Null,
    /// Integer value (64-bit)
    Int(i64),
    /// Floating point value (64-bit)
    Float(f64),
    /// Text/string value
    Text(String),
    /// Binary data
    Blob(Vec<u8>),
    /// Zero-filled blob of the given length (bind only)
    ZeroBlob(i32),
    /// Boolean value, stored as 0/1
    Bool(bool),
    /// Timestamp value, stored as `%F %T%.f` text
    Timestamp(NaiveDateTime),
    /// JSON value, stored as text
    Json(JsonValue),
}

impl Value {
    /// Check if this value is NULL
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    #[must_use]
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(value) => Some(*value),
            Value::Bool(b) => Some(i64::from(*b)),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        if let Value::Text(value) = self {
            Some(value)
        } else {
            None
        }
    }

    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(value) => Some(*value),
            Value::Int(0) => Some(false),
            Value::Int(1) => Some(true),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_timestamp(&self) -> Option<NaiveDateTime> {
        match self {
            Value::Timestamp(value) => Some(*value),
            Value::Text(s) => parse_timestamp(s),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_float(&self) -> Option<f64> {
        if let Value::Float(value) = self {
            Some(*value)
        } else {
            None
        }
    }

    #[must_use]
    pub fn as_blob(&self) -> Option<&[u8]> {
        if let Value::Blob(bytes) = self {
            Some(bytes)
        } else {
            None
        }
    }

    /// Storage class name used in conversion diagnostics.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Int(_) | Value::Bool(_) => "integer",
            Value::Float(_) => "real",
            Value::Text(_) | Value::Timestamp(_) | Value::Json(_) => "text",
            Value::Blob(_) | Value::ZeroBlob(_) => "blob",
        }
    }
}

pub(crate) fn parse_timestamp(s: &str) -> Option<NaiveDateTime> {
    // %.f accepts an absent fractional part
    NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f"))
        .ok()
}

/// Host values that can be bound as statement parameters.
///
/// Conversion is fallible: unsigned values above `i64::MAX` are rejected rather than wrapped.
pub trait ToValue {
    /// Convert into a bindable [`Value`].
    ///
    /// # Errors
    /// Returns `SqliteDriverError::ConversionError` when the host value has no lossless
    /// representation in the engine's storage classes.
    fn to_value(&self) -> Result<Value>;
}

impl ToValue for Value {
    fn to_value(&self) -> Result<Value> {
        Ok(self.clone())
    }
}

impl<T: ToValue + ?Sized> ToValue for &T {
    fn to_value(&self) -> Result<Value> {
        (**self).to_value()
    }
}

impl<T: ToValue> ToValue for Option<T> {
    fn to_value(&self) -> Result<Value> {
        match self {
            Some(v) => v.to_value(),
            None => Ok(Value::Null),
        }
    }
}

macro_rules! lossless_int {
    ($($t:ty),*) => {
        $(impl ToValue for $t {
            fn to_value(&self) -> Result<Value> {
                Ok(Value::Int(i64::from(*self)))
            }
        })*
    };
}

lossless_int!(i8, i16, i32, i64, u8, u16, u32);

macro_rules! checked_int {
    ($($t:ty),*) => {
        $(impl ToValue for $t {
            fn to_value(&self) -> Result<Value> {
                i64::try_from(*self).map(Value::Int).map_err(|_| {
                    SqliteDriverError::conversion(0, "", stringify!($t), "integer")
                })
            }
        })*
    };
}

checked_int!(u64, usize, isize);

impl ToValue for f64 {
    fn to_value(&self) -> Result<Value> {
        Ok(Value::Float(*self))
    }
}

impl ToValue for f32 {
    fn to_value(&self) -> Result<Value> {
        Ok(Value::Float(f64::from(*self)))
    }
}

impl ToValue for bool {
    fn to_value(&self) -> Result<Value> {
        Ok(Value::Bool(*self))
    }
}

impl ToValue for str {
    fn to_value(&self) -> Result<Value> {
        Ok(Value::Text(self.to_owned()))
    }
}

impl ToValue for String {
    fn to_value(&self) -> Result<Value> {
        Ok(Value::Text(self.clone()))
    }
}

impl ToValue for [u8] {
    fn to_value(&self) -> Result<Value> {
        Ok(Value::Blob(self.to_vec()))
    }
}

impl ToValue for Vec<u8> {
    fn to_value(&self) -> Result<Value> {
        Ok(Value::Blob(self.clone()))
    }
}

impl ToValue for NaiveDateTime {
    fn to_value(&self) -> Result<Value> {
        Ok(Value::Timestamp(*self))
    }
}

impl ToValue for JsonValue {
    fn to_value(&self) -> Result<Value> {
        Ok(Value::Json(self.clone()))
    }
}

/// Build a positional parameter list.
///
/// ```rust
/// use sqlite_driver::prelude::*;
///
/// # fn main() -> Result<(), SqliteDriverError> {
/// let conn = Connection::open_in_memory()?;
/// conn.execute_batch("CREATE TABLE t (a INTEGER, b TEXT)")?;
/// conn.execute("INSERT INTO t VALUES (?, ?)", params![1, "one"])?;
/// # Ok(())
/// # }
/// ```
#[macro_export]
macro_rules! params {
    () => {
        &[] as &[&dyn $crate::types::ToValue]
    };
    ($($param:expr),+ $(,)?) => {
        &[$(&$param as &dyn $crate::types::ToValue),+] as &[&dyn $crate::types::ToValue]
    };
}

/// Build a named parameter list; names include their marker (`:`, `@` or `$`).
#[macro_export]
macro_rules! named_params {
    () => {
        &[] as &[(&str, &dyn $crate::types::ToValue)]
    };
    ($($name:literal : $param:expr),+ $(,)?) => {
        &[$(($name, &$param as &dyn $crate::types::ToValue)),+]
            as &[(&str, &dyn $crate::types::ToValue)]
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unsigned_overflow_is_rejected() {
        assert_eq!(42_u64.to_value().unwrap(), Value::Int(42));
        let err = u64::MAX.to_value().unwrap_err();
        assert!(matches!(
            err,
            SqliteDriverError::ConversionError { ref from, ref to, .. } if from == "u64" && to == "integer"
        ));
    }

    #[test]
    fn option_and_refs() {
        let none: Option<i32> = None;
        assert!(none.to_value().unwrap().is_null());
        assert_eq!(Some("x").to_value().unwrap(), Value::Text("x".into()));
        let bytes: &[u8] = b"ab";
        assert_eq!(bytes.to_value().unwrap(), Value::Blob(vec![b'a', b'b']));
    }

    #[test]
    fn accessors() {
        assert_eq!(Value::Int(1).as_bool(), Some(true));
        assert_eq!(Value::Bool(false).as_int(), Some(0));
        let ts = Value::Text("2024-02-03 04:05:06.250".into()).as_timestamp().unwrap();
        assert_eq!(ts.format("%H:%M:%S%.3f").to_string(), "04:05:06.250");
        assert!(Value::Text("nope".into()).as_timestamp().is_none());
        assert_eq!(Value::Json(serde_json::json!({"a": 1})).type_name(), "text");
    }
}
