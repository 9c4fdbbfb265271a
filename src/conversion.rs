use chrono::{DateTime, NaiveDateTime};
use rusqlite::types::ValueRef;
use serde_json::Value as JsonValue;

use crate::types::{Value, parse_timestamp};

/// A failed column conversion, before the row adds the column position and name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeMismatch {
    pub from: &'static str,
    pub to: &'static str,
}

impl TypeMismatch {
    fn new(value: ValueRef<'_>, to: &'static str) -> Self {
        Self {
            from: storage_class(value),
            to,
        }
    }
}

/// Storage class name of a raw column value.
#[must_use]
pub fn storage_class(value: ValueRef<'_>) -> &'static str {
    match value {
        ValueRef::Null => "null",
        ValueRef::Integer(_) => "integer",
        ValueRef::Real(_) => "real",
        ValueRef::Text(_) => "text",
        ValueRef::Blob(_) => "blob",
    }
}

/// Host types a column value can be scanned into.
///
/// NULL scans into the type's zero value; use `Option<T>` to tell NULL apart, or
/// [`Row::scan_column`](crate::sqlite::Row::scan_column) for the null indicator.
pub trait FromColumn: Sized {
    /// Convert a borrowed column value, copying out of engine memory.
    ///
    /// # Errors
    /// Returns `TypeMismatch` when the value has no lossless representation as `Self`.
    fn from_column(value: ValueRef<'_>) -> Result<Self, TypeMismatch>;
}

fn text(value: ValueRef<'_>, bytes: &[u8], to: &'static str) -> Result<String, TypeMismatch> {
    String::from_utf8(bytes.to_vec()).map_err(|_| TypeMismatch::new(value, to))
}

#[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
fn integral_real(f: f64) -> Option<i64> {
    // i64::MAX as f64 rounds up to 2^63, which is out of range
    if f.fract() == 0.0 && f >= i64::MIN as f64 && f < i64::MAX as f64 {
        Some(f as i64)
    } else {
        None
    }
}

impl FromColumn for i64 {
    fn from_column(value: ValueRef<'_>) -> Result<Self, TypeMismatch> {
        match value {
            ValueRef::Null => Ok(0),
            ValueRef::Integer(i) => Ok(i),
            ValueRef::Real(f) => integral_real(f).ok_or_else(|| TypeMismatch::new(value, "i64")),
            ValueRef::Text(bytes) => std::str::from_utf8(bytes)
                .ok()
                .and_then(|s| s.parse::<i64>().ok())
                .ok_or_else(|| TypeMismatch::new(value, "i64")),
            ValueRef::Blob(_) => Err(TypeMismatch::new(value, "i64")),
        }
    }
}

macro_rules! narrow_int {
    ($($t:ty),*) => {
        $(impl FromColumn for $t {
            fn from_column(value: ValueRef<'_>) -> Result<Self, TypeMismatch> {
                let wide = i64::from_column(value)
                    .map_err(|_| TypeMismatch::new(value, stringify!($t)))?;
                <$t>::try_from(wide).map_err(|_| TypeMismatch::new(value, stringify!($t)))
            }
        })*
    };
}

narrow_int!(i8, i16, i32, u8, u16, u32, u64, usize, isize);

impl FromColumn for f64 {
    fn from_column(value: ValueRef<'_>) -> Result<Self, TypeMismatch> {
        match value {
            ValueRef::Null => Ok(0.0),
            #[allow(clippy::cast_precision_loss)]
            ValueRef::Integer(i) => Ok(i as f64),
            ValueRef::Real(f) => Ok(f),
            ValueRef::Text(bytes) => std::str::from_utf8(bytes)
                .ok()
                .and_then(|s| s.parse::<f64>().ok())
                .ok_or_else(|| TypeMismatch::new(value, "f64")),
            ValueRef::Blob(_) => Err(TypeMismatch::new(value, "f64")),
        }
    }
}

impl FromColumn for f32 {
    fn from_column(value: ValueRef<'_>) -> Result<Self, TypeMismatch> {
        let wide = f64::from_column(value).map_err(|_| TypeMismatch::new(value, "f32"))?;
        #[allow(clippy::cast_possible_truncation)]
        let narrow = wide as f32;
        if narrow.is_finite() || !wide.is_finite() {
            Ok(narrow)
        } else {
            Err(TypeMismatch::new(value, "f32"))
        }
    }
}

impl FromColumn for bool {
    fn from_column(value: ValueRef<'_>) -> Result<Self, TypeMismatch> {
        match value {
            ValueRef::Null => Ok(false),
            ValueRef::Integer(i) => Ok(i != 0),
            ValueRef::Text(bytes) => match bytes {
                b"true" | b"TRUE" => Ok(true),
                b"false" | b"FALSE" => Ok(false),
                _ => i64::from_column(value)
                    .map(|i| i != 0)
                    .map_err(|_| TypeMismatch::new(value, "bool")),
            },
            ValueRef::Real(_) | ValueRef::Blob(_) => Err(TypeMismatch::new(value, "bool")),
        }
    }
}

impl FromColumn for String {
    fn from_column(value: ValueRef<'_>) -> Result<Self, TypeMismatch> {
        match value {
            ValueRef::Null => Ok(String::new()),
            ValueRef::Integer(i) => Ok(i.to_string()),
            ValueRef::Real(f) => Ok(f.to_string()),
            ValueRef::Text(bytes) | ValueRef::Blob(bytes) => text(value, bytes, "String"),
        }
    }
}

impl FromColumn for Vec<u8> {
    fn from_column(value: ValueRef<'_>) -> Result<Self, TypeMismatch> {
        match value {
            ValueRef::Null => Ok(Vec::new()),
            ValueRef::Text(bytes) | ValueRef::Blob(bytes) => Ok(bytes.to_vec()),
            ValueRef::Integer(_) | ValueRef::Real(_) => Err(TypeMismatch::new(value, "Vec<u8>")),
        }
    }
}

impl FromColumn for NaiveDateTime {
    fn from_column(value: ValueRef<'_>) -> Result<Self, TypeMismatch> {
        match value {
            ValueRef::Null => Ok(NaiveDateTime::default()),
            ValueRef::Integer(secs) => DateTime::from_timestamp(secs, 0)
                .map(|dt| dt.naive_utc())
                .ok_or_else(|| TypeMismatch::new(value, "NaiveDateTime")),
            ValueRef::Text(bytes) => std::str::from_utf8(bytes)
                .ok()
                .and_then(parse_timestamp)
                .ok_or_else(|| TypeMismatch::new(value, "NaiveDateTime")),
            ValueRef::Real(_) | ValueRef::Blob(_) => {
                Err(TypeMismatch::new(value, "NaiveDateTime"))
            }
        }
    }
}

impl FromColumn for JsonValue {
    fn from_column(value: ValueRef<'_>) -> Result<Self, TypeMismatch> {
        match value {
            ValueRef::Null => Ok(JsonValue::Null),
            ValueRef::Integer(i) => Ok(JsonValue::from(i)),
            ValueRef::Real(f) => serde_json::Number::from_f64(f)
                .map(JsonValue::Number)
                .ok_or_else(|| TypeMismatch::new(value, "json")),
            ValueRef::Text(bytes) | ValueRef::Blob(bytes) => {
                serde_json::from_slice(bytes).map_err(|_| TypeMismatch::new(value, "json"))
            }
        }
    }
}

impl FromColumn for Value {
    fn from_column(value: ValueRef<'_>) -> Result<Self, TypeMismatch> {
        Ok(match value {
            ValueRef::Null => Value::Null,
            ValueRef::Integer(i) => Value::Int(i),
            ValueRef::Real(f) => Value::Float(f),
            ValueRef::Text(bytes) => Value::Text(text(value, bytes, "Value")?),
            ValueRef::Blob(bytes) => Value::Blob(bytes.to_vec()),
        })
    }
}

impl<T: FromColumn> FromColumn for Option<T> {
    fn from_column(value: ValueRef<'_>) -> Result<Self, TypeMismatch> {
        match value {
            ValueRef::Null => Ok(None),
            other => T::from_column(other).map(Some),
        }
    }
}
