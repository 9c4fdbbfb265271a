use std::sync::Arc;

use rusqlite::types::ValueRef;

use crate::conversion::FromColumn;
use crate::error::{Result, SqliteDriverError};
use crate::results::ResultSet;
use crate::sqlite::connection::Connection;
use crate::sqlite::hooks::BridgeScope;
use crate::types::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CursorState {
    BeforeFirst,
    OnRow,
    Exhausted,
    Failed,
}

/// Row cursor over a running statement.
///
/// Exhaustion is `Ok(None)`. After an error the cursor refuses to step again; dropping it
/// resets the statement and keeps its bindings.
pub struct Rows<'stmt> {
    conn: &'stmt Connection,
    inner: Option<rusqlite::Rows<'stmt>>,
    state: CursorState,
}

impl<'stmt> Rows<'stmt> {
    pub(crate) fn new(conn: &'stmt Connection, inner: rusqlite::Rows<'stmt>) -> Self {
        Self {
            conn,
            inner: Some(inner),
            state: CursorState::BeforeFirst,
        }
    }

    /// Advance to the next row.
    ///
    /// # Errors
    /// Returns the engine error that stopped execution (`SqlError`, `BusyError`,
    /// `InterruptedError`, ...), or `MisuseError` when stepping a cursor that already failed.
    pub fn step(&mut self) -> Result<Option<Row<'_, 'stmt>>> {
        match self.state {
            CursorState::Failed => {
                return Err(SqliteDriverError::MisuseError(
                    "cursor already failed; drop it to reset the statement".into(),
                ));
            }
            CursorState::Exhausted => return Ok(None),
            CursorState::BeforeFirst | CursorState::OnRow => {}
        }
        let Some(inner) = self.inner.as_mut() else {
            return Ok(None);
        };
        let _scope = BridgeScope::enter(&self.conn.bridge);
        match inner.next() {
            Ok(Some(row)) => {
                self.state = CursorState::OnRow;
                Ok(Some(Row { inner: row }))
            }
            Ok(None) => {
                self.state = CursorState::Exhausted;
                Ok(None)
            }
            Err(err) => {
                self.state = CursorState::Failed;
                Err(self.conn.translate(err))
            }
        }
    }

    /// Whether the last step failed.
    #[must_use]
    pub fn is_failed(&self) -> bool {
        self.state == CursorState::Failed
    }
}

impl Drop for Rows<'_> {
    fn drop(&mut self) {
        let _scope = BridgeScope::enter(&self.conn.bridge);
        self.inner.take();
    }
}

/// The current row of a [`Rows`] cursor. Values are copied out on access.
pub struct Row<'r, 'stmt> {
    inner: &'r rusqlite::Row<'stmt>,
}

impl Row<'_, '_> {
    fn statement(&self) -> &rusqlite::Statement<'_> {
        self.inner.as_ref()
    }

    #[must_use]
    pub fn column_count(&self) -> usize {
        self.statement().column_count()
    }

    /// Name of column `index`, or an empty string when out of range.
    #[must_use]
    pub fn column_name(&self, index: usize) -> &str {
        self.statement().column_name(index).unwrap_or("")
    }

    /// 0-based position of the column called `name` (ASCII case-insensitive).
    ///
    /// # Errors
    /// Returns `UnknownColumnError` if the row has no such column.
    pub fn column_index(&self, name: &str) -> Result<usize> {
        self.statement()
            .column_index(name)
            .map_err(|_| SqliteDriverError::UnknownColumnError(name.to_string()))
    }

    /// Raw value of column `index`, borrowed from engine memory.
    ///
    /// # Errors
    /// Returns `UnknownColumnError` when `index` is out of range.
    pub fn get_ref(&self, index: usize) -> Result<ValueRef<'_>> {
        Ok(self.inner.get_ref(index)?)
    }

    /// Scan column `index` into `T`. NULL becomes `T`'s zero value unless `T` is an `Option`.
    ///
    /// # Errors
    /// Returns `UnknownColumnError` when `index` is out of range, or `ConversionError`.
    pub fn get<T: FromColumn>(&self, index: usize) -> Result<T> {
        let value = self.get_ref(index)?;
        T::from_column(value).map_err(|mismatch| {
            SqliteDriverError::conversion(index, self.column_name(index), mismatch.from, mismatch.to)
        })
    }

    /// Scan the column called `name` into `T`.
    ///
    /// # Errors
    /// Returns `UnknownColumnError` if the row has no such column, or `ConversionError`.
    pub fn get_named<T: FromColumn>(&self, name: &str) -> Result<T> {
        self.get(self.column_index(name)?)
    }

    /// Scan column `index` into `T`, also reporting whether it was NULL.
    ///
    /// # Errors
    /// As [`Row::get`].
    pub fn scan_column<T: FromColumn>(&self, index: usize) -> Result<(T, bool)> {
        let is_null = matches!(self.get_ref(index)?, ValueRef::Null);
        Ok((self.get(index)?, is_null))
    }

    /// Named form of [`Row::scan_column`].
    ///
    /// # Errors
    /// As [`Row::get_named`].
    pub fn scan_named_column<T: FromColumn>(&self, name: &str) -> Result<(T, bool)> {
        self.scan_column(self.column_index(name)?)
    }

    /// Scan every column, in order, into a tuple whose arity equals the column count.
    ///
    /// # Errors
    /// Returns `MisuseError` on an arity mismatch, or the first `ConversionError`.
    pub fn scan<T: FromRow>(&self) -> Result<T> {
        if T::ARITY != self.column_count() {
            return Err(SqliteDriverError::MisuseError(format!(
                "scan into {} destinations but the row has {} columns",
                T::ARITY,
                self.column_count()
            )));
        }
        T::from_row(self, &|i| Ok(i))
    }

    /// Scan the named columns, in the order given, into a tuple of the same arity.
    ///
    /// # Errors
    /// Returns `MisuseError` when `names` and the tuple differ in length, `UnknownColumnError`
    /// for an unknown name, or the first `ConversionError`.
    pub fn scan_named<T: FromRow>(&self, names: &[&str]) -> Result<T> {
        if T::ARITY != names.len() {
            return Err(SqliteDriverError::MisuseError(format!(
                "scan into {} destinations but {} names were given",
                T::ARITY,
                names.len()
            )));
        }
        T::from_row(self, &|i| self.column_index(names[i]))
    }

    /// Copy the whole row into owned values.
    ///
    /// # Errors
    /// Returns `ConversionError` if a text column is not valid UTF-8.
    pub fn values(&self) -> Result<Vec<Value>> {
        (0..self.column_count()).map(|i| self.get(i)).collect()
    }
}

/// Tuples a row can be scanned into.
pub trait FromRow: Sized {
    const ARITY: usize;

    /// Build the tuple, mapping destination position to column index through `column`.
    ///
    /// # Errors
    /// Returns the first lookup or conversion error.
    fn from_row(row: &Row<'_, '_>, column: &dyn Fn(usize) -> Result<usize>) -> Result<Self>;
}

macro_rules! tuple_from_row {
    ($arity:expr; $($t:ident => $i:tt),+) => {
        impl<$($t: FromColumn),+> FromRow for ($($t,)+) {
            const ARITY: usize = $arity;

            fn from_row(row: &Row<'_, '_>, column: &dyn Fn(usize) -> Result<usize>) -> Result<Self> {
                Ok(($(row.get::<$t>(column($i)?)?,)+))
            }
        }
    };
}

tuple_from_row!(1; A => 0);
tuple_from_row!(2; A => 0, B => 1);
tuple_from_row!(3; A => 0, B => 1, C => 2);
tuple_from_row!(4; A => 0, B => 1, C => 2, D => 3);
tuple_from_row!(5; A => 0, B => 1, C => 2, D => 3, E => 4);
tuple_from_row!(6; A => 0, B => 1, C => 2, D => 3, E => 4, F => 5);
tuple_from_row!(7; A => 0, B => 1, C => 2, D => 3, E => 4, F => 5, G => 6);
tuple_from_row!(8; A => 0, B => 1, C => 2, D => 3, E => 4, F => 5, G => 6, H => 7);

/// Drain a cursor into a result set whose rows share `column_names`.
///
/// # Errors
/// Returns the first engine or conversion error raised while stepping.
pub fn build_result_set(rows: &mut Rows<'_>, column_names: Vec<String>) -> Result<ResultSet> {
    let col_count = column_names.len();
    let mut result_set = ResultSet::with_capacity(10);
    result_set.set_column_names(Arc::new(column_names));

    while let Some(row) = rows.step()? {
        let mut row_values = Vec::with_capacity(col_count);
        for i in 0..col_count {
            row_values.push(row.get::<Value>(i)?);
        }
        result_set.add_row_values(row_values);
    }

    Ok(result_set)
}
