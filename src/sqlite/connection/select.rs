use crate::conversion::FromColumn;
use crate::error::{Result, SqliteDriverError};
use crate::results::ResultSet;
use crate::sqlite::params::BindParams;

use super::Connection;

impl Connection {
    /// Run a query and collect every row.
    ///
    /// # Errors
    /// Returns `SqliteDriverError` if preparing, binding, stepping or converting fails.
    pub fn select<P: BindParams>(&self, sql: &str, params: P) -> Result<ResultSet> {
        let mut stmt = self.prepare_cached(sql)?;
        stmt.query_all(params)
    }

    /// Whether a query yields at least one row.
    ///
    /// # Errors
    /// Returns `SqliteDriverError` if preparing, binding or stepping fails.
    pub fn exists<P: BindParams>(&self, sql: &str, params: P) -> Result<bool> {
        let mut stmt = self.prepare_cached(sql)?;
        stmt.exists(params)
    }

    /// First column of the first row of a query.
    ///
    /// # Errors
    /// Returns `NotFoundError` if the query yields no row, otherwise as [`Connection::select`].
    pub fn one_value<T: FromColumn, P: BindParams>(&self, sql: &str, params: P) -> Result<T> {
        let mut stmt = self.prepare_cached(sql)?;
        let mut rows = stmt.query_with(params)?;
        match rows.step()? {
            Some(row) => row.get(0),
            None => Err(SqliteDriverError::NotFoundError(format!(
                "query returned no rows: {sql}"
            ))),
        }
    }

    /// Whether foreign-key enforcement is on.
    ///
    /// # Errors
    /// Returns `ConnectionClosedError` after close.
    pub fn foreign_keys_enabled(&self) -> Result<bool> {
        self.one_value("PRAGMA foreign_keys", ())
    }

    /// Turn foreign-key enforcement on or off and return the resulting state. The engine
    /// ignores the change inside a transaction.
    ///
    /// # Errors
    /// Returns `ConnectionClosedError` after close.
    pub fn enable_foreign_keys(&self, enabled: bool) -> Result<bool> {
        self.execute_batch(if enabled {
            "PRAGMA foreign_keys = ON"
        } else {
            "PRAGMA foreign_keys = OFF"
        })?;
        self.foreign_keys_enabled()
    }
}
