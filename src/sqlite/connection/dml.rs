use crate::error::Result;
use crate::sqlite::params::BindParams;

use super::Connection;

impl Connection {
    /// Run one statement with `params` and return the number of rows it changed.
    ///
    /// # Errors
    /// Returns `SqliteDriverError` if preparing, binding or stepping fails.
    pub fn execute<P: BindParams>(&self, sql: &str, params: P) -> Result<u64> {
        let mut stmt = self.prepare_cached(sql)?;
        stmt.execute(params)
    }

    /// Run every `;`-separated statement in `sql`, without parameters.
    ///
    /// # Errors
    /// Returns the error of the first statement that fails; earlier statements stay applied.
    pub fn execute_batch(&self, sql: &str) -> Result<()> {
        let (raw, _scope) = self.enter()?;
        raw.execute_batch(sql).map_err(|e| self.translate(e))
    }

    /// Rowid of the most recent successful insert on this connection.
    ///
    /// # Errors
    /// Returns `ConnectionClosedError` after close.
    pub fn last_insert_rowid(&self) -> Result<i64> {
        Ok(self.handle()?.last_insert_rowid())
    }

    /// Rows changed by the most recent insert, update or delete.
    ///
    /// # Errors
    /// Returns `ConnectionClosedError` after close.
    pub fn changes(&self) -> Result<u64> {
        Ok(self.handle()?.changes())
    }

    /// Rows changed since the connection was opened.
    ///
    /// # Errors
    /// Returns `ConnectionClosedError` after close.
    pub fn total_changes(&self) -> Result<u64> {
        self.one_value("SELECT total_changes()", ())
    }
}
