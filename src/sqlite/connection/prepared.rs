use crate::error::Result;
use crate::sqlite::params::BindParams;
use crate::sqlite::prepared::{Handle, Statement};

use super::Connection;

impl Connection {
    /// Compile the first statement of `sql`.
    ///
    /// # Errors
    /// Returns `SqlError` for syntax or schema errors, `AuthorizationError` when the
    /// authorizer denies an operation, or `ConnectionClosedError` after close.
    pub fn prepare(&self, sql: &str) -> Result<Statement<'_>> {
        let (raw, _scope) = self.enter()?;
        let stmt = raw.prepare(sql).map_err(|e| self.translate(e))?;
        tracing::debug!(sql, "sqlite statement prepared");
        Ok(Statement::new(self, Handle::Plain(stmt), sql))
    }

    /// Compile the first statement of `sql` and bind `params` to it.
    ///
    /// # Errors
    /// As [`Connection::prepare`] and [`Statement::bind_all`].
    pub fn prepare_with<P: BindParams>(&self, sql: &str, params: P) -> Result<Statement<'_>> {
        let mut stmt = self.prepare(sql)?;
        stmt.bind_all(params)?;
        Ok(stmt)
    }

    /// Compile `sql` through the connection's statement cache.
    ///
    /// The handle is reused when the same text was prepared before. It comes back reset
    /// with every slot NULL, and returns to the cache when the statement drops.
    ///
    /// # Errors
    /// As [`Connection::prepare`].
    pub fn prepare_cached(&self, sql: &str) -> Result<Statement<'_>> {
        let (raw, _scope) = self.enter()?;
        let stmt = raw.prepare_cached(sql).map_err(|e| self.translate(e))?;
        tracing::trace!(sql, "sqlite statement taken from cache");
        Ok(Statement::new(self, Handle::Cached(stmt), sql))
    }

    /// Number of compiled statements the cache keeps; 0 disables caching.
    ///
    /// # Errors
    /// Returns `ConnectionClosedError` after close.
    pub fn set_statement_cache_capacity(&self, capacity: usize) -> Result<()> {
        self.handle()?.set_prepared_statement_cache_capacity(capacity);
        tracing::debug!(capacity, "sqlite statement cache resized");
        Ok(())
    }

    /// Finalize every statement held by the cache.
    ///
    /// # Errors
    /// Returns `ConnectionClosedError` after close.
    pub fn flush_statement_cache(&self) -> Result<()> {
        self.handle()?.flush_prepared_statement_cache();
        Ok(())
    }
}
