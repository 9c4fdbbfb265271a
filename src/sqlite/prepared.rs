use std::ops::{Deref, DerefMut};

use rusqlite::StatementStatus;

use crate::error::{Result, SqliteDriverError};
use crate::results::ResultSet;
use crate::sqlite::connection::Connection;
use crate::sqlite::hooks::BridgeScope;
use crate::sqlite::params::BindParams;
use crate::sqlite::query::{Rows, build_result_set};
use crate::types::{ToValue, Value};

/// Per-statement performance counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusCounter {
    /// Forward steps taken by full table scans.
    FullscanStep,
    /// Sort operations performed.
    Sort,
    /// Rows inserted into transient automatic indexes.
    AutoIndex,
    /// Virtual-machine operations executed.
    VmStep,
    /// Times the statement was recompiled after a schema change.
    Reprepare,
    /// Times the statement ran to completion or was reset.
    Run,
    /// Approximate heap bytes used by the statement.
    MemUsed,
}

impl From<StatusCounter> for StatementStatus {
    fn from(value: StatusCounter) -> Self {
        match value {
            StatusCounter::FullscanStep => StatementStatus::FullscanStep,
            StatusCounter::Sort => StatementStatus::Sort,
            StatusCounter::AutoIndex => StatementStatus::AutoIndex,
            StatusCounter::VmStep => StatementStatus::VmStep,
            StatusCounter::Reprepare => StatementStatus::RePrepare,
            StatusCounter::Run => StatementStatus::Run,
            StatusCounter::MemUsed => StatementStatus::MemUsed,
        }
    }
}

/// Compiled handle owned by a [`Statement`]; cached handles go back to the connection's
/// statement cache when dropped.
pub(crate) enum Handle<'conn> {
    Plain(rusqlite::Statement<'conn>),
    Cached(rusqlite::CachedStatement<'conn>),
}

impl<'conn> Deref for Handle<'conn> {
    type Target = rusqlite::Statement<'conn>;

    fn deref(&self) -> &Self::Target {
        match self {
            Handle::Plain(stmt) => stmt,
            Handle::Cached(stmt) => stmt,
        }
    }
}

impl DerefMut for Handle<'_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        match self {
            Handle::Plain(stmt) => stmt,
            Handle::Cached(stmt) => stmt,
        }
    }
}

/// One compiled statement, borrowed from its connection.
///
/// Only the first statement of multi-statement text is compiled. Bindings survive resets and
/// are replaced one slot at a time by [`Statement::bind`]. A statement obtained from
/// [`Connection::prepare_cached`] starts with every slot NULL.
pub struct Statement<'conn> {
    conn: &'conn Connection,
    inner: Option<Handle<'conn>>,
    sql: String,
}

impl<'conn> Statement<'conn> {
    pub(crate) fn new(conn: &'conn Connection, inner: Handle<'conn>, sql: &str) -> Self {
        Self {
            conn,
            inner: Some(inner),
            sql: sql.to_string(),
        }
    }

    fn live(&self) -> Result<&rusqlite::Statement<'conn>> {
        self.inner
            .as_deref()
            .ok_or(SqliteDriverError::StatementFinalizedError)
    }

    fn live_mut(&mut self) -> Result<&mut rusqlite::Statement<'conn>> {
        self.inner
            .as_deref_mut()
            .ok_or(SqliteDriverError::StatementFinalizedError)
    }

    /// SQL text the statement was prepared from.
    #[must_use]
    pub fn sql(&self) -> &str {
        &self.sql
    }

    /// Number of parameter slots; the highest index for `?NNN` markers.
    ///
    /// # Errors
    /// Returns `StatementFinalizedError` after finalize.
    pub fn bind_parameter_count(&self) -> Result<usize> {
        Ok(self.live()?.parameter_count())
    }

    /// Name of the 1-based parameter slot including its marker, `None` for bare `?`.
    ///
    /// # Errors
    /// Returns `StatementFinalizedError` after finalize.
    pub fn bind_parameter_name(&self, index: usize) -> Result<Option<&str>> {
        Ok(self.live()?.parameter_name(index))
    }

    /// 1-based slot of a named parameter, `None` if the statement has no such name.
    ///
    /// # Errors
    /// Returns `StatementFinalizedError` after finalize.
    pub fn bind_parameter_index(&self, name: &str) -> Result<Option<usize>> {
        Ok(self.live()?.parameter_index(name)?)
    }

    /// # Errors
    /// Returns `StatementFinalizedError` after finalize.
    pub fn column_count(&self) -> Result<usize> {
        Ok(self.live()?.column_count())
    }

    /// # Errors
    /// Returns `StatementFinalizedError` after finalize, or `UnknownColumnError` when `index`
    /// is out of range.
    pub fn column_name(&self, index: usize) -> Result<&str> {
        Ok(self.live()?.column_name(index)?)
    }

    /// # Errors
    /// Returns `StatementFinalizedError` after finalize.
    pub fn column_names(&self) -> Result<Vec<&str>> {
        Ok(self.live()?.column_names())
    }

    /// Whether the compiled plan leaves the database unchanged.
    ///
    /// # Errors
    /// Returns `StatementFinalizedError` after finalize.
    pub fn is_read_only(&self) -> Result<bool> {
        Ok(self.live()?.readonly())
    }

    /// Bind `value` to the 1-based parameter slot `index`.
    ///
    /// # Errors
    /// Returns `ConversionError` if the value has no engine representation, or `SqlError`
    /// carrying `SQLITE_RANGE` when `index` is out of range.
    pub fn bind<T: ToValue + ?Sized>(&mut self, index: usize, value: &T) -> Result<()> {
        let conn = self.conn;
        let stmt = self.live_mut()?;
        let label = || {
            stmt.parameter_name(index)
                .map_or_else(|| format!("?{index}"), str::to_string)
        };
        let value = match value.to_value() {
            Ok(Value::ZeroBlob(len)) if len < 0 => {
                return Err(SqliteDriverError::conversion(
                    index,
                    label(),
                    format!("zeroblob({len})"),
                    "blob",
                ));
            }
            Ok(value) => value,
            Err(SqliteDriverError::ConversionError { from, to, .. }) => {
                return Err(SqliteDriverError::ConversionError {
                    column: index,
                    name: label(),
                    from,
                    to,
                });
            }
            Err(other) => return Err(other),
        };
        stmt.raw_bind_parameter(index, &value)
            .map_err(|e| conn.translate(e))
    }

    /// Bind `value` to the parameter called `name` (marker included, e.g. `:id`).
    ///
    /// # Errors
    /// Returns `UnknownParameterError` if no slot has that name, otherwise as [`Statement::bind`].
    pub fn bind_named<T: ToValue + ?Sized>(&mut self, name: &str, value: &T) -> Result<()> {
        let index = self
            .bind_parameter_index(name)?
            .ok_or_else(|| SqliteDriverError::UnknownParameterError(name.to_string()))?;
        self.bind(index, value)
    }

    /// Bind a whole parameter list.
    ///
    /// # Errors
    /// As [`Statement::bind`] / [`Statement::bind_named`].
    pub fn bind_all<P: BindParams>(&mut self, params: P) -> Result<()> {
        params.bind_to(self)
    }

    /// Rebind every slot to NULL.
    ///
    /// # Errors
    /// Returns `StatementFinalizedError` after finalize.
    pub fn clear_bindings(&mut self) -> Result<()> {
        for index in 1..=self.bind_parameter_count()? {
            self.bind(index, &Value::Null)?;
        }
        Ok(())
    }

    /// Start stepping with the current bindings. The statement is reset when the cursor drops.
    ///
    /// # Errors
    /// Returns `StatementFinalizedError` after finalize.
    pub fn query(&mut self) -> Result<Rows<'_>> {
        let conn = self.conn;
        let stmt = self.live_mut()?;
        Ok(Rows::new(conn, stmt.raw_query()))
    }

    /// Bind `params`, then start stepping.
    ///
    /// # Errors
    /// As [`Statement::bind_all`] and [`Statement::query`].
    pub fn query_with<P: BindParams>(&mut self, params: P) -> Result<Rows<'_>> {
        self.bind_all(params)?;
        self.query()
    }

    /// Bind `params` and run the statement to completion.
    ///
    /// Returns the rows changed, or 0 for read-only statements.
    ///
    /// # Errors
    /// Returns the first engine error raised while stepping.
    pub fn execute<P: BindParams>(&mut self, params: P) -> Result<u64> {
        self.bind_all(params)?;
        let read_only = self.is_read_only()?;
        {
            let mut rows = self.query()?;
            while rows.step()?.is_some() {}
        }
        if read_only {
            Ok(0)
        } else {
            self.conn.changes()
        }
    }

    /// Whether the statement yields at least one row for `params`.
    ///
    /// # Errors
    /// Returns the first engine error raised while stepping.
    pub fn exists<P: BindParams>(&mut self, params: P) -> Result<bool> {
        let mut rows = self.query_with(params)?;
        Ok(rows.step()?.is_some())
    }

    /// Bind `params` and collect every row.
    ///
    /// # Errors
    /// Returns the first engine or conversion error raised while stepping.
    pub fn query_all<P: BindParams>(&mut self, params: P) -> Result<ResultSet> {
        let column_names = self
            .column_names()?
            .into_iter()
            .map(str::to_string)
            .collect();
        let mut rows = self.query_with(params)?;
        build_result_set(&mut rows, column_names)
    }

    /// Reset the statement so the next step starts over; bindings are kept.
    ///
    /// # Errors
    /// Returns `StatementFinalizedError` after finalize.
    pub fn reset(&mut self) -> Result<()> {
        let conn = self.conn;
        let stmt = self.live_mut()?;
        let _scope = BridgeScope::enter(&conn.bridge);
        drop(stmt.raw_query());
        Ok(())
    }

    /// Read a status counter, optionally zeroing it afterwards.
    ///
    /// # Errors
    /// Returns `StatementFinalizedError` after finalize.
    pub fn status(&self, counter: StatusCounter, reset: bool) -> Result<i32> {
        let stmt = self.live()?;
        Ok(if reset {
            stmt.reset_status(counter.into())
        } else {
            stmt.get_status(counter.into())
        })
    }

    /// Release the compiled plan. Idempotent.
    ///
    /// A cached statement is handed back to the connection's cache instead.
    ///
    /// # Errors
    /// Returns the engine error reported by the last execution, if any.
    pub fn finalize(&mut self) -> Result<()> {
        let Some(handle) = self.inner.take() else {
            return Ok(());
        };
        let _scope = BridgeScope::enter(&self.conn.bridge);
        match handle {
            Handle::Plain(stmt) => {
                tracing::trace!(sql = %self.sql, "statement finalized");
                stmt.finalize().map_err(|e| self.conn.translate(e))
            }
            Handle::Cached(stmt) => {
                tracing::trace!(sql = %self.sql, "statement returned to cache");
                drop(stmt);
                Ok(())
            }
        }
    }

    #[must_use]
    pub fn is_finalized(&self) -> bool {
        self.inner.is_none()
    }

    /// Whether the statement came from the connection's statement cache.
    #[must_use]
    pub fn is_cached(&self) -> bool {
        matches!(self.inner, Some(Handle::Cached(_)))
    }
}

impl std::fmt::Debug for Statement<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Statement")
            .field("sql", &self.sql)
            .field("finalized", &self.inner.is_none())
            .field("cached", &self.is_cached())
            .finish_non_exhaustive()
    }
}
