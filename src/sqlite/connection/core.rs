use std::fmt;
use std::sync::Arc;

use crate::engine;
use crate::error::{Result, SqliteDriverError};
use crate::sqlite::config::{OpenFlag, OpenOptions, validate_flags};
use crate::sqlite::hooks::{BridgeScope, CallbackBridge, profile_trampoline, trace_trampoline};

use super::tx::TransactionTracker;

/// Connection wrapper around one native `SQLite` handle.
///
/// Statements and blob streams borrow the connection, so `close` cannot be called while any
/// of them is alive. The connection may move between threads but is never shared.
pub struct Connection {
    pub(crate) inner: Option<rusqlite::Connection>,
    pub(crate) bridge: Arc<CallbackBridge>,
    pub(crate) tracker: TransactionTracker,
    path: String,
}

impl Connection {
    /// Open `path` with the given flags. An empty flag list means `ReadWrite | Create`; an
    /// empty path opens a private temporary database.
    ///
    /// # Errors
    /// Returns `ConfigurationError` for invalid flag sets, `NotFoundError` when the file is
    /// missing and `Create` was not requested, or `SqlError` for other engine failures.
    pub fn open(path: &str, flags: &[OpenFlag]) -> Result<Self> {
        Self::open_with(&OpenOptions::new(path).with_flags(flags))
    }

    /// Open a private in-memory database.
    ///
    /// # Errors
    /// Returns `SqliteDriverError` if the engine cannot allocate the database.
    pub fn open_in_memory() -> Result<Self> {
        Self::open(":memory:", &[])
    }

    /// Open a connection from an options struct.
    ///
    /// # Errors
    /// See [`Connection::open`]; applying the busy timeout or foreign-key setting may also fail.
    pub fn open_with(options: &OpenOptions) -> Result<Self> {
        let flags = validate_flags(&options.flags)?;
        let mut raw = rusqlite::Connection::open_with_flags(&options.path, flags)?;
        raw.trace(Some(trace_trampoline));
        raw.profile(Some(profile_trampoline));

        if let Some(timeout) = options.busy_timeout().or_else(engine::default_busy_timeout) {
            raw.busy_timeout(timeout)?;
        }

        let conn = Self {
            inner: Some(raw),
            bridge: Arc::new(CallbackBridge::default()),
            tracker: TransactionTracker::default(),
            path: options.path.clone(),
        };
        if let Some(enabled) = options.foreign_keys {
            conn.enable_foreign_keys(enabled)?;
        }
        tracing::debug!(path = %conn.path, ?flags, "sqlite connection opened");
        Ok(conn)
    }

    /// Close the connection. Idempotent.
    ///
    /// # Errors
    /// Returns `BusyError` (or another engine error) if the engine refuses to close; the
    /// connection then stays open and usable.
    pub fn close(&mut self) -> Result<()> {
        let Some(raw) = self.inner.take() else {
            return Ok(());
        };
        let _scope = BridgeScope::enter(&self.bridge);
        match raw.close() {
            Ok(()) => {
                tracing::debug!(path = %self.path, "sqlite connection closed");
                Ok(())
            }
            Err((raw, err)) => {
                tracing::warn!(path = %self.path, error = %err, "sqlite close failed");
                self.inner = Some(raw);
                Err(self.bridge.translate(err))
            }
        }
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.inner.is_none()
    }

    /// Path the connection was opened with.
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    pub(crate) fn handle(&self) -> Result<&rusqlite::Connection> {
        self.inner
            .as_ref()
            .ok_or(SqliteDriverError::ConnectionClosedError)
    }

    /// Borrow the native handle with this connection's callbacks active.
    pub(crate) fn enter(&self) -> Result<(&rusqlite::Connection, BridgeScope)> {
        let raw = self.handle()?;
        Ok((raw, BridgeScope::enter(&self.bridge)))
    }

    pub(crate) fn translate(&self, err: rusqlite::Error) -> SqliteDriverError {
        self.bridge.translate(err)
    }

    /// Whether the engine is outside any explicit transaction.
    ///
    /// # Errors
    /// Returns `ConnectionClosedError` after close.
    pub fn is_autocommit(&self) -> Result<bool> {
        Ok(self.handle()?.is_autocommit())
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("path", &self.path)
            .field("closed", &self.inner.is_none())
            .field("tracker", &self.tracker)
            .finish_non_exhaustive()
    }
}
