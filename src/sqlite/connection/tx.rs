use std::cell::Cell;

use crate::error::{Result, SqliteDriverError};

use super::Connection;

/// Locking mode requested by `BEGIN`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransactionBehavior {
    #[default]
    Deferred,
    Immediate,
    Exclusive,
}

impl TransactionBehavior {
    fn begin_sql(self) -> &'static str {
        match self {
            TransactionBehavior::Deferred => "BEGIN DEFERRED",
            TransactionBehavior::Immediate => "BEGIN IMMEDIATE",
            TransactionBehavior::Exclusive => "BEGIN EXCLUSIVE",
        }
    }
}

/// Transaction depth of a connection; nesting is not supported.
#[derive(Debug, Default)]
pub(crate) struct TransactionTracker {
    depth: Cell<u8>,
}

impl TransactionTracker {
    pub(crate) fn active(&self) -> bool {
        self.depth.get() > 0
    }

    fn set_active(&self, active: bool) {
        self.depth.set(u8::from(active));
    }

    /// Follow the engine: constraint conflicts and raw `COMMIT`/`ROLLBACK` can end a
    /// transaction without going through the tracker.
    fn sync(&self, raw: &rusqlite::Connection) {
        self.set_active(!raw.is_autocommit());
    }
}

impl Connection {
    /// Begin a deferred transaction.
    ///
    /// # Errors
    /// Returns `TransactionStateError` if a transaction is already active, or the engine error
    /// if `BEGIN` fails.
    pub fn begin(&self) -> Result<()> {
        self.begin_with(TransactionBehavior::Deferred)
    }

    /// Begin a transaction with an explicit locking mode.
    ///
    /// # Errors
    /// Returns `TransactionStateError` if a transaction is already active, or the engine error
    /// if `BEGIN` fails.
    pub fn begin_with(&self, behavior: TransactionBehavior) -> Result<()> {
        let (raw, _scope) = self.enter()?;
        self.tracker.sync(raw);
        if self.tracker.active() {
            return Err(SqliteDriverError::TransactionStateError(
                "SQLite transaction already in progress".into(),
            ));
        }
        raw.execute_batch(behavior.begin_sql())
            .map_err(|e| self.translate(e))?;
        self.tracker.set_active(true);
        tracing::debug!(?behavior, "sqlite transaction started");
        Ok(())
    }

    /// Commit the active transaction.
    ///
    /// # Errors
    /// Returns `TransactionStateError` if no transaction is active, or the engine error if
    /// `COMMIT` fails; a busy commit leaves the transaction open.
    pub fn commit(&self) -> Result<()> {
        self.finish_transaction("COMMIT")
    }

    /// Roll back the active transaction.
    ///
    /// # Errors
    /// Returns `TransactionStateError` if no transaction is active, or the engine error if
    /// `ROLLBACK` fails.
    pub fn rollback(&self) -> Result<()> {
        self.finish_transaction("ROLLBACK")
    }

    fn finish_transaction(&self, sql: &'static str) -> Result<()> {
        let (raw, _scope) = self.enter()?;
        self.tracker.sync(raw);
        if !self.tracker.active() {
            return Err(SqliteDriverError::TransactionStateError(
                "SQLite transaction not active".into(),
            ));
        }
        let result = raw.execute_batch(sql).map_err(|e| self.translate(e));
        // the engine may have ended the transaction even when the statement failed
        self.tracker.sync(raw);
        result?;
        tracing::debug!(sql, "sqlite transaction finished");
        Ok(())
    }

    /// Whether a transaction is open on this connection.
    #[must_use]
    pub fn in_transaction(&self) -> bool {
        if let Ok(raw) = self.handle() {
            self.tracker.sync(raw);
        }
        self.tracker.active()
    }

    /// Run `f` inside a transaction: commit when it returns `Ok`, roll back on `Err`.
    ///
    /// # Errors
    /// Returns the error from `begin`, from `f` (after rolling back) or from `commit`.
    pub fn with_transaction<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Self) -> Result<T>,
    {
        self.begin()?;
        match f(self) {
            Ok(value) => {
                self.commit()?;
                Ok(value)
            }
            Err(err) => {
                if !self.in_transaction() {
                    return Err(err);
                }
                if let Err(rollback_err) = self.rollback() {
                    tracing::warn!(error = %rollback_err, "rollback after failure did not complete");
                }
                Err(err)
            }
        }
    }
}
