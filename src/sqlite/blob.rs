use std::io;

use rusqlite::DatabaseName;
use rusqlite::blob::Blob;

use crate::error::{Result, SqliteDriverError};
use crate::sqlite::connection::Connection;
use crate::sqlite::hooks::BridgeScope;

/// Incremental reader/writer over one blob cell.
///
/// The size is fixed when the stream opens; writes never grow the blob, so reserve space
/// first with [`Value::ZeroBlob`](crate::types::Value::ZeroBlob).
pub struct BlobStream<'conn> {
    conn: &'conn Connection,
    inner: Option<Blob<'conn>>,
    size: usize,
    offset: usize,
    writable: bool,
}

fn database_name(database: &str) -> DatabaseName<'_> {
    match database {
        "main" => DatabaseName::Main,
        "temp" => DatabaseName::Temp,
        other => DatabaseName::Attached(other),
    }
}

fn blob_error(conn: &Connection, err: rusqlite::Error) -> SqliteDriverError {
    match conn.translate(err) {
        // SQLITE_ERROR with "no such table", "no such column" or "no such rowid"
        SqliteDriverError::SqlError { message, .. } if message.contains("no such") => {
            SqliteDriverError::NotFoundError(message)
        }
        other => other,
    }
}

impl Connection {
    /// Open the blob stored at (`database`, `table`, `column`, `rowid`).
    ///
    /// # Errors
    /// Returns `NotFoundError` when the table, column or row does not exist, or the engine
    /// error when the cell cannot be opened (for example because it is not a blob or text).
    pub fn open_blob(
        &self,
        database: &str,
        table: &str,
        column: &str,
        rowid: i64,
        writable: bool,
    ) -> Result<BlobStream<'_>> {
        let (raw, _scope) = self.enter()?;
        let blob = raw
            .blob_open(database_name(database), table, column, rowid, !writable)
            .map_err(|e| blob_error(self, e))?;
        let size = blob.len();
        tracing::debug!(database, table, column, rowid, size, writable, "sqlite blob opened");
        Ok(BlobStream {
            conn: self,
            inner: Some(blob),
            size,
            offset: 0,
            writable,
        })
    }
}

impl BlobStream<'_> {
    fn check_range(&self, offset: usize, len: usize) -> Result<()> {
        if offset.checked_add(len).is_none_or(|end| end > self.size) {
            return Err(SqliteDriverError::RangeError {
                offset,
                len,
                size: self.size,
            });
        }
        Ok(())
    }

    fn check_writable(&self) -> Result<()> {
        if self.writable {
            Ok(())
        } else {
            Err(SqliteDriverError::SqlError {
                code: rusqlite::ffi::SQLITE_READONLY,
                message: "blob stream opened read-only".into(),
            })
        }
    }

    /// Size of the blob in bytes.
    ///
    /// # Errors
    /// Returns `BlobClosedError` after close.
    pub fn size(&self) -> Result<usize> {
        self.inner.as_ref().ok_or(SqliteDriverError::BlobClosedError)?;
        Ok(self.size)
    }

    /// Current position of the sequential cursor.
    ///
    /// # Errors
    /// Returns `BlobClosedError` after close.
    pub fn offset(&self) -> Result<usize> {
        self.inner.as_ref().ok_or(SqliteDriverError::BlobClosedError)?;
        Ok(self.offset)
    }

    #[must_use]
    pub fn is_writable(&self) -> bool {
        self.writable
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.inner.is_none()
    }

    /// Fill `buf` from `offset`. Does not move the sequential cursor.
    ///
    /// # Errors
    /// Returns `RangeError` if the range extends past the end, `BlobClosedError` after close,
    /// or the engine error (`SQLITE_ABORT` once the row was modified elsewhere).
    pub fn read_at(&self, buf: &mut [u8], offset: usize) -> Result<()> {
        let blob = self.inner.as_ref().ok_or(SqliteDriverError::BlobClosedError)?;
        self.check_range(offset, buf.len())?;
        let _scope = BridgeScope::enter(&self.conn.bridge);
        blob.read_at_exact(buf, offset)
            .map_err(|e| self.conn.translate(e))
    }

    /// Write all of `buf` at `offset`. Does not move the sequential cursor.
    ///
    /// # Errors
    /// Returns `SqlError` with `SQLITE_READONLY` on a read-only stream, `RangeError` if the
    /// range extends past the end, or `BlobClosedError` after close.
    pub fn write_at(&mut self, buf: &[u8], offset: usize) -> Result<()> {
        if self.inner.is_none() {
            return Err(SqliteDriverError::BlobClosedError);
        }
        self.check_writable()?;
        self.check_range(offset, buf.len())?;
        let conn = self.conn;
        let blob = self.inner.as_mut().ok_or(SqliteDriverError::BlobClosedError)?;
        let _scope = BridgeScope::enter(&conn.bridge);
        blob.write_at(buf, offset).map_err(|e| conn.translate(e))
    }

    /// Read up to `buf.len()` bytes at the cursor and advance it; returns 0 at the end.
    ///
    /// # Errors
    /// Returns `BlobClosedError` after close, or the engine error.
    pub fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        let remaining = self.size.saturating_sub(self.offset);
        let n = buf.len().min(remaining);
        self.read_at(&mut buf[..n], self.offset)?;
        self.offset += n;
        Ok(n)
    }

    /// Write all of `buf` at the cursor and advance it.
    ///
    /// # Errors
    /// Returns `RangeError` if `buf` does not fit before the end, otherwise as
    /// [`BlobStream::write_at`].
    pub fn write(&mut self, buf: &[u8]) -> Result<usize> {
        self.write_at(buf, self.offset)?;
        self.offset += buf.len();
        Ok(buf.len())
    }

    /// Move the sequential cursor; `offset` may equal the size.
    ///
    /// # Errors
    /// Returns `RangeError` past the end, or `BlobClosedError` after close.
    pub fn seek(&mut self, offset: usize) -> Result<()> {
        self.inner.as_ref().ok_or(SqliteDriverError::BlobClosedError)?;
        self.check_range(offset, 0)?;
        self.offset = offset;
        Ok(())
    }

    /// Point the stream at another row of the same table and column.
    ///
    /// # Errors
    /// Returns `NotFoundError` if the row does not exist, or `BlobClosedError` after close.
    pub fn reopen(&mut self, rowid: i64) -> Result<()> {
        let conn = self.conn;
        let blob = self.inner.as_mut().ok_or(SqliteDriverError::BlobClosedError)?;
        let _scope = BridgeScope::enter(&conn.bridge);
        blob.reopen(rowid).map_err(|e| blob_error(conn, e))?;
        self.size = blob.len();
        self.offset = 0;
        Ok(())
    }

    /// Release the blob handle. Idempotent.
    ///
    /// # Errors
    /// Returns the engine error reported while closing.
    pub fn close(&mut self) -> Result<()> {
        let Some(blob) = self.inner.take() else {
            return Ok(());
        };
        let _scope = BridgeScope::enter(&self.conn.bridge);
        blob.close().map_err(|e| self.conn.translate(e))
    }
}

fn io_error(err: SqliteDriverError) -> io::Error {
    match err {
        SqliteDriverError::RangeError { .. } => io::Error::new(io::ErrorKind::WriteZero, err),
        other => io::Error::other(other),
    }
}

impl io::Read for BlobStream<'_> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        BlobStream::read(self, buf).map_err(io_error)
    }
}

impl io::Write for BlobStream<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        // short writes are allowed here: write what fits
        let remaining = self.size.saturating_sub(self.offset);
        let n = buf.len().min(remaining);
        if n == 0 && !buf.is_empty() {
            return Ok(0);
        }
        BlobStream::write(self, &buf[..n]).map_err(io_error)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl io::Seek for BlobStream<'_> {
    fn seek(&mut self, pos: io::SeekFrom) -> io::Result<u64> {
        let size = i64::try_from(self.size).map_err(io::Error::other)?;
        let current = i64::try_from(self.offset).map_err(io::Error::other)?;
        let target = match pos {
            io::SeekFrom::Start(n) => i64::try_from(n).map_err(io::Error::other)?,
            io::SeekFrom::End(delta) => size.saturating_add(delta),
            io::SeekFrom::Current(delta) => current.saturating_add(delta),
        };
        let target = usize::try_from(target).map_err(|_| {
            io::Error::new(io::ErrorKind::InvalidInput, "seek before start of blob")
        })?;
        BlobStream::seek(self, target).map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
        u64::try_from(target).map_err(io::Error::other)
    }
}

impl Drop for BlobStream<'_> {
    fn drop(&mut self) {
        if let Err(err) = self.close() {
            tracing::warn!(error = %err, "sqlite blob close failed");
        }
    }
}

impl std::fmt::Debug for BlobStream<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlobStream")
            .field("size", &self.size)
            .field("offset", &self.offset)
            .field("writable", &self.writable)
            .field("closed", &self.inner.is_none())
            .finish_non_exhaustive()
    }
}
