//! Synchronous `SQLite` driver layer over rusqlite.
//!
//! A [`Connection`] compiles [`Statement`]s, which step through [`Rows`] and convert values in
//! both directions through [`ToValue`] and [`FromColumn`]. Blob cells can be streamed with
//! [`BlobStream`], and engine callbacks (trace, profile, progress, busy, authorizer) are bridged
//! back into plain Rust closures.
//!
//! ```rust
//! use sqlite_driver::prelude::*;
//!
//! # fn main() -> Result<(), SqliteDriverError> {
//! let conn = Connection::open_in_memory()?;
//! conn.execute_batch("CREATE TABLE t (id INTEGER PRIMARY KEY, name TEXT)")?;
//! conn.execute("INSERT INTO t (name) VALUES (:name)", named_params! {":name": "alice"})?;
//!
//! let mut stmt = conn.prepare("SELECT id, name FROM t")?;
//! let mut rows = stmt.query()?;
//! while let Some(row) = rows.step()? {
//!     let (id, name): (i64, String) = row.scan()?;
//!     assert_eq!((id, name.as_str()), (1, "alice"));
//! }
//! # Ok(())
//! # }
//! ```

pub mod conversion;
pub mod engine;
pub mod error;
pub mod prelude;
pub mod results;
pub mod sqlite;
pub mod types;

pub use conversion::{FromColumn, TypeMismatch};
pub use error::{Result, SqliteDriverError};
pub use results::{OwnedRow, ResultSet};
pub use sqlite::{
    BlobStream, Connection, OpenFlag, OpenOptions, OpenOptionsBuilder, Row, Rows, Statement,
    StatusCounter, TransactionBehavior,
};
pub use types::{ToValue, Value};
