//! Convenient imports for common functionality.
//!
//! This module re-exports the most commonly used types and macros
//! to make it easier to get started with the library.

pub use crate::conversion::FromColumn;
pub use crate::error::SqliteDriverError;
pub use crate::results::{OwnedRow, ResultSet};
pub use crate::sqlite::{
    Action, AuthRequest, Authorization, BlobStream, Connection, OpenFlag, OpenOptions,
    OpenOptionsBuilder, Row, Rows, Statement, StatusCounter, TransactionBehavior,
};
pub use crate::types::{ToValue, Value};
pub use crate::{named_params, params};
