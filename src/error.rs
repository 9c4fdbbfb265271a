use rusqlite::ffi;
use thiserror::Error;

/// Errors surfaced by every fallible driver operation.
///
/// Each variant maps onto an engine result code through [`SqliteDriverError::code`],
/// so callers that only care about the numeric code can treat host-side and
/// engine-side failures alike.
#[derive(Debug, Error)]
pub enum SqliteDriverError {
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    #[error("Not found: {0}")]
    NotFoundError(String),

    #[error("SQL error (code {code}): {message}")]
    SqlError { code: i32, message: String },

    #[error("Conversion error: column {column} ({name}) cannot convert {from} to {to}")]
    ConversionError {
        column: usize,
        name: String,
        from: String,
        to: String,
    },

    #[error("Unknown parameter: {0}")]
    UnknownParameterError(String),

    #[error("Unknown column: {0}")]
    UnknownColumnError(String),

    #[error("Statement already finalized")]
    StatementFinalizedError,

    #[error("Connection already closed")]
    ConnectionClosedError,

    #[error("Blob stream already closed")]
    BlobClosedError,

    #[error("Transaction state error: {0}")]
    TransactionStateError(String),

    #[error("Database busy: {0}")]
    BusyError(String),

    #[error("Authorization denied: {action} {operands:?}")]
    AuthorizationError {
        action: String,
        operands: Vec<String>,
    },

    #[error("Operation interrupted")]
    InterruptedError,

    #[error("Range error: {len} bytes at offset {offset} exceed blob size {size}")]
    RangeError {
        offset: usize,
        len: usize,
        size: usize,
    },

    #[error("Misuse: {0}")]
    MisuseError(String),
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, SqliteDriverError>;

impl SqliteDriverError {
    /// Engine-defined numeric result code for this error.
    #[must_use]
    pub fn code(&self) -> i32 {
        match self {
            Self::ConfigurationError(_) => ffi::SQLITE_MISUSE,
            Self::NotFoundError(_) => ffi::SQLITE_NOTFOUND,
            Self::SqlError { code, .. } => *code,
            Self::ConversionError { .. } => ffi::SQLITE_MISMATCH,
            Self::UnknownParameterError(_) | Self::UnknownColumnError(_) => ffi::SQLITE_RANGE,
            Self::StatementFinalizedError
            | Self::ConnectionClosedError
            | Self::BlobClosedError
            | Self::TransactionStateError(_)
            | Self::MisuseError(_) => ffi::SQLITE_MISUSE,
            Self::BusyError(_) => ffi::SQLITE_BUSY,
            Self::AuthorizationError { .. } => ffi::SQLITE_AUTH,
            Self::InterruptedError => ffi::SQLITE_INTERRUPT,
            Self::RangeError { .. } => ffi::SQLITE_RANGE,
        }
    }

    pub(crate) fn conversion(
        column: usize,
        name: impl Into<String>,
        from: impl Into<String>,
        to: impl Into<String>,
    ) -> Self {
        Self::ConversionError {
            column,
            name: name.into(),
            from: from.into(),
            to: to.into(),
        }
    }
}

impl From<rusqlite::Error> for SqliteDriverError {
    fn from(err: rusqlite::Error) -> Self {
        match err {
            rusqlite::Error::SqliteFailure(code, message) => {
                let message = message.unwrap_or_else(|| code.to_string());
                match code.code {
                    rusqlite::ErrorCode::DatabaseBusy | rusqlite::ErrorCode::DatabaseLocked => {
                        SqliteDriverError::BusyError(message)
                    }
                    rusqlite::ErrorCode::OperationInterrupted => SqliteDriverError::InterruptedError,
                    rusqlite::ErrorCode::AuthorizationForStatementDenied => {
                        SqliteDriverError::AuthorizationError {
                            action: "unknown".into(),
                            operands: vec![message],
                        }
                    }
                    rusqlite::ErrorCode::CannotOpen => SqliteDriverError::NotFoundError(message),
                    _ => SqliteDriverError::SqlError {
                        code: code.extended_code,
                        message,
                    },
                }
            }
            rusqlite::Error::InvalidParameterName(name) => {
                SqliteDriverError::UnknownParameterError(name)
            }
            rusqlite::Error::InvalidColumnName(name) => SqliteDriverError::UnknownColumnError(name),
            rusqlite::Error::InvalidColumnIndex(idx) => {
                SqliteDriverError::UnknownColumnError(format!("#{idx}"))
            }
            rusqlite::Error::InvalidParameterCount(given, expected) => {
                SqliteDriverError::SqlError {
                    code: ffi::SQLITE_RANGE,
                    message: format!("{given} parameters supplied, statement expects {expected}"),
                }
            }
            rusqlite::Error::Utf8Error(e) => SqliteDriverError::SqlError {
                code: ffi::SQLITE_MISMATCH,
                message: e.to_string(),
            },
            rusqlite::Error::NulError(e) => SqliteDriverError::ConfigurationError(e.to_string()),
            other => SqliteDriverError::SqlError {
                code: ffi::SQLITE_ERROR,
                message: other.to_string(),
            },
        }
    }
}
