use std::time::Duration;

use rusqlite::OpenFlags;
use serde::Deserialize;

use crate::error::{Result, SqliteDriverError};
use crate::sqlite::connection::Connection;

/// Flags accepted when opening a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OpenFlag {
    ReadOnly,
    ReadWrite,
    Create,
    /// Interpret the path as a `file:` URI.
    Uri,
    /// Open an in-memory database named by the path.
    Memory,
    NoMutex,
    FullMutex,
    SharedCache,
    PrivateCache,
}

impl OpenFlag {
    fn bits(self) -> OpenFlags {
        match self {
            OpenFlag::ReadOnly => OpenFlags::SQLITE_OPEN_READ_ONLY,
            OpenFlag::ReadWrite => OpenFlags::SQLITE_OPEN_READ_WRITE,
            OpenFlag::Create => OpenFlags::SQLITE_OPEN_CREATE,
            OpenFlag::Uri => OpenFlags::SQLITE_OPEN_URI,
            OpenFlag::Memory => OpenFlags::SQLITE_OPEN_MEMORY,
            OpenFlag::NoMutex => OpenFlags::SQLITE_OPEN_NO_MUTEX,
            OpenFlag::FullMutex => OpenFlags::SQLITE_OPEN_FULL_MUTEX,
            OpenFlag::SharedCache => OpenFlags::SQLITE_OPEN_SHARED_CACHE,
            OpenFlag::PrivateCache => OpenFlags::SQLITE_OPEN_PRIVATE_CACHE,
        }
    }
}

/// Check a flag set and fold it into engine open flags.
///
/// An empty set means `ReadWrite | Create`.
///
/// # Errors
/// Returns `SqliteDriverError::ConfigurationError` for contradictory or incomplete sets.
pub fn validate_flags(flags: &[OpenFlag]) -> Result<OpenFlags> {
    if flags.is_empty() {
        return Ok(OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_CREATE);
    }
    let has = |flag: OpenFlag| flags.contains(&flag);
    let conflict = |a: OpenFlag, b: OpenFlag| {
        SqliteDriverError::ConfigurationError(format!("{a:?} cannot be combined with {b:?}"))
    };

    if !has(OpenFlag::ReadOnly) && !has(OpenFlag::ReadWrite) {
        return Err(SqliteDriverError::ConfigurationError(
            "one of ReadOnly or ReadWrite is required".into(),
        ));
    }
    if has(OpenFlag::ReadOnly) && has(OpenFlag::ReadWrite) {
        return Err(conflict(OpenFlag::ReadOnly, OpenFlag::ReadWrite));
    }
    if has(OpenFlag::ReadOnly) && has(OpenFlag::Create) {
        return Err(conflict(OpenFlag::ReadOnly, OpenFlag::Create));
    }
    if has(OpenFlag::NoMutex) && has(OpenFlag::FullMutex) {
        return Err(conflict(OpenFlag::NoMutex, OpenFlag::FullMutex));
    }
    if has(OpenFlag::SharedCache) && has(OpenFlag::PrivateCache) {
        return Err(conflict(OpenFlag::SharedCache, OpenFlag::PrivateCache));
    }

    Ok(flags
        .iter()
        .fold(OpenFlags::empty(), |acc, flag| acc | flag.bits()))
}

/// Options for opening a connection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OpenOptions {
    pub path: String,
    pub flags: Vec<OpenFlag>,
    pub busy_timeout_ms: Option<u64>,
    pub foreign_keys: Option<bool>,
}

impl OpenOptions {
    #[must_use]
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_flags(mut self, flags: &[OpenFlag]) -> Self {
        self.flags = flags.to_vec();
        self
    }

    /// Parse options from a JSON document.
    ///
    /// # Errors
    /// Returns `SqliteDriverError::ConfigurationError` if the document does not describe
    /// valid options.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| {
            SqliteDriverError::ConfigurationError(format!("invalid open options: {e}"))
        })
    }

    #[must_use]
    pub fn busy_timeout(&self) -> Option<Duration> {
        self.busy_timeout_ms.map(Duration::from_millis)
    }
}

/// Fluent builder for [`OpenOptions`].
#[derive(Debug, Clone)]
pub struct OpenOptionsBuilder {
    opts: OpenOptions,
}

impl OpenOptionsBuilder {
    #[must_use]
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            opts: OpenOptions::new(path),
        }
    }

    #[must_use]
    pub fn flag(mut self, flag: OpenFlag) -> Self {
        if !self.opts.flags.contains(&flag) {
            self.opts.flags.push(flag);
        }
        self
    }

    #[must_use]
    pub fn flags(mut self, flags: &[OpenFlag]) -> Self {
        self.opts.flags = flags.to_vec();
        self
    }

    #[must_use]
    pub fn busy_timeout(mut self, timeout: Duration) -> Self {
        self.opts.busy_timeout_ms = Some(u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX));
        self
    }

    #[must_use]
    pub fn foreign_keys(mut self, enabled: bool) -> Self {
        self.opts.foreign_keys = Some(enabled);
        self
    }

    #[must_use]
    pub fn finish(self) -> OpenOptions {
        self.opts
    }

    /// Open a connection with these options.
    ///
    /// # Errors
    /// Returns `SqliteDriverError` if the flags are invalid or the engine cannot open the path.
    pub fn build(self) -> Result<Connection> {
        Connection::open_with(&self.finish())
    }
}
