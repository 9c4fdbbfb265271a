//! Process-wide engine facts and init-once defaults.

use std::sync::Mutex;
use std::time::Duration;

use lazy_static::lazy_static;

use crate::error::{Result, SqliteDriverError};

/// Defaults applied to every connection opened after [`configure`] runs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EngineConfig {
    /// Busy timeout installed on open when `OpenOptions` does not carry its own.
    pub default_busy_timeout: Option<Duration>,
}

struct EngineInfo {
    version: &'static str,
    version_number: i32,
    threadsafe: i32,
}

lazy_static! {
    static ref ENGINE_INFO: EngineInfo = EngineInfo {
        version: rusqlite::version(),
        version_number: rusqlite::version_number(),
        threadsafe: detect_threadsafe(),
    };
    static ref ENGINE_CONFIG: Mutex<Option<EngineConfig>> = Mutex::new(None);
}

fn detect_threadsafe() -> i32 {
    let detect = || -> rusqlite::Result<i32> {
        let conn = rusqlite::Connection::open_in_memory()?;
        let mut stmt = conn.prepare("SELECT compile_options FROM pragma_compile_options")?;
        let options = stmt.query_map([], |row| row.get::<_, String>(0))?;
        for option in options {
            if let Some(level) = option?.strip_prefix("THREADSAFE=") {
                return Ok(level.parse().unwrap_or(0));
            }
        }
        Ok(0)
    };
    detect().unwrap_or(0)
}

/// Engine library version string, e.g. `"3.45.0"`.
#[must_use]
pub fn version() -> &'static str {
    ENGINE_INFO.version
}

/// Engine library version as a number, e.g. `3045000`.
#[must_use]
pub fn version_number() -> i32 {
    ENGINE_INFO.version_number
}

/// Compile-time threading mode of the engine: 0 single-thread, 1 serialized, 2 multi-thread.
#[must_use]
pub fn threadsafe() -> i32 {
    ENGINE_INFO.threadsafe
}

/// Install process-wide defaults. May be called once per process.
///
/// # Errors
/// Returns `SqliteDriverError::ConfigurationError` if defaults were already installed.
pub fn configure(config: EngineConfig) -> Result<()> {
    let mut guard = ENGINE_CONFIG
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner);
    if guard.is_some() {
        return Err(SqliteDriverError::ConfigurationError(
            "engine already configured".into(),
        ));
    }
    tracing::debug!(?config, "engine configured");
    *guard = Some(config);
    Ok(())
}

pub(crate) fn default_busy_timeout() -> Option<Duration> {
    ENGINE_CONFIG
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner)
        .as_ref()
        .and_then(|cfg| cfg.default_busy_timeout)
}
