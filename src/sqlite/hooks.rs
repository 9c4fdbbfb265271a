//! Bridging of engine-invoked callbacks back into caller closures.
//!
//! The engine calls fixed `fn` trampolines (busy, trace, profile) or rusqlite-owned shims
//! holding a clone of the connection's [`CallbackBridge`] (progress, authorizer). Trampolines
//! have no context argument, so every operation that enters the engine pushes its bridge on a
//! per-thread stack for the duration of the call; the engine only calls back synchronously on
//! the calling thread.

use std::cell::RefCell;
use std::ops::ControlFlow;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, TryLockError};
use std::time::Duration;

use rusqlite::hooks::{AuthAction, AuthContext};

use super::connection::Connection;
use crate::error::{Result, SqliteDriverError};

/// Answer of an authorizer callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Authorization {
    /// Allow the operation.
    Allow,
    /// Fail the statement with an authorization error.
    Deny,
    /// Treat the column as NULL (reads) or skip the operation silently.
    Ignore,
}

impl From<Authorization> for rusqlite::hooks::Authorization {
    fn from(value: Authorization) -> Self {
        match value {
            Authorization::Allow => rusqlite::hooks::Authorization::Allow,
            Authorization::Deny => rusqlite::hooks::Authorization::Deny,
            Authorization::Ignore => rusqlite::hooks::Authorization::Ignore,
        }
    }
}

/// Operation the engine asks permission for while compiling a statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Select,
    Read { table: String, column: String },
    Insert { table: String },
    Update { table: String, column: String },
    Delete { table: String },
    CreateTable { table: String },
    DropTable { table: String },
    CreateIndex { index: String, table: String },
    DropIndex { index: String, table: String },
    Pragma { name: String, value: Option<String> },
    Function { name: String },
    Transaction { operation: String },
    /// Any other action code, in its debug rendering.
    Other(String),
}

impl Action {
    fn from_auth(action: &AuthAction<'_>) -> Self {
        match action {
            AuthAction::Select => Action::Select,
            AuthAction::Read {
                table_name,
                column_name,
                ..
            } => Action::Read {
                table: (*table_name).to_string(),
                column: (*column_name).to_string(),
            },
            AuthAction::Insert { table_name, .. } => Action::Insert {
                table: (*table_name).to_string(),
            },
            AuthAction::Update {
                table_name,
                column_name,
                ..
            } => Action::Update {
                table: (*table_name).to_string(),
                column: (*column_name).to_string(),
            },
            AuthAction::Delete { table_name, .. } => Action::Delete {
                table: (*table_name).to_string(),
            },
            AuthAction::CreateTable { table_name, .. } => Action::CreateTable {
                table: (*table_name).to_string(),
            },
            AuthAction::DropTable { table_name, .. } => Action::DropTable {
                table: (*table_name).to_string(),
            },
            AuthAction::CreateIndex {
                index_name,
                table_name,
                ..
            } => Action::CreateIndex {
                index: (*index_name).to_string(),
                table: (*table_name).to_string(),
            },
            AuthAction::DropIndex {
                index_name,
                table_name,
                ..
            } => Action::DropIndex {
                index: (*index_name).to_string(),
                table: (*table_name).to_string(),
            },
            AuthAction::Pragma {
                pragma_name,
                pragma_value,
                ..
            } => Action::Pragma {
                name: (*pragma_name).to_string(),
                value: pragma_value.map(str::to_string),
            },
            AuthAction::Function { function_name, .. } => Action::Function {
                name: (*function_name).to_string(),
            },
            AuthAction::Transaction { operation, .. } => Action::Transaction {
                operation: format!("{operation:?}"),
            },
            other => Action::Other(format!("{other:?}")),
        }
    }

    /// Short action name, as reported by `AuthorizationError`.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Action::Select => "select",
            Action::Read { .. } => "read",
            Action::Insert { .. } => "insert",
            Action::Update { .. } => "update",
            Action::Delete { .. } => "delete",
            Action::CreateTable { .. } => "create_table",
            Action::DropTable { .. } => "drop_table",
            Action::CreateIndex { .. } => "create_index",
            Action::DropIndex { .. } => "drop_index",
            Action::Pragma { .. } => "pragma",
            Action::Function { .. } => "function",
            Action::Transaction { .. } => "transaction",
            Action::Other(debug) => debug,
        }
    }

    /// Object names the action applies to.
    #[must_use]
    pub fn operands(&self) -> Vec<String> {
        match self {
            Action::Select | Action::Other(_) => Vec::new(),
            Action::Read { table, column } | Action::Update { table, column } => {
                vec![table.clone(), column.clone()]
            }
            Action::Insert { table }
            | Action::Delete { table }
            | Action::CreateTable { table }
            | Action::DropTable { table } => vec![table.clone()],
            Action::CreateIndex { index, table } | Action::DropIndex { index, table } => {
                vec![index.clone(), table.clone()]
            }
            Action::Pragma { name, value } => {
                let mut out = vec![name.clone()];
                out.extend(value.clone());
                out
            }
            Action::Function { name } => vec![name.clone()],
            Action::Transaction { operation } => vec![operation.clone()],
        }
    }
}

/// One authorization request handed to the authorizer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthRequest {
    pub action: Action,
    /// Database the object lives in (`main`, `temp`, ...), when known.
    pub database: Option<String>,
    /// Innermost trigger or view responsible for the access, if any.
    pub accessor: Option<String>,
}

type TraceFn = Box<dyn FnMut(&str) + Send>;
type ProfileFn = Box<dyn FnMut(&str, Duration) + Send>;
type ProgressFn = Box<dyn FnMut() -> ControlFlow<()> + Send>;
type BusyFn = Box<dyn FnMut(i32) -> bool + Send>;
type AuthorizeFn = Box<dyn FnMut(&AuthRequest) -> Authorization + Send>;

/// Registered callbacks of one connection.
#[derive(Default)]
pub struct CallbackBridge {
    trace: Mutex<Option<TraceFn>>,
    profile: Mutex<Option<ProfileFn>>,
    progress: Mutex<Option<ProgressFn>>,
    busy: Mutex<Option<BusyFn>>,
    authorizer: Mutex<Option<AuthorizeFn>>,
    last_denied: Mutex<Option<AuthRequest>>,
    dispatching: AtomicUsize,
}

impl std::fmt::Debug for CallbackBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallbackBridge")
            .field("dispatching", &self.dispatching.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

thread_local! {
    static ACTIVE: RefCell<Vec<Arc<CallbackBridge>>> = const { RefCell::new(Vec::new()) };
}

/// Marks a bridge as the target of trampolines while an engine call runs.
pub(crate) struct BridgeScope {
    bridge: Arc<CallbackBridge>,
}

impl BridgeScope {
    pub(crate) fn enter(bridge: &Arc<CallbackBridge>) -> Self {
        ACTIVE.with(|active| active.borrow_mut().push(Arc::clone(bridge)));
        Self {
            bridge: Arc::clone(bridge),
        }
    }
}

impl Drop for BridgeScope {
    fn drop(&mut self) {
        ACTIVE.with(|active| {
            let mut active = active.borrow_mut();
            if let Some(pos) = active.iter().rposition(|b| Arc::ptr_eq(b, &self.bridge)) {
                active.remove(pos);
            }
        });
    }
}

fn active_bridge() -> Option<Arc<CallbackBridge>> {
    ACTIVE.with(|active| active.borrow().last().cloned())
}

fn set_slot<T>(slot: &Mutex<Option<T>>, value: Option<T>) {
    let mut guard = slot.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
    // the previous handler drops after the lock is released
    let previous = std::mem::replace(&mut *guard, value);
    drop(guard);
    drop(previous);
}

/// Counts one running handler; the count drops again even if the handler unwinds.
struct Dispatching<'a>(&'a AtomicUsize);

impl<'a> Dispatching<'a> {
    fn enter(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for Dispatching<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl CallbackBridge {
    /// Run `call` against the handler in `slot`, or return `neutral` when no handler is
    /// registered or the same slot is already being dispatched further up the stack.
    fn dispatch<H: ?Sized, R>(
        &self,
        slot: &Mutex<Option<Box<H>>>,
        neutral: R,
        call: impl FnOnce(&mut H) -> R,
    ) -> R {
        let mut guard = match slot.try_lock() {
            Ok(guard) => guard,
            Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner(),
            Err(TryLockError::WouldBlock) => return neutral,
        };
        let Some(handler) = guard.as_mut() else {
            return neutral;
        };
        let _dispatching = Dispatching::enter(&self.dispatching);
        call(handler)
    }

    pub(crate) fn ensure_not_dispatching(&self) -> Result<()> {
        if self.dispatching.load(Ordering::SeqCst) > 0 {
            return Err(SqliteDriverError::MisuseError(
                "callbacks cannot be registered from inside a callback".into(),
            ));
        }
        Ok(())
    }

    fn dispatch_trace(&self, sql: &str) {
        self.dispatch(&self.trace, (), |f| f(sql));
    }

    fn dispatch_profile(&self, sql: &str, elapsed: Duration) {
        self.dispatch(&self.profile, (), |f| f(sql, elapsed));
    }

    fn dispatch_busy(&self, count: i32) -> bool {
        self.dispatch(&self.busy, false, |f| f(count))
    }

    fn dispatch_progress(&self) -> bool {
        self.dispatch(&self.progress, false, |f| f().is_break())
    }

    fn dispatch_authorize(&self, ctx: &AuthContext<'_>) -> rusqlite::hooks::Authorization {
        let request = AuthRequest {
            action: Action::from_auth(&ctx.action),
            database: ctx.database_name.map(str::to_string),
            accessor: ctx.accessor.map(str::to_string),
        };
        let answer = self.dispatch(&self.authorizer, Authorization::Allow, |f| f(&request));
        if answer == Authorization::Deny {
            set_slot(&self.last_denied, Some(request));
        }
        answer.into()
    }

    /// Map an engine error, filling in the recorded denial for authorization failures.
    pub(crate) fn translate(&self, err: rusqlite::Error) -> SqliteDriverError {
        match SqliteDriverError::from(err) {
            SqliteDriverError::AuthorizationError { action, operands } => {
                let denied = self
                    .last_denied
                    .lock()
                    .unwrap_or_else(std::sync::PoisonError::into_inner)
                    .take();
                match denied {
                    Some(request) => SqliteDriverError::AuthorizationError {
                        action: request.action.name().to_string(),
                        operands: request.action.operands(),
                    },
                    None => SqliteDriverError::AuthorizationError { action, operands },
                }
            }
            other => other,
        }
    }
}

pub(crate) fn trace_trampoline(sql: &str) {
    if let Some(bridge) = active_bridge() {
        bridge.dispatch_trace(sql);
    }
}

pub(crate) fn profile_trampoline(sql: &str, elapsed: Duration) {
    if let Some(bridge) = active_bridge() {
        bridge.dispatch_profile(sql, elapsed);
    }
}

fn busy_trampoline(count: i32) -> bool {
    active_bridge().is_some_and(|bridge| bridge.dispatch_busy(count))
}

impl Connection {
    /// Register a busy handler. It receives `ctx` and the number of times it has already been
    /// invoked for the current lock, and returns whether the engine should retry. Replaces any
    /// busy timeout.
    ///
    /// # Errors
    /// Returns `ConnectionClosedError` after close, or `MisuseError` when called from inside a
    /// callback of this connection.
    pub fn set_busy_handler<C, F>(&self, ctx: C, mut handler: F) -> Result<()>
    where
        C: Send + 'static,
        F: FnMut(&C, i32) -> bool + Send + 'static,
    {
        let conn = self.handle()?;
        self.bridge.ensure_not_dispatching()?;
        set_slot(
            &self.bridge.busy,
            Some(Box::new(move |count: i32| handler(&ctx, count))),
        );
        conn.busy_handler(Some(busy_trampoline))?;
        tracing::trace!("busy handler registered");
        Ok(())
    }

    /// Remove the busy handler; a busy engine then fails immediately.
    ///
    /// # Errors
    /// Returns `ConnectionClosedError` after close, or `MisuseError` from inside a callback.
    pub fn clear_busy_handler(&self) -> Result<()> {
        let conn = self.handle()?;
        self.bridge.ensure_not_dispatching()?;
        conn.busy_handler(None)?;
        set_slot(&self.bridge.busy, None);
        tracing::trace!("busy handler cleared");
        Ok(())
    }

    /// Use the engine's sleeping retry for up to `timeout`. Replaces a registered busy handler.
    ///
    /// # Errors
    /// Returns `ConnectionClosedError` after close, or `MisuseError` from inside a callback.
    pub fn busy_timeout(&self, timeout: Duration) -> Result<()> {
        let conn = self.handle()?;
        self.bridge.ensure_not_dispatching()?;
        conn.busy_timeout(timeout)?;
        set_slot(&self.bridge.busy, None);
        Ok(())
    }

    /// Register a trace callback, called with the SQL text of each statement as it starts.
    ///
    /// # Errors
    /// Returns `ConnectionClosedError` after close, or `MisuseError` from inside a callback.
    pub fn set_trace<C, F>(&self, ctx: C, mut handler: F) -> Result<()>
    where
        C: Send + 'static,
        F: FnMut(&C, &str) + Send + 'static,
    {
        self.handle()?;
        self.bridge.ensure_not_dispatching()?;
        set_slot(
            &self.bridge.trace,
            Some(Box::new(move |sql: &str| handler(&ctx, sql))),
        );
        tracing::trace!("trace callback registered");
        Ok(())
    }

    /// Remove the trace callback.
    ///
    /// # Errors
    /// Returns `ConnectionClosedError` after close, or `MisuseError` from inside a callback.
    pub fn clear_trace(&self) -> Result<()> {
        self.handle()?;
        self.bridge.ensure_not_dispatching()?;
        set_slot(&self.bridge.trace, None);
        Ok(())
    }

    /// Register a profile callback, called with the SQL text and wall-clock duration when a
    /// statement finishes.
    ///
    /// # Errors
    /// Returns `ConnectionClosedError` after close, or `MisuseError` from inside a callback.
    pub fn set_profile<C, F>(&self, ctx: C, mut handler: F) -> Result<()>
    where
        C: Send + 'static,
        F: FnMut(&C, &str, Duration) + Send + 'static,
    {
        self.handle()?;
        self.bridge.ensure_not_dispatching()?;
        set_slot(
            &self.bridge.profile,
            Some(Box::new(move |sql: &str, elapsed: Duration| handler(&ctx, sql, elapsed))),
        );
        tracing::trace!("profile callback registered");
        Ok(())
    }

    /// Remove the profile callback.
    ///
    /// # Errors
    /// Returns `ConnectionClosedError` after close, or `MisuseError` from inside a callback.
    pub fn clear_profile(&self) -> Result<()> {
        self.handle()?;
        self.bridge.ensure_not_dispatching()?;
        set_slot(&self.bridge.profile, None);
        Ok(())
    }

    /// Register a progress handler invoked every `every_n_ops` virtual-machine instructions.
    /// Returning `ControlFlow::Break` interrupts the running statement.
    ///
    /// # Errors
    /// Returns `ConnectionClosedError` after close, `ConfigurationError` for a non-positive
    /// interval, or `MisuseError` from inside a callback.
    pub fn set_progress_handler<C, F>(&self, ctx: C, every_n_ops: i32, mut handler: F) -> Result<()>
    where
        C: Send + 'static,
        F: FnMut(&C) -> ControlFlow<()> + Send + 'static,
    {
        let conn = self.handle()?;
        self.bridge.ensure_not_dispatching()?;
        if every_n_ops <= 0 {
            return Err(SqliteDriverError::ConfigurationError(format!(
                "progress interval must be positive, got {every_n_ops}"
            )));
        }
        set_slot(
            &self.bridge.progress,
            Some(Box::new(move || handler(&ctx))),
        );
        let bridge = Arc::clone(&self.bridge);
        conn.progress_handler(every_n_ops, Some(move || bridge.dispatch_progress()));
        tracing::trace!(every_n_ops, "progress handler registered");
        Ok(())
    }

    /// Remove the progress handler.
    ///
    /// # Errors
    /// Returns `ConnectionClosedError` after close, or `MisuseError` from inside a callback.
    pub fn clear_progress_handler(&self) -> Result<()> {
        let conn = self.handle()?;
        self.bridge.ensure_not_dispatching()?;
        conn.progress_handler(0, None::<fn() -> bool>);
        set_slot(&self.bridge.progress, None);
        Ok(())
    }

    /// Register an authorizer consulted while statements compile.
    ///
    /// # Errors
    /// Returns `ConnectionClosedError` after close, or `MisuseError` from inside a callback.
    pub fn set_authorizer<C, F>(&self, ctx: C, mut handler: F) -> Result<()>
    where
        C: Send + 'static,
        F: FnMut(&C, &AuthRequest) -> Authorization + Send + 'static,
    {
        let conn = self.handle()?;
        self.bridge.ensure_not_dispatching()?;
        set_slot(
            &self.bridge.authorizer,
            Some(Box::new(move |request: &AuthRequest| handler(&ctx, request))),
        );
        let bridge = Arc::clone(&self.bridge);
        conn.authorizer(Some(move |ctx: AuthContext<'_>| {
            bridge.dispatch_authorize(&ctx)
        }));
        tracing::trace!("authorizer registered");
        Ok(())
    }

    /// Remove the authorizer; every operation is allowed again.
    ///
    /// # Errors
    /// Returns `ConnectionClosedError` after close, or `MisuseError` from inside a callback.
    pub fn clear_authorizer(&self) -> Result<()> {
        let conn = self.handle()?;
        self.bridge.ensure_not_dispatching()?;
        conn.authorizer(None::<fn(AuthContext<'_>) -> rusqlite::hooks::Authorization>);
        set_slot(&self.bridge.authorizer, None);
        Ok(())
    }
}
