//! Nested transactions with lazy materialization.
//!
//! [`TransactionManager`] keeps a stack of frames per connection. Opening a
//! frame is pure bookkeeping; the physical `BEGIN` (or `SAVEPOINT` for nested
//! frames) is issued by [`TransactionManager::materialize`], which the adapter
//! calls right before running a user statement. A transaction that never runs
//! a statement therefore never takes a lock.
//!
//! The only isolation level the embedded engine can emulate is
//! `READ UNCOMMITTED`, through the connection-level `read_uncommitted` pragma
//! on a shared-cache connection. The pragma value in force before the frame
//! materialized is put back when that frame ends, whether it commits or rolls
//! back, and even when the commit or rollback itself fails.

use std::panic::{AssertUnwindSafe, catch_unwind, resume_unwind};

use serde::Deserialize;

use crate::error::{Error, Result, TransactionError, TransactionErrorKind};

/// Transaction isolation level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IsolationLevel {
    /// Sees uncommitted changes from other connections sharing the cache.
    ReadUncommitted,
    ReadCommitted,
    RepeatableRead,
    Serializable,
}

impl IsolationLevel {
    /// Get the SQL syntax for this isolation level.
    #[must_use]
    pub const fn as_sql(&self) -> &'static str {
        match self {
            IsolationLevel::ReadUncommitted => "READ UNCOMMITTED",
            IsolationLevel::ReadCommitted => "READ COMMITTED",
            IsolationLevel::RepeatableRead => "REPEATABLE READ",
            IsolationLevel::Serializable => "SERIALIZABLE",
        }
    }
}

/// Locking behavior of the outermost `BEGIN`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionMode {
    /// Locks are taken on first read/write.
    #[default]
    Deferred,
    /// A write lock is taken immediately.
    Immediate,
    /// No other connection may read or write until commit.
    Exclusive,
}

impl TransactionMode {
    #[must_use]
    pub const fn as_sql(&self) -> &'static str {
        match self {
            TransactionMode::Deferred => "DEFERRED",
            TransactionMode::Immediate => "IMMEDIATE",
            TransactionMode::Exclusive => "EXCLUSIVE",
        }
    }
}

/// Options for opening a transaction frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransactionOptions {
    pub isolation: Option<IsolationLevel>,
    /// Whether a later `transaction` call may run inside this frame instead
    /// of opening a savepoint.
    pub joinable: bool,
    /// Always open a new frame, even when the current one is joinable.
    pub requires_new: bool,
}

impl Default for TransactionOptions {
    fn default() -> Self {
        Self {
            isolation: None,
            joinable: true,
            requires_new: false,
        }
    }
}

impl TransactionOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn isolation(mut self, level: IsolationLevel) -> Self {
        self.isolation = Some(level);
        self
    }

    pub fn joinable(mut self, joinable: bool) -> Self {
        self.joinable = joinable;
        self
    }

    pub fn requires_new(mut self, requires_new: bool) -> Self {
        self.requires_new = requires_new;
        self
    }
}

/// Where the connection stands with respect to transactions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionState {
    /// No frame is open.
    None,
    /// Frames are open but no `BEGIN` has been issued yet.
    Open,
    /// The outermost frame has issued its `BEGIN`.
    Materialized,
}

/// Physical operations the manager needs from a connection.
///
/// Statements issued through this trait are adapter bookkeeping and are not
/// subject to the write/access guard.
pub trait TransactionBackend {
    fn execute_internal(&mut self, sql: &str) -> Result<()>;

    /// Whether the connection was opened in shared-cache mode.
    fn is_shared_cache(&self) -> bool;

    /// Current value of the `read_uncommitted` pragma.
    fn read_uncommitted(&mut self) -> Result<bool>;
}

#[derive(Debug, Clone)]
struct Frame {
    savepoint: String,
    isolation: Option<IsolationLevel>,
    joinable: bool,
    materialized: bool,
    // Pragma value to put back when the frame ends; set only when the frame
    // changed it.
    restore_read_uncommitted: Option<bool>,
}

/// Stack of open transaction frames for one connection.
#[derive(Debug, Default)]
pub struct TransactionManager {
    frames: Vec<Frame>,
    mode: TransactionMode,
}

impl TransactionManager {
    pub fn new(mode: TransactionMode) -> Self {
        Self {
            frames: Vec::new(),
            mode,
        }
    }

    pub fn mode(&self) -> TransactionMode {
        self.mode
    }

    pub fn open_transactions(&self) -> usize {
        self.frames.len()
    }

    pub fn state(&self) -> TransactionState {
        match self.frames.first() {
            None => TransactionState::None,
            Some(frame) if frame.materialized => TransactionState::Materialized,
            Some(_) => TransactionState::Open,
        }
    }

    /// Whether the innermost frame can be joined.
    pub fn current_joinable(&self) -> bool {
        self.frames.last().is_some_and(|frame| frame.joinable)
    }

    /// Savepoint name of the innermost frame.
    pub fn current_savepoint(&self) -> Option<&str> {
        self.frames.last().map(|frame| frame.savepoint.as_str())
    }

    /// Push a frame without touching the connection.
    ///
    /// # Errors
    ///
    /// [`TransactionErrorKind::Isolation`] when an isolation level other than
    /// `ReadUncommitted` is requested, or any level on a nested frame. The
    /// stack is unchanged on error.
    pub fn begin_transaction(&mut self, options: TransactionOptions) -> Result<()> {
        if let Some(level) = options.isolation {
            if level != IsolationLevel::ReadUncommitted {
                return Err(Error::isolation(format!(
                    "SQLite only supports the READ UNCOMMITTED isolation level, not {}",
                    level.as_sql()
                )));
            }
            if !self.frames.is_empty() {
                return Err(Error::isolation(
                    "cannot set transaction isolation in a nested transaction",
                ));
            }
        }

        let depth = self.frames.len();
        self.frames.push(Frame {
            savepoint: format!("active_record_{}", depth),
            isolation: options.isolation,
            joinable: options.joinable,
            materialized: false,
            restore_read_uncommitted: None,
        });
        tracing::trace!(depth = depth + 1, "transaction frame opened");
        Ok(())
    }

    /// Issue `BEGIN` / `SAVEPOINT` for every frame that has not yet been
    /// materialized, outermost first.
    ///
    /// # Errors
    ///
    /// [`TransactionErrorKind::SharedCacheRequired`] when a read-uncommitted
    /// frame runs on a private-cache connection (nothing is issued), or the
    /// backend's error for a failed statement.
    pub fn materialize(&mut self, backend: &mut dyn TransactionBackend) -> Result<()> {
        let mode = self.mode;
        for (depth, frame) in self.frames.iter_mut().enumerate() {
            if frame.materialized {
                continue;
            }
            if depth == 0 {
                begin_outermost(frame, mode, backend)?;
            } else {
                backend.execute_internal(&format!("SAVEPOINT {}", frame.savepoint))?;
            }
            frame.materialized = true;
            tracing::debug!(depth = depth + 1, savepoint = %frame.savepoint, "transaction materialized");
        }
        Ok(())
    }

    /// Pop the innermost frame, committing or releasing it if it was
    /// materialized.
    ///
    /// A failed outermost `COMMIT` is followed by a best-effort `ROLLBACK`
    /// so the connection is left without a transaction.
    pub fn commit_transaction(&mut self, backend: &mut dyn TransactionBackend) -> Result<()> {
        let frame = self.pop_frame("commit")?;
        let outermost = self.frames.is_empty();

        let result = if !frame.materialized {
            Ok(())
        } else if outermost {
            let result = backend.execute_internal("COMMIT TRANSACTION");
            if result.is_err() {
                if let Err(e) = backend.execute_internal("ROLLBACK TRANSACTION") {
                    tracing::warn!(error = %e, "rollback after failed commit also failed");
                }
            }
            result
        } else {
            backend.execute_internal(&format!("RELEASE SAVEPOINT {}", frame.savepoint))
        };

        tracing::debug!(depth = self.frames.len() + 1, ok = result.is_ok(), "transaction committed");
        finish_frame(&frame, backend, result)
    }

    /// Pop the innermost frame, rolling it back if it was materialized.
    pub fn rollback_transaction(&mut self, backend: &mut dyn TransactionBackend) -> Result<()> {
        let frame = self.pop_frame("roll back")?;
        let outermost = self.frames.is_empty();

        let result = if !frame.materialized {
            Ok(())
        } else if outermost {
            backend.execute_internal("ROLLBACK TRANSACTION")
        } else {
            backend
                .execute_internal(&format!("ROLLBACK TO SAVEPOINT {}", frame.savepoint))
                .and_then(|()| {
                    backend.execute_internal(&format!("RELEASE SAVEPOINT {}", frame.savepoint))
                })
        };

        tracing::debug!(depth = self.frames.len() + 1, ok = result.is_ok(), "transaction rolled back");
        finish_frame(&frame, backend, result)
    }

    /// Roll back every open frame, innermost first. Every frame is popped even
    /// if a rollback fails; the first failure is returned.
    pub fn rollback_all(&mut self, backend: &mut dyn TransactionBackend) -> Result<()> {
        let mut first_error = None;
        while !self.frames.is_empty() {
            if let Err(e) = self.rollback_transaction(backend) {
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    /// Forget every frame without touching the connection. Used after the
    /// physical connection was replaced.
    pub fn discard(&mut self) {
        if !self.frames.is_empty() {
            tracing::debug!(frames = self.frames.len(), "discarding transaction frames");
        }
        self.frames.clear();
    }

    fn pop_frame(&mut self, action: &str) -> Result<Frame> {
        self.frames.pop().ok_or_else(|| {
            Error::Transaction(TransactionError {
                kind: TransactionErrorKind::NoActiveTransaction,
                message: format!("cannot {} - no transaction is active", action),
            })
        })
    }
}

fn begin_outermost(
    frame: &mut Frame,
    mode: TransactionMode,
    backend: &mut dyn TransactionBackend,
) -> Result<()> {
    let begin = format!("BEGIN {} TRANSACTION", mode.as_sql());
    if frame.isolation != Some(IsolationLevel::ReadUncommitted) {
        return backend.execute_internal(&begin);
    }

    if !backend.is_shared_cache() {
        return Err(Error::Transaction(TransactionError {
            kind: TransactionErrorKind::SharedCacheRequired,
            message: "You need to enable the shared-cache mode in SQLite mode before attempting to change the transaction isolation level".to_string(),
        }));
    }

    let previous = backend.read_uncommitted()?;
    backend.execute_internal("PRAGMA read_uncommitted = ON")?;
    frame.restore_read_uncommitted = Some(previous);
    if let Err(e) = backend.execute_internal(&begin) {
        let _ = restore_isolation(frame, backend);
        frame.restore_read_uncommitted = None;
        return Err(e);
    }
    Ok(())
}

// Put the pragma back, then report the commit/rollback outcome. A restore
// failure is only reported when the statement itself succeeded.
fn finish_frame(
    frame: &Frame,
    backend: &mut dyn TransactionBackend,
    result: Result<()>,
) -> Result<()> {
    match (result, restore_isolation(frame, backend)) {
        (Err(e), _) => Err(e),
        (Ok(()), Err(e)) => Err(e),
        (Ok(()), Ok(())) => Ok(()),
    }
}

fn restore_isolation(frame: &Frame, backend: &mut dyn TransactionBackend) -> Result<()> {
    let Some(previous) = frame.restore_read_uncommitted else {
        return Ok(());
    };
    let sql = if previous {
        "PRAGMA read_uncommitted = ON"
    } else {
        "PRAGMA read_uncommitted = OFF"
    };
    backend.execute_internal(sql).inspect_err(|e| {
        tracing::warn!(error = %e, "failed to restore read_uncommitted");
    })
}

/// Block-style transactions on top of begin/commit/rollback.
pub trait Transactional {
    fn begin_transaction(&mut self, options: TransactionOptions) -> Result<()>;
    fn commit_transaction(&mut self) -> Result<()>;
    fn rollback_transaction(&mut self) -> Result<()>;

    /// Whether the innermost open frame can be joined.
    fn transaction_joinable(&self) -> bool;

    /// Run `f` inside a transaction.
    ///
    /// When a joinable frame is already open and `requires_new` is not set,
    /// `f` runs inside it. Otherwise a new frame is opened, committed when
    /// `f` returns `Ok`, and rolled back when `f` returns `Err` or panics
    /// (the panic is resumed afterwards).
    ///
    /// # Errors
    ///
    /// Requesting an isolation level while joining is an
    /// [`TransactionErrorKind::Isolation`] error.
    fn transaction<T, F>(&mut self, options: TransactionOptions, f: F) -> Result<T>
    where
        Self: Sized,
        F: FnOnce(&mut Self) -> Result<T>,
    {
        if !options.requires_new && self.transaction_joinable() {
            if options.isolation.is_some() {
                return Err(Error::isolation(
                    "cannot set isolation when joining a transaction",
                ));
            }
            return f(self);
        }

        self.begin_transaction(options)?;
        match catch_unwind(AssertUnwindSafe(|| f(self))) {
            Ok(Ok(value)) => {
                self.commit_transaction()?;
                Ok(value)
            }
            Ok(Err(e)) => {
                if let Err(rollback_error) = self.rollback_transaction() {
                    tracing::warn!(error = %rollback_error, "rollback failed after transaction error");
                }
                Err(e)
            }
            Err(panic) => {
                if let Err(rollback_error) = self.rollback_transaction() {
                    tracing::warn!(error = %rollback_error, "rollback failed after panic");
                }
                resume_unwind(panic)
            }
        }
    }
}
