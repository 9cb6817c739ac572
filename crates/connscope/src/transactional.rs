//! Transactional scope.

use crate::executor::Executor;
use crate::mode::Mode;
use crate::registry::ScopeId;
use crate::scope::{Scope, ScopeCore};
use crate::state::State;
use connscope_core::{Connection, ConnectionProvider, Error, Result, ScopeErrorKind};
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::ThreadId;

/// A scope holding an open transaction until the caller ends it.
///
/// Auto-commit is off for the scope's whole life. Each `commit` or
/// `rollback` ends the current branch and implicitly begins the next one;
/// the scope stays active until closed.
///
/// When a unit of work fails with anything other than a statement error
/// (or panics), the branch is rolled back before the failure reaches the
/// caller. Statement errors are returned untouched so the caller can decide.
#[derive(Debug)]
pub struct TransactionalScope<C: Connection> {
    core: ScopeCore<C>,
    mode: Mode,
    /// Work has run since the last commit or rollback.
    pending: AtomicBool,
}

impl<C: Connection> TransactionalScope<C> {
    /// Acquire a connection, apply `mode` and disable auto-commit.
    ///
    /// If configuring the connection fails, auto-commit is restored and the
    /// connection released before the error is returned.
    pub fn open<P>(provider: &P, mode: Mode) -> Result<Self>
    where
        P: ConnectionProvider<Connection = C> + ?Sized,
    {
        let core = ScopeCore::acquire(provider)?;
        let conn = core.conn();

        let configured = conn
            .set_read_only(mode.is_read_only())
            .and_then(|()| conn.set_auto_commit(false));

        if let Err(cause) = configured {
            let mut err = Error::scope_with_source(
                ScopeErrorKind::Configure,
                "Failed to initialize transactional scope",
                cause,
            );
            if let Err(restore) = conn.set_auto_commit(true) {
                err.add_suppressed(restore_error(restore));
            }
            if let Err(release) = core.release() {
                err.add_suppressed(release);
            }
            return Err(err);
        }

        tracing::debug!(scope = %core.id(), ?mode, "Opened transactional scope");
        Ok(Self {
            core,
            mode,
            pending: AtomicBool::new(false),
        })
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn is_read_only(&self) -> bool {
        self.mode.is_read_only()
    }

    pub fn owner(&self) -> ThreadId {
        self.core.owner()
    }

    /// Roll back after a failed unit of work or commit, if still active.
    fn recover(&self) -> Result<()> {
        if self.core.state() != State::Active {
            return Ok(());
        }
        tracing::debug!(scope = %self.core.id(), "Rolling back after failure");
        self.core.conn().rollback().map_err(rollback_error)?;
        self.pending.store(false, Ordering::SeqCst);
        Ok(())
    }
}

impl<C: Connection> Scope for TransactionalScope<C> {
    type Connection = C;

    fn execute<T, F>(&self, work: F) -> Result<T>
    where
        F: FnOnce(&Executor<'_>) -> Result<T>,
    {
        self.core.ensure_usable()?;
        tracing::trace!(scope = %self.core.id(), "Running unit of work");
        self.pending.store(true, Ordering::SeqCst);

        let executor = self.core.executor();
        match panic::catch_unwind(AssertUnwindSafe(|| work(&executor))) {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(err)) if err.is_statement_error() => Err(err),
            Ok(Err(mut err)) => {
                if let Err(rollback) = self.recover() {
                    err.add_suppressed(rollback);
                }
                Err(err)
            }
            Err(payload) => {
                if let Err(rollback) = self.recover() {
                    tracing::warn!(
                        scope = %self.core.id(),
                        error = %rollback,
                        "Rollback after panic failed"
                    );
                }
                panic::resume_unwind(payload)
            }
        }
    }

    fn commit(&self) -> Result<()> {
        self.core.ensure_usable()?;
        tracing::debug!(scope = %self.core.id(), mode = ?self.mode, "Committing transaction");

        if let Err(cause) = self.core.conn().commit() {
            let mut err =
                Error::scope_with_source(ScopeErrorKind::Commit, "Failed to commit transaction", cause);
            if let Err(rollback) = self.recover() {
                err.add_suppressed(rollback);
            }
            return Err(err);
        }
        self.pending.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn rollback(&self) -> Result<()> {
        self.core.ensure_usable()?;
        if self.mode.is_read_only() {
            return Ok(());
        }
        tracing::debug!(scope = %self.core.id(), "Rolling back transaction");
        self.core.conn().rollback().map_err(rollback_error)?;
        self.pending.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn close(&self) -> Result<()> {
        if !self.core.begin_close() {
            return Ok(());
        }
        tracing::debug!(scope = %self.core.id(), mode = ?self.mode, "Closing transactional scope");
        let conn = self.core.conn();

        if !self.mode.is_read_only() && self.pending.swap(false, Ordering::SeqCst) {
            if let Err(err) = conn.rollback() {
                tracing::warn!(
                    scope = %self.core.id(),
                    error = %err,
                    "Rollback on close failed; continuing"
                );
            }
        }

        let restored = conn.set_auto_commit(true).map_err(restore_error);
        let released = self.core.release();
        match (restored, released) {
            (Ok(()), released) => released,
            (Err(err), Ok(())) => Err(err),
            (Err(mut err), Err(release)) => {
                err.add_suppressed(release);
                Err(err)
            }
        }
    }

    fn state(&self) -> State {
        self.core.state()
    }

    fn id(&self) -> ScopeId {
        self.core.id()
    }

    fn connection(&self) -> &C {
        self.core.conn()
    }
}

impl<C: Connection> Drop for TransactionalScope<C> {
    fn drop(&mut self) {
        if let Err(err) = self.close() {
            tracing::warn!(scope = %self.core.id(), error = %err, "Failed to close scope on drop");
        }
    }
}

fn rollback_error(cause: Error) -> Error {
    Error::scope_with_source(ScopeErrorKind::Rollback, "Failed to rollback transaction", cause)
}

fn restore_error(cause: Error) -> Error {
    Error::scope_with_source(
        ScopeErrorKind::RestoreAutoCommit,
        "Failed to restore connection to auto-commit mode",
        cause,
    )
}
