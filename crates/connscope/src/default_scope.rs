//! Auto-commit scope.

use crate::executor::Executor;
use crate::registry::ScopeId;
use crate::scope::{Scope, ScopeCore};
use crate::state::State;
use connscope_core::{Connection, ConnectionProvider, Error, Result, ScopeErrorKind};
use std::thread::ThreadId;

/// A scope whose connection runs in auto-commit mode.
///
/// Every statement commits on its own. `commit` and `rollback` are rejected
/// outright, since a caller reaching for them has mistaken this for a
/// transactional scope.
#[derive(Debug)]
pub struct DefaultScope<C: Connection> {
    core: ScopeCore<C>,
}

impl<C: Connection> DefaultScope<C> {
    /// Acquire a connection from `provider` and switch it to auto-commit.
    ///
    /// Fails if the calling thread already owns a scope, or the connection
    /// cannot be obtained or configured. On a configuration failure the
    /// connection is released before returning.
    pub fn open<P>(provider: &P) -> Result<Self>
    where
        P: ConnectionProvider<Connection = C> + ?Sized,
    {
        let core = ScopeCore::acquire(provider)?;

        if let Err(cause) = core.conn().set_auto_commit(true) {
            let mut err = Error::scope_with_source(
                ScopeErrorKind::Configure,
                "Failed to set auto-commit for non-transactional scope",
                cause,
            );
            if let Err(release) = core.release() {
                err.add_suppressed(release);
            }
            return Err(err);
        }

        tracing::debug!(scope = %core.id(), "Opened default scope");
        Ok(Self { core })
    }

    pub fn owner(&self) -> ThreadId {
        self.core.owner()
    }
}

impl<C: Connection> Scope for DefaultScope<C> {
    type Connection = C;

    fn execute<T, F>(&self, work: F) -> Result<T>
    where
        F: FnOnce(&Executor<'_>) -> Result<T>,
    {
        self.core.ensure_usable()?;
        tracing::trace!(scope = %self.core.id(), "Running unit of work");
        work(&self.core.executor())
    }

    fn commit(&self) -> Result<()> {
        Err(Error::scope(
            ScopeErrorKind::NotTransactional,
            "Cannot commit a non-transactional ConnectionScope",
        ))
    }

    fn rollback(&self) -> Result<()> {
        Err(Error::scope(
            ScopeErrorKind::NotTransactional,
            "Cannot rollback a non-transactional ConnectionScope",
        ))
    }

    fn close(&self) -> Result<()> {
        if !self.core.begin_close() {
            return Ok(());
        }
        tracing::debug!(scope = %self.core.id(), "Closing default scope");
        self.core.release()
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

impl<C: Connection> Drop for DefaultScope<C> {
    fn drop(&mut self) {
        if let Err(err) = self.close() {
            tracing::warn!(scope = %self.core.id(), error = %err, "Failed to close scope on drop");
        }
    }
}
