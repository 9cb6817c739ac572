//! The scope state machine and the tagged scope variant.
//!
//! A scope owns exactly one connection for its whole life. It is created on
//! (and confined to) one thread, moves through [`State::Active`],
//! [`State::Terminating`] and [`State::Terminated`] exactly once, and
//! releases its connection on the way into `Terminated`.
//!
//! Two variants share the state machine in [`ScopeCore`]:
//!
//! - [`DefaultScope`] runs every statement in auto-commit mode.
//! - [`TransactionalScope`] keeps a transaction open until the caller
//!   commits or rolls back, and rolls back automatically when a unit of
//!   work fails with anything other than a statement error.
//!
//! [`ConnectionScope`] is the tagged union over both; all three implement
//! the [`Scope`] capability trait.

use crate::default_scope::DefaultScope;
use crate::executor::Executor;
use crate::mode::Mode;
use crate::registry::{ScopeId, ScopeRegistry};
use crate::state::{State, StateCell};
use crate::transactional::TransactionalScope;
use connscope_core::{Connection, ConnectionProvider, Error, Result, ScopeErrorKind};
use std::thread::{self, ThreadId};

/// Operations every scope offers.
///
/// `execute`, `commit` and `rollback` may only be called from the owning
/// thread while the scope is [`State::Active`]. `close` may be called from
/// anywhere, any number of times.
pub trait Scope {
    /// The connection type held by the scope.
    type Connection: Connection;

    /// Run a unit of work against the scope's connection.
    fn execute<T, F>(&self, work: F) -> Result<T>
    where
        F: FnOnce(&Executor<'_>) -> Result<T>;

    /// Commit the current transaction branch.
    fn commit(&self) -> Result<()>;

    /// Roll back the current transaction branch.
    fn rollback(&self) -> Result<()>;

    /// Finalize the scope and release its connection.
    ///
    /// Idempotent: only the first call does anything.
    fn close(&self) -> Result<()>;

    fn state(&self) -> State;

    fn id(&self) -> ScopeId;

    /// The raw connection.
    ///
    /// Changing its transactional configuration directly leaves the scope
    /// in an undefined state.
    fn connection(&self) -> &Self::Connection;
}

/// State shared by both scope variants.
#[derive(Debug)]
pub(crate) struct ScopeCore<C: Connection> {
    id: ScopeId,
    owner: ThreadId,
    state: StateCell,
    conn: C,
}

impl<C: Connection> ScopeCore<C> {
    /// Acquire a connection and register it as the calling thread's scope.
    pub(crate) fn acquire<P>(provider: &P) -> Result<Self>
    where
        P: ConnectionProvider<Connection = C> + ?Sized,
    {
        let registry = ScopeRegistry::global();
        let owner = thread::current().id();
        registry.ensure_vacant(owner)?;

        let conn = provider.acquire().map_err(|e| {
            Error::scope_with_source(ScopeErrorKind::Acquire, "Failed to open connection", e)
        })?;

        let id = ScopeId::next();
        if let Err(mut err) = registry.register(owner, id) {
            if let Err(close) = conn.close() {
                err.add_suppressed(close);
            }
            return Err(err);
        }

        Ok(Self {
            id,
            owner,
            state: StateCell::new(),
            conn,
        })
    }

    pub(crate) fn id(&self) -> ScopeId {
        self.id
    }

    pub(crate) fn owner(&self) -> ThreadId {
        self.owner
    }

    pub(crate) fn state(&self) -> State {
        self.state.get()
    }

    pub(crate) fn conn(&self) -> &C {
        &self.conn
    }

    pub(crate) fn executor(&self) -> Executor<'_> {
        Executor::new(&self.conn)
    }

    /// Confinement first, then liveness. Neither touches the connection.
    pub(crate) fn ensure_usable(&self) -> Result<()> {
        if thread::current().id() != self.owner {
            return Err(Error::scope(
                ScopeErrorKind::CrossThread,
                "ConnectionScope must not be used from a different thread",
            ));
        }
        if self.state.get() != State::Active {
            return Err(Error::scope(
                ScopeErrorKind::NotActive,
                "ConnectionScope is no longer active",
            ));
        }
        Ok(())
    }

    /// Move to `Terminating`. Returns `false` if the scope had already left
    /// `Active`, in which case the caller must do nothing further.
    pub(crate) fn begin_close(&self) -> bool {
        self.state.advance(State::Terminating) == State::Active
    }

    /// Close the connection, then mark the scope terminated and clear its
    /// registration whether or not the close succeeded.
    pub(crate) fn release(&self) -> Result<()> {
        let closed = self.conn.close().map_err(|e| {
            Error::scope_with_source(ScopeErrorKind::Release, "Failed to close connection", e)
        });
        self.state.advance(State::Terminated);
        ScopeRegistry::global().release(self.owner, self.id);
        tracing::debug!(scope = %self.id, ok = closed.is_ok(), "Released connection");
        closed
    }
}

/// A scope of either variant.
#[derive(Debug)]
pub enum ConnectionScope<C: Connection> {
    Default(DefaultScope<C>),
    Transactional(TransactionalScope<C>),
}

impl<C: Connection> ConnectionScope<C> {
    /// Open an auto-commit scope.
    pub fn open<P>(provider: &P) -> Result<Self>
    where
        P: ConnectionProvider<Connection = C> + ?Sized,
    {
        DefaultScope::open(provider).map(ConnectionScope::Default)
    }

    /// Open a read-write transactional scope.
    pub fn open_transactional<P>(provider: &P) -> Result<Self>
    where
        P: ConnectionProvider<Connection = C> + ?Sized,
    {
        Self::open_transactional_with(provider, Mode::ReadWrite)
    }

    /// Open a transactional scope in the given mode.
    pub fn open_transactional_with<P>(provider: &P, mode: Mode) -> Result<Self>
    where
        P: ConnectionProvider<Connection = C> + ?Sized,
    {
        TransactionalScope::open(provider, mode).map(ConnectionScope::Transactional)
    }

    /// Open a transactional scope, read-only if `read_only` is set.
    pub fn open_transactional_read_only<P>(provider: &P, read_only: bool) -> Result<Self>
    where
        P: ConnectionProvider<Connection = C> + ?Sized,
    {
        Self::open_transactional_with(provider, Mode::from(read_only))
    }

    pub fn is_transactional(&self) -> bool {
        matches!(self, ConnectionScope::Transactional(_))
    }

    /// The transaction mode, or `None` for an auto-commit scope.
    pub fn mode(&self) -> Option<Mode> {
        match self {
            ConnectionScope::Default(_) => None,
            ConnectionScope::Transactional(scope) => Some(scope.mode()),
        }
    }

    /// The thread the scope is confined to.
    pub fn owner(&self) -> ThreadId {
        match self {
            ConnectionScope::Default(scope) => scope.owner(),
            ConnectionScope::Transactional(scope) => scope.owner(),
        }
    }
}

impl<C: Connection> Scope for ConnectionScope<C> {
    type Connection = C;

    fn execute<T, F>(&self, work: F) -> Result<T>
    where
        F: FnOnce(&Executor<'_>) -> Result<T>,
    {
        match self {
            ConnectionScope::Default(scope) => scope.execute(work),
            ConnectionScope::Transactional(scope) => scope.execute(work),
        }
    }

    fn commit(&self) -> Result<()> {
        match self {
            ConnectionScope::Default(scope) => scope.commit(),
            ConnectionScope::Transactional(scope) => scope.commit(),
        }
    }

    fn rollback(&self) -> Result<()> {
        match self {
            ConnectionScope::Default(scope) => scope.rollback(),
            ConnectionScope::Transactional(scope) => scope.rollback(),
        }
    }

    fn close(&self) -> Result<()> {
        match self {
            ConnectionScope::Default(scope) => scope.close(),
            ConnectionScope::Transactional(scope) => scope.close(),
        }
    }

    fn state(&self) -> State {
        match self {
            ConnectionScope::Default(scope) => scope.state(),
            ConnectionScope::Transactional(scope) => scope.state(),
        }
    }

    fn id(&self) -> ScopeId {
        match self {
            ConnectionScope::Default(scope) => scope.id(),
            ConnectionScope::Transactional(scope) => scope.id(),
        }
    }

    fn connection(&self) -> &C {
        match self {
            ConnectionScope::Default(scope) => scope.connection(),
            ConnectionScope::Transactional(scope) => scope.connection(),
        }
    }
}

impl<C: Connection> From<DefaultScope<C>> for ConnectionScope<C> {
    fn from(scope: DefaultScope<C>) -> Self {
        ConnectionScope::Default(scope)
    }
}

impl<C: Connection> From<TransactionalScope<C>> for ConnectionScope<C> {
    fn from(scope: TransactionalScope<C>) -> Self {
        ConnectionScope::Transactional(scope)
    }
}

/// Run `work` in its own transactional scope and commit it.
///
/// The scope is closed on every path. A failure of `work` or of the commit
/// is returned as is; a close failure on top of it is attached as
/// suppressed.
///
/// ```ignore
/// let id = connscope::transaction(&provider, Mode::ReadWrite, |exec| {
///     let key = exec.update_returning_key("INSERT INTO heroes (name) VALUES (?)", &["Ada".into()])?;
///     Ok(key.into_first())
/// })?;
/// ```
pub fn transaction<P, T, F>(provider: &P, mode: Mode, work: F) -> Result<T>
where
    P: ConnectionProvider + ?Sized,
    F: FnOnce(&Executor<'_>) -> Result<T>,
{
    let scope = TransactionalScope::open(provider, mode)?;
    let outcome = scope
        .execute(work)
        .and_then(|value| scope.commit().map(|()| value));

    match (outcome, scope.close()) {
        (Ok(value), Ok(())) => Ok(value),
        (Ok(_), Err(close)) => Err(close),
        (Err(err), Ok(())) => Err(err),
        (Err(mut err), Err(close)) => {
            err.add_suppressed(close);
            Err(err)
        }
    }
}
