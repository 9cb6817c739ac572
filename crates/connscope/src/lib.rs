//! ConnScope - disciplined, thread-confined database connection scopes.
//!
//! A scope borrows one connection from a provider and holds it for a bounded
//! unit of work. It guards against three recurring mistakes with pooled
//! connections:
//!
//! - leaking a connection (scopes release on `close` and on drop)
//! - implicit commits from reusing a connection across unrelated work
//!   (transactional scopes keep auto-commit off and restore it on close)
//! - sharing a connection between threads (scopes are confined to the thread
//!   that opened them, and a thread may own only one scope at a time)
//!
//! # Quick Start
//!
//! ```ignore
//! use connscope::prelude::*;
//! use connscope_sqlite::SqliteProvider;
//!
//! let provider = SqliteProvider::open("app.db");
//!
//! let scope = ConnectionScope::open_transactional(&provider)?;
//! scope.execute(|exec| {
//!     exec.update("INSERT INTO heroes (name) VALUES (?)", &["Ada".into()])?;
//!     exec.update("UPDATE stats SET heroes = heroes + 1", &[])
//! })?;
//! scope.commit()?;
//!
//! let names = scope.execute(|exec| {
//!     exec.query("SELECT name FROM heroes", |row: &Row| row.get_named::<String>("name"), &[])
//! })?;
//! scope.close()?;
//! ```
//!
//! # Failure handling
//!
//! Inside a transactional scope, a unit of work that fails with anything
//! other than a statement error ([`Error::is_statement_error`]), or panics,
//! has its transaction branch rolled back before the failure reaches the
//! caller. The scope stays active. Failures that happen while recovering
//! are attached to the original error as *suppressed* rather than replacing
//! it.

pub mod default_scope;
pub mod executor;
pub mod mode;
pub mod registry;
pub mod result;
pub mod scope;
pub mod state;
pub mod transactional;

pub use connscope_core::{
    ColumnInfo, Connection, ConnectionConfig, ConnectionError, ConnectionErrorKind,
    ConnectionProvider, Error, ErrorKind, FromValue, QueryError, QueryErrorKind, Result, Row,
    ScopeError, ScopeErrorKind, TypeError, Value,
};

pub use default_scope::DefaultScope;
pub use executor::{Executor, FirstColumn, RowMapper};
pub use mode::Mode;
pub use registry::{ScopeId, ScopeRegistry, has_active_scope};
pub use result::QueryResult;
pub use scope::{ConnectionScope, Scope, transaction};
pub use state::State;
pub use transactional::TransactionalScope;

/// Prelude for convenient imports.
///
/// ```ignore
/// use connscope::prelude::*;
/// ```
pub mod prelude {
    pub use crate::{
        Connection, ConnectionProvider, ConnectionScope, DefaultScope, Error, Executor, Mode,
        QueryResult, Result, Row, Scope, State, TransactionalScope, Value, transaction,
    };
}
