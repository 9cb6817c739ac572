//! Database connection traits.
//!
//! This module defines the driver-facing abstractions the scope layer
//! consumes:
//!
//! - [`Connection`] - a single database connection with statement execution
//!   and transaction controls
//! - [`ConnectionProvider`] - something that hands out connections on demand
//!   (a pool, a factory, a test double)
//! - [`ConnectionConfig`] - common provider configuration
//!
//! All calls are synchronous and may block for as long as the driver needs.
//! There are no timeouts or cancellation layered on top here.

use crate::error::Result;
use crate::row::Row;
use crate::value::Value;
use std::sync::Arc;

/// A database connection capable of executing statements.
///
/// Connections follow JDBC-style transaction semantics:
///
/// - In auto-commit mode every statement commits on its own.
/// - With auto-commit disabled an implicit transaction is open until
///   [`commit`](Connection::commit) or [`rollback`](Connection::rollback),
///   after which a new one begins.
/// - Re-enabling auto-commit ends any open transaction.
///
/// Positional parameters are bound in order starting at position 1.
///
/// Implementations must be `Send + Sync`; a connection is not required to
/// tolerate concurrent use, which is why the scope layer confines it to one
/// thread.
pub trait Connection: Send + Sync {
    /// Execute a query and return all rows.
    fn query(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>>;

    /// Execute a statement (INSERT, UPDATE, DELETE) and return rows affected.
    fn execute(&self, sql: &str, params: &[Value]) -> Result<u64>;

    /// Execute a statement and report the generated key, if the driver
    /// produced one, alongside the affected row count.
    fn execute_returning_key(&self, sql: &str, params: &[Value]) -> Result<(u64, Option<i64>)>;

    /// Put the connection into (or out of) read-only mode.
    fn set_read_only(&self, read_only: bool) -> Result<()>;

    fn is_read_only(&self) -> bool;

    /// Enable or disable auto-commit mode.
    fn set_auto_commit(&self, auto_commit: bool) -> Result<()>;

    fn auto_commit(&self) -> bool;

    /// Commit the current transaction.
    fn commit(&self) -> Result<()>;

    /// Roll back the current transaction.
    fn rollback(&self) -> Result<()>;

    /// Close the connection, releasing it back to wherever it came from.
    fn close(&self) -> Result<()>;

    fn is_closed(&self) -> bool;
}

/// Supplies connections on demand.
///
/// Acquisition may block (for example waiting on a pool); pooling policy is
/// entirely the provider's business.
pub trait ConnectionProvider: Send + Sync {
    /// The connection type handed out by this provider.
    type Connection: Connection;

    /// Obtain a connection.
    fn acquire(&self) -> Result<Self::Connection>;
}

impl<P: ConnectionProvider + ?Sized> ConnectionProvider for &P {
    type Connection = P::Connection;

    fn acquire(&self) -> Result<Self::Connection> {
        (**self).acquire()
    }
}

impl<P: ConnectionProvider + ?Sized> ConnectionProvider for Arc<P> {
    type Connection = P::Connection;

    fn acquire(&self) -> Result<Self::Connection> {
        (**self).acquire()
    }
}

impl<C: Connection + ?Sized> Connection for Box<C> {
    fn query(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>> {
        (**self).query(sql, params)
    }

    fn execute(&self, sql: &str, params: &[Value]) -> Result<u64> {
        (**self).execute(sql, params)
    }

    fn execute_returning_key(&self, sql: &str, params: &[Value]) -> Result<(u64, Option<i64>)> {
        (**self).execute_returning_key(sql, params)
    }

    fn set_read_only(&self, read_only: bool) -> Result<()> {
        (**self).set_read_only(read_only)
    }

    fn is_read_only(&self) -> bool {
        (**self).is_read_only()
    }

    fn set_auto_commit(&self, auto_commit: bool) -> Result<()> {
        (**self).set_auto_commit(auto_commit)
    }

    fn auto_commit(&self) -> bool {
        (**self).auto_commit()
    }

    fn commit(&self) -> Result<()> {
        (**self).commit()
    }

    fn rollback(&self) -> Result<()> {
        (**self).rollback()
    }

    fn close(&self) -> Result<()> {
        (**self).close()
    }

    fn is_closed(&self) -> bool {
        (**self).is_closed()
    }
}

/// Configuration shared by connection providers.
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// Connection string, URL or file path
    pub url: String,
    /// How long a driver may wait on a locked database, in milliseconds
    pub busy_timeout_ms: u32,
    /// Application name for connection identification
    pub application_name: Option<String>,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            busy_timeout_ms: 5_000,
            application_name: None,
        }
    }
}

impl ConnectionConfig {
    /// Create a new connection config with the given URL.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    /// Set the busy timeout.
    pub fn busy_timeout(mut self, ms: u32) -> Self {
        self.busy_timeout_ms = ms;
        self
    }

    /// Set the application name.
    pub fn application_name(mut self, name: impl Into<String>) -> Self {
        self.application_name = Some(name.into());
        self
    }
}
