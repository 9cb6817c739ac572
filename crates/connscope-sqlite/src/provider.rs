//! Connection provider opening a fresh SQLite connection per acquire.

use crate::connection::{SqliteConfig, SqliteConnection};
use connscope_core::{ConnectionConfig, ConnectionProvider, Result};
use std::sync::atomic::{AtomicU64, Ordering};

/// Hands out new connections to one database.
///
/// Each [`acquire`](ConnectionProvider::acquire) opens a new handle, and
/// closing that connection closes the handle. Every `:memory:` connection is
/// therefore its own empty database; use a file for anything shared.
#[derive(Debug)]
pub struct SqliteProvider {
    config: SqliteConfig,
    opened: AtomicU64,
}

impl SqliteProvider {
    pub fn new(config: SqliteConfig) -> Self {
        Self {
            config,
            opened: AtomicU64::new(0),
        }
    }

    /// Provider for a database file, created if missing.
    pub fn open(path: impl Into<String>) -> Self {
        Self::new(SqliteConfig::file(path))
    }

    pub fn config(&self) -> &SqliteConfig {
        &self.config
    }

    /// Number of connections opened so far.
    pub fn opened(&self) -> u64 {
        self.opened.load(Ordering::Relaxed)
    }
}

impl From<SqliteConfig> for SqliteProvider {
    fn from(config: SqliteConfig) -> Self {
        Self::new(config)
    }
}

impl From<&ConnectionConfig> for SqliteProvider {
    fn from(config: &ConnectionConfig) -> Self {
        Self::new(SqliteConfig::from(config))
    }
}

impl ConnectionProvider for SqliteProvider {
    type Connection = SqliteConnection;

    fn acquire(&self) -> Result<SqliteConnection> {
        let conn = SqliteConnection::open(&self.config)?;
        self.opened.fetch_add(1, Ordering::Relaxed);
        Ok(conn)
    }
}
