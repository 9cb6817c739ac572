//! SQLite driver for ConnScope.
//!
// FFI bindings require unsafe code - this is expected for database drivers
#![allow(unsafe_code)]
//!
//! Implements the `Connection` trait from connscope-core over a bundled
//! libsqlite3, plus a `ConnectionProvider` that opens one handle per
//! acquire.
//!
//! # Example
//!
//! ```rust,ignore
//! use connscope::prelude::*;
//! use connscope_sqlite::SqliteProvider;
//!
//! let provider = SqliteProvider::open("heroes.db");
//!
//! let scope = ConnectionScope::open(&provider)?;
//! scope.execute(|exec| {
//!     exec.update("CREATE TABLE IF NOT EXISTS heroes (id INTEGER PRIMARY KEY, name TEXT)", &[])
//! })?;
//! scope.close()?;
//! ```
//!
//! # Thread Safety
//!
//! `SqliteConnection` is `Send` and `Sync`; every call takes an internal
//! mutex before touching the SQLite handle.

pub mod connection;
pub mod ffi;
pub mod provider;
pub mod types;

pub use connection::{OpenFlags, SqliteConfig, SqliteConnection};
pub use provider::SqliteProvider;

/// Re-export the SQLite library version.
pub fn sqlite_version() -> &'static str {
    ffi::version()
}

/// Re-export the SQLite library version number.
pub fn sqlite_version_number() -> i32 {
    ffi::version_number()
}
