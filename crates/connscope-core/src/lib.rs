//! Core types and driver traits for ConnScope.
//!
//! This crate provides the abstractions the scope layer is built on:
//!
//! - `Connection` and `ConnectionProvider` traits for drivers
//! - `Value` and `Row` for parameters and results
//! - `Error`, the single error type every operation reports

pub mod connection;
pub mod error;
pub mod row;
pub mod value;

pub use connection::{Connection, ConnectionConfig, ConnectionProvider};
pub use error::{
    ConnectionError, ConnectionErrorKind, Error, ErrorKind, QueryError, QueryErrorKind, Result,
    ScopeError, ScopeErrorKind, TypeError,
};
pub use row::{ColumnInfo, FromValue, Row};
pub use value::Value;
