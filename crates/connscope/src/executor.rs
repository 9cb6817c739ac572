//! Statement execution bound to a scope's connection.

use crate::result::QueryResult;
use connscope_core::{Connection, FromValue, Result, Row, Value};

/// Maps one result row to a caller-chosen type.
///
/// Implemented for every `Fn(&Row) -> Result<T>`, so a closure is usually
/// all a query needs.
pub trait RowMapper<T> {
    fn map_row(&self, row: &Row) -> Result<T>;
}

impl<T, F> RowMapper<T> for F
where
    F: Fn(&Row) -> Result<T>,
{
    fn map_row(&self, row: &Row) -> Result<T> {
        self(row)
    }
}

/// Maps a row by reading its first column.
#[derive(Debug, Clone, Copy, Default)]
pub struct FirstColumn;

impl<T: FromValue> RowMapper<T> for FirstColumn {
    fn map_row(&self, row: &Row) -> Result<T> {
        row.get_as(0)
    }
}

/// Executes statements on the connection held by a scope.
///
/// Handed to every unit of work. It owns nothing but the borrow of the
/// connection, so it cannot outlive the call that received it.
#[derive(Clone, Copy)]
pub struct Executor<'a> {
    conn: &'a dyn Connection,
}

impl<'a> Executor<'a> {
    pub fn new(conn: &'a dyn Connection) -> Self {
        Self { conn }
    }

    /// Run a query and map every returned row.
    ///
    /// Fails on the first row the mapper rejects.
    pub fn query<T, M>(&self, sql: &str, mapper: M, params: &[Value]) -> Result<QueryResult<T>>
    where
        M: RowMapper<T>,
    {
        tracing::trace!(sql = %sql, params = params.len(), "Executing query");
        let rows = self.conn.query(sql, params)?;
        let mapped = rows
            .iter()
            .map(|row| mapper.map_row(row))
            .collect::<Result<Vec<_>>>()?;
        Ok(QueryResult::new(mapped))
    }

    /// Run a query whose first column is the value of interest.
    pub fn query_scalar<T: FromValue>(&self, sql: &str, params: &[Value]) -> Result<QueryResult<T>> {
        self.query(sql, FirstColumn, params)
    }

    /// Execute an INSERT, UPDATE or DELETE and report rows affected.
    pub fn update(&self, sql: &str, params: &[Value]) -> Result<QueryResult<u64>> {
        tracing::trace!(sql = %sql, params = params.len(), "Executing update");
        let affected = self.conn.execute(sql, params)?;
        Ok(QueryResult::single(affected))
    }

    /// Execute a statement and report the generated key.
    ///
    /// Falls back to the affected-row count when the driver produced no key.
    pub fn update_returning_key(&self, sql: &str, params: &[Value]) -> Result<QueryResult<i64>> {
        tracing::trace!(sql = %sql, params = params.len(), "Executing update returning key");
        let (affected, key) = self.conn.execute_returning_key(sql, params)?;
        let value = key.unwrap_or_else(|| i64::try_from(affected).unwrap_or(i64::MAX));
        Ok(QueryResult::single(value))
    }

    /// The raw connection.
    ///
    /// Changing its auto-commit or read-only settings, committing, rolling
    /// back, or closing it behind the scope's back leaves the scope in an
    /// undefined state.
    pub fn connection(&self) -> &'a dyn Connection {
        self.conn
    }
}

impl std::fmt::Debug for Executor<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Executor")
            .field("auto_commit", &self.conn.auto_commit())
            .field("read_only", &self.conn.is_read_only())
            .finish()
    }
}
