//! Scripted in-memory driver for scope tests.
//!
//! Every driver call is recorded, any call can be made to fail, and
//! statements are tracked with JDBC-like visibility: in auto-commit mode they
//! are durable immediately, otherwise they stay pending until commit (or
//! until auto-commit is switched back on) and vanish on rollback.

#![allow(dead_code)]

use connscope::{
    Connection, ConnectionError, ConnectionErrorKind, ConnectionProvider, Error, QueryError,
    QueryErrorKind, Result, Row, Value,
};
use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Query(String),
    Execute(String),
    SetReadOnly(bool),
    SetAutoCommit(bool),
    Commit,
    Rollback,
    Close,
}

impl Call {
    /// Transaction-control calls only, without statements.
    pub fn is_control(&self) -> bool {
        !matches!(self, Call::Query(_) | Call::Execute(_))
    }
}

/// A driver operation that can be told to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    Acquire,
    Query,
    Execute,
    SetReadOnly,
    SetAutoCommit(bool),
    Commit,
    Rollback,
    Close,
}

#[derive(Debug)]
struct DriverState {
    calls: Vec<Call>,
    failing: HashSet<Op>,
    acquired: usize,
    auto_commit: bool,
    read_only: bool,
    closed: bool,
    durable: Vec<String>,
    pending: Vec<String>,
}

impl Default for DriverState {
    fn default() -> Self {
        Self {
            calls: Vec::new(),
            failing: HashSet::new(),
            acquired: 0,
            auto_commit: true,
            read_only: false,
            closed: false,
            durable: Vec::new(),
            pending: Vec::new(),
        }
    }
}

/// Handle shared by the provider, its connections, and the test.
#[derive(Debug, Clone, Default)]
pub struct MockDriver {
    state: Arc<Mutex<DriverState>>,
}

impl MockDriver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn provider(&self) -> MockProvider {
        MockProvider {
            driver: self.clone(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, DriverState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Make `op` fail until healed.
    pub fn fail(&self, op: Op) {
        self.lock().failing.insert(op);
    }

    pub fn heal(&self, op: Op) {
        self.lock().failing.remove(&op);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.lock().calls.clone()
    }

    /// Transaction-control calls, in order.
    pub fn control_calls(&self) -> Vec<Call> {
        self.lock()
            .calls
            .iter()
            .filter(|c| c.is_control())
            .cloned()
            .collect()
    }

    pub fn clear_calls(&self) {
        self.lock().calls.clear();
    }

    pub fn count(&self, call: &Call) -> usize {
        self.lock().calls.iter().filter(|c| *c == call).count()
    }

    pub fn acquired(&self) -> usize {
        self.lock().acquired
    }

    /// Statements visible to a fresh connection.
    pub fn durable(&self) -> Vec<String> {
        self.lock().durable.clone()
    }

    pub fn pending(&self) -> Vec<String> {
        self.lock().pending.clone()
    }

    pub fn auto_commit(&self) -> bool {
        self.lock().auto_commit
    }

    pub fn read_only(&self) -> bool {
        self.lock().read_only
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }
}

#[derive(Debug)]
pub struct MockProvider {
    driver: MockDriver,
}

impl ConnectionProvider for MockProvider {
    type Connection = MockConnection;

    fn acquire(&self) -> Result<MockConnection> {
        let mut state = self.driver.lock();
        if state.failing.contains(&Op::Acquire) {
            return Err(connection_error(
                ConnectionErrorKind::Connect,
                "connection pool exhausted",
            ));
        }
        state.acquired += 1;
        state.closed = false;
        Ok(MockConnection {
            driver: self.driver.clone(),
        })
    }
}

#[derive(Debug)]
pub struct MockConnection {
    driver: MockDriver,
}

impl MockConnection {
    fn call(&self, call: Call, op: Op) -> Result<MutexGuard<'_, DriverState>> {
        let mut state = self.driver.lock();
        state.calls.push(call);
        if state.closed {
            return Err(connection_error(
                ConnectionErrorKind::Closed,
                "connection is closed",
            ));
        }
        if state.failing.contains(&op) {
            return Err(match op {
                Op::Query | Op::Execute => Error::from(QueryError {
                    kind: QueryErrorKind::Database,
                    sql: None,
                    message: "statement failed".to_string(),
                    source: None,
                }),
                Op::Close => connection_error(ConnectionErrorKind::Close, "close failed"),
                _ => connection_error(ConnectionErrorKind::Transaction, "driver failure"),
            });
        }
        Ok(state)
    }
}

impl Connection for MockConnection {
    fn query(&self, sql: &str, _params: &[Value]) -> Result<Vec<Row>> {
        let state = self.call(Call::Query(sql.to_string()), Op::Query)?;
        let visible = state.durable.len() + state.pending.len();
        Ok(vec![Row::new(
            vec!["statements".to_string()],
            vec![Value::BigInt(visible as i64)],
        )])
    }

    fn execute(&self, sql: &str, _params: &[Value]) -> Result<u64> {
        let mut state = self.call(Call::Execute(sql.to_string()), Op::Execute)?;
        if state.read_only {
            return Err(Error::from(QueryError {
                kind: QueryErrorKind::Permission,
                sql: Some(sql.to_string()),
                message: "connection is read-only".to_string(),
                source: None,
            }));
        }
        if state.auto_commit {
            state.durable.push(sql.to_string());
        } else {
            state.pending.push(sql.to_string());
        }
        Ok(1)
    }

    fn execute_returning_key(&self, sql: &str, params: &[Value]) -> Result<(u64, Option<i64>)> {
        let affected = self.execute(sql, params)?;
        let key = self.driver.durable().len() + self.driver.pending().len();
        Ok((affected, Some(key as i64)))
    }

    fn set_read_only(&self, read_only: bool) -> Result<()> {
        let mut state = self.call(Call::SetReadOnly(read_only), Op::SetReadOnly)?;
        state.read_only = read_only;
        Ok(())
    }

    fn is_read_only(&self) -> bool {
        self.driver.read_only()
    }

    fn set_auto_commit(&self, auto_commit: bool) -> Result<()> {
        let mut state = self.call(Call::SetAutoCommit(auto_commit), Op::SetAutoCommit(auto_commit))?;
        if auto_commit && !state.auto_commit {
            let pending = std::mem::take(&mut state.pending);
            state.durable.extend(pending);
        }
        state.auto_commit = auto_commit;
        Ok(())
    }

    fn auto_commit(&self) -> bool {
        self.driver.auto_commit()
    }

    fn commit(&self) -> Result<()> {
        let mut state = self.call(Call::Commit, Op::Commit)?;
        if state.auto_commit {
            return Err(connection_error(
                ConnectionErrorKind::Transaction,
                "cannot commit in auto-commit mode",
            ));
        }
        let pending = std::mem::take(&mut state.pending);
        state.durable.extend(pending);
        Ok(())
    }

    fn rollback(&self) -> Result<()> {
        let mut state = self.call(Call::Rollback, Op::Rollback)?;
        if state.auto_commit {
            return Err(connection_error(
                ConnectionErrorKind::Transaction,
                "cannot rollback in auto-commit mode",
            ));
        }
        state.pending.clear();
        Ok(())
    }

    fn close(&self) -> Result<()> {
        let mut state = self.driver.lock();
        state.calls.push(Call::Close);
        if state.failing.contains(&Op::Close) {
            state.closed = true;
            return Err(connection_error(ConnectionErrorKind::Close, "close failed"));
        }
        state.closed = true;
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.driver.is_closed()
    }
}

fn connection_error(kind: ConnectionErrorKind, message: &str) -> Error {
    Error::from(ConnectionError {
        kind,
        message: message.to_string(),
        source: None,
    })
}
