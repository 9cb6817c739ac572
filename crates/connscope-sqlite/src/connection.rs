//! SQLite connection implementation.
//!
//! [`SqliteConnection`] wraps one `sqlite3` handle behind a mutex and
//! implements the [`Connection`] trait with JDBC-style transaction
//! semantics on top of SQLite's own:
//!
//! - auto-commit on: every statement runs in its own implicit transaction
//! - auto-commit off: a `BEGIN DEFERRED` is issued, and every `COMMIT` or
//!   `ROLLBACK` is followed by a fresh `BEGIN DEFERRED`
//! - switching auto-commit back on commits whatever is pending
//! - read-only mode maps to `PRAGMA query_only`

#![allow(clippy::borrow_as_ptr)] // FFI requires raw pointers

use crate::ffi;
use crate::types;
use connscope_core::{
    ColumnInfo, Connection, ConnectionConfig, ConnectionError, ConnectionErrorKind, Error,
    QueryError, QueryErrorKind, Result, Row, Value,
};
use std::ffi::{CStr, CString, c_int};
use std::ptr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Configuration for opening SQLite connections.
#[derive(Debug, Clone)]
pub struct SqliteConfig {
    /// Path to the database file, or ":memory:" for in-memory database.
    pub path: String,
    /// Open flags (read-only, read-write, create, etc.)
    pub flags: OpenFlags,
    /// Busy timeout in milliseconds.
    pub busy_timeout_ms: u32,
}

/// Flags controlling how the database is opened.
#[derive(Debug, Clone, Copy, Default)]
pub struct OpenFlags {
    /// Open for reading only.
    pub read_only: bool,
    /// Open for reading and writing.
    pub read_write: bool,
    /// Create the database if it doesn't exist.
    pub create: bool,
    /// Enable URI filename interpretation.
    pub uri: bool,
    /// Open in multi-thread mode.
    pub no_mutex: bool,
    /// Open in serialized mode.
    pub full_mutex: bool,
}

impl OpenFlags {
    /// Create flags for read-only access.
    pub fn read_only() -> Self {
        Self {
            read_only: true,
            ..Default::default()
        }
    }

    /// Create flags for read-write access (database must exist).
    pub fn read_write() -> Self {
        Self {
            read_write: true,
            ..Default::default()
        }
    }

    /// Create flags for read-write access with creation if needed.
    pub fn create_read_write() -> Self {
        Self {
            read_write: true,
            create: true,
            ..Default::default()
        }
    }

    fn to_sqlite_flags(self) -> c_int {
        let mut flags = 0;

        if self.read_only {
            flags |= ffi::SQLITE_OPEN_READONLY;
        }
        if self.read_write {
            flags |= ffi::SQLITE_OPEN_READWRITE;
        }
        if self.create {
            flags |= ffi::SQLITE_OPEN_CREATE;
        }
        if self.uri {
            flags |= ffi::SQLITE_OPEN_URI;
        }
        if self.no_mutex {
            flags |= ffi::SQLITE_OPEN_NOMUTEX;
        }
        if self.full_mutex {
            flags |= ffi::SQLITE_OPEN_FULLMUTEX;
        }

        // Default to read-write if no mode specified
        if flags & (ffi::SQLITE_OPEN_READONLY | ffi::SQLITE_OPEN_READWRITE) == 0 {
            flags |= ffi::SQLITE_OPEN_READWRITE | ffi::SQLITE_OPEN_CREATE;
        }

        flags
    }
}

impl Default for SqliteConfig {
    fn default() -> Self {
        Self {
            path: ":memory:".to_string(),
            flags: OpenFlags::create_read_write(),
            busy_timeout_ms: 5000,
        }
    }
}

impl SqliteConfig {
    /// Create a new config for a file-based database.
    pub fn file(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            ..Default::default()
        }
    }

    /// Create a new config for an in-memory database.
    pub fn memory() -> Self {
        Self::default()
    }

    /// Set open flags.
    pub fn flags(mut self, flags: OpenFlags) -> Self {
        self.flags = flags;
        self
    }

    /// Set busy timeout.
    pub fn busy_timeout(mut self, ms: u32) -> Self {
        self.busy_timeout_ms = ms;
        self
    }
}

impl From<&ConnectionConfig> for SqliteConfig {
    fn from(config: &ConnectionConfig) -> Self {
        let path = config
            .url
            .strip_prefix("sqlite://")
            .or_else(|| config.url.strip_prefix("sqlite:"))
            .unwrap_or(&config.url);
        let path = if path.is_empty() { ":memory:" } else { path };
        SqliteConfig::file(path).busy_timeout(config.busy_timeout_ms)
    }
}

/// Inner state of the SQLite connection, protected by a mutex.
struct SqliteInner {
    /// Null once closed.
    db: *mut ffi::sqlite3,
    auto_commit: bool,
    read_only: bool,
}

// SAFETY: the handle is only ever used while the owning Mutex is held, so
// it is never touched by two threads at once.
unsafe impl Send for SqliteInner {}

impl SqliteInner {
    fn handle(&self) -> Result<*mut ffi::sqlite3> {
        if self.db.is_null() {
            Err(connection_error(
                ConnectionErrorKind::Closed,
                "Connection is closed".to_string(),
            ))
        } else {
            Ok(self.db)
        }
    }
}

/// A connection to a SQLite database.
pub struct SqliteConnection {
    inner: Mutex<SqliteInner>,
    path: String,
}

impl std::fmt::Debug for SqliteConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.lock();
        f.debug_struct("SqliteConnection")
            .field("path", &self.path)
            .field("auto_commit", &inner.auto_commit)
            .field("read_only", &inner.read_only)
            .field("closed", &inner.db.is_null())
            .finish()
    }
}

impl SqliteConnection {
    /// Open a new SQLite connection with the given configuration.
    pub fn open(config: &SqliteConfig) -> Result<Self> {
        let c_path = CString::new(config.path.as_str()).map_err(|_| {
            connection_error(
                ConnectionErrorKind::Connect,
                "Invalid path: contains null byte".to_string(),
            )
        })?;

        let mut db: *mut ffi::sqlite3 = ptr::null_mut();
        let flags = config.flags.to_sqlite_flags();

        // SAFETY: We pass valid pointers and check the return value
        let rc = unsafe { ffi::sqlite3_open_v2(c_path.as_ptr(), &mut db, flags, ptr::null()) };

        if rc != ffi::SQLITE_OK {
            let msg = if db.is_null() {
                ffi::error_string(rc).to_string()
            } else {
                // SAFETY: db is a handle returned by open_v2; it must be
                // closed even when opening failed
                unsafe {
                    let (_, msg) = ffi::last_error(db);
                    ffi::sqlite3_close_v2(db);
                    msg
                }
            };
            return Err(connection_error(
                ConnectionErrorKind::Connect,
                format!("Failed to open database '{}': {}", config.path, msg),
            ));
        }

        if config.busy_timeout_ms > 0 {
            let ms = c_int::try_from(config.busy_timeout_ms).unwrap_or(c_int::MAX);
            // SAFETY: db is valid
            unsafe {
                ffi::sqlite3_busy_timeout(db, ms);
            }
        }

        tracing::debug!(path = %config.path, "Opened SQLite connection");
        Ok(Self {
            inner: Mutex::new(SqliteInner {
                db,
                auto_commit: true,
                read_only: false,
            }),
            path: config.path.clone(),
        })
    }

    /// Open an in-memory database.
    pub fn open_memory() -> Result<Self> {
        Self::open(&SqliteConfig::memory())
    }

    /// Open a file-based database.
    pub fn open_file(path: impl Into<String>) -> Result<Self> {
        Self::open(&SqliteConfig::file(path))
    }

    /// Get the database path.
    pub fn path(&self) -> &str {
        &self.path
    }

    fn lock(&self) -> MutexGuard<'_, SqliteInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Execute SQL directly without preparing (for DDL, etc.)
    ///
    /// May contain several statements separated by semicolons.
    pub fn execute_raw(&self, sql: &str) -> Result<()> {
        let inner = self.lock();
        exec(inner.handle()?, sql)
    }

    /// Get the last insert rowid.
    pub fn last_insert_rowid(&self) -> Result<i64> {
        let inner = self.lock();
        let db = inner.handle()?;
        // SAFETY: db is valid
        Ok(unsafe { ffi::sqlite3_last_insert_rowid(db) })
    }

    /// Is a transaction currently open on the handle?
    pub fn in_transaction(&self) -> bool {
        let inner = self.lock();
        match inner.handle() {
            // SAFETY: db is valid
            Ok(db) => unsafe { ffi::sqlite3_get_autocommit(db) == 0 },
            Err(_) => false,
        }
    }

    /// Commit (or roll back) whatever transaction SQLite has open, then
    /// begin the next one.
    fn end_transaction(&self, verb: &str) -> Result<()> {
        let inner = self.lock();
        let db = inner.handle()?;
        if !inner.auto_commit {
            // Some failures make SQLite roll back on its own; only end a
            // transaction that is still open.
            // SAFETY: db is valid
            if unsafe { ffi::sqlite3_get_autocommit(db) } == 0 {
                exec(db, verb).map_err(|e| transaction_error(verb, e))?;
            }
            exec(db, "BEGIN DEFERRED").map_err(|e| transaction_error("BEGIN", e))?;
            tracing::trace!(path = %self.path, verb, "Transaction boundary");
            return Ok(());
        }
        Err(connection_error(
            ConnectionErrorKind::Transaction,
            format!("Cannot {} while auto-commit is enabled", verb),
        ))
    }
}

impl Drop for SqliteConnection {
    fn drop(&mut self) {
        let inner = self.lock();
        if !inner.db.is_null() {
            // SAFETY: db is valid and never used again
            unsafe {
                ffi::sqlite3_close_v2(inner.db);
            }
        }
    }
}

impl Connection for SqliteConnection {
    fn query(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>> {
        let inner = self.lock();
        let db = inner.handle()?;
        let stmt = Statement::prepare(db, sql)?;
        stmt.bind_all(params)?;

        let col_count = stmt.column_count();
        let columns = Arc::new(ColumnInfo::new(stmt.column_names()));

        let mut rows = Vec::new();
        loop {
            match stmt.step() {
                ffi::SQLITE_ROW => {
                    let values = (0..col_count).map(|i| stmt.read(i)).collect();
                    rows.push(Row::with_columns(Arc::clone(&columns), values));
                }
                ffi::SQLITE_DONE => break,
                _ => return Err(stmt.error()),
            }
        }

        tracing::trace!(sql = %sql, rows = rows.len(), "Query complete");
        Ok(rows)
    }

    fn execute(&self, sql: &str, params: &[Value]) -> Result<u64> {
        let inner = self.lock();
        let db = inner.handle()?;
        let stmt = Statement::prepare(db, sql)?;
        stmt.bind_all(params)?;

        match stmt.step() {
            ffi::SQLITE_DONE | ffi::SQLITE_ROW => {
                // SAFETY: db is valid
                let changes = unsafe { ffi::sqlite3_changes(db) };
                tracing::trace!(sql = %sql, changes, "Statement complete");
                Ok(u64::try_from(changes).unwrap_or(0))
            }
            _ => Err(stmt.error()),
        }
    }

    fn execute_returning_key(&self, sql: &str, params: &[Value]) -> Result<(u64, Option<i64>)> {
        let affected = self.execute(sql, params)?;
        if affected == 0 || !inserts_rows(sql) {
            return Ok((affected, None));
        }

        let inner = self.lock();
        let db = inner.handle()?;
        // SAFETY: db is valid
        let key = unsafe { ffi::sqlite3_last_insert_rowid(db) };
        Ok((affected, Some(key)))
    }

    fn set_read_only(&self, read_only: bool) -> Result<()> {
        let mut inner = self.lock();
        let db = inner.handle()?;
        let pragma = if read_only {
            "PRAGMA query_only = 1"
        } else {
            "PRAGMA query_only = 0"
        };
        exec(db, pragma).map_err(|e| {
            configure_error(format!("Failed to set read-only to {}", read_only), e)
        })?;
        inner.read_only = read_only;
        Ok(())
    }

    fn is_read_only(&self) -> bool {
        self.lock().read_only
    }

    fn set_auto_commit(&self, auto_commit: bool) -> Result<()> {
        let mut inner = self.lock();
        let db = inner.handle()?;
        if inner.auto_commit == auto_commit {
            return Ok(());
        }

        if auto_commit {
            // SAFETY: db is valid
            if unsafe { ffi::sqlite3_get_autocommit(db) } == 0 {
                exec(db, "COMMIT").map_err(|e| transaction_error("COMMIT", e))?;
            }
        } else {
            exec(db, "BEGIN DEFERRED").map_err(|e| transaction_error("BEGIN", e))?;
        }
        inner.auto_commit = auto_commit;
        tracing::trace!(path = %self.path, auto_commit, "Auto-commit changed");
        Ok(())
    }

    fn auto_commit(&self) -> bool {
        self.lock().auto_commit
    }

    fn commit(&self) -> Result<()> {
        self.end_transaction("COMMIT")
    }

    fn rollback(&self) -> Result<()> {
        self.end_transaction("ROLLBACK")
    }

    fn close(&self) -> Result<()> {
        let mut inner = self.lock();
        if inner.db.is_null() {
            return Ok(());
        }
        // SAFETY: db is valid; close_v2 also finalizes a pending transaction
        let rc = unsafe { ffi::sqlite3_close_v2(inner.db) };
        if rc != ffi::SQLITE_OK {
            return Err(connection_error(
                ConnectionErrorKind::Close,
                format!("Failed to close database: {}", ffi::error_string(rc)),
            ));
        }
        inner.db = ptr::null_mut();
        tracing::debug!(path = %self.path, "Closed SQLite connection");
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.lock().db.is_null()
    }
}

/// A prepared statement, finalized on drop.
struct Statement<'a> {
    db: *mut ffi::sqlite3,
    stmt: *mut ffi::sqlite3_stmt,
    sql: &'a str,
}

impl<'a> Statement<'a> {
    fn prepare(db: *mut ffi::sqlite3, sql: &'a str) -> Result<Self> {
        let c_sql = CString::new(sql).map_err(|_| {
            query_error(QueryErrorKind::Syntax, sql, "SQL contains null byte".to_string())
        })?;
        let len = c_int::try_from(c_sql.as_bytes().len()).map_err(|_| {
            query_error(QueryErrorKind::DataTruncation, sql, "SQL is too long".to_string())
        })?;

        let mut stmt: *mut ffi::sqlite3_stmt = ptr::null_mut();
        // SAFETY: All pointers are valid
        let rc = unsafe {
            ffi::sqlite3_prepare_v2(db, c_sql.as_ptr(), len, &mut stmt, ptr::null_mut())
        };

        if rc != ffi::SQLITE_OK {
            // SAFETY: db is valid
            let (code, msg) = unsafe { ffi::last_error(db) };
            return Err(query_error(error_code_to_kind(code), sql, msg));
        }
        if stmt.is_null() {
            return Err(query_error(
                QueryErrorKind::Syntax,
                sql,
                "SQL contains no statement".to_string(),
            ));
        }
        Ok(Self { db, stmt, sql })
    }

    fn bind_all(&self, params: &[Value]) -> Result<()> {
        // SAFETY: stmt is valid
        let expected = unsafe { ffi::sqlite3_bind_parameter_count(self.stmt) };
        if usize::try_from(expected).unwrap_or(0) != params.len() {
            return Err(query_error(
                QueryErrorKind::Bind,
                self.sql,
                format!("Expected {} parameters, got {}", expected, params.len()),
            ));
        }

        for (i, param) in params.iter().enumerate() {
            let index = c_int::try_from(i + 1).unwrap_or(c_int::MAX);
            // SAFETY: stmt is valid, index is 1-based and within the count
            let rc = unsafe { types::bind_value(self.stmt, index, param) };
            if rc != ffi::SQLITE_OK {
                // SAFETY: db is valid
                let (_, msg) = unsafe { ffi::last_error(self.db) };
                return Err(query_error(
                    QueryErrorKind::Bind,
                    self.sql,
                    format!("Failed to bind parameter {}: {}", i + 1, msg),
                ));
            }
        }
        Ok(())
    }

    fn column_count(&self) -> c_int {
        // SAFETY: stmt is valid
        unsafe { ffi::sqlite3_column_count(self.stmt) }
    }

    fn column_names(&self) -> Vec<String> {
        (0..self.column_count())
            .map(|i| {
                // SAFETY: stmt is valid, i is within the column count
                unsafe { types::column_name(self.stmt, i) }.unwrap_or_else(|| format!("col{}", i))
            })
            .collect()
    }

    fn step(&self) -> c_int {
        // SAFETY: stmt is valid
        unsafe { ffi::sqlite3_step(self.stmt) }
    }

    fn read(&self, index: c_int) -> Value {
        // SAFETY: only called right after step returned SQLITE_ROW
        unsafe { types::read_column(self.stmt, index) }
    }

    fn error(&self) -> Error {
        // SAFETY: db is valid
        let (code, msg) = unsafe { ffi::last_error(self.db) };
        query_error(error_code_to_kind(code), self.sql, msg)
    }
}

impl Drop for Statement<'_> {
    fn drop(&mut self) {
        // SAFETY: stmt is valid and never used again
        unsafe {
            ffi::sqlite3_finalize(self.stmt);
        }
    }
}

fn exec(db: *mut ffi::sqlite3, sql: &str) -> Result<()> {
    let c_sql = CString::new(sql).map_err(|_| {
        query_error(QueryErrorKind::Syntax, sql, "SQL contains null byte".to_string())
    })?;

    let mut errmsg: *mut std::ffi::c_char = ptr::null_mut();

    // SAFETY: All pointers are valid
    let rc = unsafe { ffi::sqlite3_exec(db, c_sql.as_ptr(), None, ptr::null_mut(), &mut errmsg) };

    if rc == ffi::SQLITE_OK {
        return Ok(());
    }

    let msg = if errmsg.is_null() {
        ffi::error_string(rc).to_string()
    } else {
        // SAFETY: errmsg was allocated by SQLite and is freed exactly once
        unsafe {
            let msg = CStr::from_ptr(errmsg).to_string_lossy().into_owned();
            ffi::sqlite3_free(errmsg.cast());
            msg
        }
    };
    // SAFETY: db is valid
    let (code, _) = unsafe { ffi::last_error(db) };
    Err(query_error(error_code_to_kind(code), sql, msg))
}

/// Whether `sql` is an INSERT or REPLACE, possibly behind a WITH clause.
///
/// `sqlite3_last_insert_rowid` is only meaningful after one of these; it keeps
/// its old value across UPDATE and DELETE.
fn inserts_rows(sql: &str) -> bool {
    let mut words = sql
        .split(|c: char| c.is_whitespace() || c == '(')
        .filter(|w| !w.is_empty());
    let Some(first) = words.next() else {
        return false;
    };
    let is_insert = |w: &str| w.eq_ignore_ascii_case("INSERT") || w.eq_ignore_ascii_case("REPLACE");
    if is_insert(first) {
        return true;
    }
    first.eq_ignore_ascii_case("WITH") && words.any(is_insert)
}

fn error_code_to_kind(code: c_int) -> QueryErrorKind {
    match code & 0xff {
        ffi::SQLITE_CONSTRAINT => QueryErrorKind::Constraint,
        ffi::SQLITE_BUSY | ffi::SQLITE_LOCKED => QueryErrorKind::Busy,
        ffi::SQLITE_PERM | ffi::SQLITE_AUTH | ffi::SQLITE_READONLY => QueryErrorKind::Permission,
        ffi::SQLITE_NOTFOUND => QueryErrorKind::NotFound,
        ffi::SQLITE_TOOBIG => QueryErrorKind::DataTruncation,
        ffi::SQLITE_RANGE | ffi::SQLITE_MISMATCH => QueryErrorKind::Bind,
        _ => QueryErrorKind::Database,
    }
}

fn query_error(kind: QueryErrorKind, sql: &str, message: String) -> Error {
    Error::from(QueryError {
        kind,
        sql: Some(sql.to_string()),
        message,
        source: None,
    })
}

fn connection_error(kind: ConnectionErrorKind, message: String) -> Error {
    Error::from(ConnectionError {
        kind,
        message,
        source: None,
    })
}

fn transaction_error(verb: &str, cause: Error) -> Error {
    Error::from(ConnectionError {
        kind: ConnectionErrorKind::Transaction,
        message: format!("{} failed: {}", verb, cause),
        source: Some(Box::new(cause)),
    })
}

fn configure_error(message: String, cause: Error) -> Error {
    Error::from(ConnectionError {
        kind: ConnectionErrorKind::Configure,
        message: format!("{}: {}", message, cause),
        source: Some(Box::new(cause)),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn heroes() -> SqliteConnection {
        let conn = SqliteConnection::open_memory().unwrap();
        conn.execute_raw("CREATE TABLE heroes (id INTEGER PRIMARY KEY, name TEXT NOT NULL, age INTEGER)")
            .unwrap();
        conn
    }

    fn count(conn: &SqliteConnection) -> i64 {
        conn.query("SELECT count(*) FROM heroes", &[]).unwrap()[0]
            .get_as(0)
            .unwrap()
    }

    #[test]
    fn test_open_memory() {
        let conn = SqliteConnection::open_memory().unwrap();
        assert_eq!(conn.path(), ":memory:");
        assert!(conn.auto_commit());
        assert!(!conn.is_read_only());
        assert!(!conn.is_closed());
    }

    #[test]
    fn test_parameterized_query() {
        let conn = heroes();
        let affected = conn
            .execute(
                "INSERT INTO heroes (name, age) VALUES (?, ?)",
                &[Value::Text("Ada".to_string()), Value::Int(36)],
            )
            .unwrap();
        assert_eq!(affected, 1);

        let rows = conn
            .query(
                "SELECT name, age FROM heroes WHERE name = ?",
                &[Value::from("Ada")],
            )
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get_named::<String>("name").unwrap(), "Ada");
        assert_eq!(rows[0].get_named::<i32>("age").unwrap(), 36);
    }

    #[test]
    fn test_null_handling() {
        let conn = heroes();
        conn.execute(
            "INSERT INTO heroes (name, age) VALUES (?, ?)",
            &[Value::from("Grace"), Value::Null],
        )
        .unwrap();

        let rows = conn.query("SELECT age FROM heroes", &[]).unwrap();
        assert_eq!(rows[0].get_named::<Option<i64>>("age").unwrap(), None);
    }

    #[test]
    #[allow(clippy::approx_constant)]
    fn test_type_round_trip() {
        let conn = SqliteConnection::open_memory().unwrap();
        conn.execute_raw("CREATE TABLE types (b BOOLEAN, i INTEGER, f REAL, t TEXT, bl BLOB, j TEXT)")
            .unwrap();
        conn.execute(
            "INSERT INTO types VALUES (?, ?, ?, ?, ?, ?)",
            &[
                Value::Bool(true),
                Value::BigInt(1 << 40),
                Value::Double(3.14),
                Value::from("hello"),
                Value::Bytes(vec![1, 2, 3]),
                Value::Json(serde_json::json!({"power": "flight"})),
            ],
        )
        .unwrap();

        let row = &conn.query("SELECT * FROM types", &[]).unwrap()[0];
        assert!(row.get_named::<bool>("b").unwrap());
        assert_eq!(row.get_named::<i64>("i").unwrap(), 1 << 40);
        assert!((row.get_named::<f64>("f").unwrap() - 3.14).abs() < 0.001);
        assert_eq!(row.get_named::<String>("t").unwrap(), "hello");
        assert_eq!(row.get_named::<Vec<u8>>("bl").unwrap(), vec![1, 2, 3]);
        assert_eq!(row.get_named::<String>("j").unwrap(), r#"{"power":"flight"}"#);
    }

    #[test]
    fn test_statement_errors_are_query_errors() {
        let conn = heroes();

        let err = conn.query("SELEC nonsense", &[]).unwrap_err();
        assert!(err.is_statement_error());
        assert_eq!(err.sql(), Some("SELEC nonsense"));

        let err = conn
            .execute("INSERT INTO heroes (name) VALUES (?)", &[Value::Null])
            .unwrap_err();
        assert!(matches!(
            err.kind(),
            connscope_core::ErrorKind::Query(QueryError {
                kind: QueryErrorKind::Constraint,
                ..
            })
        ));

        let err = conn
            .execute("INSERT INTO heroes (name) VALUES (?)", &[])
            .unwrap_err();
        assert!(matches!(
            err.kind(),
            connscope_core::ErrorKind::Query(QueryError {
                kind: QueryErrorKind::Bind,
                ..
            })
        ));
    }

    #[test]
    fn test_returning_key() {
        let conn = heroes();
        let (affected, key) = conn
            .execute_returning_key("INSERT INTO heroes (name) VALUES (?)", &[Value::from("Ada")])
            .unwrap();
        assert_eq!((affected, key), (1, Some(1)));

        let (affected, key) = conn
            .execute_returning_key("UPDATE heroes SET age = 30", &[])
            .unwrap();
        assert_eq!((affected, key), (1, None));
    }

    #[test]
    fn test_returning_key_when_rowid_repeats_across_tables() {
        let conn = SqliteConnection::open_memory().unwrap();
        conn.execute_raw("CREATE TABLE a (id INTEGER PRIMARY KEY, v TEXT)").unwrap();
        conn.execute_raw("CREATE TABLE b (id INTEGER PRIMARY KEY, v TEXT)").unwrap();
        for _ in 0..4 {
            conn.execute("INSERT INTO a (v) VALUES ('x')", &[]).unwrap();
            conn.execute("INSERT INTO b (v) VALUES ('x')", &[]).unwrap();
        }

        let (_, key_a) = conn
            .execute_returning_key("INSERT INTO a (v) VALUES ('y')", &[])
            .unwrap();
        let (_, key_b) = conn
            .execute_returning_key("insert into b (v) values ('y')", &[])
            .unwrap();
        assert_eq!(key_a, Some(5));
        assert_eq!(key_b, Some(5));

        let (affected, key) = conn
            .execute_returning_key("DELETE FROM a WHERE id = 5", &[])
            .unwrap();
        assert_eq!((affected, key), (1, None));
    }

    #[test]
    fn test_inserts_rows_detection() {
        assert!(inserts_rows("INSERT INTO t VALUES (1)"));
        assert!(inserts_rows("  replace into t VALUES (1)"));
        assert!(inserts_rows("INSERT OR IGNORE INTO t VALUES (1)"));
        assert!(inserts_rows("WITH x(v) AS (SELECT 1) INSERT INTO t SELECT v FROM x"));
        assert!(!inserts_rows("UPDATE t SET v = 1"));
        assert!(!inserts_rows("DELETE FROM t"));
        assert!(!inserts_rows(""));
    }

    #[test]
    fn test_manual_commit_and_rollback() {
        let conn = heroes();
        conn.set_auto_commit(false).unwrap();
        assert!(conn.in_transaction());

        conn.execute("INSERT INTO heroes (name) VALUES ('Ada')", &[]).unwrap();
        conn.rollback().unwrap();
        assert_eq!(count(&conn), 0);
        assert!(conn.in_transaction());

        conn.execute("INSERT INTO heroes (name) VALUES ('Grace')", &[]).unwrap();
        conn.commit().unwrap();
        assert!(conn.in_transaction());

        conn.execute("INSERT INTO heroes (name) VALUES ('Linus')", &[]).unwrap();
        conn.set_auto_commit(true).unwrap();
        assert!(!conn.in_transaction());
        assert_eq!(count(&conn), 2);
    }

    #[test]
    fn test_commit_requires_manual_mode() {
        let conn = heroes();
        let err = conn.commit().unwrap_err();
        assert_eq!(err.connection_kind(), Some(ConnectionErrorKind::Transaction));
        let err = conn.rollback().unwrap_err();
        assert_eq!(err.connection_kind(), Some(ConnectionErrorKind::Transaction));
    }

    #[test]
    fn test_set_auto_commit_is_idempotent() {
        let conn = heroes();
        conn.set_auto_commit(true).unwrap();
        conn.set_auto_commit(false).unwrap();
        conn.set_auto_commit(false).unwrap();
        assert!(!conn.auto_commit());
        conn.set_auto_commit(true).unwrap();
        assert!(conn.auto_commit());
    }

    #[test]
    fn test_read_only_blocks_writes() {
        let conn = heroes();
        conn.set_read_only(true).unwrap();
        assert!(conn.is_read_only());

        let err = conn
            .execute("INSERT INTO heroes (name) VALUES ('Ada')", &[])
            .unwrap_err();
        assert!(err.is_statement_error());
        assert_eq!(count(&conn), 0);

        conn.set_read_only(false).unwrap();
        conn.execute("INSERT INTO heroes (name) VALUES ('Ada')", &[]).unwrap();
        assert_eq!(count(&conn), 1);
    }

    #[test]
    fn test_close_is_final() {
        let conn = heroes();
        conn.close().unwrap();
        assert!(conn.is_closed());
        conn.close().unwrap();

        let err = conn.query("SELECT 1", &[]).unwrap_err();
        assert_eq!(err.connection_kind(), Some(ConnectionErrorKind::Closed));
        let err = conn.set_auto_commit(false).unwrap_err();
        assert_eq!(err.connection_kind(), Some(ConnectionErrorKind::Closed));
    }

    #[test]
    fn test_config_from_connection_config() {
        let config = SqliteConfig::from(&ConnectionConfig::new("sqlite://data/app.db").busy_timeout(250));
        assert_eq!(config.path, "data/app.db");
        assert_eq!(config.busy_timeout_ms, 250);

        let config = SqliteConfig::from(&ConnectionConfig::default());
        assert_eq!(config.path, ":memory:");
    }

    #[test]
    fn test_open_flags() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("heroes.db").to_string_lossy().into_owned();

        let conn = SqliteConnection::open(
            &SqliteConfig::file(path.clone()).flags(OpenFlags::create_read_write()),
        )
        .unwrap();
        conn.execute_raw("CREATE TABLE heroes (id INTEGER)").unwrap();
        drop(conn);

        let conn = SqliteConnection::open(&SqliteConfig::file(path.clone()).flags(OpenFlags::read_only()))
            .unwrap();
        assert!(conn.query("SELECT * FROM heroes", &[]).unwrap().is_empty());
        assert!(conn.execute_raw("INSERT INTO heroes VALUES (1)").is_err());

        let missing = dir.path().join("missing.db").to_string_lossy().into_owned();
        let err = SqliteConnection::open(&SqliteConfig::file(missing).flags(OpenFlags::read_write()))
            .unwrap_err();
        assert_eq!(err.connection_kind(), Some(ConnectionErrorKind::Connect));
    }
}
