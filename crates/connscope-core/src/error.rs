//! Error types for ConnScope operations.
//!
//! Every failure surfaces as a single [`Error`] value. The value carries an
//! [`ErrorKind`] describing what went wrong and, optionally, a *suppressed*
//! secondary error: a failure that happened while recovering from the
//! primary one (for example a rollback that failed after a commit failed).
//! The secondary error is recorded next to the primary error instead of
//! replacing it.

use std::fmt;

/// The primary error type for all ConnScope operations.
#[derive(Debug)]
pub struct Error {
    kind: ErrorKind,
    suppressed: Option<Box<Error>>,
}

/// What went wrong.
#[derive(Debug)]
pub enum ErrorKind {
    /// Scope lifecycle errors (misuse, acquisition, transaction boundaries, termination)
    Scope(ScopeError),
    /// Driver-level connection errors
    Connection(ConnectionError),
    /// Statement execution errors
    Query(QueryError),
    /// Row mapping / type conversion errors
    Type(TypeError),
    /// Custom error with message, raised by caller code
    Custom(String),
    /// Any other error raised by caller code
    Other(Box<dyn std::error::Error + Send + Sync>),
}

#[derive(Debug)]
pub struct ScopeError {
    pub kind: ScopeErrorKind,
    pub message: String,
    pub source: Option<Box<Error>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeErrorKind {
    /// The calling thread already owns an active scope
    NestedScope,
    /// The scope was used from a thread other than its owner
    CrossThread,
    /// The scope is terminating or terminated
    NotActive,
    /// Commit or rollback on a non-transactional scope
    NotTransactional,
    /// The connection could not be obtained
    Acquire,
    /// The connection could not be configured for the scope
    Configure,
    /// Commit failed at the driver
    Commit,
    /// Rollback failed at the driver
    Rollback,
    /// Auto-commit could not be restored on close
    RestoreAutoCommit,
    /// The connection could not be released
    Release,
}

impl ScopeErrorKind {
    /// Misuse errors are programming errors and are never retried.
    pub const fn is_misuse(self) -> bool {
        matches!(
            self,
            ScopeErrorKind::NestedScope
                | ScopeErrorKind::CrossThread
                | ScopeErrorKind::NotActive
                | ScopeErrorKind::NotTransactional
        )
    }
}

#[derive(Debug)]
pub struct ConnectionError {
    pub kind: ConnectionErrorKind,
    pub message: String,
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionErrorKind {
    /// Failed to establish connection
    Connect,
    /// The connection was already closed
    Closed,
    /// A connection setting (read-only, auto-commit) could not be applied
    Configure,
    /// Commit or rollback failed
    Transaction,
    /// Closing the connection failed
    Close,
}

#[derive(Debug)]
pub struct QueryError {
    pub kind: QueryErrorKind,
    pub sql: Option<String>,
    pub message: String,
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryErrorKind {
    /// Syntax error in SQL
    Syntax,
    /// Constraint violation (unique, foreign key, etc.)
    Constraint,
    /// Table or column not found
    NotFound,
    /// Permission denied, including writes on a read-only connection
    Permission,
    /// Data too large for column
    DataTruncation,
    /// Lock contention
    Busy,
    /// Parameter could not be bound
    Bind,
    /// Other database error
    Database,
}

#[derive(Debug)]
pub struct TypeError {
    pub expected: &'static str,
    pub actual: String,
    pub column: Option<String>,
}

impl Error {
    /// Create an error of the given kind with no suppressed error.
    pub fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            suppressed: None,
        }
    }

    /// Create a scope error without an underlying cause.
    pub fn scope(kind: ScopeErrorKind, message: impl Into<String>) -> Self {
        Error::from(ScopeError {
            kind,
            message: message.into(),
            source: None,
        })
    }

    /// Create a scope error wrapping an underlying cause.
    pub fn scope_with_source(kind: ScopeErrorKind, message: impl Into<String>, source: Error) -> Self {
        Error::from(ScopeError {
            kind,
            message: message.into(),
            source: Some(Box::new(source)),
        })
    }

    /// Create a connection error without an underlying cause.
    pub fn connection(kind: ConnectionErrorKind, message: impl Into<String>) -> Self {
        Error::from(ConnectionError {
            kind,
            message: message.into(),
            source: None,
        })
    }

    /// Create an error from a caller-supplied message.
    pub fn custom(message: impl Into<String>) -> Self {
        Error::new(ErrorKind::Custom(message.into()))
    }

    /// Wrap an arbitrary caller error.
    pub fn other(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Error::new(ErrorKind::Other(Box::new(err)))
    }

    pub fn kind(&self) -> &ErrorKind {
        &self.kind
    }

    pub fn into_kind(self) -> ErrorKind {
        self.kind
    }

    /// The secondary error recorded while recovering from this one, if any.
    pub fn suppressed(&self) -> Option<&Error> {
        self.suppressed.as_deref()
    }

    /// Record a secondary failure without replacing this error.
    ///
    /// If a suppressed error is already present the new one is chained onto
    /// it, so no failure is dropped.
    pub fn add_suppressed(&mut self, err: Error) {
        match &mut self.suppressed {
            Some(existing) => existing.add_suppressed(err),
            None => self.suppressed = Some(Box::new(err)),
        }
    }

    /// Builder form of [`add_suppressed`](Self::add_suppressed).
    pub fn with_suppressed(mut self, err: Error) -> Self {
        self.add_suppressed(err);
        self
    }

    /// Is this a failure of the statement-execution layer (query or row mapping)?
    ///
    /// Transactional scopes do not roll back automatically on these; the
    /// caller decides how to react.
    pub fn is_statement_error(&self) -> bool {
        matches!(self.kind, ErrorKind::Query(_) | ErrorKind::Type(_))
    }

    /// Is this a scope misuse (nested scope, cross-thread use, inactive scope,
    /// commit/rollback on a non-transactional scope)?
    pub fn is_misuse(&self) -> bool {
        self.scope_kind().is_some_and(ScopeErrorKind::is_misuse)
    }

    /// The scope error kind, if this is a scope error.
    pub fn scope_kind(&self) -> Option<ScopeErrorKind> {
        match &self.kind {
            ErrorKind::Scope(e) => Some(e.kind),
            _ => None,
        }
    }

    /// The connection error kind, if this is a driver-level connection error.
    pub fn connection_kind(&self) -> Option<ConnectionErrorKind> {
        match &self.kind {
            ErrorKind::Connection(e) => Some(e.kind),
            _ => None,
        }
    }

    /// Get the SQL that caused this error, if available
    pub fn sql(&self) -> Option<&str> {
        match &self.kind {
            ErrorKind::Query(q) => q.sql.as_deref(),
            _ => None,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            ErrorKind::Scope(e) => write!(f, "Scope error: {}", e)?,
            ErrorKind::Connection(e) => write!(f, "Connection error: {}", e.message)?,
            ErrorKind::Query(e) => write!(f, "Query error: {}", e.message)?,
            ErrorKind::Type(e) => write!(f, "Type error: {}", e)?,
            ErrorKind::Custom(msg) => write!(f, "{}", msg)?,
            ErrorKind::Other(e) => write!(f, "{}", e)?,
        }
        if let Some(suppressed) = &self.suppressed {
            write!(f, " (suppressed: {})", suppressed)?;
        }
        Ok(())
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match &self.kind {
            ErrorKind::Scope(e) => e
                .source
                .as_deref()
                .map(|err| err as &(dyn std::error::Error + 'static)),
            ErrorKind::Connection(e) => e
                .source
                .as_deref()
                .map(|err| err as &(dyn std::error::Error + 'static)),
            ErrorKind::Query(e) => e
                .source
                .as_deref()
                .map(|err| err as &(dyn std::error::Error + 'static)),
            ErrorKind::Other(e) => Some(e.as_ref()),
            ErrorKind::Type(_) | ErrorKind::Custom(_) => None,
        }
    }
}

impl fmt::Display for ScopeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.source {
            Some(source) => write!(f, "{}: {}", self.message, source),
            None => write!(f, "{}", self.message),
        }
    }
}

impl fmt::Display for ConnectionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl fmt::Display for QueryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl fmt::Display for TypeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(col) = &self.column {
            write!(
                f,
                "expected {} for column '{}', found {}",
                self.expected, col, self.actual
            )
        } else {
            write!(f, "expected {}, found {}", self.expected, self.actual)
        }
    }
}

impl From<ErrorKind> for Error {
    fn from(kind: ErrorKind) -> Self {
        Error::new(kind)
    }
}

impl From<ScopeError> for Error {
    fn from(err: ScopeError) -> Self {
        Error::new(ErrorKind::Scope(err))
    }
}

impl From<ConnectionError> for Error {
    fn from(err: ConnectionError) -> Self {
        Error::new(ErrorKind::Connection(err))
    }
}

impl From<QueryError> for Error {
    fn from(err: QueryError) -> Self {
        Error::new(ErrorKind::Query(err))
    }
}

impl From<TypeError> for Error {
    fn from(err: TypeError) -> Self {
        Error::new(ErrorKind::Type(err))
    }
}

/// Result type alias for ConnScope operations.
pub type Result<T> = std::result::Result<T, Error>;
