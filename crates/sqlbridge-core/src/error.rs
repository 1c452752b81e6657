//! Error types for adapter operations.

use std::fmt;

/// The primary error type for all adapter operations.
#[derive(Debug)]
pub enum Error {
    /// The connection could not be established or is no longer usable
    Connection(ConnectionError),
    /// A statement failed to prepare, bind or step (StatementInvalid)
    Query(QueryError),
    /// A value had no coercion path for the requested context
    Type(TypeError),
    /// Transaction state or isolation errors
    Transaction(TransactionError),
    /// A write/access guard rejected the statement before it ran
    Prevented(PreventedError),
    /// Pool errors
    Pool(PoolError),
    /// Schema introspection errors
    Schema(SchemaError),
    /// Configuration errors
    Config(ConfigError),
    /// Custom error with message
    Custom(String),
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
    /// The database file does not exist and could not be created
    NoDatabase,
    /// The connection was closed before the operation ran
    Closed,
}

#[derive(Debug)]
pub struct QueryError {
    pub kind: QueryErrorKind,
    pub sql: Option<String>,
    /// Engine result code, when the failure came from the engine
    pub code: Option<i32>,
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
    /// Permission denied
    Permission,
    /// Data too large for column
    DataTruncation,
    /// Database busy or table locked
    Busy,
    /// Attempted to write a read-only database
    ReadOnly,
    /// Statement used after its connection or schema went away
    Misuse,
    /// Bind variables did not match the placeholders
    InvalidBinds,
    /// Interrupted
    Cancelled,
    /// Other database error
    Database,
}

#[derive(Debug)]
pub struct TypeError {
    pub expected: &'static str,
    pub actual: String,
    pub column: Option<String>,
}

#[derive(Debug)]
pub struct TransactionError {
    pub kind: TransactionErrorKind,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionErrorKind {
    /// Unsupported isolation level, or isolation requested on a nested frame
    Isolation,
    /// Reduced isolation requires a shared-cache connection
    SharedCacheRequired,
    /// Commit or rollback with no open transaction
    NoActiveTransaction,
}

/// A statement rejected by a write/access guard.
#[derive(Debug)]
pub struct PreventedError {
    pub kind: PreventedKind,
    pub sql: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreventedKind {
    /// Write query while writes are prevented (ReadOnlyError)
    Write,
    /// Any query while access is prevented (PreventedAccessError)
    Access,
}

#[derive(Debug)]
pub struct PoolError {
    pub kind: PoolErrorKind,
    pub message: String,
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolErrorKind {
    /// No connection became available before the checkout timeout
    Timeout,
    /// Pool is closed
    Closed,
    /// Configuration error
    Config,
}

#[derive(Debug)]
pub struct SchemaError {
    pub kind: SchemaErrorKind,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaErrorKind {
    /// Table not found
    TableNotFound,
    /// DDL text could not be parsed
    Parse,
}

#[derive(Debug)]
pub struct ConfigError {
    pub message: String,
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl Error {
    /// Is this a failed statement (prepare, bind or step)?
    pub fn is_statement_invalid(&self) -> bool {
        matches!(self, Error::Query(_))
    }

    /// Is this a guard rejection?
    pub fn is_prevented(&self) -> bool {
        matches!(self, Error::Prevented(_))
    }

    /// Is this a retryable error (busy database, pool timeout)?
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Query(q) => matches!(q.kind, QueryErrorKind::Busy),
            Error::Pool(p) => matches!(p.kind, PoolErrorKind::Timeout),
            _ => false,
        }
    }

    /// Is this a connection error that likely requires reconnection?
    pub fn is_connection_error(&self) -> bool {
        matches!(self, Error::Connection(_))
    }

    /// Get the SQL that caused this error, if available
    pub fn sql(&self) -> Option<&str> {
        match self {
            Error::Query(q) => q.sql.as_deref(),
            Error::Prevented(p) => Some(&p.sql),
            _ => None,
        }
    }

    pub(crate) fn isolation(message: impl Into<String>) -> Self {
        Error::Transaction(TransactionError {
            kind: TransactionErrorKind::Isolation,
            message: message.into(),
        })
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Connection(e) => write!(f, "Connection error: {}", e.message),
            Error::Query(e) => {
                if let Some(code) = e.code {
                    write!(f, "Statement invalid (code {}): {}", code, e.message)
                } else {
                    write!(f, "Statement invalid: {}", e.message)
                }
            }
            Error::Type(e) => write!(f, "Type error: {}", e),
            Error::Transaction(e) => write!(f, "Transaction error: {}", e.message),
            Error::Prevented(e) => write!(f, "{}", e),
            Error::Pool(e) => write!(f, "Pool error: {}", e.message),
            Error::Schema(e) => write!(f, "Schema error: {}", e.message),
            Error::Config(e) => write!(f, "Configuration error: {}", e.message),
            Error::Custom(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Connection(e) => e
                .source
                .as_deref()
                .map(|err| err as &(dyn std::error::Error + 'static)),
            Error::Query(e) => e
                .source
                .as_deref()
                .map(|err| err as &(dyn std::error::Error + 'static)),
            Error::Pool(e) => e
                .source
                .as_deref()
                .map(|err| err as &(dyn std::error::Error + 'static)),
            Error::Config(e) => e
                .source
                .as_deref()
                .map(|err| err as &(dyn std::error::Error + 'static)),
            _ => None,
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

impl fmt::Display for TransactionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl fmt::Display for PreventedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            PreventedKind::Write => write!(f, "Write query attempted while in readonly mode: {}", self.sql),
            PreventedKind::Access => write!(f, "Database access prevented: {}", self.sql),
        }
    }
}

impl fmt::Display for PoolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl fmt::Display for SchemaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl From<ConnectionError> for Error {
    fn from(err: ConnectionError) -> Self {
        Error::Connection(err)
    }
}

impl From<QueryError> for Error {
    fn from(err: QueryError) -> Self {
        Error::Query(err)
    }
}

impl From<TypeError> for Error {
    fn from(err: TypeError) -> Self {
        Error::Type(err)
    }
}

impl From<TransactionError> for Error {
    fn from(err: TransactionError) -> Self {
        Error::Transaction(err)
    }
}

impl From<PreventedError> for Error {
    fn from(err: PreventedError) -> Self {
        Error::Prevented(err)
    }
}

impl From<PoolError> for Error {
    fn from(err: PoolError) -> Self {
        Error::Pool(err)
    }
}

impl From<SchemaError> for Error {
    fn from(err: SchemaError) -> Self {
        Error::Schema(err)
    }
}

impl From<ConfigError> for Error {
    fn from(err: ConfigError) -> Self {
        Error::Config(err)
    }
}

/// Result type alias for adapter operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statement_invalid_helpers() {
        let err = Error::Query(QueryError {
            kind: QueryErrorKind::Busy,
            sql: Some("SELECT 1".to_string()),
            code: Some(5),
            message: "database is locked".to_string(),
            source: None,
        });

        assert!(err.is_statement_invalid());
        assert!(err.is_retryable());
        assert_eq!(err.sql(), Some("SELECT 1"));
        assert_eq!(
            err.to_string(),
            "Statement invalid (code 5): database is locked"
        );
    }

    #[test]
    fn prevented_errors_carry_sql() {
        let err = Error::Prevented(PreventedError {
            kind: PreventedKind::Write,
            sql: "DELETE FROM t".to_string(),
        });
        assert!(err.is_prevented());
        assert!(!err.is_retryable());
        assert_eq!(err.sql(), Some("DELETE FROM t"));
        assert!(err.to_string().contains("readonly"));
    }

    #[test]
    fn pool_timeout_is_distinct_from_connection_errors() {
        let timeout = Error::Pool(PoolError {
            kind: PoolErrorKind::Timeout,
            message: "could not obtain a connection".to_string(),
            source: None,
        });
        assert!(timeout.is_retryable());
        assert!(!timeout.is_connection_error());

        let closed = Error::Connection(ConnectionError {
            kind: ConnectionErrorKind::Closed,
            message: "connection closed".to_string(),
            source: None,
        });
        assert!(closed.is_connection_error());
    }
}
