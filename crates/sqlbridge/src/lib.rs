//! sqlbridge - a transaction-aware SQLite adapter core.
//!
//! sqlbridge sits between an application's data layer and an embedded SQLite
//! database, providing:
//!
//! - Connections with a bounded prepared statement cache
//! - Block-style nested transactions backed by savepoints, begun lazily
//! - `READ UNCOMMITTED` isolation on shared-cache connections
//! - Thread-scoped write and access prevention
//! - Value quoting, bind casting and condition sanitization
//! - Schema introspection, including foreign keys parsed from stored DDL
//! - A blocking connection pool
//!
//! # Quick Start
//!
//! ```rust
//! use sqlbridge::prelude::*;
//!
//! let mut conn = SqliteConnection::open_memory().unwrap();
//! conn.execute_batch(
//!     "CREATE TABLE heroes (id INTEGER PRIMARY KEY, name TEXT NOT NULL);",
//! )
//! .unwrap();
//!
//! conn.transaction(TransactionOptions::new(), |conn| {
//!     conn.exec_insert("INSERT INTO heroes (name) VALUES (?)", &[Value::from("Spider-Man")])?;
//!     // A nested frame that fails is rolled back to its savepoint.
//!     let nested = conn.transaction(TransactionOptions::new().requires_new(true), |conn| {
//!         conn.exec_insert("INSERT INTO heroes (name) VALUES (?)", &[Value::from("Venom")])?;
//!         Err::<(), _>(Error::Custom("changed my mind".into()))
//!     });
//!     assert!(nested.is_err());
//!     Ok(())
//! })
//! .unwrap();
//!
//! let rows = conn.execute("SELECT name FROM heroes").unwrap();
//! assert_eq!(rows.len(), 1);
//!
//! let refused = while_preventing_writes(true, || conn.execute("DELETE FROM heroes"));
//! assert!(matches!(refused, Err(Error::Prevented(_))));
//! ```

pub use sqlbridge_core::{
    CastType, ColumnHint, ColumnInfo, Conditions, ConfigError, Connection, ConnectionError,
    ConnectionErrorKind, Error, FromValue, IsolationLevel, PoolError, PoolErrorKind,
    PreventAccess, PreventWrites, PreventedError, PreventedKind, Quotable, QueryError,
    QueryErrorKind, QueryKind, Result, Row, RowSet, SchemaError, SchemaErrorKind, StatementCache,
    TransactionError, TransactionErrorKind, TransactionMode, TransactionOptions, TransactionState,
    Transactional, TypeError, Value, annotate, classify, quote, quote_column_name, quote_string,
    quote_table_name, sanitize_comment, sanitize_sql_for_conditions, sanitize_sql_like, type_cast,
    while_preventing_access, while_preventing_writes,
};

pub use sqlbridge_pool::{ConnectionFactory, Pool, PoolConfig, PoolStats, PooledConnection};
pub use sqlbridge_schema::{
    CheckConstraintDescriptor, ColumnDescriptor, Deferrable, ForeignKeyDescriptor, GeneratedKind,
    IndexDescriptor, Introspector, ReferentialAction,
};
pub use sqlbridge_sqlite::{OpenFlags, Pragma, SqliteConfig, SqliteConnection};

/// Sub-crates, for items not re-exported at the top level.
pub mod schema {
    pub use sqlbridge_schema::*;
}

pub mod sqlite {
    pub use sqlbridge_sqlite::*;
}

pub mod pool {
    pub use sqlbridge_pool::*;
}

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::{
        ColumnHint, Conditions, Connection, Error, IsolationLevel, Pool, PoolConfig, Quotable,
        Result, Row, RowSet, SqliteConfig, SqliteConnection, TransactionOptions, Transactional,
        Value, sanitize_sql_for_conditions, sanitize_sql_like, while_preventing_access,
        while_preventing_writes,
    };
}
