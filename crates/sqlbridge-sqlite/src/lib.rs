//! SQLite adapter for sqlbridge.
//!
// FFI bindings require unsafe code - this is expected for database adapters
#![allow(unsafe_code)]
//!
//! [`SqliteConnection`] wraps a libsqlite3 handle (bundled through
//! `libsqlite3-sys`) and implements [`sqlbridge_core::Connection`] and
//! [`sqlbridge_core::Transactional`].
//!
//! # Features
//!
//! - Bounded, fork-aware prepared statement cache
//! - Lazily materialized nested transactions (savepoints)
//! - `READ UNCOMMITTED` on shared-cache connections
//! - Write/access prevention for user statements
//! - Schema introspection, including foreign keys parsed from stored DDL
//! - JSON-configurable open flags, busy timeout and pragmas
//!
//! # Example
//!
//! ```rust
//! use sqlbridge_core::{TransactionOptions, Transactional, Value};
//! use sqlbridge_sqlite::SqliteConnection;
//!
//! let mut conn = SqliteConnection::open_memory().unwrap();
//! conn.execute("CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT)").unwrap();
//!
//! conn.transaction(TransactionOptions::new(), |conn| {
//!     conn.exec_insert("INSERT INTO users (name) VALUES (?)", &[Value::from("Alice")])
//! })
//! .unwrap();
//!
//! let rows = conn.execute("SELECT name FROM users").unwrap();
//! assert_eq!(rows.len(), 1);
//! ```
//!
//! # Type Mapping
//!
//! | Value | SQLite storage |
//! |-------|----------------|
//! | `Null` | NULL |
//! | `Bool` | TEXT `'t'` / `'f'` (cast before binding) |
//! | `Integer` | INTEGER |
//! | `Float` | REAL |
//! | `Text`, `Decimal` | TEXT |
//! | `Blob` | BLOB |
//! | `Date`, `Time`, `Timestamp` | TEXT (ISO-8601) |
//! | `Json` | TEXT |

pub mod config;
pub mod connection;
pub mod ffi;
pub mod statement;
pub mod types;

pub use config::{OpenFlags, Pragma, SqliteConfig};
pub use connection::SqliteConnection;
pub use statement::SqliteStatement;

/// Re-export the SQLite library version.
pub fn sqlite_version() -> &'static str {
    ffi::version()
}

/// Re-export the SQLite library version number.
pub fn sqlite_version_number() -> i32 {
    ffi::version_number()
}
