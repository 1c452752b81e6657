//! Database connection trait.
//!
//! [`Connection`] is the seam between adapter-independent code (schema
//! introspection, pooling) and a concrete engine adapter. All calls are
//! synchronous and blocking; a connection is owned by one thread at a time,
//! so methods take `&mut self`.

use crate::error::Result;
use crate::row::{Row, RowSet};
use crate::value::Value;

/// A database connection capable of executing statements.
pub trait Connection: Send {
    /// Run a statement with positional binds and return its rows.
    fn exec_query(&mut self, sql: &str, binds: &[Value]) -> Result<RowSet>;

    /// Run a statement with positional binds and return the rows affected.
    fn exec_update(&mut self, sql: &str, binds: &[Value]) -> Result<u64>;

    /// Run a statement and return its first row, if any.
    fn select_one(&mut self, sql: &str, binds: &[Value]) -> Result<Option<Row>> {
        Ok(self.exec_query(sql, binds)?.into_rows().into_iter().next())
    }

    /// Check that the connection is still usable.
    fn ping(&mut self) -> Result<()>;

    /// Whether a transaction frame is currently open (materialized or not).
    fn transaction_open(&self) -> bool;

    /// Return the connection to a clean state before it is reused:
    /// every open transaction frame is rolled back.
    fn reset(&mut self) -> Result<()>;
}
