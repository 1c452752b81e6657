//! Engine-independent building blocks for the sqlbridge adapter.
//!
//! - [`Value`], [`Row`], [`RowSet`]: data crossing the adapter boundary
//! - [`Error`]: the error taxonomy shared by every crate
//! - [`Connection`]: the seam used by the introspector and the pool
//! - [`StatementCache`]: bounded, fork-aware prepared statement cache
//! - [`quote`] / [`type_cast`]: value quoting and bind casting
//! - [`guard`]: thread-local write/access prevention
//! - [`annotate`]: SQL comment annotation
//! - [`TransactionManager`]: lazily materialized nested transactions

pub mod annotate;
pub mod connection;
pub mod error;
pub mod guard;
pub mod quoting;
pub mod row;
pub mod sanitize;
pub mod statement_cache;
pub mod transaction;
pub mod value;

pub use annotate::{annotate, sanitize_comment};
pub use connection::Connection;
pub use error::{
    ConfigError, ConnectionError, ConnectionErrorKind, Error, PoolError, PoolErrorKind,
    PreventedError, PreventedKind, QueryError, QueryErrorKind, Result, SchemaError,
    SchemaErrorKind, TransactionError, TransactionErrorKind, TypeError,
};
pub use guard::{
    PreventAccess, PreventWrites, QueryKind, check_batch, classify, split_statements,
    while_preventing_access, while_preventing_writes,
};
pub use quoting::{
    CastType, ColumnHint, Quotable, quote, quote_column_name, quote_string, quote_table_name,
    type_cast,
};
pub use row::{ColumnInfo, FromValue, Row, RowSet};
pub use sanitize::{Conditions, sanitize_sql_for_conditions, sanitize_sql_like};
pub use statement_cache::{ProcessToken, StatementCache};
pub use transaction::{
    IsolationLevel, TransactionBackend, TransactionManager, TransactionMode, TransactionOptions,
    TransactionState, Transactional,
};
pub use value::Value;
