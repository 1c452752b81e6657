//! SQLite connection implementation.
//!
//! [`SqliteConnection`] pairs a raw handle (statement cache, pragma access,
//! internal statements) with the transaction frame stack. User statements
//! pass through three gates before they reach the engine: the thread's
//! write/access guard, materialization of pending transaction frames, and
//! bind casting. Statements the adapter issues for its own bookkeeping skip
//! all three.

#![allow(clippy::borrow_as_ptr)] // FFI requires raw pointers

use std::ffi::{CStr, CString, c_char, c_int};
use std::ptr::{self, NonNull};

use sqlbridge_core::{
    ColumnHint, Connection, ConnectionError, ConnectionErrorKind, Error, QueryError, Quotable,
    Result, Row, RowSet, StatementCache, TransactionBackend, TransactionManager,
    TransactionOptions, TransactionState, Transactional, Value, guard, quoting,
};
use sqlbridge_schema::{
    CheckConstraintDescriptor, ColumnDescriptor, ForeignKeyDescriptor, IndexDescriptor,
    Introspector,
};

use crate::config::SqliteConfig;
use crate::ffi;
use crate::statement::{SqliteStatement, engine_error};

/// An open database handle and its prepared statements.
struct RawConnection {
    db: NonNull<ffi::sqlite3>,
    statements: StatementCache<SqliteStatement>,
    shared_cache: bool,
}

// SAFETY: the handle is opened in SQLite's multi-thread (or serialized)
// mode, which allows a connection to move between threads as long as it is
// used by one thread at a time. `&mut self` on every operation and the
// absence of `Sync` guarantee exclusive use.
unsafe impl Send for RawConnection {}

impl RawConnection {
    fn open(config: &SqliteConfig) -> Result<Self> {
        let c_path = CString::new(config.path.as_str()).map_err(|_| {
            Error::Connection(ConnectionError {
                kind: ConnectionErrorKind::Connect,
                message: "Invalid path: contains null byte".to_string(),
                source: None,
            })
        })?;

        let mut db: *mut ffi::sqlite3 = ptr::null_mut();
        let flags = config.flags.to_sqlite_flags();

        // SAFETY: We pass valid pointers and check the return value
        let rc = unsafe { ffi::sqlite3_open_v2(c_path.as_ptr(), &mut db, flags, ptr::null()) };

        if rc != ffi::SQLITE_OK {
            let msg = if db.is_null() {
                ffi::error_string(rc).to_string()
            } else {
                // SAFETY: db is valid even on failure and must still be closed
                unsafe {
                    let (_, msg) = ffi::last_error(db);
                    ffi::sqlite3_close(db);
                    msg
                }
            };
            let kind = if ffi::primary_code(rc) == ffi::SQLITE_CANTOPEN {
                ConnectionErrorKind::NoDatabase
            } else {
                ConnectionErrorKind::Connect
            };
            return Err(Error::Connection(ConnectionError {
                kind,
                message: format!("Failed to open database '{}': {}", config.path, msg),
                source: None,
            }));
        }

        let Some(db) = NonNull::new(db) else {
            return Err(Error::Connection(ConnectionError {
                kind: ConnectionErrorKind::Connect,
                message: "sqlite3_open_v2 returned no handle".to_string(),
                source: None,
            }));
        };

        let mut raw = Self {
            db,
            statements: StatementCache::new(config.statement_limit),
            shared_cache: config.is_shared_cache(),
        };

        if config.busy_timeout_ms > 0 {
            let ms = c_int::try_from(config.busy_timeout_ms).unwrap_or(c_int::MAX);
            // SAFETY: db is valid
            unsafe { ffi::sqlite3_busy_timeout(raw.db.as_ptr(), ms) };
        }

        // Only takes effect on a new database; existing files keep theirs.
        if !config.flags.read_only {
            raw.execute_batch("PRAGMA encoding = 'UTF-8'")?;
        }
        for pragma in config.pragmas_to_apply() {
            raw.execute_batch(&pragma.to_sql())?;
        }

        tracing::debug!(path = %config.path, shared_cache = raw.shared_cache, "opened SQLite database");
        Ok(raw)
    }

    /// Run one or more statements without binds or results.
    fn execute_batch(&mut self, sql: &str) -> Result<()> {
        let c_sql = CString::new(sql).map_err(|_| {
            Error::Query(QueryError {
                kind: sqlbridge_core::QueryErrorKind::Syntax,
                sql: Some(sql.to_string()),
                code: None,
                message: "SQL contains null byte".to_string(),
                source: None,
            })
        })?;

        tracing::trace!(sql = %sql, "execute");
        let mut errmsg: *mut c_char = ptr::null_mut();

        // SAFETY: All pointers are valid
        let rc = unsafe {
            ffi::sqlite3_exec(
                self.db.as_ptr(),
                c_sql.as_ptr(),
                None,
                ptr::null_mut(),
                &mut errmsg,
            )
        };

        if rc == ffi::SQLITE_OK {
            return Ok(());
        }
        let message = if errmsg.is_null() {
            ffi::error_string(rc).to_string()
        } else {
            // SAFETY: errmsg was allocated by SQLite and is freed exactly once
            unsafe {
                let msg = CStr::from_ptr(errmsg).to_string_lossy().into_owned();
                ffi::sqlite3_free(errmsg.cast());
                msg
            }
        };
        Err(engine_error(rc, sql, message))
    }

    /// Run one statement through the cache. A failed bind or step evicts
    /// (and finalizes) the cached handle.
    fn run(&mut self, sql: &str, binds: &[Value]) -> Result<RowSet> {
        tracing::trace!(sql = %sql, binds = binds.len(), "query");
        let db = self.db.as_ptr();
        let statement = self
            .statements
            .fetch_or_prepare(sql, |sql| SqliteStatement::prepare(db, sql))?;
        let result = statement.bind(binds).and_then(|()| statement.query());
        if result.is_err() {
            drop(self.statements.evict(sql));
        }
        result
    }

    fn changes(&self) -> u64 {
        // SAFETY: db is valid
        let changes = unsafe { ffi::sqlite3_changes(self.db.as_ptr()) };
        u64::try_from(changes).unwrap_or(0)
    }

    fn last_insert_rowid(&self) -> i64 {
        // SAFETY: db is valid
        unsafe { ffi::sqlite3_last_insert_rowid(self.db.as_ptr()) }
    }

    fn pragma_value(&mut self, name: &str) -> Result<Value> {
        let rows = self.run(&format!("PRAGMA {}", name), &[])?;
        Ok(rows.scalar().cloned().unwrap_or(Value::Null))
    }
}

impl TransactionBackend for RawConnection {
    fn execute_internal(&mut self, sql: &str) -> Result<()> {
        self.execute_batch(sql)
    }

    fn is_shared_cache(&self) -> bool {
        self.shared_cache
    }

    fn read_uncommitted(&mut self) -> Result<bool> {
        Ok(self
            .pragma_value("read_uncommitted")?
            .as_i64()
            .is_some_and(|v| v != 0))
    }
}

impl Drop for RawConnection {
    fn drop(&mut self) {
        // Statements go first; close_v2 would otherwise defer the close
        // until the last one is finalized.
        self.statements.clear();
        // SAFETY: db is valid and closed exactly once
        let rc = unsafe { ffi::sqlite3_close_v2(self.db.as_ptr()) };
        if rc != ffi::SQLITE_OK {
            tracing::warn!(code = rc, "failed to close SQLite database");
        }
    }
}

/// A connection to a SQLite database.
///
/// Owned by one thread at a time: the type is `Send` but not `Sync`. Use
/// [`sqlbridge_pool`](https://docs.rs/sqlbridge-pool) to share connections
/// between threads.
pub struct SqliteConnection {
    raw: Option<RawConnection>,
    transactions: TransactionManager,
    config: SqliteConfig,
}

impl std::fmt::Debug for SqliteConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteConnection")
            .field("path", &self.config.path)
            .field("active", &self.raw.is_some())
            .field("open_transactions", &self.transactions.open_transactions())
            .finish_non_exhaustive()
    }
}

fn active(raw: &mut Option<RawConnection>) -> Result<&mut RawConnection> {
    raw.as_mut().ok_or_else(|| {
        Error::Connection(ConnectionError {
            kind: ConnectionErrorKind::Closed,
            message: "connection is closed".to_string(),
            source: None,
        })
    })
}

impl SqliteConnection {
    /// Open a new SQLite connection with the given configuration.
    pub fn open(config: &SqliteConfig) -> Result<Self> {
        Ok(Self {
            raw: Some(RawConnection::open(config)?),
            transactions: TransactionManager::new(config.default_transaction_mode),
            config: config.clone(),
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
        &self.config.path
    }

    pub fn config(&self) -> &SqliteConfig {
        &self.config
    }

    /// Whether the underlying handle is open.
    pub fn is_active(&self) -> bool {
        self.raw.is_some()
    }

    /// Close the handle. Open transaction frames are forgotten; the engine
    /// rolls back any physical transaction on close.
    pub fn disconnect(&mut self) {
        self.transactions.discard();
        if self.raw.take().is_some() {
            tracing::debug!(path = %self.config.path, "disconnected");
        }
    }

    /// Replace the handle with a freshly opened one.
    pub fn reconnect(&mut self) -> Result<()> {
        self.disconnect();
        self.raw = Some(RawConnection::open(&self.config)?);
        tracing::debug!(path = %self.config.path, "reconnected");
        Ok(())
    }

    /// Text encoding of the database (`UTF-8`).
    pub fn encoding(&mut self) -> Result<String> {
        let value = active(&mut self.raw)?.pragma_value("encoding")?;
        Ok(value.as_str().unwrap_or("UTF-8").to_string())
    }

    // Guard, then pending frames, then bind casting.
    fn prepare_user_statement(&mut self, sql: &str, binds: &[Value]) -> Result<Vec<Value>> {
        guard::check(sql)?;
        let raw = active(&mut self.raw)?;
        self.transactions.materialize(raw)?;
        binds
            .iter()
            .map(|v| quoting::type_cast(&Quotable::Value(v.clone()), None))
            .collect()
    }

    /// Run a statement without binds and return its rows.
    pub fn execute(&mut self, sql: &str) -> Result<RowSet> {
        self.exec_query(sql, &[])
    }

    /// Run a statement with positional binds and return its rows.
    pub fn exec_query(&mut self, sql: &str, binds: &[Value]) -> Result<RowSet> {
        let binds = self.prepare_user_statement(sql, binds)?;
        active(&mut self.raw)?.run(sql, &binds)
    }

    /// Run a statement and return the number of rows it changed.
    pub fn exec_update(&mut self, sql: &str, binds: &[Value]) -> Result<u64> {
        let binds = self.prepare_user_statement(sql, binds)?;
        let raw = active(&mut self.raw)?;
        raw.run(sql, &binds)?;
        Ok(raw.changes())
    }

    /// Run an `INSERT` and return the rowid of the inserted row.
    pub fn exec_insert(&mut self, sql: &str, binds: &[Value]) -> Result<i64> {
        let binds = self.prepare_user_statement(sql, binds)?;
        let raw = active(&mut self.raw)?;
        raw.run(sql, &binds)?;
        Ok(raw.last_insert_rowid())
    }

    /// Run several `;`-separated statements without binds. Every statement
    /// passes the guard before any of them runs.
    pub fn execute_batch(&mut self, sql: &str) -> Result<()> {
        guard::check_batch(sql)?;
        let raw = active(&mut self.raw)?;
        self.transactions.materialize(raw)?;
        raw.execute_batch(sql)
    }

    /// Run a statement and return its first row.
    pub fn select_one(&mut self, sql: &str, binds: &[Value]) -> Result<Option<Row>> {
        Ok(self.exec_query(sql, binds)?.into_rows().into_iter().next())
    }

    /// Get the last insert rowid.
    pub fn last_insert_rowid(&mut self) -> Result<i64> {
        Ok(active(&mut self.raw)?.last_insert_rowid())
    }

    /// Get the number of rows changed by the last statement.
    pub fn changes(&mut self) -> Result<u64> {
        Ok(active(&mut self.raw)?.changes())
    }

    /// Finalize every cached prepared statement.
    pub fn clear_cache(&mut self) {
        if let Some(raw) = self.raw.as_mut() {
            raw.statements.clear();
        }
    }

    /// Number of cached prepared statements.
    pub fn cached_statements(&mut self) -> usize {
        self.raw.as_mut().map_or(0, |raw| raw.statements.len())
    }

    /// Statement cache `(hits, misses)`.
    pub fn statement_cache_stats(&self) -> (u64, u64) {
        self.raw
            .as_ref()
            .map_or((0, 0), |raw| raw.statements.stats())
    }

    pub fn is_shared_cache(&self) -> bool {
        self.config.is_shared_cache()
    }

    pub fn open_transactions(&self) -> usize {
        self.transactions.open_transactions()
    }

    pub fn transaction_state(&self) -> TransactionState {
        self.transactions.state()
    }

    /// Roll back every open frame.
    pub fn rollback_all(&mut self) -> Result<()> {
        let raw = active(&mut self.raw)?;
        self.transactions.rollback_all(raw)
    }

    /// SQL literal for `value`.
    pub fn quote(&self, value: impl Into<Quotable>, hint: Option<&ColumnHint>) -> Result<String> {
        quoting::quote(&value.into(), hint)
    }

    /// Bind value for `value`.
    pub fn type_cast(&self, value: impl Into<Quotable>, hint: Option<&ColumnHint>) -> Result<Value> {
        quoting::type_cast(&value.into(), hint)
    }

    pub fn tables(&mut self) -> Result<Vec<String>> {
        Introspector::new().tables(self)
    }

    pub fn table_exists(&mut self, table: &str) -> Result<bool> {
        Introspector::new().table_exists(self, table)
    }

    pub fn table_sql(&mut self, table: &str) -> Result<Option<String>> {
        Introspector::new().table_sql(self, table)
    }

    pub fn columns(&mut self, table: &str) -> Result<Vec<ColumnDescriptor>> {
        Introspector::new().columns(self, table)
    }

    pub fn indexes(&mut self, table: &str) -> Result<Vec<IndexDescriptor>> {
        Introspector::new().indexes(self, table)
    }

    pub fn foreign_keys(&mut self, table: &str) -> Result<Vec<ForeignKeyDescriptor>> {
        Introspector::new().foreign_keys(self, table)
    }

    pub fn primary_key(&mut self, table: &str) -> Result<Option<String>> {
        Introspector::new().primary_key(self, table)
    }

    pub fn primary_keys(&mut self, table: &str) -> Result<Vec<String>> {
        Introspector::new().primary_keys(self, table)
    }

    pub fn check_constraints(&mut self, table: &str) -> Result<Vec<CheckConstraintDescriptor>> {
        Introspector::new().check_constraints(self, table)
    }
}

impl Transactional for SqliteConnection {
    fn begin_transaction(&mut self, options: TransactionOptions) -> Result<()> {
        active(&mut self.raw)?;
        self.transactions.begin_transaction(options)
    }

    fn commit_transaction(&mut self) -> Result<()> {
        let raw = active(&mut self.raw)?;
        self.transactions.commit_transaction(raw)
    }

    fn rollback_transaction(&mut self) -> Result<()> {
        let raw = active(&mut self.raw)?;
        self.transactions.rollback_transaction(raw)
    }

    fn transaction_joinable(&self) -> bool {
        self.transactions.current_joinable()
    }
}

impl Connection for SqliteConnection {
    fn exec_query(&mut self, sql: &str, binds: &[Value]) -> Result<RowSet> {
        SqliteConnection::exec_query(self, sql, binds)
    }

    fn exec_update(&mut self, sql: &str, binds: &[Value]) -> Result<u64> {
        SqliteConnection::exec_update(self, sql, binds)
    }

    fn ping(&mut self) -> Result<()> {
        active(&mut self.raw)?.run("SELECT 1", &[]).map(drop)
    }

    fn transaction_open(&self) -> bool {
        self.transactions.open_transactions() > 0
    }

    fn reset(&mut self) -> Result<()> {
        if self.transactions.open_transactions() == 0 {
            return Ok(());
        }
        self.rollback_all()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlbridge_core::{
        IsolationLevel, PreventedKind, QueryErrorKind, TransactionErrorKind,
        while_preventing_writes,
    };
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn memory() -> SqliteConnection {
        SqliteConnection::open_memory().unwrap()
    }

    fn shared_memory() -> SqliteConnection {
        static NEXT: AtomicUsize = AtomicUsize::new(0);
        let path = format!(
            "file:sqlbridge_shared_{}?mode=memory&cache=shared",
            NEXT.fetch_add(1, Ordering::Relaxed)
        );
        let config = SqliteConfig::file(path)
            .flags(crate::OpenFlags::create_read_write().uri().shared_cache());
        SqliteConnection::open(&config).unwrap()
    }

    fn count(conn: &mut SqliteConnection, table: &str) -> i64 {
        conn.execute(&format!("SELECT COUNT(*) FROM {}", table))
            .unwrap()
            .scalar()
            .and_then(Value::as_i64)
            .unwrap()
    }

    #[test]
    fn test_open_memory() {
        let mut conn = memory();
        assert_eq!(conn.path(), ":memory:");
        assert!(conn.is_active());
        assert_eq!(conn.encoding().unwrap(), "UTF-8");
    }

    #[test]
    fn test_query_and_update() {
        let mut conn = memory();
        conn.execute("CREATE TABLE test (id INTEGER PRIMARY KEY, name TEXT, age INTEGER)")
            .unwrap();
        let id = conn
            .exec_insert(
                "INSERT INTO test (name, age) VALUES (?, ?)",
                &[Value::from("Alice"), Value::Integer(30)],
            )
            .unwrap();
        assert_eq!(id, 1);
        conn.exec_insert("INSERT INTO test (name) VALUES (?)", &[Value::Null])
            .unwrap();

        let rows = conn
            .exec_query("SELECT * FROM test ORDER BY id", &[])
            .unwrap();
        assert_eq!(rows.columns(), ["id", "name", "age"]);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows.rows()[0].get_named::<String>("name").unwrap(), "Alice");
        assert_eq!(rows.rows()[1].get_named::<Option<String>>("name").unwrap(), None);

        let changed = conn
            .exec_update("UPDATE test SET age = ? WHERE age IS NULL", &[Value::Integer(5)])
            .unwrap();
        assert_eq!(changed, 1);
    }

    #[test]
    fn test_types_round_trip() {
        let mut conn = memory();
        let row = conn
            .select_one(
                "SELECT ?, ?, ?, ?, ?",
                &[
                    Value::Bool(true),
                    Value::Integer(42),
                    Value::Float(2.5),
                    Value::from("héllo"),
                    Value::Blob(vec![0, 1, 255]),
                ],
            )
            .unwrap()
            .unwrap();
        // Booleans are bound in their quoted form
        assert_eq!(row.get(0), Some(&Value::Text("t".into())));
        assert_eq!(row.get(1), Some(&Value::Integer(42)));
        assert_eq!(row.get(2), Some(&Value::Float(2.5)));
        assert_eq!(row.get(3), Some(&Value::Text("héllo".into())));
        assert_eq!(row.get(4), Some(&Value::Blob(vec![0, 1, 255])));
    }

    #[test]
    fn statements_are_cached_and_evicted_on_failure() {
        let mut conn = memory();
        conn.execute("CREATE TABLE t (id INTEGER PRIMARY KEY, v TEXT UNIQUE)")
            .unwrap();
        let insert = "INSERT INTO t (v) VALUES (?)";
        conn.exec_update(insert, &[Value::from("a")]).unwrap();
        conn.exec_update(insert, &[Value::from("b")]).unwrap();
        let (hits, _) = conn.statement_cache_stats();
        assert!(hits >= 1);
        assert_eq!(conn.cached_statements(), 2);

        let err = conn.exec_update(insert, &[Value::from("a")]).unwrap_err();
        match err {
            Error::Query(q) => assert_eq!(q.kind, QueryErrorKind::Constraint),
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(conn.cached_statements(), 1);

        // Re-prepared on the next use
        conn.exec_update(insert, &[Value::from("c")]).unwrap();
        assert_eq!(count(&mut conn, "t"), 3);
    }

    #[test]
    fn statement_limit_bounds_the_cache() {
        let mut conn = SqliteConnection::open(&SqliteConfig::memory().statement_limit(2)).unwrap();
        for n in 0..5 {
            conn.execute(&format!("SELECT {}", n)).unwrap();
        }
        assert_eq!(conn.cached_statements(), 2);
        conn.clear_cache();
        assert_eq!(conn.cached_statements(), 0);
    }

    #[test]
    fn wrong_bind_count_is_invalid_binds() {
        let mut conn = memory();
        let err = conn.exec_query("SELECT ?, ?", &[Value::Integer(1)]).unwrap_err();
        match err {
            Error::Query(q) => {
                assert_eq!(q.kind, QueryErrorKind::InvalidBinds);
                assert_eq!(q.sql.as_deref(), Some("SELECT ?, ?"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn trailing_statements_are_rejected_before_running() {
        let mut conn = memory();
        conn.execute("CREATE TABLE t (v INTEGER)").unwrap();

        let err = conn
            .exec_update("INSERT INTO t VALUES (1); INSERT INTO t VALUES (2)", &[])
            .unwrap_err();
        match err {
            Error::Query(q) => {
                assert_eq!(q.kind, QueryErrorKind::Misuse);
                assert!(q.message.contains("execute_batch"), "{}", q.message);
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(count(&mut conn, "t"), 0);

        // Trailing separators and comments are not statements.
        conn.exec_update("INSERT INTO t VALUES (3); -- done\n;", &[]).unwrap();
        conn.exec_update("INSERT INTO t VALUES (4) /* app:jobs */;", &[]).unwrap();
        assert_eq!(count(&mut conn, "t"), 2);
    }

    #[test]
    fn batches_are_guarded_statement_by_statement() {
        let mut conn = memory();
        conn.execute_batch("CREATE TABLE t (v INTEGER); INSERT INTO t VALUES (1);")
            .unwrap();

        while_preventing_writes(true, || {
            let err = conn.execute_batch("SELECT 1; DELETE FROM t").unwrap_err();
            match err {
                Error::Prevented(p) => {
                    assert_eq!(p.kind, PreventedKind::Write);
                    assert_eq!(p.sql, "DELETE FROM t");
                }
                other => panic!("unexpected {other:?}"),
            }
            conn.execute_batch("SELECT 1; SELECT 'DELETE FROM t;'").unwrap();
        });
        assert_eq!(count(&mut conn, "t"), 1);
    }

    #[test]
    fn syntax_errors_are_statement_invalid() {
        let mut conn = memory();
        let err = conn.execute("SELEC 1").unwrap_err();
        assert!(err.is_statement_invalid());
        match err {
            Error::Query(q) => assert_eq!(q.kind, QueryErrorKind::Syntax),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn begin_is_deferred_until_first_statement() {
        let mut conn = memory();
        conn.execute("CREATE TABLE t (v INTEGER)").unwrap();

        conn.begin_transaction(TransactionOptions::new()).unwrap();
        assert_eq!(conn.transaction_state(), TransactionState::Open);
        conn.exec_update("INSERT INTO t VALUES (1)", &[]).unwrap();
        assert_eq!(conn.transaction_state(), TransactionState::Materialized);
        conn.rollback_transaction().unwrap();

        assert_eq!(conn.transaction_state(), TransactionState::None);
        assert_eq!(count(&mut conn, "t"), 0);
    }

    #[test]
    fn nested_savepoints() {
        let mut conn = memory();
        conn.execute("CREATE TABLE t (v INTEGER)").unwrap();

        conn.transaction(TransactionOptions::new(), |conn| {
            conn.exec_update("INSERT INTO t VALUES (1)", &[])?;
            let inner: Result<()> = conn.transaction(
                TransactionOptions::new().requires_new(true),
                |conn| {
                    conn.exec_update("INSERT INTO t VALUES (2)", &[])?;
                    Err(Error::Custom("undo the inner insert".into()))
                },
            );
            assert!(inner.is_err());
            Ok(())
        })
        .unwrap();

        let values: Vec<i64> = conn
            .execute("SELECT v FROM t")
            .unwrap()
            .iter()
            .map(|r| r.get_as::<i64>(0).unwrap())
            .collect();
        assert_eq!(values, [1]);
    }

    #[test]
    fn read_uncommitted_requires_shared_cache() {
        let mut conn = memory();
        conn.begin_transaction(TransactionOptions::new().isolation(IsolationLevel::ReadUncommitted))
            .unwrap();
        let err = conn.execute("SELECT 1").unwrap_err();
        match err {
            Error::Transaction(t) => assert_eq!(t.kind, TransactionErrorKind::SharedCacheRequired),
            other => panic!("unexpected {other:?}"),
        }
        conn.rollback_transaction().unwrap();
    }

    #[test]
    fn read_uncommitted_is_restored_after_commit() {
        let mut conn = shared_memory();
        assert!(conn.is_shared_cache());
        let read_uncommitted = |conn: &mut SqliteConnection| {
            conn.execute("PRAGMA read_uncommitted")
                .unwrap()
                .scalar()
                .and_then(Value::as_i64)
                .unwrap()
        };

        conn.transaction(
            TransactionOptions::new().isolation(IsolationLevel::ReadUncommitted),
            |conn| {
                assert_eq!(read_uncommitted(conn), 1);
                Ok(())
            },
        )
        .unwrap();
        assert_eq!(read_uncommitted(&mut conn), 0);
    }

    #[test]
    fn dirty_reads_between_shared_cache_connections() {
        let mut writer = shared_memory();
        let mut reader = SqliteConnection::open(writer.config()).unwrap();
        writer.execute("CREATE TABLE t (v INTEGER)").unwrap();

        writer.begin_transaction(TransactionOptions::new()).unwrap();
        writer.exec_update("INSERT INTO t VALUES (1)", &[]).unwrap();

        let seen = reader
            .transaction(
                TransactionOptions::new().isolation(IsolationLevel::ReadUncommitted),
                |reader| Ok(count(reader, "t")),
            )
            .unwrap();
        assert_eq!(seen, 1);

        writer.rollback_transaction().unwrap();
        assert_eq!(count(&mut reader, "t"), 0);
    }

    #[test]
    fn guard_blocks_writes_but_not_bookkeeping() {
        let mut conn = memory();
        conn.execute("CREATE TABLE t (v INTEGER)").unwrap();
        conn.begin_transaction(TransactionOptions::new()).unwrap();

        while_preventing_writes(true, || {
            let err = conn.exec_update("INSERT INTO t VALUES (1)", &[]).unwrap_err();
            match err {
                Error::Prevented(p) => assert_eq!(p.kind, PreventedKind::Write),
                other => panic!("unexpected {other:?}"),
            }
            // Reads still work and materialize the transaction.
            assert_eq!(count(&mut conn, "t"), 0);
            conn.commit_transaction().unwrap();
        });
        assert_eq!(conn.transaction_state(), TransactionState::None);
    }

    #[test]
    fn reset_rolls_back_open_frames() {
        let mut conn = memory();
        conn.execute("CREATE TABLE t (v INTEGER)").unwrap();
        conn.begin_transaction(TransactionOptions::new()).unwrap();
        conn.begin_transaction(TransactionOptions::new().requires_new(true))
            .unwrap();
        conn.exec_update("INSERT INTO t VALUES (1)", &[]).unwrap();
        assert!(Connection::transaction_open(&conn));

        Connection::reset(&mut conn).unwrap();
        assert!(!Connection::transaction_open(&conn));
        assert_eq!(count(&mut conn, "t"), 0);
    }

    #[test]
    fn disconnect_and_reconnect() {
        let mut conn = memory();
        conn.begin_transaction(TransactionOptions::new()).unwrap();
        conn.disconnect();
        assert!(!conn.is_active());
        assert_eq!(conn.open_transactions(), 0);

        match conn.execute("SELECT 1").unwrap_err() {
            Error::Connection(c) => assert_eq!(c.kind, ConnectionErrorKind::Closed),
            other => panic!("unexpected {other:?}"),
        }

        conn.reconnect().unwrap();
        assert!(conn.is_active());
        Connection::ping(&mut conn).unwrap();
    }

    #[test]
    fn missing_database_is_no_database() {
        let dir = std::env::temp_dir().join("sqlbridge_missing_dir_for_test");
        let _ = std::fs::remove_dir_all(&dir);
        let path = dir.join("nope.db");
        let config = SqliteConfig::file(path.to_string_lossy().to_string())
            .flags(crate::OpenFlags::read_write());
        match SqliteConnection::open(&config).unwrap_err() {
            Error::Connection(c) => assert_eq!(c.kind, ConnectionErrorKind::NoDatabase),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn read_only_connections_reject_writes() {
        let tmp = std::env::temp_dir().join(format!("sqlbridge_ro_{}.db", std::process::id()));
        let _ = std::fs::remove_file(&tmp);
        let path = tmp.to_string_lossy().to_string();

        let writer = SqliteConfig::file(path.clone()).pragma("journal_mode", "DELETE");
        let mut conn = SqliteConnection::open(&writer).unwrap();
        conn.execute("CREATE TABLE test (id INTEGER)").unwrap();
        drop(conn);

        let config = SqliteConfig::file(path).flags(crate::OpenFlags::read_only());
        let mut conn = SqliteConnection::open(&config).unwrap();
        assert_eq!(count(&mut conn, "test"), 0);
        match conn.execute("INSERT INTO test VALUES (1)").unwrap_err() {
            Error::Query(q) => assert_eq!(q.kind, QueryErrorKind::ReadOnly),
            other => panic!("unexpected {other:?}"),
        }

        drop(conn);
        let _ = std::fs::remove_file(&tmp);
    }

    #[test]
    fn quoting_helpers() {
        let conn = memory();
        assert_eq!(conn.quote("O'Reilly", None).unwrap(), "'O''Reilly'");
        let hint = ColumnHint::new("integer");
        assert_eq!(conn.type_cast("12abc", Some(&hint)).unwrap(), Value::Integer(12));
    }
}
