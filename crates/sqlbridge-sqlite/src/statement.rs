//! Prepared statement handles.

use std::ffi::{c_char, c_int};
use std::ptr::{self, NonNull};
use std::sync::Arc;

use sqlbridge_core::row::ColumnInfo;
use sqlbridge_core::{Error, QueryError, QueryErrorKind, Result, Row, RowSet, Value, guard};

use crate::ffi;
use crate::types;

/// A compiled statement, finalized on drop.
///
/// The SQL text must hold exactly one statement; trailing whitespace,
/// comments and `;` are allowed.
#[derive(Debug)]
pub struct SqliteStatement {
    raw: NonNull<ffi::sqlite3_stmt>,
    db: *mut ffi::sqlite3,
    sql: String,
    parameter_count: usize,
}

impl SqliteStatement {
    pub(crate) fn prepare(db: *mut ffi::sqlite3, sql: &str) -> Result<Self> {
        let len = c_int::try_from(sql.len()).map_err(|_| {
            query_error(QueryErrorKind::DataTruncation, sql, None, "SQL text is too long".to_string())
        })?;
        let mut stmt: *mut ffi::sqlite3_stmt = ptr::null_mut();
        let mut tail: *const c_char = ptr::null();

        // SAFETY: db is a valid open handle; sql points to len readable bytes
        // (no NUL terminator needed when the length is given)
        let rc = unsafe {
            ffi::sqlite3_prepare_v2(db, sql.as_ptr().cast(), len, &mut stmt, &mut tail)
        };
        if rc != ffi::SQLITE_OK {
            // SAFETY: db is valid
            let (code, message) = unsafe { ffi::last_error(db) };
            return Err(engine_error(code, sql, message));
        }

        let Some(raw) = NonNull::new(stmt) else {
            return Err(query_error(
                QueryErrorKind::Misuse,
                sql,
                None,
                "no statement to execute".to_string(),
            ));
        };
        // Finalizes the handle if the trailing text is rejected below.
        let mut statement = Self {
            raw,
            db,
            sql: sql.to_string(),
            parameter_count: 0,
        };

        let consumed = if tail.is_null() {
            sql.len()
        } else {
            (tail as usize).saturating_sub(sql.as_ptr() as usize)
        };
        let rest = sql.get(consumed..).unwrap_or_default();
        if !guard::split_statements(rest).is_empty() {
            return Err(query_error(
                QueryErrorKind::Misuse,
                sql,
                None,
                "cannot run more than one statement at a time; use execute_batch".to_string(),
            ));
        }

        // SAFETY: raw is a freshly prepared statement
        let count = unsafe { ffi::sqlite3_bind_parameter_count(raw.as_ptr()) };
        statement.parameter_count = usize::try_from(count).unwrap_or(0);
        Ok(statement)
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn parameter_count(&self) -> usize {
        self.parameter_count
    }

    /// Replace all bindings.
    pub(crate) fn bind(&mut self, binds: &[Value]) -> Result<()> {
        if binds.len() != self.parameter_count {
            return Err(query_error(
                QueryErrorKind::InvalidBinds,
                &self.sql,
                None,
                format!(
                    "wrong number of bind variables ({} for {})",
                    binds.len(),
                    self.parameter_count
                ),
            ));
        }

        self.reset();
        // SAFETY: raw is valid for the lifetime of self
        unsafe { ffi::sqlite3_clear_bindings(self.raw.as_ptr()) };

        for (i, value) in binds.iter().enumerate() {
            let index = c_int::try_from(i + 1).unwrap_or(c_int::MAX);
            // SAFETY: raw is valid and index is within 1..=parameter_count
            let rc = unsafe { types::bind_value(self.raw.as_ptr(), index, value) };
            if rc != ffi::SQLITE_OK {
                let kind = if rc == ffi::SQLITE_MISMATCH {
                    QueryErrorKind::InvalidBinds
                } else {
                    error_kind(rc, "")
                };
                return Err(query_error(
                    kind,
                    &self.sql,
                    Some(rc),
                    format!(
                        "failed to bind parameter {} ({}): {}",
                        i + 1,
                        value.type_name(),
                        ffi::error_string(rc)
                    ),
                ));
            }
        }
        Ok(())
    }

    /// Step to completion, collecting every row.
    pub(crate) fn query(&mut self) -> Result<RowSet> {
        let stmt = self.raw.as_ptr();
        let mut columns: Option<Arc<ColumnInfo>> = None;
        let mut rows = Vec::new();

        loop {
            // SAFETY: stmt is valid and bound
            let rc = unsafe { ffi::sqlite3_step(stmt) };
            // Names are read after the first step: a schema change can
            // recompile the statement with a different shape.
            let info = columns.get_or_insert_with(|| Arc::new(self.column_info()));
            match rc {
                ffi::SQLITE_ROW => {
                    let values = (0..info.len())
                        .map(|i| {
                            let index = c_int::try_from(i).unwrap_or(c_int::MAX);
                            // SAFETY: step just returned SQLITE_ROW and index
                            // is below the column count
                            unsafe { types::read_column(stmt, index) }
                        })
                        .collect();
                    rows.push(Row::with_columns(Arc::clone(info), values));
                }
                ffi::SQLITE_DONE => break,
                _ => {
                    // SAFETY: db is the statement's connection
                    let (code, message) = unsafe { ffi::last_error(self.db) };
                    self.reset();
                    return Err(engine_error(code, &self.sql, message));
                }
            }
        }

        self.reset();
        Ok(RowSet::new(columns.unwrap_or_default(), rows))
    }

    pub(crate) fn reset(&mut self) {
        // SAFETY: raw is valid; the return code repeats the last step error,
        // which has already been reported
        unsafe { ffi::sqlite3_reset(self.raw.as_ptr()) };
    }

    fn column_info(&self) -> ColumnInfo {
        let stmt = self.raw.as_ptr();
        // SAFETY: stmt is valid
        let count = unsafe { ffi::sqlite3_column_count(stmt) };
        let names = (0..count)
            .map(|i| {
                // SAFETY: i is below the column count
                unsafe { types::column_name(stmt, i) }.unwrap_or_else(|| format!("col{}", i))
            })
            .collect();
        ColumnInfo::new(names)
    }
}

impl Drop for SqliteStatement {
    fn drop(&mut self) {
        // SAFETY: raw was produced by sqlite3_prepare_v2 and is finalized once
        unsafe { ffi::sqlite3_finalize(self.raw.as_ptr()) };
    }
}

/// Map a primary result code (and message, for the catch-all
/// `SQLITE_ERROR`) to an error kind.
pub(crate) fn error_kind(code: c_int, message: &str) -> QueryErrorKind {
    match ffi::primary_code(code) {
        ffi::SQLITE_CONSTRAINT => QueryErrorKind::Constraint,
        ffi::SQLITE_BUSY | ffi::SQLITE_LOCKED => QueryErrorKind::Busy,
        ffi::SQLITE_PERM | ffi::SQLITE_AUTH => QueryErrorKind::Permission,
        ffi::SQLITE_READONLY => QueryErrorKind::ReadOnly,
        ffi::SQLITE_NOTFOUND => QueryErrorKind::NotFound,
        ffi::SQLITE_TOOBIG => QueryErrorKind::DataTruncation,
        ffi::SQLITE_INTERRUPT => QueryErrorKind::Cancelled,
        ffi::SQLITE_MISUSE => QueryErrorKind::Misuse,
        ffi::SQLITE_RANGE => QueryErrorKind::InvalidBinds,
        ffi::SQLITE_ERROR if message.contains("syntax error") => QueryErrorKind::Syntax,
        ffi::SQLITE_ERROR if message.starts_with("no such") => QueryErrorKind::NotFound,
        _ => QueryErrorKind::Database,
    }
}

pub(crate) fn engine_error(code: c_int, sql: &str, message: String) -> Error {
    query_error(error_kind(code, &message), sql, Some(code), message)
}

fn query_error(kind: QueryErrorKind, sql: &str, code: Option<c_int>, message: String) -> Error {
    Error::Query(QueryError {
        kind,
        sql: Some(sql.to_string()),
        code,
        message,
        source: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_kinds() {
        assert_eq!(error_kind(2067, ""), QueryErrorKind::Constraint);
        assert_eq!(error_kind(ffi::SQLITE_BUSY, ""), QueryErrorKind::Busy);
        assert_eq!(
            error_kind(ffi::SQLITE_ERROR, "near \"SELEC\": syntax error"),
            QueryErrorKind::Syntax
        );
        assert_eq!(
            error_kind(ffi::SQLITE_ERROR, "no such table: ghosts"),
            QueryErrorKind::NotFound
        );
        assert_eq!(error_kind(ffi::SQLITE_ERROR, "boom"), QueryErrorKind::Database);
    }
}
