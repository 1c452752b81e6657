//! Moving values across the FFI boundary.
//!
//! SQLite has five storage classes (INTEGER, REAL, TEXT, BLOB, NULL). Binds
//! arrive already type-cast by the quoting engine, so host-side variants
//! (dates, JSON) are rare here but still bound as their text form. Text is
//! bound and read as UTF-8 without transcoding; blobs byte-for-byte.

use std::ffi::{CStr, c_int};

use sqlbridge_core::Value;
use sqlbridge_core::value::{format_date, format_time, format_timestamp};

use crate::ffi;

/// Bind a Value to a prepared statement parameter.
///
/// Returns the SQLite result code. Arrays and `DEFAULT` cannot be bound and
/// yield `SQLITE_MISMATCH`; payloads longer than `c_int::MAX` bytes yield
/// `SQLITE_TOOBIG`.
///
/// # Safety
/// - `stmt` must be a valid, non-null prepared statement handle
/// - `index` must be a valid 1-based parameter index
pub unsafe fn bind_value(stmt: *mut ffi::sqlite3_stmt, index: c_int, value: &Value) -> c_int {
    // SAFETY: caller guarantees stmt and index; text and blob payloads are
    // copied by SQLite (SQLITE_TRANSIENT) before the borrow ends
    unsafe {
        match value {
            Value::Null => ffi::sqlite3_bind_null(stmt, index),
            Value::Bool(b) => ffi::sqlite3_bind_int64(stmt, index, i64::from(*b)),
            Value::Integer(v) => ffi::sqlite3_bind_int64(stmt, index, *v),
            Value::Float(v) => ffi::sqlite3_bind_double(stmt, index, *v),
            Value::Decimal(s) | Value::Text(s) => bind_text(stmt, index, s),
            Value::Blob(bytes) => {
                let Ok(len) = c_int::try_from(bytes.len()) else {
                    return ffi::SQLITE_TOOBIG;
                };
                ffi::sqlite3_bind_blob(
                    stmt,
                    index,
                    bytes.as_ptr().cast(),
                    len,
                    ffi::SQLITE_TRANSIENT(),
                )
            }
            Value::Date(days) => bind_text(stmt, index, &format_date(*days)),
            Value::Time(micros) => bind_text(stmt, index, &format_time(*micros)),
            Value::Timestamp(micros) => bind_text(stmt, index, &format_timestamp(*micros)),
            Value::Json(json) => bind_text(stmt, index, &json.to_string()),
            Value::Array(_) | Value::Default => ffi::SQLITE_MISMATCH,
        }
    }
}

unsafe fn bind_text(stmt: *mut ffi::sqlite3_stmt, index: c_int, s: &str) -> c_int {
    let Ok(len) = c_int::try_from(s.len()) else {
        return ffi::SQLITE_TOOBIG;
    };
    // SAFETY: caller guarantees stmt; the bytes are copied before returning
    unsafe { ffi::sqlite3_bind_text(stmt, index, s.as_ptr().cast(), len, ffi::SQLITE_TRANSIENT()) }
}

/// Read a column value from a result row.
///
/// # Safety
/// - `stmt` must be a valid prepared statement that has just returned SQLITE_ROW
/// - `index` must be a valid 0-based column index
pub unsafe fn read_column(stmt: *mut ffi::sqlite3_stmt, index: c_int) -> Value {
    // SAFETY: caller guarantees a current row; pointers returned by
    // column_text/column_blob stay valid until the next step or reset and
    // are copied out immediately
    unsafe {
        match ffi::sqlite3_column_type(stmt, index) {
            ffi::SQLITE_INTEGER => Value::Integer(ffi::sqlite3_column_int64(stmt, index)),
            ffi::SQLITE_FLOAT => Value::Float(ffi::sqlite3_column_double(stmt, index)),
            ffi::SQLITE_TEXT => {
                let ptr = ffi::sqlite3_column_text(stmt, index);
                let len = usize::try_from(ffi::sqlite3_column_bytes(stmt, index)).unwrap_or(0);
                if ptr.is_null() {
                    Value::Text(String::new())
                } else {
                    let bytes = std::slice::from_raw_parts(ptr.cast::<u8>(), len);
                    Value::Text(String::from_utf8_lossy(bytes).into_owned())
                }
            }
            ffi::SQLITE_BLOB => {
                let ptr = ffi::sqlite3_column_blob(stmt, index);
                let len = usize::try_from(ffi::sqlite3_column_bytes(stmt, index)).unwrap_or(0);
                if ptr.is_null() || len == 0 {
                    Value::Blob(Vec::new())
                } else {
                    Value::Blob(std::slice::from_raw_parts(ptr.cast::<u8>(), len).to_vec())
                }
            }
            _ => Value::Null,
        }
    }
}

/// Get the column name from a result.
///
/// # Safety
/// - `stmt` must be a valid prepared statement
/// - `index` must be a valid 0-based column index
pub unsafe fn column_name(stmt: *mut ffi::sqlite3_stmt, index: c_int) -> Option<String> {
    // SAFETY: caller guarantees stmt and index
    unsafe {
        let ptr = ffi::sqlite3_column_name(stmt, index);
        if ptr.is_null() {
            None
        } else {
            Some(CStr::from_ptr(ptr).to_string_lossy().into_owned())
        }
    }
}
