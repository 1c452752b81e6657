//! Value quoting and bind casting.
//!
//! Two contexts turn a host value into something the engine understands:
//!
//! - [`quote`] renders a SQL literal for inlining into statement text.
//! - [`type_cast`] produces the [`Value`] that is bound to a placeholder.
//!
//! Both accept an optional [`ColumnHint`] carrying the declared type of the
//! destination column, which selects numeric coercion for strings and the
//! integer representation of booleans.

use crate::error::{Error, Result, TypeError};
use crate::value::{Value, format_date, format_time, format_timestamp};
use std::fmt::Write;

/// Input to the quoting engine.
#[derive(Debug, Clone, PartialEq)]
pub enum Quotable {
    /// Pre-rendered SQL emitted verbatim (an identity expression the caller
    /// already quoted, such as a subquery or column reference).
    Literal(String),
    /// A value that goes through casting.
    Value(Value),
}

impl Quotable {
    pub fn literal(sql: impl Into<String>) -> Self {
        Quotable::Literal(sql.into())
    }
}

macro_rules! quotable_from {
    ($($ty:ty),* $(,)?) => {
        $(
            impl From<$ty> for Quotable {
                fn from(value: $ty) -> Self {
                    Quotable::Value(value.into())
                }
            }
        )*
    };
}

quotable_from!(Value, bool, i32, i64, f64, String, &str, Vec<u8>, serde_json::Value);

/// Coercion family derived from a declared column type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CastType {
    Integer,
    Float,
    Decimal,
    Boolean,
    Text,
    Other,
}

/// Destination column information used to pick a coercion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnHint {
    sql_type: String,
}

impl ColumnHint {
    pub fn new(sql_type: impl Into<String>) -> Self {
        Self {
            sql_type: sql_type.into(),
        }
    }

    pub fn sql_type(&self) -> &str {
        &self.sql_type
    }

    /// Classify the declared type the way the engine assigns affinity,
    /// with booleans and decimals split out.
    pub fn cast_type(&self) -> CastType {
        let upper = self.sql_type.to_ascii_uppercase();
        if upper.starts_with("BOOL") {
            CastType::Boolean
        } else if upper.contains("INT") {
            CastType::Integer
        } else if upper.contains("REAL") || upper.contains("FLOA") || upper.contains("DOUB") {
            CastType::Float
        } else if upper.contains("DEC") || upper.contains("NUMERIC") {
            CastType::Decimal
        } else if upper.contains("CHAR") || upper.contains("CLOB") || upper.contains("TEXT") {
            CastType::Text
        } else {
            CastType::Other
        }
    }

    /// Booleans are stored as 1/0 for integer-like columns.
    pub fn is_integer_like(&self) -> bool {
        matches!(self.cast_type(), CastType::Integer | CastType::Boolean)
    }
}

/// Render a SQL literal.
///
/// # Errors
///
/// Returns [`Error::Type`] for arrays and `DEFAULT`, which have no literal
/// form in this position.
pub fn quote(value: &Quotable, hint: Option<&ColumnHint>) -> Result<String> {
    let value = match value {
        Quotable::Literal(sql) => return Ok(sql.clone()),
        Quotable::Value(v) => v,
    };

    let sql = match value {
        Value::Null => "NULL".to_string(),
        Value::Bool(b) => {
            if hint.is_some_and(ColumnHint::is_integer_like) {
                (if *b { "1" } else { "0" }).to_string()
            } else if *b {
                "'t'".to_string()
            } else {
                "'f'".to_string()
            }
        }
        Value::Integer(v) => v.to_string(),
        Value::Float(v) => quote_float(*v),
        Value::Decimal(s) => {
            let prefix = numeric_prefix(s);
            if !prefix.is_empty() && prefix.len() == s.trim().len() {
                prefix.to_string()
            } else {
                quote_string(s)
            }
        }
        Value::Text(s) => match hint.map(ColumnHint::cast_type) {
            Some(CastType::Integer) => lenient_i64(s).to_string(),
            Some(CastType::Float) => quote_float(lenient_f64(s)),
            Some(CastType::Decimal) => lenient_decimal(s),
            _ => quote_string(s),
        },
        Value::Blob(bytes) => {
            let mut out = String::with_capacity(bytes.len() * 2 + 3);
            out.push_str("x'");
            for byte in bytes {
                let _ = write!(out, "{:02x}", byte);
            }
            out.push('\'');
            out
        }
        Value::Date(days) => quote_string(&format_date(*days)),
        Value::Time(micros) => quote_string(&format_time(*micros)),
        Value::Timestamp(micros) => quote_string(&format_timestamp(*micros)),
        Value::Json(json) => quote_string(&json.to_string()),
        Value::Array(_) | Value::Default => return Err(uncastable(value)),
    };
    Ok(sql)
}

/// Produce the value bound to a placeholder.
///
/// A [`Quotable::Literal`] is bound as its text.
///
/// # Errors
///
/// Returns [`Error::Type`] for arrays and `DEFAULT`.
pub fn type_cast(value: &Quotable, hint: Option<&ColumnHint>) -> Result<Value> {
    let value = match value {
        Quotable::Literal(sql) => return Ok(Value::Text(sql.clone())),
        Quotable::Value(v) => v,
    };

    let cast = match value {
        Value::Null => Value::Null,
        Value::Bool(b) => {
            if hint.is_some_and(ColumnHint::is_integer_like) {
                Value::Integer(i64::from(*b))
            } else {
                Value::Text(if *b { "t" } else { "f" }.to_string())
            }
        }
        Value::Text(s) => match hint.map(ColumnHint::cast_type) {
            Some(CastType::Integer) => Value::Integer(lenient_i64(s)),
            Some(CastType::Float) => Value::Float(lenient_f64(s)),
            Some(CastType::Decimal) => Value::Decimal(lenient_decimal(s)),
            _ => Value::Text(s.clone()),
        },
        Value::Integer(_) | Value::Float(_) | Value::Decimal(_) | Value::Blob(_) => value.clone(),
        Value::Date(days) => Value::Text(format_date(*days)),
        Value::Time(micros) => Value::Text(format_time(*micros)),
        Value::Timestamp(micros) => Value::Text(format_timestamp(*micros)),
        Value::Json(json) => Value::Text(json.to_string()),
        Value::Array(_) | Value::Default => return Err(uncastable(value)),
    };
    Ok(cast)
}

/// Quote a string literal, doubling embedded single quotes.
pub fn quote_string(s: &str) -> String {
    format!("'{}'", s.replace('\'', "''"))
}

/// Quote a column name, doubling embedded double quotes.
///
/// ```
/// use sqlbridge_core::quote_column_name;
///
/// assert_eq!(quote_column_name("order"), "\"order\"");
/// assert_eq!(quote_column_name("a\"b"), "\"a\"\"b\"");
/// ```
pub fn quote_column_name(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Quote a possibly schema-qualified table name (`main.users`).
pub fn quote_table_name(name: &str) -> String {
    name.split('.')
        .map(quote_column_name)
        .collect::<Vec<_>>()
        .join(".")
}

fn quote_float(v: f64) -> String {
    if v.is_nan() {
        "'NaN'".to_string()
    } else if v.is_infinite() {
        (if v > 0.0 { "'Infinity'" } else { "'-Infinity'" }).to_string()
    } else {
        // Debug keeps a fractional part (`1.0`) so the literal stays REAL.
        format!("{:?}", v)
    }
}

fn uncastable(value: &Value) -> Error {
    Error::Type(TypeError {
        expected: "a scalar SQL value",
        actual: value.type_name().to_string(),
        column: None,
    })
}

// Longest leading `[+-]digits[.digits][e[+-]digits]` run after whitespace.
fn numeric_prefix(s: &str) -> &str {
    let trimmed = s.trim_start();
    let bytes = trimmed.as_bytes();
    let mut end = 0;
    if matches!(bytes.first(), Some(b'+' | b'-')) {
        end = 1;
    }
    let int_start = end;
    while bytes.get(end).is_some_and(u8::is_ascii_digit) {
        end += 1;
    }
    let mut digits = end - int_start;
    if bytes.get(end) == Some(&b'.') {
        let mut frac = end + 1;
        while bytes.get(frac).is_some_and(u8::is_ascii_digit) {
            frac += 1;
        }
        if frac - end - 1 > 0 {
            digits += frac - end - 1;
            end = frac;
        }
    }
    if digits == 0 {
        return "";
    }
    if matches!(bytes.get(end), Some(b'e' | b'E')) {
        let mut exp = end + 1;
        if matches!(bytes.get(exp), Some(b'+' | b'-')) {
            exp += 1;
        }
        let exp_digits = exp;
        while bytes.get(exp).is_some_and(u8::is_ascii_digit) {
            exp += 1;
        }
        if exp > exp_digits {
            end = exp;
        }
    }
    &trimmed[..end]
}

/// Parse a leading integer, ignoring trailing garbage.
///
/// Malformed input yields `0`; out-of-range input saturates.
pub fn lenient_i64(s: &str) -> i64 {
    let trimmed = s.trim_start();
    let bytes = trimmed.as_bytes();
    let (negative, start) = match bytes.first() {
        Some(b'-') => (true, 1),
        Some(b'+') => (false, 1),
        _ => (false, 0),
    };
    let mut value: i64 = 0;
    for byte in bytes[start..].iter().take_while(|b| b.is_ascii_digit()) {
        let digit = i64::from(byte - b'0');
        value = value
            .checked_mul(10)
            .and_then(|v| {
                if negative {
                    v.checked_sub(digit)
                } else {
                    v.checked_add(digit)
                }
            })
            .unwrap_or(if negative { i64::MIN } else { i64::MAX });
    }
    value
}

/// Parse a leading float, ignoring trailing garbage. Malformed input yields `0.0`.
pub fn lenient_f64(s: &str) -> f64 {
    numeric_prefix(s).parse().unwrap_or(0.0)
}

fn lenient_decimal(s: &str) -> String {
    let prefix = numeric_prefix(s);
    if prefix.is_empty() {
        "0".to_string()
    } else {
        prefix.trim_start_matches('+').to_string()
    }
}
