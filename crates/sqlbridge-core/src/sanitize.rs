//! SQL fragment sanitization: LIKE patterns and bind-variable substitution.

use std::collections::HashMap;
use std::sync::OnceLock;

use regex::{Captures, Regex};

use crate::error::{Error, QueryError, QueryErrorKind, Result};
use crate::quoting::{Quotable, quote};
use crate::value::Value;

/// Escape `%` and `_` so `s` matches literally inside a LIKE pattern.
///
/// An escape character already present in the input is doubled first, unless
/// it is itself one of the wildcards.
///
/// ```
/// use sqlbridge_core::sanitize_sql_like;
///
/// assert_eq!(sanitize_sql_like("100%", '\\'), "100\\%");
/// assert_eq!(sanitize_sql_like("100%", '!'), "100!%");
/// assert_eq!(sanitize_sql_like("snake_cased!", '!'), "snake!_cased!!");
/// ```
pub fn sanitize_sql_like(s: &str, escape: char) -> String {
    let double_escape = escape != '%' && escape != '_' && s.contains(escape);
    let mut out = String::with_capacity(s.len() + 4);
    for c in s.chars() {
        if c == '%' || c == '_' {
            out.push(escape);
        } else if double_escape && c == escape {
            out.push(escape);
        }
        out.push(c);
    }
    out
}

/// A condition fragment with its bind values.
#[derive(Debug, Clone, PartialEq)]
pub enum Conditions {
    /// Used as-is.
    Raw(String),
    /// `?` placeholders filled in order.
    Positional(String, Vec<Value>),
    /// `:name` placeholders filled by name. `::` casts and `\:` escapes are
    /// left alone.
    Named(String, HashMap<String, Value>),
}

/// Substitute quoted bind values into a condition fragment.
///
/// Arrays expand to a comma-separated list (`NULL` when empty).
///
/// # Errors
///
/// [`QueryErrorKind::InvalidBinds`] when the number of `?` placeholders does
/// not match the values, or a named placeholder has no value.
pub fn sanitize_sql_for_conditions(conditions: &Conditions) -> Result<String> {
    match conditions {
        Conditions::Raw(sql) => Ok(sql.clone()),
        Conditions::Positional(sql, values) => replace_positional(sql, values),
        Conditions::Named(sql, values) => replace_named(sql, values),
    }
}

fn replace_positional(sql: &str, values: &[Value]) -> Result<String> {
    let placeholders = sql.matches('?').count();
    if placeholders != values.len() {
        return Err(invalid_binds(
            sql,
            format!(
                "wrong number of bind variables ({} for {}) in: {}",
                values.len(),
                placeholders,
                sql
            ),
        ));
    }

    let mut out = String::with_capacity(sql.len() + values.len() * 8);
    let mut values = values.iter();
    for (i, part) in sql.split('?').enumerate() {
        if i > 0 {
            // Counted above, so every `?` has a value.
            if let Some(value) = values.next() {
                out.push_str(&quote_bound_value(value)?);
            }
        }
        out.push_str(part);
    }
    Ok(out)
}

fn named_placeholder() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"([:\\]?):([a-zA-Z]\w*)").expect("named placeholder pattern is valid")
    })
}

fn replace_named(sql: &str, values: &HashMap<String, Value>) -> Result<String> {
    let mut failure = None;
    let replaced = named_placeholder().replace_all(sql, |caps: &Captures<'_>| {
        let prefix = &caps[1];
        let name = &caps[2];
        if prefix == ":" {
            return caps[0].to_string();
        }
        if prefix == "\\" {
            return format!(":{}", name);
        }
        match values.get(name).map(quote_bound_value) {
            Some(Ok(quoted)) => quoted,
            Some(Err(e)) => {
                failure.get_or_insert(e);
                String::new()
            }
            None => {
                failure.get_or_insert_with(|| {
                    invalid_binds(sql, format!("missing value for :{} in {}", name, sql))
                });
                String::new()
            }
        }
    });
    match failure {
        Some(e) => Err(e),
        None => Ok(replaced.into_owned()),
    }
}

fn quote_bound_value(value: &Value) -> Result<String> {
    match value {
        Value::Array(items) if items.is_empty() => Ok("NULL".to_string()),
        Value::Array(items) => {
            let quoted = items
                .iter()
                .map(|item| quote(&Quotable::Value(item.clone()), None))
                .collect::<Result<Vec<_>>>()?;
            Ok(quoted.join(","))
        }
        other => quote(&Quotable::Value(other.clone()), None),
    }
}

fn invalid_binds(sql: &str, message: String) -> Error {
    Error::Query(QueryError {
        kind: QueryErrorKind::InvalidBinds,
        sql: Some(sql.to_string()),
        code: None,
        message,
        source: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_like_default_escape() {
        assert_eq!(sanitize_sql_like("100%", '\\'), "100\\%");
        assert_eq!(sanitize_sql_like("a_b\\c", '\\'), "a\\_b\\\\c");
    }

    #[test]
    fn test_like_custom_escape() {
        assert_eq!(sanitize_sql_like("100%", '!'), "100!%");
        assert_eq!(sanitize_sql_like("hi!", '!'), "hi!!");
    }

    #[test]
    fn test_like_wildcard_as_escape_is_not_doubled() {
        assert_eq!(sanitize_sql_like("5%_", '%'), "5%%%_");
    }

    #[test]
    fn test_like_is_not_idempotent() {
        let once = sanitize_sql_like("100%", '\\');
        assert_eq!(sanitize_sql_like(&once, '\\'), "100\\\\\\%");
    }

    #[test]
    fn test_positional_binds() {
        let conditions = Conditions::Positional(
            "name = ? AND id IN (?)".into(),
            vec![Value::from("O'Neil"), Value::array([1i64, 2, 3])],
        );
        assert_eq!(
            sanitize_sql_for_conditions(&conditions).unwrap(),
            "name = 'O''Neil' AND id IN (1,2,3)"
        );
    }

    #[test]
    fn test_empty_array_becomes_null() {
        let conditions = Conditions::Positional("id IN (?)".into(), vec![Value::Array(vec![])]);
        assert_eq!(sanitize_sql_for_conditions(&conditions).unwrap(), "id IN (NULL)");
    }

    #[test]
    fn test_positional_arity_mismatch() {
        let conditions = Conditions::Positional("a = ? AND b = ?".into(), vec![Value::Integer(1)]);
        match sanitize_sql_for_conditions(&conditions) {
            Err(Error::Query(q)) => {
                assert_eq!(q.kind, QueryErrorKind::InvalidBinds);
                assert!(q.message.contains("(1 for 2)"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_named_binds_skip_casts_and_escapes() {
        let mut values = HashMap::new();
        values.insert("name".to_string(), Value::from("bob"));
        values.insert("age".to_string(), Value::Integer(30));
        let conditions = Conditions::Named(
            r"name = :name AND age > :age AND created::date = '2024-01-01' AND note = '\:literal'".into(),
            values,
        );
        assert_eq!(
            sanitize_sql_for_conditions(&conditions).unwrap(),
            "name = 'bob' AND age > 30 AND created::date = '2024-01-01' AND note = ':literal'"
        );
    }

    #[test]
    fn test_named_missing_value() {
        let conditions = Conditions::Named("id = :id".into(), HashMap::new());
        let err = sanitize_sql_for_conditions(&conditions).unwrap_err();
        assert!(err.to_string().contains("missing value for :id"));
    }

    #[test]
    fn test_raw_is_untouched() {
        let conditions = Conditions::Raw("deleted_at IS NULL".into());
        assert_eq!(sanitize_sql_for_conditions(&conditions).unwrap(), "deleted_at IS NULL");
    }
}
