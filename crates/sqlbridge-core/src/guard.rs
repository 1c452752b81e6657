//! Write and access prevention.
//!
//! Two thread-local switches gate user statements before they reach the
//! engine:
//!
//! - *prevent writes* rejects statements whose leading verb modifies data or
//!   schema ([`PreventedKind::Write`]).
//! - *prevent access* rejects every statement ([`PreventedKind::Access`]).
//!
//! Scopes nest: each [`PreventWrites`] / [`PreventAccess`] guard remembers
//! the state it replaced and restores it when dropped, including during
//! unwinding. The state belongs to the current thread only.

use std::cell::Cell;
use std::marker::PhantomData;

use crate::error::{Error, PreventedError, PreventedKind, Result};

thread_local! {
    static PREVENT_WRITES: Cell<bool> = const { Cell::new(false) };
    static PREVENT_ACCESS: Cell<bool> = const { Cell::new(false) };
}

const WRITE_VERBS: &[&str] = &[
    "INSERT", "UPDATE", "DELETE", "REPLACE", "UPSERT", "CREATE", "DROP", "ALTER", "TRUNCATE",
    "VACUUM", "REINDEX", "ANALYZE", "ATTACH", "DETACH",
];

/// Coarse classification of a statement by its leading keyword.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryKind {
    Read,
    Write,
}

/// Classify `sql` by its first keyword after whitespace, opening
/// parentheses and comments.
pub fn classify(sql: &str) -> QueryKind {
    let keyword = leading_keyword(sql);
    if WRITE_VERBS
        .iter()
        .any(|verb| verb.eq_ignore_ascii_case(keyword))
    {
        QueryKind::Write
    } else {
        QueryKind::Read
    }
}

fn leading_keyword(sql: &str) -> &str {
    let rest = skip_trivia(sql, |c| c.is_whitespace() || c == '(');
    let end = rest
        .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
        .unwrap_or(rest.len());
    &rest[..end]
}

// Strips leading comments and any characters matched by `skip`.
fn skip_trivia(sql: &str, skip: impl Fn(char) -> bool) -> &str {
    let mut rest = sql;
    loop {
        rest = rest.trim_start_matches(&skip);
        if let Some(body) = rest.strip_prefix("/*") {
            rest = body.find("*/").map_or("", |end| &body[end + 2..]);
        } else if let Some(body) = rest.strip_prefix("--") {
            rest = body.find('\n').map_or("", |end| &body[end + 1..]);
        } else {
            return rest;
        }
    }
}

/// Split `sql` on `;` outside string literals, quoted identifiers and
/// comments. Fragments holding only whitespace and comments are dropped.
///
/// The split is lexical: a `CREATE TRIGGER` body comes back as several
/// fragments, the first of which still classifies as a write.
pub fn split_statements(sql: &str) -> Vec<&str> {
    let bytes = sql.as_bytes();
    let mut fragments = Vec::new();
    let mut start = 0;
    let mut i = 0;
    while i < bytes.len() {
        i = match bytes[i] {
            quote @ (b'\'' | b'"' | b'`') => skip_quoted(bytes, i + 1, quote),
            b'[' => find_from(bytes, i + 1, b"]").map_or(bytes.len(), |end| end + 1),
            b'-' if bytes.get(i + 1) == Some(&b'-') => {
                find_from(bytes, i + 2, b"\n").map_or(bytes.len(), |end| end + 1)
            }
            b'/' if bytes.get(i + 1) == Some(&b'*') => {
                find_from(bytes, i + 2, b"*/").map_or(bytes.len(), |end| end + 2)
            }
            b';' => {
                fragments.push(&sql[start..i]);
                start = i + 1;
                i + 1
            }
            _ => i + 1,
        };
    }
    fragments.push(&sql[start..]);
    fragments
        .into_iter()
        .map(str::trim)
        .filter(|fragment| !skip_trivia(fragment, char::is_whitespace).is_empty())
        .collect()
}

// Index just past the closing quote; a doubled quote is an escape.
fn skip_quoted(bytes: &[u8], mut i: usize, quote: u8) -> usize {
    while i < bytes.len() {
        if bytes[i] == quote {
            if bytes.get(i + 1) == Some(&quote) {
                i += 2;
                continue;
            }
            return i + 1;
        }
        i += 1;
    }
    bytes.len()
}

fn find_from(bytes: &[u8], from: usize, needle: &[u8]) -> Option<usize> {
    bytes
        .get(from..)?
        .windows(needle.len())
        .position(|w| w == needle)
        .map(|pos| from + pos)
}

/// Whether writes are currently prevented on this thread.
pub fn preventing_writes() -> bool {
    PREVENT_WRITES.with(Cell::get)
}

/// Whether all access is currently prevented on this thread.
pub fn preventing_access() -> bool {
    PREVENT_ACCESS.with(Cell::get)
}

/// Reject `sql` if the current thread's policy forbids it.
///
/// # Errors
///
/// [`Error::Prevented`] with [`PreventedKind::Access`] when access is
/// prevented, or [`PreventedKind::Write`] for a write while writes are
/// prevented.
pub fn check(sql: &str) -> Result<()> {
    if preventing_access() {
        return Err(prevented(PreventedKind::Access, sql));
    }
    if preventing_writes() && classify(sql) == QueryKind::Write {
        return Err(prevented(PreventedKind::Write, sql));
    }
    Ok(())
}

/// Like [`check`], but applied to every statement of a `;`-separated batch
/// so a write anywhere in the batch is rejected before any of it runs.
///
/// # Errors
///
/// [`Error::Prevented`] naming the first offending statement.
pub fn check_batch(sql: &str) -> Result<()> {
    if preventing_access() {
        return Err(prevented(PreventedKind::Access, sql));
    }
    split_statements(sql).into_iter().try_for_each(check)
}

fn prevented(kind: PreventedKind, sql: &str) -> Error {
    tracing::debug!(?kind, sql = %sql, "statement rejected by guard");
    Error::Prevented(PreventedError {
        kind,
        sql: sql.to_string(),
    })
}

/// Scope that sets the prevent-writes switch until dropped.
#[must_use = "the previous state is restored when the guard is dropped"]
#[derive(Debug)]
pub struct PreventWrites {
    previous: bool,
    _thread_bound: PhantomData<*const ()>,
}

impl PreventWrites {
    pub fn enter(enabled: bool) -> Self {
        let previous = PREVENT_WRITES.with(|cell| cell.replace(enabled));
        Self {
            previous,
            _thread_bound: PhantomData,
        }
    }
}

impl Drop for PreventWrites {
    fn drop(&mut self) {
        PREVENT_WRITES.with(|cell| cell.set(self.previous));
    }
}

/// Scope that sets the prevent-access switch until dropped.
#[must_use = "the previous state is restored when the guard is dropped"]
#[derive(Debug)]
pub struct PreventAccess {
    previous: bool,
    _thread_bound: PhantomData<*const ()>,
}

impl PreventAccess {
    pub fn enter(enabled: bool) -> Self {
        let previous = PREVENT_ACCESS.with(|cell| cell.replace(enabled));
        Self {
            previous,
            _thread_bound: PhantomData,
        }
    }
}

impl Drop for PreventAccess {
    fn drop(&mut self) {
        PREVENT_ACCESS.with(|cell| cell.set(self.previous));
    }
}

/// Run `f` with writes prevented (or explicitly allowed when `enabled` is
/// false) on this thread.
pub fn while_preventing_writes<T>(enabled: bool, f: impl FnOnce() -> T) -> T {
    let _scope = PreventWrites::enter(enabled);
    f()
}

/// Run `f` with all statements rejected (or explicitly allowed when
/// `enabled` is false) on this thread.
pub fn while_preventing_access<T>(enabled: bool, f: impl FnOnce() -> T) -> T {
    let _scope = PreventAccess::enter(enabled);
    f()
}
