//! Comment annotation for outgoing SQL.

use std::sync::OnceLock;

use regex::Regex;

fn comment_delimiters() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"\A\s*/\*\+?\s?|\s?\*/\s*\z").expect("comment delimiter pattern is valid")
    })
}

/// Make `note` safe to place between `/*` and `*/`.
///
/// Surrounding comment delimiters (with one optional space) are removed and
/// inner delimiters are broken apart, so the note can never close the
/// comment early.
///
/// ```
/// use sqlbridge_core::sanitize_comment;
///
/// assert_eq!(sanitize_comment("/* job:42 */"), "job:42");
/// assert_eq!(sanitize_comment("x */ DROP TABLE users; /*"), "x * / DROP TABLE users; / *");
/// ```
pub fn sanitize_comment(note: &str) -> String {
    let stripped = comment_delimiters().replace_all(note, "");
    stripped.replace("*/", "* /").replace("/*", "/ *")
}

/// Append one `/* note */` comment per note, in order.
///
/// Comments go at the end of the statement, before a trailing `;`. Notes that
/// are empty after sanitization are skipped.
pub fn annotate<S: AsRef<str>>(sql: &str, notes: &[S]) -> String {
    let comments: Vec<String> = notes
        .iter()
        .map(|note| sanitize_comment(note.as_ref()))
        .filter(|note| !note.trim().is_empty())
        .collect();
    if comments.is_empty() {
        return sql.to_string();
    }

    let trimmed = sql.trim_end();
    let (body, terminator) = match trimmed.strip_suffix(';') {
        Some(body) => (body.trim_end(), ";"),
        None => (trimmed, ""),
    };

    let mut out = String::with_capacity(sql.len() + comments.iter().map(|c| c.len() + 6).sum::<usize>());
    out.push_str(body);
    for comment in &comments {
        out.push_str(" /* ");
        out.push_str(comment);
        out.push_str(" */");
    }
    out.push_str(terminator);
    out
}
