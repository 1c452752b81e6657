//! Interpretation of `dflt_value` as reported by `PRAGMA table_xinfo`.

use std::sync::OnceLock;

use regex::Regex;
use sqlbridge_core::Value;

struct DefaultPatterns {
    null: Regex,
    single_quoted: Regex,
    double_quoted: Regex,
    numeric: Regex,
    blob: Regex,
    function: Regex,
}

fn patterns() -> &'static DefaultPatterns {
    static PATTERNS: OnceLock<DefaultPatterns> = OnceLock::new();
    PATTERNS.get_or_init(|| DefaultPatterns {
        null: Regex::new(r"(?i)\Anull\z").expect("valid pattern"),
        single_quoted: Regex::new(r"(?s)\A'([^|]*)'\z").expect("valid pattern"),
        double_quoted: Regex::new(r#"(?s)\A"([^|]*)"\z"#).expect("valid pattern"),
        numeric: Regex::new(r"\A-?\d+(\.\d*)?\z").expect("valid pattern"),
        blob: Regex::new(r"(?i)\Ax'([0-9a-f]*)'\z").expect("valid pattern"),
        function: Regex::new(r"\w+\(.*\)|CURRENT_TIME|CURRENT_DATE|CURRENT_TIMESTAMP|\|\|")
            .expect("valid pattern"),
    })
}

/// Split a raw default into a constant value and a default function.
///
/// - `NULL` (any case) is no default.
/// - `'...'` and `"..."` are unescaped text.
/// - Plain numbers are kept verbatim as text.
/// - `x'..'` is decoded into a blob.
/// - Anything else that looks like a call, a date keyword or a
///   concatenation becomes the default function. Other expressions yield
///   neither.
pub fn extract_default(raw: Option<&str>) -> (Option<Value>, Option<String>) {
    let Some(raw) = raw else {
        return (None, None);
    };
    let value = extract_value(raw);
    let function = if value.is_none() && patterns().function.is_match(raw) {
        Some(raw.to_string())
    } else {
        None
    };
    (value, function)
}

fn extract_value(raw: &str) -> Option<Value> {
    let p = patterns();
    if p.null.is_match(raw) {
        return None;
    }
    if let Some(caps) = p.single_quoted.captures(raw) {
        return Some(Value::Text(caps[1].replace("''", "'")));
    }
    if let Some(caps) = p.double_quoted.captures(raw) {
        return Some(Value::Text(caps[1].replace("\"\"", "\"")));
    }
    if p.numeric.is_match(raw) {
        return Some(Value::Text(raw.to_string()));
    }
    if let Some(caps) = p.blob.captures(raw) {
        return decode_hex(&caps[1]).map(Value::Blob);
    }
    None
}

fn decode_hex(hex: &str) -> Option<Vec<u8>> {
    if hex.len() % 2 != 0 {
        return None;
    }
    (0..hex.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&hex[i..i + 2], 16).ok())
        .collect()
}
