//! Cell value classification and text normalization
//!
//! Row data arrives as JSON values; each one maps to exactly one cell type,
//! which decides the `t=` flag and value encoding the serializer emits.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

/// The cell type a raw value serializes as
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellType {
    /// A JSON boolean
    Boolean,
    /// A string spelling of a boolean ("true"/"False"/...), coerced to a
    /// boolean cell at write time
    BoolText,
    /// A number, or a string that parses as one
    Number,
    /// A string starting with `=`
    Formula,
    /// JSON null; rendered as an empty shared string
    Null,
    /// Everything else
    Text,
}

// Canonical v4 GUID: 8-4-4-4-12 hex groups, version nibble 4, RFC 4122
// variant. GUID-shaped strings must never be coerced to numbers.
static GUID_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-4[0-9a-fA-F]{3}-[89abAB][0-9a-fA-F]{3}-[0-9a-fA-F]{12}$")
        .unwrap()
});

// A `+` at the start of a line would make Excel parse the text as an
// expression; it gets an apostrophe guard prefix.
static LEADING_PLUS_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^\+").unwrap());

static MULTI_SPACE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r" {2,}").unwrap());

/// Classify a raw JSON value into its cell type
pub fn classify(value: &Value) -> CellType {
    match value {
        Value::Bool(_) => CellType::Boolean,
        Value::Null => CellType::Null,
        Value::Number(_) => CellType::Number,
        Value::String(s) => classify_str(s),
        // Arrays and objects have no cell representation; store their JSON
        // text.
        Value::Array(_) | Value::Object(_) => CellType::Text,
    }
}

fn classify_str(s: &str) -> CellType {
    if s.eq_ignore_ascii_case("true") || s.eq_ignore_ascii_case("false") {
        return CellType::BoolText;
    }
    if GUID_RE.is_match(s) {
        return CellType::Text;
    }
    if is_number_like(s) {
        return CellType::Number;
    }
    if s.starts_with('=') {
        return CellType::Formula;
    }
    CellType::Text
}

fn is_number_like(s: &str) -> bool {
    let trimmed = s.trim();
    !trimmed.is_empty() && trimmed.parse::<f64>().is_ok()
}

/// Rewrite text so it is safe to place in a cell.
///
/// Escapes a leading `+` on each line with an apostrophe, collapses runs of
/// two or more spaces to one, and strips backspace control characters.
/// XML entity escaping is a serialization concern and happens later.
pub fn normalize_text(text: &str) -> String {
    let text = LEADING_PLUS_RE.replace_all(text, "'+");
    let text = MULTI_SPACE_RE.replace_all(&text, " ");
    text.replace('\u{8}', "")
}

/// Render a value's textual form for a cell payload
pub fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Coerce a value classified as [`CellType::Boolean`] or
/// [`CellType::BoolText`] to its boolean payload
pub fn as_bool(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::String(s) => s.eq_ignore_ascii_case("true"),
        _ => false,
    }
}
