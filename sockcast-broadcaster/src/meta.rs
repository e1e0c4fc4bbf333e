//! Structured log metadata and its one-line rendering
//!
//! Rendering rules:
//! - objects: `{key: value, other: value}`, bare keys when they are plain identifiers
//! - arrays: `[value, value]`
//! - strings: single-quoted, `\` and `'` escaped
//! - numbers, booleans, `null`: verbatim
//!
//! Any line break in the result, together with the whitespace after it, is
//! collapsed to one space so a rendering never spans lines.

use std::fmt;

use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Serialize, Serializer};
use serde_json::{Number, Value};

/// Metadata value attached to a log call
#[derive(Debug, Clone, PartialEq)]
pub enum Meta {
    Null,
    Bool(bool),
    Number(Number),
    String(String),
    Array(Vec<Meta>),
    /// Entries keep insertion order
    Object(Vec<(String, Meta)>),
}

impl Meta {
    /// Build an object from key/value pairs.
    pub fn object<K, V, I>(entries: I) -> Self
    where
        K: Into<String>,
        V: Into<Meta>,
        I: IntoIterator<Item = (K, V)>,
    {
        Self::Object(
            entries
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    /// Whether the value counts as "no metadata": `null`, `false`, zero and
    /// the empty string. Containers never do, even when empty.
    pub fn is_falsy(&self) -> bool {
        match self {
            Self::Null => true,
            Self::Bool(b) => !b,
            Self::Number(n) => n.as_f64() == Some(0.0),
            Self::String(s) => s.is_empty(),
            Self::Array(_) | Self::Object(_) => false,
        }
    }

    /// Render as a single line.
    pub fn render(&self) -> String {
        let mut out = String::new();
        self.write_to(&mut out);
        collapse_line_breaks(&out)
    }

    fn write_to(&self, out: &mut String) {
        match self {
            Self::Null => out.push_str("null"),
            Self::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
            Self::Number(n) => out.push_str(&n.to_string()),
            Self::String(s) => push_quoted(out, s),
            Self::Array(items) => {
                out.push('[');
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    item.write_to(out);
                }
                out.push(']');
            }
            Self::Object(entries) => {
                out.push('{');
                for (i, (key, value)) in entries.iter().enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    if is_identifier(key) {
                        out.push_str(key);
                    } else {
                        push_quoted(out, key);
                    }
                    out.push_str(": ");
                    value.write_to(out);
                }
                out.push('}');
            }
        }
    }
}

fn push_quoted(out: &mut String, s: &str) {
    out.push('\'');
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\'' => out.push_str("\\'"),
            c => out.push(c),
        }
    }
    out.push('\'');
}

fn is_identifier(key: &str) -> bool {
    let mut chars = key.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' || c == '$' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
}

/// Replace every line break plus any whitespace following it with one space.
pub fn collapse_line_breaks(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\n' || c == '\r' {
            while chars.peek().is_some_and(|c| c.is_whitespace()) {
                chars.next();
            }
            out.push(' ');
        } else {
            out.push(c);
        }
    }
    out
}

impl fmt::Display for Meta {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

impl Serialize for Meta {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Null => serializer.serialize_unit(),
            Self::Bool(b) => serializer.serialize_bool(*b),
            Self::Number(n) => n.serialize(serializer),
            Self::String(s) => serializer.serialize_str(s),
            Self::Array(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            Self::Object(entries) => {
                let mut map = serializer.serialize_map(Some(entries.len()))?;
                for (key, value) in entries {
                    map.serialize_entry(key, value)?;
                }
                map.end()
            }
        }
    }
}

impl From<Value> for Meta {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => Self::Null,
            Value::Bool(b) => Self::Bool(b),
            Value::Number(n) => Self::Number(n),
            Value::String(s) => Self::String(s),
            Value::Array(items) => Self::Array(items.into_iter().map(Meta::from).collect()),
            Value::Object(map) => Self::Object(map.into_iter().map(|(k, v)| (k, Meta::from(v))).collect()),
        }
    }
}

impl From<bool> for Meta {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<i64> for Meta {
    fn from(n: i64) -> Self {
        Self::Number(n.into())
    }
}

impl From<i32> for Meta {
    fn from(n: i32) -> Self {
        Self::Number(n.into())
    }
}

impl From<u64> for Meta {
    fn from(n: u64) -> Self {
        Self::Number(n.into())
    }
}

impl From<f64> for Meta {
    /// Non-finite floats have no numeric rendering and become `null`.
    fn from(n: f64) -> Self {
        Number::from_f64(n).map(Self::Number).unwrap_or(Self::Null)
    }
}

impl From<&str> for Meta {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<String> for Meta {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl<T: Into<Meta>> From<Vec<T>> for Meta {
    fn from(items: Vec<T>) -> Self {
        Self::Array(items.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Meta>> From<Option<T>> for Meta {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Self::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_render_simple_object() {
        let meta = Meta::object([("a", 123)]);
        assert_eq!(meta.render(), "{a: 123}");
    }

    #[test]
    fn test_render_nested() {
        let meta = Meta::object([
            ("user", Meta::object([("name", Meta::from("ann")), ("admin", Meta::from(false))])),
            ("tags", Meta::from(vec!["x", "y"])),
            ("ratio", Meta::from(0.5)),
            ("none", Meta::Null),
        ]);
        assert_eq!(
            meta.render(),
            "{user: {name: 'ann', admin: false}, tags: ['x', 'y'], ratio: 0.5, none: null}"
        );
    }

    #[test]
    fn test_render_empty_containers() {
        assert_eq!(Meta::Object(Vec::new()).render(), "{}");
        assert_eq!(Meta::Array(Vec::new()).render(), "[]");
    }

    #[test]
    fn test_non_identifier_keys_are_quoted() {
        let meta = Meta::object([("content-type", "text"), ("ok_1", "y")]);
        assert_eq!(meta.render(), "{'content-type': 'text', ok_1: 'y'}");
    }

    #[test]
    fn test_quotes_are_escaped() {
        assert_eq!(Meta::from("it's").render(), r"'it\'s'");
    }

    #[test]
    fn test_line_breaks_collapse() {
        let meta = Meta::object([("text", "first\n    second\r\nthird")]);
        assert_eq!(meta.render(), "{text: 'first second third'}");
    }

    #[test]
    fn test_from_json_value() {
        let meta = Meta::from(json!({"a": 123, "b": [true, null]}));
        assert_eq!(meta.render(), "{a: 123, b: [true, null]}");
    }

    #[test]
    fn test_non_finite_float_is_null() {
        assert_eq!(Meta::from(f64::NAN), Meta::Null);
    }

    #[test]
    fn test_serializes_as_plain_json() {
        let meta = Meta::object([("z", Meta::from(1)), ("a", Meta::from(vec![2, 3]))]);
        assert_eq!(serde_json::to_string(&meta).unwrap(), r#"{"z":1,"a":[2,3]}"#);
    }
}
