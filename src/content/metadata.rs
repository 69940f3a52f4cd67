//! Parsed front matter: an ordered, case-insensitive key/value bag.
//!
//! Keys keep the spelling they were first written with, but every lookup is
//! case-insensitive (`Title`, `title` and `TITLE` are the same key). Values
//! are consumed in one of two ways:
//!
//! - [`MetadataCollection::get`] reads a value and leaves it in place. Used for
//!   ordinary template data such as `title`.
//! - [`MetadataCollection::get_and_remove`] reads a value and removes it. Used
//!   for keys that drive a structural decision (`order`, `layout`, `output`)
//!   so they do not leak into the template context as plain data.
//!
//! Adding a key that already exists never overwrites the first value: the
//! add is rejected, a warning is emitted and `false` is returned.

use chrono::NaiveDateTime;
use indexmap::IndexMap;
use std::fmt;

/// A single metadata value.
#[derive(Debug, Clone, PartialEq)]
pub enum MetaValue {
    Text(String),
    Bool(bool),
    Int(i64),
    Date(NaiveDateTime),
    /// Comma/semicolon separated list (`tags: a, b; c`).
    List(Vec<String>),
    /// Structured value from a `[...]` or `{...}` header span.
    Json(serde_json::Value),
}

impl MetaValue {
    /// Integer view: integers as-is, text that parses as an integer.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            MetaValue::Int(n) => Some(*n),
            MetaValue::Text(s) => s.trim().parse().ok(),
            MetaValue::Json(serde_json::Value::Number(n)) => n.as_i64(),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            MetaValue::Bool(b) => Some(*b),
            MetaValue::Text(s) => parse_bool(s),
            MetaValue::Int(n) => Some(*n != 0),
            MetaValue::Json(serde_json::Value::Bool(b)) => Some(*b),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<NaiveDateTime> {
        match self {
            MetaValue::Date(d) => Some(*d),
            MetaValue::Text(s) => crate::naming::parse_date(s),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            MetaValue::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for MetaValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetaValue::Text(s) => f.write_str(s),
            MetaValue::Bool(b) => write!(f, "{b}"),
            MetaValue::Int(n) => write!(f, "{n}"),
            MetaValue::Date(d) => write!(f, "{}", d.format("%Y-%m-%d %H:%M:%S")),
            MetaValue::List(items) => f.write_str(&items.join(", ")),
            MetaValue::Json(serde_json::Value::String(s)) => f.write_str(s),
            MetaValue::Json(v) => write!(f, "{v}"),
        }
    }
}

/// `true`/`yes` (case-insensitive) are true; `false`/`no` are false.
pub fn parse_bool(value: &str) -> Option<bool> {
    let v = value.trim();
    if v.eq_ignore_ascii_case("true") || v.eq_ignore_ascii_case("yes") {
        Some(true)
    } else if v.eq_ignore_ascii_case("false") || v.eq_ignore_ascii_case("no") {
        Some(false)
    } else {
        None
    }
}

/// Ordered, case-insensitive metadata map.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetadataCollection {
    /// Lowercased key → (original key, value).
    entries: IndexMap<String, (String, MetaValue)>,
}

impl MetadataCollection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a value. Returns `false` (and warns) when the key is already set.
    pub fn add(&mut self, key: &str, value: MetaValue) -> bool {
        let normalized = key.to_lowercase();
        if self.entries.contains_key(&normalized) {
            tracing::warn!(key, "metadata key is already set, ignoring the later value");
            return false;
        }
        self.entries.insert(normalized, (key.to_string(), value));
        true
    }

    /// Builder-style add, for tests and programmatic construction.
    pub fn with(mut self, key: &str, value: MetaValue) -> Self {
        self.add(key, value);
        self
    }

    pub fn get(&self, key: &str) -> Option<&MetaValue> {
        self.entries.get(&key.to_lowercase()).map(|(_, v)| v)
    }

    pub fn get_text(&self, key: &str) -> Option<String> {
        self.get(key).map(|v| v.to_string())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(&key.to_lowercase())
    }

    /// Read and consume a value.
    pub fn get_and_remove(&mut self, key: &str) -> Option<MetaValue> {
        self.entries
            .shift_remove(&key.to_lowercase())
            .map(|(_, v)| v)
    }

    /// Consume a flag. Missing or unparseable values are `false`.
    pub fn get_and_remove_flag(&mut self, key: &str) -> bool {
        self.get_and_remove(key)
            .and_then(|v| v.as_bool())
            .unwrap_or(false)
    }

    /// Copy every entry of `other` whose key is not present here and not in
    /// `excluded`. Returns the number of keys copied.
    pub fn merge_missing(&mut self, other: &MetadataCollection, excluded: &[&str]) -> usize {
        let mut copied = 0;
        for (normalized, (key, value)) in &other.entries {
            if self.entries.contains_key(normalized)
                || excluded.iter().any(|e| e.eq_ignore_ascii_case(normalized))
            {
                continue;
            }
            self.entries
                .insert(normalized.clone(), (key.clone(), value.clone()));
            copied += 1;
        }
        copied
    }

    /// Iterate `(original key, value)` in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &MetaValue)> {
        self.entries.values().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
