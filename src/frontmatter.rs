//! Front matter parsing: splits raw file text into a metadata header and body.
//!
//! ## Header forms
//!
//! Delimited, with `---` lines around the header:
//!
//! ```text
//! ---
//! title: Launch
//! date: 2013-12-18
//! tags: news, release
//! ---
//! Body text.
//! ```
//!
//! Undelimited, where a contiguous run of `key: value` lines at the top is the
//! header and the first blank or non-matching line ends it:
//!
//! ```text
//! title: Launch
//! draft: yes
//!
//! Body text.
//! ```
//!
//! The undelimited form means a body whose first line looks like `word: text`
//! is read as a header. That is long-standing behavior and is kept as is.
//!
//! Blank lines and comment lines (`;` or `//`) before the header are skipped.
//!
//! ## Typed keys
//!
//! | Key | Value |
//! |-----|-------|
//! | `date` | parsed date, sets [`ParsedContent::date`] (unparseable dates are dropped) |
//! | `draft`, `ignore`, `ignored` | `true`/`yes` sets [`ParsedContent::draft`] |
//! | `tag`, `tags` | list split on `,` or `;` |
//! | `name?` | named query, stored in [`ParsedContent::queries`] |
//! | `*date` | parsed date, raw string when unparseable |
//! | value starting `[` or `{` | JSON, possibly spanning lines; raw string when invalid |
//!
//! Everything else is a string. Parsing never fails: malformed values degrade
//! to strings or end the header early.

use crate::content::{MetaValue, MetadataCollection};
use crate::naming::parse_date;
use chrono::NaiveDateTime;
use indexmap::IndexMap;
use regex::Regex;
use std::sync::LazyLock;

static HEADER_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*([\w][\w.\-]*)(\?)?\s*:\s?(.*?)\s*$").unwrap());

const DELIMITER: &str = "---";

/// The result of splitting a file into header and body.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedContent {
    pub body: String,
    pub metadata: MetadataCollection,
    pub date: Option<NaiveDateTime>,
    pub draft: bool,
    /// Named queries (`recent?: documents take 5`), keyed by name without `?`.
    pub queries: IndexMap<String, String>,
}

fn is_comment(line: &str) -> bool {
    line.starts_with(';') || line.starts_with("//")
}

/// Parse front matter from `text`.
pub fn parse(text: &str) -> ParsedContent {
    let lines: Vec<&str> = text.lines().collect();
    let mut parsed = ParsedContent::default();

    let mut i = 0;
    while i < lines.len() {
        let line = lines[i].trim();
        if line.is_empty() || is_comment(line) {
            i += 1;
        } else {
            break;
        }
    }

    let delimited = i < lines.len() && lines[i].trim() == DELIMITER;
    if delimited {
        i += 1;
    }

    let mut header_lines = 0;
    while i < lines.len() {
        let line = lines[i].trim();
        if delimited && line == DELIMITER {
            i += 1;
            break;
        }
        if (line.is_empty() && delimited) || is_comment(line) {
            i += 1;
            continue;
        }
        let Some(caps) = HEADER_LINE.captures(line) else {
            break;
        };
        let key = caps[1].to_string();
        let is_query = caps.get(2).is_some();
        let value = caps[3].to_string();
        i += 1;
        header_lines += 1;

        if is_query {
            parsed.queries.insert(key, value);
            continue;
        }
        if value.starts_with('[') || value.starts_with('{') {
            if let Some((json, consumed)) = structured_value(&value, &lines[i..]) {
                i += consumed;
                parsed.metadata.add(&key, MetaValue::Json(json));
                continue;
            }
            tracing::debug!(key, "structured value did not parse, keeping it as text");
        }
        apply_header_value(&mut parsed, &key, value);
    }

    if !delimited && header_lines == 0 {
        return ParsedContent {
            body: text.trim().to_string(),
            ..ParsedContent::default()
        };
    }

    while i < lines.len() && lines[i].trim().is_empty() {
        i += 1;
    }
    parsed.body = lines[i.min(lines.len())..].join("\n").trim_end().to_string();
    parsed
}

fn apply_header_value(parsed: &mut ParsedContent, key: &str, value: String) {
    let lower = key.to_lowercase();
    match lower.as_str() {
        "date" => parsed.date = parse_date(&value),
        "draft" | "ignore" | "ignored" => {
            parsed.draft = value.eq_ignore_ascii_case("true") || value.eq_ignore_ascii_case("yes");
        }
        "tag" | "tags" => {
            let tags = value
                .split([',', ';'])
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .map(String::from)
                .collect();
            parsed.metadata.add(key, MetaValue::List(tags));
        }
        _ if lower.ends_with("date") => {
            let value = match parse_date(&value) {
                Some(date) => MetaValue::Date(date),
                None => MetaValue::Text(value),
            };
            parsed.metadata.add(key, value);
        }
        _ => {
            parsed.metadata.add(key, MetaValue::Text(value));
        }
    }
}

/// Consume a balanced `[...]`/`{...}` span starting with `first` and
/// continuing into `rest`. Depth counting ignores string quoting.
///
/// Returns the parsed value and how many lines of `rest` were used, or `None`
/// when the span never closes or is not valid JSON.
fn structured_value(first: &str, rest: &[&str]) -> Option<(serde_json::Value, usize)> {
    let mut depth = 0i64;
    let mut span = String::new();
    let mut consumed = 0;
    let candidates = std::iter::once(first).chain(rest.iter().copied());
    for (n, line) in candidates.enumerate() {
        for c in line.chars() {
            match c {
                '[' | '{' => depth += 1,
                ']' | '}' => depth -= 1,
                _ => {}
            }
        }
        if n > 0 {
            span.push('\n');
            consumed = n;
        }
        span.push_str(line);
        if depth <= 0 {
            return serde_json::from_str(&span).ok().map(|v| (v, consumed));
        }
    }
    None
}
