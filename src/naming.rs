//! Filename conventions: date and order prefixes, dates, and path sanitizing.
//!
//! Document filenames may carry structure in their prefix:
//!
//! - `2013-12-18-launch.md` → date 2013-12-18, name `launch.md`
//! - `2013-12-18T09.30-launch.md` → date with time (dots, since `:` is not
//!   portable in filenames; `@` works in place of `T`)
//! - `3.-setup.md` → order 3, name `setup.md`
//!
//! Both prefixes can be switched off per document, so parsing takes the two
//! flags explicitly. A date prefix is stripped before an order prefix.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use regex::Regex;
use std::sync::LazyLock;

static DATE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d{4})-(\d{1,2})-(\d{1,2})(?:[T@](\d{1,2})\.(\d{1,2})(?:\.(\d{1,2}))?)?$")
        .unwrap()
});

static DATE_PREFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d{4}-\d{1,2}-\d{1,2}(?:[T@]\d{1,2}\.\d{1,2}(?:\.\d{1,2})?)?)-(.+)$").unwrap()
});

static ORDER_PREFIX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^(\d+)\.-(.+)$").unwrap());

static UNSAFE_CHARS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[^\w\s.\-]").unwrap());
static REPEATED_DOTS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\.{2,}").unwrap());
static REPEATED_SPACES: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

/// Fallback formats tried when the compact pattern does not match.
const DATE_TIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%Y/%m/%d %H:%M:%S",
    "%Y/%m/%d %H:%M",
];

const DATE_FORMATS: &[&str] = &["%Y/%m/%d", "%B %d, %Y", "%b %d, %Y", "%d %B %Y", "%d %b %Y"];

/// Parse a date in the compact `YYYY-M-D[{T|@}H.M[.S]]` form, falling back to
/// common textual formats. Returns `None` when nothing matches.
pub fn parse_date(value: &str) -> Option<NaiveDateTime> {
    let value = value.trim();
    if let Some(caps) = DATE_PATTERN.captures(value) {
        let num = |i: usize| caps.get(i).map_or(Some(0), |m| m.as_str().parse::<u32>().ok());
        let year = caps[1].parse::<i32>().ok()?;
        return NaiveDate::from_ymd_opt(year, num(2)?, num(3)?)?.and_hms_opt(num(4)?, num(5)?, num(6)?);
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.naive_local());
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(value) {
        return Some(dt.naive_local());
    }
    for format in DATE_TIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(value, format) {
            return Some(dt);
        }
    }
    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(value, format).ok())
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

/// Result of stripping the structural prefixes from a filename.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedName {
    /// Date taken from a `YYYY-M-D-` prefix.
    pub date: Option<NaiveDateTime>,
    /// Order taken from an `N.-` prefix.
    pub order: Option<i64>,
    /// What remains once the prefixes are gone.
    pub name: String,
}

/// Strip the date prefix (when `dates` is set) and then the order prefix
/// (when `orders` is set) from `name`.
///
/// - `"2013-12-18-c.html"` → date 2013-12-18, name `"c.html"`
/// - `"2.-intro.html"` → order 2, name `"intro.html"`
/// - `"2013-13-45-x.html"` → no date (invalid), name unchanged
pub fn parse_file_name(name: &str, dates: bool, orders: bool) -> ParsedName {
    let mut parsed = ParsedName {
        date: None,
        order: None,
        name: name.to_string(),
    };
    if dates
        && let Some(caps) = DATE_PREFIX.captures(name)
        && let Some(date) = parse_date(&caps[1])
    {
        parsed.date = Some(date);
        parsed.name = caps[2].to_string();
    }
    if orders
        && let Some(caps) = ORDER_PREFIX.captures(&parsed.name)
        && let Ok(order) = caps[1].parse::<i64>()
    {
        parsed.order = Some(order);
        parsed.name = caps[2].to_string();
    }
    parsed
}

/// Sanitize one path segment for use in URLs.
///
/// Keeps word characters, whitespace, dots and dashes; collapses runs of
/// dots and whitespace; lowercases; turns spaces into dashes.
///
/// - `"Hello World!.html"` → `"hello-world.html"`
/// - `"a...b"` → `"a.b"`
pub fn sanitize(segment: &str) -> String {
    let kept = UNSAFE_CHARS.replace_all(segment.trim(), "");
    let kept = REPEATED_DOTS.replace_all(&kept, ".");
    let kept = REPEATED_SPACES.replace_all(&kept, " ");
    kept.to_lowercase().replace(' ', "-")
}

/// Sanitize every segment of a `/`-separated path. Empty segments are dropped.
pub fn sanitize_path(path: &str) -> String {
    path.split('/')
        .filter(|s| !s.is_empty())
        .map(sanitize)
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    // =========================================================================
    // parse_date
    // =========================================================================

    #[test]
    fn compact_date_without_time() {
        assert_eq!(parse_date("2013-12-18"), Some(ymd(2013, 12, 18)));
        assert_eq!(parse_date("2013-1-8"), Some(ymd(2013, 1, 8)));
    }

    #[test]
    fn compact_date_with_time() {
        let dt = parse_date("2013-12-18T09.30").unwrap();
        assert_eq!((dt.hour(), dt.minute(), dt.second()), (9, 30, 0));
        let dt = parse_date("2013-12-18@21.05.07").unwrap();
        assert_eq!((dt.hour(), dt.minute(), dt.second()), (21, 5, 7));
    }

    #[test]
    fn fallback_formats() {
        assert_eq!(parse_date("2013/12/18"), Some(ymd(2013, 12, 18)));
        assert_eq!(parse_date("December 18, 2013"), Some(ymd(2013, 12, 18)));
        assert!(parse_date("2013-12-18 10:15").is_some());
        assert!(parse_date("2013-12-18T10:15:00+00:00").is_some());
    }

    #[test]
    fn invalid_dates_are_none() {
        assert_eq!(parse_date("2013-13-45"), None);
        assert_eq!(parse_date("yesterday"), None);
        assert_eq!(parse_date(""), None);
    }

    // =========================================================================
    // parse_file_name
    // =========================================================================

    #[test]
    fn date_prefix_is_stripped() {
        let p = parse_file_name("2013-12-18-c.html", true, true);
        assert_eq!(p.date, Some(ymd(2013, 12, 18)));
        assert_eq!(p.order, None);
        assert_eq!(p.name, "c.html");
    }

    #[test]
    fn date_prefix_ignored_when_disabled() {
        let p = parse_file_name("2013-12-18-c.html", false, true);
        assert_eq!(p.date, None);
        assert_eq!(p.name, "2013-12-18-c.html");
    }

    #[test]
    fn order_prefix_is_stripped() {
        let p = parse_file_name("12.-setup.html", true, true);
        assert_eq!(p.order, Some(12));
        assert_eq!(p.name, "setup.html");
    }

    #[test]
    fn order_prefix_requires_dot_dash() {
        let p = parse_file_name("12-setup.html", true, true);
        assert_eq!(p.order, None);
        assert_eq!(p.name, "12-setup.html");
    }

    #[test]
    fn date_then_order_prefix() {
        let p = parse_file_name("2020-1-2-3.-x.html", true, true);
        assert_eq!(p.date, Some(ymd(2020, 1, 2)));
        assert_eq!(p.order, Some(3));
        assert_eq!(p.name, "x.html");
    }

    #[test]
    fn invalid_date_prefix_keeps_name() {
        let p = parse_file_name("2013-13-45-x.html", true, true);
        assert_eq!(p.date, None);
        assert_eq!(p.name, "2013-13-45-x.html");
    }

    // =========================================================================
    // sanitize
    // =========================================================================

    #[test]
    fn sanitize_strips_and_lowercases() {
        assert_eq!(sanitize("Hello World!.html"), "hello-world.html");
        assert_eq!(sanitize("What's  New?"), "whats-new");
    }

    #[test]
    fn sanitize_collapses_dots() {
        assert_eq!(sanitize("a...b.html"), "a.b.html");
    }

    #[test]
    fn sanitize_path_handles_each_segment() {
        assert_eq!(sanitize_path("My Blog/2013/Post One.html"), "my-blog/2013/post-one.html");
        assert_eq!(sanitize_path("/a//b/"), "a/b");
    }
}
