//! The embedded query language.
//!
//! ```text
//! [query] <source> [where <prop> <op> <value>]* [ascending|descending <prop>]
//!         [take <n>] [every <n>] [formaturl "<fmt>"]
//! ```
//!
//! Sources are `documents`, `data`, `files` and `layouts`. Clauses may come in
//! any order. Keywords and operators are case-insensitive; tokens are split on
//! whitespace, and double quotes group a token that contains spaces.
//!
//! | Operator | Aliases |
//! |----------|---------|
//! | `equals` | `eq` |
//! | `contains` | |
//! | `startswith` | |
//! | `endswith` | |
//! | `greaterthan` | `gt` |
//! | `lessthan` | `lt` |
//!
//! A value that parses as an integer compares numerically (the property is
//! converted to an integer; items where that fails don't match). Anything
//! else compares as an ordinal string. On list properties such as `tags`,
//! `contains` tests membership.
//!
//! Evaluation filters (all `where` clauses must hold), then orders, then caps
//! the count with `take`. [`QueryResults`] keeps item handles only: nothing
//! is rendered until whoever consumes the results reads an item.
//!
//! Any unknown source, operator or top-level token is an error.

use crate::content::MetaValue;
use std::cmp::Ordering;
use std::ops::Range;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum QueryError {
    #[error("query is empty")]
    Empty,
    #[error("unknown query source '{0}'")]
    UnknownSource(String),
    #[error("unexpected token '{0}' in query")]
    UnexpectedToken(String),
    #[error("unknown where operator '{0}'")]
    UnknownOperator(String),
    #[error("'{0}' is missing its argument")]
    MissingArgument(String),
    #[error("'{clause}' expects a number, found '{value}'")]
    InvalidNumber { clause: String, value: String },
    #[error("unterminated quoted string in query")]
    UnterminatedString,
}

/// Anything a query can filter and order.
pub trait Queryable {
    /// Look up a property by case-insensitive name.
    fn property(&self, name: &str) -> Option<MetaValue>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuerySource {
    Documents,
    Data,
    Files,
    Layouts,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Equals,
    Contains,
    StartsWith,
    EndsWith,
    GreaterThan,
    LessThan,
}

impl Operator {
    fn parse(token: &str) -> Result<Self, QueryError> {
        match token.to_lowercase().as_str() {
            "equals" | "eq" => Ok(Operator::Equals),
            "contains" => Ok(Operator::Contains),
            "startswith" => Ok(Operator::StartsWith),
            "endswith" => Ok(Operator::EndsWith),
            "greaterthan" | "gt" => Ok(Operator::GreaterThan),
            "lessthan" | "lt" => Ok(Operator::LessThan),
            _ => Err(QueryError::UnknownOperator(token.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Number(i64),
    Text(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct WhereClause {
    pub property: String,
    pub operator: Operator,
    pub value: Operand,
}

impl WhereClause {
    fn matches(&self, item: &(impl Queryable + ?Sized)) -> bool {
        let Some(actual) = item.property(&self.property) else {
            return false;
        };
        match &self.value {
            Operand::Number(expected) => {
                let Some(actual) = actual.as_int() else {
                    return false;
                };
                match self.operator {
                    Operator::Equals => actual == *expected,
                    Operator::GreaterThan => actual > *expected,
                    Operator::LessThan => actual < *expected,
                    Operator::Contains => actual.to_string().contains(&expected.to_string()),
                    Operator::StartsWith => actual.to_string().starts_with(&expected.to_string()),
                    Operator::EndsWith => actual.to_string().ends_with(&expected.to_string()),
                }
            }
            Operand::Text(expected) => {
                if let (MetaValue::List(items), Operator::Contains) = (&actual, self.operator) {
                    return items.iter().any(|i| i == expected);
                }
                let actual = actual.to_string();
                match self.operator {
                    Operator::Equals => actual == *expected,
                    Operator::Contains => actual.contains(expected.as_str()),
                    Operator::StartsWith => actual.starts_with(expected.as_str()),
                    Operator::EndsWith => actual.ends_with(expected.as_str()),
                    Operator::GreaterThan => actual.as_str() > expected.as_str(),
                    Operator::LessThan => actual.as_str() < expected.as_str(),
                }
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Ascending,
    Descending,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderBy {
    pub direction: Direction,
    pub property: String,
}

/// A parsed query.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub source: QuerySource,
    pub filters: Vec<WhereClause>,
    pub order: Option<OrderBy>,
    pub take: Option<usize>,
    /// Page size for pagination.
    pub every: Option<usize>,
    /// Page URL format; `{0}` is replaced by the page number.
    pub format_url: Option<String>,
}

/// Split on whitespace, keeping double-quoted runs together (quotes removed).
pub fn tokenize(text: &str) -> Result<Vec<String>, QueryError> {
    let mut tokens = Vec::new();
    let mut chars = text.chars().peekable();
    while let Some(&c) = chars.peek() {
        if c.is_whitespace() {
            chars.next();
        } else if c == '"' {
            chars.next();
            let mut token = String::new();
            loop {
                match chars.next() {
                    Some('"') => break,
                    Some(c) => token.push(c),
                    None => return Err(QueryError::UnterminatedString),
                }
            }
            tokens.push(token);
        } else {
            let mut token = String::new();
            while let Some(&c) = chars.peek() {
                if c.is_whitespace() {
                    break;
                }
                token.push(c);
                chars.next();
            }
            tokens.push(token);
        }
    }
    Ok(tokens)
}

/// Shared cursor over the token list; each clause consumes its arguments.
struct Cursor<'a> {
    tokens: &'a [String],
    position: usize,
}

impl<'a> Cursor<'a> {
    fn next(&mut self) -> Option<&'a str> {
        let token = self.tokens.get(self.position)?;
        self.position += 1;
        Some(token)
    }

    fn argument(&mut self, clause: &str) -> Result<&'a str, QueryError> {
        self.next()
            .ok_or_else(|| QueryError::MissingArgument(clause.to_string()))
    }

    fn number(&mut self, clause: &str) -> Result<usize, QueryError> {
        let value = self.argument(clause)?;
        value.parse().map_err(|_| QueryError::InvalidNumber {
            clause: clause.to_string(),
            value: value.to_string(),
        })
    }
}

impl Query {
    pub fn parse(text: &str) -> Result<Self, QueryError> {
        let tokens = tokenize(text)?;
        let mut cursor = Cursor {
            tokens: &tokens,
            position: 0,
        };

        let mut first = cursor.next().ok_or(QueryError::Empty)?;
        if first.eq_ignore_ascii_case("query") {
            first = cursor.next().ok_or(QueryError::Empty)?;
        }
        let source = match first.to_lowercase().as_str() {
            "documents" => QuerySource::Documents,
            "data" => QuerySource::Data,
            "files" => QuerySource::Files,
            "layouts" => QuerySource::Layouts,
            _ => return Err(QueryError::UnknownSource(first.to_string())),
        };

        let mut query = Query {
            source,
            filters: Vec::new(),
            order: None,
            take: None,
            every: None,
            format_url: None,
        };

        while let Some(token) = cursor.next() {
            match token.to_lowercase().as_str() {
                "where" => {
                    let property = cursor.argument("where")?.to_string();
                    let operator = Operator::parse(cursor.argument("where")?)?;
                    let value = cursor.argument("where")?;
                    let value = match value.parse::<i64>() {
                        Ok(n) => Operand::Number(n),
                        Err(_) => Operand::Text(value.to_string()),
                    };
                    query.filters.push(WhereClause {
                        property,
                        operator,
                        value,
                    });
                }
                "ascending" | "descending" => {
                    let direction = if token.eq_ignore_ascii_case("ascending") {
                        Direction::Ascending
                    } else {
                        Direction::Descending
                    };
                    let property = cursor.argument(token)?.to_string();
                    query.order = Some(OrderBy {
                        direction,
                        property,
                    });
                }
                "take" => query.take = Some(cursor.number("take")?),
                "every" => query.every = Some(cursor.number("every")?),
                "formaturl" => query.format_url = Some(cursor.argument("formaturl")?.to_string()),
                _ => return Err(QueryError::UnexpectedToken(token.to_string())),
            }
        }
        Ok(query)
    }

    /// Filter and order `items`, returning their keys.
    ///
    /// Only keys are collected; `take` is applied lazily by [`QueryResults`].
    pub fn execute<'i, K, T>(&self, items: impl IntoIterator<Item = (K, &'i T)>) -> QueryResults<K>
    where
        K: Copy,
        T: Queryable + ?Sized + 'i,
    {
        let mut matched: Vec<(K, &T)> = items
            .into_iter()
            .filter(|(_, item)| self.filters.iter().all(|f| f.matches(*item)))
            .collect();

        if let Some(order) = &self.order {
            let mut keyed: Vec<(K, Option<MetaValue>)> = matched
                .drain(..)
                .map(|(k, item)| (k, item.property(&order.property)))
                .collect();
            // sort_by is stable: equal values keep source order.
            keyed.sort_by(|a, b| {
                let ordering = compare_values(a.1.as_ref(), b.1.as_ref());
                match order.direction {
                    Direction::Ascending => ordering,
                    Direction::Descending => ordering.reverse(),
                }
            });
            return QueryResults {
                keys: keyed.into_iter().map(|(k, _)| k).collect(),
                take: self.take,
            };
        }

        QueryResults {
            keys: matched.into_iter().map(|(k, _)| k).collect(),
            take: self.take,
        }
    }
}

/// Numeric when both sides are integers, chronological for dates, ordinal
/// string otherwise. Missing values sort first.
fn compare_values(a: Option<&MetaValue>, b: Option<&MetaValue>) -> Ordering {
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(a), Some(b)) => {
            if let (Some(x), Some(y)) = (a.as_int(), b.as_int()) {
                return x.cmp(&y);
            }
            if let (MetaValue::Date(x), MetaValue::Date(y)) = (a, b) {
                return x.cmp(y);
            }
            a.to_string().cmp(&b.to_string())
        }
    }
}

/// Ordered matches of a query, as item handles.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryResults<K> {
    keys: Vec<K>,
    take: Option<usize>,
}

impl<K: Copy> QueryResults<K> {
    pub fn len(&self) -> usize {
        self.take
            .map_or(self.keys.len(), |take| take.min(self.keys.len()))
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = K> + '_ {
        self.keys.iter().copied().take(self.len())
    }

    /// The handles in `range`, clamped to the result length.
    pub fn slice(&self, range: Range<usize>) -> impl Iterator<Item = K> + '_ {
        let end = range.end.min(self.len());
        let start = range.start.min(end);
        self.keys[start..end].iter().copied()
    }
}
