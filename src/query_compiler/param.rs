//! Positional bind values
//!
//! Every `?` emitted by the compiler corresponds to exactly one [`Param`], in
//! the same order the placeholders appear in the SQL text. [`SqlFragment`] keeps
//! text and values together while fragments are assembled, so the pairing is
//! never reconstructed after the fact.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A single bind value handed to the execution layer.
///
/// Untagged so YAML/JSON definitions can write plain scalars. Strings that
/// parse as `%Y-%m-%dT%H:%M:%S` become [`Param::Date`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Param {
    Null,
    Bool(bool),
    Integer(i64),
    Float(f64),
    Date(NaiveDateTime),
    Text(String),
}

impl fmt::Display for Param {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Param::Null => write!(f, "NULL"),
            Param::Bool(b) => write!(f, "{}", b),
            Param::Integer(i) => write!(f, "{}", i),
            Param::Float(x) => write!(f, "{}", x),
            Param::Date(d) => write!(f, "{}", d.format("%Y-%m-%d %H:%M:%S")),
            Param::Text(s) => write!(f, "'{}'", s),
        }
    }
}

impl From<i64> for Param {
    fn from(value: i64) -> Self {
        Param::Integer(value)
    }
}

impl From<f64> for Param {
    fn from(value: f64) -> Self {
        Param::Float(value)
    }
}

impl From<bool> for Param {
    fn from(value: bool) -> Self {
        Param::Bool(value)
    }
}

impl From<&str> for Param {
    fn from(value: &str) -> Self {
        Param::Text(value.to_string())
    }
}

impl From<String> for Param {
    fn from(value: String) -> Self {
        Param::Text(value)
    }
}

impl From<NaiveDateTime> for Param {
    fn from(value: NaiveDateTime) -> Self {
        Param::Date(value)
    }
}

/// SQL text plus the values bound to its placeholders, in order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SqlFragment {
    pub sql: String,
    pub params: Vec<Param>,
}

impl SqlFragment {
    pub fn new(sql: impl Into<String>, params: Vec<Param>) -> Self {
        Self {
            sql: sql.into(),
            params,
        }
    }

    /// Fragment without placeholders
    pub fn text(sql: impl Into<String>) -> Self {
        Self::new(sql, Vec::new())
    }

    /// Fragment consisting of a single placeholder
    pub fn placeholder(param: Param) -> Self {
        Self::new("?", vec![param])
    }

    pub fn push_str(&mut self, sql: &str) {
        self.sql.push_str(sql);
    }

    /// Append another fragment, keeping its values after ours
    pub fn append(&mut self, other: SqlFragment) {
        self.sql.push_str(&other.sql);
        self.params.extend(other.params);
    }

    /// Join fragments with a separator; values keep their relative order
    pub fn join(parts: Vec<SqlFragment>, separator: &str) -> SqlFragment {
        let mut out = SqlFragment::default();
        for (i, part) in parts.into_iter().enumerate() {
            if i > 0 {
                out.push_str(separator);
            }
            out.append(part);
        }
        out
    }

    /// Wrap the text in parentheses
    pub fn parenthesized(self) -> SqlFragment {
        SqlFragment {
            sql: format!("({})", self.sql),
            params: self.params,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.sql.is_empty()
    }
}
