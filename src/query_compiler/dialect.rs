//! Dialect keyword table
//!
//! Maps logical tokens (operators, join keywords, identifier quotes) to the text
//! a particular database expects. The compiler never hard-codes these; it
//! resolves every token once per compile into [`Tokens`], so a missing key
//! fails the whole compile before any SQL is produced.
use super::errors::CompileError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

// Static default keyword table
lazy_static::lazy_static! {
    static ref DEFAULT_KEYWORDS: HashMap<&'static str, &'static str> = {
        let mut m = HashMap::new();

        // ===== IDENTIFIER QUOTING =====
        m.insert("quote_open", "\"");
        m.insert("quote_close", "\"");

        // ===== CLAUSES =====
        m.insert("select", "SELECT");
        m.insert("from", "FROM");
        m.insert("where", "WHERE");
        m.insert("order_by", "ORDER BY");
        m.insert("asc", "ASC");
        m.insert("desc", "DESC");
        m.insert("as", "AS");
        m.insert("on", "ON");
        m.insert("inner_join", "INNER JOIN");
        m.insert("left_join", "LEFT JOIN");
        m.insert("right_join", "RIGHT JOIN");
        m.insert("exists", "EXISTS");

        // ===== LOGIC =====
        m.insert("and", "AND");
        m.insert("or", "OR");
        m.insert("not", "NOT");

        // ===== COMPARISON =====
        m.insert("eq", "=");
        m.insert("ne", "<>");
        m.insert("lt", "<");
        m.insert("le", "<=");
        m.insert("gt", ">");
        m.insert("ge", ">=");
        m.insert("like", "LIKE");
        m.insert("not_like", "NOT LIKE");
        m.insert("in", "IN");
        m.insert("between", "BETWEEN");
        m.insert("is_null", "IS NULL");

        m
    };
}

/// Keyword table for one SQL dialect.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dialect {
    keywords: HashMap<String, String>,
}

impl Default for Dialect {
    fn default() -> Self {
        Self {
            keywords: DEFAULT_KEYWORDS
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }
}

impl Dialect {
    /// Build a dialect from an explicit table, without the built-in defaults.
    pub fn from_keywords(keywords: HashMap<String, String>) -> Self {
        Self { keywords }
    }

    /// Built-in defaults with the given entries replacing or extending them.
    pub fn with_overrides(overrides: HashMap<String, String>) -> Self {
        let mut dialect = Self::default();
        dialect.keywords.extend(overrides);
        dialect
    }

    /// Look up a token; a miss is a hard failure.
    pub fn keyword(&self, key: &str) -> Result<&str, CompileError> {
        self.keywords
            .get(key)
            .map(|s| s.as_str())
            .ok_or_else(|| CompileError::UnresolvedKeyword(key.to_string()))
    }

    /// Remove a token (mainly useful for testing failure paths)
    pub fn without(mut self, key: &str) -> Self {
        self.keywords.remove(key);
        self
    }

    pub(crate) fn tokens(&self) -> Result<Tokens, CompileError> {
        let get = |key: &str| self.keyword(key).map(str::to_string);
        Ok(Tokens {
            quote_open: get("quote_open")?,
            quote_close: get("quote_close")?,
            select: get("select")?,
            from: get("from")?,
            where_: get("where")?,
            order_by: get("order_by")?,
            asc: get("asc")?,
            desc: get("desc")?,
            as_: get("as")?,
            on: get("on")?,
            inner_join: get("inner_join")?,
            left_join: get("left_join")?,
            right_join: get("right_join")?,
            exists: get("exists")?,
            and: get("and")?,
            or: get("or")?,
            not: get("not")?,
            eq: get("eq")?,
            ne: get("ne")?,
            lt: get("lt")?,
            le: get("le")?,
            gt: get("gt")?,
            ge: get("ge")?,
            like: get("like")?,
            not_like: get("not_like")?,
            in_: get("in")?,
            between: get("between")?,
            is_null: get("is_null")?,
        })
    }
}

/// Every token the compiler emits, resolved once per compile.
#[derive(Debug, Clone)]
pub(crate) struct Tokens {
    pub quote_open: String,
    pub quote_close: String,
    pub select: String,
    pub from: String,
    pub where_: String,
    pub order_by: String,
    pub asc: String,
    pub desc: String,
    pub as_: String,
    pub on: String,
    pub inner_join: String,
    pub left_join: String,
    pub right_join: String,
    pub exists: String,
    pub and: String,
    pub or: String,
    pub not: String,
    pub eq: String,
    pub ne: String,
    pub lt: String,
    pub le: String,
    pub gt: String,
    pub ge: String,
    pub like: String,
    pub not_like: String,
    pub in_: String,
    pub between: String,
    pub is_null: String,
}

impl Tokens {
    /// Wrap an identifier in the dialect's quote characters
    pub fn quote(&self, ident: &str) -> String {
        format!("{}{}{}", self.quote_open, ident, self.quote_close)
    }

    /// `alias."column"`
    pub fn qualified(&self, alias: &str, column: &str) -> String {
        format!("{}.{}", alias, self.quote(column))
    }

    /// `alias."column" AS "prefix_column"`
    pub fn projected(&self, alias: &str, column: &str, prefix: &str) -> String {
        format!(
            "{} {} {}",
            self.qualified(alias, column),
            self.as_,
            self.quote(&format!("{}_{}", prefix, column))
        )
    }
}
