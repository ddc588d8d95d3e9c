//! Query predicates: equality conditions, paging and ordering.
//!
//! Callers hand over two flat strings, `key=value` pairs joined by commas for
//! conditions and `page=<n>,limit=<n>` for paging. Both are parsed here into
//! the structured form the mirror store understands.

use std::collections::BTreeMap;
use std::fmt;

use itertools::Itertools;

use crate::error::Error;
use crate::kind::ResourceKind;
use crate::result::Result;

/// Separator between `key=value` pairs.
pub const PAIR_SEPARATOR: char = ',';

/// Page size used when a page number is given without a limit.
pub const DEFAULT_LIMIT: usize = 10;

/// A conjunction of equality predicates over mirror row columns.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Conditions {
    predicates: BTreeMap<String, String>,
}

impl Conditions {
    /// Create an empty condition set, matching every row.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a `key=value,key=value` condition string.
    ///
    /// Empty input and empty pairs mean "no predicate".
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidQuery` for a pair without `=`, an empty key, or
    /// the same key given twice with different values.
    pub fn parse(input: &str) -> Result<Self> {
        parse_pairs(input)?
            .into_iter()
            .try_fold(Self::new(), |mut acc, (key, value)| {
                match acc.predicates.get(&key) {
                    Some(existing) if *existing != value => Err(Error::invalid_query(format!(
                        "conflicting values for '{key}': '{existing}' and '{value}'"
                    ))),
                    _ => {
                        acc.predicates.insert(key, value);
                        Ok(acc)
                    }
                }
            })
    }

    /// Add an equality predicate.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.predicates.insert(key.into(), value.into());
        self
    }

    /// Get the expected value for a column.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.predicates.get(key).map(String::as_str)
    }

    /// Remove a predicate, returning its value.
    pub fn remove(&mut self, key: &str) -> Option<String> {
        self.predicates.remove(key)
    }

    /// Iterate predicates in column order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.predicates
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Number of predicates.
    #[must_use]
    pub fn len(&self) -> usize {
        self.predicates.len()
    }

    /// Whether there are no predicates.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.predicates.is_empty()
    }

    /// Adjust the predicates to what `kind` can answer.
    ///
    /// A `namespace` predicate on a cluster-scoped kind is cleared instead of
    /// rejected, so one condition string works across every kind.
    #[must_use]
    pub fn normalized_for(mut self, kind: ResourceKind) -> Self {
        if !kind.is_namespaced() && self.remove("namespace").is_some() {
            tracing::debug!(kind = %kind, "Cleared namespace condition on cluster-scoped kind");
        }
        self
    }

    /// Check that every predicate names a column `kind` has.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidQuery` naming the first unknown column.
    pub fn validate_for(&self, kind: ResourceKind) -> Result<()> {
        match self.predicates.keys().find(|k| !kind.is_filterable(k)) {
            Some(column) => Err(Error::invalid_query(format!(
                "'{column}' is not a filterable column of {kind}"
            ))),
            None => Ok(()),
        }
    }

    /// Evaluate the conjunction against a row, given a column lookup.
    pub fn matches<'a, F>(&self, lookup: F) -> bool
    where
        F: Fn(&str) -> Option<&'a str>,
    {
        self.predicates
            .iter()
            .all(|(column, expected)| lookup(column) == Some(expected.as_str()))
    }
}

impl fmt::Display for Conditions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let joined = self
            .predicates
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .join(",");
        f.write_str(&joined)
    }
}

/// Row window as (limit, offset).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Paging {
    pub limit: usize,
    pub offset: usize,
}

impl Paging {
    /// Create a row window.
    #[must_use]
    pub const fn new(limit: usize, offset: usize) -> Self {
        Self { limit, offset }
    }
}

/// Column a listing is ordered by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OrderField {
    Name,
    CreatedAt,
    #[default]
    UpdatedAt,
    Status,
}

impl OrderField {
    /// Return the column name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Name => "name",
            Self::CreatedAt => "created_at",
            Self::UpdatedAt => "updated_at",
            Self::Status => "status",
        }
    }

    fn parse(value: &str) -> Result<Self> {
        match value {
            "name" => Ok(Self::Name),
            "created_at" | "createTime" => Ok(Self::CreatedAt),
            "updated_at" | "updateTime" => Ok(Self::UpdatedAt),
            "status" => Ok(Self::Status),
            other => Err(Error::invalid_query(format!("cannot order by '{other}'"))),
        }
    }
}

/// Listing order. Ties always break on the row key, ascending.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Order {
    pub field: OrderField,
    pub descending: bool,
}

impl Default for Order {
    /// Most-recently-updated first.
    fn default() -> Self {
        Self {
            field: OrderField::UpdatedAt,
            descending: true,
        }
    }
}

impl Order {
    /// Ascending order by a field.
    #[must_use]
    pub const fn ascending(field: OrderField) -> Self {
        Self {
            field,
            descending: false,
        }
    }

    /// Descending order by a field.
    #[must_use]
    pub const fn descending(field: OrderField) -> Self {
        Self {
            field,
            descending: true,
        }
    }
}

/// A one-based page request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: usize,
    pub limit: usize,
}

impl PageRequest {
    /// Row window for this page.
    #[must_use]
    pub const fn paging(self) -> Paging {
        Paging::new(
            self.limit,
            self.page.saturating_sub(1).saturating_mul(self.limit),
        )
    }
}

/// Parsed paging string: an optional page plus an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PageQuery {
    pub page: Option<PageRequest>,
    pub order: Order,
}

impl PageQuery {
    /// Parse `page=<n>,limit=<n>[,order=<field>][,desc=<bool>]`.
    ///
    /// Without `page` and `limit` the whole matching set is requested.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidQuery` for malformed pairs, unknown keys,
    /// non-numeric or zero page/limit values, and unknown order fields.
    pub fn parse(input: &str) -> Result<Self> {
        let mut page = None;
        let mut limit = None;
        let mut order = Order::default();

        for (key, value) in parse_pairs(input)? {
            match key.as_str() {
                "page" => page = Some(parse_positive(&key, &value)?),
                "limit" => limit = Some(parse_positive(&key, &value)?),
                "order" => order.field = OrderField::parse(&value)?,
                "desc" => {
                    order.descending = value.parse::<bool>().map_err(|_| {
                        Error::invalid_query(format!("'desc' must be true or false, got '{value}'"))
                    })?;
                }
                other => {
                    return Err(Error::invalid_query(format!("unknown paging key '{other}'")));
                }
            }
        }

        let page = match (page, limit) {
            (None, None) => None,
            (page, limit) => Some(PageRequest {
                page: page.unwrap_or(1),
                limit: limit.unwrap_or(DEFAULT_LIMIT),
            }),
        };

        Ok(Self { page, order })
    }
}

fn parse_positive(key: &str, value: &str) -> Result<usize> {
    match value.parse::<usize>() {
        Ok(0) => Err(Error::invalid_query(format!("'{key}' must be at least 1"))),
        Ok(n) => Ok(n),
        Err(_) => Err(Error::invalid_query(format!(
            "'{key}' must be a number, got '{value}'"
        ))),
    }
}

fn parse_pairs(input: &str) -> Result<Vec<(String, String)>> {
    input
        .split(PAIR_SEPARATOR)
        .map(str::trim)
        .filter(|pair| !pair.is_empty())
        .map(|pair| {
            let (key, value) = pair
                .split_once('=')
                .ok_or_else(|| Error::invalid_query(format!("expected key=value, got '{pair}'")))?;
            let key = key.trim();
            if key.is_empty() {
                return Err(Error::invalid_query(format!("empty key in '{pair}'")));
            }
            Ok((key.to_string(), value.trim().to_string()))
        })
        .collect()
}
