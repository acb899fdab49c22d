//! ORDER BY terms.

use serde::{Deserialize, Serialize};
use sqlrecord_core::{Error, Result};

/// Sort direction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    #[default]
    Asc,
    Desc,
}

impl Direction {
    /// Parse `asc` / `desc` in any case.
    pub fn parse(text: &str) -> Result<Self> {
        match text.trim().to_ascii_uppercase().as_str() {
            "ASC" => Ok(Direction::Asc),
            "DESC" => Ok(Direction::Desc),
            _ => Err(Error::InvalidDirection(text.to_string())),
        }
    }

    pub const fn as_sql(self) -> &'static str {
        match self {
            Direction::Asc => "ASC",
            Direction::Desc => "DESC",
        }
    }
}

/// Ordered list of `field direction` terms.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrderBy {
    terms: Vec<(String, Direction)>,
}

impl OrderBy {
    /// Sort by a single field, ascending.
    pub fn asc(field: impl Into<String>) -> Self {
        Self::default().then(field, Direction::Asc)
    }

    /// Sort by a single field, descending.
    pub fn desc(field: impl Into<String>) -> Self {
        Self::default().then(field, Direction::Desc)
    }

    /// Sort by several fields in the given order.
    pub fn by<I, K>(terms: I) -> Self
    where
        I: IntoIterator<Item = (K, Direction)>,
        K: Into<String>,
    {
        Self {
            terms: terms.into_iter().map(|(f, d)| (f.into(), d)).collect(),
        }
    }

    /// Append a term.
    pub fn then(mut self, field: impl Into<String>, direction: Direction) -> Self {
        self.terms.push((field.into(), direction));
        self
    }

    pub fn terms(&self) -> &[(String, Direction)] {
        &self.terms
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }
}
